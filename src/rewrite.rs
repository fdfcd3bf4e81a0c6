//! Literal anchor replacement over whole-file text.
//!
//! These functions never parse TOML. They replace an exact substring
//! everywhere it appears and report how many times that happened.

use crate::channel::{Channel, CudaVersion};
use crate::version::TorchConstraint;

/// Bare dependency entry in `pyproject.toml`, quotes included.
pub const TORCH_PLACEHOLDER: &str = "\"torch\"";

/// Result of a rewrite: the new text and how many anchors were replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    pub replacements: usize,
}

impl Rewrite {
    pub fn is_noop(&self) -> bool {
        self.replacements == 0
    }
}

/// Replace every occurrence of `anchor` in `text` with `replacement`.
///
/// An empty anchor matches nothing. Occurrences where the replacement is
/// identical to the anchor are not counted.
pub fn replace_anchor(text: &str, anchor: &str, replacement: &str) -> Rewrite {
    replace_anchor_unless_after(text, anchor, replacement, &[])
}

/// Like [`replace_anchor`], but leaves an occurrence alone when the text
/// right before it ends with one of `already_rewritten`.
pub fn replace_anchor_unless_after(
    text: &str,
    anchor: &str,
    replacement: &str,
    already_rewritten: &[&str],
) -> Rewrite {
    if anchor.is_empty() || anchor == replacement {
        return Rewrite {
            text: text.to_string(),
            replacements: 0,
        };
    }

    let mut out = String::with_capacity(text.len());
    let mut replacements = 0;
    let mut last = 0;
    for (idx, _) in text.match_indices(anchor) {
        let before = &text[..idx];
        out.push_str(&text[last..idx]);
        if already_rewritten.iter().any(|p| before.ends_with(p)) {
            out.push_str(anchor);
        } else {
            out.push_str(replacement);
            replacements += 1;
        }
        last = idx + anchor.len();
    }
    out.push_str(&text[last..]);

    Rewrite {
        text: out,
        replacements,
    }
}

/// Replace the `"torch"` placeholder with the quoted constraint.
pub fn rewrite_torch_constraint(text: &str, constraint: &TorchConstraint) -> Rewrite {
    replace_anchor(
        text,
        TORCH_PLACEHOLDER,
        &format!("\"{}\"", constraint.requirement()),
    )
}

/// Replace the index anchor with the channel-specific CUDA path segment.
///
/// An anchor already sitting under a `/nightly` or `/test` segment was
/// written by an earlier run and is kept, so reruns do not stack prefixes.
pub fn rewrite_cuda_channel(
    text: &str,
    anchor: &str,
    cuda: &CudaVersion,
    channel: Channel,
) -> Rewrite {
    replace_anchor_unless_after(
        text,
        anchor,
        &cuda.index_segment(channel),
        &Channel::PREFIXES,
    )
}
