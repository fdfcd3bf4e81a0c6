//! Terminal messages.
//!
//! Progress goes to stdout so build logs capture it next to the tool that
//! invoked us; failures go to stderr. Labels are styled only on a TTY.

use console::{Color, Term, style};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// `label msg`, with the label bold and colored when `is_tty`.
fn render_line(label: &str, color: Color, msg: &str, is_tty: bool) -> String {
    let label = if is_tty {
        style(label).bold().fg(color).to_string()
    } else {
        label.to_string()
    };
    if msg.is_empty() {
        label
    } else {
        format!("{label} {msg}")
    }
}

/// Where progress messages are written.
///
/// Library code takes a `&mut Reporter` so tests can capture output in a
/// buffer instead of the real stdout. Write errors are ignored: a closed
/// pipe must not turn a finished rewrite into a failure.
pub struct Reporter<'a> {
    w: &'a mut dyn Write,
    is_tty: bool,
}

impl<'a> Reporter<'a> {
    pub fn new(w: &'a mut dyn Write, is_tty: bool) -> Self {
        Self { w, is_tty }
    }

    fn labeled(&mut self, label: &str, color: Color, msg: &str) {
        let line = render_line(label, color, msg, self.is_tty);
        let _ = writeln!(self.w, "{line}");
    }

    /// A step that is about to happen, e.g. `Updating ./pyproject.toml`.
    pub fn action(&mut self, label: &str, msg: &str) {
        self.labeled(label, Color::Cyan, msg);
    }

    pub fn success(&mut self, label: &str, msg: &str) {
        self.labeled(label, Color::Green, msg);
    }

    pub fn note(&mut self, msg: &str) {
        self.labeled("Note", Color::Yellow, msg);
    }

    /// Indented, dimmed line. Suppressed unless verbose mode is on.
    pub fn detail(&mut self, msg: &str) {
        if !is_verbose() {
            return;
        }
        let indented = format!("  {msg}");
        let _ = if self.is_tty {
            writeln!(self.w, "{}", style(indented).dim())
        } else {
            writeln!(self.w, "{indented}")
        };
    }

    /// Write a plain line with no label.
    pub fn line(&mut self, msg: &str) {
        let _ = writeln!(self.w, "{msg}");
    }
}

/// Run `f` with a reporter bound to the real stdout.
pub fn with_stdout<T>(f: impl FnOnce(&mut Reporter<'_>) -> T) -> T {
    let is_tty = Term::stdout().is_term();
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    let mut reporter = Reporter::new(&mut lock, is_tty);
    f(&mut reporter)
}

/// Report a failure on stderr.
pub fn fail(label: &str, msg: &str) {
    let line = render_line(label, Color::Red, msg, Term::stderr().is_term());
    let _ = writeln!(io::stderr(), "{line}");
}

pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}
