//! Terminal styling for diagnostics and summaries.
//!
//! Colors can be disabled globally via `--no-color` or the `NO_COLOR`
//! environment variable; every helper then returns plain text.

use owo_colors::{OwoColorize, Stream::Stderr};
use std::sync::atomic::{AtomicBool, Ordering};

static COLORS_ENABLED: AtomicBool = AtomicBool::new(true);

/// Disable all colors. Call early in `main` when `--no-color` is set.
pub fn disable_colors() {
    COLORS_ENABLED.store(false, Ordering::Relaxed);
    owo_colors::set_override(false);
}

pub fn colors_enabled() -> bool {
    COLORS_ENABLED.load(Ordering::Relaxed)
}

/// Styles for text written to stderr.
pub trait Themed {
    fn error_label(&self) -> String;
    fn warning_label(&self) -> String;
    fn success(&self) -> String;
    fn muted(&self) -> String;
}

impl<T: AsRef<str>> Themed for T {
    fn error_label(&self) -> String {
        let text = self.as_ref();
        if !colors_enabled() {
            return text.to_string();
        }
        text.if_supports_color(Stderr, |t| t.red())
            .if_supports_color(Stderr, |t| t.bold())
            .to_string()
    }

    fn warning_label(&self) -> String {
        let text = self.as_ref();
        if !colors_enabled() {
            return text.to_string();
        }
        text.if_supports_color(Stderr, |t| t.yellow())
            .if_supports_color(Stderr, |t| t.bold())
            .to_string()
    }

    fn success(&self) -> String {
        let text = self.as_ref();
        if !colors_enabled() {
            return text.to_string();
        }
        text.if_supports_color(Stderr, |t| t.green()).to_string()
    }

    fn muted(&self) -> String {
        let text = self.as_ref();
        if !colors_enabled() {
            return text.to_string();
        }
        text.if_supports_color(Stderr, |t| t.dimmed()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_colors_return_plain_text() {
        disable_colors();
        assert!(!colors_enabled());
        assert_eq!("error".error_label(), "error");
        assert_eq!("warning".warning_label(), "warning");
        assert_eq!(String::from("done").success(), "done");
        assert_eq!("3 cached".muted(), "3 cached");
    }
}
