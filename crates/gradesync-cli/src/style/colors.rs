//! Semantic color palette.

use owo_colors::{OwoColorize, Style};

fn success_style() -> Style {
    Style::new().green().bold()
}

fn error_style() -> Style {
    Style::new().red().bold()
}

fn warning_style() -> Style {
    Style::new().yellow()
}

fn info_style() -> Style {
    Style::new().cyan()
}

fn muted_style() -> Style {
    Style::new().dimmed()
}

fn header_style() -> Style {
    Style::new().bold()
}

/// Applies a semantic style unless colors are disabled.
pub trait SemanticStyle {
    /// Green bold.
    fn success(&self) -> String;
    /// Red bold.
    fn error(&self) -> String;
    /// Yellow.
    fn warning(&self) -> String;
    /// Cyan.
    fn info(&self) -> String;
    /// Dimmed.
    fn muted(&self) -> String;
    /// Bold.
    fn header(&self) -> String;
}

fn paint<T: std::fmt::Display>(value: &T, style: Style) -> String {
    if super::no_color() {
        value.to_string()
    } else {
        value.style(style).to_string()
    }
}

impl<T: std::fmt::Display> SemanticStyle for T {
    fn success(&self) -> String {
        paint(self, success_style())
    }

    fn error(&self) -> String {
        paint(self, error_style())
    }

    fn warning(&self) -> String {
        paint(self, warning_style())
    }

    fn info(&self) -> String {
        paint(self, info_style())
    }

    fn muted(&self) -> String {
        paint(self, muted_style())
    }

    fn header(&self) -> String {
        paint(self, header_style())
    }
}
