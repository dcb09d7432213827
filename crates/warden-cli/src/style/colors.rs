//! Status colors.

use std::fmt::Display;

use owo_colors::{OwoColorize, Style};

#[derive(Debug, Clone, Copy)]
enum Tone {
    Success,
    Error,
    Warning,
    Muted,
    Header,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Self::Success => Style::new().green().bold(),
            Self::Error => Style::new().red().bold(),
            Self::Warning => Style::new().yellow(),
            Self::Muted => Style::new().dimmed(),
            Self::Header => Style::new().bold().underline(),
        }
    }
}

fn paint(value: &impl Display, tone: Tone) -> String {
    if super::no_color() {
        value.to_string()
    } else {
        value.style(tone.style()).to_string()
    }
}

/// Renders any displayable value in a status color, or plain when
/// `--no-color` is set.
pub trait SemanticStyle {
    fn success(&self) -> String;
    fn error(&self) -> String;
    fn warning(&self) -> String;
    fn muted(&self) -> String;
    fn header(&self) -> String;
}

impl<T: Display + ?Sized> SemanticStyle for T {
    fn success(&self) -> String {
        paint(&self, Tone::Success)
    }

    fn error(&self) -> String {
        paint(&self, Tone::Error)
    }

    fn warning(&self) -> String {
        paint(&self, Tone::Warning)
    }

    fn muted(&self) -> String {
        paint(&self, Tone::Muted)
    }

    fn header(&self) -> String {
        paint(&self, Tone::Header)
    }
}
