use console::{style, StyledObject};
use std::fmt::Display;

/// A phase that is still running.
pub fn phase_active(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

/// A phase that completed.
pub fn phase_done(text: impl Display) -> StyledObject<String> {
    style(format!("{text} ✓")).bright().green()
}

pub fn failure(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn heading(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().underlined()
}

pub fn dim(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn magenta_bold(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}
