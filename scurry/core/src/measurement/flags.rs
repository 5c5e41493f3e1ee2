//! Builder for scamper's short-option command fragments.

use std::fmt::Display;

use crate::error::InvalidTaskError;

/// Check that `value` renders as exactly one word of a command line
///
/// Whitespace would split it into several arguments and a line break would
/// start another command.
pub(crate) fn check_word(field: &'static str, value: &str) -> Result<(), InvalidTaskError> {
    if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(InvalidTaskError {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// [`check_word`] for each set value
pub(crate) fn check_words(
    words: &[(&'static str, Option<&String>)],
) -> Result<(), InvalidTaskError> {
    for &(field, value) in words {
        if let Some(value) = value {
            check_word(field, value)?;
        }
    }
    Ok(())
}

/// Accumulates `-x value` pairs in the order they are added
#[derive(Debug, Default)]
pub(crate) struct Flags {
    parts: Vec<String>,
}

impl Flags {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add `-<short> <value>` when a value is set
    pub(crate) fn value<T: Display>(&mut self, short: char, value: Option<&T>) -> &mut Self {
        if let Some(value) = value {
            self.parts.push(format!("-{short} {value}"));
        }
        self
    }

    /// Add a bare `-<short>` when `enabled`
    pub(crate) fn switch(&mut self, short: char, enabled: bool) -> &mut Self {
        if enabled {
            self.parts.push(format!("-{short}"));
        }
        self
    }

    pub(crate) fn finish(&mut self) -> String {
        self.parts.join(" ")
    }
}
