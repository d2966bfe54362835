//! Typed `key:value` tag filters used to select instances.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Separator between key and value on the command line.
pub const TAG_SEPARATOR: char = ':';

/// Tag selecting which instances have their volumes rotated.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct TagFilter {
    key: String,
    value: String,
}

/// Errors raised when parsing a tag filter.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TagError {
    /// The input does not contain exactly one separator.
    #[error("tag \"{input}\" must have the form KEY:VALUE")]
    Malformed {
        /// Raw input as supplied by the caller.
        input: String,
    },
    /// The key or the value is blank.
    #[error("tag \"{input}\" has an empty {part}")]
    Empty {
        /// Raw input as supplied by the caller.
        input: String,
        /// Which half was empty (`key` or `value`).
        part: &'static str,
    },
}

impl TagFilter {
    /// Builds a filter from a key and value, trimming both.
    ///
    /// # Errors
    ///
    /// Returns [`TagError::Empty`] when either half is blank after trimming.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, TagError> {
        let trimmed_key = key.into().trim().to_owned();
        let trimmed_value = value.into().trim().to_owned();
        let input = format!("{trimmed_key}{TAG_SEPARATOR}{trimmed_value}");
        if trimmed_key.is_empty() {
            return Err(TagError::Empty { input, part: "key" });
        }
        if trimmed_value.is_empty() {
            return Err(TagError::Empty {
                input,
                part: "value",
            });
        }
        Ok(Self {
            key: trimmed_key,
            value: trimmed_value,
        })
    }

    /// Tag key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Tag value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Renders the filter as a single `key=value` provider tag.
    ///
    /// Scaleway tags are flat strings, so instances are tagged with this
    /// rendering.
    #[must_use]
    pub fn provider_tag(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

impl FromStr for TagFilter {
    type Err = TagError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parts = input.split(TAG_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => Self::new(key, value).map_err(|err| match err {
                TagError::Empty { part, .. } => TagError::Empty {
                    input: input.to_owned(),
                    part,
                },
                TagError::Malformed { .. } => err,
            }),
            _ => Err(TagError::Malformed {
                input: input.to_owned(),
            }),
        }
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}{TAG_SEPARATOR}{}", self.key, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn parses_key_and_value() {
        let tag: TagFilter = "Lifecycle:legacy".parse().expect("valid tag");
        assert_eq!(tag.key(), "Lifecycle");
        assert_eq!(tag.value(), "legacy");
        assert_eq!(tag.to_string(), "Lifecycle:legacy");
        assert_eq!(tag.provider_tag(), "Lifecycle=legacy");
    }

    #[rstest]
    fn trims_whitespace_around_halves() {
        let tag: TagFilter = " backup : nightly ".parse().expect("valid tag");
        assert_eq!(tag.key(), "backup");
        assert_eq!(tag.value(), "nightly");
    }

    #[rstest]
    #[case("no-separator")]
    #[case("a:b:c")]
    #[case("")]
    fn rejects_malformed_input(#[case] input: &str) {
        let err = input.parse::<TagFilter>().expect_err("tag should be rejected");
        assert_eq!(
            err,
            TagError::Malformed {
                input: input.to_owned()
            }
        );
    }

    #[rstest]
    #[case(":value", "key")]
    #[case("key: ", "value")]
    fn rejects_blank_halves(#[case] input: &str, #[case] expected_part: &str) {
        let err = input.parse::<TagFilter>().expect_err("tag should be rejected");
        let TagError::Empty { part, .. } = err else {
            panic!("expected Empty, got {err:?}");
        };
        assert_eq!(part, expected_part);
    }
}
