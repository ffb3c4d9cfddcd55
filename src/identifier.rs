//! SQL identifier parsing and validation
//!
//! Table and column names are interpolated into SQL text, so every name the
//! pipeline touches goes through [`SqlIdentifier::parse`] first.

use std::fmt;

/// Maximum identifier length accepted
const MAX_IDENTIFIER_LEN: usize = 64;

/// A table or column name restricted to `[A-Za-z_][A-Za-z0-9_]*`
///
/// # Examples
///
/// ```
/// use refdata_ingest::identifier::SqlIdentifier;
///
/// let table = SqlIdentifier::parse("trade_cal").unwrap();
/// assert_eq!(table.as_str(), "trade_cal");
/// assert_eq!(table.quoted(), "\"trade_cal\"");
/// assert!(SqlIdentifier::parse("trade_cal; DROP TABLE x").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SqlIdentifier(String);

impl SqlIdentifier {
    /// Parse and validate an identifier
    ///
    /// Surrounding whitespace is trimmed; case is preserved.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, too long, starts with a digit or
    /// contains anything other than ASCII letters, digits and underscores.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let name = s.trim();
        if name.is_empty() {
            return Err(IdentifierError::Empty);
        }

        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::TooLong {
                name: name.to_string(),
                max: MAX_IDENTIFIER_LEN,
            });
        }

        let mut chars = name.chars();
        let first = chars.next().ok_or(IdentifierError::Empty)?;
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(IdentifierError::InvalidFormat(format!(
                "'{name}' must start with a letter or underscore"
            )));
        }

        if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(IdentifierError::InvalidFormat(format!(
                "'{name}' contains invalid character '{bad}'"
            )));
        }

        Ok(Self(name.to_string()))
    }

    /// Identifier from a compile-time literal
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a valid identifier. Use [`SqlIdentifier::parse`]
    /// for anything that is not a literal.
    #[track_caller]
    pub fn from_static(name: &'static str) -> Self {
        match Self::parse(name) {
            Ok(id) => id,
            Err(err) => panic!("invalid static identifier: {err}"),
        }
    }

    /// The bare name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name wrapped in double quotes for use in SQL text
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for SqlIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SqlIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for SqlIdentifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Errors that can occur during identifier parsing
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IdentifierError {
    /// Empty name
    #[error("identifier cannot be empty")]
    Empty,

    /// Name exceeds the length limit
    #[error("identifier '{name}' exceeds {max} characters")]
    TooLong {
        /// Offending name
        name: String,
        /// Length limit
        max: usize,
    },

    /// Name contains characters outside the allowed set
    #[error("invalid identifier: {0}")]
    InvalidFormat(String),
}
