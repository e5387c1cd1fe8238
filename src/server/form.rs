//! server::form
//!
//! Parsing and validation of the sign-in form.
//!
//! The body is `application/x-www-form-urlencoded` with two fields:
//! - `name` (required, non-blank, no control characters)
//! - `special` (optional; anything unrecognised counts as `false`)

use thiserror::Error;

/// Errors from form validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("missing 'name' field")]
    MissingName,

    #[error("name cannot be empty")]
    EmptyName,

    #[error("name cannot contain control characters")]
    InvalidName,
}

/// A validated sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignForm {
    pub name: String,
    pub special: bool,
}

impl SignForm {
    /// Parse a urlencoded body. Repeated fields: the first one wins.
    pub fn parse(body: &str) -> Result<Self, FormError> {
        let mut name = None;
        let mut special = None;
        for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
            match &*key {
                "name" if name.is_none() => name = Some(value.into_owned()),
                "special" if special.is_none() => special = Some(parse_flag(&value)),
                _ => {}
            }
        }

        let name = name.ok_or(FormError::MissingName)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(FormError::EmptyName);
        }
        if name.chars().any(char::is_control) {
            return Err(FormError::InvalidName);
        }

        Ok(Self {
            name: name.to_string(),
            special: special.unwrap_or(false),
        })
    }
}

/// Lenient boolean: the usual spellings plus the HTML checkbox value `on`.
fn parse_flag(value: &str) -> bool {
    matches!(
        value,
        "1" | "t" | "T" | "true" | "TRUE" | "True" | "on"
    )
}
