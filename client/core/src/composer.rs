//! Message Composer
//!
//! The text input the user types into. Holds the raw value, a touched flag
//! and the validation rules (required, maximum length). Validation never
//! reaches the network; failures are reported back to the surface.

use serde::{Deserialize, Serialize};

/// Default maximum message length in characters
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 500;

/// Why the composer content is invalid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputError {
    /// Nothing (or only whitespace) was typed
    Required,
    /// Longer than allowed
    TooLong {
        /// Allowed length in characters
        max: usize,
        /// Actual length in characters
        actual: usize,
    },
    /// A send is already in flight
    Busy,
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required => write!(f, "message is required"),
            Self::TooLong { max, actual } => {
                write!(f, "message is {actual} characters long (max {max})")
            }
            Self::Busy => write!(f, "a message is already being sent"),
        }
    }
}

/// Composer state
#[derive(Clone, Debug)]
pub struct Composer {
    value: String,
    touched: bool,
    forced_error: Option<InputError>,
    max_length: usize,
}

impl Composer {
    /// Create an empty composer
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self {
            value: String::new(),
            touched: false,
            forced_error: None,
            max_length,
        }
    }

    /// Current raw value
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Replace the value (user typing)
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.forced_error = None;
    }

    /// Whether the user interacted with the composer
    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    /// Mark as interacted with
    pub fn mark_touched(&mut self) {
        self.touched = true;
    }

    /// Flag an error found outside the built-in rules
    pub fn set_error(&mut self, error: InputError) {
        self.forced_error = Some(error);
    }

    /// Current validation error, if any
    ///
    /// `Required` only fires on an empty value here; whitespace-only input is
    /// caught when the trimmed message is taken.
    #[must_use]
    pub fn error(&self) -> Option<InputError> {
        if let Some(error) = self.forced_error {
            return Some(error);
        }
        if self.value.is_empty() {
            return Some(InputError::Required);
        }
        let actual = self.value.chars().count();
        if actual > self.max_length {
            return Some(InputError::TooLong {
                max: self.max_length,
                actual,
            });
        }
        None
    }

    /// Whether the value passes validation
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error().is_none()
    }

    /// Trimmed message, or `Required` when it is blank
    ///
    /// A blank message flags the error but leaves the value in place.
    pub fn take_trimmed(&mut self) -> Result<String, InputError> {
        let trimmed = self.value.trim();
        if trimmed.is_empty() {
            self.set_error(InputError::Required);
            return Err(InputError::Required);
        }
        Ok(trimmed.to_string())
    }

    /// Clear the value and interaction state
    pub fn reset(&mut self) {
        self.value.clear();
        self.touched = false;
        self.forced_error = None;
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_LENGTH)
    }
}
