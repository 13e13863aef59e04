//! Caller-supplied trip parameters and their validation.
//!
//! A [`TripRequest`] drives one plan-generation request. It is input only:
//! it is never persisted on its own, but its fields are overlaid onto the
//! generated plan before the plan is saved.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fallback preference text when the caller supplied none.
pub const NO_PREFERENCES: &str = "no special preferences";

/// Trip parameters for one generation request. Wire names are camelCase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRequest {
    pub destination: String,
    /// Trip length in days.
    pub duration: i32,
    pub budget: f64,
    /// Party size.
    pub people: i32,
    #[serde(default)]
    pub preferences: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Validation failures for a [`TripRequest`], one variant per violated rule.
#[derive(Debug, Error)]
pub enum TripValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("duration must be at least 1 day, got {0}")]
    InvalidDuration(i32),

    #[error("budget must be a non-negative number, got {0}")]
    InvalidBudget(f64),

    #[error("people must be at least 1, got {0}")]
    InvalidPeople(i32),

    #[error("end date {end} is before start date {start}")]
    DateRange { start: NaiveDate, end: NaiveDate },
}

impl TripRequest {
    /// Check every field rule, returning the first violation.
    pub fn validate(&self) -> Result<(), TripValidationError> {
        if self.destination.trim().is_empty() {
            return Err(TripValidationError::MissingField("destination"));
        }
        if self.duration < 1 {
            return Err(TripValidationError::InvalidDuration(self.duration));
        }
        if !self.budget.is_finite() || self.budget < 0.0 {
            return Err(TripValidationError::InvalidBudget(self.budget));
        }
        if self.people < 1 {
            return Err(TripValidationError::InvalidPeople(self.people));
        }
        if self.end_date < self.start_date {
            return Err(TripValidationError::DateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }

    /// Preference text for prompt inclusion, with a default for empty input.
    pub fn preferences_text(&self) -> &str {
        self.preferences
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(NO_PREFERENCES)
    }
}
