//! Typed travel-plan documents.
//!
//! These types deserialize model output, so they are deliberately lenient:
//! every nested field defaults or is optional. The only hard requirements
//! (`name` present, `schedule` present) are enforced by the normalizer
//! before deserialization.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A normalized travel plan: what the model produced plus the authoritative
/// trip parameters overlaid by the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPlan {
    pub name: String,
    #[serde(default)]
    pub schedule: Vec<DaySchedule>,
    /// Free-form advice block (`transportation` / `dining` / `tips`), kept
    /// as raw JSON since its shape is model-defined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<serde_json::Value>,

    // Overlaid trip parameters. Always present after normalization.
    pub destination: String,
    pub duration: i32,
    pub budget: f64,
    pub people: i32,
    #[serde(default)]
    pub preferences: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// The requesting user.
    pub user: Uuid,
}

/// One day of the itinerary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    /// 1-based day index.
    #[serde(default)]
    pub day: i32,
    /// Date as the model emits it (`YYYY-MM-DD`), kept as text.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodation: Option<Place>,
}

/// One scheduled activity within a day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Free-text time-of-day label, e.g. "09:00-11:00".
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub activity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Place>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A named location: sight, restaurant, lodging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl GeneratedPlan {
    /// Serialize the schedule alone, as stored in the `schedule` JSONB column.
    pub fn schedule_value(&self) -> serde_json::Value {
        serde_json::to_value(&self.schedule).unwrap_or_else(|_| serde_json::json!([]))
    }
}
