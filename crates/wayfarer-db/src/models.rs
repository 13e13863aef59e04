use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Category of a budget line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BudgetCategory {
    Dining,
    Transport,
    Lodging,
    Tickets,
    Shopping,
    Entertainment,
    Other,
}

impl fmt::Display for BudgetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Dining => "dining",
            Self::Transport => "transport",
            Self::Lodging => "lodging",
            Self::Tickets => "tickets",
            Self::Shopping => "shopping",
            Self::Entertainment => "entertainment",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for BudgetCategory {
    type Err = BudgetCategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dining" => Ok(Self::Dining),
            "transport" => Ok(Self::Transport),
            "lodging" => Ok(Self::Lodging),
            "tickets" => Ok(Self::Tickets),
            "shopping" => Ok(Self::Shopping),
            "entertainment" => Ok(Self::Entertainment),
            "other" => Ok(Self::Other),
            other => Err(BudgetCategoryParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`BudgetCategory`] string.
#[derive(Debug, Clone)]
pub struct BudgetCategoryParseError(pub String);

impl fmt::Display for BudgetCategoryParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid budget category: {:?}", self.0)
    }
}

impl std::error::Error for BudgetCategoryParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A registered user.
///
/// The stored DashScope API key is deliberately not part of this struct;
/// queries that need it fetch the single column explicitly so the key can
/// never leak through a serialized user record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A travel plan -- the long-lived record a generated itinerary becomes.
///
/// `schedule` and `recommendations` hold the document-shaped itinerary the
/// model produced; they are stored and served as JSON without re-validation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TravelPlan {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub name: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(rename = "duration")]
    pub duration_days: i32,
    pub budget: f64,
    pub people: i32,
    pub preferences: String,
    pub schedule: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing row for a plan: the fields the plans index shows, nothing more.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub id: Uuid,
    pub name: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: f64,
    pub created_at: DateTime<Utc>,
}

/// A budget line item owned by a plan.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BudgetItem {
    pub id: Uuid,
    #[serde(skip)]
    pub plan_id: Uuid,
    pub name: String,
    pub category: BudgetCategory,
    pub amount: f64,
    #[serde(rename = "date")]
    pub spent_on: NaiveDate,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// A plan together with its budget items and derived spending totals, as
/// returned by the detail endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDetail {
    #[serde(flatten)]
    pub plan: TravelPlan,
    pub budget_items: Vec<BudgetItem>,
    pub total_spent: f64,
    pub remaining_budget: f64,
}

impl PlanDetail {
    /// Compose a detail view, computing `total_spent` and `remaining_budget`
    /// from the item amounts.
    pub fn new(plan: TravelPlan, budget_items: Vec<BudgetItem>) -> Self {
        let total_spent: f64 = budget_items.iter().map(|item| item.amount).sum();
        let remaining_budget = plan.budget - total_spent;
        Self {
            plan,
            budget_items,
            total_spent,
            remaining_budget,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
