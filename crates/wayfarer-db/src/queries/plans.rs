//! Database query functions for the `travel_plans` table.
//!
//! Every lookup is scoped by owning user: a plan id belonging to another
//! user behaves exactly like a missing plan.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{PlanDetail, PlanSummary, TravelPlan};
use crate::queries::budget_items;

/// Insert a new plan row. Returns the inserted plan with server-generated
/// defaults (id, timestamps).
#[allow(clippy::too_many_arguments)]
pub async fn insert_plan(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    destination: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    duration_days: i32,
    budget: f64,
    people: i32,
    preferences: &str,
    schedule: &serde_json::Value,
    recommendations: Option<&serde_json::Value>,
) -> Result<TravelPlan> {
    let plan = sqlx::query_as::<_, TravelPlan>(
        "INSERT INTO travel_plans \
         (user_id, name, destination, start_date, end_date, duration_days, \
          budget, people, preferences, schedule, recommendations) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING *",
    )
    .bind(user_id)
    .bind(name)
    .bind(destination)
    .bind(start_date)
    .bind(end_date)
    .bind(duration_days)
    .bind(budget)
    .bind(people)
    .bind(preferences)
    .bind(schedule)
    .bind(recommendations)
    .fetch_one(pool)
    .await
    .context("failed to insert plan")?;

    Ok(plan)
}

/// Fetch a plan owned by the given user.
pub async fn get_plan(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<TravelPlan>> {
    let plan = sqlx::query_as::<_, TravelPlan>(
        "SELECT * FROM travel_plans WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch plan")?;

    Ok(plan)
}

/// Fetch a plan with its budget items and derived totals.
pub async fn get_plan_detail(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<PlanDetail>> {
    let Some(plan) = get_plan(pool, id, user_id).await? else {
        return Ok(None);
    };
    let items = budget_items::list_budget_items(pool, plan.id).await?;
    Ok(Some(PlanDetail::new(plan, items)))
}

/// List a user's plans as summaries, newest first.
pub async fn list_plan_summaries(pool: &PgPool, user_id: Uuid) -> Result<Vec<PlanSummary>> {
    let plans = sqlx::query_as::<_, PlanSummary>(
        "SELECT id, name, destination, start_date, end_date, budget, created_at \
         FROM travel_plans \
         WHERE user_id = $1 \
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list plans")?;

    Ok(plans)
}

/// Field-by-field changes for a plan update; `None` leaves the column as-is.
#[derive(Debug, Clone, Default)]
pub struct PlanChanges {
    pub name: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration_days: Option<i32>,
    pub budget: Option<f64>,
    pub people: Option<i32>,
    pub preferences: Option<String>,
    pub schedule: Option<serde_json::Value>,
    pub recommendations: Option<serde_json::Value>,
}

/// Apply a partial update to a plan owned by the given user. Returns the
/// updated plan, or `None` when no such plan exists.
pub async fn update_plan(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    changes: PlanChanges,
) -> Result<Option<TravelPlan>> {
    let plan = sqlx::query_as::<_, TravelPlan>(
        "UPDATE travel_plans SET \
             name = COALESCE($3, name), \
             destination = COALESCE($4, destination), \
             start_date = COALESCE($5, start_date), \
             end_date = COALESCE($6, end_date), \
             duration_days = COALESCE($7, duration_days), \
             budget = COALESCE($8, budget), \
             people = COALESCE($9, people), \
             preferences = COALESCE($10, preferences), \
             schedule = COALESCE($11, schedule), \
             recommendations = COALESCE($12, recommendations), \
             updated_at = now() \
         WHERE id = $1 AND user_id = $2 \
         RETURNING *",
    )
    .bind(id)
    .bind(user_id)
    .bind(changes.name)
    .bind(changes.destination)
    .bind(changes.start_date)
    .bind(changes.end_date)
    .bind(changes.duration_days)
    .bind(changes.budget)
    .bind(changes.people)
    .bind(changes.preferences)
    .bind(changes.schedule)
    .bind(changes.recommendations)
    .fetch_optional(pool)
    .await
    .context("failed to update plan")?;

    Ok(plan)
}

/// Replace a plan's schedule array. Returns the updated plan, or `None`
/// when no such plan exists.
pub async fn update_plan_schedule(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    schedule: &serde_json::Value,
) -> Result<Option<TravelPlan>> {
    let plan = sqlx::query_as::<_, TravelPlan>(
        "UPDATE travel_plans SET schedule = $3, updated_at = now() \
         WHERE id = $1 AND user_id = $2 \
         RETURNING *",
    )
    .bind(id)
    .bind(user_id)
    .bind(schedule)
    .fetch_optional(pool)
    .await
    .context("failed to update plan schedule")?;

    Ok(plan)
}

/// Delete a plan owned by the given user. Budget items go with it via the
/// foreign-key cascade. Returns `false` when no such plan exists.
pub async fn delete_plan(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM travel_plans WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("failed to delete plan")?;

    Ok(result.rows_affected() > 0)
}
