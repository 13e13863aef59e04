//! Database query functions for the `budget_items` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{BudgetCategory, BudgetItem};

/// Insert a new budget item into a plan. Returns the inserted item with
/// server-generated defaults (id, created_at).
pub async fn insert_budget_item(
    pool: &PgPool,
    plan_id: Uuid,
    name: &str,
    category: BudgetCategory,
    amount: f64,
    spent_on: NaiveDate,
    notes: &str,
) -> Result<BudgetItem> {
    let item = sqlx::query_as::<_, BudgetItem>(
        "INSERT INTO budget_items (plan_id, name, category, amount, spent_on, notes) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(plan_id)
    .bind(name)
    .bind(category)
    .bind(amount)
    .bind(spent_on)
    .bind(notes)
    .fetch_one(pool)
    .await
    .context("failed to insert budget item")?;

    Ok(item)
}

/// List a plan's budget items in insertion order.
pub async fn list_budget_items(pool: &PgPool, plan_id: Uuid) -> Result<Vec<BudgetItem>> {
    let items = sqlx::query_as::<_, BudgetItem>(
        "SELECT * FROM budget_items WHERE plan_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(plan_id)
    .fetch_all(pool)
    .await
    .context("failed to list budget items")?;

    Ok(items)
}

/// Field-by-field changes for a budget item; `None` leaves the column as-is.
#[derive(Debug, Clone, Default)]
pub struct BudgetItemChanges {
    pub name: Option<String>,
    pub category: Option<BudgetCategory>,
    pub amount: Option<f64>,
    pub spent_on: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Apply a partial update to a budget item within a plan. Returns the
/// updated item, or `None` when the item does not exist in that plan.
pub async fn update_budget_item(
    pool: &PgPool,
    plan_id: Uuid,
    item_id: Uuid,
    changes: BudgetItemChanges,
) -> Result<Option<BudgetItem>> {
    let item = sqlx::query_as::<_, BudgetItem>(
        "UPDATE budget_items SET \
             name = COALESCE($3, name), \
             category = COALESCE($4, category), \
             amount = COALESCE($5, amount), \
             spent_on = COALESCE($6, spent_on), \
             notes = COALESCE($7, notes) \
         WHERE id = $2 AND plan_id = $1 \
         RETURNING *",
    )
    .bind(plan_id)
    .bind(item_id)
    .bind(changes.name)
    .bind(changes.category)
    .bind(changes.amount)
    .bind(changes.spent_on)
    .bind(changes.notes)
    .fetch_optional(pool)
    .await
    .context("failed to update budget item")?;

    Ok(item)
}

/// Delete a budget item from a plan. Returns `false` when the item was not
/// present (callers treat that as a no-op, not an error).
pub async fn delete_budget_item(pool: &PgPool, plan_id: Uuid, item_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM budget_items WHERE id = $2 AND plan_id = $1")
        .bind(plan_id)
        .bind(item_id)
        .execute(pool)
        .await
        .context("failed to delete budget item")?;

    Ok(result.rows_affected() > 0)
}
