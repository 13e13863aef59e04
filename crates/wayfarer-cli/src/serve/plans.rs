//! Plan CRUD and the budget sub-resource.
//!
//! Every query is scoped to the authenticated user; a plan owned by someone
//! else is indistinguishable from a missing one (404). Budget mutations
//! return the full plan document with recomputed totals so clients never
//! patch local state.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use wayfarer_db::models::BudgetCategory;
use wayfarer_db::queries::budget_items::{self, BudgetItemChanges};
use wayfarer_db::queries::plans::{self as plan_db, PlanChanges};

use super::{ApiError, AppState, CurrentUser, parse_body};

fn plan_not_found() -> ApiError {
    ApiError::not_found("Plan not found")
}

// ---------------------------------------------------------------------------
// Plan CRUD
// ---------------------------------------------------------------------------

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, ApiError> {
    let summaries = plan_db::list_plan_summaries(&state.pool, user.id)
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(json!({
        "success": true,
        "count": summaries.len(),
        "plans": summaries,
    }))
    .into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePlanBody {
    name: Option<String>,
    destination: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    duration: Option<i32>,
    budget: Option<f64>,
    people: Option<i32>,
    preferences: Option<String>,
    schedule: Option<Value>,
    recommendations: Option<Value>,
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let body: CreatePlanBody = parse_body(body)?;

    let (
        Some(name),
        Some(destination),
        Some(start_date),
        Some(end_date),
        Some(duration),
        Some(budget),
        Some(people),
    ) = (
        body.name,
        body.destination,
        body.start_date,
        body.end_date,
        body.duration,
        body.budget,
        body.people,
    )
    else {
        return Err(ApiError::bad_request(
            "Please fill in all required fields: name, destination, startDate, endDate, \
             duration, budget, people",
        ));
    };

    let schedule = body.schedule.unwrap_or_else(|| json!([]));
    let plan = plan_db::insert_plan(
        &state.pool,
        user.id,
        &name,
        &destination,
        start_date,
        end_date,
        duration,
        budget,
        people,
        body.preferences.as_deref().unwrap_or(""),
        &schedule,
        body.recommendations.as_ref(),
    )
    .await
    .map_err(ApiError::internal)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "plan": plan })),
    )
        .into_response())
}

pub async fn detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let detail = plan_db::get_plan_detail(&state.pool, id, user.id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(plan_not_found)?;

    Ok(Json(json!({ "success": true, "plan": detail })).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePlanBody {
    name: Option<String>,
    destination: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    duration: Option<i32>,
    budget: Option<f64>,
    people: Option<i32>,
    preferences: Option<String>,
    schedule: Option<Value>,
    recommendations: Option<Value>,
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let body: UpdatePlanBody = parse_body(body)?;

    let changes = PlanChanges {
        name: body.name,
        destination: body.destination,
        start_date: body.start_date,
        end_date: body.end_date,
        duration_days: body.duration,
        budget: body.budget,
        people: body.people,
        preferences: body.preferences,
        schedule: body.schedule,
        recommendations: body.recommendations,
    };

    let plan = plan_db::update_plan(&state.pool, id, user.id, changes)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(plan_not_found)?;

    Ok(Json(json!({ "success": true, "plan": plan })).into_response())
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let deleted = plan_db::delete_plan(&state.pool, id, user.id)
        .await
        .map_err(ApiError::internal)?;
    if !deleted {
        return Err(plan_not_found());
    }

    Ok(Json(json!({ "success": true, "message": "Plan deleted" })).into_response())
}

#[derive(Deserialize)]
struct ReplaceScheduleBody {
    schedule: Option<Value>,
}

pub async fn replace_schedule(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let body: ReplaceScheduleBody = parse_body(body)?;
    let schedule = body
        .schedule
        .filter(Value::is_array)
        .ok_or_else(|| ApiError::bad_request("schedule must be an array"))?;

    let plan = plan_db::update_plan_schedule(&state.pool, id, user.id, &schedule)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(plan_not_found)?;

    Ok(Json(json!({ "success": true, "plan": plan })).into_response())
}

// ---------------------------------------------------------------------------
// Budget sub-resource
// ---------------------------------------------------------------------------

/// Re-read the plan document with recomputed totals after a budget mutation.
async fn plan_document(
    state: &AppState,
    plan_id: Uuid,
    user_id: Uuid,
) -> Result<Value, ApiError> {
    let detail = plan_db::get_plan_detail(&state.pool, plan_id, user_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(plan_not_found)?;
    Ok(json!({ "success": true, "plan": detail }))
}

#[derive(Deserialize)]
struct AddBudgetItemBody {
    name: Option<String>,
    category: Option<String>,
    amount: Option<f64>,
    date: Option<NaiveDate>,
    notes: Option<String>,
}

pub async fn add_budget_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let body: AddBudgetItemBody = parse_body(body)?;

    let (Some(name), Some(category), Some(amount), Some(date)) =
        (body.name, body.category, body.amount, body.date)
    else {
        return Err(ApiError::bad_request(
            "Please fill in all required fields: name, category, amount, date",
        ));
    };
    let category: BudgetCategory = category
        .parse()
        .map_err(|err: wayfarer_db::models::BudgetCategoryParseError| {
            ApiError::bad_request(err.to_string())
        })?;

    // Ownership check before touching the sub-resource.
    plan_db::get_plan(&state.pool, id, user.id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(plan_not_found)?;

    budget_items::insert_budget_item(
        &state.pool,
        id,
        &name,
        category,
        amount,
        date,
        body.notes.as_deref().unwrap_or(""),
    )
    .await
    .map_err(ApiError::internal)?;

    let document = plan_document(&state, id, user.id).await?;
    Ok((StatusCode::CREATED, Json(document)).into_response())
}

#[derive(Deserialize)]
struct UpdateBudgetItemBody {
    name: Option<String>,
    category: Option<String>,
    amount: Option<f64>,
    date: Option<NaiveDate>,
    notes: Option<String>,
}

pub async fn update_budget_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let body: UpdateBudgetItemBody = parse_body(body)?;

    let category = body
        .category
        .map(|raw| {
            raw.parse::<BudgetCategory>()
                .map_err(|err| ApiError::bad_request(err.to_string()))
        })
        .transpose()?;

    plan_db::get_plan(&state.pool, id, user.id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(plan_not_found)?;

    let changes = BudgetItemChanges {
        name: body.name,
        category,
        amount: body.amount,
        spent_on: body.date,
        notes: body.notes,
    };
    budget_items::update_budget_item(&state.pool, id, item_id, changes)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Budget item not found"))?;

    let document = plan_document(&state, id, user.id).await?;
    Ok(Json(document).into_response())
}

pub async fn delete_budget_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    plan_db::get_plan(&state.pool, id, user.id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(plan_not_found)?;

    // A missing item is a silent no-op; the caller gets the current document
    // either way.
    budget_items::delete_budget_item(&state.pool, id, item_id)
        .await
        .map_err(ApiError::internal)?;

    let document = plan_document(&state, id, user.id).await?;
    Ok(Json(document).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::test_helpers::{TestApp, body_json, request, spawn, teardown};

    fn plan_body() -> serde_json::Value {
        json!({
            "name": "Kyoto Autumn",
            "destination": "Kyoto",
            "startDate": "2024-11-01",
            "endDate": "2024-11-05",
            "duration": 5,
            "budget": 8000.0,
            "people": 2,
            "preferences": "temples and food",
        })
    }

    async fn create_plan(app: &TestApp) -> String {
        let resp = request(app, "POST", "/api/plans", Some(plan_body())).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = body_json(resp).await;
        json["plan"]["id"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn create_then_list() {
        let app = spawn().await;

        let resp = request(&app, "GET", "/api/plans", None).await;
        let json = body_json(resp).await;
        assert_eq!(json["count"], 0);

        create_plan(&app).await;

        let resp = request(&app, "GET", "/api/plans", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["count"], 1);
        let summary = &json["plans"][0];
        assert_eq!(summary["name"], "Kyoto Autumn");
        assert_eq!(summary["startDate"], "2024-11-01");
        // summaries carry no schedule
        assert!(summary.get("schedule").is_none());

        teardown(app).await;
    }

    #[tokio::test]
    async fn create_rejects_missing_fields() {
        let app = spawn().await;

        let resp = request(
            &app,
            "POST",
            "/api/plans",
            Some(json!({"name": "Half a plan", "destination": "Kyoto"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["success"], false);

        teardown(app).await;
    }

    #[tokio::test]
    async fn detail_includes_budget_totals() {
        let app = spawn().await;
        let plan_id = create_plan(&app).await;

        let resp = request(&app, "GET", &format!("/api/plans/{plan_id}"), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["plan"]["name"], "Kyoto Autumn");
        assert_eq!(json["plan"]["budgetItems"], json!([]));
        assert_eq!(json["plan"]["totalSpent"], 0.0);
        assert_eq!(json["plan"]["remainingBudget"], 8000.0);

        teardown(app).await;
    }

    #[tokio::test]
    async fn missing_plan_is_404() {
        let app = spawn().await;

        let resp = request(
            &app,
            "GET",
            &format!("/api/plans/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        teardown(app).await;
    }

    #[tokio::test]
    async fn update_is_partial() {
        let app = spawn().await;
        let plan_id = create_plan(&app).await;

        let resp = request(
            &app,
            "PUT",
            &format!("/api/plans/{plan_id}"),
            Some(json!({"budget": 9000.0})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["plan"]["budget"], 9000.0);
        assert_eq!(json["plan"]["name"], "Kyoto Autumn");
        assert_eq!(json["plan"]["destination"], "Kyoto");

        teardown(app).await;
    }

    #[tokio::test]
    async fn delete_removes_the_plan() {
        let app = spawn().await;
        let plan_id = create_plan(&app).await;

        let resp = request(&app, "DELETE", &format!("/api/plans/{plan_id}"), None).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = request(&app, "GET", &format!("/api/plans/{plan_id}"), None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        teardown(app).await;
    }

    #[tokio::test]
    async fn replace_schedule_swaps_the_array() {
        let app = spawn().await;
        let plan_id = create_plan(&app).await;

        let schedule = json!([
            {"day": 1, "date": "2024-11-01", "activities": []}
        ]);
        let resp = request(
            &app,
            "PUT",
            &format!("/api/plans/{plan_id}/schedule"),
            Some(json!({"schedule": schedule})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["plan"]["schedule"], schedule);

        teardown(app).await;
    }

    #[tokio::test]
    async fn replace_schedule_rejects_non_arrays() {
        let app = spawn().await;
        let plan_id = create_plan(&app).await;

        let resp = request(
            &app,
            "PUT",
            &format!("/api/plans/{plan_id}/schedule"),
            Some(json!({"schedule": "day one"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        teardown(app).await;
    }

    #[tokio::test]
    async fn budget_item_lifecycle() {
        let app = spawn().await;
        let plan_id = create_plan(&app).await;

        // add
        let resp = request(
            &app,
            "POST",
            &format!("/api/plans/{plan_id}/budget"),
            Some(json!({
                "name": "Ryokan",
                "category": "lodging",
                "amount": 1200.0,
                "date": "2024-11-01",
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = body_json(resp).await;
        assert_eq!(json["plan"]["totalSpent"], 1200.0);
        assert_eq!(json["plan"]["remainingBudget"], 6800.0);
        let item_id = json["plan"]["budgetItems"][0]["id"]
            .as_str()
            .unwrap()
            .to_owned();

        // partial update: only the amount changes
        let resp = request(
            &app,
            "PUT",
            &format!("/api/plans/{plan_id}/budget/{item_id}"),
            Some(json!({"amount": 1500.0})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let item = &json["plan"]["budgetItems"][0];
        assert_eq!(item["amount"], 1500.0);
        assert_eq!(item["name"], "Ryokan");
        assert_eq!(item["category"], "lodging");

        // delete
        let resp = request(
            &app,
            "DELETE",
            &format!("/api/plans/{plan_id}/budget/{item_id}"),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["plan"]["budgetItems"], json!([]));
        assert_eq!(json["plan"]["totalSpent"], 0.0);

        teardown(app).await;
    }

    #[tokio::test]
    async fn budget_item_rejects_unknown_category() {
        let app = spawn().await;
        let plan_id = create_plan(&app).await;

        let resp = request(
            &app,
            "POST",
            &format!("/api/plans/{plan_id}/budget"),
            Some(json!({
                "name": "Souvenirs",
                "category": "souvenirs",
                "amount": 50.0,
                "date": "2024-11-02",
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        teardown(app).await;
    }

    #[tokio::test]
    async fn deleting_a_missing_budget_item_is_a_no_op() {
        let app = spawn().await;
        let plan_id = create_plan(&app).await;

        let resp = request(
            &app,
            "DELETE",
            &format!("/api/plans/{plan_id}/budget/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);

        teardown(app).await;
    }

    #[tokio::test]
    async fn another_users_plan_reads_as_missing() {
        use wayfarer_core::token::generate_token_with_ttl;
        use wayfarer_db::queries::users;

        let app = spawn().await;
        let plan_id = create_plan(&app).await;

        let second_user = users::insert_user(
            &app.state.pool,
            "Second User",
            &format!("second-{}@example.com", uuid::Uuid::new_v4()),
        )
        .await
        .unwrap();
        let second_token = generate_token_with_ttl(&app.state.tokens, second_user.id, 1);

        let resp = super::super::test_helpers::request_with_token(
            &app,
            "GET",
            &format!("/api/plans/{plan_id}"),
            None,
            &second_token,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        teardown(app).await;
    }
}
