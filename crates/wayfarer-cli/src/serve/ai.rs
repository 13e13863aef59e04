//! AI endpoints: plan generation, key validation, and the two direct-text
//! helpers (voice extraction and budget analysis).
//!
//! Handlers resolve the caller's stored API key and pass it into the
//! upstream call explicitly; no upstream request is made without one.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use wayfarer_core::normalize;
use wayfarer_core::prompt;
use wayfarer_core::trip::TripRequest;
use wayfarer_core::upstream::{GenerationParams, UpstreamError};
use wayfarer_db::queries::users;

use super::{ApiError, AppState, CurrentUser, parse_body};

/// Fetch the caller's stored DashScope key, or the error that explains why
/// the AI endpoints are unavailable to them.
async fn stored_key(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    users::get_dashscope_key(&state.pool, user_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User not found"))?
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ApiError::forbidden("Please configure your DashScope API key first"))
}

// ---------------------------------------------------------------------------
// generate-plan
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratePlanBody {
    destination: Option<String>,
    duration: Option<i32>,
    budget: Option<f64>,
    people: Option<i32>,
    preferences: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

pub async fn generate_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let body: GeneratePlanBody = parse_body(body)?;

    let (
        Some(destination),
        Some(duration),
        Some(budget),
        Some(people),
        Some(start_date),
        Some(end_date),
    ) = (
        body.destination,
        body.duration,
        body.budget,
        body.people,
        body.start_date,
        body.end_date,
    )
    else {
        return Err(ApiError::bad_request(
            "Please fill in all required fields: destination, duration, budget, people, \
             startDate, endDate",
        ));
    };

    let trip = TripRequest {
        destination,
        duration,
        budget,
        people,
        preferences: body.preferences,
        start_date,
        end_date,
    };
    trip.validate()
        .map_err(|err| ApiError::bad_request(err.to_string()))?;

    let api_key = stored_key(&state, user.id).await?;
    let generation_prompt = prompt::build_plan_prompt(&trip);

    let envelope = state
        .generator
        .generate(&api_key, &generation_prompt, GenerationParams::PLAN)
        .await
        .map_err(|err| generation_failure(&state, err))?;

    let plan = normalize::normalize_response(&envelope, &trip, user.id).map_err(|err| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "The AI response could not be turned into a plan",
        )
        .with_discriminator(err.discriminator())
        .with_dev_details(state.environment, json!(err.to_string()))
    })?;

    Ok(Json(json!({ "success": true, "plan": plan })).into_response())
}

/// Map an upstream failure on the generation path. A 401 from upstream means
/// the stored key is bad; everything else is a generic server-side failure.
fn generation_failure(state: &AppState, err: UpstreamError) -> ApiError {
    if err.http_status() == Some(401) {
        return ApiError::unauthorized("DashScope rejected the stored API key; please update it");
    }
    tracing::error!(error = %err, "plan generation upstream call failed");
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to generate travel plan",
    )
    .with_dev_details(state.environment, json!(err.to_string()))
}

// ---------------------------------------------------------------------------
// validate-api-key
// ---------------------------------------------------------------------------

pub async fn validate_api_key(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, ApiError> {
    let api_key = stored_key(&state, user.id).await?;

    state
        .generator
        .generate(&api_key, prompt::KEY_PROBE_PROMPT, GenerationParams::KEY_PROBE)
        .await
        .map_err(probe_failure)?;

    Ok(Json(json!({
        "success": true,
        "message": "API key is valid",
    }))
    .into_response())
}

/// Map a probe failure: mirror the upstream HTTP status with a readable
/// message, falling back to 401 for network-level failures.
fn probe_failure(err: UpstreamError) -> ApiError {
    match err {
        UpstreamError::Status { status: 401, .. } => {
            ApiError::unauthorized("API key is invalid or expired")
        }
        UpstreamError::Status { status: 429, .. } => ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limited by DashScope; try again later",
        ),
        UpstreamError::Status { status: 404, .. } => ApiError::not_found(
            "DashScope endpoint not found; check the upstream base URL",
        ),
        UpstreamError::Status { status: 500, .. } => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "DashScope returned a server error",
        ),
        UpstreamError::Status { status, .. } => ApiError::new(
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            format!("DashScope returned HTTP {status}"),
        ),
        UpstreamError::Timeout | UpstreamError::Connect | UpstreamError::Transport(_) => {
            ApiError::unauthorized("Could not reach DashScope; check your network and key")
        }
    }
}

// ---------------------------------------------------------------------------
// process-voice / analyze-budget
// ---------------------------------------------------------------------------

/// Both helper endpoints read only the direct `output.text` payload; there
/// is no multi-path extraction here.
fn direct_payload(
    state: &AppState,
    envelope: &Value,
    failure_message: &'static str,
) -> Result<Value, ApiError> {
    let text = envelope
        .pointer("/output/text")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, failure_message)
        })?;

    let cleaned = normalize::clean_payload(text);
    serde_json::from_str(&cleaned).map_err(|err| {
        tracing::warn!(error = %err, "helper endpoint payload did not parse as JSON");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, failure_message)
            .with_dev_details(state.environment, json!(err.to_string()))
    })
}

#[derive(Deserialize)]
struct ProcessVoiceBody {
    text: Option<String>,
}

pub async fn process_voice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let body: ProcessVoiceBody = parse_body(body)?;
    let text = body
        .text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| ApiError::bad_request("Text is required"))?;

    let api_key = stored_key(&state, user.id).await?;
    let extraction_prompt = prompt::build_voice_extraction_prompt(text);

    let envelope = state
        .generator
        .generate(
            &api_key,
            &extraction_prompt,
            GenerationParams::VOICE_EXTRACTION,
        )
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "voice extraction upstream call failed");
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process voice input",
            )
            .with_dev_details(state.environment, json!(err.to_string()))
        })?;

    let data = direct_payload(&state, &envelope, "Failed to process voice input")?;

    Ok(Json(json!({ "success": true, "data": data })).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBudgetBody {
    destination: Option<String>,
    duration: Option<i32>,
    people: Option<i32>,
    current_items: Option<Value>,
}

pub async fn analyze_budget(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let body: AnalyzeBudgetBody = parse_body(body)?;

    let (Some(destination), Some(duration), Some(people)) =
        (body.destination, body.duration, body.people)
    else {
        return Err(ApiError::bad_request(
            "Please fill in all required fields: destination, duration, people",
        ));
    };
    let current_items = body.current_items.unwrap_or_else(|| json!([]));

    let api_key = stored_key(&state, user.id).await?;
    let analysis_prompt =
        prompt::build_budget_analysis_prompt(&destination, duration, people, &current_items);

    let envelope = state
        .generator
        .generate(&api_key, &analysis_prompt, GenerationParams::BUDGET_ANALYSIS)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "budget analysis upstream call failed");
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to analyze budget",
            )
            .with_dev_details(state.environment, json!(err.to_string()))
        })?;

    let analysis = direct_payload(&state, &envelope, "Failed to analyze budget")?;

    Ok(Json(json!({ "success": true, "analysis": analysis })).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use wayfarer_db::queries::users;
    use wayfarer_test_utils::StubGenerator;

    use super::super::test_helpers::{TestApp, body_json, request, spawn, spawn_with, teardown};

    async fn store_key(app: &TestApp) {
        users::set_dashscope_key(&app.state.pool, app.user.id, "sk-test-key")
            .await
            .unwrap();
    }

    fn trip_body() -> serde_json::Value {
        json!({
            "destination": "Tokyo",
            "duration": 3,
            "budget": 6000.0,
            "people": 2,
            "startDate": "2024-04-01",
            "endDate": "2024-04-03",
        })
    }

    #[tokio::test]
    async fn generate_plan_happy_path() {
        let plan_text = r#"```json
{"name": "Tokyo Express", "budget": 1.0,
 "schedule": [{"day": 1, "date": "2024-04-01", "activities": []}]}
```"#;
        let app = spawn_with(StubGenerator::with_text(plan_text)).await;
        store_key(&app).await;

        let resp = request(&app, "POST", "/api/ai/generate-plan", Some(trip_body())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["plan"]["name"], "Tokyo Express");
        // caller values overwrite whatever the model produced
        assert_eq!(json["plan"]["budget"], 6000.0);
        assert_eq!(json["plan"]["user"], app.user.id.to_string());
        assert_eq!(app.generator.call_count(), 1);

        teardown(app).await;
    }

    #[tokio::test]
    async fn generate_plan_requires_all_fields() {
        let app = spawn().await;
        store_key(&app).await;

        let resp = request(
            &app,
            "POST",
            "/api/ai/generate-plan",
            Some(json!({"destination": "Tokyo"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.generator.call_count(), 0);

        teardown(app).await;
    }

    #[tokio::test]
    async fn generate_plan_without_stored_key_is_403_and_no_upstream_call() {
        let app = spawn().await;

        let resp = request(&app, "POST", "/api/ai/generate-plan", Some(trip_body())).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let json = body_json(resp).await;
        assert_eq!(json["success"], false);
        assert_eq!(app.generator.call_count(), 0);

        teardown(app).await;
    }

    #[tokio::test]
    async fn generate_plan_upstream_401_maps_to_401() {
        let app = spawn_with(StubGenerator::with_error(
            wayfarer_core::upstream::UpstreamError::Status {
                status: 401,
                body: "invalid key".to_owned(),
            },
        ))
        .await;
        store_key(&app).await;

        let resp = request(&app, "POST", "/api/ai/generate-plan", Some(trip_body())).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        teardown(app).await;
    }

    #[tokio::test]
    async fn generate_plan_unparseable_output_is_500_with_discriminator() {
        let app = spawn_with(StubGenerator::with_text("sorry, I cannot help with that")).await;
        store_key(&app).await;

        let resp = request(&app, "POST", "/api/ai/generate-plan", Some(trip_body())).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "InvalidJSONFormat");

        teardown(app).await;
    }

    #[tokio::test]
    async fn generate_plan_empty_output_is_500_empty_discriminator() {
        let app = spawn_with(StubGenerator::with_envelope(json!({}))).await;
        store_key(&app).await;

        let resp = request(&app, "POST", "/api/ai/generate-plan", Some(trip_body())).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "EmptyAIResponse");

        teardown(app).await;
    }

    #[tokio::test]
    async fn validate_api_key_success() {
        let app = spawn_with(StubGenerator::with_text("pong")).await;
        store_key(&app).await;

        let resp = request(&app, "POST", "/api/ai/validate-api-key", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);

        teardown(app).await;
    }

    #[tokio::test]
    async fn validate_api_key_mirrors_upstream_status() {
        for (upstream_status, expected) in [
            (401u16, StatusCode::UNAUTHORIZED),
            (429, StatusCode::TOO_MANY_REQUESTS),
            (404, StatusCode::NOT_FOUND),
            (500, StatusCode::INTERNAL_SERVER_ERROR),
        ] {
            let app = spawn_with(StubGenerator::with_error(
                wayfarer_core::upstream::UpstreamError::Status {
                    status: upstream_status,
                    body: String::new(),
                },
            ))
            .await;
            store_key(&app).await;

            let resp = request(&app, "POST", "/api/ai/validate-api-key", None).await;
            assert_eq!(
                resp.status(),
                expected,
                "upstream {upstream_status} should map to {expected}"
            );

            teardown(app).await;
        }
    }

    #[tokio::test]
    async fn validate_api_key_network_failure_falls_back_to_401() {
        let app = spawn_with(StubGenerator::with_error(
            wayfarer_core::upstream::UpstreamError::Connect,
        ))
        .await;
        store_key(&app).await;

        let resp = request(&app, "POST", "/api/ai/validate-api-key", None).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        teardown(app).await;
    }

    #[tokio::test]
    async fn process_voice_parses_direct_output_text() {
        let app = spawn_with(StubGenerator::with_text(
            r#"{"destination": "Osaka", "duration": 2, "budget": 3000, "people": 1,
                "preferences": "food", "startDate": "", "endDate": ""}"#,
        ))
        .await;
        store_key(&app).await;

        let resp = request(
            &app,
            "POST",
            "/api/ai/process-voice",
            Some(json!({"text": "two days of eating in Osaka, around 3000"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["data"]["destination"], "Osaka");
        assert_eq!(json["data"]["duration"], 2);

        teardown(app).await;
    }

    #[tokio::test]
    async fn process_voice_requires_text() {
        let app = spawn().await;
        store_key(&app).await;

        let resp = request(&app, "POST", "/api/ai/process-voice", Some(json!({}))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.generator.call_count(), 0);

        teardown(app).await;
    }

    #[tokio::test]
    async fn process_voice_unparseable_output_is_500() {
        let app = spawn_with(StubGenerator::with_text("I could not understand that")).await;
        store_key(&app).await;

        let resp = request(
            &app,
            "POST",
            "/api/ai/process-voice",
            Some(json!({"text": "mumble"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["success"], false);

        teardown(app).await;
    }

    #[tokio::test]
    async fn analyze_budget_happy_path() {
        let app = spawn_with(StubGenerator::with_text(
            r#"{"isReasonable": true, "missingItems": [], "moneySavingTips": ["cook"]}"#,
        ))
        .await;
        store_key(&app).await;

        let resp = request(
            &app,
            "POST",
            "/api/ai/analyze-budget",
            Some(json!({
                "destination": "Kyoto",
                "duration": 4,
                "people": 2,
                "currentItems": [{"name": "Hotel", "amount": 800}],
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["analysis"]["isReasonable"], true);

        teardown(app).await;
    }

    #[tokio::test]
    async fn analyze_budget_requires_fields() {
        let app = spawn().await;
        store_key(&app).await;

        let resp = request(
            &app,
            "POST",
            "/api/ai/analyze-budget",
            Some(json!({"destination": "Kyoto"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.generator.call_count(), 0);

        teardown(app).await;
    }
}
