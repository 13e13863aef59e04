//! Prompt construction for the upstream model.
//!
//! Pure string formatting: every builder takes validated inputs and cannot
//! fail. The plan prompt pins the exact JSON shape the normalizer expects,
//! so changes here and in [`crate::normalize`] move together.

use crate::trip::TripRequest;

/// Minimal instruction used by the API-key probe.
pub const KEY_PROBE_PROMPT: &str =
    "Return a single short confirmation message: \"API key is valid\"";

/// JSON shape the plan prompt demands from the model.
const PLAN_SCHEMA_REFERENCE: &str = r#"{
  "name": "plan name",
  "schedule": [
    {
      "day": 1,
      "date": "YYYY-MM-DD",
      "activities": [
        {
          "time": "09:00-11:00",
          "activity": "activity name",
          "destination": {
            "name": "place name",
            "address": "full address",
            "description": "place description",
            "category": "category (sight/restaurant/lodging/...)"
          },
          "notes": "notes"
        }
      ],
      "accommodation": {
        "name": "lodging name",
        "address": "lodging address",
        "description": "lodging description",
        "category": "lodging"
      }
    }
  ],
  "recommendations": {
    "transportation": "transport advice",
    "dining": "dining advice",
    "tips": "travel tips"
  }
}"#;

/// Output constraints appended to the plan prompt.
const PLAN_CONSTRAINTS: &str = "Make sure that:\n\
1. The itinerary is paced realistically, accounting for distance and travel time between sights\n\
2. Breakfast, lunch and dinner recommendations are included\n\
3. Each day leaves some free time rather than being packed full\n\
4. Spending fits the budget and local price levels\n\
5. The output is strictly JSON in the shape above, with no other content\n";

/// Build the itinerary-generation prompt for a validated [`TripRequest`].
///
/// States the assistant's role, enumerates every trip parameter, pins the
/// expected JSON shape, and lists the output constraints.
pub fn build_plan_prompt(trip: &TripRequest) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(
        "As a professional AI travel planner, produce a detailed travel plan \
         from the information below.\n\n",
    );
    prompt.push_str(&format!("Destination: {}\n", trip.destination));
    prompt.push_str(&format!("Trip length: {} days\n", trip.duration));
    prompt.push_str(&format!("Budget: {}\n", trip.budget));
    prompt.push_str(&format!("Party size: {} people\n", trip.people));
    prompt.push_str(&format!(
        "Travel dates: {} to {}\n",
        trip.start_date, trip.end_date
    ));
    prompt.push_str(&format!("Preferences: {}\n\n", trip.preferences_text()));

    prompt.push_str("Output the travel plan in exactly this JSON shape:\n");
    prompt.push_str(PLAN_SCHEMA_REFERENCE);
    prompt.push_str("\n\n");
    prompt.push_str(PLAN_CONSTRAINTS);

    prompt
}

/// Build the trip-extraction prompt for free-form (voice) user text.
///
/// Instructs the model to emit the `TripRequest` field set as JSON, with
/// empty-string/zero defaults for anything it cannot extract.
pub fn build_voice_extraction_prompt(text: &str) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(
        "Analyze the following user input and extract travel-related \
         information as JSON:\n",
    );
    prompt.push_str(&format!("User input: \"\"\"{text}\"\"\"\n\n"));
    prompt.push_str(
        "Extract these fields where present:\n\
         - destination: where the user wants to go\n\
         - duration: trip length in days\n\
         - budget: budget amount\n\
         - people: party size\n\
         - preferences: travel preferences (e.g. food, shopping, culture, nature)\n\
         - startDate: start date, if one can be read from the text\n\
         - endDate: end date, if one can be read from the text\n\n",
    );
    prompt.push_str(
        "Example output:\n\
         {\n\
         \x20 \"destination\": \"Tokyo, Japan\",\n\
         \x20 \"duration\": 5,\n\
         \x20 \"budget\": 10000,\n\
         \x20 \"people\": 2,\n\
         \x20 \"preferences\": \"food and anime\",\n\
         \x20 \"startDate\": \"\",\n\
         \x20 \"endDate\": \"\"\n\
         }\n\n",
    );
    prompt.push_str(
        "Use an empty string or 0 for any field that cannot be extracted. \
         The output must be valid JSON with no other content.\n",
    );

    prompt
}

/// Build the budget-analysis prompt.
///
/// `current_items` is the caller's existing budget line items, embedded as
/// pretty-printed JSON so the model can reason about them.
pub fn build_budget_analysis_prompt(
    destination: &str,
    duration: i32,
    people: i32,
    current_items: &serde_json::Value,
) -> String {
    let items_json =
        serde_json::to_string_pretty(current_items).unwrap_or_else(|_| "[]".to_owned());

    let mut prompt = String::with_capacity(1024 + items_json.len());

    prompt.push_str(
        "As a travel budget analyst, review the travel budget below and \
         give advice.\n",
    );
    prompt.push_str(&format!("Destination: {destination}\n"));
    prompt.push_str(&format!("Trip length: {duration} days\n"));
    prompt.push_str(&format!("Party size: {people} people\n"));
    prompt.push_str(&format!("Current budget items: {items_json}\n\n"));
    prompt.push_str(
        "Provide the following analysis:\n\
         1. Whether the current allocation is reasonable\n\
         2. Budget items that appear to be missing\n\
         3. A sensible distribution across spending categories\n\
         4. Money-saving suggestions\n\n",
    );
    prompt.push_str(
        "Output as JSON:\n\
         {\n\
         \x20 \"isReasonable\": true,\n\
         \x20 \"missingItems\": [\"missing item\"],\n\
         \x20 \"recommendedDistribution\": {\n\
         \x20   \"transport\": \"30%\",\n\
         \x20   \"lodging\": \"40%\",\n\
         \x20   \"dining\": \"20%\",\n\
         \x20   \"tickets\": \"5%\",\n\
         \x20   \"shopping\": \"5%\"\n\
         \x20 },\n\
         \x20 \"moneySavingTips\": [\"tip\"]\n\
         }\n\n\
         The output must be valid JSON with no other content.\n",
    );

    prompt
}
