/// Meal plan endpoints
///
/// - `GET    /api/meal-plan?week_start=YYYY-MM-DD` - Seven days of slots
/// - `PUT    /api/meal-plan` - Place a meal into a slot
/// - `DELETE /api/meal-plan/:slot_id` - Remove one slot
/// - `DELETE /api/meal-plan?week_start=YYYY-MM-DD` - Clear a week
///
/// Without `week_start` the current week (Monday, UTC) is used.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::identity::UserIdentity,
    routes::{non_blank, validate_request},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use mealplan_shared::models::{
    meal_plan::{group_week, week_end, week_start_of, DayPlan, MealPlanSlot, MealType, UpsertSlot},
    recipe::Recipe,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    pub week_start: Option<NaiveDate>,
}

impl WeekQuery {
    fn start(&self) -> NaiveDate {
        self.week_start
            .unwrap_or_else(|| week_start_of(Utc::now().date_naive()))
    }

    /// First and last day of the requested week
    fn range(&self) -> ApiResult<(NaiveDate, NaiveDate)> {
        let start = self.start();
        let end = week_end(start)
            .ok_or_else(|| ApiError::invalid("week_start", "Week start is out of range"))?;
        Ok((start, end))
    }
}

#[derive(Debug, Serialize)]
pub struct WeekResponse {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub days: Vec<DayPlan>,
}

/// Slot upsert request; exactly one of `recipe_id` / `custom_title`
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertSlotRequest {
    pub plan_date: NaiveDate,

    pub meal_type: String,

    pub recipe_id: Option<Uuid>,

    #[validate(length(max = 200, message = "Custom title must be at most 200 characters"))]
    pub custom_title: Option<String>,

    #[validate(range(min = 1, max = 50, message = "Servings must be between 1 and 50"))]
    pub servings: Option<i32>,

    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

/// Week view of the caller's plan
pub async fn get_week(
    State(state): State<AppState>,
    identity: UserIdentity,
    Query(query): Query<WeekQuery>,
) -> ApiResult<Json<WeekResponse>> {
    let (start, end) = query.range()?;

    let slots = MealPlanSlot::list_range(&state.db, identity.user_id, start, end).await?;

    Ok(Json(WeekResponse {
        week_start: start,
        week_end: end,
        days: group_week(start, slots),
    }))
}

/// Place a recipe or a free-text meal into a slot, replacing what was there
///
/// # Errors
///
/// - `400 Bad Request`: Unknown meal type, neither or both of recipe/custom title
/// - `404 Not Found`: Recipe missing or private to another user
pub async fn upsert_slot(
    State(state): State<AppState>,
    identity: UserIdentity,
    Json(req): Json<UpsertSlotRequest>,
) -> ApiResult<Json<MealPlanSlot>> {
    validate_request(&req)?;

    let meal_type = MealType::parse(req.meal_type.trim()).ok_or_else(|| {
        ApiError::invalid(
            "meal_type",
            "Meal type must be breakfast, lunch, dinner or snack",
        )
    })?;

    let custom_title = non_blank(req.custom_title);

    match (req.recipe_id, &custom_title) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "Provide either recipe_id or custom_title, not both".to_string(),
            ))
        }
        (None, None) => {
            return Err(ApiError::BadRequest(
                "A recipe_id or custom_title is required".to_string(),
            ))
        }
        _ => {}
    }

    if let Some(recipe_id) = req.recipe_id {
        let visible = Recipe::find_by_id(&state.db, recipe_id)
            .await?
            .is_some_and(|r| r.is_visible_to(identity.user_id));
        if !visible {
            return Err(ApiError::NotFound("Recipe not found".to_string()));
        }
    }

    let slot = MealPlanSlot::upsert(
        &state.db,
        UpsertSlot {
            user_id: identity.user_id,
            plan_date: req.plan_date,
            meal_type,
            recipe_id: req.recipe_id,
            custom_title,
            servings: req.servings,
            notes: non_blank(req.notes),
        },
    )
    .await?;

    tracing::debug!(
        slot_id = %slot.id,
        plan_date = %slot.plan_date,
        meal_type = meal_type.as_str(),
        "Meal plan slot saved"
    );

    Ok(Json(slot))
}

/// Remove one slot
pub async fn delete_slot(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(slot_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let slot = MealPlanSlot::find_by_id(&state.db, slot_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Meal plan slot not found".to_string()))?;

    if slot.user_id != identity.user_id {
        return Err(ApiError::Forbidden("You do not own this meal plan slot".to_string()));
    }

    MealPlanSlot::delete(&state.db, slot_id).await?;

    Ok(Json(json!({ "deleted": true })))
}

/// Clear every slot of a week
pub async fn clear_week(
    State(state): State<AppState>,
    identity: UserIdentity,
    Query(query): Query<WeekQuery>,
) -> ApiResult<Json<Value>> {
    let (start, end) = query.range()?;
    let cleared = MealPlanSlot::clear_range(&state.db, identity.user_id, start, end).await?;

    tracing::info!(user_id = %identity.user_id, week_start = %start, cleared, "Meal plan week cleared");

    Ok(Json(json!({ "cleared": cleared })))
}
