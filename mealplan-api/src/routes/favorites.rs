/// Favorite recipe endpoints
///
/// - `GET    /api/favorites` - Favorite recipes, newest first
/// - `POST   /api/favorites` - Add `{ "recipe_id": "..." }` (idempotent)
/// - `DELETE /api/favorites/:recipe_id` - Remove

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::identity::UserIdentity,
};
use axum::{
    extract::{Path, State},
    Json,
};
use mealplan_shared::models::{favorite::Favorite, recipe::Recipe};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AddFavoriteRequest {
    pub recipe_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub recipes: Vec<Recipe>,
}

#[derive(Debug, Serialize)]
pub struct AddFavoriteResponse {
    pub recipe_id: Uuid,

    /// `false` when the recipe was already a favorite
    pub added: bool,
}

#[derive(Debug, Serialize)]
pub struct RemoveFavoriteResponse {
    pub removed: bool,
}

pub async fn list_favorites(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> ApiResult<Json<FavoritesResponse>> {
    let recipes = Favorite::list_recipes(&state.db, identity.user_id).await?;
    Ok(Json(FavoritesResponse { recipes }))
}

/// Add a favorite
///
/// Private recipes of other users are reported as missing.
pub async fn add_favorite(
    State(state): State<AppState>,
    identity: UserIdentity,
    Json(req): Json<AddFavoriteRequest>,
) -> ApiResult<Json<AddFavoriteResponse>> {
    let visible = Recipe::find_by_id(&state.db, req.recipe_id)
        .await?
        .is_some_and(|r| r.is_visible_to(identity.user_id));
    if !visible {
        return Err(ApiError::NotFound("Recipe not found".to_string()));
    }

    let added = Favorite::add(&state.db, identity.user_id, req.recipe_id).await?;

    Ok(Json(AddFavoriteResponse {
        recipe_id: req.recipe_id,
        added,
    }))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(recipe_id): Path<Uuid>,
) -> ApiResult<Json<RemoveFavoriteResponse>> {
    let removed = Favorite::remove(&state.db, identity.user_id, recipe_id).await?;
    Ok(Json(RemoveFavoriteResponse { removed }))
}
