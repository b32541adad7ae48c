/// Recipe endpoints
///
/// - `GET    /api/recipes?q=&category=&mine=` - List visible recipes
/// - `POST   /api/recipes` - Create a recipe
/// - `GET    /api/recipes/:id` - Fetch one recipe
/// - `PUT    /api/recipes/:id` - Partial update (owner only)
/// - `DELETE /api/recipes/:id` - Delete (owner only)
/// - `POST   /api/recipes/:id/image` - Upload a photo (owner only, raw body)
///
/// A recipe is visible to its owner and, once marked public, to everyone.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::identity::UserIdentity,
    routes::{non_blank, validate_request},
};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use mealplan_shared::{
    models::{
        favorite::Favorite,
        recipe::{CreateRecipe, Ingredient, Recipe, RecipeFilter, UpdateRecipe},
    },
    storage,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_SERVINGS: i32 = 4;
const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

/// List query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListRecipesQuery {
    /// Title search
    pub q: Option<String>,

    pub category: Option<String>,

    /// Only the caller's own recipes
    #[serde(default)]
    pub mine: bool,

    pub limit: Option<i64>,
}

/// Create request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRecipeRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub ingredients: Vec<Ingredient>,

    #[serde(default)]
    pub instructions: Vec<String>,

    #[validate(range(min = 0, max = 1440, message = "Prep time must be between 0 and 1440 minutes"))]
    pub prep_minutes: Option<i32>,

    #[validate(range(min = 0, max = 1440, message = "Cook time must be between 0 and 1440 minutes"))]
    pub cook_minutes: Option<i32>,

    #[validate(range(min = 1, max = 50, message = "Servings must be between 1 and 50"))]
    pub servings: Option<i32>,

    #[validate(length(max = 50, message = "Category must be at most 50 characters"))]
    pub category: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub is_public: bool,
}

/// Partial update request; omitted fields are left unchanged
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateRecipeRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    pub ingredients: Option<Vec<Ingredient>>,

    pub instructions: Option<Vec<String>>,

    #[validate(range(min = 0, max = 1440, message = "Prep time must be between 0 and 1440 minutes"))]
    pub prep_minutes: Option<i32>,

    #[validate(range(min = 0, max = 1440, message = "Cook time must be between 0 and 1440 minutes"))]
    pub cook_minutes: Option<i32>,

    #[validate(range(min = 1, max = 50, message = "Servings must be between 1 and 50"))]
    pub servings: Option<i32>,

    #[validate(length(max = 50, message = "Category must be at most 50 characters"))]
    pub category: Option<String>,

    pub tags: Option<Vec<String>>,

    pub is_public: Option<bool>,
}

/// Recipe plus per-caller flags
#[derive(Debug, Serialize)]
pub struct RecipeView {
    #[serde(flatten)]
    pub recipe: Recipe,

    pub is_favorite: bool,
    pub is_owner: bool,
}

#[derive(Debug, Serialize)]
pub struct RecipeListResponse {
    pub recipes: Vec<RecipeView>,
}

/// Loads a recipe or fails with 404
pub(crate) async fn load_recipe(db: &PgPool, id: Uuid) -> ApiResult<Recipe> {
    Recipe::find_by_id(db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Recipe not found".to_string()))
}

/// Owner check for write operations
pub(crate) fn ensure_owner(recipe: &Recipe, user_id: Uuid) -> ApiResult<()> {
    if recipe.is_owned_by(user_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("You do not own this recipe".to_string()))
    }
}

fn ensure_visible(recipe: &Recipe, user_id: Uuid) -> ApiResult<()> {
    if recipe.is_visible_to(user_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("This recipe is private".to_string()))
    }
}

/// Trims ingredient names and rejects blank ones
fn clean_ingredients(ingredients: Vec<Ingredient>) -> ApiResult<Vec<Ingredient>> {
    ingredients
        .into_iter()
        .enumerate()
        .map(|(i, ingredient)| {
            let name = ingredient.name.trim().to_string();
            if name.is_empty() {
                return Err(ApiError::invalid(
                    "ingredients",
                    format!("Ingredient {} must have a name", i + 1),
                ));
            }
            Ok(Ingredient {
                name,
                quantity: non_blank(ingredient.quantity),
                unit: non_blank(ingredient.unit),
            })
        })
        .collect()
}

fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// List recipes visible to the caller, newest first
pub async fn list_recipes(
    State(state): State<AppState>,
    identity: UserIdentity,
    Query(query): Query<ListRecipesQuery>,
) -> ApiResult<Json<RecipeListResponse>> {
    let filter = RecipeFilter {
        query: non_blank(query.q),
        category: non_blank(query.category),
        mine_only: query.mine,
        limit: query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT),
    };

    let recipes = Recipe::list_visible(&state.db, identity.user_id, &filter).await?;
    let favorites: HashSet<Uuid> = Favorite::recipe_ids(&state.db, identity.user_id)
        .await?
        .into_iter()
        .collect();

    let recipes = recipes
        .into_iter()
        .map(|recipe| RecipeView {
            is_favorite: favorites.contains(&recipe.id),
            is_owner: recipe.is_owned_by(identity.user_id),
            recipe,
        })
        .collect();

    Ok(Json(RecipeListResponse { recipes }))
}

/// Create a recipe owned by the caller
///
/// # Errors
///
/// - `400 Bad Request`: Missing title, blank ingredient name, out-of-range numbers
pub async fn create_recipe(
    State(state): State<AppState>,
    identity: UserIdentity,
    Json(mut req): Json<CreateRecipeRequest>,
) -> ApiResult<(StatusCode, Json<Recipe>)> {
    req.title = req.title.trim().to_string();
    validate_request(&req)?;

    let ingredients = clean_ingredients(req.ingredients)?;

    let recipe = Recipe::create(
        &state.db,
        CreateRecipe {
            user_id: identity.user_id,
            title: req.title,
            description: non_blank(req.description),
            ingredients,
            instructions: clean_lines(req.instructions),
            prep_minutes: req.prep_minutes,
            cook_minutes: req.cook_minutes,
            servings: req.servings.unwrap_or(DEFAULT_SERVINGS),
            category: non_blank(req.category).map(|c| c.to_lowercase()),
            tags: clean_lines(req.tags),
            is_public: req.is_public,
        },
    )
    .await?;

    tracing::info!(recipe_id = %recipe.id, user_id = %identity.user_id, "Recipe created");

    Ok((StatusCode::CREATED, Json(recipe)))
}

/// Fetch a single recipe
///
/// # Errors
///
/// - `404 Not Found`: No such recipe
/// - `403 Forbidden`: Private recipe of another user
pub async fn get_recipe(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RecipeView>> {
    let recipe = load_recipe(&state.db, id).await?;
    ensure_visible(&recipe, identity.user_id)?;

    let is_favorite = Favorite::recipe_ids(&state.db, identity.user_id)
        .await?
        .contains(&recipe.id);

    Ok(Json(RecipeView {
        is_favorite,
        is_owner: recipe.is_owned_by(identity.user_id),
        recipe,
    }))
}

/// Partially update a recipe (owner only)
pub async fn update_recipe(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(id): Path<Uuid>,
    Json(mut req): Json<UpdateRecipeRequest>,
) -> ApiResult<Json<Recipe>> {
    req.title = req.title.map(|t| t.trim().to_string());
    validate_request(&req)?;

    let recipe = load_recipe(&state.db, id).await?;
    ensure_owner(&recipe, identity.user_id)?;

    let ingredients = req.ingredients.map(clean_ingredients).transpose()?;

    let updated = Recipe::update(
        &state.db,
        id,
        UpdateRecipe {
            title: req.title,
            description: req.description.map(|d| d.trim().to_string()),
            ingredients,
            instructions: req.instructions.map(clean_lines),
            prep_minutes: req.prep_minutes,
            cook_minutes: req.cook_minutes,
            servings: req.servings,
            category: req.category.map(|c| c.trim().to_lowercase()),
            tags: req.tags.map(clean_lines),
            is_public: req.is_public,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Recipe not found".to_string()))?;

    Ok(Json(updated))
}

/// Delete a recipe (owner only)
pub async fn delete_recipe(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let recipe = load_recipe(&state.db, id).await?;
    ensure_owner(&recipe, identity.user_id)?;

    if !Recipe::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Recipe not found".to_string()));
    }

    tracing::info!(recipe_id = %id, user_id = %identity.user_id, "Recipe deleted");

    Ok(Json(json!({ "deleted": true })))
}

/// Upload a recipe photo
///
/// The request body is the raw image; `Content-Type` must be
/// `image/jpeg`, `image/png` or `image/webp`.
///
/// # Errors
///
/// - `400 Bad Request`: Empty body or unsupported type
/// - `413 Payload Too Large`: Image over 5 MiB
/// - `503 Service Unavailable`: Storage not configured
pub async fn upload_image(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Recipe>> {
    let storage_client = state.storage()?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let extension = storage::image_extension(content_type).ok_or_else(|| {
        ApiError::BadRequest("Image must be JPEG, PNG or WebP".to_string())
    })?;

    if body.is_empty() {
        return Err(ApiError::BadRequest("Image is empty".to_string()));
    }
    if body.len() > storage::MAX_IMAGE_BYTES {
        return Err(ApiError::PayloadTooLarge(format!(
            "Image must be at most {} MB",
            storage::MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }

    let recipe = load_recipe(&state.db, id).await?;
    ensure_owner(&recipe, identity.user_id)?;

    let path = storage::recipe_image_path(identity.user_id, id, extension);
    let url = storage_client.upload(&path, body, content_type).await?;

    let updated = Recipe::set_image_url(&state.db, id, &url)
        .await?
        .ok_or_else(|| ApiError::NotFound("Recipe not found".to_string()))?;

    tracing::info!(recipe_id = %id, path = %path, "Recipe image uploaded");

    Ok(Json(updated))
}
