/// Recipe model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE recipes (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL,
///     title VARCHAR(200) NOT NULL,
///     description TEXT,
///     ingredients JSONB NOT NULL DEFAULT '[]',
///     instructions TEXT[] NOT NULL DEFAULT '{}',
///     prep_minutes INTEGER,
///     cook_minutes INTEGER,
///     servings INTEGER NOT NULL DEFAULT 4,
///     category VARCHAR(50),
///     tags TEXT[] NOT NULL DEFAULT '{}',
///     image_url TEXT,
///     is_public BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Visibility
///
/// A recipe is visible to its owner and, when `is_public`, to everyone.
/// Only the owner may modify or delete it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::escape_like;

const RECIPE_COLUMNS: &str = "id, user_id, title, description, ingredients, instructions, \
     prep_minutes, cook_minutes, servings, category, tags, image_url, is_public, \
     created_at, updated_at";

/// Single ingredient line of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Ingredient name (e.g. "basmati rice")
    pub name: String,

    /// Free-form amount (e.g. "2", "1/2")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,

    /// Unit of the amount (e.g. "cups")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Recipe row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipe {
    pub id: Uuid,

    /// Owner (authenticated or anonymous user ID)
    pub user_id: Uuid,

    pub title: String,

    pub description: Option<String>,

    pub ingredients: Json<Vec<Ingredient>>,

    /// Ordered preparation steps
    pub instructions: Vec<String>,

    pub prep_minutes: Option<i32>,

    pub cook_minutes: Option<i32>,

    pub servings: i32,

    /// Category such as "dinner" or "dessert"
    pub category: Option<String>,

    pub tags: Vec<String>,

    /// Public URL of the uploaded photo
    pub image_url: Option<String>,

    pub is_public: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipe {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<String>,
    pub prep_minutes: Option<i32>,
    pub cook_minutes: Option<i32>,
    pub servings: i32,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub is_public: bool,
}

/// Partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRecipe {
    pub title: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<Ingredient>>,
    pub instructions: Option<Vec<String>>,
    pub prep_minutes: Option<i32>,
    pub cook_minutes: Option<i32>,
    pub servings: Option<i32>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

/// Listing filter
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    /// Case-insensitive substring of the title
    pub query: Option<String>,

    /// Exact category match
    pub category: Option<String>,

    /// Only the caller's own recipes
    pub mine_only: bool,

    /// Maximum rows returned
    pub limit: i64,
}

impl Recipe {
    /// Whether `user_id` owns this recipe
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Whether `user_id` may read this recipe
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.is_public || self.is_owned_by(user_id)
    }

    /// Inserts a new recipe
    pub async fn create(pool: &PgPool, data: CreateRecipe) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO recipes (user_id, title, description, ingredients, instructions,
                                 prep_minutes, cook_minutes, servings, category, tags, is_public)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {RECIPE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Recipe>(&query)
            .bind(data.user_id)
            .bind(data.title)
            .bind(data.description)
            .bind(Json(data.ingredients))
            .bind(data.instructions)
            .bind(data.prep_minutes)
            .bind(data.cook_minutes)
            .bind(data.servings)
            .bind(data.category)
            .bind(data.tags)
            .bind(data.is_public)
            .fetch_one(pool)
            .await
    }

    /// Finds a recipe by ID regardless of owner
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1");

        sqlx::query_as::<_, Recipe>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists recipes visible to `user_id`, newest first
    pub async fn list_visible(
        pool: &PgPool,
        user_id: Uuid,
        filter: &RecipeFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {RECIPE_COLUMNS}
            FROM recipes
            WHERE (user_id = $1 OR (is_public AND NOT $2))
              AND ($3::TEXT IS NULL OR title ILIKE '%' || $3 || '%')
              AND ($4::TEXT IS NULL OR category = $4)
            ORDER BY created_at DESC
            LIMIT $5
            "#
        );

        sqlx::query_as::<_, Recipe>(&query)
            .bind(user_id)
            .bind(filter.mine_only)
            .bind(filter.query.as_deref().map(escape_like))
            .bind(filter.category.as_deref())
            .bind(filter.limit)
            .fetch_all(pool)
            .await
    }

    /// Applies a partial update
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateRecipe,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE recipes SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                ingredients = COALESCE($4, ingredients),
                instructions = COALESCE($5, instructions),
                prep_minutes = COALESCE($6, prep_minutes),
                cook_minutes = COALESCE($7, cook_minutes),
                servings = COALESCE($8, servings),
                category = COALESCE($9, category),
                tags = COALESCE($10, tags),
                is_public = COALESCE($11, is_public),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {RECIPE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Recipe>(&query)
            .bind(id)
            .bind(data.title)
            .bind(data.description)
            .bind(data.ingredients.map(Json))
            .bind(data.instructions)
            .bind(data.prep_minutes)
            .bind(data.cook_minutes)
            .bind(data.servings)
            .bind(data.category)
            .bind(data.tags)
            .bind(data.is_public)
            .fetch_optional(pool)
            .await
    }

    /// Stores the public URL of an uploaded photo
    pub async fn set_image_url(
        pool: &PgPool,
        id: Uuid,
        image_url: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE recipes SET image_url = $2, updated_at = NOW() WHERE id = $1 RETURNING {RECIPE_COLUMNS}"
        );

        sqlx::query_as::<_, Recipe>(&query)
            .bind(id)
            .bind(image_url)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a recipe; favorites cascade, meal plan slots keep their date with no recipe
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(owner: Uuid, is_public: bool) -> Recipe {
        Recipe {
            id: Uuid::new_v4(),
            user_id: owner,
            title: "Lentil soup".to_string(),
            description: None,
            ingredients: Json(vec![Ingredient {
                name: "red lentils".to_string(),
                quantity: Some("1".to_string()),
                unit: Some("cup".to_string()),
            }]),
            instructions: vec!["Simmer everything".to_string()],
            prep_minutes: Some(10),
            cook_minutes: Some(30),
            servings: 4,
            category: Some("dinner".to_string()),
            tags: vec![],
            image_url: None,
            is_public,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_private_recipe_visibility() {
        let owner = Uuid::new_v4();
        let recipe = sample(owner, false);

        assert!(recipe.is_visible_to(owner));
        assert!(!recipe.is_visible_to(Uuid::new_v4()));
    }

    #[test]
    fn test_public_recipe_visible_but_not_owned() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let recipe = sample(owner, true);

        assert!(recipe.is_visible_to(other));
        assert!(!recipe.is_owned_by(other));
    }

    #[test]
    fn test_ingredients_serialize_as_plain_array() {
        let recipe = sample(Uuid::new_v4(), false);
        let value = serde_json::to_value(&recipe).unwrap();

        assert_eq!(value["ingredients"][0]["name"], "red lentils");
        assert!(value["ingredients"][0].get("unit").is_some());
    }
}
