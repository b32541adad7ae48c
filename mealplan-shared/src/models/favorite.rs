/// Favorite recipes
///
/// ```sql
/// CREATE TABLE favorites (
///     user_id UUID NOT NULL,
///     recipe_id UUID NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (user_id, recipe_id)
/// );
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use super::recipe::Recipe;

/// Namespace for favorite operations
pub struct Favorite;

impl Favorite {
    /// Marks a recipe as favorite; adding twice is a no-op
    ///
    /// Returns `true` when a new row was inserted.
    pub async fn add(pool: &PgPool, user_id: Uuid, recipe_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO favorites (user_id, recipe_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, recipe_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes a favorite
    pub async fn remove(pool: &PgPool, user_id: Uuid, recipe_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
            .bind(user_id)
            .bind(recipe_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Favorite recipes of a user, most recently favorited first
    ///
    /// Recipes that became private to someone else are skipped.
    pub async fn list_recipes(pool: &PgPool, user_id: Uuid) -> Result<Vec<Recipe>, sqlx::Error> {
        sqlx::query_as::<_, Recipe>(
            r#"
            SELECT r.id, r.user_id, r.title, r.description, r.ingredients, r.instructions,
                   r.prep_minutes, r.cook_minutes, r.servings, r.category, r.tags, r.image_url,
                   r.is_public, r.created_at, r.updated_at
            FROM favorites f
            JOIN recipes r ON r.id = f.recipe_id
            WHERE f.user_id = $1
              AND (r.user_id = $1 OR r.is_public)
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// IDs of the user's favorite recipes
    pub async fn recipe_ids(pool: &PgPool, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT recipe_id FROM favorites WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
