/// Household profile
///
/// One row per user describing who eats at the table. The profile feeds the
/// cooking assistant so suggestions respect allergies and preferences.
///
/// ```sql
/// CREATE TABLE family_profiles (
///     user_id UUID PRIMARY KEY,
///     household_name VARCHAR(100),
///     members JSONB NOT NULL DEFAULT '[]',
///     dietary_preferences TEXT[] NOT NULL DEFAULT '{}',
///     disliked_ingredients TEXT[] NOT NULL DEFAULT '{}',
///     weekly_budget_cents BIGINT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use std::fmt::Write as _;
use uuid::Uuid;

/// Person in the household
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,

    #[serde(default)]
    pub allergies: Vec<String>,

    /// e.g. "vegetarian", "halal", "low sodium"
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
}

/// Family profile row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FamilyProfile {
    pub user_id: Uuid,
    pub household_name: Option<String>,
    pub members: Json<Vec<FamilyMember>>,
    pub dietary_preferences: Vec<String>,
    pub disliked_ingredients: Vec<String>,
    pub weekly_budget_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full replacement of a profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertFamilyProfile {
    pub user_id: Uuid,
    pub household_name: Option<String>,
    pub members: Vec<FamilyMember>,
    pub dietary_preferences: Vec<String>,
    pub disliked_ingredients: Vec<String>,
    pub weekly_budget_cents: Option<i64>,
}

impl FamilyProfile {
    /// Finds the profile of a user
    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, FamilyProfile>(
            r#"
            SELECT user_id, household_name, members, dietary_preferences,
                   disliked_ingredients, weekly_budget_cents, created_at, updated_at
            FROM family_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Creates or replaces the profile of a user
    pub async fn upsert(pool: &PgPool, data: UpsertFamilyProfile) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, FamilyProfile>(
            r#"
            INSERT INTO family_profiles (user_id, household_name, members, dietary_preferences,
                                         disliked_ingredients, weekly_budget_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                household_name = EXCLUDED.household_name,
                members = EXCLUDED.members,
                dietary_preferences = EXCLUDED.dietary_preferences,
                disliked_ingredients = EXCLUDED.disliked_ingredients,
                weekly_budget_cents = EXCLUDED.weekly_budget_cents,
                updated_at = NOW()
            RETURNING user_id, household_name, members, dietary_preferences,
                      disliked_ingredients, weekly_budget_cents, created_at, updated_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.household_name)
        .bind(Json(data.members))
        .bind(data.dietary_preferences)
        .bind(data.disliked_ingredients)
        .bind(data.weekly_budget_cents)
        .fetch_one(pool)
        .await
    }

    /// Plain-text summary handed to the cooking assistant
    ///
    /// Returns `None` when the profile holds nothing worth mentioning.
    pub fn assistant_context(&self) -> Option<String> {
        let mut out = String::new();

        if let Some(name) = self.household_name.as_deref().filter(|n| !n.trim().is_empty()) {
            let _ = writeln!(out, "Household: {}", name.trim());
        }

        if !self.members.is_empty() {
            let _ = writeln!(out, "Family members ({}):", self.members.len());
            for member in self.members.iter() {
                let mut line = format!("- {}", member.name);
                if let Some(age) = member.age {
                    let _ = write!(line, ", age {}", age);
                }
                if !member.allergies.is_empty() {
                    let _ = write!(line, "; allergies: {}", member.allergies.join(", "));
                }
                if !member.dietary_restrictions.is_empty() {
                    let _ = write!(line, "; diet: {}", member.dietary_restrictions.join(", "));
                }
                let _ = writeln!(out, "{}", line);
            }
        }

        if !self.dietary_preferences.is_empty() {
            let _ = writeln!(out, "Preferences: {}", self.dietary_preferences.join(", "));
        }

        if !self.disliked_ingredients.is_empty() {
            let _ = writeln!(out, "Avoid: {}", self.disliked_ingredients.join(", "));
        }

        if let Some(cents) = self.weekly_budget_cents {
            let _ = writeln!(out, "Weekly grocery budget: ${}.{:02}", cents / 100, cents % 100);
        }

        if out.is_empty() {
            None
        } else {
            Some(out.trim_end().to_string())
        }
    }
}
