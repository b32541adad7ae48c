/// Weekly meal calendar
///
/// A meal plan is a set of slots, one per `(user, date, meal type)`. A slot
/// points at a recipe or carries a free-text title ("Leftovers", "Pizza night").
///
/// # Schema
///
/// ```sql
/// CREATE TABLE meal_plan_slots (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL,
///     plan_date DATE NOT NULL,
///     meal_type VARCHAR(20) NOT NULL,
///     recipe_id UUID REFERENCES recipes(id) ON DELETE SET NULL,
///     custom_title VARCHAR(200),
///     servings INTEGER,
///     notes TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (user_id, plan_date, meal_type)
/// );
/// ```

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Number of days shown in a plan view
pub const DAYS_PER_WEEK: u64 = 7;

/// Meal of the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    /// Database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }

    /// Parses the database representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "breakfast" => Some(MealType::Breakfast),
            "lunch" => Some(MealType::Lunch),
            "dinner" => Some(MealType::Dinner),
            "snack" => Some(MealType::Snack),
            _ => None,
        }
    }
}

/// One planned meal
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MealPlanSlot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_date: NaiveDate,
    pub meal_type: String,
    pub recipe_id: Option<Uuid>,
    pub custom_title: Option<String>,
    pub servings: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for placing a meal into a slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertSlot {
    pub user_id: Uuid,
    pub plan_date: NaiveDate,
    pub meal_type: MealType,
    pub recipe_id: Option<Uuid>,
    pub custom_title: Option<String>,
    pub servings: Option<i32>,
    pub notes: Option<String>,
}

/// Slots of a single calendar day
#[derive(Debug, Clone, Serialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub slots: Vec<MealPlanSlot>,
}

/// Monday of the week containing `date`
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date - Days::new(offset)
}

/// Last day of the 7-day window starting at `start`
///
/// `None` when the window would run past the last representable date.
pub fn week_end(start: NaiveDate) -> Option<NaiveDate> {
    start.checked_add_days(Days::new(DAYS_PER_WEEK - 1))
}

/// Groups slots into seven days starting at `start`
///
/// The window is cut short only at the end of the representable calendar.
/// Slots outside the window are dropped; within a day slots are ordered
/// breakfast, lunch, dinner, snack.
pub fn group_week(start: NaiveDate, slots: Vec<MealPlanSlot>) -> Vec<DayPlan> {
    let mut days: Vec<DayPlan> = (0..DAYS_PER_WEEK)
        .map_while(|offset| start.checked_add_days(Days::new(offset)))
        .map(|date| DayPlan {
            date,
            slots: Vec::new(),
        })
        .collect();

    for slot in slots {
        let offset = (slot.plan_date - start).num_days();
        if (0..days.len() as i64).contains(&offset) {
            days[offset as usize].slots.push(slot);
        }
    }

    for day in &mut days {
        day.slots
            .sort_by_key(|slot| MealType::parse(&slot.meal_type));
    }

    days
}

impl MealPlanSlot {
    /// Parsed meal type
    pub fn meal_type(&self) -> Option<MealType> {
        MealType::parse(&self.meal_type)
    }

    /// Places a meal into its slot, replacing whatever was planned there
    pub async fn upsert(pool: &PgPool, data: UpsertSlot) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, MealPlanSlot>(
            r#"
            INSERT INTO meal_plan_slots (user_id, plan_date, meal_type, recipe_id,
                                         custom_title, servings, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, plan_date, meal_type) DO UPDATE SET
                recipe_id = EXCLUDED.recipe_id,
                custom_title = EXCLUDED.custom_title,
                servings = EXCLUDED.servings,
                notes = EXCLUDED.notes,
                updated_at = NOW()
            RETURNING id, user_id, plan_date, meal_type, recipe_id, custom_title,
                      servings, notes, created_at, updated_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.plan_date)
        .bind(data.meal_type.as_str())
        .bind(data.recipe_id)
        .bind(data.custom_title)
        .bind(data.servings)
        .bind(data.notes)
        .fetch_one(pool)
        .await
    }

    /// Finds a slot by ID regardless of owner
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MealPlanSlot>(
            r#"
            SELECT id, user_id, plan_date, meal_type, recipe_id, custom_title,
                   servings, notes, created_at, updated_at
            FROM meal_plan_slots
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Slots of a user between `from` and `to` (inclusive)
    pub async fn list_range(
        pool: &PgPool,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MealPlanSlot>(
            r#"
            SELECT id, user_id, plan_date, meal_type, recipe_id, custom_title,
                   servings, notes, created_at, updated_at
            FROM meal_plan_slots
            WHERE user_id = $1 AND plan_date BETWEEN $2 AND $3
            ORDER BY plan_date
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
    }

    /// Deletes a slot
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM meal_plan_slots WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes every slot of a user between `from` and `to` (inclusive)
    pub async fn clear_range(
        pool: &PgPool,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM meal_plan_slots WHERE user_id = $1 AND plan_date BETWEEN $2 AND $3",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
