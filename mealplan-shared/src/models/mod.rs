/// Database models
///
/// Each model owns its SQL. Rows are always scoped by the caller's user ID
/// (an authenticated Supabase user or an anonymous browser ID).
///
/// # Models
///
/// - `recipe`: Recipes with ingredients and instructions
/// - `favorite`: A user's favorite recipes
/// - `meal_plan`: Weekly meal calendar slots
/// - `family`: Household profile used to personalise the assistant
/// - `subscription`: Stripe subscription state per user

pub mod family;
pub mod favorite;
pub mod meal_plan;
pub mod recipe;
pub mod subscription;

/// Escapes `%`, `_` and `\` so user input can be embedded in an `ILIKE` pattern
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
