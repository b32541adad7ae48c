/// Family profile endpoints
///
/// - `GET /api/family` - The caller's household profile (404 if none yet)
/// - `PUT /api/family` - Replace the profile

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::identity::UserIdentity,
    routes::{non_blank, validate_request},
};
use axum::{extract::State, Json};
use mealplan_shared::models::family::{FamilyMember, FamilyProfile, UpsertFamilyProfile};
use serde::Deserialize;
use validator::Validate;

pub const MAX_MEMBERS: usize = 20;
const MAX_MEMBER_NAME_CHARS: usize = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct FamilyProfileRequest {
    #[validate(length(max = 100, message = "Household name must be at most 100 characters"))]
    pub household_name: Option<String>,

    #[serde(default)]
    #[validate(length(max = 20, message = "A household can have at most 20 members"))]
    pub members: Vec<FamilyMember>,

    #[serde(default)]
    pub dietary_preferences: Vec<String>,

    #[serde(default)]
    pub disliked_ingredients: Vec<String>,

    #[validate(range(min = 0, message = "Budget must not be negative"))]
    pub weekly_budget_cents: Option<i64>,
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim().to_string();
        if !item.is_empty() && !cleaned.iter().any(|c| c.eq_ignore_ascii_case(&item)) {
            cleaned.push(item);
        }
    }
    cleaned
}

/// Trims member fields and enforces the name length
fn clean_members(members: Vec<FamilyMember>) -> ApiResult<Vec<FamilyMember>> {
    if members.len() > MAX_MEMBERS {
        return Err(ApiError::invalid(
            "members",
            format!("A household can have at most {} members", MAX_MEMBERS),
        ));
    }

    members
        .into_iter()
        .enumerate()
        .map(|(i, member)| {
            let name = member.name.trim().to_string();
            let chars = name.chars().count();
            if chars == 0 || chars > MAX_MEMBER_NAME_CHARS {
                return Err(ApiError::invalid(
                    "members",
                    format!(
                        "Member {} name must be between 1 and {} characters",
                        i + 1,
                        MAX_MEMBER_NAME_CHARS
                    ),
                ));
            }
            Ok(FamilyMember {
                name,
                age: member.age,
                allergies: clean_list(member.allergies),
                dietary_restrictions: clean_list(member.dietary_restrictions),
            })
        })
        .collect()
}

pub async fn get_family(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> ApiResult<Json<FamilyProfile>> {
    let profile = FamilyProfile::find_by_user(&state.db, identity.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Family profile not found".to_string()))?;

    Ok(Json(profile))
}

/// Replace the caller's family profile
pub async fn put_family(
    State(state): State<AppState>,
    identity: UserIdentity,
    Json(req): Json<FamilyProfileRequest>,
) -> ApiResult<Json<FamilyProfile>> {
    validate_request(&req)?;

    let members = clean_members(req.members)?;

    let profile = FamilyProfile::upsert(
        &state.db,
        UpsertFamilyProfile {
            user_id: identity.user_id,
            household_name: non_blank(req.household_name),
            members,
            dietary_preferences: clean_list(req.dietary_preferences),
            disliked_ingredients: clean_list(req.disliked_ingredients),
            weekly_budget_cents: req.weekly_budget_cents,
        },
    )
    .await?;

    tracing::info!(user_id = %identity.user_id, members = profile.members.len(), "Family profile saved");

    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str) -> FamilyMember {
        FamilyMember {
            name: name.to_string(),
            age: None,
            allergies: vec![" peanuts ".to_string(), "Peanuts".to_string(), "".to_string()],
            dietary_restrictions: Vec::new(),
        }
    }

    #[test]
    fn test_clean_members() {
        let members = clean_members(vec![member("  Maya ")]).unwrap();
        assert_eq!(members[0].name, "Maya");
        assert_eq!(members[0].allergies, vec!["peanuts"]);

        assert!(clean_members(vec![member("  ")]).is_err());
        assert!(clean_members(vec![member(&"x".repeat(101))]).is_err());
        assert!(clean_members(vec![member("kid"); MAX_MEMBERS + 1]).is_err());
        assert!(clean_members(vec![member("kid"); MAX_MEMBERS]).is_ok());
    }

    #[test]
    fn test_request_validation() {
        let req: FamilyProfileRequest = serde_json::from_value(serde_json::json!({
            "household_name": "Ortiz",
            "weekly_budget_cents": -5
        }))
        .unwrap();
        assert!(validate_request(&req).is_err());
    }
}
