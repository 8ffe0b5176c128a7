use serde::Deserialize;
use serde_json::Value;
use sqlx::{Pool, Sqlite};

use crate::auth::{AuthUser, Permission};
use crate::db::{ProfileUpdate, get_user, update_user_profile};
use crate::error::AppError;
use crate::models::{Difficulty, User};

/// Body of `PUT /profile` for both roles. Identity and credential fields are
/// accepted by the parser only so they can be refused explicitly.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ProfileRequest {
    pub full_name: Option<String>,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
    pub fitness_level: Option<String>,

    pub password: Option<Value>,
    pub role: Option<Value>,
    pub email: Option<Value>,
    pub username: Option<Value>,
}

impl ProfileRequest {
    pub fn into_update(self) -> Result<ProfileUpdate, AppError> {
        let forbidden: Vec<&str> = [
            ("password", self.password.is_some()),
            ("role", self.role.is_some()),
            ("email", self.email.is_some()),
            ("username", self.username.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, present)| present.then_some(field))
        .collect();

        if !forbidden.is_empty() {
            return Err(AppError::Validation(format!(
                "Cannot update {} through the profile endpoint",
                forbidden.join(", ")
            )));
        }

        if let Some(level) = &self.fitness_level {
            if Difficulty::parse(level).is_none() {
                return Err(AppError::Validation(format!(
                    "Invalid fitness level '{}'",
                    level
                )));
            }
        }

        Ok(ProfileUpdate {
            full_name: self.full_name.map(|name| name.trim().to_string()),
            profile_picture: self.profile_picture,
            bio: self.bio,
            phone_number: self.phone_number,
            fitness_level: self.fitness_level,
        })
    }
}

pub async fn own_profile(pool: &Pool<Sqlite>, user: &AuthUser) -> Result<User, AppError> {
    user.require_permission(Permission::ViewOwnProfile)?;
    get_user(pool, user.id).await
}

pub async fn update_own_profile(
    pool: &Pool<Sqlite>,
    user: &AuthUser,
    request: ProfileRequest,
) -> Result<User, AppError> {
    user.require_permission(Permission::EditOwnProfile)?;
    update_user_profile(pool, user.id, request.into_update()?).await
}
