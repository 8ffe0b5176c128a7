use rocket::Route;
use rocket::State;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};
use validator::Validate;

use crate::auth::{
    AuthUser, Role, issue_token_pair, verify_password, verify_refresh_token,
};
use crate::config::AuthConfig;
use crate::db::{
    NewUser, create_user, find_user_by_identifier, get_user, get_user_credentials,
    update_user_password,
};
use crate::error::AppError;
use crate::models::User;
use crate::response::{ApiResponse, ApiResult};
use crate::validation::JsonValidateExt;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[serde(rename = "currentPassword", default)]
    #[validate(length(min = 1, message = "Both passwords required"))]
    pub current_password: String,
    #[serde(rename = "newPassword", default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

/// User fields plus both tokens, returned by login and registration.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthPayload {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub profile_picture: String,
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

fn auth_payload(user: User, config: &AuthConfig) -> Result<AuthPayload, AppError> {
    let tokens = issue_token_pair(&user, config)?;

    Ok(AuthPayload {
        id: user.id,
        username: user.username,
        email: user.email,
        full_name: user.full_name,
        role: user.role,
        profile_picture: user.profile_picture,
        token: tokens.token,
        refresh_token: tokens.refresh_token,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[post("/auth/login", data = "<login>")]
pub async fn login(
    login: Json<LoginRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AuthConfig>,
) -> ApiResult<AuthPayload> {
    let login = login.into_inner();

    let (identifier, password) = match (non_empty(login.username), non_empty(login.password)) {
        (Some(identifier), Some(password)) => (identifier, password),
        _ => {
            return Err(AppError::Validation(
                "Username and password are required".to_string(),
            ));
        }
    };

    let credentials = match find_user_by_identifier(db, identifier.trim()).await? {
        Some(credentials) => credentials,
        None => {
            warn!("Login attempt for unknown identifier");
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }
    };

    if !verify_password(&password, &credentials.password_hash).await? {
        warn!(user_id = %credentials.user.id, "Login attempt with wrong password");
        return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
    }

    info!(user_id = %credentials.user.id, "User logged in");
    Ok(ApiResponse::ok(
        auth_payload(credentials.user, config)?,
        "Login successful",
    ))
}

#[post("/auth/register", data = "<registration>")]
pub async fn register(
    registration: Json<RegisterRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AuthConfig>,
) -> ApiResult<AuthPayload> {
    let registration = registration.validate_custom()?;

    let role = match registration.role.as_deref().map(str::trim) {
        None | Some("") => Role::Trainee,
        Some(role) => Role::parse(role)?,
    };

    let user = create_user(
        db,
        NewUser {
            username: registration.username.trim().to_string(),
            email: registration.email.trim().to_string(),
            password: registration.password,
            full_name: registration.full_name.trim().to_string(),
            role,
        },
    )
    .await?;

    info!(user_id = %user.id, role = %user.role, "User registered");
    Ok(ApiResponse::created(
        auth_payload(user, config)?,
        "Registration successful",
    ))
}

#[post("/auth/refresh", data = "<refresh>")]
pub async fn refresh(
    refresh: Json<RefreshRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AuthConfig>,
) -> ApiResult<RefreshPayload> {
    let token = non_empty(refresh.into_inner().refresh_token)
        .ok_or_else(|| AppError::Validation("Refresh token required".to_string()))?;

    let claims = verify_refresh_token(token.trim(), config)?;
    let user = get_user(db, claims.id).await?;
    let tokens = issue_token_pair(&user, config)?;

    Ok(ApiResponse::ok(
        RefreshPayload {
            token: tokens.token,
            refresh_token: tokens.refresh_token,
        },
        "Token refreshed",
    ))
}

#[get("/auth/me")]
pub async fn me(user: AuthUser, db: &State<Pool<Sqlite>>) -> ApiResult<User> {
    let user = get_user(db, user.id).await?;
    Ok(ApiResponse::ok(user, "User data retrieved"))
}

#[put("/auth/change-password", data = "<change>")]
pub async fn change_password(
    change: Json<ChangePasswordRequest>,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<()> {
    let change = change.validate_custom()?;
    let credentials = get_user_credentials(db, user.id).await?;

    if !verify_password(&change.current_password, &credentials.password_hash).await? {
        return Err(AppError::Authentication(
            "Wrong current password".to_string(),
        ));
    }

    update_user_password(db, user.id, &change.new_password).await?;

    info!("Password changed");
    Ok(ApiResponse::ok((), "Password changed"))
}

/// Tokens are stateless; the client discards them.
#[post("/auth/logout")]
pub fn logout(user: AuthUser) -> ApiResult<()> {
    info!(user_id = %user.id, "User logged out");
    Ok(ApiResponse::ok((), "Logout successful"))
}

/// Answers the same way whether or not the address is registered. No reset
/// mail is sent.
#[post("/auth/forgot-password", data = "<request>")]
pub fn forgot_password(request: Json<ForgotPasswordRequest>) -> ApiResult<()> {
    if non_empty(request.into_inner().email).is_none() {
        return Err(AppError::Validation("Email required".to_string()));
    }

    info!("Password reset requested");
    Ok(ApiResponse::ok((), "Reset link sent if email exists"))
}

pub fn routes() -> Vec<Route> {
    routes![
        login,
        register,
        refresh,
        me,
        change_password,
        logout,
        forgot_password
    ]
}
