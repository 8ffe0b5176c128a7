use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{Role, hash_password};
use crate::error::AppError;
use crate::models::{DbUser, MIN_PASSWORD_LENGTH, User, UserCredentials};

use super::is_unique_violation;

const USER_COLUMNS: &str = "id, username, email, full_name, role, profile_picture, bio, \
                            phone_number, fitness_level, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

/// Fields a user may change about themselves. Credentials and identity
/// (password, role, email, username) are deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
    pub fitness_level: Option<String>,
}

#[derive(sqlx::FromRow)]
struct DbUserWithPassword {
    #[sqlx(flatten)]
    user: DbUser,
    password: Option<String>,
}

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound("User not found".to_string())),
    }
}

/// Looks a user up by username or email, including the password hash.
#[instrument(skip(pool))]
pub async fn find_user_by_identifier(
    pool: &Pool<Sqlite>,
    identifier: &str,
) -> Result<Option<UserCredentials>, AppError> {
    info!("Looking up user credentials by identifier");
    let row = sqlx::query_as::<_, DbUserWithPassword>(&format!(
        "SELECT {}, password FROM users WHERE username = ? OR email = ? LIMIT 1",
        USER_COLUMNS
    ))
    .bind(identifier)
    .bind(identifier)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| UserCredentials {
        user: User::from(row.user),
        password_hash: row.password.unwrap_or_default(),
    }))
}

#[instrument(skip(pool))]
pub async fn get_user_credentials(
    pool: &Pool<Sqlite>,
    id: i64,
) -> Result<UserCredentials, AppError> {
    info!("Fetching user credentials by ID");
    let row = sqlx::query_as::<_, DbUserWithPassword>(&format!(
        "SELECT {}, password FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(UserCredentials {
            user: User::from(row.user),
            password_hash: row.password.unwrap_or_default(),
        }),
        _ => Err(AppError::NotFound("User not found".to_string())),
    }
}

#[instrument(skip_all, fields(username = %new_user.username, role = %new_user.role))]
pub async fn create_user(pool: &Pool<Sqlite>, new_user: NewUser) -> Result<User, AppError> {
    info!("Creating new user");

    if new_user.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let existing_user = sqlx::query_as::<_, (i64,)>(
        "SELECT id FROM users WHERE username = ? OR email = ?",
    )
    .bind(&new_user.username)
    .bind(&new_user.email)
    .fetch_optional(pool)
    .await?;

    if existing_user.is_some() {
        return Err(AppError::Validation(
            "Username or email already exists".to_string(),
        ));
    }

    let hashed_password = hash_password(&new_user.password).await?;
    let fitness_level = match new_user.role {
        Role::Trainee => Some("beginner"),
        Role::Coach => None,
    };
    let now = Utc::now();

    let res = sqlx::query(
        "INSERT INTO users
         (username, email, password, full_name, role, fitness_level, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(hashed_password)
    .bind(&new_user.full_name)
    .bind(new_user.role.as_str())
    .bind(fitness_level)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AppError::Validation("Username or email already exists".to_string())
        } else {
            AppError::from(err)
        }
    })?;

    get_user(pool, res.last_insert_rowid()).await
}

#[instrument(skip_all, fields(user_id))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating user password");

    if new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let hashed_password = hash_password(new_password).await?;

    let res = sqlx::query("UPDATE users SET password = ?, updated_at = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn update_user_profile(
    pool: &Pool<Sqlite>,
    user_id: i64,
    update: ProfileUpdate,
) -> Result<User, AppError> {
    info!("Updating user profile");
    let user = get_user(pool, user_id).await?;

    if update.fitness_level.is_some() && user.role != Role::Trainee {
        return Err(AppError::Validation(
            "Fitness level only applies to trainees".to_string(),
        ));
    }

    if let Some(full_name) = &update.full_name {
        if full_name.trim().is_empty() {
            return Err(AppError::Validation("Full name cannot be empty".to_string()));
        }
    }

    sqlx::query(
        "UPDATE users
         SET full_name = COALESCE(?, full_name),
             profile_picture = COALESCE(?, profile_picture),
             bio = COALESCE(?, bio),
             phone_number = COALESCE(?, phone_number),
             fitness_level = COALESCE(?, fitness_level),
             updated_at = ?
         WHERE id = ?",
    )
    .bind(update.full_name)
    .bind(update.profile_picture)
    .bind(update.bio)
    .bind(update.phone_number)
    .bind(update.fitness_level)
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await?;

    get_user(pool, user_id).await
}
