use chrono::Utc;
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::auth::Role;
use crate::error::AppError;
use crate::models::{DbUser, User};

use super::{get_user, is_unique_violation};

/// Link lookup on a caller-supplied connection, so it can run inside a
/// transaction.
pub async fn trainee_link_exists(
    conn: &mut SqliteConnection,
    coach_id: i64,
    trainee_id: i64,
) -> Result<bool, AppError> {
    let row = sqlx::query_as::<_, (i64,)>(
        "SELECT id FROM coach_trainees WHERE coach_id = ? AND trainee_id = ?",
    )
    .bind(coach_id)
    .bind(trainee_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.is_some())
}

#[instrument]
pub async fn is_trainee_linked(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    trainee_id: i64,
) -> Result<bool, AppError> {
    let mut conn = pool.acquire().await?;
    trainee_link_exists(&mut conn, coach_id, trainee_id).await
}

#[instrument]
pub async fn add_trainee(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    trainee_id: i64,
) -> Result<User, AppError> {
    info!("Linking trainee to coach");

    let trainee = match get_user(pool, trainee_id).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => {
            return Err(AppError::NotFound("Trainee not found".to_string()));
        }
        Err(err) => return Err(err),
    };

    if trainee.role != Role::Trainee {
        return Err(AppError::Validation("User is not a trainee".to_string()));
    }

    if is_trainee_linked(pool, coach_id, trainee_id).await? {
        return Err(AppError::Validation(
            "Trainee already added to your list".to_string(),
        ));
    }

    sqlx::query("INSERT INTO coach_trainees (coach_id, trainee_id, created_at) VALUES (?, ?, ?)")
        .bind(coach_id)
        .bind(trainee_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::Validation("Trainee already added to your list".to_string())
            } else {
                AppError::from(err)
            }
        })?;

    Ok(trainee)
}

#[instrument]
pub async fn remove_trainee(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    trainee_id: i64,
) -> Result<(), AppError> {
    info!("Unlinking trainee from coach");
    let res = sqlx::query("DELETE FROM coach_trainees WHERE coach_id = ? AND trainee_id = ?")
        .bind(coach_id)
        .bind(trainee_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Trainee not found in your list".to_string(),
        ));
    }

    Ok(())
}

#[instrument]
pub async fn list_trainees(pool: &Pool<Sqlite>, coach_id: i64) -> Result<Vec<User>, AppError> {
    info!("Listing coach trainees");
    let rows = sqlx::query_as::<_, DbUser>(
        "SELECT u.id, u.username, u.email, u.full_name, u.role, u.profile_picture, u.bio,
                u.phone_number, u.fitness_level, u.created_at, u.updated_at
         FROM coach_trainees ct
         JOIN users u ON u.id = ct.trainee_id
         WHERE ct.coach_id = ?
         ORDER BY ct.created_at DESC, ct.id DESC",
    )
    .bind(coach_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(User::from).collect())
}

/// Makes `%`, `_` and `\` match literally under `ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Trainees not yet linked to this coach, optionally narrowed by a
/// case-insensitive match on username, full name or email.
#[instrument]
pub async fn list_available_trainees(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    search: Option<&str>,
) -> Result<Vec<User>, AppError> {
    info!("Listing available trainees");

    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(&s.to_lowercase())));

    let rows = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, full_name, role, profile_picture, bio,
                phone_number, fitness_level, created_at, updated_at
         FROM users
         WHERE role = 'trainee'
           AND id NOT IN (SELECT trainee_id FROM coach_trainees WHERE coach_id = ?)
           AND (? IS NULL
                OR lower(username) LIKE ? ESCAPE '\\'
                OR lower(full_name) LIKE ? ESCAPE '\\'
                OR lower(email) LIKE ? ESCAPE '\\')
         ORDER BY full_name, id",
    )
    .bind(coach_id)
    .bind(pattern.as_deref())
    .bind(pattern.as_deref())
    .bind(pattern.as_deref())
    .bind(pattern.as_deref())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(User::from).collect())
}

#[instrument]
pub async fn count_trainees(pool: &Pool<Sqlite>, coach_id: i64) -> Result<i64, AppError> {
    let (count,) =
        sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM coach_trainees WHERE coach_id = ?")
            .bind(coach_id)
            .fetch_one(pool)
            .await?;

    Ok(count)
}
