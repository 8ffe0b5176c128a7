use crate::error::AppError;

/// bcrypt work factor for stored password hashes.
pub const PASSWORD_HASH_COST: u32 = 10;

/// Hashes on the blocking pool so request tasks are never stalled by bcrypt.
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, PASSWORD_HASH_COST))
        .await??;

    Ok(hashed)
}

/// Constant-time comparison through bcrypt. A malformed stored hash verifies as
/// a mismatch rather than an error.
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password = password.to_owned();
    let password_hash = password_hash.to_owned();

    let valid = tokio::task::spawn_blocking(move || {
        bcrypt::verify(password, &password_hash).unwrap_or(false)
    })
    .await?;

    Ok(valid)
}
