use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;

use crate::config::AuthConfig;
use crate::response::ErrorBody;

use super::{AuthUser, TokenError, verify_access_token};

/// Why the bearer-token guard rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Missing,
    Invalid,
    Expired,
}

impl AuthFailure {
    pub fn message(&self) -> &'static str {
        match self {
            AuthFailure::Missing => "Access token required",
            AuthFailure::Invalid => "Invalid token",
            AuthFailure::Expired => "Token expired",
        }
    }
}

impl From<TokenError> for AuthFailure {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Expired => AuthFailure::Expired,
            TokenError::Invalid | TokenError::Signing(_) => AuthFailure::Invalid,
        }
    }
}

/// Stashed in the request-local cache so the 401 catcher can report the reason.
struct AuthRejection(Option<AuthFailure>);

fn reject(request: &Request<'_>, failure: AuthFailure) -> Outcome<AuthUser, AuthFailure> {
    request.local_cache(|| AuthRejection(Some(failure)));
    Outcome::Error((Status::Unauthorized, failure))
}

fn bearer_token<'a>(request: &'a Request<'_>) -> Option<&'a str> {
    request
        .headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthFailure;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("user_auth_guard");
        let _guard = auth_span.enter();

        let config = match request.rocket().state::<AuthConfig>() {
            Some(config) => config,
            _ => {
                tracing::error!("Auth configuration not found in managed state");
                return Outcome::Error((Status::InternalServerError, AuthFailure::Invalid));
            }
        };

        let token = match bearer_token(request) {
            Some(token) => token,
            None => {
                tracing::warn!("Request without bearer token");
                return reject(request, AuthFailure::Missing);
            }
        };

        match verify_access_token(token, config) {
            Ok(claims) => {
                tracing::info!(user_id = %claims.id, role = %claims.role.as_str(), "User authenticated via bearer token");
                Outcome::Success(AuthUser::from(claims))
            }
            Err(err) => {
                tracing::warn!(error = %err, "Rejected bearer token");
                reject(request, AuthFailure::from(err))
            }
        }
    }
}

#[catch(401)]
pub fn unauthorized(req: &Request) -> Custom<Json<ErrorBody>> {
    let reason = req
        .local_cache(|| AuthRejection(None))
        .0
        .unwrap_or(AuthFailure::Missing);

    tracing::warn!("Unauthorized access attempt: {}", reason.message());
    Custom(Status::Unauthorized, Json(ErrorBody::new(reason.message())))
}

#[catch(403)]
pub fn forbidden(_req: &Request) -> Custom<Json<ErrorBody>> {
    tracing::warn!("Forbidden access attempt");
    Custom(
        Status::Forbidden,
        Json(ErrorBody::new("Access denied. Insufficient permissions")),
    )
}

/// Body parse failures arrive as 400 or 422; both are reported as 400.
#[catch(400)]
pub fn bad_request(_req: &Request) -> Custom<Json<ErrorBody>> {
    Custom(Status::BadRequest, Json(ErrorBody::new("Invalid request body")))
}

#[catch(422)]
pub fn unprocessable(_req: &Request) -> Custom<Json<ErrorBody>> {
    Custom(Status::BadRequest, Json(ErrorBody::new("Invalid request body")))
}

#[catch(404)]
pub fn not_found(req: &Request) -> Custom<Json<ErrorBody>> {
    Custom(
        Status::NotFound,
        Json(ErrorBody::new(format!("Route {} {} not found", req.method(), req.uri()))),
    )
}

#[catch(default)]
pub fn default_catcher(status: Status, _req: &Request) -> Custom<Json<ErrorBody>> {
    Custom(
        status,
        Json(ErrorBody::new(status.reason().unwrap_or("Unexpected error"))),
    )
}
