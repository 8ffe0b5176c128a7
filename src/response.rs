use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{Request, response};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Success envelope: `{success: true, message, data}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

/// Failure envelope: `{success: false, message}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

pub struct ApiResponse<T> {
    status: Status,
    envelope: Envelope<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: &str) -> Self {
        Self::with_status(Status::Ok, data, message)
    }

    pub fn created(data: T, message: &str) -> Self {
        Self::with_status(Status::Created, data, message)
    }

    fn with_status(status: Status, data: T, message: &str) -> Self {
        Self {
            status,
            envelope: Envelope {
                success: true,
                message: message.to_string(),
                data,
            },
        }
    }
}

impl<'r, T: Serialize> response::Responder<'r, 'static> for ApiResponse<T> {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        Custom(self.status, Json(self.envelope)).respond_to(req)
    }
}
