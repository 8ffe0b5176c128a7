use serde::Serialize;

use crate::error::AppError;

use super::{AccessClaims, Permission, Role};

/// The identity attached to a request once its bearer token has been verified.
#[derive(Debug, Serialize, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<AccessClaims> for AuthUser {
    fn from(claims: AccessClaims) -> Self {
        Self {
            id: claims.id,
            username: claims.username,
            email: claims.email,
            role: claims.role,
        }
    }
}

impl AuthUser {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), AppError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(AppError::Authorization(
                "Access denied. Insufficient permissions".to_string(),
            ))
        }
    }

    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role.as_str(),
                allowed = ?allowed,
                "Role not allowed"
            );
            Err(AppError::Authorization(
                "Access denied. Insufficient permissions".to_string(),
            ))
        }
    }
}
