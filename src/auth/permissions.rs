use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnProfile,
    EditOwnProfile,
    ViewOwnAssignments,
    CompleteOwnAssignments,
    ViewTraineeDashboard,

    ManageTrainees,
    ManageTasks,
    AssignTasks,
    ViewCoachDashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Coach,
    Trainee,
}

static SHARED_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);
    permissions.insert(Permission::EditOwnProfile);

    permissions
});

static TRAINEE_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(SHARED_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ViewOwnAssignments);
    permissions.insert(Permission::CompleteOwnAssignments);
    permissions.insert(Permission::ViewTraineeDashboard);

    permissions
});

static COACH_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(SHARED_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ManageTrainees);
    permissions.insert(Permission::ManageTasks);
    permissions.insert(Permission::AssignTasks);
    permissions.insert(Permission::ViewCoachDashboard);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Coach => &COACH_PERMISSIONS,
            Role::Trainee => &TRAINEE_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Coach => "coach",
            Role::Trainee => "trainee",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "coach" => Ok(Role::Coach),
            "trainee" => Ok(Role::Trainee),
            _ => Err(AppError::Validation(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
