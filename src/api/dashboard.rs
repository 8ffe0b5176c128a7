use chrono::Utc;
use rocket::Route;
use rocket::State;
use sqlx::{Pool, Sqlite};

use crate::auth::{AuthUser, Permission, Role};
use crate::db::{CoachDashboard, TraineeDashboard, coach_dashboard, trainee_dashboard};
use crate::response::{ApiResponse, ApiResult};

#[get("/dashboard/coach")]
pub async fn get_coach_dashboard(
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<CoachDashboard> {
    user.require_role(&[Role::Coach])?;
    user.require_permission(Permission::ViewCoachDashboard)?;

    let dashboard = coach_dashboard(db, user.id, Utc::now()).await?;
    Ok(ApiResponse::ok(
        dashboard,
        "Dashboard data retrieved successfully",
    ))
}

#[get("/dashboard/trainee")]
pub async fn get_trainee_dashboard(
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<TraineeDashboard> {
    user.require_role(&[Role::Trainee])?;
    user.require_permission(Permission::ViewTraineeDashboard)?;

    let dashboard = trainee_dashboard(db, user.id, Utc::now()).await?;
    Ok(ApiResponse::ok(
        dashboard,
        "Dashboard data retrieved successfully",
    ))
}

pub fn routes() -> Vec<Route> {
    routes![get_coach_dashboard, get_trainee_dashboard]
}
