use rocket::Route;

pub mod auth;
pub mod coach;
pub mod dashboard;
pub mod profile;
pub mod trainee;

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

/// Every API route, mounted under `/api`.
pub fn routes() -> Vec<Route> {
    let mut routes = routes![health];
    routes.extend(auth::routes());
    routes.extend(coach::routes());
    routes.extend(trainee::routes());
    routes.extend(dashboard::routes());
    routes
}
