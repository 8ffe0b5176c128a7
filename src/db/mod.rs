pub mod assignments;
pub mod dashboard;
pub mod relationships;
pub mod tasks;
pub mod users;

pub use assignments::*;
pub use dashboard::*;
pub use relationships::*;
pub use tasks::*;
pub use users::*;

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}
