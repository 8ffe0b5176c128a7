mod auth;
mod dashboard;
pub mod utils;

pub use utils::{test_db, test_utils};
