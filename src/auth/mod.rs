pub mod authentication;
pub mod password;
pub mod permissions;
pub mod tokens;
pub mod user;

pub use authentication::*;
pub use password::*;
pub use permissions::*;
pub use tokens::*;
pub use user::*;
