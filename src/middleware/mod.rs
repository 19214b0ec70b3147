pub mod auth;
pub mod rate_limit;
pub mod logging;

pub use auth::*;
pub use rate_limit::*;
pub use logging::*;
