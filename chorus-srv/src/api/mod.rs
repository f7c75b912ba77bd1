//! HTTP API handlers for chorus-srv

pub mod admin;
pub mod auth;
pub mod changelog;
pub mod extract;
pub mod feedback;
pub mod health;
pub mod programs;
pub mod songs;
pub mod uploads;
pub mod versions;

pub use admin::admin_routes;
pub use auth::{CurrentUser, USER_HEADER};
pub use changelog::changelog_routes;
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use feedback::feedback_routes;
pub use health::health_routes;
pub use programs::program_routes;
pub use songs::song_routes;
pub use uploads::upload_routes;
pub use versions::version_routes;
