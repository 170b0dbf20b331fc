mod error;
pub mod handlers;
pub mod media;
pub mod routes;
pub mod settings;
pub mod tasks;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
