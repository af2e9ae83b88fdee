pub mod error;
pub mod health;
pub mod openapi;
pub mod paper;

pub use error::ApiError;
