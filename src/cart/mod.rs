pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod store;

pub use error::*;
pub use models::*;
pub use repository::*;
pub use service::*;
pub use store::*;
