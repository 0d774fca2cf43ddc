pub mod diff;
pub mod handlers;
pub mod models;
pub mod recorder;

pub use diff::*;
pub use models::*;
pub use recorder::*;
