pub mod error;
pub use error::*;

pub mod repository;
pub use repository::*;
