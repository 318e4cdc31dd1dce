//! Database models, schema and row mapping

pub mod init;
pub mod models;
pub(crate) mod rows;

pub use init::*;
pub use models::*;
