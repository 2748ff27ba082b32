//! # relay-core
//!
//! Core crate for the notification relay. Contains configuration schemas,
//! the authenticated session type, topic naming, the collaborator traits
//! implemented by the storage crates, and the unified error system.
//!
//! This crate has **no** internal dependencies on other relay crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
