//! Shared domain types.

pub mod session;
pub mod topic;

pub use session::UserSession;
