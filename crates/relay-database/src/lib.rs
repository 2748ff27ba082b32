//! # relay-database
//!
//! MySQL access for the relay. Only read paths exist: the interest
//! directory (which topics a user should receive, and per-type delivery
//! options) and the OAuth token directory.

pub mod connection;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::interest::SqlInterestDirectory;
pub use repositories::token::SqlTokenDirectory;
