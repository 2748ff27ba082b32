//! Directory implementations backed by SQL queries.

pub mod interest;
pub mod token;
