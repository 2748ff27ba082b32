//! Response bodies.

pub mod response;
