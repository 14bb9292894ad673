//! Request throttling.

pub mod rate_limit;
