//! External service clients

pub mod archive;
pub mod classifier;
