//! Utilities shared by the sfu-link binaries.

pub mod logger;
