//! This module handles collection storage on disk.

pub mod conf;
pub mod file;
pub mod lock;
pub mod record;
