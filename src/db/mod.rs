//! The public store API: a [database::Database] and the
//! [collection::Collection] handles it hands out.

pub mod collection;
pub mod database;
