//! SQLite backend for the tracking engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
