//! Application services layer: read and write paths over the record store
//! and the derived-view caches, plus the out-of-band rebuild procedures.

pub mod activity;
pub mod directory;
pub mod error;
pub mod follows;
pub mod rebuild;
pub mod repos;
pub mod timeline;
