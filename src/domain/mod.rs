//! Domain model: users, posts, follow edges and the rules that turn raw post
//! text into the lines stored by the derived-view caches.

pub mod entities;
pub mod error;
pub mod posts;
