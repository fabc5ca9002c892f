//! HTML rendering.

pub mod views;
