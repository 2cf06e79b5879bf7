//! HTTP request handlers.

pub mod health;
pub mod posts;

pub use health::*;
pub use posts::*;
