//! Data models for the site backend.
//!
//! Field names serialize in camelCase so the stored JSON documents stay
//! compatible with the documents already in the bucket.

mod category;
mod product;
mod site_config;

pub use category::*;
pub use product::*;
pub use site_config::*;
