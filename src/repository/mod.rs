//! Repositories over the JSON documents in the settings bucket.
//!
//! Every operation reads the whole document, works on it in memory and
//! writes the whole document back.

mod products;
mod site_config;

pub use products::*;
pub use site_config::*;
