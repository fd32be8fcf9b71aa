//! URL handling for Shelf-Scout
//!
//! Builds listing URLs from source templates and turns scraped product links
//! into canonical deduplication keys.

mod normalize;
mod template;

pub use normalize::canonicalize_link;
pub use template::build_target_url;
