//! Localization adapters.

mod catalog_localizer;

pub use catalog_localizer::{CatalogError, CatalogLocalizer};
