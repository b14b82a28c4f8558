//! Import map normalization and module specifier resolution.
//!
//! This crate answers one question deterministically: given a module specifier and the URL of the
//! module importing it, which absolute URL should be loaded?
//!
//! - [`specifier`] holds the URL utilities (scheme detection, relative resolution, pathname
//!   arithmetic) shared with the module loader.
//! - [`ImportMap`] is a normalized import map. Every URL-like key, address and scope prefix is
//!   absolute, and every mapping is sorted longest key first so that longest-prefix-wins is a
//!   linear scan.
//! - [`Resolver`] pairs an optional import map with a [`DefaultExtension`] policy.
//!
//! ```
//! use resolve_js::ImportMap;
//! use serde_json::json;
//! use url::Url;
//!
//! let base = Url::parse("https://example.com/").unwrap();
//! let normalized = ImportMap::normalize(
//!   &json!({ "imports": { "a/": "/x/", "a/b/": "/y/" } }),
//!   &base,
//! )
//! .unwrap();
//! assert!(normalized.diagnostics.is_empty());
//!
//! let resolved = normalized.import_map.resolve("a/b/c", Some(&base)).unwrap();
//! assert_eq!(resolved.as_str(), "https://example.com/y/c");
//! ```

mod config;
mod diagnostic;
mod error;
mod extension;
mod import_map;
mod resolve;
pub mod specifier;

pub use crate::config::ConfigError;
pub use crate::config::ResolverConfig;
pub use crate::diagnostic::codes;
pub use crate::diagnostic::Diagnostic;
pub use crate::diagnostic::Severity;
pub use crate::error::InvalidDocument;
pub use crate::error::ResolveError;
pub use crate::extension::apply_default_extension;
pub use crate::extension::DefaultExtension;
pub use crate::import_map::compare_keys;
pub use crate::import_map::ImportMap;
pub use crate::import_map::Normalized;
pub use crate::import_map::Scope;
pub use crate::import_map::SpecifierMap;
pub use crate::import_map::SpecifierMapEntry;
pub use crate::resolve::Resolver;
pub use crate::specifier::SpecifierError;
pub use url::Url;
