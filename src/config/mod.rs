//! Configuration loading and canonical section hashing.
//!
//! This module handles:
//! - Reading the YAML configuration document in [`loader`]
//! - Section and dotted-path lookups in [`tree`]
//! - Order- and noise-insensitive section hashing in [`canonical`]
//!
//! # Example
//!
//! ```
//! use statesman::config::{hash_section, parse_config};
//! use std::path::Path;
//!
//! let a = parse_config("geom: {x: 1, y: 2}", Path::new("a.yml")).unwrap();
//! let b = parse_config("geom: {y: 2, x: 1}", Path::new("b.yml")).unwrap();
//!
//! assert_eq!(
//!     hash_section(&a.section("geom")).unwrap(),
//!     hash_section(&b.section("geom")).unwrap(),
//! );
//! ```

pub mod canonical;
pub mod loader;
pub mod tree;

pub use canonical::{canonicalize, hash_section, CanonicalForm};
pub use loader::{load_config, parse_config};
pub use tree::{ConfigTree, DEFAULT_WORKDIR_KEY};

#[cfg(test)]
mod tests {
    #[test]
    fn serde_yaml_parses_basic_yaml() {
        let yaml = "name: test\nvalue: 42";
        let parsed: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed["name"], "test");
        assert_eq!(parsed["value"], 42);
    }

    #[test]
    fn serde_yaml_keeps_float_keys_as_numbers() {
        let parsed: serde_yaml::Value = serde_yaml::from_str("{1.5: a}").unwrap();
        let key = parsed.as_mapping().unwrap().keys().next().unwrap();
        assert!(key.as_f64().is_some());
        assert!(key.as_i64().is_none());
    }
}
