//! Canonical hashing of configuration sections.
//!
//! A section is hashed through its canonical form so that semantically equal
//! YAML produces the same digest no matter how it was written.
//!
//! # Canonicalization Rules
//!
//! - Mapping keys are converted to strings and entries are sorted by key
//! - Sequences keep their order (order is meaningful for sequences)
//! - Floats are rounded on a fixed decimal grid; integer digits are never dropped
//! - Floating-point mapping keys are rejected
//! - Other scalars pass through unchanged

use serde_json::{Map, Number, Value as Json};
use serde_yaml::Value;
use sha2::{Digest, Sha256};

use crate::error::{Result, StatesmanError};

/// Number of decimal places kept when rounding floats.
///
/// One place coarser than the 1e-10 noise floor, so a difference at the
/// tenth decimal lands on the same grid point.
pub const FLOAT_DECIMALS: i32 = 9;

/// Largest magnitude at which scaling by the grid stays exact in an `f64`.
const EXACT_SCALED_LIMIT: f64 = 9_007_199_254_740_992.0;

/// A normalized configuration subtree, used only as input to hashing.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalForm(Json);

impl CanonicalForm {
    /// The normalized value.
    pub fn value(&self) -> &Json {
        &self.0
    }

    /// Deterministic text serialization of this form.
    ///
    /// Object keys come out sorted because `serde_json::Map` is ordered.
    pub fn to_canonical_string(&self) -> String {
        self.0.to_string()
    }

    /// SHA-256 hex digest of the canonical text.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_canonical_string().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..])
    }
}

/// Canonicalize a configuration subtree.
///
/// # Errors
///
/// Returns `InvalidKey` if any mapping key is a float, a sequence or a
/// mapping, or if two keys collapse to the same string form.
pub fn canonicalize(tree: &Value) -> Result<CanonicalForm> {
    canonical_value(tree).map(CanonicalForm)
}

/// Hash a configuration subtree through its canonical form.
pub fn hash_section(tree: &Value) -> Result<String> {
    Ok(canonicalize(tree)?.digest())
}

fn canonical_value(value: &Value) -> Result<Json> {
    match value {
        Value::Null => Ok(Json::Null),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Number(n) => Ok(canonical_number(n)),
        Value::String(s) => Ok(Json::String(s.clone())),
        Value::Sequence(items) => items
            .iter()
            .map(canonical_value)
            .collect::<Result<Vec<_>>>()
            .map(Json::Array),
        Value::Mapping(mapping) => {
            let mut out = Map::new();
            for (key, value) in mapping {
                let key = canonical_key(key)?;
                if out.contains_key(&key) {
                    return Err(StatesmanError::InvalidKey {
                        key,
                        reason: "two keys share the same string form".to_string(),
                    });
                }
                out.insert(key, canonical_value(value)?);
            }
            Ok(Json::Object(out))
        }
        Value::Tagged(tagged) => {
            let mut out = Map::new();
            out.insert(tagged.tag.to_string(), canonical_value(&tagged.value)?);
            Ok(Json::Object(out))
        }
    }
}

fn canonical_key(key: &Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Number(n) if n.is_f64() => Err(StatesmanError::InvalidKey {
            key: n.to_string(),
            reason: "floating-point keys cannot be compared across re-serializations"
                .to_string(),
        }),
        Value::Number(n) => Ok(n.to_string()),
        Value::Tagged(tagged) => canonical_key(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => Err(StatesmanError::InvalidKey {
            key: format!("{:?}", key),
            reason: "only scalar keys can be canonicalized".to_string(),
        }),
    }
}

fn canonical_number(n: &serde_yaml::Number) -> Json {
    if let Some(i) = n.as_i64() {
        return Json::Number(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Json::Number(u.into());
    }

    let f = n.as_f64().unwrap_or(f64::NAN);
    if f.is_nan() {
        return Json::String(".nan".to_string());
    }
    if f.is_infinite() {
        let s = if f > 0.0 { ".inf" } else { "-.inf" };
        return Json::String(s.to_string());
    }

    match Number::from_f64(round_float(f)) {
        Some(number) => Json::Number(number),
        None => Json::Null,
    }
}

/// Round a finite float so that noise below the tenth decimal disappears.
///
/// Values whose scaled form no longer fits the `f64` mantissa already carry
/// no sub-grid digits and are returned unchanged.
pub fn round_float(f: f64) -> f64 {
    let scale = 10f64.powi(FLOAT_DECIMALS);
    let scaled = f * scale;
    let rounded = if scaled.abs() < EXACT_SCALED_LIMIT {
        scaled.round() / scale
    } else {
        f
    };

    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
