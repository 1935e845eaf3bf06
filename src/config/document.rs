use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

use super::{FeatureSet, WeightTree};

/// A parsed configuration document together with its version string.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: String,
    pub value: T,
}

/// Loads the feature document at `path` (YAML or JSON by extension).
///
/// ```yaml
/// version: 1.0.0
/// surface:
///   type: categorical
///   mapping: {asphalt: 1.0, gravel: 0.4}
///   fallback: 0.5
/// ```
pub fn load_features(path: impl AsRef<Path>) -> Result<Versioned<FeatureSet>> {
    load_document(path.as_ref())
}

/// Loads the weights document at `path`: `version` plus one weight hierarchy per metric.
pub fn load_weights(path: impl AsRef<Path>) -> Result<Versioned<WeightTree>> {
    load_document(path.as_ref())
}

fn load_document<T: DeserializeOwned>(path: &Path) -> Result<Versioned<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config '{}'", path.display()))?;
    let document = parse_document(&content, path)?;
    let versioned = from_document(document)
        .with_context(|| format!("invalid config '{}'", path.display()))?;

    debug!(path = %path.display(), version = %versioned.version, "Loaded config document");
    Ok(versioned)
}

fn parse_document(content: &str, path: &Path) -> Result<Value> {
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let document = if is_json {
        serde_json::from_str(content)?
    } else {
        serde_yaml::from_str(content)?
    };
    Ok(document)
}

/// Splits off the `version` key and deserializes the remaining entries.
pub fn from_document<T: DeserializeOwned>(mut document: Value) -> Result<Versioned<T>> {
    let version = config_version(&document);
    if let Value::Object(entries) = &mut document {
        entries.remove("version");
    }
    let value = serde_json::from_value(document)?;
    Ok(Versioned { version, value })
}

/// Version string `v<version>-<hash8>` for a configuration document.
///
/// `<version>` is the document's `version` field (`0.0.0` when absent) and
/// `<hash8>` the first 8 hex digits of the SHA-256 of its key-sorted JSON form.
pub fn config_version(document: &Value) -> String {
    let prefix = match document.get("version") {
        Some(Value::String(v)) => v.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "0.0.0".to_string(),
    };

    // Without serde_json's `preserve_order` feature objects are BTreeMaps, so
    // the compact rendering is already key-sorted.
    let canonical = document.to_string();
    let digest = Sha256::digest(canonical.as_bytes());

    format!("v{prefix}-{}", &hex::encode(digest)[..8])
}
