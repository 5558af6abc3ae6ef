//! Stage manifests.
//!
//! A manifest is the key/value mapping a manager persists before it starts
//! work (the full configuration it received) and after it succeeds (the
//! derived output consumed by the next stage or tool family). Keys are kept
//! in sorted order so two runs over the same configuration produce
//! byte-identical files.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Persisted key/value mapping exchanged between stages and tool families.
pub type Manifest = BTreeMap<String, Value>;

/// On-disk encoding of a manifest, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Json,
}

impl ManifestFormat {
    /// `.json` selects JSON; everything else is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Write any serializable value as a manifest, creating parent directories.
pub fn write_manifest<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::Manifest(format!(
                "Failed to create manifest directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let content = match ManifestFormat::from_path(path) {
        ManifestFormat::Json => serde_json::to_string_pretty(value)?,
        ManifestFormat::Yaml => serde_yaml::to_string(value)?,
    };
    std::fs::write(path, content).map_err(|e| {
        Error::Manifest(format!("Failed to write manifest {}: {e}", path.display()))
    })?;
    info!(path = %path.display(), "Wrote manifest");
    Ok(())
}

/// Read a manifest written by [`write_manifest`].
pub fn read_manifest<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Manifest(format!("Failed to read manifest {}: {e}", path.display()))
    })?;
    debug!(path = %path.display(), "Read manifest");
    match ManifestFormat::from_path(path) {
        ManifestFormat::Json => Ok(serde_json::from_str(&content)?),
        ManifestFormat::Yaml => Ok(serde_yaml::from_str(&content)?),
    }
}

/// Convert any serializable value into a flat manifest.
///
/// Fails when the value does not serialize to a mapping.
pub fn to_manifest<T: Serialize + ?Sized>(value: &T) -> Result<Manifest> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(Error::Manifest(format!(
            "Expected a mapping, got {}",
            json_kind(&other)
        ))),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Manifest {
        let mut m = Manifest::new();
        m.insert("top_module".into(), json!("gcd"));
        m.insert("lef_files".into(), json!(["a.lef", "b.lef"]));
        m.insert("clk_period_ns".into(), json!(1.5));
        m
    }

    #[test]
    fn yaml_manifest_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/run/genus_manager-input.yml");
        write_manifest(&sample(), &path).unwrap();

        let back: Manifest = read_manifest(&path).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn json_extension_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_manifest(&sample(), &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.trim_start().starts_with('{'));
    }

    #[test]
    fn missing_manifest_is_manifest_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_manifest::<Manifest>(&dir.path().join("absent.yml")).unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
    }

    #[test]
    fn non_mapping_is_rejected() {
        let err = to_manifest(&vec![1, 2, 3]).unwrap_err();
        assert!(err.to_string().contains("a sequence"));
    }
}
