//! Configuration resolution for edaflow.
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. Config file (`.yml`/`.yaml`, `.json` or `.toml`)
//! 3. Environment variables (`EDAFLOW_RUNDIR`, `EDAFLOW_LOG_LEVEL`)
//! 4. CLI arguments (applied by the binary)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::manifest::{Manifest, to_manifest};

/// Options received by one tool-family manager.
///
/// Known keys are typed; everything else is kept verbatim in `extra` and
/// handed to script generation. Serializing the whole struct reproduces the
/// configuration as received, which is what the input manifest records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rundir: Option<PathBuf>,
    /// Where the input manifest is written; absent disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<PathBuf>,
    /// Where the output manifest is written; absent disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_module: Option<String>,
    /// Tool executable; the family's default name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runmode: Option<String>,
    /// Per-stage deadline in seconds, keyed by stage name or `fused`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub timeouts: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    /// Environment handed to the tool process (license servers and the like).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub license_env: BTreeMap<String, String>,
    /// Directory holding `<stage>.tcl` bodies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_dir: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: Manifest,
}

impl ToolOptions {
    pub fn from_manifest(manifest: Manifest) -> Result<Self> {
        let map: serde_json::Map<String, Value> = manifest.into_iter().collect();
        serde_json::from_value(Value::Object(map))
            .map_err(|e| Error::Config(format!("Invalid tool options: {e}")))
    }

    /// Build options from layered mappings; later layers win key by key.
    pub fn layered<'a, I>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Manifest>,
    {
        let mut merged = Manifest::new();
        for layer in layers {
            merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Self::from_manifest(merged)
    }

    pub fn to_manifest(&self) -> Result<Manifest> {
        to_manifest(self)
    }

    /// Pass-through option as a string, if present and a string.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Pass-through option as a list of strings; a single string counts as
    /// a one-element list.
    pub fn extra_list(&self, key: &str) -> Vec<String> {
        match self.extra.get(key) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Tool pair a flow drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Toolchain {
    /// Cadence Genus, then Cadence Innovus.
    #[default]
    GenusInnovus,
    /// Yosys (reported through OpenROAD), then OpenROAD.
    YosysOpenroad,
}

/// Configuration of the synthesis → place-and-route flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default)]
    pub toolchain: Toolchain,
    #[serde(default = "default_rundir")]
    pub rundir: PathBuf,
    /// Design description (`top_module`, RTL files, clock period, ...).
    #[serde(default)]
    pub design: Manifest,
    /// Technology files (libraries, LEF, QRC, ...).
    #[serde(default)]
    pub tech: Manifest,
    /// Synthesis tool options.
    #[serde(default)]
    pub synthesis: Manifest,
    /// Place-and-route tool options.
    #[serde(default)]
    pub pnr: Manifest,
    /// Delete the mapped netlist once the flow is done (Yosys/OpenROAD only).
    #[serde(default = "default_remove_netlist")]
    pub remove_netlist: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_rundir() -> PathBuf {
    PathBuf::from("rundir")
}

const fn default_remove_netlist() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            toolchain: Toolchain::default(),
            rundir: default_rundir(),
            design: Manifest::new(),
            tech: Manifest::new(),
            synthesis: Manifest::new(),
            pnr: Manifest::new(),
            remove_netlist: default_remove_netlist(),
            log_level: default_log_level(),
        }
    }
}

impl FlowConfig {
    pub fn top_module(&self) -> Option<&str> {
        self.design.get("top_module").and_then(Value::as_str)
    }
}

/// Config file encoding, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yml" | "yaml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(Error::Config(format!(
                "Unsupported config file extension: {}",
                path.display()
            ))),
        }
    }
}

/// Read and decode a config file of any supported format.
pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = ConfigFormat::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    let parsed = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::from_str(&content).map_err(|e| e.to_string()),
        ConfigFormat::Toml => toml::from_str(&content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {e}", path.display()))
    })
}

/// Load the flow configuration: defaults, then the file, then environment.
pub fn load_flow_config(path: &Path) -> Result<FlowConfig> {
    let mut config: FlowConfig = load_file(path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Load one manager's options from a file.
pub fn load_tool_options(path: &Path) -> Result<ToolOptions> {
    let manifest: Manifest = load_file(path)?;
    ToolOptions::from_manifest(manifest)
}

fn apply_env_overrides(config: &mut FlowConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("EDAFLOW_RUNDIR") {
        config.rundir = PathBuf::from(val);
    }
    if let Some(val) = var("EDAFLOW_LOG_LEVEL") {
        config.log_level = val;
    }
}
