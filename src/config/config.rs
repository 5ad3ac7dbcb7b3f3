use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pipeline: PipelineConfig,
    pub viewport: ViewportConfig,
    pub table: TableConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Quiet period before typed search input takes effect
    pub debounce_ms: u64,

    /// Minimum time between a request and the view update it produces
    pub min_latency_ms: u64,

    /// Run filter+sort on a background thread
    pub use_worker: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Fixed height of every body row
    pub row_height: f64,

    /// Extra rows rendered above and below the visible range
    pub overscan: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Placeholder text when the view is empty
    pub no_data_text: String,

    /// Label of the pinned append row, if the table has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append_row: Option<String>,

    /// Reserve an empty trailing row for a floating action button
    pub has_fab: bool,

    /// Accept selection input
    pub selectable: bool,

    /// Emit row activation events
    pub clickable: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            min_latency_ms: 100,
            use_worker: true,
        }
    }
}

impl PipelineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn min_latency(&self) -> Duration {
        Duration::from_millis(self.min_latency_ms)
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            row_height: 52.0,
            overscan: 3,
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            no_data_text: "No data".to_string(),
            append_row: None,
            has_fab: false,
            selectable: true,
            clickable: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate TOML. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(contents).context("Failed to parse engine config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from the default location, or defaults when there is none
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            debug!(target: "config", "No config at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config = Self::from_toml_str(&contents)?;
        info!(target: "config", "Loaded engine config from {:?}", path);
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("datagrid-engine").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        let height = self.viewport.row_height;
        if !height.is_finite() || height <= 0.0 {
            anyhow::bail!("viewport.row_height must be positive, got {}", height);
        }
        Ok(())
    }

    /// Default config file contents with comments
    pub fn create_default_with_comments() -> String {
        r#"# datagrid-engine configuration
# Location: ~/.config/datagrid-engine/config.toml (Linux)

[pipeline]
# Quiet period (ms) before typed search input is applied
debounce_ms = 100

# Minimum time (ms) before a recomputed view is shown
min_latency_ms = 100

# Run filter+sort on a background thread
use_worker = true

[viewport]
row_height = 52.0
overscan = 3

[table]
no_data_text = "No data"
# append_row = "Add item"
has_fab = false
selectable = true
clickable = false
"#
        .to_string()
    }
}
