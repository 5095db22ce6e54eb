//! Viewer configuration loading and validation

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::appearance::{rgb_from_hex, AppearanceLevels};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_systems", rename = "system")]
    pub systems: Vec<SystemConfig>,
    #[serde(default)]
    pub appearance: AppearanceConfig,
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub descriptions: DescriptionConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            systems: default_systems(),
            appearance: AppearanceConfig::default(),
            interaction: InteractionConfig::default(),
            storage: StorageConfig::default(),
            descriptions: DescriptionConfig::default(),
        }
    }
}

/// One anatomical system and the model it loads from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Tag carried by every part of the system, e.g. "skeletal"
    pub id: String,
    /// Label shown next to the checkbox
    #[serde(default)]
    pub label: Option<String>,
    /// Model path relative to the asset root
    #[serde(default)]
    pub model: Option<String>,
}

impl SystemConfig {
    pub fn label(&self) -> String {
        match &self.label {
            Some(label) if !label.is_empty() => label.clone(),
            _ => capitalize(&self.id),
        }
    }

    pub fn model_path(&self) -> String {
        match &self.model {
            Some(model) if !model.is_empty() => model.clone(),
            _ => format!("models/{}.glb", self.id),
        }
    }
}

const DEFAULT_SYSTEMS: [&str; 11] = [
    "skeletal", "joints", "muscular", "fasciate", "arterial", "venous", "lymphoid", "nervous",
    "visceral", "regions", "movements",
];

fn default_systems() -> Vec<SystemConfig> {
    DEFAULT_SYSTEMS
        .iter()
        .map(|id| SystemConfig {
            id: id.to_string(),
            label: Some(capitalize(id)),
            model: Some(format!("models/{id}.glb")),
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppearanceConfig {
    #[serde(default = "default_resting_opacity")]
    pub resting_opacity: f32,
    #[serde(default = "default_faded_opacity")]
    pub faded_opacity: f32,
    /// Packed 0xRRGGBB
    #[serde(default = "default_hover_emissive")]
    pub hover_emissive: u32,
    /// Packed 0xRRGGBB
    #[serde(default = "default_select_emissive")]
    pub select_emissive: u32,
    #[serde(default = "default_select_emissive_intensity")]
    pub select_emissive_intensity: f32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            resting_opacity: default_resting_opacity(),
            faded_opacity: default_faded_opacity(),
            hover_emissive: default_hover_emissive(),
            select_emissive: default_select_emissive(),
            select_emissive_intensity: default_select_emissive_intensity(),
        }
    }
}

impl AppearanceConfig {
    pub fn levels(&self) -> AppearanceLevels {
        AppearanceLevels {
            resting_opacity: self.resting_opacity,
            faded_opacity: self.faded_opacity,
            hover_emissive: rgb_from_hex(self.hover_emissive),
            select_emissive: rgb_from_hex(self.select_emissive),
            select_emissive_intensity: self.select_emissive_intensity,
        }
    }
}

fn default_resting_opacity() -> f32 {
    0.8
}

fn default_faded_opacity() -> f32 {
    0.3
}

fn default_hover_emissive() -> u32 {
    0x555555
}

fn default_select_emissive() -> u32 {
    0x3399ff
}

fn default_select_emissive_intensity() -> f32 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionConfig {
    /// Minimum time between hover picks
    #[serde(default = "default_hover_throttle_ms")]
    pub hover_throttle_ms: u64,
    /// Quiet time before a search query runs
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    /// Smaller drags count as clicks
    #[serde(default = "default_drag_threshold_px")]
    pub drag_threshold_px: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            hover_throttle_ms: default_hover_throttle_ms(),
            search_debounce_ms: default_search_debounce_ms(),
            drag_threshold_px: default_drag_threshold_px(),
        }
    }
}

impl InteractionConfig {
    pub fn hover_throttle(&self) -> Duration {
        Duration::from_millis(self.hover_throttle_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

fn default_hover_throttle_ms() -> u64 {
    100
}

fn default_search_debounce_ms() -> u64 {
    300
}

fn default_drag_threshold_px() -> f32 {
    4.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Key of the annotation blob
    #[serde(default = "default_annotations_key")]
    pub annotations_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            annotations_key: default_annotations_key(),
        }
    }
}

fn default_annotations_key() -> String {
    "anatomyhero-annotations".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionConfig {
    #[serde(default = "default_wikipedia_summary_url")]
    pub wikipedia_summary_url: String,
    /// Consult the bundled catalogue before the network
    #[serde(default = "default_true")]
    pub use_local_catalog: bool,
}

impl Default for DescriptionConfig {
    fn default() -> Self {
        Self {
            wikipedia_summary_url: default_wikipedia_summary_url(),
            use_local_catalog: true,
        }
    }
}

fn default_wikipedia_summary_url() -> String {
    "https://en.wikipedia.org/api/rest_v1/page/summary/".to_string()
}

fn default_true() -> bool {
    true
}

impl ViewerConfig {
    /// Parse and validate TOML content
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.appearance;
        for (name, value) in [
            ("resting_opacity", a.resting_opacity),
            ("faded_opacity", a.faded_opacity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "appearance.{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        if a.faded_opacity >= a.resting_opacity {
            return Err(ConfigError::Invalid(format!(
                "appearance.faded_opacity ({}) must be below resting_opacity ({})",
                a.faded_opacity, a.resting_opacity
            )));
        }
        if a.hover_emissive > 0xffffff || a.select_emissive > 0xffffff {
            return Err(ConfigError::Invalid(
                "emissive colours must be 0xRRGGBB values".to_string(),
            ));
        }
        if self.interaction.drag_threshold_px < 0.0 {
            return Err(ConfigError::Invalid(
                "interaction.drag_threshold_px must not be negative".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for system in &self.systems {
            if system.id.trim().is_empty() {
                return Err(ConfigError::Invalid("system id must not be empty".to_string()));
            }
            if !seen.insert(system.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate system id: {}",
                    system.id
                )));
            }
        }
        Ok(())
    }

    pub fn system(&self, id: &str) -> Option<&SystemConfig> {
        self.systems.iter().find(|s| s.id == id)
    }
}

/// Load configuration from file, falling back to defaults when it is missing
pub fn load_config(path: &Path) -> Result<ViewerConfig, ConfigError> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config = ViewerConfig::from_toml_str(&content)?;
        info!(path = %path.display(), systems = config.systems.len(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(ViewerConfig::default())
    }
}

/// Write the default configuration to a file
pub fn save_default_config(path: &Path) -> Result<(), ConfigError> {
    let content = ViewerConfig::default().to_toml_string()?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ViewerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.systems.len(), 11);
        assert_eq!(config.systems[0].id, "skeletal");
        assert_eq!(config.systems[0].model_path(), "models/skeletal.glb");
        assert_eq!(config.storage.annotations_key, "anatomyhero-annotations");
        assert_eq!(config.interaction.hover_throttle(), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_systems_and_hex_colours() {
        let content = r#"
[[system]]
id = "visceral"
model = "organs/visceral.glb"

[[system]]
id = "nervous"
label = "Nervous system"

[appearance]
select_emissive = 0xff0000
"#;
        let config = ViewerConfig::from_toml_str(content).unwrap();
        assert_eq!(config.systems.len(), 2);
        assert_eq!(config.systems[0].label(), "Visceral");
        assert_eq!(config.systems[0].model_path(), "organs/visceral.glb");
        assert_eq!(config.systems[1].label(), "Nervous system");
        assert_eq!(config.systems[1].model_path(), "models/nervous.glb");

        let levels = config.appearance.levels();
        assert_eq!(levels.select_emissive, [1.0, 0.0, 0.0]);
        assert_eq!(levels.resting_opacity, 0.8);
    }

    #[test]
    fn test_validation_errors() {
        let dup = "[[system]]\nid = \"a\"\n[[system]]\nid = \"a\"\n";
        assert!(matches!(ViewerConfig::from_toml_str(dup), Err(ConfigError::Invalid(_))));

        let fade = "[appearance]\nfaded_opacity = 0.9\n";
        assert!(matches!(ViewerConfig::from_toml_str(fade), Err(ConfigError::Invalid(_))));

        let range = "[appearance]\nresting_opacity = 1.5\n";
        assert!(ViewerConfig::from_toml_str(range).is_err());

        assert!(matches!(
            ViewerConfig::from_toml_str("[appearance\n"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_load_missing_and_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anatomyhero.toml");
        assert_eq!(load_config(&path).unwrap(), ViewerConfig::default());

        save_default_config(&path).unwrap();
        assert_eq!(load_config(&path).unwrap(), ViewerConfig::default());
    }
}
