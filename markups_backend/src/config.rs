use crate::json_utils::writer::JsonWriter;
use crate::markup::CoordinateSystem;
use camino::Utf8Path;
use miette::{Context, IntoDiagnostic};
use serde::{Deserialize, Serialize};

pub const MARKUPS_SCHEMA_URL: &str = "https://raw.githubusercontent.com/slicer/slicer/master/Modules/Loadable/Markups/Resources/Schema/markups-schema-v1.0.3.json#";

/// Options controlling how markups documents are written and checked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct StorageConfig {
    /// Significant digits of written numbers
    pub precision: usize,
    /// Coordinate system used for written positions
    pub coordinate_system: CoordinateSystem,
    pub schema: String,
    /// Report keys that no codec understands
    pub warn_unknown_keys: bool,
    pub pretty: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            precision: 12,
            coordinate_system: CoordinateSystem::Lps,
            schema: MARKUPS_SCHEMA_URL.to_string(),
            warn_unknown_keys: true,
            pretty: true,
        }
    }
}

impl StorageConfig {
    pub fn from_toml_str(data: &str) -> miette::Result<Self> {
        let config: Self = toml::de::from_str(data)
            .into_diagnostic()
            .context("failed to deserialize storage configuration")?;
        if !(1..=17).contains(&config.precision) {
            miette::bail!(
                "precision must be between 1 and 17 significant digits, got {}",
                config.precision
            );
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Utf8Path>) -> miette::Result<Self> {
        let path = path.as_ref();
        let data = fs_err::read_to_string(path)
            .into_diagnostic()
            .context("failed to read storage configuration")?;
        Self::from_toml_str(&data).with_context(|| format!("in configuration file `{path}`"))
    }

    /// Fresh writer for a single markup object
    pub fn writer(&self) -> JsonWriter {
        JsonWriter::new(self.precision, self.coordinate_system)
    }
}
