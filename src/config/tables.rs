//! Static lookup tables, built once at startup.
//!
//! The decan and channel tables ship embedded in the binary. An operator can
//! point `[tables]` at replacement files; a replacement that fails to parse
//! stops startup instead of silently falling back.

use std::path::Path;
use tracing::info;

use super::{ConfigError, TablesConfig};
use crate::stages::bodygraph::ChannelTable;
use crate::stages::decans::DecanTable;
use crate::stages::elements::ElementIndex;

const EMBEDDED_DECANS: &str = include_str!("../../data/decans.toml");
const EMBEDDED_CHANNELS: &str = include_str!("../../data/channels.toml");

/// Read-only tables shared by every pipeline run.
#[derive(Debug, Clone)]
pub struct StaticTables {
    pub decans: DecanTable,
    pub channels: ChannelTable,
    pub elements: ElementIndex,
}

impl StaticTables {
    /// Embedded tables, honouring any override paths.
    pub fn load(config: &TablesConfig) -> Result<Self, ConfigError> {
        let decans_raw = match &config.decans_path {
            Some(path) => read_table(path)?,
            None => EMBEDDED_DECANS.to_string(),
        };
        let channels_raw = match &config.channels_path {
            Some(path) => read_table(path)?,
            None => EMBEDDED_CHANNELS.to_string(),
        };

        let tables = Self {
            decans: DecanTable::from_toml_str(&decans_raw)?,
            channels: ChannelTable::from_toml_str(&channels_raw)?,
            elements: ElementIndex::builtin(),
        };

        info!(
            decans = tables.decans.len(),
            channels = tables.channels.len(),
            signs = tables.elements.len(),
            custom_decans = config.decans_path.is_some(),
            custom_channels = config.channels_path.is_some(),
            "Static tables loaded"
        );
        Ok(tables)
    }

    /// The tables compiled into the binary.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::load(&TablesConfig::default())
    }
}

fn read_table(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))
}
