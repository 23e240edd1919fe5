// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph settings.
//!
//! Settings are stored as RON. Every field has a default, so partial files
//! are fine:
//!
//! ```ron
//! (
//!     validation: (
//!         check_types: false,
//!         extra_compatible: [("int", "string")],
//!     ),
//!     duplicate_offset: (40.0, 40.0),
//! )
//! ```

use crate::port::TypeCompatibility;
use crate::session::SessionFormat;
use crate::validation::ValidationOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Default settings file name
pub const SETTINGS_FILE_NAME: &str = "pipegraph.ron";

/// Connection validation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Refuse pipes that close a cycle
    pub check_cycles: bool,
    /// Refuse pipes between incompatible data types
    pub check_types: bool,
    /// Start from the standard conversion table
    pub use_default_table: bool,
    /// Additional accepted `(output type, input type)` pairs
    pub extra_compatible: Vec<(String, String)>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            check_cycles: true,
            check_types: true,
            use_default_table: true,
            extra_compatible: Vec::new(),
        }
    }
}

/// Graph-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Settings format version
    pub version: u32,
    /// Connection validation
    pub validation: ValidationSettings,
    /// Offset applied to duplicated or pasted nodes
    pub duplicate_offset: [f32; 2],
    /// Format used when a session path has no recognised extension
    pub default_format: SessionFormat,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            validation: ValidationSettings::default(),
            duplicate_offset: [20.0, 20.0],
            default_format: SessionFormat::Json,
        }
    }
}

impl GraphSettings {
    /// Build validation options from these settings
    pub fn validation_options(&self) -> ValidationOptions {
        let mut compatibility = if self.validation.use_default_table {
            TypeCompatibility::standard()
        } else {
            TypeCompatibility::empty()
        };
        for (output, input) in &self.validation.extra_compatible {
            compatibility.allow(output.as_str(), input.as_str());
        }
        ValidationOptions {
            check_cycles: self.validation.check_cycles,
            check_types: self.validation.check_types,
            compatibility,
        }
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String, SettingsError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Deserialize from RON
    pub fn from_ron(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = ron::from_str(text)?;
        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion(settings.version));
        }
        Ok(settings)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_ron(&text)?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}

/// Error reading or writing settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid RON
    #[error("Settings parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON encoding failure
    #[error("Settings encode error: {0}")]
    Encode(#[from] ron::Error),

    /// Written by a newer version
    #[error("Unsupported settings version: {0}")]
    UnsupportedVersion(u32),
}
