use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use troopmix_engine::{
    CharacterDescriptor, CharacterView, ConfigError, ConfigLoader, LoreLock, OverrideConfig,
    TroopCategory,
};

const DEFAULT_TROOPS: &str = include_str!("../assets/troops.json");

/// A troop template as the simulated host knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTroop {
    #[serde(flatten)]
    pub descriptor: CharacterDescriptor,
    pub faction: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroopCatalog {
    pub troops: Vec<CatalogTroop>,
}

impl TroopCatalog {
    /// Parse a catalog document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a troop catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &CharacterDescriptor> {
        self.troops.iter().map(|t| &t.descriptor)
    }
}

/// How a catalog troop is expected to behave under a given config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Must never render female through the override.
    Exempt,
    /// Goes through the percentage roll.
    Eligible,
}

/// Expected treatment of `troop` under `config`, computed from the catalog
/// flags independently of the decision engine's rule order.
#[must_use]
pub fn expectation(troop: &CharacterDescriptor, config: &OverrideConfig) -> Expectation {
    let rules = &config.rules;
    let lore_locked = config.lore_friendly && rules.lore_lock(troop.identity()).is_some();
    if !config.enabled
        || troop.is_female
        || troop.is_hero
        || troop.category(rules) == TroopCategory::Civilian
        || lore_locked
    {
        Expectation::Exempt
    } else {
        Expectation::Eligible
    }
}

/// Shared fixtures for every scenario.
#[derive(Debug, Clone)]
pub struct TesterAssets {
    pub catalog: TroopCatalog,
}

impl TesterAssets {
    /// Load the troop catalog bundled with the tester.
    #[must_use]
    pub fn load_default() -> Self {
        let catalog = TroopCatalog::from_json(DEFAULT_TROOPS).unwrap_or_else(|err| {
            log::error!("bundled troop catalog is invalid: {err}");
            TroopCatalog::default()
        });
        Self { catalog }
    }

    /// Troops that fight and are not heroes.
    pub fn regulars(&self) -> Vec<CharacterDescriptor> {
        self.catalog
            .descriptors()
            .filter(|d| !d.is_hero)
            .cloned()
            .collect()
    }

    pub fn heroes(&self) -> Vec<CharacterDescriptor> {
        self.catalog
            .descriptors()
            .filter(|d| d.is_hero)
            .cloned()
            .collect()
    }

    pub fn civilians(&self, config: &OverrideConfig) -> Vec<CharacterDescriptor> {
        self.catalog
            .descriptors()
            .filter(|d| d.category(&config.rules) == TroopCategory::Civilian)
            .cloned()
            .collect()
    }

    pub fn always_male(&self, config: &OverrideConfig) -> Vec<CharacterDescriptor> {
        self.catalog
            .descriptors()
            .filter(|d| config.rules.lore_lock(d.identity()) == Some(LoreLock::AlwaysMale))
            .cloned()
            .collect()
    }
}

/// Errors reading an override config file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid override config in {}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

/// Loads an [`OverrideConfig`] from a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileConfigLoader {
    path: PathBuf,
}

impl FileConfigLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConfigLoader for FileConfigLoader {
    type Error = ConfigFileError;

    fn load_config(&self) -> Result<OverrideConfig, Self::Error> {
        let json = std::fs::read_to_string(&self.path).map_err(|source| ConfigFileError::Read {
            path: self.path.clone(),
            source,
        })?;
        OverrideConfig::from_json(&json).map_err(|source| ConfigFileError::Invalid {
            path: self.path.clone(),
            source,
        })
    }
}
