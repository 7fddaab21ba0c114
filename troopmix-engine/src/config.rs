//! Override settings and the live settings source consulted by hooks.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::rules::ExclusionRules;

/// Highest meaningful female percentage.
pub const MAX_FEMALE_PERCENTAGE: u8 = 100;

/// Errors raised when override configuration cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("override config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("female_percentage must be between 0 and {max} (got {value})")]
    PercentageOutOfRange { value: u8, max: u8 },
}

/// Errors raised when reloading settings from a [`crate::ConfigLoader`].
#[derive(Debug, Error)]
pub enum ReloadError<E>
where
    E: std::error::Error + 'static,
{
    #[error("failed to load override config")]
    Load(#[source] E),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Snapshot of the user-facing settings plus the exclusion lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideConfig {
    #[serde(default = "OverrideConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "OverrideConfig::default_lore_friendly")]
    pub lore_friendly: bool,
    #[serde(default = "OverrideConfig::default_female_percentage")]
    pub female_percentage: u8,
    /// Apply a verdict only to the character it was computed for.
    #[serde(default = "OverrideConfig::default_strict_target")]
    pub strict_target: bool,
    #[serde(default)]
    pub rules: ExclusionRules,
}

impl OverrideConfig {
    const fn default_enabled() -> bool {
        true
    }

    const fn default_lore_friendly() -> bool {
        true
    }

    const fn default_female_percentage() -> u8 {
        50
    }

    const fn default_strict_target() -> bool {
        true
    }

    /// Parse, normalize and validate a JSON config document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the percentage exceeds 100.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.rules = config.rules.normalized();
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PercentageOutOfRange`] when `female_percentage > 100`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.female_percentage > MAX_FEMALE_PERCENTAGE {
            return Err(ConfigError::PercentageOutOfRange {
                value: self.female_percentage,
                max: MAX_FEMALE_PERCENTAGE,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_lore_friendly(mut self, lore_friendly: bool) -> Self {
        self.lore_friendly = lore_friendly;
        self
    }

    /// Set the percentage, clamping to 100.
    #[must_use]
    pub fn with_female_percentage(mut self, percentage: u8) -> Self {
        self.female_percentage = percentage.min(MAX_FEMALE_PERCENTAGE);
        self
    }

    #[must_use]
    pub fn with_strict_target(mut self, strict: bool) -> Self {
        self.strict_target = strict;
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: ExclusionRules) -> Self {
        self.rules = rules.normalized();
        self
    }
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            lore_friendly: Self::default_lore_friendly(),
            female_percentage: Self::default_female_percentage(),
            strict_target: Self::default_strict_target(),
            rules: ExclusionRules::default(),
        }
    }
}

/// Where hooks read the current settings from.
///
/// `None` means the settings object is not available yet and every decision
/// degrades to "no override".
pub trait SettingsSource: Send + Sync {
    fn current(&self) -> Option<Arc<OverrideConfig>>;
}

impl SettingsSource for OverrideConfig {
    fn current(&self) -> Option<Arc<OverrideConfig>> {
        Some(Arc::new(self.clone()))
    }
}

impl<T: SettingsSource + ?Sized> SettingsSource for Arc<T> {
    fn current(&self) -> Option<Arc<OverrideConfig>> {
        (**self).current()
    }
}

/// Settings that the host menu can change while hooks are running.
///
/// Readers get a cheap `Arc` snapshot; writers swap the whole config.
#[derive(Debug, Default)]
pub struct SharedSettings {
    inner: RwLock<Option<Arc<OverrideConfig>>>,
}

impl SharedSettings {
    #[must_use]
    pub fn new(config: OverrideConfig) -> Self {
        Self {
            inner: RwLock::new(Some(Arc::new(config))),
        }
    }

    /// Settings that have not been loaded yet.
    #[must_use]
    pub fn unloaded() -> Self {
        Self::default()
    }

    /// Normalize and validate a new snapshot, then swap it in.
    ///
    /// A lock poisoned by a panicking writer is recovered, so the new
    /// snapshot always lands.
    ///
    /// # Errors
    ///
    /// Returns the validation error and keeps the previous snapshot.
    pub fn replace(&self, mut config: OverrideConfig) -> Result<(), ConfigError> {
        config.rules = config.rules.normalized();
        config.validate()?;
        let mut guard = self.inner.write().unwrap_or_else(|poisoned| {
            log::warn!("settings lock poisoned; recovering");
            poisoned.into_inner()
        });
        *guard = Some(Arc::new(config));
        drop(guard);
        self.inner.clear_poison();
        Ok(())
    }

    /// Edit a copy of the current snapshot and swap it in.
    ///
    /// # Errors
    ///
    /// Returns the validation error and keeps the previous snapshot.
    pub fn update(&self, edit: impl FnOnce(&mut OverrideConfig)) -> Result<(), ConfigError> {
        let mut next = self
            .current()
            .map(|cfg| (*cfg).clone())
            .unwrap_or_default();
        edit(&mut next);
        self.replace(next)
    }
}

impl SettingsSource for SharedSettings {
    fn current(&self) -> Option<Arc<OverrideConfig>> {
        self.inner.read().ok().and_then(|guard| guard.clone())
    }
}
