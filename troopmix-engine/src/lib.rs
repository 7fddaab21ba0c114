//! Troopmix Engine
//!
//! Platform-agnostic core of the Troopmix add-on: decides which regular troops
//! display as women and keeps that verdict scoped to the unit of work that
//! asked for it. Host integrations talk to this crate through the
//! [`OverrideHooks`] interface and the [`CharacterView`] trait; nothing here
//! depends on host types.

pub mod character;
pub mod config;
pub mod decision;
pub mod hooks;
pub mod identity;
pub mod rules;
pub mod scope;

// Re-export commonly used types
pub use character::{CharacterDescriptor, CharacterView};
pub use config::{ConfigError, OverrideConfig, ReloadError, SettingsSource, SharedSettings};
pub use decision::{Reason, Verdict, decide, explain};
pub use hooks::{
    GenderOverrideHooks, HookSite, InstallError, InstallReport, OverrideHooks, VisualPath,
    install_all,
};
pub use identity::{mix_seed, stable_hash};
pub use rules::{ExclusionRules, LoreLock, TroopCategory};
pub use scope::{ActivationRecord, ActivationScope, OverrideGuard};

/// Trait for abstracting where override settings come from
/// Platform-specific implementations should provide this
pub trait ConfigLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the override configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read or is invalid.
    fn load_config(&self) -> Result<OverrideConfig, Self::Error>;
}

/// Build live settings from a loader.
///
/// # Errors
///
/// Returns the loader's error if the configuration cannot be loaded.
pub fn load_settings<L: ConfigLoader>(loader: &L) -> Result<SharedSettings, L::Error> {
    loader.load_config().map(SharedSettings::new)
}

/// Reload settings in place, keeping the previous snapshot on failure.
///
/// # Errors
///
/// Returns an error if loading fails or the new configuration is invalid.
pub fn reload_settings<L: ConfigLoader>(
    loader: &L,
    settings: &SharedSettings,
) -> Result<(), ReloadError<L::Error>> {
    let config = loader.load_config().map_err(ReloadError::Load)?;
    settings.replace(config)?;
    Ok(())
}
