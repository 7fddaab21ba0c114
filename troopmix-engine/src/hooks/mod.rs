//! Hook points an integration layer wires into the host engine.
//!
//! The host calls a "before" hook, does its own work (reading the gender
//! attribute through [`OverrideHooks::intercept_gender_read`] as often as it
//! likes), then calls the matching "after" hook. Integrations that can wrap
//! the host call in a closure should prefer the `*_scoped` helpers, which
//! disable the override on every exit path.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

use crate::character::CharacterView;
use crate::config::{OverrideConfig, SettingsSource};
use crate::identity::mix_seed;
use crate::scope::ActivationScope;

pub mod install;
pub use install::{HookSite, InstallError, InstallReport, install_all};

/// UI construction paths that render a troop portrait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "path")]
pub enum VisualPath {
    /// Party screen row; `slot` is whatever stable value the host has for the row.
    PartyRoster { slot: u64 },
    /// Encyclopedia unit page. Always shows the template's own look.
    Encyclopedia,
    /// Volunteer recruitment menu; `index` is the volunteer's position.
    Recruitment { index: u64 },
}

impl VisualPath {
    /// Context value mixed into the identity seed.
    #[must_use]
    pub const fn context_seed(self) -> u64 {
        match self {
            Self::PartyRoster { slot } => slot,
            Self::Encyclopedia => 0,
            Self::Recruitment { index } => index,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PartyRoster { .. } => "party_roster",
            Self::Encyclopedia => "encyclopedia",
            Self::Recruitment { .. } => "recruitment",
        }
    }
}

/// Interception points the host integration calls into.
pub trait OverrideHooks {
    /// Before the host spawns an agent. `origin_seed` is the host's spawn-origin seed.
    fn before_spawn(&self, character: Option<&dyn CharacterView>, origin_seed: u64);
    fn after_spawn(&self);
    /// Before the host builds a view model showing `character`.
    fn before_visual_construct(&self, character: Option<&dyn CharacterView>, path: VisualPath);
    fn after_visual_construct(&self);
    /// Postfix on the host's is-female getter; returns the value the host should see.
    fn intercept_gender_read(&self, instance: &dyn CharacterView, host_value: bool) -> bool;
}

fn disabled_config() -> &'static OverrideConfig {
    static DISABLED: OnceLock<OverrideConfig> = OnceLock::new();
    DISABLED.get_or_init(|| OverrideConfig::default().with_enabled(false))
}

/// The gender override wired to a live settings source.
#[derive(Debug, Clone)]
pub struct GenderOverrideHooks<S> {
    settings: S,
}

impl<S: SettingsSource> GenderOverrideHooks<S> {
    pub const fn new(settings: S) -> Self {
        Self { settings }
    }

    pub const fn settings(&self) -> &S {
        &self.settings
    }

    fn enable(&self, character: Option<&dyn CharacterView>, seed: u64) -> bool {
        let scope = ActivationScope::current();
        match self.settings.current() {
            Some(config) => scope.enable(character, seed, &config),
            None => scope.enable(character, seed, disabled_config()),
        }
    }

    /// Seed for a portrait, or `None` when the path should be left alone.
    fn visual_seed(character: Option<&dyn CharacterView>, path: VisualPath) -> Option<u64> {
        let character = character.filter(|c| !c.is_hero())?;
        Some(mix_seed(character.identity(), path.context_seed()))
    }

    /// Run a host spawn with the override active for its whole duration.
    pub fn spawn_scoped<R>(
        &self,
        character: Option<&dyn CharacterView>,
        origin_seed: u64,
        work: impl FnOnce() -> R,
    ) -> R {
        if character.is_none() {
            return work();
        }
        let _guard = ScopeReset;
        self.enable(character, origin_seed);
        work()
    }

    /// Run a view-model construction with the override active for its whole duration.
    pub fn visual_scoped<R>(
        &self,
        character: Option<&dyn CharacterView>,
        path: VisualPath,
        work: impl FnOnce() -> R,
    ) -> R {
        let Some(seed) = Self::visual_seed(character, path) else {
            return work();
        };
        let _guard = ScopeReset;
        self.enable(character, seed);
        work()
    }
}

/// Disables the current scope when dropped.
struct ScopeReset;

impl Drop for ScopeReset {
    fn drop(&mut self) {
        ActivationScope::current().disable();
    }
}

impl<S: SettingsSource> OverrideHooks for GenderOverrideHooks<S> {
    fn before_spawn(&self, character: Option<&dyn CharacterView>, origin_seed: u64) {
        if character.is_none() {
            return;
        }
        self.enable(character, origin_seed);
    }

    fn after_spawn(&self) {
        ActivationScope::current().disable();
    }

    fn before_visual_construct(&self, character: Option<&dyn CharacterView>, path: VisualPath) {
        if let Some(seed) = Self::visual_seed(character, path) {
            log::trace!("visual override on {} path", path.label());
            self.enable(character, seed);
        }
    }

    fn after_visual_construct(&self) {
        ActivationScope::current().disable();
    }

    fn intercept_gender_read(&self, instance: &dyn CharacterView, host_value: bool) -> bool {
        if ActivationScope::current().applies_to(instance) {
            true
        } else {
            host_value
        }
    }
}

impl<T: OverrideHooks + ?Sized> OverrideHooks for Arc<T> {
    fn before_spawn(&self, character: Option<&dyn CharacterView>, origin_seed: u64) {
        (**self).before_spawn(character, origin_seed);
    }

    fn after_spawn(&self) {
        (**self).after_spawn();
    }

    fn before_visual_construct(&self, character: Option<&dyn CharacterView>, path: VisualPath) {
        (**self).before_visual_construct(character, path);
    }

    fn after_visual_construct(&self) {
        (**self).after_visual_construct();
    }

    fn intercept_gender_read(&self, instance: &dyn CharacterView, host_value: bool) -> bool {
        (**self).intercept_gender_read(instance, host_value)
    }
}
