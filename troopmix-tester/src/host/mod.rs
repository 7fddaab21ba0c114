//! A stand-in for the game engine: it spawns agents and builds portrait view
//! models, calling the override hooks the way the real integration does.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use thiserror::Error;
use troopmix_engine::{
    ActivationScope, CharacterDescriptor, GenderOverrideHooks, OverrideHooks, SettingsSource,
    VisualPath,
};

pub mod sites;
pub use sites::standard_sites;

/// One spawned agent as the host saw it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnedAgent {
    pub identity: String,
    pub origin_seed: u64,
    /// Gender used for the body.
    pub female: bool,
    /// Body and voice reads agreed.
    pub consistent: bool,
    /// What a captain read in the middle of the spawn returned, if one was read.
    pub captain_female: Option<bool>,
}

/// A rendered troop portrait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Portrait {
    pub identity: String,
    pub path: VisualPath,
    pub female: bool,
}

/// Host work failing between the before and after hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("host spawn aborted")]
pub struct HostFault;

/// Simulated engine driving a set of hooks.
pub struct SimulatedHost<H> {
    hooks: H,
}

impl<H: OverrideHooks> SimulatedHost<H> {
    pub const fn new(hooks: H) -> Self {
        Self { hooks }
    }

    /// The host's is-female getter, with the postfix applied.
    pub fn read_is_female(&self, character: &CharacterDescriptor) -> bool {
        self.hooks
            .intercept_gender_read(character, character.is_female)
    }

    /// Spawn one agent using paired before/after hooks.
    pub fn spawn_agent(
        &self,
        troop: &CharacterDescriptor,
        origin_seed: u64,
        captain: Option<&CharacterDescriptor>,
    ) -> SpawnedAgent {
        self.hooks.before_spawn(Some(troop), origin_seed);
        let agent = self.build_agent(troop, origin_seed, captain);
        self.hooks.after_spawn();
        agent
    }

    fn build_agent(
        &self,
        troop: &CharacterDescriptor,
        origin_seed: u64,
        captain: Option<&CharacterDescriptor>,
    ) -> SpawnedAgent {
        let body = self.read_is_female(troop);
        let captain_female = captain.map(|c| self.read_is_female(c));
        let voice = self.read_is_female(troop);
        SpawnedAgent {
            identity: troop.identity.clone(),
            origin_seed,
            female: body,
            consistent: body == voice,
            captain_female,
        }
    }

    /// Spawn a whole battle roster. Origin seeds are derived from `battle_seed`.
    pub fn spawn_battle(
        &self,
        roster: &[CharacterDescriptor],
        battle_seed: u64,
        captain: Option<&CharacterDescriptor>,
    ) -> Vec<SpawnedAgent> {
        origin_seeds(battle_seed, roster.len())
            .into_iter()
            .zip(roster)
            .map(|(seed, troop)| self.spawn_agent(troop, seed, captain))
            .collect()
    }

    /// Build party screen rows; the row index is the context value.
    pub fn render_party_screen(&self, roster: &[CharacterDescriptor]) -> Vec<Portrait> {
        roster
            .iter()
            .enumerate()
            .map(|(slot, troop)| {
                let slot = u64::try_from(slot).unwrap_or(u64::MAX);
                self.render(troop, VisualPath::PartyRoster { slot })
            })
            .collect()
    }

    pub fn render_encyclopedia(&self, troop: &CharacterDescriptor) -> Portrait {
        self.render(troop, VisualPath::Encyclopedia)
    }

    pub fn render_recruitment(&self, volunteers: &[CharacterDescriptor]) -> Vec<Portrait> {
        volunteers
            .iter()
            .enumerate()
            .map(|(index, troop)| {
                let index = u64::try_from(index).unwrap_or(u64::MAX);
                self.render(troop, VisualPath::Recruitment { index })
            })
            .collect()
    }

    fn render(&self, troop: &CharacterDescriptor, path: VisualPath) -> Portrait {
        self.hooks.before_visual_construct(Some(troop), path);
        let female = self.read_is_female(troop);
        self.hooks.after_visual_construct();
        Portrait {
            identity: troop.identity.clone(),
            path,
            female,
        }
    }

    /// Paired hooks with the host failing before the after hook runs.
    ///
    /// Returns whether the override was still active once the fault propagated.
    pub fn faulty_spawn_paired(&self, troop: &CharacterDescriptor, origin_seed: u64) -> bool {
        self.hooks.before_spawn(Some(troop), origin_seed);
        match self.aborted_build(troop) {
            Ok(_) => self.hooks.after_spawn(),
            Err(fault) => log::debug!("{fault} for {}", troop.identity),
        }
        ActivationScope::current().is_active()
    }

    fn aborted_build(&self, troop: &CharacterDescriptor) -> Result<SpawnedAgent, HostFault> {
        let _partial = self.read_is_female(troop);
        Err(HostFault)
    }
}

impl<S: SettingsSource> SimulatedHost<GenderOverrideHooks<S>> {
    /// Scoped hooks with the host failing mid-spawn.
    ///
    /// Returns whether the override was still active once the fault propagated.
    pub fn faulty_spawn_scoped(&self, troop: &CharacterDescriptor, origin_seed: u64) -> bool {
        let outcome = self
            .hooks
            .spawn_scoped(Some(troop), origin_seed, || self.aborted_build(troop));
        if let Err(fault) = outcome {
            log::debug!("{fault} for {}", troop.identity);
        }
        ActivationScope::current().is_active()
    }

    /// Spawn one agent with the override scoped to the host call.
    pub fn spawn_agent_scoped(
        &self,
        troop: &CharacterDescriptor,
        origin_seed: u64,
        captain: Option<&CharacterDescriptor>,
    ) -> SpawnedAgent {
        self.hooks.spawn_scoped(Some(troop), origin_seed, || {
            self.build_agent(troop, origin_seed, captain)
        })
    }
}

/// Non-zero per-agent origin seeds for a battle.
pub fn origin_seeds(battle_seed: u64, count: usize) -> Vec<u64> {
    let mut rng = ChaCha20Rng::seed_from_u64(battle_seed);
    (0..count).map(|_| rng.r#gen::<u64>() | 1).collect()
}
