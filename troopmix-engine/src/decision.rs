//! The override decision: should this character display as female?
//!
//! Rules run in a fixed order and the first one that applies wins. Only a
//! character that clears every exemption reaches the percentage roll.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::character::CharacterView;
use crate::config::OverrideConfig;
use crate::identity::ENTROPY_SEED;
use crate::rules::{LoreLock, TroopCategory};

/// Upper bound (exclusive) of the percentage roll.
pub const ROLL_RANGE: u8 = 100;

/// Which rule produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum Reason {
    Disabled,
    NoCharacter,
    AlreadyFemale,
    Hero,
    Civilian,
    LoreMale,
    LoreFemale,
    Rolled { draw: u8, seeded: bool },
}

/// Outcome of a decision plus the rule behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub female: bool,
    pub reason: Reason,
}

impl Verdict {
    const fn exempt(reason: Reason) -> Self {
        Self {
            female: false,
            reason,
        }
    }

    #[must_use]
    pub const fn is_female(self) -> bool {
        self.female
    }

    /// True when the character went through the percentage roll.
    #[must_use]
    pub const fn was_rolled(self) -> bool {
        matches!(self.reason, Reason::Rolled { .. })
    }
}

/// Decide whether `character` should display as female.
///
/// A non-zero `seed` makes the result reproducible; zero draws from process
/// entropy.
#[must_use]
pub fn decide(character: Option<&dyn CharacterView>, seed: u64, config: &OverrideConfig) -> bool {
    explain(character, seed, config).is_female()
}

/// Same as [`decide`] but reports which rule fired.
#[must_use]
pub fn explain(
    character: Option<&dyn CharacterView>,
    seed: u64,
    config: &OverrideConfig,
) -> Verdict {
    if !config.enabled {
        return Verdict::exempt(Reason::Disabled);
    }
    let Some(character) = character else {
        return Verdict::exempt(Reason::NoCharacter);
    };
    if character.is_female() {
        return Verdict::exempt(Reason::AlreadyFemale);
    }
    if character.is_hero() {
        return Verdict::exempt(Reason::Hero);
    }
    if character.category(&config.rules) == TroopCategory::Civilian {
        return Verdict::exempt(Reason::Civilian);
    }
    if config.lore_friendly {
        match config.rules.lore_lock(character.identity()) {
            Some(LoreLock::AlwaysMale) => return Verdict::exempt(Reason::LoreMale),
            Some(LoreLock::AlwaysFemale) => return Verdict::exempt(Reason::LoreFemale),
            None => {}
        }
    }

    let seeded = seed != ENTROPY_SEED;
    let draw = if seeded {
        roll(&mut ChaCha20Rng::seed_from_u64(seed))
    } else {
        roll(&mut rand::thread_rng())
    };
    Verdict {
        female: draw < config.female_percentage,
        reason: Reason::Rolled { draw, seeded },
    }
}

fn roll<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.gen_range(0..ROLL_RANGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::CharacterDescriptor;
    use crate::identity::mix_seed;

    fn full_female() -> OverrideConfig {
        OverrideConfig::default().with_female_percentage(100)
    }

    #[test]
    fn disabled_config_never_overrides() {
        let troop = CharacterDescriptor::troop("imperial_legionary");
        let config = full_female().with_enabled(false);
        assert_eq!(explain(Some(&troop), 7, &config).reason, Reason::Disabled);
    }

    #[test]
    fn missing_character_is_not_overridden() {
        assert_eq!(
            explain(None, 7, &full_female()),
            Verdict {
                female: false,
                reason: Reason::NoCharacter
            }
        );
    }

    #[test]
    fn rule_order_puts_female_before_hero() {
        let both = CharacterDescriptor {
            identity: "lady_warrior".into(),
            is_hero: true,
            is_female: true,
        };
        assert_eq!(
            explain(Some(&both), 1, &full_female()).reason,
            Reason::AlreadyFemale
        );
    }

    #[test]
    fn heroes_are_exempt() {
        let hero = CharacterDescriptor::hero("lord_4_1");
        assert_eq!(explain(Some(&hero), 1, &full_female()).reason, Reason::Hero);
    }

    #[test]
    fn civilians_are_exempt_in_both_modes() {
        let elder = CharacterDescriptor::troop("village_elder_07");
        for lore in [true, false] {
            let config = full_female().with_lore_friendly(lore);
            assert_eq!(explain(Some(&elder), 3, &config).reason, Reason::Civilian);
        }
    }

    #[test]
    fn lore_locks_only_apply_in_lore_mode() {
        let mameluke = CharacterDescriptor::troop("aserai_mameluke_soldier");
        assert_eq!(
            explain(Some(&mameluke), 11, &full_female()).reason,
            Reason::LoreMale
        );
        let verdict = explain(Some(&mameluke), 11, &full_female().with_lore_friendly(false));
        assert!(verdict.female);
        assert!(verdict.was_rolled());
    }

    #[test]
    fn always_female_lines_are_left_alone_in_lore_mode() {
        let sister = CharacterDescriptor::troop("battanian_sword_sister");
        assert_eq!(
            explain(Some(&sister), 5, &full_female()).reason,
            Reason::LoreFemale
        );
    }

    #[test]
    fn seeded_rolls_are_reproducible() {
        let troop = CharacterDescriptor::troop("khuzait_lancer");
        let config = OverrideConfig::default();
        let seed = mix_seed(Some("khuzait_lancer"), 12);
        let first = explain(Some(&troop), seed, &config);
        for _ in 0..20 {
            assert_eq!(explain(Some(&troop), seed, &config), first);
        }
        assert!(matches!(first.reason, Reason::Rolled { seeded: true, .. }));
    }

    #[test]
    fn zero_seed_draws_from_entropy() {
        let troop = CharacterDescriptor::troop("looter");
        let verdict = explain(Some(&troop), 0, &OverrideConfig::default());
        assert!(matches!(verdict.reason, Reason::Rolled { seeded: false, draw } if draw < 100));
    }

    #[test]
    fn extreme_percentages_are_absolute() {
        let troop = CharacterDescriptor::troop("vlandian_crossbowman");
        let never = OverrideConfig::default().with_female_percentage(0);
        let always = full_female();
        for seed in 0..200 {
            assert!(!decide(Some(&troop), seed, &never));
            assert!(decide(Some(&troop), seed, &always));
        }
    }
}
