use serde::{Deserialize, Serialize};

use crate::rules::{ExclusionRules, TroopCategory};

/// Read-only view of a host character object.
///
/// Host integrations implement this for their own character types so the
/// decision logic never touches host internals.
pub trait CharacterView {
    /// Stable identity key of the character's template, if the host exposes one.
    fn identity(&self) -> Option<&str>;
    fn is_hero(&self) -> bool;
    fn is_female(&self) -> bool;

    /// Category derived from the identity key.
    fn category(&self, rules: &ExclusionRules) -> TroopCategory {
        rules.classify(self.identity())
    }
}

/// Owned character snapshot, used by tests, fixtures and simulated hosts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterDescriptor {
    pub identity: String,
    #[serde(default)]
    pub is_hero: bool,
    #[serde(default)]
    pub is_female: bool,
}

impl CharacterDescriptor {
    /// A regular male troop template.
    #[must_use]
    pub fn troop(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            is_hero: false,
            is_female: false,
        }
    }

    /// A named character.
    #[must_use]
    pub fn hero(identity: impl Into<String>) -> Self {
        Self {
            is_hero: true,
            ..Self::troop(identity)
        }
    }

    /// A troop template that is already female.
    #[must_use]
    pub fn female(identity: impl Into<String>) -> Self {
        Self {
            is_female: true,
            ..Self::troop(identity)
        }
    }
}

impl CharacterView for CharacterDescriptor {
    fn identity(&self) -> Option<&str> {
        Some(self.identity.as_str()).filter(|id| !id.is_empty())
    }

    fn is_hero(&self) -> bool {
        self.is_hero
    }

    fn is_female(&self) -> bool {
        self.is_female
    }
}

impl<T: CharacterView + ?Sized> CharacterView for &T {
    fn identity(&self) -> Option<&str> {
        (**self).identity()
    }

    fn is_hero(&self) -> bool {
        (**self).is_hero()
    }

    fn is_female(&self) -> bool {
        (**self).is_female()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identity_reads_as_absent() {
        let nameless = CharacterDescriptor::troop("");
        assert_eq!(nameless.identity(), None);
        assert_eq!(
            CharacterDescriptor::troop("imperial_recruit").identity(),
            Some("imperial_recruit")
        );
    }

    #[test]
    fn constructors_set_flags() {
        assert!(CharacterDescriptor::hero("lord_1_1").is_hero());
        assert!(CharacterDescriptor::female("sword_sister").is_female());
        let plain = CharacterDescriptor::troop("looter");
        assert!(!plain.is_hero() && !plain.is_female());
    }

    #[test]
    fn category_uses_identity_key() {
        let rules = ExclusionRules::default();
        assert_eq!(
            CharacterDescriptor::troop("village_elder_07").category(&rules),
            TroopCategory::Civilian
        );
        assert_eq!(
            CharacterDescriptor::troop("sturgian_spearman").category(&rules),
            TroopCategory::Combatant
        );
    }

    #[test]
    fn deserializes_with_default_flags() {
        let desc: CharacterDescriptor =
            serde_json::from_str(r#"{ "identity": "vlandian_knight" }"#).unwrap();
        assert_eq!(desc, CharacterDescriptor::troop("vlandian_knight"));
    }
}
