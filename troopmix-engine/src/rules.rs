use serde::{Deserialize, Serialize};

/// Role a troop plays in the world, derived from its identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TroopCategory {
    /// Townsfolk, merchants, notables, entertainers and other non-combatants.
    Civilian,
    /// Anything that fights.
    Combatant,
}

/// Lore restriction pinning a troop line to one gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoreLock {
    AlwaysMale,
    AlwaysFemale,
}

/// Identity-key substrings that exempt troops from the override.
///
/// Entries are matched case-insensitively as substrings of the key. Lists are
/// stored lowercase whenever they are built or deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawExclusionRules")]
pub struct ExclusionRules {
    pub always_male: Vec<String>,
    pub always_female: Vec<String>,
    pub civilian: Vec<String>,
}

/// Wire form of [`ExclusionRules`] before normalization.
#[derive(Deserialize)]
struct RawExclusionRules {
    #[serde(default = "ExclusionRules::default_always_male")]
    always_male: Vec<String>,
    #[serde(default = "ExclusionRules::default_always_female")]
    always_female: Vec<String>,
    #[serde(default = "ExclusionRules::default_civilian")]
    civilian: Vec<String>,
}

impl From<RawExclusionRules> for ExclusionRules {
    fn from(raw: RawExclusionRules) -> Self {
        Self::new(raw.always_male, raw.always_female, raw.civilian)
    }
}

impl ExclusionRules {
    fn default_always_male() -> Vec<String> {
        to_owned_list(&[
            // Skolderbroda
            "sturgian_warrior_son",
            "sturgian_heroic_line_breaker",
            // Ghilman
            "aserai_mameluke_soldier",
            "aserai_mameluke_heavy_cavalry",
            "aserai_mameluke_guard",
            "aserai_vanguard_faris",
            "nord_huscarl",
        ])
    }

    fn default_always_female() -> Vec<String> {
        to_owned_list(&["sword_sister", "shield_maiden"])
    }

    fn default_civilian() -> Vec<String> {
        to_owned_list(&[
            "townsman",
            "townswoman",
            "villager",
            "village_",
            "merchant",
            "notable",
            "artisan",
            "gang_leader",
            "gangster",
            "tavernkeeper",
            "tavern_wench",
            "musician",
            "dancer",
            "shop_worker",
            "ransom_broker",
            "barber",
            "preacher",
            "headman",
            "_elder",
        ])
    }

    /// Rules with no entries at all; every troop is a combatant with no lore lock.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            always_male: Vec::new(),
            always_female: Vec::new(),
            civilian: Vec::new(),
        }
    }

    /// Build rules from raw lists, normalizing each entry.
    #[must_use]
    pub fn new(
        always_male: Vec<String>,
        always_female: Vec<String>,
        civilian: Vec<String>,
    ) -> Self {
        Self {
            always_male,
            always_female,
            civilian,
        }
        .normalized()
    }

    /// Lowercase and trim every entry, dropping blanks.
    ///
    /// A blank substring would match every key, so it is never kept.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            always_male: normalize_list(self.always_male),
            always_female: normalize_list(self.always_female),
            civilian: normalize_list(self.civilian),
        }
    }

    /// Classify an identity key. Keys that are absent or empty count as combatants.
    #[must_use]
    pub fn classify(&self, identity: Option<&str>) -> TroopCategory {
        if matches_any(identity, &self.civilian) {
            TroopCategory::Civilian
        } else {
            TroopCategory::Combatant
        }
    }

    /// Lore lock for an identity key, checking the always-male list first.
    #[must_use]
    pub fn lore_lock(&self, identity: Option<&str>) -> Option<LoreLock> {
        if matches_any(identity, &self.always_male) {
            Some(LoreLock::AlwaysMale)
        } else if matches_any(identity, &self.always_female) {
            Some(LoreLock::AlwaysFemale)
        } else {
            None
        }
    }
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self {
            always_male: Self::default_always_male(),
            always_female: Self::default_always_female(),
            civilian: Self::default_civilian(),
        }
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn normalize_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn matches_any(identity: Option<&str>, needles: &[String]) -> bool {
    let Some(id) = identity.filter(|id| !id.is_empty()) else {
        return false;
    };
    let id = id.to_lowercase();
    needles.iter().any(|needle| {
        let needle = needle.trim();
        !needle.is_empty() && id.contains(needle.to_lowercase().as_str())
    })
}
