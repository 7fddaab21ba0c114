use std::collections::BTreeSet;

use troopmix_engine::{HookSite, InstallError};

/// Members the integration patches, as `(site, host type, member)`.
pub const STANDARD_SITES: [(&str, &str, &str); 5] = [
    ("agent_spawn", "Mission", "SpawnAgent"),
    ("party_roster", "PartyCharacterVM", "SetCharacter"),
    ("encyclopedia", "EncyclopediaUnitPageVM", "Refresh"),
    ("recruitment", "RecruitVolunteerTroopVM", "ctor"),
    ("gender_read", "BasicCharacterObject", "get_IsFemale"),
];

/// A hook site against a simulated host build that may lack some members.
#[derive(Debug, Clone)]
pub struct SimulatedSite {
    name: String,
    type_name: String,
    member: String,
    present: bool,
    installed: bool,
}

impl SimulatedSite {
    pub fn new(name: &str, type_name: &str, member: &str, present: bool) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            member: member.to_string(),
            present,
            installed: false,
        }
    }
}

impl HookSite for SimulatedSite {
    fn name(&self) -> &str {
        &self.name
    }

    fn install(&mut self) -> Result<(), InstallError> {
        if self.installed {
            return Err(InstallError::Rejected {
                reason: format!("{} is already patched", self.name),
            });
        }
        if !self.present {
            return Err(InstallError::MemberNotFound {
                type_name: self.type_name.clone(),
                member: self.member.clone(),
            });
        }
        self.installed = true;
        Ok(())
    }
}

/// Every standard site, with the named sites missing from the host build.
pub fn standard_sites(missing: &BTreeSet<String>) -> Vec<Box<dyn HookSite>> {
    STANDARD_SITES
        .iter()
        .map(|(name, type_name, member)| {
            let present = !missing.contains(*name);
            Box::new(SimulatedSite::new(name, type_name, member, present)) as Box<dyn HookSite>
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use troopmix_engine::install_all;

    #[test]
    fn complete_host_installs_everything() {
        let mut sites = standard_sites(&BTreeSet::new());
        let report = install_all(&mut sites);
        assert!(report.all_installed());
        assert_eq!(report.installed.len(), STANDARD_SITES.len());
    }

    #[test]
    fn missing_member_is_reported_and_others_install() {
        let missing = BTreeSet::from(["encyclopedia".to_string()]);
        let mut sites = standard_sites(&missing);
        let report = install_all(&mut sites);
        assert_eq!(report.installed.len(), STANDARD_SITES.len() - 1);
        assert_eq!(report.failed[0].0, "encyclopedia");
        assert!(report.failed[0].1.contains("EncyclopediaUnitPageVM"));
    }

    #[test]
    fn second_install_is_rejected() {
        let mut site =
            SimulatedSite::new("gender_read", "BasicCharacterObject", "get_IsFemale", true);
        assert!(site.install().is_ok());
        assert!(site.installed);
        assert!(matches!(site.install(), Err(InstallError::Rejected { .. })));
    }
}
