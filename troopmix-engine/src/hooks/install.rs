use serde::Serialize;
use thiserror::Error;

/// Why a hook site could not be installed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstallError {
    #[error("host type {type_name} not found")]
    TypeNotFound { type_name: String },
    #[error("{type_name} has no member {member}")]
    MemberNotFound { type_name: String, member: String },
    #[error("host rejected the patch: {reason}")]
    Rejected { reason: String },
}

/// One interception point in the host, installed independently of the others.
pub trait HookSite {
    fn name(&self) -> &str;

    /// Attach the hook to the host.
    ///
    /// # Errors
    ///
    /// Returns an error when the host type or member cannot be found or the
    /// host refuses the patch.
    fn install(&mut self) -> Result<(), InstallError>;
}

/// Which sites went in and which did not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub installed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl InstallReport {
    #[must_use]
    pub fn all_installed(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Install every site, logging failures and carrying on.
pub fn install_all(sites: &mut [Box<dyn HookSite + '_>]) -> InstallReport {
    let mut report = InstallReport::default();
    for site in sites.iter_mut() {
        let name = site.name().to_string();
        match site.install() {
            Ok(()) => {
                log::debug!("installed hook {name}");
                report.installed.push(name);
            }
            Err(err) => {
                log::warn!("skipping hook {name}: {err}");
                report.failed.push((name, err.to_string()));
            }
        }
    }
    log::info!(
        "hooks installed: {} ok, {} failed",
        report.installed.len(),
        report.failed.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixtureSite {
        name: &'static str,
        outcome: Result<(), InstallError>,
        attempts: usize,
    }

    impl HookSite for FixtureSite {
        fn name(&self) -> &str {
            self.name
        }

        fn install(&mut self) -> Result<(), InstallError> {
            self.attempts += 1;
            self.outcome.clone()
        }
    }

    #[test]
    fn failures_do_not_stop_later_sites() {
        let mut sites: Vec<Box<dyn HookSite>> = vec![
            Box::new(FixtureSite {
                name: "party_roster",
                outcome: Err(InstallError::TypeNotFound {
                    type_name: "PartyCharacterVM".into(),
                }),
                attempts: 0,
            }),
            Box::new(FixtureSite {
                name: "spawn",
                outcome: Ok(()),
                attempts: 0,
            }),
        ];
        let report = install_all(&mut sites);
        assert_eq!(report.installed, vec!["spawn".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "party_roster");
        assert!(report.failed[0].1.contains("PartyCharacterVM"));
        assert!(!report.all_installed());
    }

    #[test]
    fn empty_site_list_is_clean() {
        let report = install_all(&mut []);
        assert!(report.all_installed());
        assert!(report.installed.is_empty());
    }
}
