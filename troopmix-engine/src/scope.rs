//! Per-thread (or per-task) activation record for a pending override.
//!
//! A "before" hook enables the override, host code reads the gender
//! attribute any number of times, and the matching "after" hook disables it.
//! Every unit of work owns its record, so concurrent spawns never see each
//! other's verdicts.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::marker::PhantomData;

use crate::character::CharacterView;
use crate::config::OverrideConfig;
use crate::decision::explain;

thread_local! {
    static THREAD_RECORD: RefCell<ActivationRecord> =
        const { RefCell::new(ActivationRecord::idle()) };
}

/// Current override state of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub active: bool,
    pub verdict: bool,
    pub target: Option<String>,
    /// Whether the verdict is limited to `target`, fixed when enabled.
    pub strict: bool,
}

impl ActivationRecord {
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            active: false,
            verdict: false,
            target: None,
            strict: false,
        }
    }
}

#[cfg(feature = "async")]
fn with_record<R>(f: impl FnOnce(&RefCell<ActivationRecord>) -> R) -> R {
    if task::in_isolated_task() {
        task::TASK_RECORD.with(f)
    } else {
        THREAD_RECORD.with(f)
    }
}

#[cfg(not(feature = "async"))]
fn with_record<R>(f: impl FnOnce(&RefCell<ActivationRecord>) -> R) -> R {
    THREAD_RECORD.with(f)
}

/// Handle to the activation record of the current unit of work.
///
/// The handle is `!Send`: it always refers to the thread (or isolated task)
/// that created it.
#[derive(Debug, Clone, Copy)]
pub struct ActivationScope {
    _local: PhantomData<*const ()>,
}

impl ActivationScope {
    #[must_use]
    pub const fn current() -> Self {
        Self {
            _local: PhantomData,
        }
    }

    /// Decide for `character` and store the verdict. Returns the verdict.
    ///
    /// Enabling while already active overwrites the previous record; nested
    /// overrides are not supported.
    pub fn enable(
        &self,
        character: Option<&dyn CharacterView>,
        seed: u64,
        config: &OverrideConfig,
    ) -> bool {
        let verdict = explain(character, seed, config);
        let target = character.and_then(|c| c.identity()).map(str::to_owned);
        log::debug!(
            "override enabled for {:?}: female={} ({:?})",
            target,
            verdict.female,
            verdict.reason
        );
        with_record(|cell| {
            let mut record = cell.borrow_mut();
            if record.active {
                log::warn!(
                    "override for {:?} replaced by {:?} before it was disabled",
                    record.target,
                    target
                );
            }
            *record = ActivationRecord {
                active: true,
                verdict: verdict.female,
                target,
                strict: config.strict_target,
            };
        });
        verdict.female
    }

    /// Return to idle. Safe to call when nothing is active.
    pub fn disable(&self) {
        with_record(|cell| *cell.borrow_mut() = ActivationRecord::idle());
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        with_record(|cell| cell.borrow().active)
    }

    /// Stored verdict; always false while idle.
    #[must_use]
    pub fn current_verdict(&self) -> bool {
        with_record(|cell| {
            let record = cell.borrow();
            record.active && record.verdict
        })
    }

    /// Whether `candidate` is the character the active override was computed for.
    #[must_use]
    pub fn is_target(&self, candidate: &dyn CharacterView) -> bool {
        with_record(|cell| {
            let record = cell.borrow();
            match (record.active, record.target.as_deref(), candidate.identity()) {
                (true, Some(target), Some(id)) => target == id,
                _ => false,
            }
        })
    }

    /// Whether a gender read of `candidate` should see the override.
    ///
    /// Uses the strictness captured by `enable`, so a settings change while
    /// active cannot widen the verdict to other characters.
    #[must_use]
    pub fn applies_to(&self, candidate: &dyn CharacterView) -> bool {
        with_record(|cell| {
            let record = cell.borrow();
            if !(record.active && record.verdict) {
                return false;
            }
            if !record.strict {
                return true;
            }
            matches!(
                (record.target.as_deref(), candidate.identity()),
                (Some(target), Some(id)) if target == id
            )
        })
    }

    #[must_use]
    pub fn record(&self) -> ActivationRecord {
        with_record(|cell| cell.borrow().clone())
    }

    /// Enable and return a guard that disables on drop, including during unwinding.
    #[must_use = "the override is disabled as soon as the guard is dropped"]
    pub fn activate(
        &self,
        character: Option<&dyn CharacterView>,
        seed: u64,
        config: &OverrideConfig,
    ) -> OverrideGuard {
        let verdict = self.enable(character, seed, config);
        OverrideGuard {
            scope: *self,
            verdict,
        }
    }

    /// Run `work` with the override enabled, disabling it however `work` exits.
    pub fn with_override<R>(
        &self,
        character: Option<&dyn CharacterView>,
        seed: u64,
        config: &OverrideConfig,
        work: impl FnOnce() -> R,
    ) -> R {
        let _guard = self.activate(character, seed, config);
        work()
    }
}

impl Default for ActivationScope {
    fn default() -> Self {
        Self::current()
    }
}

/// Keeps an override active until dropped.
#[derive(Debug)]
pub struct OverrideGuard {
    scope: ActivationScope,
    verdict: bool,
}

impl OverrideGuard {
    #[must_use]
    pub const fn verdict(&self) -> bool {
        self.verdict
    }
}

impl Drop for OverrideGuard {
    fn drop(&mut self) {
        self.scope.disable();
    }
}

/// Task-local records for async hosts.
#[cfg(feature = "async")]
pub mod task {
    use std::cell::RefCell;
    use std::future::Future;

    use super::ActivationRecord;

    tokio::task_local! {
        pub(super) static TASK_RECORD: RefCell<ActivationRecord>;
    }

    /// Run `fut` with its own activation record, independent of the thread
    /// it is polled on.
    pub async fn isolated<F: Future>(fut: F) -> F::Output {
        TASK_RECORD
            .scope(RefCell::new(ActivationRecord::idle()), fut)
            .await
    }

    /// True while polled inside [`isolated`].
    #[must_use]
    pub fn in_isolated_task() -> bool {
        TASK_RECORD.try_with(|_| ()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::CharacterDescriptor;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn always() -> OverrideConfig {
        OverrideConfig::default().with_female_percentage(100)
    }

    #[test]
    fn starts_idle() {
        let scope = ActivationScope::current();
        assert!(!scope.is_active());
        assert!(!scope.current_verdict());
        assert_eq!(scope.record(), ActivationRecord::idle());
    }

    #[test]
    fn enable_then_disable_cycles_state() {
        let scope = ActivationScope::current();
        let troop = CharacterDescriptor::troop("empire_trained_infantryman");
        assert!(scope.enable(Some(&troop), 9, &always()));
        assert!(scope.is_active());
        assert!(scope.current_verdict());
        assert_eq!(
            scope.record().target.as_deref(),
            Some("empire_trained_infantryman")
        );
        scope.disable();
        assert_eq!(scope.record(), ActivationRecord::idle());
    }

    #[test]
    fn exempt_character_is_active_but_male() {
        let scope = ActivationScope::current();
        let hero = CharacterDescriptor::hero("lord_2_3");
        assert!(!scope.enable(Some(&hero), 9, &always()));
        assert!(scope.is_active());
        assert!(!scope.current_verdict());
        scope.disable();
    }

    #[test]
    fn target_check_rejects_other_characters() {
        let scope = ActivationScope::current();
        let troop = CharacterDescriptor::troop("sturgian_spearman");
        let bystander = CharacterDescriptor::troop("townsman_sturgia");
        scope.enable(Some(&troop), 4, &always());
        assert!(scope.is_target(&troop));
        assert!(!scope.is_target(&bystander));
        scope.disable();
        assert!(!scope.is_target(&troop));
    }

    #[test]
    fn strictness_is_captured_at_enable() {
        let scope = ActivationScope::current();
        let troop = CharacterDescriptor::troop("khuzait_hunter");
        let bystander = CharacterDescriptor::troop("khuzait_tribesman");
        scope.enable(Some(&troop), 6, &always());
        assert!(scope.record().strict);
        assert!(scope.applies_to(&troop));
        assert!(!scope.applies_to(&bystander));

        scope.enable(Some(&troop), 6, &always().with_strict_target(false));
        assert!(scope.applies_to(&bystander));
        scope.disable();
        assert!(!scope.applies_to(&troop));
    }

    #[test]
    fn missing_character_has_no_target() {
        let scope = ActivationScope::current();
        scope.enable(None, 4, &always());
        assert!(scope.is_active());
        assert!(!scope.current_verdict());
        assert!(!scope.is_target(&CharacterDescriptor::troop("anyone")));
        scope.disable();
    }

    #[test]
    fn reenable_overwrites_record() {
        let scope = ActivationScope::current();
        let first = CharacterDescriptor::troop("battanian_volunteer");
        let second = CharacterDescriptor::hero("lord_5_1");
        scope.enable(Some(&first), 3, &always());
        scope.enable(Some(&second), 3, &always());
        let record = scope.record();
        assert!(record.active);
        assert!(!record.verdict);
        assert_eq!(record.target.as_deref(), Some("lord_5_1"));
        scope.disable();
    }

    #[test]
    fn guard_disables_on_drop() {
        let scope = ActivationScope::current();
        let troop = CharacterDescriptor::troop("vlandian_recruit");
        {
            let guard = scope.activate(Some(&troop), 8, &always());
            assert!(guard.verdict());
            assert!(scope.current_verdict());
        }
        assert!(!scope.is_active());
    }

    #[test]
    fn guard_disables_when_work_panics() {
        let scope = ActivationScope::current();
        let troop = CharacterDescriptor::troop("aserai_recruit");
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            scope.with_override(Some(&troop), 8, &always(), || -> u8 {
                assert!(ActivationScope::current().current_verdict());
                panic!("host work failed")
            })
        }));
        assert!(outcome.is_err());
        assert!(!scope.is_active());
    }

    #[test]
    fn with_override_returns_work_result() {
        let scope = ActivationScope::current();
        let troop = CharacterDescriptor::troop("khuzait_nomad");
        let seen = scope.with_override(Some(&troop), 2, &always(), || {
            ActivationScope::current().current_verdict()
        });
        assert!(seen);
        assert!(!scope.is_active());
    }

    #[test]
    fn threads_do_not_share_records() {
        let scope = ActivationScope::current();
        let troop = CharacterDescriptor::troop("imperial_cataphract");
        scope.enable(Some(&troop), 1, &always());
        let other_thread_active = std::thread::spawn(|| ActivationScope::current().is_active())
            .join()
            .unwrap();
        assert!(!other_thread_active);
        assert!(scope.is_active());
        scope.disable();
    }
}
