//! Scenario catalog. Each scenario drives a fresh simulated host for one
//! iteration and either returns a sample of spawned troops or explains what
//! went wrong.

use anyhow::{Context, Result, anyhow, bail, ensure};
use std::sync::{Arc, Barrier};
use std::thread;

use troopmix_engine::scope::task;
use troopmix_engine::{
    ActivationScope, CharacterDescriptor, CharacterView, GenderOverrideHooks, LoreLock,
    OverrideConfig, OverrideHooks, Reason, SharedSettings, decide, explain, mix_seed,
};

use crate::assets::{Expectation, TesterAssets, expectation};
use crate::host::{Portrait, SimulatedHost, SpawnedAgent};

const STRESS_ROUNDS: usize = 500;
const TASK_ROUNDS: usize = 100;
const TASKS_PER_THREAD: usize = 4;

/// Everything one iteration may use.
pub struct IterationContext<'a> {
    pub assets: &'a TesterAssets,
    pub settings: &'a Arc<SharedSettings>,
    /// Snapshot of `settings` taken when the scenario started.
    pub base: &'a OverrideConfig,
    pub seed: u64,
    pub threads: usize,
}

/// Eligible troops seen and how many of them came out female.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    pub female: usize,
    pub eligible: usize,
}

impl Sample {
    pub const fn absorb(&mut self, other: Self) {
        self.female += other.female;
        self.eligible += other.eligible;
    }

    #[must_use]
    pub fn share(&self) -> f64 {
        if self.eligible == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let share = self.female as f64 / self.eligible as f64;
        share
    }

    const fn count(&mut self, female: bool) {
        self.eligible += 1;
        if female {
            self.female += 1;
        }
    }
}

type Check = fn(&IterationContext<'_>) -> Result<Sample>;

pub struct Scenario {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    check: Check,
}

impl Scenario {
    /// Run one iteration.
    ///
    /// # Errors
    ///
    /// Returns the first expectation the simulated host violated.
    pub fn run(&self, ctx: &IterationContext<'_>) -> Result<Sample> {
        (self.check)(ctx)
    }
}

static SCENARIOS: [Scenario; 9] = [
    Scenario {
        key: "smoke",
        name: "Smoke Test",
        description: "Battle spawn and party screen under the configured settings",
        check: smoke,
    },
    Scenario {
        key: "lore-friendly",
        name: "Lore-Friendly Locks",
        description: "Always-male and always-female troops with lore mode on and off",
        check: lore_friendly,
    },
    Scenario {
        key: "percentage-extremes",
        name: "Percentage Extremes",
        description: "0% never flips, 100% always flips every eligible troop",
        check: percentage_extremes,
    },
    Scenario {
        key: "determinism",
        name: "Deterministic Verdicts",
        description: "Same seeds give the same spawns and portraits on fresh hosts",
        check: determinism,
    },
    Scenario {
        key: "civilian-exempt",
        name: "Civilian Exemption",
        description: "Townsfolk and notables never change at any percentage",
        check: civilian_exempt,
    },
    Scenario {
        key: "strict-target",
        name: "Strict Target Reads",
        description: "A captain read mid-spawn is untouched in strict mode and leaks otherwise",
        check: strict_target,
    },
    Scenario {
        key: "guard-unwind",
        name: "Guard Unwind",
        description: "Aborted host work leaves no override behind when scoped",
        check: guard_unwind,
    },
    Scenario {
        key: "thread-stress",
        name: "Thread Stress",
        description: "Concurrent spawns on OS threads never share verdicts",
        check: thread_stress,
    },
    Scenario {
        key: "task-stress",
        name: "Task Stress",
        description: "Isolated tokio tasks hopping threads never share verdicts",
        check: task_stress,
    },
];

pub fn get_scenario(name: &str) -> Option<&'static Scenario> {
    let name = name.to_lowercase();
    SCENARIOS.iter().find(|s| s.key == name)
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    SCENARIOS.iter().map(|s| (s.key, s.description)).collect()
}

pub fn scenario_keys() -> impl Iterator<Item = &'static str> {
    SCENARIOS.iter().map(|s| s.key)
}

fn host(config: OverrideConfig) -> SimulatedHost<GenderOverrideHooks<OverrideConfig>> {
    SimulatedHost::new(GenderOverrideHooks::new(config))
}

/// Forced-on copy of the configured settings.
fn forced(ctx: &IterationContext<'_>, percentage: u8) -> OverrideConfig {
    ctx.base
        .clone()
        .with_enabled(true)
        .with_female_percentage(percentage)
}

fn eligible_regulars(assets: &TesterAssets, config: &OverrideConfig) -> Vec<CharacterDescriptor> {
    assets
        .regulars()
        .into_iter()
        .filter(|t| expectation(t, config) == Expectation::Eligible)
        .collect()
}

fn check_battle(
    troops: &[CharacterDescriptor],
    agents: &[SpawnedAgent],
    config: &OverrideConfig,
) -> Result<Sample> {
    ensure!(
        troops.len() == agents.len(),
        "spawned {} agents for {} troops",
        agents.len(),
        troops.len()
    );
    let mut sample = Sample::default();
    for (troop, agent) in troops.iter().zip(agents) {
        ensure!(
            agent.consistent,
            "{} changed gender between body and voice",
            troop.identity
        );
        let expected = troop.is_female || decide(Some(troop), agent.origin_seed, config);
        ensure!(
            agent.female == expected,
            "{} spawned female={} but the decision was {expected}",
            troop.identity,
            agent.female
        );
        match expectation(troop, config) {
            Expectation::Eligible => sample.count(agent.female),
            Expectation::Exempt => {
                ensure!(
                    !agent.female || troop.is_female,
                    "exempt troop {} spawned female",
                    troop.identity
                );
            }
        }
    }
    ensure!(
        !ActivationScope::current().is_active(),
        "override still active after the battle"
    );
    Ok(sample)
}

fn check_portraits(
    troops: &[CharacterDescriptor],
    portraits: &[Portrait],
    config: &OverrideConfig,
) -> Result<()> {
    for (troop, portrait) in troops.iter().zip(portraits) {
        let expected = if troop.is_hero {
            troop.is_female
        } else {
            let seed = mix_seed(troop.identity(), portrait.path.context_seed());
            troop.is_female || decide(Some(troop), seed, config)
        };
        ensure!(
            portrait.female == expected,
            "{} portrait on {} was female={} but the decision was {expected}",
            troop.identity,
            portrait.path.label(),
            portrait.female
        );
    }
    ensure!(
        !ActivationScope::current().is_active(),
        "override still active after rendering"
    );
    Ok(())
}

fn smoke(ctx: &IterationContext<'_>) -> Result<Sample> {
    let host = SimulatedHost::new(GenderOverrideHooks::new(Arc::clone(ctx.settings)));
    let mut roster = ctx.assets.regulars();
    roster.extend(ctx.assets.heroes());

    let agents = host.spawn_battle(&roster, ctx.seed, None);
    let sample = check_battle(&roster, &agents, ctx.base)?;

    let portraits = host.render_party_screen(&roster);
    check_portraits(&roster, &portraits, ctx.base)?;
    Ok(sample)
}

fn lore_friendly(ctx: &IterationContext<'_>) -> Result<Sample> {
    let lore = forced(ctx, 100).with_lore_friendly(true);
    let free = lore.clone().with_lore_friendly(false);

    let locked = ctx.assets.always_male(&lore);
    ensure!(
        !locked.is_empty(),
        "no catalog troop matches the always-male rules"
    );

    let agents = host(lore.clone()).spawn_battle(&locked, ctx.seed, None);
    if let Some(agent) = agents.iter().find(|a| a.female) {
        bail!("{} is lore-locked male but spawned female", agent.identity);
    }

    let agents = host(free.clone()).spawn_battle(&locked, ctx.seed, None);
    let sample = check_battle(&locked, &agents, &free)?;
    ensure!(
        sample.female == locked.len(),
        "only {}/{} unlocked troops flipped at 100%",
        sample.female,
        locked.len()
    );

    // Locked-female lines are left to the host even at 100%.
    for troop in ctx.assets.catalog.descriptors() {
        if lore.rules.lore_lock(troop.identity()) != Some(LoreLock::AlwaysFemale) {
            continue;
        }
        let unflagged = CharacterDescriptor::troop(troop.identity.clone());
        let verdict = explain(Some(&unflagged), ctx.seed, &lore);
        ensure!(
            verdict.reason == Reason::LoreFemale && !verdict.female,
            "{} should be left alone as lore-locked female, got {:?}",
            troop.identity,
            verdict.reason
        );
    }
    Ok(sample)
}

/// The returned sample comes from the 100% run.
fn percentage_extremes(ctx: &IterationContext<'_>) -> Result<Sample> {
    let never = forced(ctx, 0);
    let always = forced(ctx, 100);
    let roster = ctx.assets.regulars();

    let agents = host(never.clone()).spawn_battle(&roster, ctx.seed, None);
    let sample = check_battle(&roster, &agents, &never)?;
    ensure!(sample.female == 0, "{} troops flipped at 0%", sample.female);

    let agents = host(always.clone()).spawn_battle(&roster, ctx.seed, None);
    let sample = check_battle(&roster, &agents, &always)?;
    ensure!(
        sample.female == sample.eligible,
        "only {}/{} eligible troops flipped at 100%",
        sample.female,
        sample.eligible
    );
    Ok(sample)
}

fn determinism(ctx: &IterationContext<'_>) -> Result<Sample> {
    let config = ctx.base.clone();
    let roster = ctx.assets.regulars();
    let first = host(config.clone());
    let second = host(config.clone());

    let agents = first.spawn_battle(&roster, ctx.seed, None);
    ensure!(
        agents == second.spawn_battle(&roster, ctx.seed, None),
        "same battle seed produced different spawns"
    );
    ensure!(
        first.render_party_screen(&roster) == second.render_party_screen(&roster),
        "party screen differs between hosts"
    );
    ensure!(
        first.render_recruitment(&roster) == second.render_recruitment(&roster),
        "recruitment menu differs between hosts"
    );
    for troop in &roster {
        ensure!(
            first.render_encyclopedia(troop) == second.render_encyclopedia(troop),
            "encyclopedia page for {} differs between hosts",
            troop.identity
        );
    }
    for (troop, agent) in roster.iter().zip(&agents) {
        let verdict = explain(Some(troop), agent.origin_seed, &config);
        if verdict.was_rolled() {
            ensure!(
                matches!(verdict.reason, Reason::Rolled { seeded: true, .. }),
                "origin seed for {} was not used for the roll",
                agent.identity
            );
        }
    }
    check_battle(&roster, &agents, &config)
}

fn civilian_exempt(ctx: &IterationContext<'_>) -> Result<Sample> {
    let config = forced(ctx, 100).with_lore_friendly(ctx.seed % 2 == 0);
    let civilians = ctx.assets.civilians(&config);
    ensure!(!civilians.is_empty(), "no catalog troop matches the civilian rules");

    let host = host(config);
    for agent in host.spawn_battle(&civilians, ctx.seed, None) {
        let flagged = civilians
            .iter()
            .any(|c| c.identity == agent.identity && c.is_female);
        ensure!(
            !agent.female || flagged,
            "civilian {} spawned female",
            agent.identity
        );
    }
    let portraits = host
        .render_party_screen(&civilians)
        .into_iter()
        .chain(host.render_recruitment(&civilians));
    for portrait in portraits {
        let flagged = civilians
            .iter()
            .any(|c| c.identity == portrait.identity && c.is_female);
        ensure!(
            !portrait.female || flagged,
            "civilian {} rendered female on {}",
            portrait.identity,
            portrait.path.label()
        );
    }
    Ok(Sample::default())
}

fn strict_target(ctx: &IterationContext<'_>) -> Result<Sample> {
    let strict = forced(ctx, 100)
        .with_lore_friendly(false)
        .with_strict_target(true);
    let loose = strict.clone().with_strict_target(false);
    let troops = eligible_regulars(ctx.assets, &strict);
    let captain = ctx
        .assets
        .heroes()
        .into_iter()
        .find(|h| !h.is_female)
        .context("catalog has no male lord to lead the battle")?;

    let agents = host(strict.clone()).spawn_battle(&troops, ctx.seed, Some(&captain));
    let sample = check_battle(&troops, &agents, &strict)?;
    for agent in &agents {
        ensure!(
            agent.captain_female == Some(false),
            "captain read leaked the verdict for {} in strict mode",
            agent.identity
        );
    }

    let agents = host(loose).spawn_battle(&troops, ctx.seed, Some(&captain));
    for agent in &agents {
        ensure!(
            agent.captain_female == Some(true),
            "captain read during {} did not see the verdict in loose mode",
            agent.identity
        );
    }
    Ok(sample)
}

/// Drops the guard on the early-return path.
fn abandoned_activation(
    troop: &CharacterDescriptor,
    seed: u64,
    config: &OverrideConfig,
) -> Result<()> {
    let guard = ActivationScope::current().activate(Some(troop), seed, config);
    ensure!(!guard.verdict(), "activation for {} abandoned", troop.identity);
    Ok(())
}

fn guard_unwind(ctx: &IterationContext<'_>) -> Result<Sample> {
    let config = forced(ctx, 100).with_lore_friendly(false);
    let troop = eligible_regulars(ctx.assets, &config)
        .into_iter()
        .next()
        .context("catalog has no eligible troop")?;
    let host = host(config.clone());
    let scope = ActivationScope::current();
    let seed = ctx.seed | 1;

    // Paired hooks leak when the host bails out between them.
    ensure!(
        host.faulty_spawn_paired(&troop, seed),
        "paired hooks unexpectedly cleaned up after a host fault"
    );
    ensure!(
        host.read_is_female(&troop),
        "leaked override was not visible to the next read"
    );
    scope.disable();

    ensure!(
        !host.faulty_spawn_scoped(&troop, seed),
        "scoped spawn left the override active after a host fault"
    );
    ensure!(
        !host.read_is_female(&troop),
        "override visible after scoped spawn ended"
    );

    ensure!(
        abandoned_activation(&troop, seed, &config).is_err(),
        "activation should have been abandoned"
    );
    ensure!(!scope.is_active(), "guard did not disable on early return");

    let agent = host.spawn_agent_scoped(&troop, seed, None);
    ensure!(agent.female, "scoped spawn at 100% did not flip {}", troop.identity);
    ensure!(!scope.is_active(), "scoped spawn left the override active");

    let mut sample = Sample::default();
    sample.count(agent.female);
    Ok(sample)
}

fn stress_seed(base: u64, worker: usize, round: usize) -> u64 {
    let offset = u64::try_from(worker * STRESS_ROUNDS + round).unwrap_or(u64::MAX);
    base.wrapping_mul(0x9E37_79B9).wrapping_add(offset) | 1
}

fn thread_stress(ctx: &IterationContext<'_>) -> Result<Sample> {
    let config = ctx.base.clone().with_enabled(true).with_lore_friendly(false);
    let troops = eligible_regulars(ctx.assets, &config);
    ensure!(!troops.is_empty(), "catalog has no eligible troop");
    let hooks = GenderOverrideHooks::new(config.clone());
    let barrier = Barrier::new(ctx.threads);
    let base_seed = ctx.seed;

    let outcomes = thread::scope(|s| {
        let handles: Vec<_> = (0..ctx.threads)
            .map(|worker| {
                let (hooks, barrier, troops, config) = (&hooks, &barrier, &troops, &config);
                s.spawn(move || {
                    let mut mismatches = 0_usize;
                    let mut sample = Sample::default();
                    barrier.wait();
                    for round in 0..STRESS_ROUNDS {
                        let troop = &troops[(worker + round) % troops.len()];
                        let seed = stress_seed(base_seed, worker, round);
                        let expected = decide(Some(troop), seed, config);
                        hooks.before_spawn(Some(troop), seed);
                        thread::yield_now();
                        let seen = hooks.intercept_gender_read(troop, troop.is_female);
                        thread::yield_now();
                        if seen != expected || hooks.intercept_gender_read(troop, false) != seen {
                            mismatches += 1;
                        }
                        hooks.after_spawn();
                        if ActivationScope::current().is_active() {
                            mismatches += 1;
                        }
                        sample.count(seen);
                    }
                    (mismatches, sample)
                })
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(worker, handle)| {
                handle
                    .join()
                    .map_err(|_| anyhow!("stress worker {worker} panicked"))
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let mut total = Sample::default();
    let mut mismatches = 0;
    for (worker_mismatches, sample) in outcomes {
        mismatches += worker_mismatches;
        total.absorb(sample);
    }
    ensure!(
        mismatches == 0,
        "{mismatches} reads disagreed with the spawn's own decision"
    );
    Ok(total)
}

fn task_stress(ctx: &IterationContext<'_>) -> Result<Sample> {
    let config = ctx.base.clone().with_enabled(true).with_lore_friendly(false);
    let troops = Arc::new(eligible_regulars(ctx.assets, &config));
    ensure!(!troops.is_empty(), "catalog has no eligible troop");
    let hooks = Arc::new(GenderOverrideHooks::new(config));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(ctx.threads)
        .enable_all()
        .build()
        .context("failed to start the tokio runtime")?;
    runtime.block_on(isolated_spawns(
        hooks,
        troops,
        ctx.threads * TASKS_PER_THREAD,
        ctx.seed,
    ))
}

async fn isolated_spawns(
    hooks: Arc<GenderOverrideHooks<OverrideConfig>>,
    troops: Arc<Vec<CharacterDescriptor>>,
    tasks: usize,
    base_seed: u64,
) -> Result<Sample> {
    let mut handles = Vec::with_capacity(tasks);
    for worker in 0..tasks {
        let hooks = Arc::clone(&hooks);
        let troops = Arc::clone(&troops);
        handles.push(tokio::spawn(task::isolated(async move {
            let mut mismatches = 0_usize;
            let mut sample = Sample::default();
            for round in 0..TASK_ROUNDS {
                let troop = &troops[(worker + round) % troops.len()];
                let seed = stress_seed(base_seed, worker, round);
                let expected = decide(Some(troop), seed, hooks.settings());
                hooks.before_spawn(Some(troop), seed);
                tokio::task::yield_now().await;
                let seen = hooks.intercept_gender_read(troop, troop.is_female);
                if seen != expected {
                    mismatches += 1;
                }
                hooks.after_spawn();
                sample.count(seen);
            }
            (mismatches, sample)
        })));
    }

    let mut total = Sample::default();
    let mut mismatches = 0;
    for handle in handles {
        let (worker_mismatches, sample) = handle.await.context("stress task failed")?;
        mismatches += worker_mismatches;
        total.absorb(sample);
    }
    ensure!(
        mismatches == 0,
        "{mismatches} task reads disagreed with the spawn's own decision"
    );
    Ok(total)
}
