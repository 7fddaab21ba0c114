use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use troopmix_engine::{OverrideConfig, SettingsSource, SharedSettings};

use super::scenarios::{IterationContext, Sample, Scenario};
use crate::assets::TesterAssets;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    /// Female share among eligible troops across passing iterations.
    pub female_share: f64,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
}

/// Runs scenarios against a fresh simulated host per iteration.
pub struct LogicTester {
    assets: Arc<TesterAssets>,
    settings: Arc<SharedSettings>,
    threads: usize,
    verbose: bool,
}

impl LogicTester {
    pub fn new(
        assets: Arc<TesterAssets>,
        settings: Arc<SharedSettings>,
        threads: usize,
        verbose: bool,
    ) -> Self {
        Self {
            assets,
            settings,
            threads: threads.max(1),
            verbose,
        }
    }

    pub fn run_scenario(
        &self,
        scenario: &Scenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (seed: {})",
                    scenario.name.bright_white(),
                    seed
                );
            }

            let result = self.run_single_scenario(scenario, seed, iterations);
            results.push(result);
        }

        results
    }

    fn run_single_scenario(
        &self,
        scenario: &Scenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let base = self.base_config();
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut durations = Vec::new();
        let mut totals = Sample::default();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            let ctx = IterationContext {
                assets: &self.assets,
                settings: &self.settings,
                base: &base,
                seed: iteration_seed,
                threads: self.threads,
            };

            match scenario.run(&ctx) {
                Ok(sample) => {
                    successes += 1;
                    totals.absorb(sample);
                    let duration = start_time.elapsed();
                    durations.push(duration);
                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{} passed ({duration:?}) female {}/{}",
                            i + 1,
                            iterations,
                            sample.female,
                            sample.eligible
                        );
                    }
                }
                Err(err) => {
                    let message = format!("Iteration {} (seed {iteration_seed}): {err:#}", i + 1);
                    if self.verbose {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            message.clone().red()
                        );
                    }
                    failures.push(message);
                }
            }
        }

        let average_duration = if durations.is_empty() {
            Duration::ZERO
        } else {
            durations.iter().sum::<Duration>() / u32::try_from(durations.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            female_share: totals.share(),
            average_duration,
        }
    }

    fn base_config(&self) -> OverrideConfig {
        self.settings
            .current()
            .map(|config| OverrideConfig::clone(&config))
            .unwrap_or_default()
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::get_scenario;

    fn tester() -> LogicTester {
        LogicTester::new(
            Arc::new(TesterAssets::load_default()),
            Arc::new(SharedSettings::new(OverrideConfig::default())),
            2,
            false,
        )
    }

    #[test]
    fn smoke_passes_for_each_seed() {
        let scenario = get_scenario("smoke").unwrap();
        let results = tester().run_scenario(&scenario, &[1, 2], 3);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.passed), "{results:?}");
        assert!(results.iter().all(|r| r.successful_iterations == 3));
    }

    #[test]
    fn female_share_is_a_fraction() {
        let scenario = get_scenario("smoke").unwrap();
        let result = &tester().run_scenario(&scenario, &[9], 4)[0];
        assert!((0.0..=1.0).contains(&result.female_share));
    }

    #[test]
    fn result_serializes_duration_as_millis() {
        let result = ScenarioResult {
            scenario_name: "Smoke".into(),
            seed: 1,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            female_share: 0.5,
            average_duration: Duration::from_millis(12),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["average_duration"], 12);
        let back: ScenarioResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.average_duration, Duration::from_millis(12));
    }
}
