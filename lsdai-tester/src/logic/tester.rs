use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::harness::{HarnessOptions, LogicHarness};
use crate::common::scenario::LogicScenario;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

pub struct LogicTester {
    options: HarnessOptions,
}

impl LogicTester {
    pub const fn new(options: HarnessOptions) -> Self {
        Self { options }
    }

    pub async fn run_scenario(
        &self,
        name: &str,
        scenario: &dyn LogicScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();
        for &seed in seeds {
            if self.options.verbose {
                println!(
                    "🧪 Testing scenario: {} (seed: {seed})",
                    name.bright_white()
                );
            }
            results.push(self.run_single_scenario(name, scenario, seed, iterations).await);
        }
        results
    }

    async fn run_single_scenario(
        &self,
        name: &str,
        scenario: &dyn LogicScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            let outcome = match LogicHarness::new(self.options.clone(), iteration_seed) {
                Ok(harness) => scenario.run_logic(&harness).await,
                Err(err) => Err(err),
            };

            match outcome {
                Ok(()) => {
                    successes += 1;
                    let duration = start_time.elapsed();
                    performance_data.push(duration);
                    if self.options.verbose {
                        println!(
                            "  ✅ Iteration {}/{} passed ({duration:?})",
                            i + 1,
                            iterations
                        );
                    }
                }
                Err(err) => {
                    let message = format!("Iteration {} (seed {iteration_seed}): {err:#}", i + 1);
                    if self.options.verbose {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            format!("{err:#}").red()
                        );
                    }
                    failures.push(message);
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: name.to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
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

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    struct AlwaysPasses;

    #[async_trait::async_trait(?Send)]
    impl LogicScenario for AlwaysPasses {
        async fn run_logic(&self, _harness: &LogicHarness) -> Result<()> {
            Ok(())
        }
    }

    struct FailsOnOddSeeds;

    #[async_trait::async_trait(?Send)]
    impl LogicScenario for FailsOnOddSeeds {
        async fn run_logic(&self, harness: &LogicHarness) -> Result<()> {
            anyhow::ensure!(harness.seed() % 2 == 0, "odd seed {}", harness.seed());
            Ok(())
        }
    }

    #[tokio::test]
    async fn results_count_successful_iterations() {
        let tester = LogicTester::new(HarnessOptions::default());
        let results = tester.run_scenario("pass", &AlwaysPasses, &[1, 2], 3).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.passed && r.successful_iterations == 3));
    }

    #[tokio::test]
    async fn failures_carry_iteration_seed() {
        let tester = LogicTester::new(HarnessOptions::default());
        let results = tester.run_scenario("odd", &FailsOnOddSeeds, &[10], 2).await;
        let result = &results[0];
        assert!(!result.passed);
        assert_eq!(result.successful_iterations, 1);
        assert!(result.failures[0].contains("seed 11"));
    }

    #[test]
    fn durations_serialize_as_millis() {
        let result = ScenarioResult {
            scenario_name: "x".into(),
            seed: 1,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_duration: Duration::from_millis(12),
            performance_data: vec![Duration::from_millis(12)],
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["average_duration"], 12);
        assert_eq!(value["performance_data"][0], 12);
    }
}
