mod browser;
mod common;
mod logic;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use browser::{
    BrowserConfig, BrowserKind, FailureKey, TestBridge, capture_failure, new_session,
};
use common::scenario::{ScenarioCtx, get_scenario, list_scenarios};
use common::{parse_seeds, split_csv};
use logic::{HarnessOptions, LogicTester, ScenarioResult};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TestMode {
    /// Headless controller checks (fast, no browser)
    Logic,
    /// Browser automation against the served page
    Browser,
    /// Run both logic and browser tests
    Both,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HeadlessMode {
    /// Run browsers in headless mode
    Headless,
    /// Run browsers with visible windows
    Windowed,
}

impl HeadlessMode {
    const fn is_headless(self) -> bool {
        matches!(self, Self::Headless)
    }
}

fn parse_rate(raw: &str) -> Result<f64, String> {
    let rate: f64 = raw.parse().map_err(|err| format!("{err}"))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("{rate} is not a probability in 0..=1"))
    }
}

#[derive(Debug, Parser)]
#[command(name = "lsdai-tester", version)]
#[command(about = "Automated QA for the LSDAI model browser - headless logic and browser automation")]
struct Args {
    /// Test mode: logic (fast), browser (visual), or both
    #[arg(long, value_enum, default_value_t = TestMode::Logic)]
    mode: TestMode,

    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated, decimal or 0x hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario (logic mode only)
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    // Logic-specific options
    /// Simulated transfer tick in milliseconds (logic mode only)
    #[arg(long, default_value_t = 2)]
    tick_ms: u32,

    /// Chance that a simulated transfer tick faults (logic mode only)
    #[arg(long, default_value_t = 0.0, value_parser = parse_rate)]
    failure_rate: f64,

    /// Keep preferences in this JSON file instead of memory (logic mode only)
    #[arg(long)]
    prefs_file: Option<PathBuf>,

    // Browser-specific options
    /// Browsers to run (chrome,edge,firefox,safari) - browser mode only
    #[arg(long, default_value = "chrome")]
    browsers: String,

    /// Base URL of the page (should include ?test=1 to expose the bridge)
    #[arg(long, default_value = "http://localhost:8080/?test=1")]
    base_url: String,

    /// Artifacts directory for screenshots and snapshots
    #[arg(long, default_value = "target/test-artifacts")]
    artifacts_dir: String,

    /// Connect to a Selenium Grid/Appium hub instead of local drivers
    #[arg(long)]
    hub: Option<String>,

    /// Run headless where supported
    #[arg(long, value_enum, default_value_t = HeadlessMode::Headless)]
    headless: HeadlessMode,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios);
    let seeds = parse_seeds(&args.seeds)?;

    let logic_results = run_logic_scenarios(&args, &scenarios, &seeds).await;
    let browser_failures = run_browser_scenarios(&args, &scenarios, &seeds).await;

    write_reports(&args, &logic_results, start_time)?;

    if logic_results.iter().any(|r| !r.passed) || browser_failures > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:20} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🧪 LSDAI Automated Tester".bright_cyan().bold());
    println!("{}", "=========================".cyan());
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        for (key, _) in list_scenarios() {
            if !scenarios.iter().any(|s| s == key) {
                scenarios.push(key.to_string());
            }
        }
    }
    scenarios
}

fn build_browser_config(args: &Args) -> BrowserConfig {
    BrowserConfig {
        headless: args.headless.is_headless(),
        implicit_wait_secs: 3,
        remote_hub: args.hub.clone(),
    }
}

fn harness_options(args: &Args) -> HarnessOptions {
    HarnessOptions {
        tick_ms: args.tick_ms,
        failure_rate: args.failure_rate,
        prefs_file: args.prefs_file.clone(),
        verbose: args.verbose,
    }
}

async fn run_logic_scenarios(
    args: &Args,
    scenarios: &[String],
    seeds: &[u64],
) -> Vec<ScenarioResult> {
    let mut results = Vec::new();
    if !matches!(args.mode, TestMode::Logic | TestMode::Both) {
        return results;
    }

    println!("{}", "🧠 Running Logic Tests".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let logic_tester = LogicTester::new(harness_options(args));

    for scenario_name in scenarios {
        let Some(scenario) = get_scenario(scenario_name) else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
            continue;
        };
        let scenario_results = logic_tester
            .run_scenario(scenario.title(), scenario.as_logic(), seeds, args.iterations)
            .await;
        results.extend(scenario_results);
    }

    results
}

/// Returns how many browser runs failed.
async fn run_browser_scenarios(args: &Args, scenarios: &[String], seeds: &[u64]) -> usize {
    if !matches!(args.mode, TestMode::Browser | TestMode::Both) {
        return 0;
    }

    println!("{}", "🌐 Running Browser Tests".bright_blue().bold());
    println!("{}", "-".repeat(30).blue());

    let mut failures = 0;
    for browser_name in split_csv(&args.browsers) {
        let Some(kind) = BrowserKind::parse(&browser_name) else {
            eprintln!("⚠️  Unknown browser: {}", browser_name.yellow());
            continue;
        };

        let driver = match new_session(kind, &build_browser_config(args)).await {
            Ok(d) => d,
            Err(e) => {
                eprintln!("❌ Could not start {kind:?}: {e}");
                failures += 1;
                continue;
            }
        };

        failures += run_browser_scenarios_for_driver(args, scenarios, seeds, kind, &driver).await;
        let _ = driver.quit().await;
    }

    failures
}

async fn run_browser_scenarios_for_driver(
    args: &Args,
    scenarios: &[String],
    seeds: &[u64],
    kind: BrowserKind,
    driver: &thirtyfour::WebDriver,
) -> usize {
    let mut failures = 0;
    for scenario_name in scenarios {
        let Some(scenario) = get_scenario(scenario_name) else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
            continue;
        };
        for &seed in seeds {
            let ctx = ScenarioCtx {
                base_url: args.base_url.clone(),
                seed,
                bridge: TestBridge::new(driver),
                verbose: args.verbose,
            };

            let label = kind.label();
            let scenario_start = Instant::now();
            match scenario.run_browser(driver, &ctx).await {
                Ok(()) => {
                    println!(
                        "✅ [{} seed {seed}] {scenario_name} - {:?}",
                        label.green(),
                        scenario_start.elapsed()
                    );
                }
                Err(e) => {
                    failures += 1;
                    eprintln!(
                        "❌ [{} seed {seed}] {scenario_name} - {:?}: {e:#}",
                        label.red(),
                        scenario_start.elapsed()
                    );
                    let key = FailureKey {
                        browser: label,
                        scenario: scenario_name,
                        seed,
                    };
                    let base = Path::new(&args.artifacts_dir);
                    match capture_failure(driver, base, key, &e).await {
                        Ok(dir) => log::info!("failure artifacts in {}", dir.display()),
                        Err(capture_err) => {
                            log::warn!("could not capture artifacts: {capture_err:#}");
                        }
                    }
                }
            }
        }
    }
    failures
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            if results.is_empty() {
                writeln!(&mut output_target, "[]")?;
            } else {
                logic::reports::generate_json_report(&mut output_target, results)?;
            }
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# LSDAI Logic Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No logic scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
        }
    }

    let duration = start_time.elapsed();
    writeln!(&mut output_target)?;
    writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            mode: TestMode::Logic,
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            report: "json".to_string(),
            verbose: false,
            output: None,
            tick_ms: 1,
            failure_rate: 0.0,
            prefs_file: None,
            browsers: "chrome".to_string(),
            base_url: "http://localhost:8080/?test=1".to_string(),
            artifacts_dir: "target/test-artifacts".to_string(),
            hub: None,
            headless: HeadlessMode::Headless,
        }
    }

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "lsdai-main-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn expand_all_adds_every_scenario_once() {
        let expanded = expand_scenarios("dedup,all");
        assert_eq!(expanded[0], "dedup");
        assert_eq!(expanded.len(), list_scenarios().len());
    }

    #[test]
    fn failure_rate_must_be_a_probability() {
        assert_eq!(parse_rate("0.25"), Ok(0.25));
        assert!(parse_rate("1.5").is_err());
        assert!(parse_rate("often").is_err());
    }

    #[test]
    fn args_parse_logic_options() {
        let args = Args::try_parse_from([
            "lsdai-tester",
            "--tick-ms",
            "5",
            "--failure-rate",
            "0.1",
            "--seeds",
            "0x2a",
        ])
        .unwrap();
        let options = harness_options(&args);
        assert_eq!(options.tick_ms, 5);
        assert!((options.failure_rate - 0.1).abs() < f64::EPSILON);
        assert_eq!(parse_seeds(&args.seeds).unwrap(), vec![42]);
    }

    #[tokio::test]
    async fn logic_run_feeds_json_report() {
        let output = temp_path("report");
        let mut args = base_args();
        args.scenarios = "smoke,dedup".to_string();
        args.output = Some(output.clone());

        let results = run_logic_scenarios(&args, &expand_scenarios(&args.scenarios), &[7]).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.passed), "{results:?}");

        write_reports(&args, &results, Instant::now()).unwrap();
        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.contains("\"scenario_name\": \"Smoke Test\""));
        let _ = std::fs::remove_file(output);
    }

    #[tokio::test]
    async fn browser_mode_skips_unknown_browsers() {
        let mut args = base_args();
        args.mode = TestMode::Browser;
        args.browsers = "netscape".to_string();
        assert_eq!(run_browser_scenarios(&args, &["smoke".to_string()], &[1]).await, 0);
    }

    #[test]
    fn empty_results_write_placeholder_markdown() {
        let output = temp_path("markdown");
        let mut args = base_args();
        args.report = "markdown".to_string();
        args.output = Some(output.clone());
        write_reports(&args, &[], Instant::now()).unwrap();
        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.contains("_No scenarios executed._"));
        let _ = std::fs::remove_file(output);
    }
}
