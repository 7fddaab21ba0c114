mod assets;
mod host;
mod logic;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use assets::{FileConfigLoader, TesterAssets};
use logic::{LogicTester, ScenarioResult, get_scenario, list_scenarios, resolve_seed_inputs};
use troopmix_engine::{InstallReport, OverrideConfig, SharedSettings, install_all, load_settings};
use util::split_csv;

#[derive(Debug, Parser)]
#[command(name = "troopmix-tester", version)]
#[command(about = "Simulated-host QA runs for the Troopmix gender override")]
struct Args {
    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated numbers or words)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Worker threads for the stress scenarios
    #[arg(long, default_value_t = 8)]
    threads: usize,

    /// Override config JSON file; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hook sites the simulated host build lacks (comma-separated)
    #[arg(long, default_value = "")]
    missing_hooks: String,

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
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let settings = Arc::new(load_override_settings(args.config.as_ref())?);
    let install_report = install_hooks(&args.missing_hooks);
    let scenarios = expand_scenarios(&args.scenarios);
    let seed_infos = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let seeds: Vec<u64> = seed_infos.iter().map(|s| s.seed).collect();
    for info in seed_infos.iter().filter(|s| s.label.is_some()) {
        log::info!(
            "seed {} derived from {:?}",
            info.seed,
            info.label.as_deref().unwrap_or_default()
        );
    }

    let tester = LogicTester::new(
        Arc::new(TesterAssets::load_default()),
        settings,
        args.threads,
        args.verbose,
    );
    let results = run_scenarios(&tester, &scenarios, &seeds, args.iterations);

    write_reports(&args, &results, &install_report, start_time)?;

    if results.iter().any(|r| !r.passed) {
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
        writeln!(output_target.writer(), "  {key:22} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🪖 Troopmix Override Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn load_override_settings(path: Option<&PathBuf>) -> Result<SharedSettings> {
    let Some(path) = path else {
        return Ok(SharedSettings::new(OverrideConfig::default()));
    };
    let loader = FileConfigLoader::new(path);
    load_settings(&loader)
        .with_context(|| format!("failed to load override config from {}", path.display()))
}

fn install_hooks(missing: &str) -> InstallReport {
    let missing: BTreeSet<String> = split_csv(missing).into_iter().collect();
    let mut sites = host::standard_sites(&missing);
    let report = install_all(&mut sites);
    for (name, reason) in &report.failed {
        eprintln!("⚠️  Hook {} not installed: {reason}", name.yellow());
    }
    report
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        for key in logic::scenario_keys() {
            if !scenarios.iter().any(|s| s == key) {
                scenarios.push(key.to_string());
            }
        }
    }
    scenarios
}

fn run_scenarios(
    tester: &LogicTester,
    scenarios: &[String],
    seeds: &[u64],
    iterations: usize,
) -> Vec<ScenarioResult> {
    println!("{}", "🧠 Running Override Scenarios".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let mut results = Vec::new();
    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            results.extend(tester.run_scenario(scenario, seeds, iterations));
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }
    results
}

fn write_reports(
    args: &Args,
    results: &[ScenarioResult],
    install_report: &InstallReport,
    start_time: Instant,
) -> Result<()> {
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
                    "# Troopmix Override Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            let duration = start_time.elapsed();
            writeln!(
                &mut output_target,
                "🔌 Hooks installed: {}/{}",
                install_report.installed.len(),
                install_report.installed.len() + install_report.failed.len()
            )?;
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(&mut output_target, results, duration)?;
            }
        }
    }

    if args.report == "console" {
        let duration = start_time.elapsed();
        writeln!(&mut output_target)?;
        writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
    }
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
