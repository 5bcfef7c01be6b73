// src/main.rs
//! Energy reconciler CLI
//! Cross-checks simulator stats, ERT summaries and derived summaries

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::Path;

use energy_reconciler::config::{ArtifactConfig, ReconcileConfig};
use energy_reconciler::normalize::Normalizer;
use energy_reconciler::parsers::{parse_file, IngestOptions};
use energy_reconciler::pipeline::Pipeline;
use energy_reconciler::record::Source;
use energy_reconciler::report::ReportFormat;

/// Exit status for an invocation that could not run (bad config, unreadable
/// input under `--strict`); 1 is reserved for failing findings.
const EXIT_ERROR: i32 = 2;

fn main() {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    let code = run(&matches);
    if code != 0 {
        std::process::exit(code);
    }
}

fn run(matches: &ArgMatches) -> i32 {
    let outcome = match matches.subcommand() {
        Some(("reconcile", sub_matches)) => cmd_reconcile(sub_matches),
        Some(("inspect", sub_matches)) => cmd_inspect(sub_matches),
        Some(("validate", sub_matches)) => cmd_validate(sub_matches),
        Some(("config-gen", sub_matches)) => cmd_config_gen(sub_matches),
        _ => {
            println!("Energy Reconciler v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(0)
        }
    };

    outcome.unwrap_or_else(|e| {
        eprintln!("✗ {}", e);
        EXIT_ERROR
    })
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn no_coalesce_arg() -> Arg {
    Arg::new("no-coalesce")
        .long("no-coalesce")
        .value_name("COMPONENT")
        .help("Component excluded from DRAM coalescing in the producing run (repeatable)")
        .action(ArgAction::Append)
}

fn cli() -> Command {
    Command::new("energy-reconciler")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reconcile energy and leakage figures across accelerator-model reports")
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .help("Verbose logging")
            .global(true)
            .action(ArgAction::SetTrue))
        .subcommand(
            Command::new("reconcile")
                .about("Cross-validate report artifacts and emit a discrepancy report")
                .arg(Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file"))
                .arg(Arg::new("raw-stats")
                    .long("raw-stats")
                    .value_name("FILE")
                    .help("Raw simulator stats report"))
                .arg(Arg::new("ert")
                    .long("ert")
                    .value_name("FILE")
                    .help("ERT summary table"))
                .arg(Arg::new("summary")
                    .long("summary")
                    .value_name("FILE")
                    .help("Derived summary (JSON)"))
                .arg(no_coalesce_arg())
                .arg(Arg::new("computes")
                    .long("computes")
                    .value_name("N")
                    .help("Compute count for the per-compute derivation check")
                    .value_parser(clap::value_parser!(u64)))
                .arg(Arg::new("consistent-tol")
                    .long("consistent-tol")
                    .value_name("FRACTION")
                    .help("Largest relative delta still counted as consistent")
                    .value_parser(clap::value_parser!(f64)))
                .arg(Arg::new("drift-tol")
                    .long("drift-tol")
                    .value_name("FRACTION")
                    .help("Largest relative delta counted as drift")
                    .value_parser(clap::value_parser!(f64)))
                .arg(Arg::new("cooling")
                    .long("cooling")
                    .help("Remove cryogenic cooling overhead from the derived summary")
                    .action(ArgAction::SetTrue))
                .arg(Arg::new("format")
                    .short('f')
                    .long("format")
                    .value_name("FORMAT")
                    .help("Report format: text, csv or json")
                    .default_value("text"))
                .arg(Arg::new("output")
                    .short('o')
                    .long("output")
                    .value_name("FILE")
                    .help("Write the report to a file instead of stdout"))
                .arg(Arg::new("strict")
                    .long("strict")
                    .help("Exit with status 2 when any artifact fails to parse")
                    .action(ArgAction::SetTrue))
        )
        .subcommand(
            Command::new("inspect")
                .about("Parse and normalize a single artifact")
                .arg(Arg::new("source")
                    .short('s')
                    .long("source")
                    .value_name("SOURCE")
                    .help("Artifact format: raw-stats, ert or summary")
                    .required(true))
                .arg(Arg::new("file")
                    .value_name("FILE")
                    .help("Artifact to parse")
                    .required(true))
                .arg(no_coalesce_arg())
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a reconciliation configuration file")
                .arg(Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file to validate")
                    .required(true))
        )
        .subcommand(
            Command::new("config-gen")
                .about("Generate default configuration file")
                .arg(Arg::new("output")
                    .short('o')
                    .long("output")
                    .value_name("FILE")
                    .help("Output file path")
                    .default_value("config/reconcile.toml"))
        )
}

fn collect_no_coalesce(matches: &ArgMatches) -> Vec<String> {
    matches
        .get_many::<String>("no-coalesce")
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn cmd_reconcile(matches: &ArgMatches) -> Result<i32, Box<dyn std::error::Error>> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ReconcileConfig::from_file(path)?,
        None => ReconcileConfig::default(),
    };

    let no_coalesce = collect_no_coalesce(matches);
    for artifact in &mut config.artifacts {
        artifact.no_coalesce.extend(no_coalesce.iter().cloned());
    }
    for (flag, source) in [
        ("raw-stats", Source::RawStats),
        ("ert", Source::ErtSummary),
        ("summary", Source::DerivedSummary),
    ] {
        if let Some(path) = matches.get_one::<String>(flag) {
            config
                .artifacts
                .push(ArtifactConfig::new(source, path).with_no_coalesce(no_coalesce.iter().cloned()));
        }
    }

    if let Some(&computes) = matches.get_one::<u64>("computes") {
        config.computes = Some(computes);
    }
    if let Some(&tol) = matches.get_one::<f64>("consistent-tol") {
        config.tolerance.consistent = tol;
    }
    if let Some(&tol) = matches.get_one::<f64>("drift-tol") {
        config.tolerance.drift = tol;
    }
    if matches.get_flag("cooling") {
        config.cooling.enabled = true;
    }
    config.validate()?;

    if config.artifacts.is_empty() {
        return Err("No artifacts to reconcile; pass --raw-stats/--ert/--summary or a config file".into());
    }

    let format: ReportFormat = matches
        .get_one::<String>("format")
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or_default();

    let report = Pipeline::new(config).run();
    let rendered = report.render(format)?;

    match matches.get_one::<String>("output") {
        Some(path) => {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, rendered)?;
            println!("✓ Report written to {}", path);
        }
        None => print!("{}", rendered),
    }

    if matches.get_flag("strict") && !report.parse_failures.is_empty() {
        eprintln!("✗ {} artifact(s) failed to parse", report.parse_failures.len());
        return Ok(EXIT_ERROR);
    }
    Ok(report.exit_code())
}

fn cmd_inspect(matches: &ArgMatches) -> Result<i32, Box<dyn std::error::Error>> {
    let source: Source = matches
        .get_one::<String>("source")
        .ok_or("missing --source")?
        .parse()?;
    let path = matches.get_one::<String>("file").ok_or("missing FILE")?;

    let options = IngestOptions::new().with_no_coalesce(collect_no_coalesce(matches));
    let report = parse_file(source, path, options)?;

    println!("{} report: {}", source, path);
    if let Some(computes) = report.context.computes {
        println!("  computes: {}", computes);
    }
    if let Some(runtime) = report.context.runtime_seconds() {
        println!("  runtime: {:.6e} s", runtime);
    }

    let native: Vec<_> = report.records.iter().map(|r| r.energy).collect();
    let normalized = Normalizer::default().normalize(report.records);
    println!("  {} records\n", normalized.len());

    for (record, native) in normalized.iter().zip(native) {
        let coalesce = if record.coalesce_excluded { " [no-coalesce]" } else { "" };
        println!(
            "  {:<20} {:<28} {:>14.6e} pJ  (as reported: {}){}",
            record.component_id,
            record.metric.label(),
            record.value(),
            native,
            coalesce
        );
        for warning in &record.warnings {
            println!("    ⚠ {}", warning);
        }
    }
    Ok(0)
}

fn cmd_validate(matches: &ArgMatches) -> Result<i32, Box<dyn std::error::Error>> {
    let config_path = matches
        .get_one::<String>("config")
        .ok_or("missing --config")?;

    println!("Validating reconciliation configuration: {}", config_path);

    match ReconcileConfig::from_file(config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!(
                "  Tolerance: consistent <= {}, drift <= {}",
                config.tolerance.consistent, config.tolerance.drift
            );
            println!("  Cooling overhead removal: {}", config.cooling.enabled);
            println!("  Artifacts: {}", config.artifacts.len());
            for artifact in &config.artifacts {
                let exists = if artifact.path.exists() { "✓" } else { "✗ missing" };
                println!("    {} {} {}", artifact.source, artifact.path.display(), exists);
                if !artifact.no_coalesce.is_empty() {
                    println!("      no-coalesce: {}", artifact.no_coalesce.join(", "));
                }
            }
            Ok(0)
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed: {}", e);
            Ok(1)
        }
    }
}

fn cmd_config_gen(matches: &ArgMatches) -> Result<i32, Box<dyn std::error::Error>> {
    let output_path = matches
        .get_one::<String>("output")
        .ok_or("missing --output")?;

    println!("Generating default reconciliation configuration: {}", output_path);

    let config = ReconcileConfig::default_config();

    // Create directory if it doesn't exist
    if let Some(parent) = Path::new(output_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.save_to_file(output_path)?;

    println!("✓ Configuration saved to {}", output_path);
    println!("  Use 'energy-reconciler validate -c {}' to verify", output_path);
    Ok(0)
}
