use anyhow::{Context, Result};
use server_migration::cli::{Args, ConfigDiscovery, ExecutionMode, RunConfig};
use server_migration::env::DEFAULT_LOG_FILTER;
use server_migration::env::properties::INTERACTIVE;
use server_migration::plan::MigrationPlan;
use server_migration::{MigrationConfig, MigrationSystem};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();

    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = match &mode {
        ExecutionMode::Run(run) => ConfigDiscovery::load(run.config_override.as_ref()),
        _ => Ok(MigrationConfig::default()),
    };
    init_logging(args.verbose(), config.as_ref().ok());

    let outcome = config.and_then(|config| match mode {
        ExecutionMode::Run(run) => run_migration(run, config),
        ExecutionMode::Validate { plan } => validate_plan(&plan).map(|_| ExitCode::SUCCESS),
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            Ok(ExitCode::SUCCESS)
        }
    });

    match outcome {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins, then the configured filter, then the default
fn init_logging(verbose: bool, config: Option<&MigrationConfig>) {
    let filter = if verbose {
        EnvFilter::new("server_migration=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directive = config
                .and_then(|c| c.log_filter.as_deref())
                .unwrap_or(DEFAULT_LOG_FILTER);
            EnvFilter::new(directive)
        })
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_migration(run: RunConfig, config: MigrationConfig) -> Result<ExitCode> {
    info!("Running migration plan {:?}", run.plan);
    let plan = MigrationPlan::from_toml_file(&run.plan)?;

    let mut config = config.with_property_overrides(run.properties);
    if run.non_interactive {
        config.interactive = false;
        config = config.with_property_overrides([(INTERACTIVE.to_string(), "false".to_string())]);
    }
    if run.report_json.is_some() {
        config.report.json_path = run.report_json;
    }
    if run.summary.is_some() {
        config.report.summary_path = run.summary;
    }
    if run.verbose {
        config.report.print_summary = true;
    }

    let system = MigrationSystem::new(config);
    let report = system
        .run_plan(&plan)
        .with_context(|| format!("Migration plan {:?} could not run", run.plan))?;

    println!(
        "{}: {} ({} succeeded, {} failed, {} skipped)",
        report.task,
        report.status,
        report.statistics.successful_tasks,
        report.statistics.failed_tasks,
        report.statistics.skipped_tasks
    );
    for failure in &report.failures {
        println!(
            "  FAIL {}: {}",
            failure.path_display(),
            failure.error.as_deref().unwrap_or("no error recorded")
        );
    }

    Ok(if report.is_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn validate_plan(path: &std::path::Path) -> Result<()> {
    let plan = MigrationPlan::from_toml_file(path)?;
    plan.compile()?;
    println!(
        "Plan {} is valid ({} steps, {} seed resources)",
        plan.name,
        plan.step_count(),
        plan.resources.len()
    );
    Ok(())
}
