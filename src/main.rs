//! cloudpilot CLI entrypoint.
//!
//! This is the main entrypoint for the cloudpilot command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cloudpilot::cli::{Cli, Commands, HistoryCommands, OutputFormatter};
use cloudpilot::config::{find_config_file, AppConfig, ConfigParser, ConfigValidator};
use cloudpilot::cost::{CostModel, RateCard};
use cloudpilot::engine::{ExecutionContext, ExecutionReport, PlanExecutor};
use cloudpilot::error::Result;
use cloudpilot::history::{DeploymentRecord, HistoryStore, LocalHistoryStore};
use cloudpilot::plan::{Plan, PlanParser, PlanValidator};
use cloudpilot::provider::HttpProviderClient;

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. Logs go to stderr.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Main async entry point. Returns whether the command succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);
    let (config, project_root) = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { plan } => cmd_validate(&plan, &config, &formatter),
        Commands::Estimate { plan } => cmd_estimate(&plan, &config, &formatter),
        Commands::Apply {
            plan,
            yes,
            step_timeout,
        } => cmd_apply(&plan, yes, step_timeout, config, &project_root, &formatter).await,
        Commands::History { command } => {
            cmd_history(command, &config, &project_root, &formatter).await
        }
    }
}

/// Validate a plan.
fn cmd_validate(plan_path: &Path, config: &AppConfig, formatter: &OutputFormatter) -> Result<bool> {
    info!("Validating plan: {}", plan_path.display());

    let plan = PlanParser::new().load_file(plan_path)?;
    let rates = RateCard::from_config(&config.pricing);
    let result = PlanValidator::with_rate_card(&rates).check(&plan);

    emit(&formatter.format_validation(&plan, &result))?;
    Ok(result.errors.is_empty())
}

/// Show the cost estimate of a plan.
fn cmd_estimate(plan_path: &Path, config: &AppConfig, formatter: &OutputFormatter) -> Result<bool> {
    let (plan, model) = load_plan(plan_path, config)?;
    let estimate = model.estimate_plan(&plan);

    emit(&formatter.format_estimate(&estimate))?;
    Ok(true)
}

/// Apply a plan.
async fn cmd_apply(
    plan_path: &Path,
    auto_approve: bool,
    step_timeout: Option<u64>,
    mut config: AppConfig,
    project_root: &Path,
    formatter: &OutputFormatter,
) -> Result<bool> {
    if let Some(secs) = step_timeout {
        config.execution.step_timeout_secs = secs;
    }
    ConfigValidator::new().requiring_endpoint().validate(&config)?;

    let (mut plan, model) = load_plan(plan_path, &config)?;

    // Show plan
    if formatter.is_text() {
        let result = PlanValidator::with_rate_card(model.rates()).check(&plan);
        eprintln!("{}", formatter.format_validation(&plan, &result));
        eprintln!("{}", formatter.format_estimate(&model.estimate_plan(&plan)));
    }

    // Confirm
    if !auto_approve {
        eprint!("Do you want to apply this plan? [y/N]: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Apply cancelled.");
            return Ok(false);
        }
    }

    let api_key = ConfigParser::get_api_key(&config)
        .inspect_err(|e| warn!("{e}; calling the gateway without credentials"))
        .ok();
    let provider = HttpProviderClient::new(&config.provider, api_key)?;

    let history = config
        .history
        .enabled
        .then(|| LocalHistoryStore::from_config(&config.history, project_root));
    let ctx = ExecutionContext::from_config(&config.execution);
    let lock = match &history {
        Some(store) => Some(store.acquire_lock("", plan.step_count(), ctx.step_timeout()).await?),
        None => None,
    };

    // Ctrl-C stops the run at the next step boundary
    let flag = ctx.cancellation().clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling before the next step");
            flag.cancel();
        }
    });

    let executor = PlanExecutor::new(&provider).with_cost_model(model);
    let outcome = executor.execute(&mut plan, &ctx).await;
    signal_task.abort();

    let saved = match (&history, &outcome) {
        (Some(store), Ok(report)) => store.save(&DeploymentRecord::new(&plan, report.clone())).await,
        _ => Ok(()),
    };
    let released = match (&history, &lock) {
        (Some(store), Some(lock)) => store.release_lock(&lock.lock_id).await,
        _ => Ok(()),
    };

    settle_apply(outcome, saved, released, |report| emit(&formatter.format_report(report)))
}

/// Prints the report of a finished run, then surfaces history errors.
///
/// A report is always printed when the run produced one, even if recording
/// it or releasing the history lock failed afterwards.
fn settle_apply(
    outcome: Result<ExecutionReport>,
    saved: Result<()>,
    released: Result<()>,
    mut print: impl FnMut(&ExecutionReport) -> Result<()>,
) -> Result<bool> {
    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            if let Err(release_err) = released {
                error!("Failed to release history lock: {release_err}");
            }
            return Err(e);
        }
    };
    print(&report)?;

    if let Err(e) = &released {
        error!("Failed to release history lock after {}: {e}", report.deployment_id);
    }
    if let Err(e) = saved {
        error!("Failed to record deployment {}: {e}", report.deployment_id);
        return Err(e);
    }
    released?;

    Ok(report.success)
}

/// Deployment history commands.
async fn cmd_history(
    command: HistoryCommands,
    config: &AppConfig,
    project_root: &Path,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let store = LocalHistoryStore::from_config(&config.history, project_root);
    debug!("Reading history from: {}", store.base_dir().display());

    match command {
        HistoryCommands::List { limit } => {
            let mut records = store.list().await?;
            if let Some(limit) = limit {
                records.truncate(limit);
            }
            emit(&formatter.format_history(&records))?;
        }
        HistoryCommands::Show { deployment_id } => {
            let record = store.load(&deployment_id).await?;
            emit(&formatter.format_record(&record))?;
        }
    }

    Ok(true)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Loads configuration and the directory it is relative to.
fn load_config(explicit: Option<&Path>) -> Result<(AppConfig, PathBuf)> {
    let cwd = std::env::current_dir()?;
    let config_file = explicit
        .map(Path::to_path_buf)
        .or_else(|| find_config_file(&cwd));

    let project_root = config_file
        .as_deref()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| cwd.clone(), Path::to_path_buf);
    debug!("Project root: {}", project_root.display());

    let parser = ConfigParser::new().with_base_path(project_root.clone());
    parser.load_dotenv()?;

    let config = parser.load_or_default(config_file.as_deref())?;
    ConfigValidator::new().validate(&config)?;

    Ok((config, project_root))
}

/// Loads and validates a plan, returning it with the configured cost model.
fn load_plan(plan_path: &Path, config: &AppConfig) -> Result<(Plan, CostModel)> {
    debug!("Loading plan from: {}", plan_path.display());

    let plan = PlanParser::new().load_file(plan_path)?;
    let model = CostModel::with_rates(RateCard::from_config(&config.pricing));

    let result = PlanValidator::with_rate_card(model.rates()).validate(&plan)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    Ok((plan, model))
}

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{output}")?;
    Ok(())
}
