//! ds-migrate - POSIX ownership and ACL migration
//!
//! Entry point for the CLI application.

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::Term;
use ds_migrate::config::{CliArgs, MigrateConfig};
use ds_migrate::directory::{build_identity_map, discover_providers};
use ds_migrate::migrate::MigrationContext;
use ds_migrate::progress::{print_header, print_identities, print_summary, ProgressReporter};
use ds_migrate::tools::SystemTools;
use ds_migrate::walker::MigrationCoordinator;
use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Word the operator must type to start
const CONFIRMATION: &str = "CONTINUE";

/// Target for fatal errors; the console already prints them
const FATAL_TARGET: &str = "ds_migrate::fatal";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Validate and create config
    let config = MigrateConfig::from_args(args).context("Invalid configuration")?;

    // Flushes the log file on drop
    let _log_guard = setup_logging(&config)?;
    info!("### Starting ###");

    let result = migrate(&config);
    if let Err(e) = &result {
        error!(target: FATAL_TARGET, "{:#}", e);
    }
    result
}

fn migrate(config: &MigrateConfig) -> Result<()> {
    let tools = Arc::new(SystemTools::new(config.use_sudo));

    let mut providers =
        discover_providers(tools.as_ref()).context("Failed to discover directory providers")?;
    if config.swap {
        info!("Swapping source and target");
        providers = providers.swapped();
    }
    info!(source = %providers.source, target = %providers.target, "Migrating");

    print_header(
        &providers.source.to_string(),
        &providers.target.to_string(),
        &config.roots,
        config.effective_workers(),
        config.mode(),
    );

    if !config.auto_confirm {
        confirm()?;
    }

    let resolution = build_identity_map(tools.as_ref(), &providers)
        .context("Failed to resolve identities")?;
    print_identities(&resolution);

    let context = MigrationContext::new(Arc::new(resolution.identities), tools, config.options);
    let coordinator = MigrationCoordinator::new(
        context,
        config.roots.clone(),
        config.effective_workers(),
        config.use_pool,
    );

    // Setup signal handler for graceful shutdown
    let shutdown_flag = coordinator.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing in-flight paths...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    // Run the migration
    let result = if config.show_progress {
        let progress = ProgressReporter::new();
        progress.set_status("Starting migration...");

        let reporter = progress.clone();
        let result = coordinator
            .run_with_progress(move |p| reporter.update(&p))
            .context("Migration failed")?;

        if result.completed {
            progress.finish("Migration completed");
        } else {
            progress.finish("Migration interrupted");
        }
        result
    } else {
        coordinator.run().context("Migration failed")?
    };

    print_summary(
        &result,
        config.options.dry_run,
        &config.log_file.display().to_string(),
    );

    if !result.completed {
        warn!(
            discarded = result.discarded,
            "Migration was interrupted before completion"
        );
    }
    if result.failed > 0 {
        info!(failed = result.failed, "Migration completed with failures");
    }

    info!("### Ending ###");
    Ok(())
}

/// Ask the operator to type the confirmation word
///
/// The prompt goes to stderr and the answer is read from stdin, so both
/// a redirected summary and a piped answer work.
fn confirm() -> Result<()> {
    let term = Term::stderr();
    term.write_str(&format!("Type \"{}\" to start the migration: ", CONFIRMATION))
        .context("Failed to write prompt")?;

    if !read_confirmation(std::io::stdin().lock())? {
        info!("Migration not confirmed");
        bail!("Migration not confirmed");
    }
    Ok(())
}

/// Read one answer line; end of input counts as a refusal
fn read_confirmation<R: BufRead>(mut input: R) -> Result<bool> {
    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(answer.trim() == CONFIRMATION)
}

/// File layer for the audit log, console layer for warnings
fn setup_logging(config: &MigrateConfig) -> Result<WorkerGuard> {
    let (dir, file_name) = split_log_path(&config.log_file)?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_names(true)
        .with_target(false)
        .with_filter(EnvFilter::new(file_directives(config.debug)));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(EnvFilter::new(console_directives(config.verbose)));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

fn file_directives(debug: bool) -> &'static str {
    if debug {
        "ds_migrate=debug,warn"
    } else {
        "ds_migrate=info,warn"
    }
}

fn console_directives(verbose: bool) -> String {
    let base = if verbose { "ds_migrate=info,warn" } else { "warn" };
    format!("{base},{FATAL_TARGET}=off")
}

fn split_log_path(path: &Path) -> Result<(&Path, &Path)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file '{}' has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok((dir, Path::new(file_name)))
}
