use clap::Parser;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use icardfinder::cli::{Cli, Commands};
use icardfinder::compare;
use icardfinder::config::{self, AppConfig, RunConfig};
use icardfinder::logger::{self, RunProgress, VerbosityLevel};
use icardfinder::orchestrator::{self, RunSummary};
use icardfinder::page::HtmlPageInterpreter;
use icardfinder::queue::WorkQueue;
use icardfinder::transport::ReqwestTransport;

/// Global flag for interrupt signaling - a second Ctrl+C exits immediately
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run icardfinder again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    logger::init_tracing(VerbosityLevel::from_verbose_count(cli.verbose), cli.no_color);

    if let Some(Commands::Diff { left, right }) = &cli.command {
        run_diff(Path::new(left), Path::new(right));
        return;
    }

    let app_config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(config::ConfigError::FileNotFound(path)) => {
            eprintln!("❌ Configuration file not found at: {}", path.display());
            eprintln!("   Run with --init to create a default configuration file.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let run_config = match RunConfig::resolve(&app_config, &cli.run_overrides()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Invalid arguments: {}", e);
            std::process::exit(1);
        }
    };

    let interpreter = match HtmlPageInterpreter::new(&run_config.results_table_id, run_config.result_cell_index) {
        Ok(interpreter) => interpreter,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    let transport = ReqwestTransport::new(run_config.transport.clone());

    let queue = Arc::new(WorkQueue::new());
    let handler_queue = queue.clone();
    ctrlc::set_handler(move || {
        if INTERRUPTED.swap(true, Ordering::SeqCst) {
            eprintln!("⚠️  Force exiting. Addresses in flight will be retried next run.");
            std::process::exit(130); // 130 = 128 + SIGINT(2), standard exit code for Ctrl-C
        }
        eprintln!("\n⚠️  Interrupt received. Finishing in-flight lookups (Ctrl+C again to force)...");
        handler_queue.abort();
    })
    .unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to set Ctrl-C handler: {}. Interrupt signals may not be handled gracefully.", e);
    });

    let progress = if cli.no_progress || !std::io::stderr().is_terminal() {
        RunProgress::hidden()
    } else {
        RunProgress::new(0)
    };

    let summary = match orchestrator::run(
        &run_config,
        Arc::new(transport),
        Arc::new(interpreter),
        queue,
        progress,
    )
    .await
    {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    };

    print_summary(&summary, &run_config);

    if let Some(path) = &cli.summary_file {
        if let Err(e) = orchestrator::export_summary(&summary, Path::new(path)) {
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    }

    if summary.interrupted {
        std::process::exit(130);
    }
}

fn load_config(path: Option<&str>) -> Result<AppConfig, config::ConfigError> {
    match path {
        Some(path) => AppConfig::load_from_path(Path::new(path)),
        None => AppConfig::load(),
    }
}

fn print_summary(summary: &RunSummary, run_config: &RunConfig) {
    let stats = &summary.stats;
    println!();
    println!("📋 Run summary");
    println!("   Input addresses:    {}", summary.total_input);
    println!("   Already recorded:   {}", summary.skipped);
    println!("   Looked up:          {}", summary.enqueued);
    println!("   I-cards found:      {}", stats.found);
    println!("   No I-cards:         {}", stats.not_found);
    println!("   Failed:             {}", stats.failed);
    println!("   Retries:            {}", stats.retried);
    if stats.multiple_form_pages > 0 {
        println!("   Multi-form pages:   {}", stats.multiple_form_pages);
    }
    println!("   Duration:           {:.1}s", summary.duration_secs);
    println!("✅ Results appended to {}", run_config.output_path.display());
    if let Some(failure) = &run_config.failure_path {
        if stats.failed > 0 {
            println!("⚠️  Failures appended to {}", failure.display());
        }
    }

    if !stats.abandoned.is_empty() {
        eprintln!();
        eprintln!(
            "⚠️  {} addresses failed {} times and were not recorded (no failure log configured):",
            stats.abandoned.len(),
            run_config.max_attempts
        );
        for item in &stats.abandoned {
            eprintln!("   {}: {}", item.key, item.error);
        }
    }

    if summary.interrupted {
        eprintln!("⚠️  Run interrupted. Re-run with the same settings to continue.");
    }
}

fn run_diff(left: &Path, right: &Path) {
    let comparison = match compare::compare_logs(left, right) {
        Ok(comparison) => comparison,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    };

    for mismatch in &comparison.mismatches {
        println!("NO MATCH {}: {:?} vs {:?}", mismatch.key, mismatch.left, mismatch.right);
    }
    println!(
        "{} shared addresses: {} match, {} differ",
        comparison.shared(),
        comparison.matches,
        comparison.mismatches.len()
    );
    println!(
        "{} only in {}, {} only in {}",
        comparison.only_left,
        left.display(),
        comparison.only_right,
        right.display()
    );
}
