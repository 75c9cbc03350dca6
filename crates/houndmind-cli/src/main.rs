//! `houndmind` – run the HoundMind tick loop from a config file.
//!
//! - `houndmind run` loads `~/.houndmind/config.toml` (or built-in defaults),
//!   builds the configured modules and ticks them until Ctrl-C or the cycle
//!   limit.
//! - `houndmind init` writes the default config file.
//!
//! Exit status is 1 on a config error or when a required module fails.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use houndmind_runtime::telemetry::init_tracing;
use houndmind_runtime::{HoundMindRuntime, ModuleRegistry};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "houndmind", version)]
#[command(about = "Cooperative tick scheduler for the PiDog robot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the runtime loop
    Run {
        /// Config file (default ~/.houndmind/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override runtime.tick_hz
        #[arg(long)]
        tick_hz: Option<u32>,
        /// Stop after this many ticks
        #[arg(long)]
        max_cycles: Option<u64>,
    },
    /// Write the default config file
    Init {
        /// Destination (default ~/.houndmind/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing("houndmind");

    let outcome = match cli.command {
        Commands::Run {
            config,
            tick_hz,
            max_cycles,
        } => run(config, tick_hz, max_cycles),
        Commands::Init { config, force } => init(config, force),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(path: Option<PathBuf>, tick_hz: Option<u32>, max_cycles: Option<u64>) -> Result<(), String> {
    let path = path.unwrap_or_else(config::config_path);
    let mut cfg = config::load_or_default(&path)?;
    if let Some(hz) = tick_hz {
        cfg.runtime.tick_hz = hz;
    }
    if max_cycles.is_some() {
        cfg.runtime.max_cycles = max_cycles;
    }

    let registry = ModuleRegistry::with_builtins();
    let modules = registry.build_all(&cfg.modules).map_err(|e| e.to_string())?;
    let mut runtime =
        HoundMindRuntime::new(cfg.runtime_config()?, modules).map_err(|e| e.to_string())?;

    let handle = runtime.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "Ctrl-C received – stopping after the current tick".yellow().bold());
        handle.request();
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; the loop can only stop at max_cycles");
    }

    print_banner(&path, &cfg);
    info!(
        config = %path.display(),
        tick_hz = runtime.tick_hz(),
        modules = runtime.modules().len(),
        "houndmind starting"
    );

    runtime.run().map_err(|e| e.to_string())?;

    println!(
        "  {} after {} tick(s).",
        "Stopped".green().bold(),
        runtime.cycles()
    );
    Ok(())
}

fn init(path: Option<PathBuf>, force: bool) -> Result<(), String> {
    let path = path.unwrap_or_else(config::config_path);
    if path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    config::save_to(&config::Config::default(), &path)?;
    println!("  Wrote {}", path.display().to_string().bold());
    Ok(())
}

fn print_banner(path: &std::path::Path, cfg: &config::Config) {
    println!();
    println!("{}", "  HoundMind runtime".bold().cyan());
    let source = if path.exists() {
        path.display().to_string()
    } else {
        "built-in defaults".to_string()
    };
    println!("  config   {}", source.dimmed());
    println!("  tick_hz  {}", cfg.runtime.tick_hz);
    match cfg.runtime.max_cycles {
        Some(n) => println!("  cycles   {n}"),
        None => println!("  cycles   {}", "until Ctrl-C".dimmed()),
    }
    for spec in &cfg.modules {
        let state = if spec.enabled {
            "enabled".green()
        } else {
            "disabled".yellow()
        };
        let required = if spec.required { " (required)" } else { "" };
        println!("    • {} [{}] {state}{required}", spec.name.bold(), spec.kind());
    }
    println!();
}
