// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

use customer_profiler::{init_logging, Config, VERSION};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut config_path: Option<PathBuf> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().context("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
            }
            "--version" | "-V" => {
                println!("customer-profiler {}", VERSION);
                return Ok(());
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => bail!("unknown argument '{}' (try --help)", other),
        }
    }

    let config = Config::resolve(config_path.as_deref()).context("Failed to load configuration")?;

    // Console logging would draw over the alternate screen
    init_logging(&config.log_dir, &config.log_level, false);

    run_ui_mode(&config)
}

fn print_usage() {
    println!("customer-profiler {}", VERSION);
    println!();
    println!("USAGE:");
    println!("    customer-profiler [--config <path>]");
    println!();
    println!("Config lookup: --config, $PROFILER_CONFIG, ./profiler.toml, then the user config dir.");
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    use customer_profiler::Wizard;
    use std::time::Duration;

    tracing::info!(
        staging = %config.staging_dir.display(),
        backend = %config.backend_dir.display(),
        model = %config.model.model,
        "Starting customer profiler UI"
    );

    let wizard = Wizard::from_config(config);
    let mut app = ui::App::new(wizard, Duration::from_millis(config.splash_millis));
    ui::run_ui(&mut app)?;

    println!("\n✅ Customer profiler closed");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the HTTP API: cargo run --bin profiler-server --features server");
    std::process::exit(1);
}
