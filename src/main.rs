use anyhow::{Context, Result};
use clap::Parser;
use signflow::app::{ReplayOptions, build_session, run_replay};
use signflow::cli::{Cli, Commands, ConfigAction};
use signflow::config::Config;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Replay {
            frames,
            model,
            labels,
            scaler,
            preset,
            realtime,
            no_commit,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(preset) = preset {
                preset.apply(&mut config);
            }
            config.assets.model = model.or(config.assets.model);
            config.assets.labels = labels.or(config.assets.labels);
            config.assets.scaler = scaler.or(config.assets.scaler);

            let session = build_session(&config)?;
            let reader = open_frames(&frames)?;
            let options = ReplayOptions {
                realtime,
                commit_at_end: !no_commit,
            };
            let summary = run_replay(session, reader, &options, std::io::stdout())?;
            tracing::info!(
                frames = summary.frames,
                skipped = summary.skipped_lines,
                events = summary.events,
                "replay finished"
            );
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays a clean event stream.
///
/// `RUST_LOG` wins over the verbosity flags when set.
fn init_tracing(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "signflow=debug,info",
        (false, _) => "signflow=trace,debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/signflow/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        },
    };

    Ok(config.with_env_overrides())
}

fn open_frames(path: &Path) -> Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(std::io::stdin())));
    }
    let file =
        File::open(path).with_context(|| format!("Cannot open recording {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = load_config(custom_path)?;
            match config.get_value_by_path(&key) {
                Ok(value) => println!("{}", value),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::List => {
            let config = load_config(custom_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .or_else(Config::default_path);
            match path {
                Some(path) => println!("{}", path.display()),
                None => {
                    eprintln!("Error: no configuration directory on this system");
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}
