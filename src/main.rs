use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use asciifog::app::{self, RunOptions};
use asciifog::cli::{Cli, Command};
use asciifog::color::Rgba;
use asciifog::config::{load_settings, project_paths, save_settings_atomic};
use asciifog::snapshot::{self, SnapshotOptions};

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to open log {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(path) = &cli.log {
        init_logging(path)?;
    }

    let settings_path = cli
        .config
        .clone()
        .or_else(|| project_paths().map(|p| p.settings_path));
    let mut settings = settings_path
        .as_deref()
        .map(load_settings)
        .unwrap_or_default();
    cli.overrides.apply(&mut settings);
    let seed = settings.seed;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => app::run(RunOptions {
            settings,
            seed,
            settings_path,
        }),
        Command::Snapshot {
            width,
            height,
            scale,
            time_ms,
            out,
        } => {
            let opts = SnapshotOptions {
                width,
                height,
                scale,
                time_ms,
                seed,
            };
            let canvas = snapshot::render(&settings, &opts).context("snapshot failed")?;
            let bg = Rgba::parse(&settings.colors.background).unwrap_or(Rgba::rgb(0, 0, 0));
            snapshot::write_png(&canvas, bg, &out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("wrote {} ({}x{})", out.display(), canvas.w, canvas.h);
            Ok(())
        }
        Command::InitConfig { force } => {
            let Some(path) = settings_path else {
                bail!("no config directory available; pass --config");
            };
            if path.exists() && !force {
                bail!("{} already exists (use --force)", path.display());
            }
            save_settings_atomic(&path, &settings.sanitized())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
            Ok(())
        }
    }
}
