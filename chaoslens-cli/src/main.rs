mod args;
mod commands;

use anyhow::Result;
use chaoslens_core::AppSettings;
use clap::Parser;

use crate::args::{Cli, Command};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => AppSettings::load(path)?,
        None => AppSettings::default(),
    };

    match &cli.command {
        Command::Capture(args) => {
            let report = commands::capture(settings, args)?;
            log::info!(
                "{}x{} in {} tiles of {} ({:.2}s)",
                report.width,
                report.height,
                report.tiles,
                report.tile_size,
                report.elapsed.as_secs_f64()
            );
            println!("{}", report.path.display());
        }
        Command::Views { action } => commands::views(settings, action)?,
    }
    Ok(())
}
