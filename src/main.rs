use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use omr_sheet::{process_image, Cli, DebugOverlay, OmrConfig};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match &cli.config {
        Some(path) => OmrConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration: {:?}", path))?,
        None => OmrConfig::default(),
    };

    log::debug!("Input: {:?}", cli.input);
    log::debug!("Configuration: {:?}", config);

    let overlay = cli
        .debug_output_path()
        .map(|path| DebugOverlay::new(path).with_font(cli.font.as_deref()));

    let result = process_image(&cli.input, &config, overlay.as_ref());

    let json = result
        .to_json(cli.pretty)
        .context("Failed to serialize result")?;
    println!("{}", json);

    if cli.strict && !result.success {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
