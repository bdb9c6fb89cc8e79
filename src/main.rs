use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use performer::config::{self, Secrets};
use performer::stage::{self, Stage};
use performer::{logging, Cli};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("performer: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Config file first, then CLI flags on top
    let options = config::load_config(cli.config.as_deref())?;
    let options = cli.merge_into_options(options)?;
    options.validate()?;

    logging::init(options.log_level, options.log_file.as_deref())?;
    log::info!("performer {} starting", env!("CARGO_PKG_VERSION"));
    log::debug!("options: {:?}", options);

    let secrets = Secrets::from_env();
    let parts = stage::build_parts(&options, &secrets)?;
    let stage = Stage::new(&options, parts);

    let run_flag = stage.run_flag();
    ctrlc::set_handler(move || {
        log::info!("interrupt received, stopping");
        run_flag.stop();
    })
    .context("Failed to install Ctrl-C handler")?;

    let summary = stage.run()?;
    log::info!(
        "performer exiting after {} utterances",
        summary.played
    );
    Ok(())
}
