use std::io;
use std::process;

use clap::Parser;
use log::{error, info, warn, LevelFilter};

use pmerkle::cli::args::Cli;
use pmerkle::cli::commands::{execute_command, exit_code};
use pmerkle::config::Settings;
use pmerkle::CancelToken;

fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref(), &cli.overrides()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    match settings.log_level() {
        Ok(level) => setup_logging(level),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }

    match cli.config.as_deref() {
        Some(path) => info!("starting with config file {}", path.display()),
        None => info!("starting without config file"),
    }

    let ctx = CancelToken::new();
    install_signal_handler(&ctx);

    let stdout = io::stdout();
    match execute_command(&cli, &settings, &ctx, &mut stdout.lock()) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            process::exit(exit_code(&e));
        }
    }
}

// SIGINT, SIGTERM and SIGHUP cancel the running build or verify.
fn install_signal_handler(ctx: &CancelToken) {
    let token = ctx.clone();
    let res = ctrlc::set_handler(move || {
        warn!("interrupted, cancelling");
        token.cancel();
    });
    if let Err(e) = res {
        warn!("unable to install signal handler: {}", e);
    }
}

// RUST_LOG, when set, refines the configured level.
fn setup_logging(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .init();

    info!("logger has been initialized: verbosity-level={}", level);
}
