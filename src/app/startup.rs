//! Binary entry point: configuration, logging, run until shutdown

use crate::app::cli::api::{render_kinds, render_status, Args};
use crate::app::config::RuntimeConfig;
use crate::app::kinds::discover_kinds;
use crate::app::runtime::Runtime;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::version::version_banner;
use clap::Parser;
use std::io::IsTerminal;

/// Run the application and return the process exit code
pub async fn startup() -> i32 {
    let args = Args::parse();
    run(args).await
}

/// Run with already-parsed arguments
pub async fn run(args: Args) -> i32 {
    let config = match RuntimeConfig::load(args.config_file.as_deref()).await {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Error: {}", error);
            return 1;
        }
    };

    let logging = args.logging(&config.logging, std::io::stdout().is_terminal());
    colored::control::set_override(logging.color);
    if let Err(error) = init_logging(
        logging.level.as_deref(),
        logging.format.as_deref(),
        logging.file.as_deref(),
        logging.color,
    ) {
        eprintln!("Warning: logging unavailable: {}", error);
    }
    log::info!("{}", version_banner());

    if args.list_kinds {
        print!("{}", render_kinds(&discover_kinds(), logging.color));
        return 0;
    }

    let runtime = match Runtime::build(&config) {
        Ok(runtime) => runtime,
        Err(error) => {
            log_error_with_context(&error, "Building modules from configuration");
            return 1;
        }
    };

    let (shutdown, shutdown_rx) = ShutdownCoordinator::new();
    shutdown.install_signal_handlers();

    runtime.start();
    let reason = shutdown.wait(shutdown_rx, args.run_duration()).await;
    log::info!("Shutdown requested ({:?})", reason);

    // stop_all joins worker threads
    let runtime = match tokio::task::spawn_blocking(move || {
        runtime.stop();
        runtime
    })
    .await
    {
        Ok(runtime) => runtime,
        Err(error) => {
            log::error!("Shutdown task failed: {}", error);
            return 1;
        }
    };

    if args.status {
        print!("{}", render_status(&runtime.status(), logging.color));
    }
    0
}
