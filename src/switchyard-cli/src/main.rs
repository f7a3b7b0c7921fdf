//! `switchyard` binary entry point.

use anyhow::Result;
use switchyard_engine::exit_code;
use tracing::{debug, error};

#[tokio::main]
async fn main() -> Result<()> {
    switchyard_cli::logging::init_tracing();

    let settings = switchyard_cli::load_settings()?;
    debug!(?settings, "Loaded engine settings");

    let dispatcher = match switchyard_cli::build_dispatcher(switchyard_cli::runtime_config(&settings)) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            error!(error = %e, "Command registration failed");
            eprintln!("{e}");
            std::process::exit(exit_code::FAILURE);
        }
    };

    let argv = match switchyard_cli::utf8_args(std::env::args_os().skip(1)) {
        Ok(argv) => argv,
        Err(message) => {
            dispatcher.config().log_error().emit(&message);
            std::process::exit(exit_code::FAILURE);
        }
    };

    let code = dispatcher.run(argv).await;
    std::process::exit(code);
}
