use std::io;
use std::process::ExitCode;

use aura_keygen::bootstrap::run;
use aura_keygen::config::AppConfig;
use aura_keygen::errors::KeygenError;
use aura_keygen::logging::init_logging;

fn report_startup_error(context: &str, err: &KeygenError) {
    eprintln!("Error {context}: {err}");
    if let Some(hint) = err.remediation() {
        eprintln!("{hint}");
    }
}

/// Generate the configured number of keys and upload them.
///
/// Exits with status 1 if configuration or store initialization fails.
/// Failed individual keys are reported on stdout and do not change the exit
/// status.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            report_startup_error("loading configuration", &e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging);

    let mut stdout = io::stdout();
    match run(&config, &mut stdout).await {
        Ok(_report) => {
            println!("You can now find these keys in your Firebase Firestore console.");
            ExitCode::SUCCESS
        }
        Err(e @ KeygenError::IoError(_)) => {
            report_startup_error("writing progress", &e);
            ExitCode::FAILURE
        }
        Err(e) => {
            report_startup_error("initializing Firestore client", &e);
            ExitCode::FAILURE
        }
    }
}
