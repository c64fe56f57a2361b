use std::env;
use std::process::ExitCode;

use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use titan_decision_rs::config::{Settings, ThresholdConfig};

/// Loads the layered threshold configuration (or a single TOML file given as
/// the first argument), validates it and prints the normalized document.
fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let loaded = match env::args().nth(1) {
        Some(path) => {
            info!("🔧 Checking {}", path);
            std::fs::read_to_string(&path)
                .map_err(|e| titan_decision_rs::DecisionError::ConfigParse(format!("{}: {}", path, e)))
                .and_then(|raw| ThresholdConfig::from_toml_str(&raw))
        }
        None => {
            info!("🔧 Checking layered configuration sources");
            Settings::new().map(|s| s.thresholds)
        }
    };

    let validated = match loaded.and_then(ThresholdConfig::validate) {
        Ok(v) => v,
        Err(e) => {
            error!("❌ {}", e);
            for violation in e.violations() {
                println!("VIOLATION {}", violation);
            }
            return ExitCode::FAILURE;
        }
    };

    println!("# fingerprint: {}", validated.fingerprint());
    match validated.to_toml_string() {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
