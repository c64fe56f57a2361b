use std::env;
use std::path::PathBuf;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use titan_decision_rs::config::Settings;
use titan_decision_rs::data_validator;
use titan_decision_rs::engine::DecisionEngine;
use titan_decision_rs::metrics;

const UNKNOWN_SYMBOL: &str = "UNKNOWN";

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let json = env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

struct Args {
    input: Option<PathBuf>,
    dual: bool,
    print_metrics: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        input: None,
        dual: false,
        print_metrics: false,
    };
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--dual" => args.dual = true,
            "--metrics" => args.print_metrics = true,
            other => args.input = Some(PathBuf::from(other)),
        }
    }
    args
}

/// Operator lines carry a `command` key instead of snapshot data.
fn handle_command(engine: &DecisionEngine, command: &str, line: &Value) -> Value {
    let reason = line
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("operator request");
    match command {
        "halt" => {
            engine.halt(reason);
            json!({ "command": "halt", "ok": true })
        }
        "resume" => {
            engine.resume(reason);
            json!({ "command": "resume", "ok": true })
        }
        "reload" => {
            let outcome = Settings::new().and_then(|s| engine.reload_config(s.thresholds));
            match outcome {
                Ok(fingerprint) => json!({ "command": "reload", "ok": true, "fingerprint": fingerprint }),
                Err(e) => json!({ "command": "reload", "ok": false, "error": e.to_string() }),
            }
        }
        other => {
            warn!("Unknown command '{}'", other);
            json!({ "command": other, "ok": false, "error": "unknown command" })
        }
    }
}

fn handle_line(engine: &DecisionEngine, line: &str, dual: bool) -> Option<Value> {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse line: {}", e);
            return None;
        }
    };

    if let Some(command) = value.get("command").and_then(|c| c.as_str()) {
        return Some(handle_command(engine, command, &value));
    }

    let symbol = data_validator::extract(&value)
        .ok()
        .and_then(|(raw, _)| raw.symbol)
        .unwrap_or_else(|| UNKNOWN_SYMBOL.to_string());

    let result = if dual {
        let short = value.get("short_term").cloned().unwrap_or(Value::Null);
        let medium = value.get("medium_term").cloned().unwrap_or(Value::Null);
        engine
            .evaluate_dual(&symbol, &short, &medium)
            .map(|c| serde_json::to_value(&*c).unwrap_or_default())
    } else {
        engine
            .evaluate(&symbol, &value)
            .map(|e| serde_json::to_value(&*e).unwrap_or_default())
    };

    match result {
        Ok(v) => Some(v),
        Err(e) => {
            error!(symbol = %symbol, "❌ {}", e);
            Some(json!({ "symbol": symbol, "error": e.to_string() }))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv::dotenv().ok();
    init_tracing();

    info!("╔═══════════════════════════════════════════════════════════════╗");
    info!("║               TITAN DECISION RS                               ║");
    info!("║               Market Decision Pipeline (advisory)             ║");
    info!("╚═══════════════════════════════════════════════════════════════╝");

    let args = parse_args();

    let settings = match Settings::new() {
        Ok(s) => s,
        Err(e) => {
            error!("❌ Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    let engine = match DecisionEngine::new(settings.thresholds) {
        Ok(engine) => engine,
        Err(e) => {
            for violation in e.violations() {
                error!("   {}", violation);
            }
            std::process::exit(1);
        }
    };

    let reader: Box<dyn tokio::io::AsyncBufRead + Unpin + Send> = match &args.input {
        Some(path) => {
            info!("📖 Reading snapshots from {:?}", path);
            Box::new(BufReader::new(tokio::fs::File::open(path).await?))
        }
        None => {
            info!("📖 Reading snapshots from STDIN");
            Box::new(BufReader::new(tokio::io::stdin()))
        }
    };
    let mut lines = reader.lines();
    let mut stdout = tokio::io::stdout();
    let mut processed: u64 = 0;

    loop {
        tokio::select! {
            next = lines.next_line() => {
                let Some(line) = next? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                if let Some(out) = handle_line(&engine, &line, args.dual) {
                    stdout.write_all(format!("{}\n", out).as_bytes()).await?;
                    processed += 1;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Interrupted, stopping replay");
                break;
            }
        }
    }
    stdout.flush().await?;

    info!(processed, lanes = engine.lanes().len(), "📊 Replay complete");
    if args.print_metrics {
        eprintln!("{}", metrics::render());
    }
    Ok(())
}
