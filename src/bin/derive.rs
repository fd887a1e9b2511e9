//! Derive R69 records for one game snapshot.
//!
//! Usage: `r69-derive [PATH | -]`. Reads `{"game": ..., "events": [...]}` as
//! JSON from PATH, or from stdin when PATH is `-` or absent, and prints the
//! derivation as JSON on stdout.
//!
//! Exit codes: 0 on success, 1 on unreadable input, 2 on an engine error
//! (reported on stdout as `{"error": {"kind": ..., "message": ...}}`).

use std::io::Read;

use serde::Serialize;
use tracing_subscriber::EnvFilter;

use r69_engine::engine::derive_game;
use r69_engine::error::{EngineError, Result};
use r69_engine::types::GameSnapshot;

#[derive(Serialize)]
struct ErrorBody<'a> {
    kind: &'a str,
    message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

fn main() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&log_level))
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args().nth(1);
    let snapshot = match read_snapshot(path.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Input error: {e}");
            std::process::exit(1);
        }
    };

    match derive_game(&snapshot) {
        Ok(derivation) => print_json(&derivation),
        Err(e) => {
            print_json(&error_envelope(&e));
            std::process::exit(2);
        }
    }
}

fn read_snapshot(path: Option<&str>) -> Result<GameSnapshot> {
    let raw = match path {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        Some(p) => std::fs::read_to_string(p)?,
    };
    Ok(serde_json::from_str(&raw)?)
}

fn error_envelope(e: &EngineError) -> ErrorEnvelope<'static> {
    ErrorEnvelope {
        error: ErrorBody {
            kind: e.kind(),
            message: e.to_string(),
        },
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("Output error: {e}");
            std::process::exit(1);
        }
    }
}
