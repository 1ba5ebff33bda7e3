//! Point Ledger CLI
//!
//! Applies charge/use commands read from CSV and prints the final balances
//! or the full transaction history.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > balances.csv
//! cargo run -- commands.csv --history > history.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity
//! - `POINT_LOCK_TIMEOUT_MS`: Give up waiting for a user's lock after this long

use point_ledger::{
    EngineConfig, InMemoryEngine, InMemoryHistoryLog, InMemoryPointStore, PointError, Result,
};
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(PointError::MissingArgument);
    }

    let input_path = &args[1];
    let show_history = args[2..].iter().any(|a| a == "--history");

    let file = File::open(input_path)?;
    let reader = BufReader::new(file);

    let engine = InMemoryEngine::with_config(
        InMemoryPointStore::new(),
        InMemoryHistoryLog::new(),
        EngineConfig::from_env(),
    );
    engine.process_csv(reader)?;

    let stdout = io::stdout();
    let handle = stdout.lock();
    if show_history {
        engine.write_history(handle)?;
    } else {
        engine.write_output(handle)?;
    }

    Ok(())
}
