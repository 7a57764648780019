//! JSON-lines front end for the query service.
//!
//! Reads one request per stdin line, e.g. `{"op":"filtered_row","kind":"abnormal","filtered_index":1}`,
//! and writes one JSON response per stdout line.

use std::io::{BufRead, BufWriter, Write};

use anyhow::{Context, Result};
use log::error;

use rusty_ecg::{QueryService, ServiceConfig};

fn main() -> Result<()> {
    env_logger::init();

    let config = ServiceConfig::from_env()?;
    let service = QueryService::new();
    if let Err(e) = service.start(&config) {
        error!("Startup failed: {e}");
        std::process::exit(1);
    }

    let stdin = std::io::stdin();
    let mut out = BufWriter::new(std::io::stdout().lock());

    for line in stdin.lock().lines() {
        let line = line.context("reading request")?;
        if line.trim().is_empty() {
            continue;
        }

        let response = service.handle_line(&line);
        serde_json::to_writer(&mut out, &response).context("writing response")?;
        writeln!(out).context("writing response")?;
        out.flush().context("flushing response")?;
    }

    Ok(())
}
