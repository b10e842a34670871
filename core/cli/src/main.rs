#![warn(clippy::pedantic)]

//! # CIL Compiler CLI
//!
//! Command line interface for the CIL toolchain.
//!
//! All files given are read as one policy, every name is resolved, and the
//! merged orders are printed to stdout, one line per order:
//!
//! ```text
//! classorder: file dir socket
//! sidorder: kernel security
//! categoryorder: c0 c1
//! sensitivityorder: s0
//! ```
//!
//! Diagnostics are logged to stderr through `tracing`; `-v` shows disabled
//! optionals and other informational notes.
//!
//! ## Exit codes
//! * 0 – success.
//! * 1 – usage / IO / resolution failure.
//!
//! ## Example
//! ```bash
//! cilc policy.cil --multiple-decls -v
//! ```

mod parser;

use std::{fs, process};

use anyhow::Context;
use clap::Parser;
use cil::compile;
use parser::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(args: &Cli) -> anyhow::Result<()> {
    if let Some(missing) = args.paths.iter().find(|p| !p.exists()) {
        anyhow::bail!("path not found: {}", missing.display());
    }
    let options = args.options()?;

    let mut texts = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        texts.push((path.display().to_string(), text));
    }
    let sources: Vec<(&str, &str)> = texts.iter().map(|(n, t)| (n.as_str(), t.as_str())).collect();

    let db = compile(&sources, options)?;
    let orders = db.orders();
    for (label, items) in [
        ("classorder", &orders.classes),
        ("sidorder", &orders.sids),
        ("categoryorder", &orders.categories),
        ("sensitivityorder", &orders.sensitivities),
    ] {
        println!("{label}: {}", db.names(items).join(" "));
    }
    Ok(())
}
