//! Command line argument parsing for the CIL compiler.
//!
//! This module defines the CLI interface using `clap`. The `Cli` struct captures
//! all command line flags and arguments passed to the `cilc` binary.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use cil::ResolverOptions;

/// Command line interface definition for the CIL compiler.
///
/// Every file named on the command line is part of one policy. The files are
/// read in the order given, resolved together, and the merged class, SID,
/// category and sensitivity orders are printed.
///
/// ## Options
///
/// Resolver options can come from a JSON file (`--config`) using the
/// kebab-case keys of [`ResolverOptions`]. A flag given on the command line
/// turns its option on regardless of the file.
///
/// ## Examples
///
/// ```bash
/// cilc base.cil modules/*.cil
/// cilc policy.cil --config resolver.json -vv
/// ```
#[derive(Parser)]
#[command(
    name = "cilc",
    author,
    version,
    about = "CIL policy compiler (cilc)",
    long_about = "The 'cilc' command reads one or more CIL source files as a single policy, \
resolves every name in it and prints the merged declaration orders."
)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct Cli {
    /// Policy source files.
    #[arg(required = true)]
    pub(crate) paths: Vec<PathBuf>,

    /// Allow `type` and `typeattribute` to be declared more than once.
    #[clap(long = "multiple-decls", action = clap::ArgAction::SetTrue)]
    pub(crate) multiple_decls: bool,

    /// Treat dotted names as plain names instead of block paths.
    #[clap(long = "qualified-names", action = clap::ArgAction::SetTrue)]
    pub(crate) qualified_names: bool,

    /// Keep `tunableif` statements as `booleanif`s.
    #[clap(long = "preserve-tunables", action = clap::ArgAction::SetTrue)]
    pub(crate) preserve_tunables: bool,

    /// JSON file with resolver options.
    #[clap(long = "config", value_name = "FILE")]
    pub(crate) config: Option<PathBuf>,

    /// Log more; repeat for more detail. `RUST_LOG` takes precedence.
    #[clap(short = 'v', action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
}

impl Cli {
    /// Options from `--config`, with the command line flags applied on top.
    pub(crate) fn options(&self) -> anyhow::Result<ResolverOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))?
            }
            None => ResolverOptions::default(),
        };
        options.multiple_decls |= self.multiple_decls;
        options.qualified_names |= self.qualified_names;
        options.preserve_tunables |= self.preserve_tunables;
        Ok(options)
    }

    pub(crate) fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
