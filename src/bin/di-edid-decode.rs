//! Decode an EDID blob and print a human-readable report
//!
//! Reads a file, or stdin when no path (or `-`) is given:
//!
//! ```text
//! di-edid-decode /sys/class/drm/card0-DP-1/edid
//! cat edid.bin | di-edid-decode --json
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use display_info::config::Config;
use display_info::Report;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "di-edid-decode")]
#[command(about = "Decode EDID, CTA-861 and DisplayID data", long_about = None)]
struct Args {
    /// EDID file to decode, stdin if omitted or "-"
    input: Option<PathBuf>,

    /// Print the decoded document as JSON
    #[arg(long)]
    json: bool,

    /// Replace serial numbers with "..."
    #[arg(long)]
    hide_serial_numbers: bool,

    /// Also print rarely used fields and raw payloads
    #[arg(long)]
    uncommon_features: bool,

    /// Config file (default: $XDG_CONFIG_HOME/di-edid-decode/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(short, long)]
    debug: bool,
}

#[derive(Serialize)]
struct JsonDump<'a> {
    edid: &'a display_info::Edid,
    derived: &'a display_info::DerivedInfo,
    diagnostics: &'a display_info::Diagnostics,
}

/// Read at most `limit` bytes, failing if the input is longer
fn read_input(input: Option<&PathBuf>, limit: usize) -> Result<Vec<u8>> {
    let reader: Box<dyn Read> = match input {
        Some(path) if path.as_os_str() != "-" => Box::new(
            std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        ),
        _ => Box::new(std::io::stdin()),
    };

    let mut data = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut data)
        .context("failed to read input")?;
    if data.len() > limit {
        bail!("input is larger than {} bytes", limit);
    }
    Ok(data)
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    config.hide_serial_numbers |= args.hide_serial_numbers;
    config.uncommon_features |= args.uncommon_features;
    debug!(?config, "Effective configuration");

    let data = read_input(args.input.as_ref(), config.max_input_size)?;
    info!(bytes = data.len(), "Read EDID");

    let info = display_info::parse(&data).context("failed to parse EDID")?;

    if args.json {
        let dump = JsonDump {
            edid: &info.edid,
            derived: &info.derived,
            diagnostics: &info.diagnostics,
        };
        println!("{}", serde_json::to_string_pretty(&dump)?);
    } else {
        print!("{}", Report::new(&info, config.report_options()));
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    // Quiet by default, verbose with --debug
    let default_filter = if args.debug {
        "debug"
    } else {
        "warn"
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(args) {
        eprintln!("di-edid-decode: {:#}", e);
        std::process::exit(1);
    }
}
