use std::path::PathBuf;

use clap::Parser;

/// xbexploder - add a zero-filled section to an Xbox executable
#[derive(Debug, Parser)]
#[command(name = "xbexploder", version, about, long_about = None)]
pub struct Cli {
    /// Path to the XBE file to patch.
    #[arg(value_name = "FILE")]
    pub path: PathBuf,

    /// Name of the new section.
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Size of the new section in bytes (hex like 0x1000 or decimal).
    #[arg(value_name = "SIZE", value_parser = parse_size)]
    pub size: u32,

    /// Rewrite the file directly instead of replacing it with a patched copy.
    #[arg(long)]
    pub in_place: bool,

    /// Alignment of the new section's virtual address (hex or decimal).
    #[arg(long, value_name = "N", default_value = "0x1000", value_parser = parse_alignment)]
    pub section_alignment: u32,

    /// Fail instead of dropping the embedded PE header when the header region is full.
    #[arg(long)]
    pub no_evict: bool,

    #[command(flatten)]
    pub global: GlobalOptions,
}

/// Options that control output.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse a number given as `0x`-prefixed hex or decimal.
pub fn parse_size(value: &str) -> Result<u32, String> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid number '{value}': {e}"))
}

fn parse_alignment(value: &str) -> Result<u32, String> {
    let alignment = parse_size(value)?;
    if alignment.is_power_of_two() {
        Ok(alignment)
    } else {
        Err(format!("alignment {alignment:#x} is not a power of two"))
    }
}
