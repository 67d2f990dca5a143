use anyhow::Context;
use serde::Serialize;
use xbexploder::{
    write::{SecondaryHeaderDecision, WriteStrategy},
    SectionConfig, SectionReport, XbeImage,
};

use crate::{
    app::Cli,
    output::{hex, print_indented, print_output, section_table, SectionEntry},
};

#[derive(Debug, Serialize)]
struct AddOutput {
    file: String,
    added: String,
    virtual_address: String,
    virtual_size: u32,
    raw_address: String,
    raw_size: u32,
    appended_size: u64,
    pe_header: &'static str,
    sections: Vec<SectionEntry>,
}

/// Build the insertion config from the command line flags.
pub fn section_config(cli: &Cli) -> SectionConfig {
    let write_strategy = if cli.in_place {
        WriteStrategy::InPlace
    } else {
        WriteStrategy::AtomicReplace
    };

    SectionConfig {
        section_alignment: cli.section_alignment,
        allow_secondary_eviction: !cli.no_evict,
        ..SectionConfig::default()
    }
    .with_write_strategy(write_strategy)
}

fn decision_name(decision: SecondaryHeaderDecision) -> &'static str {
    match decision {
        SecondaryHeaderDecision::Absent => "absent",
        SecondaryHeaderDecision::Retained => "retained",
        SecondaryHeaderDecision::Evicted => "evicted",
    }
}

pub fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = section_config(cli);
    let report: SectionReport = xbexploder::add_section(&cli.path, &cli.name, cli.size, &config)
        .with_context(|| format!("failed to add section to {}", cli.path.display()))?;

    let image = XbeImage::from_file(&cli.path)
        .with_context(|| format!("failed to reload {}", cli.path.display()))?;

    let sections = image
        .sections
        .iter()
        .map(|section| SectionEntry {
            name: section.name.to_string(),
            virtual_address: section.header.virtual_address,
            virtual_size: section.header.virtual_size,
            raw_address: section.header.raw_address,
            raw_size: section.header.raw_size,
            flags: section.header.flags.bits(),
        })
        .collect();

    let output = AddOutput {
        file: cli.path.display().to_string(),
        added: report.name.clone(),
        virtual_address: hex(report.virtual_address),
        virtual_size: report.virtual_size,
        raw_address: hex(report.raw_address),
        raw_size: report.raw_size,
        appended_size: report.appended_size,
        pe_header: decision_name(report.secondary_header),
        sections,
    };

    print_output(&output, &cli.global, |out| {
        println!("Added section {} to {}", out.added, out.file);
        println!("  Virtual address: {}", out.virtual_address);
        println!("  Virtual size:    0x{:X}", out.virtual_size);
        println!("  Raw address:     {}", out.raw_address);
        println!("  Raw size:        0x{:X}", out.raw_size);
        println!("  PE header:       {}", out.pe_header);

        println!("\nSections ({}):", out.sections.len());
        print_indented(&section_table(&out.sections), "  ");
    })
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn config_from_flags() {
        let cli = Cli::try_parse_from([
            "xbexploder",
            "default.xbe",
            "hack",
            "100",
            "--in-place",
            "--no-evict",
            "--section-alignment",
            "0x10",
        ])
        .unwrap();
        let config = section_config(&cli);

        assert_eq!(config.section_alignment, 16);
        assert_eq!(config.file_alignment, 0x1000);
        assert!(!config.allow_secondary_eviction);
        assert_eq!(config.write_strategy, WriteStrategy::InPlace);

        let cli = Cli::try_parse_from(["xbexploder", "default.xbe", "hack", "100"]).unwrap();
        assert_eq!(section_config(&cli), SectionConfig::default());
    }
}
