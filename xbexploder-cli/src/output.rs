use comfy_table::{presets, Cell, CellAlignment, Row, Table};
use serde::Serialize;

use crate::app::GlobalOptions;

/// Print `data` as JSON (if `--json`) or call `display_fn` for human-readable output.
pub fn print_output<T: Serialize>(
    data: &T,
    opts: &GlobalOptions,
    display_fn: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if opts.json {
        println!("{}", serde_json::to_string_pretty(data)?);
    } else {
        display_fn(data);
    }
    Ok(())
}

/// One row of the section listing.
#[derive(Debug, Serialize)]
pub struct SectionEntry {
    pub name: String,
    pub virtual_address: u32,
    pub virtual_size: u32,
    pub raw_address: u32,
    pub raw_size: u32,
    pub flags: u32,
}

/// Borderless section listing; names left, addresses and sizes right-aligned.
pub fn section_table(sections: &[SectionEntry]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    table.set_header(["Name", "VA", "VSize", "Raw", "RawSize", "Flags"]);

    for section in sections {
        let numbers = [
            hex(section.virtual_address),
            format!("0x{:X}", section.virtual_size),
            format!("0x{:X}", section.raw_address),
            format!("0x{:X}", section.raw_size),
            format!("0x{:X}", section.flags),
        ];
        let mut row = Row::from([Cell::new(&section.name)]);
        for value in numbers {
            row.add_cell(Cell::new(value).set_alignment(CellAlignment::Right));
        }
        table.add_row(row);
    }
    table
}

/// Print every line of `table` behind `indent`.
pub fn print_indented(table: &Table, indent: &str) {
    for line in table.lines() {
        println!("{indent}{}", line.trim_end());
    }
}

/// Format an address the way the section table shows it.
pub fn hex(value: u32) -> String {
    format!("0x{value:08X}")
}
