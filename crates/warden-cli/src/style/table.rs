//! comfy-table builders.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use super::no_color;

fn base() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn cell(text: &str, color: Color, bold: bool) -> Cell {
    let cell = Cell::new(text);
    match (no_color(), bold) {
        (true, _) => cell,
        (false, true) => cell.fg(color).add_attribute(Attribute::Bold),
        (false, false) => cell.fg(color),
    }
}

/// A table with a highlighted header row; rows are added by the caller.
pub fn styled_table(headers: &[&str]) -> Table {
    let mut table = base();
    table.set_header(headers.iter().map(|h| cell(h, Color::Cyan, true)));
    table
}

/// Two columns: dimmed labels on the left, values on the right.
pub fn info_table(entries: &[(&str, String)]) -> Table {
    let mut table = base();
    for (label, value) in entries {
        table.add_row(vec![cell(label, Color::DarkGrey, false), Cell::new(value)]);
    }
    table
}
