//! Tabular output for `--list-kinds` and `--status`

use crate::app::kinds::ModuleKind;
use crate::app::runtime::ModuleStatus;
use crate::module::api::ModuleState;
use prettytable::{format, Cell, Row, Table};

fn header(titles: &[&str], use_color: bool) -> Row {
    Row::new(
        titles
            .iter()
            .map(|title| {
                let cell = Cell::new(title);
                if use_color {
                    cell.style_spec("bFy")
                } else {
                    cell
                }
            })
            .collect(),
    )
}

fn table(titles: &[&str], use_color: bool) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.set_titles(header(titles, use_color));
    table
}

/// Render the registered module kinds
pub fn render_kinds(kinds: &[&ModuleKind], use_color: bool) -> String {
    if kinds.is_empty() {
        return "No module kinds registered.\n".to_string();
    }

    let mut table = table(&["Kind", "Description"], use_color);
    for kind in kinds {
        table.add_row(Row::new(vec![Cell::new(kind.name), Cell::new(kind.description)]));
    }
    table.to_string()
}

/// Render one row per module
pub fn render_status(status: &[ModuleStatus], use_color: bool) -> String {
    let mut table = table(&["Module", "State", "Threads", "Live", "Queued"], use_color);
    for module in status {
        let state = Cell::new(&module.state.to_string());
        let state = match (use_color, module.state) {
            (false, _) => state,
            (true, ModuleState::Running) => state.style_spec("Fg"),
            (true, ModuleState::Stopping) => state.style_spec("Fy"),
            (true, ModuleState::Stopped) => state.style_spec("Fr"),
        };
        table.add_row(Row::new(vec![
            Cell::new(&module.name),
            state,
            Cell::new(&module.threads.to_string()),
            Cell::new(&module.live_workers.to_string()),
            Cell::new(&module.queued.to_string()),
        ]));
    }
    table.to_string()
}
