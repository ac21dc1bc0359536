use ratatui::style::{Color, Style};

use crate::format::CellValue;
use crate::record::TaskStatus;

/// Presentation class attached to a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellClass {
    None,
    Active,
    Cancelled,
    Completed,
    Failed,
    Queued,
    Unknown,
}

impl CellClass {
    pub fn name(&self) -> &'static str {
        match self {
            CellClass::None => "",
            CellClass::Active => "MuiDataGrid-cell-active-cell",
            CellClass::Cancelled => "MuiDataGrid-cell-cancelled-cell",
            CellClass::Completed => "MuiDataGrid-cell-completed-cell",
            CellClass::Failed => "MuiDataGrid-cell-failed-cell",
            CellClass::Queued => "MuiDataGrid-cell-queued-cell",
            CellClass::Unknown => "MuiDataGrid-cell-unknown-cell",
        }
    }

    /// Terminal colors standing in for the dashboard palette.
    pub fn style(&self) -> Style {
        match self {
            CellClass::None => Style::default(),
            CellClass::Active => Style::default().bg(Color::LightGreen).fg(Color::Black),
            CellClass::Cancelled => Style::default().bg(Color::DarkGray).fg(Color::White),
            CellClass::Completed => Style::default().bg(Color::LightBlue).fg(Color::Black),
            CellClass::Failed => Style::default().bg(Color::Red).fg(Color::White),
            CellClass::Queued => Style::default().bg(Color::Gray).fg(Color::Black),
            CellClass::Unknown => Style::default().bg(Color::Yellow).fg(Color::Black),
        }
    }
}

pub fn status_class(status: TaskStatus) -> CellClass {
    match status {
        TaskStatus::Underway => CellClass::Active,
        TaskStatus::Completed => CellClass::Completed,
        TaskStatus::Canceled => CellClass::Cancelled,
        TaskStatus::Failed => CellClass::Failed,
        TaskStatus::Queued => CellClass::Queued,
        TaskStatus::Uninitialized
        | TaskStatus::Blocked
        | TaskStatus::Error
        | TaskStatus::Standby
        | TaskStatus::Delayed
        | TaskStatus::Skipped
        | TaskStatus::Killed => CellClass::Unknown,
    }
}

/// Class for a rendered status string. Only exact wire names are styled,
/// the same values the status filter's `is` matches. Anything else gets the
/// unknown class.
pub fn status_value_class(value: &str) -> CellClass {
    match TaskStatus::from_wire(value) {
        Some(status) => status_class(status),
        None => CellClass::Unknown,
    }
}

pub fn cell_class_name(field: &str, value: &CellValue) -> CellClass {
    if field != crate::columns::STATUS_FIELD {
        return CellClass::None;
    }
    match value {
        CellValue::Text(s) => status_value_class(s),
        _ => CellClass::Unknown,
    }
}
