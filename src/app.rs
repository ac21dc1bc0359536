use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

use taskgrid::domain::GridConfig;

/// Settings of the terminal panel around the grid.
#[derive(Debug, Clone, Setters)]
pub struct AppConfig {
    pub grid: GridConfig,
    pub event_poll_time: u64,
    pub status_message_timeout: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            event_poll_time: 100,
            status_message_timeout: 3000,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    NextPageSize,
    Enter,
    Exit,
    Filter,
    ClearFilters,
    Sort,
    CopyRow,
    Refresh,
    Help,
    RawKey(KeyEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    Filter,
}

pub const HELP_TEXT: &str = "\
taskgrid key bindings

  q          quit
  j / k      select next / previous row
  h / l      select previous / next column
  n / p      next / previous page
  g / G      first / last page
  +          cycle page size
  Enter      show task details
  Esc        close popup
  f          add a filter: <column> <operator> [value]
  F          clear all filters
  s          sort by selected column (asc, desc, off)
  c          copy selected task as CSV
  r          reload current page
  ?          this help

Operators
  date columns    is not after onOrAfter before onOrBefore isEmpty isNotEmpty
  State           is isEmpty isNotEmpty
  other columns   contains equals startsWith endsWith isEmpty isNotEmpty
";
