use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use derive_setters::Setters;
use tracing::warn;

use crate::domain::TaskGridError;
use crate::filter::{self, FilterFamily, FilterItem, FilterValue, Operator, Predicate};
use crate::format::{self, Accessor, CellValue, DisplayFormat, Locale};
use crate::record::{TaskState, TaskStatus};

pub const ID_FIELD: &str = "id";
pub const CATEGORY_FIELD: &str = "category";
pub const ASSIGNEE_FIELD: &str = "name";
pub const START_TIME_FIELD: &str = "unix_millis_start_time";
pub const FINISH_TIME_FIELD: &str = "unix_millis_finish_time";
pub const STATUS_FIELD: &str = "status";

/// Input used when a cell of the column is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellEditor {
    DatePicker,
    TimePicker,
}

/// Static declaration of how one column is computed, filtered and edited.
#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct ColumnDescriptor {
    #[setters(skip)]
    pub field: &'static str,
    #[setters(skip)]
    pub header: &'static str,
    pub width: u16,
    pub editable: bool,
    pub format: DisplayFormat,
    #[setters(skip)]
    pub accessor: Accessor,
    pub filter: FilterFamily,
    #[setters(strip_option)]
    pub editor: Option<CellEditor>,
}

impl ColumnDescriptor {
    pub fn new(field: &'static str, header: &'static str, accessor: Accessor) -> Self {
        Self {
            field,
            header,
            width: 150,
            editable: false,
            format: DisplayFormat::Verbatim,
            accessor,
            filter: FilterFamily::Text,
            editor: None,
        }
    }

    pub fn value(&self, task: &TaskState, locale: &Locale) -> CellValue {
        (self.accessor)(task, locale)
    }

    pub fn display(&self, value: &CellValue) -> String {
        format::display(value, self.format)
    }
}

/// The ordered list of columns of one grid. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    columns: Vec<ColumnDescriptor>,
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self::task_columns()
    }
}

impl ColumnSchema {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    pub fn task_columns() -> Self {
        Self::new(vec![
            ColumnDescriptor::new(ID_FIELD, "ID", format::task_id).with_width(90),
            ColumnDescriptor::new(CATEGORY_FIELD, "Category", format::category),
            ColumnDescriptor::new(ASSIGNEE_FIELD, "Assignee", format::assignee),
            ColumnDescriptor::new(START_TIME_FIELD, "Start Time", format::start_time)
                .with_format(DisplayFormat::Date)
                .with_filter(FilterFamily::Date { show_time: false })
                .with_editor(CellEditor::DatePicker),
            ColumnDescriptor::new(FINISH_TIME_FIELD, "End Time", format::finish_time)
                .with_format(DisplayFormat::Time)
                .with_filter(FilterFamily::Date { show_time: true })
                .with_editor(CellEditor::TimePicker),
            ColumnDescriptor::new(STATUS_FIELD, "State", format::status)
                .with_width(100)
                .with_filter(FilterFamily::Select),
        ])
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.field == field)
    }

    pub fn get(&self, field: &str) -> Option<&ColumnDescriptor> {
        self.position(field).map(|idx| &self.columns[idx])
    }

    /// Find a column by field key or header label, ignoring case.
    pub fn lookup(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| {
            c.field.eq_ignore_ascii_case(name)
                || c.header.eq_ignore_ascii_case(name)
                || c.header.replace(' ', "").eq_ignore_ascii_case(name)
        })
    }

    /// Bind every usable filter item to its column. Items naming unknown
    /// columns are dropped.
    pub fn compile_filters(&self, items: &[FilterItem]) -> Vec<(usize, Predicate)> {
        items
            .iter()
            .filter_map(|item| {
                let Some(idx) = self.position(&item.field) else {
                    warn!("Ignoring filter on unknown column \"{}\"", item.field);
                    return None;
                };
                filter::get_apply_filter_fn(self.columns[idx].filter, item).map(|p| (idx, p))
            })
            .collect()
    }

    /// All predicates must hold.
    pub fn matches(&self, task: &TaskState, locale: &Locale, predicates: &[(usize, Predicate)]) -> bool {
        predicates
            .iter()
            .all(|(idx, p)| p.test(&self.columns[*idx].value(task, locale)))
    }

    /// Parse `<column> <operator> [value]` typed into the command line.
    pub fn parse_filter(&self, expr: &str) -> Result<FilterItem, TaskGridError> {
        let (name, rest) = split_word(expr);
        let (op, raw) = split_word(rest);
        if name.is_empty() || op.is_empty() {
            return Err(TaskGridError::InvalidFilter(
                "expected <column> <operator> [value]".into(),
            ));
        }
        let column = self
            .lookup(name)
            .ok_or_else(|| TaskGridError::InvalidFilter(format!("unknown column \"{name}\"")))?;
        let operator: Operator = op.parse().map_err(TaskGridError::InvalidFilter)?;
        if !column.filter.offers(operator) {
            return Err(TaskGridError::InvalidFilter(format!(
                "column \"{}\" does not support \"{operator}\"",
                column.header
            )));
        }

        let value = if !operator.needs_value() || raw.is_empty() {
            None
        } else {
            Some(parse_filter_value(column.filter, raw)?)
        };

        Ok(FilterItem::new(column.field, operator, value))
    }
}

// First word of `s` and the trimmed remainder. Runs of whitespace count as
// one separator.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], s[idx..].trim()),
        None => (s, ""),
    }
}

fn parse_filter_value(family: FilterFamily, raw: &str) -> Result<FilterValue, TaskGridError> {
    let invalid = |what: &str| TaskGridError::InvalidFilter(format!("\"{raw}\" is not a valid {what}"));
    match family {
        FilterFamily::Text => Ok(FilterValue::Text(raw.to_string())),
        FilterFamily::Select => raw
            .parse::<TaskStatus>()
            .map(|s| FilterValue::Selection(s.to_string()))
            .map_err(|_| invalid("status")),
        FilterFamily::Date { show_time: false } => parse_date_time(raw)
            .or_else(|| format::parse_date(raw))
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
            .map(FilterValue::DateTime)
            .ok_or_else(|| invalid("date")),
        FilterFamily::Date { show_time: true } => {
            let time = ["%H:%M:%S", "%H:%M"]
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok());
            match time {
                // Only the time of day is compared, any date will do.
                Some(t) => Ok(FilterValue::DateTime(NaiveDateTime::new(NaiveDate::MIN, t))),
                None => parse_date_time(raw)
                    .map(FilterValue::DateTime)
                    .ok_or_else(|| invalid("time")),
            }
        }
    }
}

fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok()
}
