use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, NaiveTime};
use tracing::warn;

use crate::format::{self, CellValue, DisplayFormat, EMPTY_SENTINEL};

/// Every operator name the grid understands. Which of them a column offers
/// depends on its [`FilterFamily`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Is,
    Not,
    After,
    OnOrAfter,
    Before,
    OnOrBefore,
    IsEmpty,
    IsNotEmpty,
    Contains,
    Equals,
    StartsWith,
    EndsWith,
}

const DATE_OPERATORS: &[Operator] = &[
    Operator::Is,
    Operator::Not,
    Operator::After,
    Operator::OnOrAfter,
    Operator::Before,
    Operator::OnOrBefore,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

const SELECT_OPERATORS: &[Operator] = &[Operator::Is, Operator::IsEmpty, Operator::IsNotEmpty];

const TEXT_OPERATORS: &[Operator] = &[
    Operator::Contains,
    Operator::Equals,
    Operator::StartsWith,
    Operator::EndsWith,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Is => "is",
            Operator::Not => "not",
            Operator::After => "after",
            Operator::OnOrAfter => "onOrAfter",
            Operator::Before => "before",
            Operator::OnOrBefore => "onOrBefore",
            Operator::IsEmpty => "isEmpty",
            Operator::IsNotEmpty => "isNotEmpty",
            Operator::Contains => "contains",
            Operator::Equals => "equals",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
        }
    }

    pub fn needs_value(&self) -> bool {
        !matches!(self, Operator::IsEmpty | Operator::IsNotEmpty)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DATE_OPERATORS
            .iter()
            .chain(TEXT_OPERATORS)
            .find(|op| op.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown filter operator \"{s}\""))
    }
}

/// The kind of comparison a column supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterFamily {
    Text,
    Date { show_time: bool },
    Select,
}

impl FilterFamily {
    pub fn operators(&self) -> &'static [Operator] {
        match self {
            FilterFamily::Text => TEXT_OPERATORS,
            FilterFamily::Date { .. } => DATE_OPERATORS,
            FilterFamily::Select => SELECT_OPERATORS,
        }
    }

    pub fn offers(&self, operator: Operator) -> bool {
        self.operators().contains(&operator)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    DateTime(NaiveDateTime),
    /// The string picked in a status selection input.
    Selection(String),
    Text(String),
}

/// A user's filter on one column. `value` is `None` while the input is blank.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterItem {
    pub field: String,
    pub operator: Operator,
    pub value: Option<FilterValue>,
}

impl FilterItem {
    pub fn new(field: impl Into<String>, operator: Operator, value: Option<FilterValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

impl fmt::Display for FilterItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.operator)?;
        match &self.value {
            Some(FilterValue::DateTime(ts)) => write!(f, " {}", ts.format("%Y-%m-%d %H:%M:%S")),
            Some(FilterValue::Selection(s)) | Some(FilterValue::Text(s)) => write!(f, " {s}"),
            None => Ok(()),
        }
    }
}

/// A filter operator bound to its comparison value.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    family: FilterFamily,
    operator: Operator,
    value: Option<FilterValue>,
}

impl Predicate {
    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn test(&self, cell: &CellValue) -> bool {
        evaluate(self.family, self.operator, self.value.as_ref(), cell)
    }
}

/// Bind `item` to a predicate for a column of the given family.
///
/// Returns `None` when the column should pass every row through: the
/// operator needs a value and none (or one of the wrong kind) was entered, or
/// the family does not offer the operator at all.
pub fn get_apply_filter_fn(family: FilterFamily, item: &FilterItem) -> Option<Predicate> {
    if !family.offers(item.operator) {
        warn!("{:?} does not offer operator {}", family, item.operator);
        return None;
    }
    if item.operator.needs_value() {
        let usable = match (&family, &item.value) {
            (FilterFamily::Date { .. }, Some(FilterValue::DateTime(_))) => true,
            (FilterFamily::Select, Some(FilterValue::Selection(_))) => true,
            (FilterFamily::Text, Some(FilterValue::Text(s))) => !s.is_empty(),
            _ => false,
        };
        if !usable {
            return None;
        }
    }
    Some(Predicate {
        family,
        operator: item.operator,
        value: item.value.clone(),
    })
}

/// Evaluate one operator against one cell.
pub fn evaluate(
    family: FilterFamily,
    operator: Operator,
    value: Option<&FilterValue>,
    cell: &CellValue,
) -> bool {
    match operator {
        Operator::IsEmpty => return cell.is_empty(),
        Operator::IsNotEmpty => return !cell.is_empty(),
        _ => {}
    }
    match (family, value) {
        (FilterFamily::Date { show_time }, Some(FilterValue::DateTime(bound))) => {
            date_matches(operator, bound, show_time, cell)
        }
        (FilterFamily::Select, Some(FilterValue::Selection(selected))) => {
            select_matches(operator, selected, cell)
        }
        (FilterFamily::Text, Some(FilterValue::Text(term))) => text_matches(operator, term, cell),
        _ => false,
    }
}

fn date_matches(operator: Operator, bound: &NaiveDateTime, show_time: bool, cell: &CellValue) -> bool {
    match cell {
        CellValue::Empty => false,
        CellValue::Text(s) if s.is_empty() || s == EMPTY_SENTINEL => false,
        // Time mode compares the rendered HH:MM:SS strings, not instants.
        CellValue::Timestamp(ts) if show_time => {
            compare(operator, Some(format::format_time(ts)), format::format_time(bound))
        }
        CellValue::Text(s) if show_time => compare(operator, Some(s.clone()), format::format_time(bound)),
        CellValue::Timestamp(ts) => compare(
            operator,
            Some(millis(&ts.date().and_time(NaiveTime::MIN))),
            millis(bound),
        ),
        CellValue::Text(s) => compare(
            operator,
            format::parse_date(s).as_ref().map(millis),
            millis(bound),
        ),
    }
}

fn select_matches(operator: Operator, selected: &str, cell: &CellValue) -> bool {
    match (operator, cell) {
        (Operator::Is, CellValue::Text(s)) if !s.is_empty() => s == selected,
        _ => false,
    }
}

fn text_matches(operator: Operator, term: &str, cell: &CellValue) -> bool {
    let value = format::display(cell, DisplayFormat::Verbatim).to_lowercase();
    let term = term.to_lowercase();
    match operator {
        Operator::Contains => value.contains(&term),
        Operator::Equals => value == term,
        Operator::StartsWith => value.starts_with(&term),
        Operator::EndsWith => value.ends_with(&term),
        _ => false,
    }
}

// `None` stands for a cell that is not a valid date: it equals nothing, so
// only `not` holds.
fn compare<T: PartialOrd>(operator: Operator, cell: Option<T>, bound: T) -> bool {
    let Some(cell) = cell else {
        return operator == Operator::Not;
    };
    match operator {
        Operator::Is => cell == bound,
        Operator::Not => cell != bound,
        Operator::After => cell > bound,
        Operator::OnOrAfter => cell >= bound,
        Operator::Before => cell < bound,
        Operator::OnOrBefore => cell <= bound,
        _ => false,
    }
}

fn millis(ts: &NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    const DATE: FilterFamily = FilterFamily::Date { show_time: false };
    const TIME: FilterFamily = FilterFamily::Date { show_time: true };

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn time(h: u32, m: u32, s: u32) -> NaiveDateTime {
        day(2024, 1, 2).date().and_hms_opt(h, m, s).unwrap()
    }

    fn date_item(op: Operator, value: NaiveDateTime) -> FilterItem {
        FilterItem::new("unix_millis_start_time", op, Some(FilterValue::DateTime(value)))
    }

    fn check(family: FilterFamily, op: Operator, value: NaiveDateTime, cell: &CellValue) -> bool {
        get_apply_filter_fn(family, &date_item(op, value))
            .expect("predicate")
            .test(cell)
    }

    #[test]
    fn absent_value_disables_comparison_operators() {
        for &op in DATE_OPERATORS {
            let item = FilterItem::new("unix_millis_start_time", op, None);
            assert_eq!(get_apply_filter_fn(DATE, &item).is_some(), !op.needs_value());
        }
        let select = FilterItem::new("status", Operator::Is, None);
        assert!(get_apply_filter_fn(FilterFamily::Select, &select).is_none());
        let text = FilterItem::new("id", Operator::Contains, Some(FilterValue::Text(String::new())));
        assert!(get_apply_filter_fn(FilterFamily::Text, &text).is_none());
    }

    #[test]
    fn operator_outside_family_is_not_applied() {
        let item = FilterItem::new("status", Operator::After, Some(FilterValue::Selection("x".into())));
        assert!(get_apply_filter_fn(FilterFamily::Select, &item).is_none());
    }

    #[test]
    fn date_is_truncates_cell_to_midnight() {
        let d = day(2024, 1, 2);
        let cell = CellValue::Timestamp(d + Duration::milliseconds(1));

        assert!(check(DATE, Operator::Is, d, &cell));
        assert!(!check(DATE, Operator::After, d, &cell));
        assert!(check(DATE, Operator::OnOrAfter, d, &cell));
        assert!(check(DATE, Operator::OnOrBefore, d, &cell));
        assert!(!check(DATE, Operator::Not, d, &cell));
    }

    #[test]
    fn date_ordering_operators() {
        let cell = CellValue::Timestamp(day(2024, 1, 5) + Duration::hours(13));
        assert!(check(DATE, Operator::After, day(2024, 1, 4), &cell));
        assert!(check(DATE, Operator::Before, day(2024, 1, 6), &cell));
        assert!(!check(DATE, Operator::Before, day(2024, 1, 5), &cell));
        assert!(check(DATE, Operator::Not, day(2024, 1, 6), &cell));
    }

    #[test]
    fn empty_and_dash_cells_never_match_comparisons() {
        let d = day(2024, 1, 2);
        for family in [DATE, TIME] {
            for &op in DATE_OPERATORS.iter().filter(|op| op.needs_value()) {
                assert!(!check(family, op, d, &CellValue::Empty), "{op} on empty");
                assert!(!check(family, op, d, &CellValue::text("-")), "{op} on dash");
            }
        }
    }

    #[test]
    fn emptiness_is_a_strict_null_check() {
        let item = FilterItem::new("unix_millis_finish_time", Operator::IsEmpty, None);
        let not_item = FilterItem::new("unix_millis_finish_time", Operator::IsNotEmpty, None);
        for family in [DATE, TIME] {
            let is_empty = get_apply_filter_fn(family, &item).unwrap();
            let is_not_empty = get_apply_filter_fn(family, &not_item).unwrap();
            assert!(is_empty.test(&CellValue::Empty));
            // The dash sentinel is a string, so it is not empty here.
            assert!(!is_empty.test(&CellValue::text("-")));
            assert!(is_not_empty.test(&CellValue::text("-")));
            assert!(!is_not_empty.test(&CellValue::Empty));
        }
    }

    #[test]
    fn unparsable_text_date_only_matches_not() {
        let d = day(2024, 1, 2);
        let cell = CellValue::text("unknown");
        assert!(check(DATE, Operator::Not, d, &cell));
        assert!(!check(DATE, Operator::Is, d, &cell));
        assert!(!check(DATE, Operator::Before, d, &cell));
    }

    #[test]
    fn text_date_cell_is_parsed() {
        let cell = CellValue::text("1/2/2024");
        assert!(check(DATE, Operator::Is, day(2024, 1, 2), &cell));
    }

    #[test]
    fn time_mode_compares_formatted_strings() {
        let cell = CellValue::Timestamp(day(2023, 7, 1).date().and_hms_opt(10, 30, 0).unwrap());
        // Only the time of day counts, the calendar date is ignored.
        assert!(check(TIME, Operator::Is, time(10, 30, 0), &cell));
        assert!(check(TIME, Operator::After, time(9, 0, 0), &cell));
        assert!(!check(TIME, Operator::Before, time(9, 0, 0), &cell));
    }

    #[test]
    fn time_mode_comparison_is_lexical() {
        // "9:00:00" sorts after "10:00:00" as a string even though it is earlier.
        let cell = CellValue::text("9:00:00");
        assert!(check(TIME, Operator::After, time(10, 0, 0), &cell));
        assert!(!check(TIME, Operator::Before, time(10, 0, 0), &cell));
    }

    #[test]
    fn select_is_exact_match() {
        let item = FilterItem::new("status", Operator::Is, Some(FilterValue::Selection("queued".into())));
        let p = get_apply_filter_fn(FilterFamily::Select, &item).unwrap();
        assert!(p.test(&CellValue::text("queued")));
        assert!(!p.test(&CellValue::text("Queued")));
        assert!(!p.test(&CellValue::text("")));
        assert!(!p.test(&CellValue::Empty));
    }

    #[test]
    fn empty_selection_matches_nothing() {
        let item = FilterItem::new("status", Operator::Is, Some(FilterValue::Selection(String::new())));
        let p = get_apply_filter_fn(FilterFamily::Select, &item).unwrap();
        assert!(!p.test(&CellValue::text("queued")));
        assert!(!p.test(&CellValue::text("unknown")));
    }

    #[test]
    fn text_operators_ignore_case() {
        let cell = CellValue::text("Delivery");
        let text = |op, term: &str| {
            get_apply_filter_fn(
                FilterFamily::Text,
                &FilterItem::new("category", op, Some(FilterValue::Text(term.into()))),
            )
            .unwrap()
            .test(&cell)
        };
        assert!(text(Operator::Contains, "liv"));
        assert!(text(Operator::Equals, "delivery"));
        assert!(text(Operator::StartsWith, "DEL"));
        assert!(text(Operator::EndsWith, "ery"));
        assert!(!text(Operator::Equals, "deliver"));
    }

    #[test]
    fn operator_names_round_trip() {
        for &op in DATE_OPERATORS.iter().chain(TEXT_OPERATORS) {
            assert_eq!(op.name().parse::<Operator>(), Ok(op));
        }
        assert_eq!("onorafter".parse::<Operator>(), Ok(Operator::OnOrAfter));
        assert!("between".parse::<Operator>().is_err());
    }
}
