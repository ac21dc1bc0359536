//! The task grid: a controlled view over one page of task records.
//!
//! [`GridView`] holds nothing but the immutable column schema and display
//! settings. Everything that changes (rows, paging, filters, sorting, edited
//! cells) lives in [`GridProps`], owned by the caller. [`GridView::render`]
//! turns props into a [`GridSnapshot`], and [`GridView::handle`] turns a user
//! interaction into a [`GridEvent`] for the caller to act on. The grid never
//! changes props itself.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::trace;

use crate::columns::ColumnSchema;
use crate::domain::{FilterMode, GridConfig};
use crate::filter::{FilterItem, Predicate};
use crate::format::{CellValue, Locale};
use crate::record::TaskState;
use crate::style::{self, CellClass};

/// Paging state of the caller. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDescriptor {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub is_loading: bool,
}

impl Default for PageDescriptor {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            total: 0,
            is_loading: false,
        }
    }
}

impl PageDescriptor {
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            return 1;
        }
        self.total.div_ceil(self.page_size).max(1)
    }

    /// The page clamped into `1..=page_count`.
    pub fn current(&self) -> usize {
        self.page.clamp(1, self.page_count())
    }

    pub fn offset(&self) -> usize {
        (self.current() - 1) * self.page_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortItem {
    pub field: String,
    pub direction: SortDirection,
}

/// Identifies one edited cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub id: String,
    pub field: String,
}

impl CellKey {
    pub fn new(id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridProps {
    pub data: Vec<TaskState>,
    pub page: PageDescriptor,
    pub filters: Vec<FilterItem>,
    pub sort: Option<SortItem>,
    pub overrides: HashMap<CellKey, CellValue>,
}

/// Position of the interaction that raised a row click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub row: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridInput {
    /// `row` indexes the rendered rows, after filtering and sorting.
    Click(PointerEvent),
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    GoToPage(usize),
    SetPageSize(usize),
    NextPageSize,
    ApplyFilter(FilterItem),
    ClearFilter(String),
    ClearFilters,
    Sort(String),
    CommitEdit {
        row: usize,
        field: String,
        value: CellValue,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    RowClick { origin: PointerEvent, task: TaskState },
    PageChange(usize),
    PageSizeChange(usize),
    /// The complete filter model after the change.
    FilterChange(Vec<FilterItem>),
    SortChange(Option<SortItem>),
    CellEdit { key: CellKey, value: CellValue },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCell {
    pub field: &'static str,
    pub label: String,
    pub width: u16,
    pub sort: Option<SortDirection>,
    pub filtered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub text: String,
    pub class: CellClass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridRow {
    pub id: String,
    pub cells: Vec<GridCell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerSummary {
    pub page: usize,
    pub page_count: usize,
    pub page_size: usize,
    pub total: usize,
    pub is_loading: bool,
    pub first_row: usize,
    pub last_row: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<GridRow>,
    pub pager: PagerSummary,
}

#[derive(Debug, Clone)]
pub struct GridView {
    schema: ColumnSchema,
    locale: Locale,
    filter_mode: FilterMode,
    page_size_options: Vec<usize>,
}

impl GridView {
    pub fn new(schema: ColumnSchema, config: &GridConfig) -> Self {
        Self {
            schema,
            locale: config.locale,
            filter_mode: config.filter_mode,
            page_size_options: config.page_size_options.clone(),
        }
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn render(&self, props: &GridProps) -> GridSnapshot {
        // Only filters that compile to a predicate mark their column.
        let filtered: Vec<usize> = self
            .schema
            .compile_filters(&props.filters)
            .into_iter()
            .map(|(idx, _)| idx)
            .collect();
        let headers = self
            .schema
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, c)| HeaderCell {
                field: c.field,
                label: c.header.to_string(),
                width: c.width,
                sort: props
                    .sort
                    .as_ref()
                    .filter(|s| s.field == c.field)
                    .map(|s| s.direction),
                filtered: filtered.contains(&idx),
            })
            .collect();

        let rows = self
            .visible_rows(props)
            .into_iter()
            .map(|idx| self.render_row(props, &props.data[idx]))
            .collect();

        GridSnapshot {
            headers,
            rows,
            pager: Self::pager(&props.page),
        }
    }

    /// Indices into `props.data` of the rows to show, in display order.
    pub fn visible_rows(&self, props: &GridProps) -> Vec<usize> {
        let mut rows: Vec<usize> = match self.filter_mode {
            FilterMode::Client => {
                let predicates = self.schema.compile_filters(&props.filters);
                (0..props.data.len())
                    .filter(|&idx| self.matches(props, &props.data[idx], &predicates))
                    .collect()
            }
            FilterMode::Server => (0..props.data.len()).collect(),
        };

        if let Some(sort) = &props.sort
            && let Some(col) = self.schema.position(&sort.field)
        {
            rows.sort_by(|&a, &b| {
                let va = self.cell_value(props, &props.data[a], col);
                let vb = self.cell_value(props, &props.data[b], col);
                match sort.direction {
                    SortDirection::Asc => va.sort_cmp(&vb),
                    SortDirection::Desc => vb.sort_cmp(&va),
                }
            });
        }
        rows
    }

    pub fn handle(&self, props: &GridProps, input: GridInput) -> Option<GridEvent> {
        trace!("Grid input: {input:?}");
        let page = &props.page;
        let event = match input {
            GridInput::Click(origin) => {
                let rows = self.visible_rows(props);
                rows.get(origin.row).map(|&idx| GridEvent::RowClick {
                    origin,
                    task: props.data[idx].clone(),
                })
            }
            GridInput::NextPage => self.page_change(page, page.current() + 1),
            GridInput::PrevPage => self.page_change(page, page.current().saturating_sub(1)),
            GridInput::FirstPage => self.page_change(page, 1),
            GridInput::LastPage => self.page_change(page, page.page_count()),
            GridInput::GoToPage(n) => self.page_change(page, n),
            GridInput::SetPageSize(size) => (size != page.page_size
                && self.page_size_options.contains(&size))
            .then_some(GridEvent::PageSizeChange(size)),
            GridInput::NextPageSize => {
                let next = self
                    .page_size_options
                    .iter()
                    .position(|&s| s == page.page_size)
                    .map(|i| (i + 1) % self.page_size_options.len())
                    .unwrap_or(0);
                self.page_size_options
                    .get(next)
                    .filter(|&&size| size != page.page_size)
                    .map(|&size| GridEvent::PageSizeChange(size))
            }
            GridInput::ApplyFilter(item) => {
                if self.schema.get(&item.field).is_none() || props.filters.contains(&item) {
                    None
                } else {
                    let mut filters: Vec<FilterItem> = props
                        .filters
                        .iter()
                        .filter(|f| f.field != item.field)
                        .cloned()
                        .collect();
                    filters.push(item);
                    Some(GridEvent::FilterChange(filters))
                }
            }
            GridInput::ClearFilter(field) => props
                .filters
                .iter()
                .any(|f| f.field == field)
                .then(|| {
                    GridEvent::FilterChange(
                        props.filters.iter().filter(|f| f.field != field).cloned().collect(),
                    )
                }),
            GridInput::ClearFilters => {
                (!props.filters.is_empty()).then(|| GridEvent::FilterChange(Vec::new()))
            }
            GridInput::Sort(field) => self.schema.get(&field).map(|c| {
                let next = match &props.sort {
                    Some(s) if s.field == c.field => match s.direction {
                        SortDirection::Asc => Some(SortDirection::Desc),
                        SortDirection::Desc => None,
                    },
                    _ => Some(SortDirection::Asc),
                };
                GridEvent::SortChange(next.map(|direction| SortItem {
                    field: c.field.to_string(),
                    direction,
                }))
            }),
            GridInput::CommitEdit { row, field, value } => {
                let editable = self.schema.get(&field).is_some_and(|c| c.editable);
                let rows = self.visible_rows(props);
                match rows.get(row) {
                    Some(&idx) if editable => Some(GridEvent::CellEdit {
                        key: CellKey::new(props.data[idx].id(), field),
                        value,
                    }),
                    _ => None,
                }
            }
        };
        trace!("Grid event: {event:?}");
        event
    }

    fn page_change(&self, page: &PageDescriptor, target: usize) -> Option<GridEvent> {
        (target >= 1 && target <= page.page_count() && target != page.current())
            .then_some(GridEvent::PageChange(target))
    }

    fn render_row(&self, props: &GridProps, task: &TaskState) -> GridRow {
        let cells = self
            .schema
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let value = self.cell_value(props, task, idx);
                GridCell {
                    text: column.display(&value),
                    class: style::cell_class_name(column.field, &value),
                }
            })
            .collect();
        GridRow {
            id: task.id().to_string(),
            cells,
        }
    }

    fn cell_value(&self, props: &GridProps, task: &TaskState, column: usize) -> CellValue {
        let descriptor = &self.schema.columns()[column];
        if !props.overrides.is_empty()
            && let Some(value) = props.overrides.get(&CellKey::new(task.id(), descriptor.field))
        {
            return value.clone();
        }
        descriptor.value(task, &self.locale)
    }

    fn matches(&self, props: &GridProps, task: &TaskState, predicates: &[(usize, Predicate)]) -> bool {
        predicates
            .iter()
            .all(|(idx, p)| p.test(&self.cell_value(props, task, *idx)))
    }

    fn pager(page: &PageDescriptor) -> PagerSummary {
        let current = page.current();
        let first_row = if page.total == 0 { 0 } else { page.offset() + 1 };
        PagerSummary {
            page: current,
            page_count: page.page_count(),
            page_size: page.page_size,
            total: page.total,
            is_loading: page.is_loading,
            first_row: first_row.min(page.total),
            last_row: (current * page.page_size).min(page.total),
        }
    }
}
