use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace, warn};

use taskgrid::columns::{
    ColumnSchema, CATEGORY_FIELD, FINISH_TIME_FIELD, ID_FIELD, START_TIME_FIELD,
};
use taskgrid::domain::{FilterMode, TaskGridError};
use taskgrid::filter::{FilterItem, FilterValue};
use taskgrid::format::{self, CellValue, DisplayFormat};
use taskgrid::grid::{GridEvent, GridInput, GridProps, GridSnapshot, GridView, PageDescriptor, PointerEvent};
use taskgrid::record::TaskState;
use taskgrid::source::{TaskPage, TaskQuery, TaskSource};

use crate::app::{AppConfig, CMDMode, HELP_TEXT, Message};
use crate::inputter::{InputResult, Inputter};

#[derive(Debug, PartialEq)]
pub enum Status {
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    Table,
    Popup,
    CmdInput,
}

/// Filter values the dashboard forwards to the backend query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultFilterFields {
    pub category: Option<String>,
    pub task_id: Option<String>,
    pub start_time: Option<String>,
    pub finish_time: Option<String>,
}

impl DefaultFilterFields {
    pub fn set(&mut self, filters: &[FilterItem]) {
        let value_of = |field: &str| {
            filters
                .iter()
                .find(|f| f.field == field)
                .and_then(|f| f.value.as_ref())
                .map(|v| match v {
                    FilterValue::DateTime(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                    FilterValue::Selection(s) | FilterValue::Text(s) => s.clone(),
                })
        };
        *self = DefaultFilterFields {
            category: value_of(CATEGORY_FIELD),
            task_id: value_of(ID_FIELD),
            start_time: value_of(START_TIME_FIELD),
            finish_time: value_of(FINISH_TIME_FIELD),
        };
    }

    /// `key=value` pairs of the fields that are set, `None` if none is.
    pub fn summary(&self) -> Option<String> {
        let fields = [
            ("category", &self.category),
            ("task_id", &self.task_id),
            ("start_time", &self.start_time),
            ("finish_time", &self.finish_time),
        ];
        let set: Vec<String> = fields
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| format!("{k}={v}")))
            .collect();
        (!set.is_empty()).then(|| set.join(" "))
    }
}

pub struct FetchResult {
    request: u64,
    result: Result<TaskPage, TaskGridError>,
}

pub struct UIData<'a> {
    pub name: &'a str,
    pub snapshot: &'a GridSnapshot,
    pub selected_row: usize,
    pub selected_column: usize,
    pub filters: &'a [FilterItem],
    pub default_filters: &'a DefaultFilterFields,
    pub show_popup: bool,
    pub popup_message: &'a str,
    pub cmdinput: &'a InputResult,
    pub active_cmdinput: bool,
    pub status_message: &'a str,
}

/// Owner of everything the grid displays. Grid events come back here and
/// are turned into state changes and page fetches.
pub struct Model {
    config: AppConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    source: Arc<dyn TaskSource>,
    grid: GridView,
    props: GridProps,
    snapshot: GridSnapshot,
    cursor_row: usize,
    cursor_column: usize,
    default_filters: DefaultFilterFields,
    request_id: u64,
    fetch_tx: Sender<FetchResult>,
    fetch_rx: Receiver<FetchResult>,
    fetch_started: Instant,
    clipboard: Option<Clipboard>,
    input: Inputter,
    last_input: InputResult,
    cmd_mode: Option<CMDMode>,
    popup_message: String,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &AppConfig, source: Arc<dyn TaskSource>) -> Self {
        let grid = GridView::new(ColumnSchema::task_columns(), &config.grid);
        let props = GridProps {
            page: PageDescriptor {
                page: 1,
                page_size: config.grid.page_size,
                total: 0,
                is_loading: false,
            },
            ..Default::default()
        };
        let snapshot = grid.render(&props);
        let (fetch_tx, fetch_rx) = mpsc::channel();

        let mut model = Self {
            config: config.clone(),
            status: Status::Ready,
            modus: Modus::Table,
            previous_modus: Modus::Table,
            source,
            grid,
            props,
            snapshot,
            cursor_row: 0,
            cursor_column: 0,
            default_filters: DefaultFilterFields::default(),
            request_id: 0,
            fetch_tx,
            fetch_rx,
            fetch_started: Instant::now(),
            clipboard: None,
            input: Inputter::default(),
            last_input: InputResult::default(),
            cmd_mode: None,
            popup_message: String::new(),
            status_message: "Started taskgrid!".to_string(),
            last_status_message_update: Instant::now(),
        };
        model.fetch();
        model
    }

    pub fn get_uidata(&self) -> UIData<'_> {
        UIData {
            name: self.source.name(),
            snapshot: &self.snapshot,
            selected_row: self.cursor_row,
            selected_column: self.cursor_column,
            filters: &self.props.filters,
            default_filters: &self.default_filters,
            show_popup: self.modus == Modus::Popup,
            popup_message: &self.popup_message,
            cmdinput: &self.last_input,
            active_cmdinput: self.modus == Modus::CmdInput,
            status_message: &self.status_message,
        }
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CmdInput
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TaskGridError> {
        self.poll_fetch();
        self.expire_status_message();

        let Some(msg) = message else {
            return Ok(());
        };
        match self.modus {
            Modus::Table => match msg {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_selection(1, 0),
                Message::MoveUp => self.move_selection(-1, 0),
                Message::MoveLeft => self.move_selection(0, -1),
                Message::MoveRight => self.move_selection(0, 1),
                Message::NextPage => self.dispatch(GridInput::NextPage),
                Message::PrevPage => self.dispatch(GridInput::PrevPage),
                Message::FirstPage => self.dispatch(GridInput::FirstPage),
                Message::LastPage => self.dispatch(GridInput::LastPage),
                Message::NextPageSize => self.dispatch(GridInput::NextPageSize),
                Message::Enter => self.dispatch(GridInput::Click(PointerEvent {
                    row: self.cursor_row,
                    column: self.cursor_column,
                })),
                Message::Filter => self.enter_cmd_mode(CMDMode::Filter),
                Message::ClearFilters => self.dispatch(GridInput::ClearFilters),
                Message::Sort => {
                    let field = self
                        .grid
                        .schema()
                        .columns()
                        .get(self.cursor_column)
                        .map(|c| c.field.to_string());
                    if let Some(field) = field {
                        self.dispatch(GridInput::Sort(field));
                    }
                }
                Message::CopyRow => self.copy_row(),
                Message::Refresh => self.fetch(),
                Message::Help => self.show_popup(HELP_TEXT.to_string()),
                Message::Exit | Message::RawKey(_) => (),
            },
            Modus::Popup => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter => self.exit_popup(),
                _ => (),
            },
            Modus::CmdInput => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)
                }
            }
        }
        Ok(())
    }

    /// Block until the in-flight fetch lands or `timeout` passes.
    pub fn wait_for_page(&mut self, timeout: Duration) -> bool {
        if !self.props.page.is_loading {
            return true;
        }
        let deadline = Instant::now() + timeout;
        while self.props.page.is_loading {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.fetch_rx.recv_timeout(remaining) {
                Ok(result) => self.on_fetch_result(result),
                Err(_) => return false,
            }
        }
        true
    }

    // -------------------- Grid event handling ---------------------- //

    fn dispatch(&mut self, input: GridInput) {
        if let Some(event) = self.grid.handle(&self.props, input) {
            self.apply_event(event);
        }
    }

    fn apply_event(&mut self, event: GridEvent) {
        debug!("Applying grid event {event:?}");
        match event {
            GridEvent::RowClick { task, .. } => {
                let details = self.task_details(&task);
                self.show_popup(details);
            }
            GridEvent::PageChange(page) => {
                self.props.page.page = page;
                self.fetch();
            }
            GridEvent::PageSizeChange(size) => {
                self.props.page.page_size = size;
                self.props.page.page = 1;
                self.set_status_message(format!("{size} rows per page"));
                self.fetch();
            }
            GridEvent::FilterChange(filters) => {
                self.default_filters.set(&filters);
                self.props.filters = filters;
                if self.config.grid.filter_mode == FilterMode::Server {
                    self.props.page.page = 1;
                    self.fetch();
                } else {
                    self.refresh_view();
                }
                self.set_status_message(format!("{} active filter(s)", self.props.filters.len()));
            }
            GridEvent::SortChange(sort) => {
                self.props.sort = sort;
                self.refresh_view();
            }
            GridEvent::CellEdit { key, value } => {
                self.props.overrides.insert(key, value);
                self.refresh_view();
            }
        }
    }

    fn task_details(&self, task: &TaskState) -> String {
        let fmt_ts = |ms: Option<i64>| {
            ms.and_then(|ms| self.config.grid.locale.wall_clock(ms))
                .map(|ts| format::display(&CellValue::Timestamp(ts), DisplayFormat::Verbatim))
                .unwrap_or_else(|| format::EMPTY_SENTINEL.to_string())
        };
        format!(
            "Task {}\n\nCategory:  {}\nAssignee:  {}\nStarted:   {}\nFinished:  {}\nStatus:    {}\n",
            task.id(),
            task.category.as_deref().unwrap_or(format::EMPTY_SENTINEL),
            task.assigned_to
                .as_ref()
                .map(|a| a.name.as_str())
                .unwrap_or(format::UNKNOWN),
            fmt_ts(task.unix_millis_start_time),
            fmt_ts(task.unix_millis_finish_time),
            task.status.as_deref().unwrap_or(format::UNKNOWN),
        )
    }

    // -------------------- Fetching ---------------------- //

    fn fetch(&mut self) {
        self.request_id += 1;
        let request = self.request_id;
        let query = TaskQuery {
            offset: self.props.page.offset(),
            limit: self.props.page.page_size,
            filters: match self.config.grid.filter_mode {
                FilterMode::Server => self.props.filters.clone(),
                FilterMode::Client => Vec::new(),
            },
        };
        trace!("Fetch #{request}: {query:?}");
        self.props.page.is_loading = true;
        self.fetch_started = Instant::now();
        self.refresh_view();

        let source = Arc::clone(&self.source);
        let tx = self.fetch_tx.clone();
        rayon::spawn(move || {
            let result = source.fetch(&query);
            // The model may be gone already, nothing to do then.
            let _ = tx.send(FetchResult { request, result });
        });
    }

    fn poll_fetch(&mut self) {
        while let Ok(result) = self.fetch_rx.try_recv() {
            self.on_fetch_result(result);
        }
    }

    fn on_fetch_result(&mut self, fetched: FetchResult) {
        if fetched.request != self.request_id {
            debug!(
                "Dropping stale page #{} (waiting for #{})",
                fetched.request, self.request_id
            );
            return;
        }
        self.props.page.is_loading = false;
        match fetched.result {
            Ok(page) => {
                info!(
                    "Fetched {} of {} tasks in {}ms",
                    page.tasks.len(),
                    page.total,
                    self.fetch_started.elapsed().as_millis()
                );
                self.props.data = page.tasks;
                self.props.page.total = page.total;
            }
            Err(e) => {
                error!("Fetching tasks failed: {e}");
                self.set_status_message(format!("Fetching tasks failed: {e}"));
            }
        }
        self.refresh_view();
    }

    fn refresh_view(&mut self) {
        self.snapshot = self.grid.render(&self.props);
        self.cursor_row = self
            .cursor_row
            .min(self.snapshot.rows.len().saturating_sub(1));
        self.cursor_column = self
            .cursor_column
            .min(self.snapshot.headers.len().saturating_sub(1));
    }

    // -------------------- Control handling functions ---------------------- //

    fn move_selection(&mut self, rows: isize, columns: isize) {
        let nrows = self.snapshot.rows.len();
        let ncols = self.snapshot.headers.len();
        if nrows > 0 {
            self.cursor_row = self.cursor_row.saturating_add_signed(rows).min(nrows - 1);
        }
        if ncols > 0 {
            self.cursor_column = self
                .cursor_column
                .saturating_add_signed(columns)
                .min(ncols - 1);
        }
    }

    fn show_popup(&mut self, message: String) {
        self.previous_modus = self.modus;
        self.modus = Modus::Popup;
        self.popup_message = message;
    }

    fn exit_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::Popup;
        self.popup_message.clear();
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CmdInput;
        self.cmd_mode = Some(mode);
        self.input.clear();
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CmdInput;

        let cmd_input = self.last_input.input.clone();
        let canceled = self.last_input.canceled;
        self.last_input = InputResult::default();
        if canceled || cmd_input.trim().is_empty() {
            self.cmd_mode = None;
            return;
        }

        match self.cmd_mode.take() {
            Some(CMDMode::Filter) => match self.grid.schema().parse_filter(&cmd_input) {
                Ok(item) => self.dispatch(GridInput::ApplyFilter(item)),
                Err(e) => {
                    warn!("Rejected filter \"{cmd_input}\": {e}");
                    self.set_status_message(e.to_string());
                }
            },
            None => info!("Cmd mode is none!"),
        }
    }

    fn copy_row(&mut self) {
        let Some(row) = self.snapshot.rows.get(self.cursor_row) else {
            return;
        };
        let content = row
            .cells
            .iter()
            .map(|c| wrap_cell_content(&c.text))
            .collect::<Vec<String>>()
            .join(",");

        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard unavailable: {e:?}");
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => self.set_status_message("Copied task to clipboard."),
                Err(e) => error!("Error copying to clipboard: {:?}", e),
            }
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    fn expire_status_message(&mut self) {
        let timeout = Duration::from_millis(self.config.status_message_timeout);
        if !self.status_message.is_empty() && self.last_status_message_update.elapsed() > timeout {
            self.status_message.clear();
        }
    }
}

/// Quote a cell for CSV output.
fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping || needs_escaping {
        out = format!("\"{out}\"");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskgrid::domain::GridConfig;
    use taskgrid::format::Locale;
    use taskgrid::source::MemorySource;

    const WAIT: Duration = Duration::from_secs(5);

    impl Model {
        fn props(&self) -> &GridProps {
            &self.props
        }

        fn default_filters(&self) -> &DefaultFilterFields {
            &self.default_filters
        }
    }

    fn tasks(n: usize) -> Vec<TaskState> {
        (0..n)
            .map(|i| TaskState {
                status: Some(if i % 2 == 0 { "queued" } else { "underway" }.into()),
                ..TaskState::new(format!("task-{i}"))
            })
            .collect()
    }

    fn model(n: usize, filter_mode: FilterMode) -> Model {
        let config = AppConfig::default().grid(
            GridConfig::default()
                .locale(Locale::utc())
                .filter_mode(filter_mode),
        );
        let source = Arc::new(MemorySource::new("mem", tasks(n), Locale::utc()));
        let mut model = Model::init(&config, source);
        assert!(model.wait_for_page(WAIT));
        model
    }

    fn send(model: &mut Model, msg: Message) {
        model.update(Some(msg)).unwrap();
    }

    fn type_command(model: &mut Model, cmd: &str) {
        use ratatui::crossterm::event::{KeyCode, KeyModifiers};
        send(model, Message::Filter);
        for c in cmd.chars() {
            send(model, Message::RawKey(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)));
        }
        send(model, Message::RawKey(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
    }

    #[test]
    fn initial_fetch_fills_first_page() {
        let model = model(23, FilterMode::Client);
        let ui = model.get_uidata();
        assert_eq!(ui.snapshot.rows.len(), 10);
        assert_eq!(ui.snapshot.pager.total, 23);
        assert_eq!(ui.snapshot.pager.page_count, 3);
        assert!(!ui.snapshot.pager.is_loading);
    }

    #[test]
    fn page_change_refetches() {
        let mut model = model(23, FilterMode::Client);
        send(&mut model, Message::NextPage);
        assert!(model.props().page.is_loading);
        // Old rows stay visible while loading.
        assert_eq!(model.get_uidata().snapshot.rows[0].id, "task-0");

        assert!(model.wait_for_page(WAIT));
        assert_eq!(model.props().page.page, 2);
        assert_eq!(model.get_uidata().snapshot.rows[0].id, "task-10");

        send(&mut model, Message::LastPage);
        assert!(model.wait_for_page(WAIT));
        assert_eq!(model.get_uidata().snapshot.rows.len(), 3);
    }

    #[test]
    fn page_size_change_restarts_at_first_page() {
        let mut model = model(60, FilterMode::Client);
        send(&mut model, Message::NextPage);
        assert!(model.wait_for_page(WAIT));
        send(&mut model, Message::NextPageSize);
        assert!(model.wait_for_page(WAIT));
        assert_eq!(model.props().page.page, 1);
        assert_eq!(model.props().page.page_size, 25);
        assert_eq!(model.get_uidata().snapshot.rows.len(), 25);
    }

    #[test]
    fn stale_pages_are_dropped() {
        let mut model = model(23, FilterMode::Client);
        let stale = FetchResult {
            request: model.request_id - 1,
            result: Ok(TaskPage::default()),
        };
        model.on_fetch_result(stale);
        assert_eq!(model.props().data.len(), 10);
        assert_eq!(model.props().page.total, 23);
    }

    #[test]
    fn failed_fetch_keeps_previous_rows() {
        let mut model = model(23, FilterMode::Client);
        model.fetch();
        let failed = FetchResult {
            request: model.request_id,
            result: Err(TaskGridError::LoadingFailed("backend down".into())),
        };
        model.on_fetch_result(failed);
        assert!(!model.props().page.is_loading);
        assert_eq!(model.props().data.len(), 10);
        assert!(model.get_uidata().status_message.contains("backend down"));
    }

    #[test]
    fn client_filter_narrows_current_page() {
        let mut model = model(23, FilterMode::Client);
        type_command(&mut model, "status is underway");
        let ui = model.get_uidata();
        assert_eq!(ui.filters.len(), 1);
        assert_eq!(ui.snapshot.rows.len(), 5);
        assert!(!model.props().page.is_loading);
    }

    #[test]
    fn server_filter_refetches_from_first_page() {
        let mut model = model(23, FilterMode::Server);
        type_command(&mut model, "status is underway");
        assert!(model.props().page.is_loading);
        assert!(model.wait_for_page(WAIT));
        assert_eq!(model.props().page.total, 11);
        assert_eq!(model.get_uidata().snapshot.rows.len(), 10);

        send(&mut model, Message::ClearFilters);
        assert!(model.wait_for_page(WAIT));
        assert_eq!(model.props().page.total, 23);
    }

    #[test]
    fn invalid_filter_is_reported() {
        let mut model = model(5, FilterMode::Client);
        type_command(&mut model, "status after yesterday");
        assert!(model.props().filters.is_empty());
        assert!(model.get_uidata().status_message.starts_with("Invalid filter"));
    }

    #[test]
    fn default_filter_fields_follow_filters() {
        let mut model = model(5, FilterMode::Client);
        type_command(&mut model, "category equals clean");
        assert_eq!(
            model.default_filters().category.as_deref(),
            Some("clean")
        );
        assert_eq!(model.default_filters().task_id, None);
        assert_eq!(
            model.get_uidata().default_filters.summary().as_deref(),
            Some("category=clean")
        );
    }

    #[test]
    fn enter_opens_task_details() {
        let mut model = model(5, FilterMode::Client);
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::Enter);
        let ui = model.get_uidata();
        assert!(ui.show_popup);
        assert!(ui.popup_message.starts_with("Task task-1"));

        send(&mut model, Message::Exit);
        assert!(!model.get_uidata().show_popup);
    }

    #[test]
    fn sort_uses_selected_column() {
        let mut model = model(5, FilterMode::Client);
        for _ in 0..5 {
            send(&mut model, Message::MoveRight);
        }
        send(&mut model, Message::Sort);
        let ids: Vec<&str> = model
            .get_uidata()
            .snapshot
            .rows
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["task-0", "task-2", "task-4", "task-1", "task-3"]);
    }

    #[test]
    fn quit_sets_status() {
        let mut model = model(1, FilterMode::Client);
        send(&mut model, Message::Quit);
        assert_eq!(model.status, Status::Quitting);
    }

    #[test]
    fn cells_are_quoted_for_csv() {
        assert_eq!(wrap_cell_content("plain"), "plain");
        assert_eq!(wrap_cell_content("a,b"), "\"a,b\"");
        assert_eq!(wrap_cell_content("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
