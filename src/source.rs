use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, instrument, trace};

use crate::columns::ColumnSchema;
use crate::domain::TaskGridError;
use crate::filter::FilterItem;
use crate::format::Locale;
use crate::record::{Assignee, Booking, TaskState};

/// One page request: `limit` tasks from `offset` on, plus optional filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQuery {
    pub offset: usize,
    pub limit: usize,
    pub filters: Vec<FilterItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPage {
    pub tasks: Vec<TaskState>,
    /// Number of tasks matching the query across all pages.
    pub total: usize,
}

pub trait TaskSource: Send + Sync {
    fn name(&self) -> &str;
    fn fetch(&self, query: &TaskQuery) -> Result<TaskPage, TaskGridError>;
}

/// Apply filters across the whole collection, then cut out the page.
fn paginate(tasks: &[TaskState], query: &TaskQuery, schema: &ColumnSchema, locale: &Locale) -> TaskPage {
    if query.filters.is_empty() {
        let begin = query.offset.min(tasks.len());
        let end = (begin + query.limit).min(tasks.len());
        return TaskPage {
            tasks: tasks[begin..end].to_vec(),
            total: tasks.len(),
        };
    }

    let predicates = schema.compile_filters(&query.filters);
    let matching: Vec<&TaskState> = tasks
        .par_iter()
        .filter(|t| schema.matches(t, locale, &predicates))
        .collect();
    trace!("{} of {} tasks match {:?}", matching.len(), tasks.len(), query.filters);

    TaskPage {
        tasks: matching
            .iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|&t| t.clone())
            .collect(),
        total: matching.len(),
    }
}

pub struct MemorySource {
    name: String,
    tasks: Vec<TaskState>,
    schema: ColumnSchema,
    locale: Locale,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, tasks: Vec<TaskState>, locale: Locale) -> Self {
        Self {
            name: name.into(),
            tasks,
            schema: ColumnSchema::task_columns(),
            locale,
        }
    }
}

impl TaskSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(source = %self.name))]
    fn fetch(&self, query: &TaskQuery) -> Result<TaskPage, TaskGridError> {
        Ok(paginate(&self.tasks, query, &self.schema, &self.locale))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    Csv,
    Parquet,
    Arrow,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

pub const BOOKING_ID_COLUMN: &str = "booking_id";
pub const CATEGORY_COLUMN: &str = "category";
pub const ASSIGNED_TO_COLUMN: &str = "assigned_to";
pub const START_TIME_COLUMN: &str = "unix_millis_start_time";
pub const FINISH_TIME_COLUMN: &str = "unix_millis_finish_time";
pub const STATUS_COLUMN: &str = "status";

const TABLE_COLUMNS: [&str; 6] = [
    BOOKING_ID_COLUMN,
    CATEGORY_COLUMN,
    ASSIGNED_TO_COLUMN,
    START_TIME_COLUMN,
    FINISH_TIME_COLUMN,
    STATUS_COLUMN,
];

/// Tasks read from a CSV, Parquet or Arrow IPC table.
pub struct FrameSource {
    inner: MemorySource,
}

impl FrameSource {
    pub fn load(path: &str, locale: Locale) -> Result<Self, TaskGridError> {
        let expanded = shellexpand::full(path)
            .map_err(|e| TaskGridError::LoadingFailed(e.to_string()))?
            .into_owned();
        let file_info = Self::get_file_info(PathBuf::from(expanded))?;
        debug!("Loading {:?}", file_info);

        let frame = match file_info.file_type {
            FileType::Csv => Self::load_csv(&file_info.path)?,
            FileType::Parquet => Self::load_parquet(&file_info.path)?,
            FileType::Arrow => Self::load_arrow(&file_info.path)?,
        };

        let start_time = Instant::now();
        let df = frame.collect()?;
        let tasks = Self::decode_tasks(&df)?;
        info!(
            "Decoded {} tasks ({} bytes) in {}ms ...",
            tasks.len(),
            file_info.file_size,
            start_time.elapsed().as_millis()
        );

        let name = file_info
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        Ok(Self {
            inner: MemorySource::new(name, tasks, locale),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.tasks.is_empty()
    }

    // Each column is cast to strings in its own rayon task, then rows are
    // assembled in parallel.
    fn decode_tasks(df: &DataFrame) -> Result<Vec<TaskState>, TaskGridError> {
        let decoded: Result<Vec<Option<Vec<Option<String>>>>, PolarsError> = TABLE_COLUMNS
            .par_iter()
            .map(|name| Self::load_column(df, name))
            .collect();
        let decoded = decoded?;
        let [ids, categories, assignees, starts, finishes, statuses] = &decoded[..] else {
            return Err(TaskGridError::LoadingFailed("column decoding mismatch".into()));
        };
        let Some(ids) = ids else {
            return Err(TaskGridError::LoadingFailed(format!(
                "task table has no \"{BOOKING_ID_COLUMN}\" column"
            )));
        };

        let cell = |column: &Option<Vec<Option<String>>>, row: usize| -> Option<String> {
            column.as_ref().and_then(|c| c[row].clone()).filter(|s| !s.is_empty())
        };

        Ok((0..df.height())
            .into_par_iter()
            .map(|row| TaskState {
                booking: Booking {
                    id: ids[row].clone().unwrap_or_default(),
                },
                category: cell(categories, row),
                assigned_to: cell(assignees, row).map(|name| Assignee { name }),
                unix_millis_start_time: cell(starts, row).and_then(|s| parse_millis(&s)),
                unix_millis_finish_time: cell(finishes, row).and_then(|s| parse_millis(&s)),
                status: cell(statuses, row),
            })
            .collect())
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<Option<Vec<Option<String>>>, PolarsError> {
        if !df.get_column_names().iter().any(|c| c.as_str() == col_name) {
            debug!("Task table has no column \"{col_name}\"");
            return Ok(None);
        }
        let col = df.column(col_name)?.cast(&DataType::String)?;
        let series = col.str()?;
        Ok(Some(
            series
                .into_iter()
                .map(|value| value.map(|s| s.trim().to_string()))
                .collect(),
        ))
    }

    fn get_file_info(path: PathBuf) -> Result<FileInfo, TaskGridError> {
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TaskGridError::FileNotFound,
            ErrorKind::PermissionDenied => TaskGridError::PermissionDenied,
            _ => TaskGridError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(TaskGridError::LoadingFailed("Not a file!".into()));
        }

        let file_size = metadata.len();
        let file_type = Self::detect_file_type(&path)?;

        Ok(FileInfo {
            path,
            file_size,
            file_type,
        })
    }

    fn detect_file_type(path: &Path) -> Result<FileType, TaskGridError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::Csv),
            Some("PARQUET") | Some("PQ") => Ok(FileType::Parquet),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::Arrow),
            _ => Err(TaskGridError::UnknownFileType),
        }
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}

impl TaskSource for FrameSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(&self, query: &TaskQuery) -> Result<TaskPage, TaskGridError> {
        self.inner.fetch(query)
    }
}

// Integer columns may come through as floats ("1.7e12") after a cast.
fn parse_millis(s: &str) -> Option<i64> {
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
}
