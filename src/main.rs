use std::fs::File;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::{Parser, ValueEnum};
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::{ErrorLayer, SpanTrace};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use taskgrid::domain::{FilterMode, GridConfig, TaskGridError};
use taskgrid::format::Locale;
use taskgrid::source::{FrameSource, TaskSource};

mod app;
mod controller;
mod inputter;
mod model;
mod ui;

use app::AppConfig;
use controller::Controller;
use model::{Model, Status};
use ui::TableUI;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FilterModeArg {
    /// Filter the rows of the current page
    Client,
    /// Send filters along with the page query
    Server,
}

impl From<FilterModeArg> for FilterMode {
    fn from(arg: FilterModeArg) -> Self {
        match arg {
            FilterModeArg::Client => FilterMode::Client,
            FilterModeArg::Server => FilterMode::Server,
        }
    }
}

/// Browse a task table page by page.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// CSV, Parquet or Arrow IPC file holding task states
    path: String,

    /// Rows per page
    #[arg(long, default_value_t = 10)]
    page_size: usize,

    /// Where filters are evaluated
    #[arg(long, value_enum, default_value_t = FilterModeArg::Client)]
    filter_mode: FilterModeArg,

    /// Render timestamps at this UTC offset instead of local time
    #[arg(long, allow_hyphen_values = true, value_parser = clap::value_parser!(i32).range(-1439..=1439))]
    utc_offset: Option<i32>,

    /// Log file, filtered by RUST_LOG (default info)
    #[arg(long, default_value = "taskgrid.log")]
    log_file: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_file) {
        eprintln!("Could not open log file {}: {e}", args.log_file);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Err(e) => {
            error!("taskgrid failed: {e}\n{}", SpanTrace::capture());
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(path: &str) -> Result<(), TaskGridError> {
    let file = File::create(shellexpand::tilde(path).as_ref())?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<(), TaskGridError> {
    info!("Starting taskgrid with {args:?}");

    let locale = args
        .utc_offset
        .and_then(Locale::with_offset_minutes)
        .unwrap_or_default();

    let page_size = args.page_size.max(1);
    let mut page_size_options = GridConfig::default().page_size_options;
    if !page_size_options.contains(&page_size) {
        page_size_options.push(page_size);
        page_size_options.sort_unstable();
    }
    let cfg = AppConfig::default().grid(
        GridConfig::default()
            .page_size(page_size)
            .page_size_options(page_size_options)
            .filter_mode(args.filter_mode.into())
            .locale(locale),
    );

    let source: Arc<dyn TaskSource> = Arc::new(FrameSource::load(&args.path, locale)?);
    let mut model = Model::init(&cfg, source);
    let mut ui = TableUI::new(&cfg);
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &mut ui, &controller);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    ui: &mut TableUI,
    controller: &Controller,
) -> Result<(), TaskGridError> {
    while model.status != Status::Quitting {
        // Render the current view
        terminal.draw(|f| ui.draw(model, f))?;

        // Poll for a key, a None still lets the model pick up fetched pages
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    Ok(())
}
