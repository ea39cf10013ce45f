//! crimetrend - terminal charts of monthly police.uk crime data.
//!
//! Fetches every published month for one force area, keeps a local CSV
//! cache up to date, and charts category trends in the terminal.

mod app;
mod ui;

use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use chrono::Local;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crimetrend_core::{sync_dataset, ApiClient, CacheManager, Config, SyncError, SyncSettings};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file written while the TUI owns the terminal
const LOG_FILE: &str = "crimetrend.log";

const USAGE: &str = "Usage: crimetrend [--sync-only] [--offline]

  --sync-only   Bring the cache up to date, print a summary and exit
  --offline     Never contact the server; chart the cache as-is";

#[derive(Debug, Default, PartialEq)]
struct Args {
    sync_only: bool,
    offline: bool,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = Args::default();
        for arg in args {
            match arg.as_str() {
                "--sync-only" => parsed.sync_only = true,
                "--offline" => parsed.offline = true,
                "-h" | "--help" => {
                    println!("{}", USAGE);
                    std::process::exit(0);
                }
                other => bail!("Unknown argument '{}'\n\n{}", other, USAGE),
            }
        }
        if parsed.sync_only && parsed.offline {
            bail!("--sync-only and --offline cannot be combined");
        }
        Ok(parsed)
    }
}

/// Initialize the tracing subscriber for logging.
///
/// Headless runs log to stderr at `info`. The TUI logs to a file at `warn`
/// since stderr is hidden behind the alternate screen. `RUST_LOG` overrides
/// either default.
fn init_tracing(headless: bool, log_dir: Option<&Path>) {
    let default_level = if headless { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_dir {
        Some(dir) if !headless => {
            let file_appender = tracing_appender::rolling::never(dir, LOG_FILE);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(file_appender).with_ansi(false))
                .with(filter)
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse(std::env::args().skip(1))?;
    let config = Config::load()?;

    let log_dir = config.log_dir().ok();
    if let Some(ref dir) = log_dir {
        let _ = std::fs::create_dir_all(dir);
    }
    init_tracing(args.sync_only, log_dir.as_deref());

    if args.sync_only {
        return sync_only(&config).await;
    }

    info!(force = %config.force, area = %config.area_code, "crimetrend starting");

    // Load before touching the terminal so a corrupt cache is reported plainly
    let mut app = App::new(config, args.offline)?;
    if let Err(e) = app.load_from_cache() {
        return Err(explain_sync_error(e, app.cache()));
    }
    if !app.is_offline() {
        app.refresh_background();
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(ref e) = result {
        error!(error = %e, "TUI exited with error");
    }

    info!("crimetrend shutting down");
    result
}

/// Sync the cache and print the report, without starting the TUI.
async fn sync_only(config: &Config) -> Result<()> {
    config.validate()?;
    let settings = SyncSettings::from_config(config)?;
    let cache = CacheManager::new(config.cache_path()?);
    let api = ApiClient::from_config(config)?;

    info!(path = %cache.path().display(), "Syncing cache");
    let outcome = sync_dataset(&cache, &api, &settings, Local::now().date_naive())
        .await
        .map_err(|e| explain_sync_error(e, &cache))?;

    println!("{}", outcome.report);
    println!("Cache: {}", cache.path().display());
    Ok(())
}

/// Append a reset hint to cache corruption errors.
fn explain_sync_error(err: SyncError, cache: &CacheManager) -> anyhow::Error {
    if err.is_corrupt_cache() {
        anyhow!(
            "{}\nDelete {} and {} to fetch the full history again.",
            err,
            cache.path().display(),
            cache.coverage_path().display()
        )
    } else {
        err.into()
    }
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_args_parse() {
        assert_eq!(parse(&[]).unwrap(), Args::default());
        assert!(parse(&["--offline"]).unwrap().offline);
        assert!(parse(&["--sync-only"]).unwrap().sync_only);
    }

    #[test]
    fn test_corrupt_cache_error_names_files_to_delete() {
        use crimetrend_core::{ApiError, CacheError};

        let cache = CacheManager::new("/tmp/crimetrend/all_crime.csv");
        let corrupt = SyncError::Cache(CacheError::Corrupt {
            path: cache.path().to_path_buf(),
            line: 3,
            message: "invalid date 'soon'".to_string(),
        });
        let msg = explain_sync_error(corrupt, &cache).to_string();
        assert!(msg.contains("corrupt at line 3"));
        assert!(msg.contains("Delete /tmp/crimetrend/all_crime.csv and"));
        assert!(msg.contains("all_crime.csv.coverage.json"));

        let retrieval = SyncError::Retrieval {
            month: "2024-03".to_string(),
            source: ApiError::RateLimited,
        };
        assert!(!explain_sync_error(retrieval, &cache).to_string().contains("Delete"));
    }

    #[test]
    fn test_args_reject_unknown_and_conflicting() {
        assert!(parse(&["--verbose"]).is_err());
        assert!(parse(&["--sync-only", "--offline"]).is_err());
    }
}
