//! # ScanPay Kiosk Library
//!
//! The self-checkout kiosk: scan products, review the cart, pay, get a
//! receipt. `run()` is the whole binary.
//!
//! ## Module Organization
//! ```text
//! scanpay_kiosk/
//! ├── lib.rs          ◄─── You are here (startup & console loop)
//! ├── app.rs          ◄─── Kiosk assembly and command routing
//! ├── commands.rs     ◄─── Console command parsing
//! ├── config.rs       ◄─── kiosk.toml + SCANPAY_* overrides
//! ├── scanner/
//! │   ├── mod.rs      ◄─── Scanner engine (decode loop, debounce)
//! │   ├── camera.rs   ◄─── Camera seam + console-fed camera
//! │   └── decoder.rs  ◄─── Decoder seam
//! ├── pipeline.rs     ◄─── Scan → lookup → cart
//! ├── store.rs        ◄─── Cart store actor (persist, hydrate, events)
//! ├── checkout.rs     ◄─── Checkout state machine
//! ├── receipt.rs      ◄─── Receipt files
//! ├── status.rs       ◄─── User-facing status line
//! └── error.rs        ◄─── KioskError for the console
//! ```

pub mod app;
pub mod checkout;
pub mod commands;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod receipt;
pub mod scanner;
pub mod status;
pub mod store;

use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use scanpay_db::{Database, DbConfig};

use app::Kiosk;
use commands::Command;
use config::KioskConfig;
use error::KioskError;

/// Runs the kiosk until `quit` or end of input.
///
/// ## Startup Sequence
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                         Kiosk Startup                                   │
/// │                                                                         │
/// │  1. Initialize Logging ───────────────────────────────────────────────► │
/// │     • tracing-subscriber with env filter                                │
/// │     • Default: info,scanpay=debug,sqlx=warn; RUST_LOG overrides         │
/// │                                                                         │
/// │  2. Load Configuration ───────────────────────────────────────────────► │
/// │     • defaults → kiosk.toml → SCANPAY_* environment                     │
/// │                                                                         │
/// │  3. Open Local Database ──────────────────────────────────────────────► │
/// │     • SQLite with WAL mode, pending migrations applied                  │
/// │                                                                         │
/// │  4. Assemble Kiosk ───────────────────────────────────────────────────► │
/// │     • Cart store, draft sync, hydrate, session check, scanner           │
/// │                                                                         │
/// │  5. Console Loop ─────────────────────────────────────────────────────► │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn run(config_path: Option<PathBuf>) -> Result<(), KioskError> {
    init_tracing();

    info!("Starting ScanPay Kiosk");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| KioskError::internal(format!("Could not start runtime: {}", e)))?;

    runtime.block_on(async_main(config_path))
}

async fn async_main(config_path: Option<PathBuf>) -> Result<(), KioskError> {
    let config = KioskConfig::load(config_path)?;

    let db_path = config.database_path()?;
    info!(?db_path, "Database path determined");
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            KioskError::new(
                error::ErrorCode::StorageError,
                format!("Could not create {}: {}", parent.display(), e),
            )
        })?;
    }
    let db = Database::new(DbConfig::new(db_path)).await?;
    info!("Database connected and migrations applied");

    let mut kiosk = Kiosk::start(config, db).await?;
    console(&mut kiosk).await;
    kiosk.shutdown().await;
    Ok(())
}

async fn console(kiosk: &mut Kiosk) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let mut banner = String::from("ScanPay Kiosk. Type 'help' for commands.\n");
    if let Some(status) = kiosk.status().current() {
        banner.push_str(&format!("{}\n", status));
    }
    write(&mut stdout, &banner).await;

    loop {
        write(&mut stdout, "> ").await;
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "Console read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                write(&mut stdout, &format!("{}\n", e)).await;
                continue;
            }
        };
        let quit = command == Command::Quit;

        let out = match kiosk.execute(command).await {
            Ok(text) => text,
            Err(e) => format!("Error: {}", e),
        };
        write(&mut stdout, &format!("{}\n", out)).await;

        if quit {
            break;
        }
    }
}

async fn write(stdout: &mut tokio::io::Stdout, text: &str) {
    // Nothing useful to do if the terminal is gone
    let _ = stdout.write_all(text.as_bytes()).await;
    let _ = stdout.flush().await;
}

/// Used when `RUST_LOG` is unset or unparsable.
const DEFAULT_LOG_FILTER: &str = "info,scanpay=debug,sqlx=warn";

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=scanpay=trace` - Include decode noise
/// - Default: INFO, DEBUG for scanpay crates
///
/// Logs go to stderr so they do not interleave with console output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    subscriber(filter).init();
}

/// Levels come from the env filter alone.
fn subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_default_filter_levels() {
        let subscriber = subscriber(EnvFilter::new(DEFAULT_LOG_FILTER));

        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(target: "sqlx::query", Level::WARN));
            assert!(!tracing::enabled!(target: "sqlx::query", Level::DEBUG));
            assert!(tracing::enabled!(target: "scanpay_kiosk::app", Level::DEBUG));
            assert!(!tracing::enabled!(target: "scanpay_kiosk::scanner", Level::TRACE));
            assert!(tracing::enabled!(target: "hyper::client", Level::INFO));
            assert!(!tracing::enabled!(target: "hyper::client", Level::DEBUG));
        });
    }

    #[test]
    fn test_explicit_filter_is_honored() {
        let subscriber = subscriber(EnvFilter::new("warn"));

        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(target: "scanpay_kiosk::app", Level::WARN));
            assert!(!tracing::enabled!(target: "scanpay_kiosk::app", Level::INFO));
        });
    }
}
