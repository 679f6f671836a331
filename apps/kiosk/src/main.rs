//! # ScanPay Kiosk Entry Point
//!
//! ```text
//! scanpay-kiosk [path/to/kiosk.toml]
//! ```
//!
//! The setup lives in lib.rs; this only picks up the optional config path
//! and turns the outcome into an exit code.

use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);

    match scanpay_kiosk::run(config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("scanpay-kiosk: {}", e);
            ExitCode::FAILURE
        }
    }
}
