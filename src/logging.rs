// src/logging.rs
//
// Timestamped logging for the logger core and the CLI.
// `tlog!` writes to stderr, and additionally to a log file when file
// logging has been initialised.

use std::path::Path;
use std::sync::Mutex;

/// Global log file handle. When `Some`, `tlog!` writes to both stderr and this file.
#[doc(hidden)]
pub static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

/// Local time in the same shape `tlog!` uses for its prefix.
fn stamp() -> chrono::format::DelayedFormat<chrono::format::StrftimeItems<'static>> {
    chrono::Local::now().format("%H:%M:%S%.3f")
}

/// Start mirroring `tlog!` output into a timestamped file under `log_dir`.
/// A `rssilog.log` symlink tracks the newest file (Unix only — Windows
/// symlinks need elevated privileges, so there it is skipped).
pub fn init_file_logging(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|e| format!("Failed to create log dir: {}", e))?;

    let filename = chrono::Local::now()
        .format("%Y%m%d-%H%M%S-rssilog.log")
        .to_string();
    let log_path = log_dir.join(&filename);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| format!("Failed to create log file: {}", e))?;

    #[cfg(unix)]
    {
        let symlink = log_dir.join("rssilog.log");
        let _ = std::fs::remove_file(&symlink);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &symlink) {
            eprintln!("{} [logging] Failed to update rssilog.log symlink: {}", stamp(), e);
        }
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    // eprintln here, not tlog! — it would re-lock LOG_FILE
    eprintln!("{} [logging] File logging started: {}", stamp(), log_path.display());

    Ok(())
}

/// Stop file logging and close the log file.
pub fn stop_file_logging() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if guard.take().is_some() {
            eprintln!("{} [logging] File logging stopped", stamp());
        }
    }
}

/// Timestamped logging macro.
/// Prepends `HH:MM:SS.mmm` local time to every message written to stderr.
/// Also writes to the log file when file logging is enabled.
#[macro_export]
macro_rules! tlog {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        let msg = format!("{} {}", chrono::Local::now().format("%H:%M:%S%.3f"), format_args!($($arg)*));
        eprintln!("{}", msg);
        if let Ok(mut guard) = $crate::logging::LOG_FILE.lock() {
            if let Some(ref mut f) = *guard {
                let _ = writeln!(f, "{}", msg);
            }
        }
    }};
}
