// src/main.rs
//
// Headless batch logger: connect to one port, echo telemetry, append
// accepted records to a CSV file until Ctrl-C. The single-process
// counterpart to driving the dispatcher from a GUI shell.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use rssilog::export::CsvAppender;
use rssilog::{list_ports, tlog, Dispatcher, DEFAULT_BAUD};

#[derive(Parser)]
#[command(name = "rssilog", version, about = "Serial RSSI telemetry logger for radio-link field surveys")]
struct Args {
    /// Serial port to read from (e.g. /dev/ttyACM0, COM32)
    #[arg(long)]
    port: Option<String>,

    /// Baud rate of the device's serial console
    #[arg(long, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// CSV file to append accepted records to
    #[arg(long, default_value = "rssi_log.csv")]
    csv: PathBuf,

    /// Free-text note stored with every record (e.g. "2E lab corner")
    #[arg(long, default_value = "")]
    notes: String,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Directory for timestamped log files (stderr only when unset)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(dir) = &args.log_dir {
        if let Err(e) = rssilog::logging::init_file_logging(dir) {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    if args.list_ports {
        return match list_ports() {
            Ok(ports) => {
                for p in ports {
                    let detail = match (&p.manufacturer, &p.product) {
                        (Some(m), Some(prod)) => format!(" ({} {})", m, prod),
                        (_, Some(prod)) => format!(" ({})", prod),
                        _ => String::new(),
                    };
                    println!("{}\t{}{}", p.port_name, p.port_type, detail);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                tlog!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let Some(port) = args.port else {
        tlog!("No port given. Use --port <name>, or --list-ports to see what is available.");
        return ExitCode::FAILURE;
    };

    let mut appender = match CsvAppender::open(&args.csv) {
        Ok(a) => a,
        Err(e) => {
            tlog!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut dispatcher = Dispatcher::new();
    dispatcher.set_notes(&args.notes);
    if let Err(e) = dispatcher.connect(&port, args.baud) {
        tlog!("{}", e);
        return ExitCode::FAILURE;
    }

    tlog!("Opening {} @ {}, logging to {}", port, args.baud, args.csv.display());
    tlog!("Waiting for AVG lines... (Ctrl-C to stop)");
    if !args.notes.is_empty() {
        tlog!("Notes: {}", args.notes);
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let mut had_error = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let summary = dispatcher.tick();

                for line in &summary.lines {
                    println!("{}", line);
                }
                for err in &summary.errors {
                    tlog!("{}", err);
                    had_error = true;
                }

                // Append rows accepted this tick
                let rows = dispatcher.store().rows();
                let first_new = rows.len() - summary.rows_appended;
                for row in &rows[first_new..] {
                    if let Err(e) = appender.append(row) {
                        tlog!("{}", e);
                        had_error = true;
                    }
                }

                if summary.session_ended {
                    tlog!("{}", dispatcher.status());
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tlog!("Stopping...");
                // Cooperative stop; keep ticking until the terminal status
                let _ = dispatcher.disconnect();
            }
        }
    }

    rssilog::logging::stop_file_logging();
    if had_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
