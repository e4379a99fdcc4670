//! Display recent log entries from the application.

use anyhow::anyhow;
use std::fs;
use std::path::Path;

use crate::logging;

const DEFAULT_LINES: usize = 50;

/// Prints the last lines of the newest log file.
///
/// # Errors
/// - If the log directory cannot be determined
/// - If the log file cannot be read
pub fn handle_logs() -> Result<(), anyhow::Error> {
    let log_dir = logging::log_dir()?;

    if !log_dir.exists() {
        println!("Log directory does not exist yet: {}", log_dir.display());
        println!("Logs will be created when wavetap runs.");
        return Ok(());
    }

    let Some(log_file) = logging::log_files(&log_dir)?.into_iter().next() else {
        println!("No log files found in: {}", log_dir.display());
        println!("Run 'wavetap' to generate logs.");
        return Ok(());
    };

    let content =
        fs::read_to_string(&log_file).map_err(|e| anyhow!("Failed to read log file: {e}"))?;
    if content.is_empty() {
        println!("Log file is empty: {}", log_file.display());
        return Ok(());
    }

    let (total, tail) = last_lines(&content, DEFAULT_LINES);
    print_header(total, tail.len(), &log_file);
    for line in tail {
        println!("{line}");
    }

    Ok(())
}

fn print_header(total: usize, shown: usize, log_file: &Path) {
    println!();
    if shown < total {
        println!("Showing last {shown} of {total} lines:");
    } else {
        println!("Showing all {total} lines:");
    }
    println!("Full log file at: {}", log_file.display());
    println!();
}

/// Total line count and the last `n` lines.
fn last_lines(content: &str, n: usize) -> (usize, Vec<&str>) {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    (lines.len(), lines[start..].to_vec())
}
