//! Per-run log directory, per-process log files, and the PID file

use crate::error::LaunchError;
use crate::ros;
use std::io::Write;
use std::path::{Path, PathBuf};

const LOG_DISK_WARN_BYTES: u64 = 1024 * 1024 * 1024;

/// Directory holding this run's log files, named after the run id.
pub fn run_log_dir(run_id: &str) -> PathBuf {
    let base = match std::env::var(ros::ENV_ROS_LOG_DIR) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => ros::ros_home().join("log"),
    };
    base.join(run_id)
}

/// Create the run log directory if needed and return it.
pub fn ensure_run_log_dir(run_id: &str) -> Result<PathBuf, LaunchError> {
    let dir = run_log_dir(run_id);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn sanitized(process_name: &str) -> String {
    process_name.trim_start_matches('/').replace('/', "_")
}

/// Base log path for a process: `<run dir>/<name>.log`.
pub fn process_log_file(process_name: &str, run_id: &str) -> PathBuf {
    run_log_dir(run_id).join(format!("{}.log", sanitized(process_name)))
}

/// Stdout log path: `<name>-stdout.log`.
pub fn process_stdout_log(process_name: &str, run_id: &str) -> PathBuf {
    run_log_dir(run_id).join(format!("{}-stdout.log", sanitized(process_name)))
}

/// Stderr log path: `<name>-stderr.log`.
pub fn process_stderr_log(process_name: &str, run_id: &str) -> PathBuf {
    run_log_dir(run_id).join(format!("{}-stderr.log", sanitized(process_name)))
}

/// Write this process's PID to the given file.
pub fn write_pid_file(path: &Path) -> Result<(), LaunchError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| LaunchError::PidFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
    }
    let mut file = std::fs::File::create(path).map_err(|e| LaunchError::PidFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    writeln!(file, "{}", std::process::id()).map_err(|e| LaunchError::PidFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Remove the PID file. Safe to call repeatedly.
pub fn delete_pid_file(path: &Path) {
    if path.is_file() {
        let _ = std::fs::remove_file(path);
    }
}

/// Warn when the log directory has grown past the threshold.
pub fn check_log_disk_usage() {
    let base = match std::env::var(ros::ENV_ROS_LOG_DIR) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => ros::ros_home().join("log"),
    };
    if !base.is_dir() {
        return;
    }

    let used = directory_size(&base);
    if used > LOG_DISK_WARN_BYTES {
        log::warn!(
            "log directory {} has grown to {} MB; consider purging old runs",
            base.display(),
            used / (1024 * 1024)
        );
    }
}

fn directory_size(dir: &Path) -> u64 {
    let mut total = 0;
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                total += entry.metadata().map(|m| m.len()).unwrap_or(0);
            } else if path.is_dir() {
                total += directory_size(&path);
            }
        }
    }
    total
}
