//! Command history
//!
//! Every invocation of the CLI is appended as one JSON line to a file per
//! day, `history-YYYY-MM-DD`, inside the history directory.

use crate::error::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name prefix of the per-day history files
pub const HISTORY_FILE_PREFIX: &str = "history-";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One recorded invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRow {
    /// Command line as typed
    pub command: String,
    /// When the command ran
    pub time: DateTime<Utc>,
    /// Process exit code
    pub code: i32,
}

fn file_name(date: NaiveDate) -> String {
    format!("{}{}", HISTORY_FILE_PREFIX, date.format(DATE_FORMAT))
}

fn file_date(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let date = name.strip_prefix(HISTORY_FILE_PREFIX)?;
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
}

/// History files in `dir`, newest day first
fn history_files(dir: &Path) -> Vec<(NaiveDate, PathBuf)> {
    if !dir.exists() {
        return Vec::new();
    }

    let mut files: Vec<(NaiveDate, PathBuf)> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| file_date(e.path()).map(|date| (date, e.into_path())))
        .collect();
    files.sort_by(|a, b| b.0.cmp(&a.0));
    files
}

/// Append one invocation to the file of its day
pub fn record(dir: &Path, args: &[String], time: DateTime<Utc>, code: i32) -> Result<()> {
    fs::create_dir_all(dir)?;

    let row = HistoryRow {
        command: args.join(" "),
        time,
        code,
    };
    let path = dir.join(file_name(time.date_naive()));
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", serde_json::to_string(&row)?)?;
    Ok(())
}

/// The `count` most recent rows in chronological order; zero means all
///
/// Lines that do not parse are skipped.
pub fn recent(dir: &Path, count: usize) -> Result<Vec<HistoryRow>> {
    let mut rows: Vec<HistoryRow> = Vec::new();

    for (_, path) in history_files(dir) {
        let content = fs::read_to_string(&path)?;
        let mut day: Vec<HistoryRow> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(row) => Some(row),
                Err(e) => {
                    debug!("Skipping history line in {}: {}", path.display(), e);
                    None
                }
            })
            .collect();

        day.append(&mut rows);
        rows = day;

        if count > 0 && rows.len() >= count {
            break;
        }
    }

    if count > 0 && rows.len() > count {
        rows.drain(..rows.len() - count);
    }
    Ok(rows)
}

/// Delete day files older than `retain_days` days before `now`
///
/// Returns the number of files removed.
pub fn prune(dir: &Path, retain_days: u32, now: DateTime<Utc>) -> Result<usize> {
    let cutoff = now.date_naive() - Duration::days(i64::from(retain_days));

    let mut removed = 0;
    for (date, path) in history_files(dir) {
        if date < cutoff {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn args(line: &str) -> Vec<String> {
        line.split(' ').map(String::from).collect()
    }

    #[test]
    fn test_record_and_recent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("history");

        record(&dir, &args("rune-cluster start a"), at(1, 10), 0).unwrap();
        record(&dir, &args("rune-cluster stop a"), at(1, 11), 1).unwrap();
        record(&dir, &args("rune-cluster start b"), at(2, 9), 0).unwrap();

        assert!(dir.join("history-2024-03-01").is_file());
        assert!(dir.join("history-2024-03-02").is_file());

        let all = recent(&dir, 0).unwrap();
        let commands: Vec<&str> = all.iter().map(|r| r.command.as_str()).collect();
        assert_eq!(
            commands,
            vec![
                "rune-cluster start a",
                "rune-cluster stop a",
                "rune-cluster start b"
            ]
        );
        assert_eq!(all[1].code, 1);

        let last_two = recent(&dir, 2).unwrap();
        assert_eq!(last_two[0].command, "rune-cluster stop a");
        assert_eq!(last_two[1].command, "rune-cluster start b");
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();

        record(dir, &args("rune-cluster start a"), at(5, 10), 0).unwrap();
        let path = dir.join("history-2024-03-05");
        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str("not json\n\n");
        fs::write(&path, content).unwrap();
        fs::write(dir.join("unrelated.txt"), "x").unwrap();

        let rows = recent(dir, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].time, at(5, 10));
    }

    #[test]
    fn test_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(recent(&temp.path().join("none"), 5).unwrap().is_empty());
    }

    #[test]
    fn test_prune() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();

        for day in [1, 5, 9, 10] {
            record(dir, &args("rune-cluster start a"), at(day, 8), 0).unwrap();
        }

        let removed = prune(dir, 5, at(10, 12)).unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.join("history-2024-03-01").exists());
        assert!(dir.join("history-2024-03-05").exists());
        assert_eq!(recent(dir, 0).unwrap().len(), 3);
    }
}
