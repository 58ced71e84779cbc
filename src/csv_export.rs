//! Writes historical series to CSV artifacts and sweeps out stale ones.
//!
//! The export directory is the only registry: a file exists for download
//! exactly when it is on disk.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use log::{error, info, warn};
use serde::Serialize;

use crate::error::AppError;
use crate::exchange_rate::HistoricalPoint;
use crate::validation::CsvExportJob;

pub const MAX_FILE_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvArtifact {
    pub filename: String,
    pub file_path: PathBuf,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub file_path: PathBuf,
    pub exists: bool,
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Currency")]
    currency: &'a str,
    #[serde(rename = "Currency Code")]
    currency_code: &'a str,
    #[serde(rename = "Exchange Rate")]
    exchange_rate: String,
    #[serde(rename = "Table Number")]
    table_number: &'a str,
}

#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
    max_age: Duration,
}

impl CsvExporter {
    /// Creates the export directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;

        Ok(Self {
            dir,
            max_age: MAX_FILE_AGE,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn export(
        &self,
        job: &CsvExportJob,
        currency_name: &str,
        points: &[HistoricalPoint],
    ) -> Result<CsvArtifact, AppError> {
        let filename = job.filename.clone().unwrap_or_else(|| {
            let range = &job.range;
            generate_filename(range.currency_code.as_str(), &range.start, &range.end)
        });
        let file_path = self.dir.join(&filename);

        let contents = render_csv(points, job.range.currency_code.as_str(), currency_name)
            .map_err(AppError::ExportFailed)?;
        self.write_atomically(&filename, &contents)
            .await
            .map_err(|e| {
                error!("Error exporting {filename} to CSV: {e:#}");
                AppError::ExportFailed(e)
            })?;

        info!("CSV exported: {filename} ({} records)", points.len());

        Ok(CsvArtifact {
            filename,
            file_path,
            record_count: points.len(),
        })
    }

    async fn write_atomically(&self, filename: &str, contents: &[u8]) -> anyhow::Result<()> {
        let tmp_path = self.dir.join(format!(".{filename}.tmp"));
        let final_path = self.dir.join(filename);

        tokio::fs::write(&tmp_path, contents)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;

        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e)
                .with_context(|| format!("Failed to move CSV into {}", final_path.display()));
        }
        Ok(())
    }

    /// Callers treat `exists == false` as not found.
    pub async fn file_for_download(&self, filename: &str) -> DownloadTarget {
        let file_path = self.dir.join(filename);
        let exists = tokio::fs::metadata(&file_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);

        DownloadTarget { file_path, exists }
    }

    /// Deletes `.csv` files older than the retention window and returns how many
    /// were removed. Failures are logged and never abort the sweep.
    pub async fn cleanup_old_files(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Error cleaning up old files in {}: {e}", self.dir.display());
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    error!("Error reading {}: {e}", self.dir.display());
                    break;
                }
            };

            let path = entry.path();
            if !is_export_artifact(&path) {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("Can't stat {}: {e}", path.display());
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or_default();
            if age <= self.max_age {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!("Deleted old export file: {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to delete {}: {e}", path.display()),
            }
        }

        removed
    }

    /// Runs the sweep now and then every `interval` on a background task.
    pub fn spawn_cleanup_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let exporter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = exporter.cleanup_old_files().await;
                if removed > 0 {
                    info!("Retention sweep removed {removed} CSV file(s)");
                }
            }
        })
    }
}

/// Finished exports and the `.{name}.tmp` leftovers of interrupted writes.
fn is_export_artifact(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".csv") || (name.starts_with('.') && name.ends_with(".csv.tmp"))
}

/// `{code}_{start}_{end}_{timestamp}.csv`, timestamp free of colons and dots.
fn generate_filename(code: &str, start: &NaiveDate, end: &NaiveDate) -> String {
    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3f");
    format!("{code}_{start}_{end}_{timestamp}.csv")
}

fn render_csv(
    points: &[HistoricalPoint],
    currency_code: &str,
    currency_name: &str,
) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    if points.is_empty() {
        writer.write_record([
            "Date",
            "Currency",
            "Currency Code",
            "Exchange Rate",
            "Table Number",
        ])?;
    }

    for point in points {
        writer.serialize(CsvRow {
            date: point.effective_date.format("%Y-%m-%d").to_string(),
            currency: currency_name,
            currency_code,
            exchange_rate: point.mid.to_string(),
            table_number: &point.sequence_id,
        })?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV buffer: {}", e.error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_date_range;
    use rust_decimal::Decimal;
    use serde::Deserialize;
    use std::str::FromStr;

    #[derive(Debug, Deserialize)]
    struct ReadRow {
        #[serde(rename = "Date")]
        date: String,
        #[serde(rename = "Currency")]
        currency: String,
        #[serde(rename = "Currency Code")]
        currency_code: String,
        #[serde(rename = "Exchange Rate")]
        exchange_rate: String,
        #[serde(rename = "Table Number")]
        table_number: String,
    }

    fn points() -> Vec<HistoricalPoint> {
        [
            ("001/A/NBP/2024", "2024-01-02", "3.9432"),
            ("002/A/NBP/2024", "2024-01-03", "3.9909"),
            ("003/A/NBP/2024", "2024-01-04", "3.9684"),
        ]
        .into_iter()
        .map(|(no, date, mid)| HistoricalPoint {
            sequence_id: no.to_string(),
            effective_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            mid: Decimal::from_str(mid).unwrap(),
        })
        .collect()
    }

    fn job(filename: Option<&str>) -> CsvExportJob {
        CsvExportJob {
            range: validate_date_range("USD", "2024-01-01", "2024-01-05").unwrap(),
            filename: filename.map(str::to_string),
        }
    }

    fn read_rows(path: &Path) -> Vec<ReadRow> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader.deserialize().map(|r| r.unwrap()).collect()
    }

    #[tokio::test]
    async fn exported_rows_match_points() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path()).unwrap();

        let artifact = exporter
            .export(&job(None), "dolar amerykański", &points())
            .await
            .unwrap();

        assert_eq!(artifact.record_count, 3);
        assert!(artifact.filename.starts_with("USD_2024-01-01_2024-01-05_"));
        assert!(artifact.filename.ends_with(".csv"));
        assert!(!artifact.filename.trim_end_matches(".csv").contains(['.', ':']));

        let rows = read_rows(&artifact.file_path);
        assert_eq!(rows.len(), 3);
        for (row, point) in rows.iter().zip(points()) {
            assert_eq!(row.date, point.effective_date.to_string());
            assert_eq!(Decimal::from_str(&row.exchange_rate).unwrap(), point.mid);
            assert_eq!(row.table_number, point.sequence_id);
            assert_eq!(row.currency, "dolar amerykański");
            assert_eq!(row.currency_code, "USD");
        }
    }

    #[tokio::test]
    async fn identical_input_gives_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path()).unwrap();

        let a = exporter
            .export(&job(Some("a.csv")), "dolar amerykański", &points())
            .await
            .unwrap();
        let b = exporter
            .export(&job(Some("b.csv")), "dolar amerykański", &points())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read(&a.file_path).unwrap(),
            std::fs::read(&b.file_path).unwrap()
        );
        assert_eq!(a.filename, "a.csv");
    }

    #[tokio::test]
    async fn header_is_written_for_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path()).unwrap();

        let artifact = exporter
            .export(&job(Some("empty.csv")), "euro", &[])
            .await
            .unwrap();

        let text = std::fs::read_to_string(&artifact.file_path).unwrap();
        assert_eq!(
            text.trim_end(),
            "Date,Currency,Currency Code,Exchange Rate,Table Number"
        );
        assert_eq!(artifact.record_count, 0);
    }

    #[tokio::test]
    async fn write_failure_is_opaque() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path().join("gone")).unwrap();
        std::fs::remove_dir(exporter.dir()).unwrap();

        let err = exporter
            .export(&job(Some("x.csv")), "euro", &points())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExportFailed(_)));
        assert_eq!(err.to_string(), "Failed to export data to CSV");
    }

    #[tokio::test]
    async fn download_lookup_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path()).unwrap();
        exporter
            .export(&job(Some("here.csv")), "euro", &points())
            .await
            .unwrap();

        let found = exporter.file_for_download("here.csv").await;
        assert!(found.exists);
        assert_eq!(found.file_path, dir.path().join("here.csv"));

        let missing = exporter.file_for_download("does-not-exist.csv").await;
        assert!(!missing.exists);
    }

    #[tokio::test]
    async fn cleanup_removes_stale_csv_and_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path()).unwrap();

        let fresh = dir.path().join("fresh.csv");
        let stale = dir.path().join("stale.csv");
        let stale_other = dir.path().join("stale.txt");
        let fresh_tmp = dir.path().join(".fresh.csv.tmp");
        let stale_tmp = dir.path().join(".crashed.csv.tmp");
        for p in [&fresh, &stale, &stale_other, &fresh_tmp, &stale_tmp] {
            std::fs::write(p, "Date\n").unwrap();
        }
        let past = SystemTime::now() - Duration::from_secs(25 * 60 * 60);
        for p in [&stale, &stale_other, &stale_tmp] {
            std::fs::File::options()
                .write(true)
                .open(p)
                .unwrap()
                .set_modified(past)
                .unwrap();
        }

        assert_eq!(exporter.cleanup_old_files().await, 2);
        assert_eq!(exporter.cleanup_old_files().await, 0);

        assert!(fresh.exists());
        assert!(fresh_tmp.exists());
        assert!(!stale.exists());
        assert!(!stale_tmp.exists());
        assert!(stale_other.exists());
    }

    #[tokio::test]
    async fn cleanup_of_missing_directory_does_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path().join("sub")).unwrap();
        std::fs::remove_dir(exporter.dir()).unwrap();

        assert_eq!(exporter.cleanup_old_files().await, 0);
        assert_eq!(exporter.cleanup_old_files().await, 0);
    }
}
