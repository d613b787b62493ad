//! Dataset loaders.
//!
//! A dataset is a finite, restartable, ordered sequence of rows. The harness
//! snapshots it once per run, so `rows` may be called more than once and
//! must return the same sequence each time.

use std::path::{Path, PathBuf};

use crate::domain::error::{BenchError, Result};
use crate::domain::row::DatasetRow;

pub trait Dataset: Send + Sync {
    /// Reference recorded in the run artifact.
    fn name(&self) -> &str;

    fn rows(&self) -> Result<Vec<DatasetRow>>;
}

/// Rows held in memory.
#[derive(Debug, Clone)]
pub struct VecDataset {
    name: String,
    rows: Vec<DatasetRow>,
}

impl VecDataset {
    pub fn new(name: &str, rows: Vec<DatasetRow>) -> Self {
        Self {
            name: name.to_string(),
            rows,
        }
    }

    /// Build from (input, expected) pairs; row ids are 1-based positions.
    pub fn from_pairs<I, S>(name: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let rows = pairs
            .into_iter()
            .enumerate()
            .map(|(i, (input, expected))| {
                DatasetRow::new(&(i + 1).to_string(), input.as_ref(), expected.as_ref())
            })
            .collect();
        Self::new(name, rows)
    }
}

impl Dataset for VecDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn rows(&self) -> Result<Vec<DatasetRow>> {
        Ok(self.rows.clone())
    }
}

/// CSV file with a header row.
///
/// One column holds the informal input and one the expected answer. Row ids
/// come from `id_column` when set, otherwise the 1-based data row position.
#[derive(Debug, Clone)]
pub struct CsvDataset {
    path: PathBuf,
    name: String,
    input_column: String,
    expected_column: String,
    id_column: Option<String>,
}

impl CsvDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self {
            path,
            name,
            input_column: "input".to_string(),
            expected_column: "expected".to_string(),
            id_column: None,
        }
    }

    pub fn with_columns(mut self, input: &str, expected: &str) -> Self {
        self.input_column = input.to_string();
        self.expected_column = expected.to_string();
        self
    }

    pub fn with_id_column(mut self, column: &str) -> Self {
        self.id_column = Some(column.to_string());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn column_index(&self, headers: &csv::StringRecord, column: &str) -> Result<usize> {
        headers.iter().position(|h| h.trim() == column).ok_or_else(|| {
            BenchError::Dataset(format!(
                "{}: missing column {:?}",
                self.path.display(),
                column
            ))
        })
    }
}

impl Dataset for CsvDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn rows(&self) -> Result<Vec<DatasetRow>> {
        let dataset_error = |e: csv::Error| {
            BenchError::Dataset(format!("{}: {}", self.path.display(), e))
        };

        let mut reader = csv::Reader::from_path(&self.path).map_err(dataset_error)?;
        let headers = reader.headers().map_err(dataset_error)?.clone();

        let input_idx = self.column_index(&headers, &self.input_column)?;
        let expected_idx = self.column_index(&headers, &self.expected_column)?;
        let id_idx = self
            .id_column
            .as_deref()
            .map(|c| self.column_index(&headers, c))
            .transpose()?;

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(dataset_error)?;
            let field = |idx: usize| record.get(idx).unwrap_or_default();
            let row_id = match id_idx {
                Some(idx) => field(idx).to_string(),
                None => (i + 1).to_string(),
            };
            rows.push(DatasetRow::new(&row_id, field(input_idx), field(expected_idx)));
        }

        let mut seen = std::collections::HashSet::new();
        for row in &rows {
            if !seen.insert(row.row_id.as_str()) {
                return Err(BenchError::Dataset(format!(
                    "{}: duplicate row id {:?}",
                    self.path.display(),
                    row.row_id
                )));
            }
        }

        tracing::debug!(path = %self.path.display(), rows = rows.len(), "dataset loaded");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn from_pairs_assigns_positional_ids() {
        let ds = VecDataset::from_pairs("mem", [("Tylenol", "Acetaminophen"), ("Advil", "Ibuprofen")]);
        let rows = ds.rows().unwrap();
        assert_eq!(rows[0], DatasetRow::new("1", "Tylenol", "Acetaminophen"));
        assert_eq!(rows[1].row_id, "2");
    }

    #[test]
    fn csv_default_columns_keep_file_order() {
        let file = write_csv("expected,input\nAcetaminophen,Tylenol\nIbuprofen,\"Advil, 200mg\"\n");
        let ds = CsvDataset::new(file.path());

        let rows = ds.rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], DatasetRow::new("1", "Tylenol", "Acetaminophen"));
        assert_eq!(rows[1], DatasetRow::new("2", "Advil, 200mg", "Ibuprofen"));
        // restartable
        assert_eq!(ds.rows().unwrap(), rows);
    }

    #[test]
    fn csv_custom_and_id_columns() {
        let file = write_csv("id,informal,formal\nrx-7,Motrin,Ibuprofen\n");
        let ds = CsvDataset::new(file.path())
            .with_columns("informal", "formal")
            .with_id_column("id");

        let rows = ds.rows().unwrap();
        assert_eq!(rows, vec![DatasetRow::new("rx-7", "Motrin", "Ibuprofen")]);
    }

    #[test]
    fn csv_missing_column_is_dataset_error() {
        let file = write_csv("name,answer\nTylenol,Acetaminophen\n");
        let err = CsvDataset::new(file.path()).rows().unwrap_err();
        assert!(matches!(err, BenchError::Dataset(msg) if msg.contains("input")));
    }

    #[test]
    fn csv_duplicate_ids_rejected() {
        let file = write_csv("id,input,expected\n1,a,b\n1,c,d\n");
        let err = CsvDataset::new(file.path()).with_id_column("id").rows().unwrap_err();
        assert!(matches!(err, BenchError::Dataset(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn csv_missing_file_is_dataset_error() {
        let err = CsvDataset::new("/nonexistent/rows.csv").rows().unwrap_err();
        assert!(matches!(err, BenchError::Dataset(_)));
    }
}
