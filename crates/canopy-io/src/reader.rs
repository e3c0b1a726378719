//! Delimited table reader with per-column type inference.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::TableError;
use crate::domain::{Column, Dataset};

const BOM: char = '\u{feff}';

/// Reads a delimited text table with a header row.
///
/// - The first non-empty line names the columns.
/// - Every data row must have as many cells as the header.
/// - Cells are trimmed; a leading UTF-8 byte-order mark is ignored.
/// - A column whose cells all parse as finite numbers becomes
///   [`Column::Numeric`], anything else [`Column::Categorical`].
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`TableError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`TableError::CsvParse`] | Malformed record (bad quoting, invalid UTF-8) |
/// | [`TableError::MissingHeader`] | File is empty |
/// | [`TableError::InconsistentRowLength`] | Row has a different cell count than the header |
#[derive(Debug, Clone)]
pub struct TableReader {
    path: PathBuf,
    delimiter: u8,
}

impl TableReader {
    /// Create a comma-delimited reader for the given path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            delimiter: b',',
        }
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read the file into a typed [`Dataset`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Dataset, TableError> {
        let file = std::fs::File::open(&self.path).map_err(|e| TableError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets our own InconsistentRowLength check report the
        // row instead of a generic CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .delimiter(self.delimiter)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.parse_error(e))?;
        if header.is_empty() {
            return Err(TableError::MissingHeader {
                path: self.path.clone(),
            });
        }
        let column_names: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(i, name)| {
                if i == 0 {
                    name.trim_start_matches(BOM).trim().to_string()
                } else {
                    name.to_string()
                }
            })
            .collect();
        let n_columns = column_names.len();
        debug!(n_columns, "read header");

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); n_columns];
        let mut n_rows = 0;
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.parse_error(e))?;
            if record.len() != n_columns {
                return Err(TableError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: n_columns,
                    got: record.len(),
                });
            }
            for (column, value) in cells.iter_mut().zip(record.iter()) {
                column.push(value.to_string());
            }
            n_rows += 1;
        }

        let columns: Vec<Column> = cells.into_iter().map(infer_column).collect();
        let n_numeric = columns.iter().filter(|c| c.is_numeric()).count();

        info!(
            n_rows,
            n_columns,
            n_numeric,
            n_categorical = n_columns - n_numeric,
            "table loaded"
        );

        Ok(Dataset::new(column_names, columns, n_rows))
    }

    fn parse_error(&self, e: csv::Error) -> TableError {
        TableError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

/// Numeric iff every cell is a finite float; an empty column counts as numeric.
fn infer_column(raw: Vec<String>) -> Column {
    let parsed: Option<Vec<f64>> = raw
        .iter()
        .map(|cell| cell.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();
    match parsed {
        Some(values) => Column::Numeric(values),
        None => Column::Categorical(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_table(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn numeric_and_categorical_columns() {
        let f = write_table("age,sex,target\n63,male,1\n37,female,0\n41,female,0\n");
        let ds = TableReader::new(f.path()).read().unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.column_names(), &["age", "sex", "target"]);
        assert_eq!(ds.columns()[0], Column::Numeric(vec![63.0, 37.0, 41.0]));
        assert!(matches!(&ds.columns()[1], Column::Categorical(v) if v[1] == "female"));
        assert!(ds.columns()[2].is_numeric());
    }

    #[test]
    fn one_bad_cell_makes_column_categorical() {
        let f = write_table("a,b\n1,2\n?,3\n");
        let ds = TableReader::new(f.path()).read().unwrap();
        assert_eq!(
            ds.columns()[0],
            Column::Categorical(vec!["1".into(), "?".into()])
        );
        assert!(ds.columns()[1].is_numeric());
    }

    #[test]
    fn non_finite_text_is_categorical() {
        let f = write_table("a\nNaN\ninf\n");
        let ds = TableReader::new(f.path()).read().unwrap();
        assert!(!ds.columns()[0].is_numeric());
    }

    #[test]
    fn header_only_gives_zero_rows() {
        let f = write_table("age,sex,target\n");
        let ds = TableReader::new(f.path()).read().unwrap();
        assert_eq!(ds.n_rows(), 0);
        assert_eq!(ds.n_columns(), 3);
        assert!(ds.columns().iter().all(|c| c.is_numeric() && c.is_empty()));
    }

    #[test]
    fn custom_delimiter_and_trimming() {
        let f = write_table("x ; y\n 1.5 ; a \n2 ; b\n");
        let ds = TableReader::new(f.path())
            .with_delimiter(b';')
            .read()
            .unwrap();
        assert_eq!(ds.column_names(), &["x", "y"]);
        assert_eq!(ds.columns()[0], Column::Numeric(vec![1.5, 2.0]));
        assert_eq!(
            ds.columns()[1],
            Column::Categorical(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let f = write_table("\u{feff}id,label\n1,x\n");
        let ds = TableReader::new(f.path()).read().unwrap();
        assert_eq!(ds.column_names()[0], "id");
        assert!(ds.column("id").is_some());
    }

    #[test]
    fn error_file_not_found() {
        let result = TableReader::new(Path::new("/nonexistent/file.csv")).read();
        assert!(matches!(result, Err(TableError::FileNotFound { .. })));
    }

    #[test]
    fn error_missing_header() {
        let f = write_table("");
        let result = TableReader::new(f.path()).read();
        assert!(matches!(result, Err(TableError::MissingHeader { .. })));
    }

    #[test]
    fn error_inconsistent_row_length() {
        let f = write_table("a,b,c\n1,2,3\n1,2\n");
        let result = TableReader::new(f.path()).read();
        assert!(matches!(
            result,
            Err(TableError::InconsistentRowLength {
                row_index: 1,
                expected: 3,
                got: 2,
                ..
            })
        ));
    }

    #[test]
    fn error_invalid_utf8() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"a,b\n1,\xff\xfe\n").unwrap();
        f.flush().unwrap();
        let result = TableReader::new(f.path()).read();
        assert!(matches!(result, Err(TableError::CsvParse { .. })));
    }
}
