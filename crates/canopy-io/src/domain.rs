//! Domain types for canopy-io.

/// One typed column of a loaded table.
///
/// The type is fixed at load time: a column is numeric when every cell parses
/// as a finite `f64`, otherwise it keeps its raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Every cell parsed as a finite number.
    Numeric(Vec<f64>),
    /// At least one cell was not a finite number.
    Categorical(Vec<String>),
}

impl Column {
    /// Number of cells in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Categorical(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    /// The cell at `row` rendered as text, as it would appear in the file.
    pub(crate) fn text_at(&self, row: usize) -> String {
        match self {
            Column::Numeric(values) => values[row].to_string(),
            Column::Categorical(values) => values[row].clone(),
        }
    }
}

/// A loaded table: header names plus one typed column per name.
///
/// Produced by [`TableReader`](crate::TableReader). `column_names[i]` names
/// `columns[i]`, and every column has `n_rows()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    column_names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    pub(crate) fn new(column_names: Vec<String>, columns: Vec<Column>, n_rows: usize) -> Self {
        debug_assert_eq!(column_names.len(), columns.len());
        debug_assert!(columns.iter().all(|c| c.len() == n_rows));
        Self {
            column_names,
            columns,
            n_rows,
        }
    }

    /// Header names in file order.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Columns in file order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by header name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    /// Zero-based position of the column called `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|n| n == name)
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }
}

/// A dataset turned into a numeric feature matrix and class codes.
///
/// Produced by [`Encoder`](crate::Encoder). `features[i]` and `target[i]`
/// describe row `i` of the source table.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTable {
    /// Feature matrix, `features[row][feature]`.
    pub features: Vec<Vec<f64>>,
    /// Zero-based class code per row.
    pub target: Vec<usize>,
    /// Name of each feature column, after one-hot expansion.
    pub feature_names: Vec<String>,
    /// Source text of each class code: `target_codes[code]`.
    pub target_codes: Vec<String>,
}

impl EncodedTable {
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.target.len()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.target_codes.len()
    }
}
