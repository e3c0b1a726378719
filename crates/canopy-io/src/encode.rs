//! Target factorization and one-hot encoding of categorical predictors.

use std::collections::HashMap;

use tracing::{debug, info, instrument};

use crate::TableError;
use crate::domain::{Column, Dataset, EncodedTable};

/// Which column holds the class label.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetColumn {
    /// The rightmost column.
    #[default]
    Last,
    /// The column with this header name.
    Named(String),
}

/// Turns a [`Dataset`] into a numeric [`EncodedTable`].
///
/// - The target column is factorized: each distinct value gets the next code
///   in first-seen order.
/// - Each categorical predictor is replaced, in place, by one 0/1 indicator
///   column per distinct value, named `{column}_{value}`, in first-seen order.
/// - Numeric predictors pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    target: TargetColumn,
    excluded: Vec<String>,
}

impl Encoder {
    pub fn new(target: TargetColumn) -> Self {
        Self {
            target,
            excluded: Vec::new(),
        }
    }

    /// Drop these columns before encoding (row ids and the like).
    #[must_use]
    pub fn with_excluded<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(names.into_iter().map(Into::into));
        self
    }

    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TableError::UnknownColumn`] | The target or an excluded name is not a column |
    /// | [`TableError::NoFeatureColumns`] | Nothing is left besides the target |
    #[instrument(skip_all, fields(n_rows = dataset.n_rows(), n_columns = dataset.n_columns()))]
    pub fn encode(&self, dataset: &Dataset) -> Result<EncodedTable, TableError> {
        let target_idx = match &self.target {
            TargetColumn::Last => dataset
                .n_columns()
                .checked_sub(1)
                .ok_or(TableError::NoFeatureColumns)?,
            TargetColumn::Named(name) => dataset
                .position(name)
                .ok_or_else(|| TableError::UnknownColumn { name: name.clone() })?,
        };

        let mut skip = vec![false; dataset.n_columns()];
        skip[target_idx] = true;
        for name in &self.excluded {
            let idx = dataset
                .position(name)
                .ok_or_else(|| TableError::UnknownColumn { name: name.clone() })?;
            skip[idx] = true;
        }
        if skip.iter().all(|&s| s) {
            return Err(TableError::NoFeatureColumns);
        }

        let n_rows = dataset.n_rows();
        let target_column = &dataset.columns()[target_idx];
        let target_text: Vec<String> = (0..n_rows).map(|r| target_column.text_at(r)).collect();
        let (target, target_codes) = factorize(&target_text);

        let mut features: Vec<Vec<f64>> = vec![Vec::new(); n_rows];
        let mut feature_names = Vec::new();

        for (idx, (name, column)) in dataset
            .column_names()
            .iter()
            .zip(dataset.columns())
            .enumerate()
        {
            if skip[idx] {
                continue;
            }
            match column {
                Column::Numeric(values) => {
                    feature_names.push(name.clone());
                    for (row, &v) in features.iter_mut().zip(values) {
                        row.push(v);
                    }
                }
                Column::Categorical(values) => {
                    let (codes, levels) = factorize(values);
                    debug!(column = %name, n_levels = levels.len(), "one-hot expanding");
                    for level in &levels {
                        feature_names.push(format!("{name}_{level}"));
                    }
                    for (row, &code) in features.iter_mut().zip(&codes) {
                        row.extend((0..levels.len()).map(|l| if l == code { 1.0 } else { 0.0 }));
                    }
                }
            }
        }

        info!(
            n_rows,
            n_features = feature_names.len(),
            n_classes = target_codes.len(),
            "table encoded"
        );

        Ok(EncodedTable {
            features,
            target,
            feature_names,
            target_codes,
        })
    }
}

/// Map each value to the index of its first appearance among distinct values.
fn factorize(values: &[String]) -> (Vec<usize>, Vec<String>) {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut levels: Vec<String> = Vec::new();
    let codes = values
        .iter()
        .map(|v| {
            *index.entry(v.as_str()).or_insert_with(|| {
                levels.push(v.clone());
                levels.len() - 1
            })
        })
        .collect();
    (codes, levels)
}
