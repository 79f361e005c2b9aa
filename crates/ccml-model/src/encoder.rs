//! Indicator (one-hot) encoding for categorical columns.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Vocabulary learned for one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct EncodedColumn {
    name: String,
    /// Sorted, distinct.
    categories: Vec<String>,
}

/// Maps categorical values to indicator vectors.
///
/// Each column contributes one output per category seen during fitting. A
/// value that was never seen encodes as all zeros for its column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<EncodedColumn>,
}

impl OneHotEncoder {
    /// Learn the sorted category set of every column from `rows`.
    ///
    /// `rows[i][c]` is the value of column `column_names[c]` in row `i`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::SchemaMismatch`] when a row's width differs from
    /// `column_names.len()`.
    pub fn fit<R: AsRef<[String]>>(column_names: &[&str], rows: &[R]) -> Result<Self, ModelError> {
        let mut seen: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); column_names.len()];
        for row in rows {
            let row: &[String] = row.as_ref();
            if row.len() != column_names.len() {
                return Err(ModelError::SchemaMismatch {
                    what: "categorical feature",
                    expected: column_names.len(),
                    got: row.len(),
                });
            }
            for (set, value) in seen.iter_mut().zip(row) {
                set.insert(value.as_str());
            }
        }

        let columns = column_names
            .iter()
            .zip(seen)
            .map(|(name, set)| EncodedColumn {
                name: (*name).to_string(),
                categories: set.into_iter().map(String::from).collect(),
            })
            .collect();
        Ok(Self { columns })
    }

    /// Append the indicator encoding of `values` to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::SchemaMismatch`] when `values.len()` differs from
    /// the number of fitted columns.
    pub fn transform_into(&self, values: &[String], out: &mut Vec<f64>) -> Result<(), ModelError> {
        if values.len() != self.n_columns() {
            return Err(ModelError::SchemaMismatch {
                what: "categorical feature",
                expected: self.n_columns(),
                got: values.len(),
            });
        }
        for (column, value) in self.columns.iter().zip(values) {
            let hit = column.categories.binary_search(value).ok();
            out.extend((0..column.categories.len()).map(|i| f64::from(u8::from(hit == Some(i)))));
        }
        Ok(())
    }

    /// Indicator encoding of `values` as a fresh vector.
    ///
    /// # Errors
    ///
    /// See [`OneHotEncoder::transform_into`].
    pub fn transform(&self, values: &[String]) -> Result<Vec<f64>, ModelError> {
        let mut out = Vec::with_capacity(self.n_outputs());
        self.transform_into(values, &mut out)?;
        Ok(out)
    }

    /// Output feature names, `"{column}_{category}"`, in encoding order.
    #[must_use]
    pub fn output_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|col| {
                col.categories
                    .iter()
                    .map(move |cat| format!("{}_{}", col.name, cat))
            })
            .collect()
    }

    /// Total number of indicator outputs.
    #[must_use]
    pub fn n_outputs(&self) -> usize {
        self.columns.iter().map(|c| c.categories.len()).sum()
    }

    /// Number of categorical input columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Fitted categories of column `index`, sorted.
    #[must_use]
    pub fn categories(&self, index: usize) -> Option<&[String]> {
        self.columns.get(index).map(|c| c.categories.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn fitted() -> OneHotEncoder {
        let rows = vec![
            row(&["Satisfied", "Sales"]),
            row(&["Neutral", "Banking"]),
            row(&["Satisfied", "Banking"]),
        ];
        OneHotEncoder::fit(&["Survey", "Industry"], &rows).unwrap()
    }

    #[test]
    fn categories_sorted_per_column() {
        let enc = fitted();
        assert_eq!(enc.n_columns(), 2);
        assert_eq!(enc.categories(0).unwrap(), ["Neutral", "Satisfied"]);
        assert_eq!(enc.categories(1).unwrap(), ["Banking", "Sales"]);
        assert_eq!(
            enc.output_names(),
            ["Survey_Neutral", "Survey_Satisfied", "Industry_Banking", "Industry_Sales"]
        );
        assert_eq!(enc.n_outputs(), 4);
    }

    #[test]
    fn known_values_set_one_indicator_per_column() {
        let enc = fitted();
        assert_eq!(
            enc.transform(&row(&["Satisfied", "Banking"])).unwrap(),
            vec![0.0, 1.0, 1.0, 0.0]
        );
    }

    #[test]
    fn unseen_value_encodes_as_zeros() {
        let enc = fitted();
        assert_eq!(
            enc.transform(&row(&["Dissatisfied", "Sales"])).unwrap(),
            vec![0.0, 0.0, 0.0, 1.0]
        );
        assert_eq!(
            enc.transform(&row(&["Dissatisfied", "Tech Support"])).unwrap(),
            vec![0.0; 4]
        );
    }

    #[test]
    fn wrong_width_is_schema_mismatch() {
        let enc = fitted();
        assert!(matches!(
            enc.transform(&row(&["Satisfied"])),
            Err(ModelError::SchemaMismatch { expected: 2, got: 1, .. })
        ));
    }
}
