//! Feature rows and the numeric pass-through plus indicator transform.

use ccml_io::{Industry, Kpi, Observation, SurveyResult, Vocabulary};
use serde::{Deserialize, Serialize};

use crate::encoder::OneHotEncoder;
use crate::error::ModelError;

/// Categorical column names, in encoding order.
pub const CATEGORICAL_COLUMNS: [&str; 2] = [SurveyResult::COLUMN, Industry::COLUMN];

/// A raw feature row as consumed by a bundle.
///
/// Typed [`Observation`]s convert losslessly; the loose shape lets a caller
/// present rows from another source and have their width checked.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Numeric values in [`Kpi::ALL`] order.
    pub numeric: Vec<f64>,
    /// Categorical values in [`CATEGORICAL_COLUMNS`] order.
    pub categorical: Vec<String>,
}

impl From<&Observation> for FeatureRow {
    fn from(obs: &Observation) -> Self {
        Self {
            numeric: obs.kpis.to_vec(),
            categorical: vec![
                obs.survey_result.label().to_string(),
                obs.industry.label().to_string(),
            ],
        }
    }
}

/// Passes numeric features through and appends categorical indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    numeric_names: Vec<String>,
    encoder: OneHotEncoder,
}

impl Preprocessor {
    /// Fit the indicator vocabulary on `rows`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::SchemaMismatch`] when a row has the wrong
    /// numeric or categorical width.
    pub fn fit(rows: &[FeatureRow]) -> Result<Self, ModelError> {
        let numeric_names: Vec<String> = Kpi::ALL.iter().map(|k| k.column().to_string()).collect();
        if let Some(row) = rows.iter().find(|r| r.numeric.len() != numeric_names.len()) {
            return Err(ModelError::SchemaMismatch {
                what: "numeric feature",
                expected: numeric_names.len(),
                got: row.numeric.len(),
            });
        }
        let categorical: Vec<&[String]> = rows.iter().map(|r| r.categorical.as_slice()).collect();
        let encoder = OneHotEncoder::fit(&CATEGORICAL_COLUMNS, &categorical)?;
        Ok(Self {
            numeric_names,
            encoder,
        })
    }

    /// Encode one row as `[numeric..., indicators...]`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::SchemaMismatch`] | wrong numeric or categorical count |
    /// | [`ModelError::NonFiniteInput`] | a numeric value is NaN or infinite |
    pub fn transform(&self, row: &FeatureRow) -> Result<Vec<f64>, ModelError> {
        if row.numeric.len() != self.numeric_names.len() {
            return Err(ModelError::SchemaMismatch {
                what: "numeric feature",
                expected: self.numeric_names.len(),
                got: row.numeric.len(),
            });
        }
        if let Some(index) = row.numeric.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFiniteInput {
                index,
                name: self.numeric_names[index].clone(),
            });
        }
        let mut out = Vec::with_capacity(self.n_outputs());
        out.extend_from_slice(&row.numeric);
        self.encoder.transform_into(&row.categorical, &mut out)?;
        Ok(out)
    }

    /// Names of every output feature, numeric first.
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.numeric_names.clone();
        names.extend(self.encoder.output_names());
        names
    }

    /// Number of numeric inputs expected.
    #[must_use]
    pub fn n_numeric(&self) -> usize {
        self.numeric_names.len()
    }

    /// Width of the encoded vector.
    #[must_use]
    pub fn n_outputs(&self) -> usize {
        self.numeric_names.len() + self.encoder.n_outputs()
    }

    /// The fitted indicator encoder.
    #[must_use]
    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccml_io::KpiValues;

    fn obs(survey: SurveyResult, industry: Industry) -> Observation {
        Observation {
            kpis: KpiValues::from_fn(|kpi| kpi.index() as f64),
            survey_result: survey,
            industry,
        }
    }

    fn fitted() -> Preprocessor {
        let rows: Vec<FeatureRow> = [
            obs(SurveyResult::Satisfied, Industry::Banking),
            obs(SurveyResult::Neutral, Industry::Sales),
        ]
        .iter()
        .map(FeatureRow::from)
        .collect();
        Preprocessor::fit(&rows).unwrap()
    }

    #[test]
    fn numeric_first_then_indicators() {
        let pre = fitted();
        let x = pre
            .transform(&FeatureRow::from(&obs(SurveyResult::Neutral, Industry::Banking)))
            .unwrap();
        assert_eq!(x.len(), 13);
        assert_eq!(&x[..9], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(&x[9..], &[1.0, 0.0, 1.0, 0.0]);
        assert_eq!(pre.feature_names()[9], "Medallia Survey Result_Neutral");
        assert_eq!(pre.feature_names()[12], "Industry_Sales");
    }

    #[test]
    fn category_missing_from_fit_is_zero_block() {
        let pre = fitted();
        let x = pre
            .transform(&FeatureRow::from(&obs(
                SurveyResult::Dissatisfied,
                Industry::TechSupport,
            )))
            .unwrap();
        assert_eq!(&x[9..], &[0.0; 4]);
    }

    #[test]
    fn short_numeric_row_is_schema_mismatch() {
        let pre = fitted();
        let mut row = FeatureRow::from(&obs(SurveyResult::Neutral, Industry::Sales));
        row.numeric.pop();
        assert!(matches!(
            pre.transform(&row),
            Err(ModelError::SchemaMismatch { what: "numeric feature", expected: 9, got: 8 })
        ));
    }

    #[test]
    fn nan_input_rejected() {
        let pre = fitted();
        let mut row = FeatureRow::from(&obs(SurveyResult::Neutral, Industry::Sales));
        row.numeric[3] = f64::NAN;
        match pre.transform(&row) {
            Err(ModelError::NonFiniteInput { index, name }) => {
                assert_eq!(index, 3);
                assert_eq!(name, "CSAT (%)");
            }
            other => panic!("expected NonFiniteInput, got {other:?}"),
        }
    }
}
