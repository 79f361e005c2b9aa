//! CSV training data reader with column mapping by header name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{
    Industry, Kpi, KpiValues, LABEL_COLUMN, LabeledObservation, MaturityLevel, Observation,
    ParseCategoryError, SurveyResult, Vocabulary,
};
use crate::table::TrainingTable;

/// Field positions of every required column, resolved once from the header.
#[derive(Debug)]
struct ColumnMap {
    kpis: [usize; 9],
    survey_result: usize,
    industry: usize,
    label: usize,
}

impl ColumnMap {
    fn required() -> impl Iterator<Item = &'static str> {
        Kpi::ALL
            .iter()
            .map(|kpi| kpi.column())
            .chain([SurveyResult::COLUMN, Industry::COLUMN, LABEL_COLUMN])
    }

    fn resolve(path: &Path, header: &csv::StringRecord) -> Result<Self, IoError> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (i, name) in header.iter().enumerate() {
            if positions.insert(name, i).is_some() && Self::required().any(|r| r == name) {
                return Err(IoError::DuplicateColumn {
                    path: path.to_path_buf(),
                    column: name.to_string(),
                });
            }
        }

        let missing: Vec<String> = Self::required()
            .filter(|name| !positions.contains_key(name))
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(IoError::MissingColumns {
                path: path.to_path_buf(),
                missing,
            });
        }

        let at = |name: &str| positions[name];
        Ok(Self {
            kpis: Kpi::ALL.map(|kpi| at(kpi.column())),
            survey_result: at(SurveyResult::COLUMN),
            industry: at(Industry::COLUMN),
            label: at(LABEL_COLUMN),
        })
    }
}

/// Reads labeled call-center observations from a CSV file.
///
/// Expected CSV format:
/// - Header row required; columns are matched by exact name, in any order
/// - The nine KPI columns, `Medallia Survey Result`, `Industry` and
///   `Maturity Level` must all be present; other columns are ignored
/// - One observation per row, all rows with the same number of fields
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::MissingColumns`] | One or more required columns absent |
/// | [`IoError::DuplicateColumn`] | A required column named twice |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different field count than header |
/// | [`IoError::InvalidNumber`] | KPI cell is NaN, Inf, or unparseable |
/// | [`IoError::UnknownCategory`] | Survey result or industry outside its vocabulary |
/// | [`IoError::EmptyLabel`] | Blank maturity level |
pub struct TrainingReader {
    path: PathBuf,
}

impl TrainingReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the CSV file, returning a [`TrainingTable`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<TrainingTable, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) so short or long rows surface as InconsistentRowLength.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?.clone();
        let expected = header.len();
        let columns = ColumnMap::resolve(&self.path, &header)?;
        debug!(expected, "resolved CSV header");

        let mut rows = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            if record.len() != expected {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected,
                    got: record.len(),
                });
            }
            rows.push(self.parse_row(&columns, &record, row_index)?);
        }

        if rows.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        let table = TrainingTable::new(rows);
        info!(
            n_samples = table.n_samples(),
            n_labels = table.distinct_labels().len(),
            "training table loaded"
        );
        Ok(table)
    }

    fn parse_row(
        &self,
        columns: &ColumnMap,
        record: &csv::StringRecord,
        row_index: usize,
    ) -> Result<LabeledObservation, IoError> {
        let cell = |i: usize| record.get(i).unwrap_or("");

        let mut numeric = [0.0f64; 9];
        for ((slot, &col), kpi) in numeric.iter_mut().zip(&columns.kpis).zip(Kpi::ALL) {
            let raw = cell(col);
            *slot = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| IoError::InvalidNumber {
                    path: self.path.clone(),
                    row_index,
                    column: kpi.column(),
                    raw: raw.to_string(),
                })?;
        }

        let category = |source: ParseCategoryError| IoError::UnknownCategory {
            path: self.path.clone(),
            row_index,
            source,
        };
        let survey_result =
            SurveyResult::parse_label(cell(columns.survey_result)).map_err(category)?;
        let industry = Industry::parse_label(cell(columns.industry)).map_err(category)?;

        let label = cell(columns.label).trim();
        if label.is_empty() {
            return Err(IoError::EmptyLabel {
                path: self.path.clone(),
                row_index,
                column: LABEL_COLUMN,
            });
        }

        Ok(LabeledObservation {
            observation: Observation {
                kpis: KpiValues::from_fn(|kpi| numeric[kpi.index()]),
                survey_result,
                industry,
            },
            maturity_level: MaturityLevel::new(label),
        })
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "AHT (min),NTT (min),Cross Talk (%),CSAT (%),Sentiment Score,NPS Score,FCR (%),Avg Speed of Answer (sec),Abandonment Rate (%),Medallia Survey Result,Industry,Maturity Level";

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    fn read(content: &str) -> Result<TrainingTable, IoError> {
        let f = write_csv(content);
        TrainingReader::new(f.path()).read()
    }

    #[test]
    fn reads_valid_rows() {
        let csv = format!(
            "{HEADER}\n\
             5.1,4.0,3.2,88,0.6,42,75,20,3.1,Satisfied,Banking,High\n\
             9.8,8.5,7.9,61,-0.2,-5,48,95,12.4,Dissatisfied,Tech Support,Low\n"
        );
        let table = read(&csv).unwrap();
        assert_eq!(table.n_samples(), 2);
        let first = &table.rows()[0];
        assert_eq!(first.observation.kpis.get(Kpi::Csat), 88.0);
        assert_eq!(first.observation.industry, Industry::Banking);
        assert_eq!(first.maturity_level.as_str(), "High");
        assert_eq!(table.rows()[1].observation.industry, Industry::TechSupport);
        assert_eq!(table.rows()[1].observation.kpis.nps_score, -5.0);
    }

    #[test]
    fn columns_matched_by_name_in_any_order() {
        let csv = "Maturity Level,Industry,Notes,Medallia Survey Result,Abandonment Rate (%),Avg Speed of Answer (sec),FCR (%),NPS Score,Sentiment Score,CSAT (%),Cross Talk (%),NTT (min),AHT (min)\n\
                   Medium,Sales,ignored,Neutral,9,8,7,6,5,4,3,2,1\n";
        let table = read(csv).unwrap();
        let kpis = table.rows()[0].observation.kpis;
        assert_eq!(kpis.to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(table.rows()[0].observation.survey_result, SurveyResult::Neutral);
    }

    #[test]
    fn missing_columns_are_all_listed() {
        let csv = "AHT (min),NTT (min),Industry\n1,2,Sales\n";
        match read(csv) {
            Err(IoError::MissingColumns { missing, .. }) => {
                assert_eq!(missing.len(), 9);
                assert!(missing.iter().any(|m| m == "CSAT (%)"));
                assert!(missing.iter().any(|m| m == "Maturity Level"));
                assert!(!missing.iter().any(|m| m == "Industry"));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn header_only_is_empty_dataset() {
        assert!(matches!(
            read(&format!("{HEADER}\n")),
            Err(IoError::EmptyDataset { .. })
        ));
    }

    #[test]
    fn nan_and_text_values_rejected() {
        for bad in ["NaN", "abc", "inf", ""] {
            let csv = format!("{HEADER}\n1,2,3,{bad},5,6,7,8,9,Satisfied,Sales,High\n");
            match read(&csv) {
                Err(IoError::InvalidNumber { column, row_index, .. }) => {
                    assert_eq!(column, "CSAT (%)");
                    assert_eq!(row_index, 0);
                }
                other => panic!("{bad:?}: expected InvalidNumber, got {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_category_rejected() {
        let csv = format!("{HEADER}\n1,2,3,4,5,6,7,8,9,Satisfied,Retail,High\n");
        match read(&csv) {
            Err(IoError::UnknownCategory { source, .. }) => {
                assert_eq!(source.column, "Industry");
                assert_eq!(source.value, "Retail");
            }
            other => panic!("expected UnknownCategory, got {other:?}"),
        }
    }

    #[test]
    fn blank_label_rejected() {
        let csv = format!("{HEADER}\n1,2,3,4,5,6,7,8,9,Satisfied,Sales,  \n");
        assert!(matches!(read(&csv), Err(IoError::EmptyLabel { row_index: 0, .. })));
    }

    #[test]
    fn inconsistent_row_length() {
        let csv = format!("{HEADER}\n1,2,3,4,5,6,7,8,9,Satisfied,Sales\n");
        assert!(matches!(
            read(&csv),
            Err(IoError::InconsistentRowLength { expected: 12, got: 11, .. })
        ));
    }

    #[test]
    fn duplicate_required_column_rejected() {
        let csv = format!("{HEADER},Industry\n1,2,3,4,5,6,7,8,9,Satisfied,Sales,High,Banking\n");
        assert!(matches!(read(&csv), Err(IoError::DuplicateColumn { .. })));
    }

    #[test]
    fn missing_file_reported() {
        let reader = TrainingReader::new(Path::new("/nonexistent/calls.csv"));
        assert!(matches!(reader.read(), Err(IoError::FileNotFound { .. })));
    }
}
