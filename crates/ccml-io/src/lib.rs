//! Call-center observation records, training CSV input, and JSON report output.

mod domain;
mod error;
mod reader;
mod table;
mod writer;

pub use domain::{
    Industry, Kpi, KpiValues, LABEL_COLUMN, LabeledObservation, MaturityLevel, ModelKey,
    Observation, ParseCategoryError, SurveyResult, Vocabulary,
};
pub use error::IoError;
pub use reader::TrainingReader;
pub use table::{KpiOutOfRange, KpiRange, KpiRanges, TrainingTable};
pub use writer::{ClassReport, ImportanceReport, ReportWriter, TrainingReport};
