//! Domain types for ccml-io.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::IoError;

/// Header of the label column in the training CSV.
pub const LABEL_COLUMN: &str = "Maturity Level";

/// The nine numeric call-center KPIs, in model feature order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kpi {
    /// Average handling time, minutes.
    Aht,
    /// Non-talk time, minutes.
    Ntt,
    /// Share of the call with both parties speaking, percent.
    CrossTalk,
    /// Customer satisfaction, percent.
    Csat,
    /// Sentiment score.
    Sentiment,
    /// Net promoter score.
    Nps,
    /// First call resolution, percent.
    Fcr,
    /// Average speed of answer, seconds.
    Asa,
    /// Abandonment rate, percent.
    AbandonmentRate,
}

impl Kpi {
    /// Every KPI in feature order.
    pub const ALL: [Kpi; 9] = [
        Kpi::Aht,
        Kpi::Ntt,
        Kpi::CrossTalk,
        Kpi::Csat,
        Kpi::Sentiment,
        Kpi::Nps,
        Kpi::Fcr,
        Kpi::Asa,
        Kpi::AbandonmentRate,
    ];

    /// Exact CSV header name.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Kpi::Aht => "AHT (min)",
            Kpi::Ntt => "NTT (min)",
            Kpi::CrossTalk => "Cross Talk (%)",
            Kpi::Csat => "CSAT (%)",
            Kpi::Sentiment => "Sentiment Score",
            Kpi::Nps => "NPS Score",
            Kpi::Fcr => "FCR (%)",
            Kpi::Asa => "Avg Speed of Answer (sec)",
            Kpi::AbandonmentRate => "Abandonment Rate (%)",
        }
    }

    /// Human-readable label for input widgets.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Kpi::Aht => "Average Handling Time (AHT, min)",
            Kpi::Ntt => "Non-Talk Time (NTT, min)",
            Kpi::CrossTalk => "Cross Talk (%)",
            Kpi::Csat => "Customer Satisfaction (CSAT, %)",
            Kpi::Sentiment => "Sentiment Score",
            Kpi::Nps => "Net Promoter Score (NPS)",
            Kpi::Fcr => "First Call Resolution (FCR, %)",
            Kpi::Asa => "Average Speed of Answer (sec)",
            Kpi::AbandonmentRate => "Abandonment Rate (%)",
        }
    }

    /// Field name used in JSON bodies and form submissions.
    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            Kpi::Aht => "aht_min",
            Kpi::Ntt => "ntt_min",
            Kpi::CrossTalk => "cross_talk_pct",
            Kpi::Csat => "csat_pct",
            Kpi::Sentiment => "sentiment_score",
            Kpi::Nps => "nps_score",
            Kpi::Fcr => "fcr_pct",
            Kpi::Asa => "asa_sec",
            Kpi::AbandonmentRate => "abandonment_rate_pct",
        }
    }

    /// Position of this KPI in [`Kpi::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Kpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A value rejected by one of the closed categorical vocabularies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{value}\" is not a valid {column} (expected one of: {})", expected.join(", "))]
pub struct ParseCategoryError {
    /// Column whose vocabulary rejected the value.
    pub column: &'static str,
    /// The rejected text.
    pub value: String,
    /// Accepted labels.
    pub expected: Vec<&'static str>,
}

/// A closed set of categorical values with stable display labels.
pub trait Vocabulary: Copy + Sized + 'static {
    /// Exact CSV header name.
    const COLUMN: &'static str;

    /// Every member, in display order.
    const ALL: &'static [Self];

    /// Display label, also the value stored in the CSV.
    fn label(self) -> &'static str;

    /// Match trimmed `raw` against the member labels.
    ///
    /// # Errors
    ///
    /// Returns [`ParseCategoryError`] when no label matches exactly.
    fn parse_label(raw: &str) -> Result<Self, ParseCategoryError> {
        let trimmed = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|member| member.label() == trimmed)
            .ok_or_else(|| ParseCategoryError {
                column: Self::COLUMN,
                value: trimmed.to_string(),
                expected: Self::ALL.iter().map(|m| m.label()).collect(),
            })
    }
}

/// Outcome of the customer survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurveyResult {
    /// Customer reported being satisfied.
    Satisfied,
    /// Customer reported no strong opinion.
    Neutral,
    /// Customer reported being dissatisfied.
    Dissatisfied,
}

impl Vocabulary for SurveyResult {
    const COLUMN: &'static str = "Medallia Survey Result";
    const ALL: &'static [Self] = &[
        SurveyResult::Satisfied,
        SurveyResult::Neutral,
        SurveyResult::Dissatisfied,
    ];

    fn label(self) -> &'static str {
        match self {
            SurveyResult::Satisfied => "Satisfied",
            SurveyResult::Neutral => "Neutral",
            SurveyResult::Dissatisfied => "Dissatisfied",
        }
    }
}

/// Industry the call center serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Industry {
    /// Healthcare.
    Healthcare,
    /// Banking.
    Banking,
    /// Utilities.
    Utilities,
    /// Sales.
    Sales,
    /// Technical support.
    #[serde(rename = "Tech Support")]
    TechSupport,
}

impl Vocabulary for Industry {
    const COLUMN: &'static str = "Industry";
    const ALL: &'static [Self] = &[
        Industry::Healthcare,
        Industry::Banking,
        Industry::Utilities,
        Industry::Sales,
        Industry::TechSupport,
    ];

    fn label(self) -> &'static str {
        match self {
            Industry::Healthcare => "Healthcare",
            Industry::Banking => "Banking",
            Industry::Utilities => "Utilities",
            Industry::Sales => "Sales",
            Industry::TechSupport => "Tech Support",
        }
    }
}

macro_rules! vocabulary_traits {
    ($($ty:ty),*) => {$(
        impl FromStr for $ty {
            type Err = ParseCategoryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty as Vocabulary>::parse_label(s)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    )*};
}

vocabulary_traits!(SurveyResult, Industry);

/// The nine KPI readings of one call-center observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiValues {
    /// `AHT (min)`.
    pub aht_min: f64,
    /// `NTT (min)`.
    pub ntt_min: f64,
    /// `Cross Talk (%)`.
    pub cross_talk_pct: f64,
    /// `CSAT (%)`.
    pub csat_pct: f64,
    /// `Sentiment Score`.
    pub sentiment_score: f64,
    /// `NPS Score`.
    pub nps_score: f64,
    /// `FCR (%)`.
    pub fcr_pct: f64,
    /// `Avg Speed of Answer (sec)`.
    pub asa_sec: f64,
    /// `Abandonment Rate (%)`.
    pub abandonment_rate_pct: f64,
}

impl KpiValues {
    /// Build values by evaluating `f` for each KPI.
    pub fn from_fn(mut f: impl FnMut(Kpi) -> f64) -> Self {
        Self {
            aht_min: f(Kpi::Aht),
            ntt_min: f(Kpi::Ntt),
            cross_talk_pct: f(Kpi::CrossTalk),
            csat_pct: f(Kpi::Csat),
            sentiment_score: f(Kpi::Sentiment),
            nps_score: f(Kpi::Nps),
            fcr_pct: f(Kpi::Fcr),
            asa_sec: f(Kpi::Asa),
            abandonment_rate_pct: f(Kpi::AbandonmentRate),
        }
    }

    /// Value of one KPI.
    #[must_use]
    pub fn get(&self, kpi: Kpi) -> f64 {
        match kpi {
            Kpi::Aht => self.aht_min,
            Kpi::Ntt => self.ntt_min,
            Kpi::CrossTalk => self.cross_talk_pct,
            Kpi::Csat => self.csat_pct,
            Kpi::Sentiment => self.sentiment_score,
            Kpi::Nps => self.nps_score,
            Kpi::Fcr => self.fcr_pct,
            Kpi::Asa => self.asa_sec,
            Kpi::AbandonmentRate => self.abandonment_rate_pct,
        }
    }

    /// Values in [`Kpi::ALL`] order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        Kpi::ALL.iter().map(|&kpi| self.get(kpi)).collect()
    }
}

/// One call-center record without its label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Numeric KPI readings.
    #[serde(flatten)]
    pub kpis: KpiValues,
    /// `Medallia Survey Result`.
    pub survey_result: SurveyResult,
    /// `Industry`.
    pub industry: Industry,
}

/// A maturity level label as it appears in the training data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaturityLevel(String);

impl MaturityLevel {
    /// Wrap a non-empty label.
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        debug_assert!(!label.is_empty(), "maturity level must not be empty");
        Self(label)
    }

    /// Return the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaturityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An observation paired with its maturity level.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledObservation {
    /// The feature record.
    pub observation: Observation,
    /// The target label.
    pub maturity_level: MaturityLevel,
}

/// A validated key naming a persisted model bundle and its report.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey(String);

impl ModelKey {
    /// Key used when none is given.
    pub const DEFAULT: &'static str = "maturity_model";

    /// Parse and validate a model key.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidModelKey`] if the key is empty or contains
    /// characters outside `[a-zA-Z0-9_-]`.
    pub fn new(key: String) -> Result<Self, IoError> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidModelKey { key });
        }
        Ok(Self(key))
    }

    /// Return the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModelKey {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl FromStr for ModelKey {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kpi_order_matches_index() {
        for (i, kpi) in Kpi::ALL.iter().enumerate() {
            assert_eq!(kpi.index(), i);
        }
        assert_eq!(Kpi::Asa.column(), "Avg Speed of Answer (sec)");
    }

    #[test]
    fn kpi_values_roundtrip_through_from_fn() {
        let values = KpiValues::from_fn(|kpi| kpi.index() as f64 * 1.5);
        assert_eq!(values.get(Kpi::Csat), 4.5);
        assert_eq!(values.to_vec(), (0..9).map(|i| i as f64 * 1.5).collect::<Vec<_>>());
    }

    #[test]
    fn vocabulary_parses_trimmed_exact_labels() {
        assert_eq!(" Satisfied ".parse::<SurveyResult>(), Ok(SurveyResult::Satisfied));
        assert_eq!("Tech Support".parse::<Industry>(), Ok(Industry::TechSupport));
        assert_eq!(Industry::TechSupport.to_string(), "Tech Support");
    }

    #[test]
    fn vocabulary_rejects_unknown_and_wrong_case() {
        let err = "Retail".parse::<Industry>().unwrap_err();
        assert_eq!(err.column, "Industry");
        assert_eq!(err.expected.len(), 5);
        assert!(err.to_string().contains("Retail"));
        assert!("satisfied".parse::<SurveyResult>().is_err());
    }

    #[test]
    fn observation_json_uses_flat_field_names() {
        let obs = Observation {
            kpis: KpiValues::from_fn(|_| 1.0),
            survey_result: SurveyResult::Neutral,
            industry: Industry::TechSupport,
        };
        let json = serde_json::to_value(obs).unwrap();
        assert_eq!(json["aht_min"], 1.0);
        assert_eq!(json["industry"], "Tech Support");
        assert_eq!(json["survey_result"], "Neutral");
        let back: Observation = serde_json::from_value(json).unwrap();
        assert_eq!(back, obs);
    }

    #[test]
    fn model_key_valid() {
        assert!(ModelKey::new("maturity-model_2".to_string()).is_ok());
        assert_eq!(ModelKey::default().as_str(), "maturity_model");
    }

    #[test]
    fn model_key_rejects_path_characters() {
        for bad in ["", "../escape", "a b", "x.bundle"] {
            assert!(
                matches!(bad.parse::<ModelKey>(), Err(IoError::InvalidModelKey { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
