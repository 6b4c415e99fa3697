//! Phishing categories, case scenarios, and image analysis results.

use core::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::PhishingCaseId;

/// A phishing category from `GET /phishing/categories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhishingCategory {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

/// A phishing case scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhishingCase {
    pub id: PhishingCaseId,
    #[serde(default)]
    pub category_code: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub case_date: Option<String>,
    #[serde(default)]
    pub reference_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PhishingCase {
    /// The case date as `YYYY-MM-DD`, when it parses as a date.
    ///
    /// The backend may send either a bare date or a full timestamp.
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        let raw = self.case_date.as_deref()?.trim();
        let day = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

/// Body of case create and update requests.
///
/// Empty optional fields are sent as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhishingCaseInput {
    pub category_code: String,
    pub title: String,
    pub content: String,
    pub case_date: Option<NaiveDate>,
    pub reference_url: Option<String>,
}

/// Result of `POST /phishing/analyze-image`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub phishing_score: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ImageAnalysis {
    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.phishing_score)
    }

    /// Score as displayed, `N / 100`, without a trailing `.0` for whole numbers.
    #[must_use]
    pub fn score_label(&self) -> String {
        format!("{} / 100", self.phishing_score)
    }
}

/// Risk bucket derived from a phishing score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// Above 70 is high, above 40 is medium, everything else is low.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > 70.0 {
            Self::High
        } else if score > 40.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(70.5), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(70.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(41.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(40.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
    }

    #[test]
    fn test_score_label() {
        let analysis: ImageAnalysis =
            serde_json::from_str(r#"{"phishing_score": 85, "reason": "fake bank logo"}"#)
                .unwrap();
        assert_eq!(analysis.score_label(), "85 / 100");
        assert_eq!(analysis.risk_level(), RiskLevel::High);
    }

    #[test]
    fn test_case_date_accepts_timestamp() {
        let case: PhishingCase = serde_json::from_str(
            r#"{"id": 1, "category_code": "LOAN", "title": "t", "content": "c",
                "case_date": "2024-03-05T00:00:00"}"#,
        )
        .unwrap();
        assert_eq!(case.date(), NaiveDate::from_ymd_opt(2024, 3, 5));

        let case = PhishingCase {
            case_date: Some("not a date".into()),
            ..case
        };
        assert!(case.date().is_none());
    }

    #[test]
    fn test_input_serializes_date_and_nulls() {
        let input = PhishingCaseInput {
            category_code: "INVEST".into(),
            title: "Crypto scheme".into(),
            content: "...".into(),
            case_date: NaiveDate::from_ymd_opt(2023, 12, 1),
            reference_url: None,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["case_date"], "2023-12-01");
        assert!(json["reference_url"].is_null());
    }
}
