//! End-of-viva performance report
//!
//! The completion service is asked for a JSON object, but what comes back is
//! free text: it may be wrapped in a markdown fence or use typographic
//! quotes. [`parse_report`] cleans that up and validates the shape before a
//! [`Report`] is ever constructed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Minimum number of entries in `strengths` and `improvements`
pub const MIN_POINTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub overall_performance: String,
    pub score: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportFormatError {
    #[error("Report is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Report is not a JSON object")]
    NotAnObject,

    #[error("Report is missing field `{0}`")]
    MissingField(&'static str),

    #[error("Report field `{field}` is invalid: {reason}")]
    InvalidList { field: &'static str, reason: String },

    #[error("Report field `overallPerformance` must be a string")]
    InvalidOverallPerformance,

    #[error("Report score must be an integer in 0..=100, got {0}")]
    InvalidScore(String),
}

/// Strips markdown fences and normalizes smart quotes
pub fn clean_json_text(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .trim()
        .to_string()
}

/// Parses and validates the completion service's report text
pub fn parse_report(raw: &str) -> Result<Report, ReportFormatError> {
    let cleaned = clean_json_text(raw);
    let value: Value = serde_json::from_str(&cleaned)?;
    let object = value.as_object().ok_or(ReportFormatError::NotAnObject)?;

    let strengths = string_list(object.get("strengths"), "strengths")?;
    let improvements = string_list(object.get("improvements"), "improvements")?;

    let overall_performance = object
        .get("overallPerformance")
        .ok_or(ReportFormatError::MissingField("overallPerformance"))?
        .as_str()
        .ok_or(ReportFormatError::InvalidOverallPerformance)?
        .to_string();

    let score = object.get("score").ok_or(ReportFormatError::MissingField("score"))?;

    Ok(Report {
        strengths,
        improvements,
        overall_performance,
        score: parse_score(score)?,
    })
}

fn string_list(value: Option<&Value>, field: &'static str) -> Result<Vec<String>, ReportFormatError> {
    let items = value
        .ok_or(ReportFormatError::MissingField(field))?
        .as_array()
        .ok_or_else(|| ReportFormatError::InvalidList {
            field,
            reason: "expected an array".into(),
        })?;

    if items.len() < MIN_POINTS {
        return Err(ReportFormatError::InvalidList {
            field,
            reason: format!("expected at least {MIN_POINTS} entries, got {}", items.len()),
        });
    }

    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| ReportFormatError::InvalidList {
                field,
                reason: format!("entry {item} is not a string"),
            })
        })
        .collect()
}

fn parse_score(value: &Value) -> Result<u8, ReportFormatError> {
    let whole = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        _ => None,
    };

    match whole {
        Some(score @ 0..=100) => Ok(score as u8),
        _ => Err(ReportFormatError::InvalidScore(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str =
        r#"{"strengths":["clear","concise"],"improvements":["depth","examples"],"overallPerformance":"Good","score":70}"#;

    #[test]
    fn test_parse_valid_report() {
        let report = parse_report(VALID).unwrap();
        assert_eq!(report.score, 70);
        assert_eq!(report.strengths, vec!["clear", "concise"]);
        assert_eq!(report.improvements.len(), 2);
        assert_eq!(report.overall_performance, "Good");
    }

    #[test]
    fn test_parse_fenced_report_with_smart_quotes() {
        let raw = "```json\n{\u{201C}strengths\u{201D}: [\"a\", \"b\"], \"improvements\": [\"c\", \"d\"], \"overallPerformance\": \"Solid\", \"score\": 88}\n```";
        let report = parse_report(raw).unwrap();
        assert_eq!(report.score, 88);
    }

    #[test]
    fn test_whole_float_score_accepted() {
        let raw = VALID.replace("70", "70.0");
        assert_eq!(parse_report(&raw).unwrap().score, 70);
    }

    #[test]
    fn test_rejects_bad_score() {
        for bad in ["101", "-1", "72.5", "\"80\"", "null"] {
            let raw = VALID.replace("70", bad);
            assert!(
                matches!(parse_report(&raw), Err(ReportFormatError::InvalidScore(_))),
                "score {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_short_lists() {
        let raw = VALID.replace(r#"["clear","concise"]"#, r#"["clear"]"#);
        assert!(matches!(
            parse_report(&raw),
            Err(ReportFormatError::InvalidList { field: "strengths", .. })
        ));

        let raw = VALID.replace(r#"["depth","examples"]"#, r#"["depth", 3]"#);
        assert!(matches!(
            parse_report(&raw),
            Err(ReportFormatError::InvalidList { field: "improvements", .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        assert!(matches!(parse_report("Great job!"), Err(ReportFormatError::InvalidJson(_))));
        assert!(matches!(parse_report("[1, 2]"), Err(ReportFormatError::NotAnObject)));

        let raw = VALID.replace(r#""Good""#, "42");
        assert!(matches!(parse_report(&raw), Err(ReportFormatError::InvalidOverallPerformance)));

        let raw = r#"{"strengths":["a","b"],"improvements":["c","d"],"overallPerformance":"ok"}"#;
        assert!(matches!(parse_report(raw), Err(ReportFormatError::MissingField("score"))));
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = parse_report(VALID).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["overallPerformance"], "Good");
    }
}
