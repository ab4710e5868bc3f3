//! Extraction of the per-turn analysis and reply from a model completion.
//!
//! The model is asked for an `<analysis>{json}</analysis>` block followed by a
//! `<response>...</response>` block. Models drift from that contract, so the
//! parser never fails: it degrades to an error-flagged analysis and a canned
//! reply instead.

use crate::script::backup_reply;
use rand::Rng;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static ANALYSIS_TAG: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?s)<analysis>(.*?)</analysis>").expect("valid regex"));
static RESPONSE_TAG: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?s)<response>(.*?)</response>").expect("valid regex"));
static JSON_OBJECT: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?s)\{.*\}").expect("valid regex"));
static STRAY_RESPONSE_TAG: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"</?response>").expect("valid regex"));

/// The model's judgment of one player turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    Report(AnalysisReport),
    Error { message: String },
}

impl Analysis {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            Analysis::Report(report) => Some(report),
            Analysis::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Analysis::Error { .. })
    }
}

/// Fields the state machine consumes. Missing fields default to no change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    pub affection_delta: i32,
    pub boredom_delta: i32,
    pub triggered_topics: Vec<String>,
    pub thought_process: Option<String>,
    pub mood: Option<String>,
    pub suggested_action: Option<SuggestedAction>,
}

/// An action the model suggests alongside its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestedAction {
    ProposeLocationChange { target: Option<String> },
    Other { kind: String },
}

/// Result of parsing a completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCompletion {
    /// `None` when the completion had no `<analysis>` block at all.
    pub analysis: Option<Analysis>,
    pub response: String,
}

/// Split a raw completion into analysis and reply.
///
/// `rng` picks the canned reply when nothing usable is left.
pub fn parse_completion<R: Rng + ?Sized>(raw: &str, rng: &mut R) -> ParsedCompletion {
    let analysis_match = ANALYSIS_TAG.captures(raw);

    let analysis = analysis_match.as_ref().map(|caps| {
        let body = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        match JSON_OBJECT.find(body) {
            Some(json) => decode_analysis(json.as_str()),
            None => Analysis::error("no JSON object found inside <analysis>"),
        }
    });

    let response = if let Some(caps) = RESPONSE_TAG.captures(raw) {
        caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string()
    } else if analysis_match.is_some() {
        raw.rsplit("</analysis>").next().unwrap_or_default().to_string()
    } else {
        String::new()
    };

    let response = STRAY_RESPONSE_TAG.replace_all(&response, "").trim().to_string();
    let response = if response.is_empty() {
        backup_reply(rng).to_string()
    } else {
        response
    };

    ParsedCompletion { analysis, response }
}

fn decode_analysis(json: &str) -> Analysis {
    let value: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => return Analysis::error(format!("invalid analysis JSON: {e}")),
    };

    let Value::Object(fields) = value else {
        return Analysis::error("analysis is not a JSON object");
    };

    if let Some(error) = fields.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Analysis::Error { message };
    }

    Analysis::Report(AnalysisReport {
        affection_delta: int_field(&fields, "affection_delta"),
        boredom_delta: int_field(&fields, "boredom_delta"),
        triggered_topics: string_list(fields.get("triggered_topics")),
        thought_process: string_field(&fields, "thought_process"),
        mood: string_field(&fields, "mood"),
        suggested_action: fields.get("suggested_action").and_then(suggested_action),
    })
}

/// Integer fields arrive as numbers, floats, or strings like `"+5"`.
fn int_field(fields: &Map<String, Value>, key: &str) -> i32 {
    let raw = match fields.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Some(Value::String(s)) => s.trim().trim_start_matches('+').parse::<i64>().ok(),
        _ => None,
    };
    raw.map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
        .unwrap_or(0)
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn suggested_action(value: &Value) -> Option<SuggestedAction> {
    let fields = value.as_object()?;
    let kind = fields.get("type").and_then(Value::as_str)?;
    Some(match kind {
        "propose_location_change" => SuggestedAction::ProposeLocationChange {
            target: string_field(fields, "target")
                .or_else(|| string_field(fields, "destination")),
        },
        other => SuggestedAction::Other {
            kind: other.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::BACKUP_REPLIES;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn parse(raw: &str) -> ParsedCompletion {
        parse_completion(raw, &mut StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_well_formed_completion() {
        let raw = r#"<analysis>
{"affection_delta": 3, "boredom_delta": -1, "triggered_topics": ["baking", "exams"],
 "thought_process": "Chen Chen remembered my cake."}
</analysis>
<response>Thank you for noticing!</response>"#;

        let parsed = parse(raw);
        let report = parsed.analysis.as_ref().and_then(Analysis::report).unwrap();

        assert_eq!(report.affection_delta, 3);
        assert_eq!(report.boredom_delta, -1);
        assert_eq!(report.triggered_topics, vec!["baking", "exams"]);
        assert_eq!(report.thought_process.as_deref(), Some("Chen Chen remembered my cake."));
        assert_eq!(parsed.response, "Thank you for noticing!");
    }

    #[test]
    fn test_no_tags_yields_backup_and_no_analysis() {
        let parsed = parse("I am just plain text.");
        assert!(parsed.analysis.is_none());
        assert!(BACKUP_REPLIES.contains(&parsed.response.as_str()));
    }

    #[test]
    fn test_malformed_json_with_response() {
        let raw = "<analysis>{affection_delta: +3,}</analysis><response>Hi there.</response>";
        let parsed = parse(raw);
        assert!(matches!(parsed.analysis, Some(Analysis::Error { .. })));
        assert_eq!(parsed.response, "Hi there.");
    }

    #[test]
    fn test_malformed_json_without_response_uses_trailing_text() {
        let raw = "<analysis>{not json}</analysis>  Well, hello.";
        let parsed = parse(raw);
        assert!(parsed.analysis.unwrap().is_error());
        assert_eq!(parsed.response, "Well, hello.");
    }

    #[test]
    fn test_malformed_json_and_nothing_else() {
        let parsed = parse("<analysis>{oops</analysis>");
        assert!(parsed.analysis.unwrap().is_error());
        assert!(BACKUP_REPLIES.contains(&parsed.response.as_str()));
    }

    #[test]
    fn test_analysis_without_json_object() {
        let parsed = parse("<analysis>nothing here</analysis><response>ok</response>");
        assert_eq!(
            parsed.analysis,
            Some(Analysis::error("no JSON object found inside <analysis>"))
        );
    }

    #[test]
    fn test_error_field_is_preserved() {
        let parsed = parse(r#"<analysis>{"error": "refused"}</analysis>"#);
        assert_eq!(parsed.analysis, Some(Analysis::error("refused")));
    }

    #[test]
    fn test_stray_response_tags_are_stripped() {
        let raw = r#"<analysis>{"affection_delta": 1}</analysis><response>Sure!"#;
        let parsed = parse(raw);
        assert_eq!(parsed.response, "Sure!");
    }

    #[test]
    fn test_lenient_numbers_and_topics() {
        let raw = r#"<analysis>{"affection_delta": "+5", "boredom_delta": 2.6, "triggered_topics": "music"}</analysis><response>x</response>"#;
        let report = parse(raw).analysis.unwrap().report().cloned().unwrap();
        assert_eq!(report.affection_delta, 5);
        assert_eq!(report.boredom_delta, 3);
        assert_eq!(report.triggered_topics, vec!["music"]);
    }

    #[test]
    fn test_suggested_action() {
        let raw = r#"<analysis>{"suggested_action": {"type": "propose_location_change", "target": "library"}}</analysis><response>Shall we?</response>"#;
        let report = parse(raw).analysis.unwrap().report().cloned().unwrap();
        assert_eq!(
            report.suggested_action,
            Some(SuggestedAction::ProposeLocationChange {
                target: Some("library".to_string())
            })
        );
        assert_eq!(report.affection_delta, 0);
    }

    #[test]
    fn test_backup_choice_follows_rng() {
        let picks = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..12)
                .map(|_| parse_completion("", &mut rng).response)
                .collect::<Vec<_>>()
        };
        assert_eq!(picks(3), picks(3));
    }
}
