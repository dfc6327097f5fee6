use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A source chunk the backend retrieved for an answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reindex_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_index: Option<u32>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub chunk_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecResult {
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub search_result: Option<String>,
    #[serde(default)]
    pub code_generated: Option<String>,
    #[serde(default)]
    pub code_exec_result: Option<String>,
}

/// One assistant answer as the rendering layer receives it.
///
/// `answer` is `None` whenever the backend sent something other than a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    #[serde(default, deserialize_with = "string_or_none")]
    pub answer: Option<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub exec_results: Vec<ExecResult>,
    #[serde(default)]
    pub generated_chart: Option<String>,
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            id: String::new(),
            role,
            content: content.into(),
            date: chrono::Utc::now().to_rfc3339(),
            feedback: None,
            context: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, alias = "createdAt")]
    pub date: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatHistoryLoadingState {
    #[default]
    NotStarted,
    Loading,
    Success,
    Fail,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CosmosDbHealth {
    #[serde(default, rename = "cosmosDB")]
    pub cosmos_db: bool,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiSettings {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub show_share_button: bool,
    #[serde(default)]
    pub show_export_button: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontendSettings {
    #[serde(default)]
    pub feedback_enabled: bool,
    #[serde(default)]
    pub sanitize_answer: bool,
    #[serde(default)]
    pub ui: Option<UiSettings>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseSize {
    VeryShort,
    #[default]
    Medium,
    Comprehensive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationPreferences {
    pub response_size: ResponseSize,
    pub documents_count: u32,
}

impl Default for CustomizationPreferences {
    fn default() -> Self {
        CustomizationPreferences {
            response_size: ResponseSize::Medium,
            documents_count: 5,
        }
    }
}

impl ResponseSize {
    pub const ALL: [ResponseSize; 3] = [
        ResponseSize::VeryShort,
        ResponseSize::Medium,
        ResponseSize::Comprehensive,
    ];

    pub fn label(&self, language: Language) -> &'static str {
        match (self, language) {
            (ResponseSize::VeryShort, Language::Fr) => "Très courte",
            (ResponseSize::VeryShort, Language::En) => "Very short",
            (ResponseSize::Medium, Language::Fr) => "Moyenne",
            (ResponseSize::Medium, Language::En) => "Medium",
            (ResponseSize::Comprehensive, Language::Fr) => "Très complète",
            (ResponseSize::Comprehensive, Language::En) => "Comprehensive",
        }
    }
}

impl CustomizationPreferences {
    pub const MIN_DOCUMENTS: u32 = 3;
    pub const MAX_DOCUMENTS: u32 = 20;

    /// Move the document count by `delta`, staying within the allowed range.
    pub fn step_documents(self, delta: i32) -> Self {
        let count = (self.documents_count as i64 + delta as i64)
            .clamp(Self::MIN_DOCUMENTS as i64, Self::MAX_DOCUMENTS as i64);
        CustomizationPreferences {
            documents_count: count as u32,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "FR", alias = "fr", alias = "fr-fr")]
    Fr,
    #[serde(rename = "EN", alias = "en", alias = "en-us")]
    En,
}

impl Language {
    /// Anything starting with `fr` is French; everything else falls back to English.
    pub fn from_tag(tag: &str) -> Self {
        if tag.to_lowercase().starts_with("fr") {
            Language::Fr
        } else {
            Language::En
        }
    }
}

/// Feedback codes as the history API stores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feedback {
    Neutral,
    Positive,
    Negative,
    MissingCitation,
    WrongCitation,
    OutOfScope,
    InaccurateOrIrrelevant,
    OtherUnhelpful,
    HateSpeech,
    Violent,
    Sexual,
    Manipulative,
    OtherHarmful,
}

pub const UNHELPFUL_REASONS: [Feedback; 5] = [
    Feedback::MissingCitation,
    Feedback::WrongCitation,
    Feedback::OutOfScope,
    Feedback::InaccurateOrIrrelevant,
    Feedback::OtherUnhelpful,
];

pub const INAPPROPRIATE_REASONS: [Feedback; 5] = [
    Feedback::HateSpeech,
    Feedback::Violent,
    Feedback::Sexual,
    Feedback::Manipulative,
    Feedback::OtherHarmful,
];

impl Feedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::Neutral => "neutral",
            Feedback::Positive => "positive",
            Feedback::Negative => "negative",
            Feedback::MissingCitation => "missing_citation",
            Feedback::WrongCitation => "wrong_citation",
            Feedback::OutOfScope => "out_of_scope",
            Feedback::InaccurateOrIrrelevant => "inaccurate_or_irrelevant",
            Feedback::OtherUnhelpful => "other_unhelpful",
            Feedback::HateSpeech => "hate_speech",
            Feedback::Violent => "violent",
            Feedback::Sexual => "sexual",
            Feedback::Manipulative => "manipulative",
            Feedback::OtherHarmful => "other_harmful",
        }
    }

    /// Reason codes are everything below the three top-level sentiments.
    pub fn is_reason(&self) -> bool {
        !matches!(self, Feedback::Neutral | Feedback::Positive | Feedback::Negative)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Feedback::Neutral => "Neutral",
            Feedback::Positive => "Positive",
            Feedback::Negative => "Negative",
            Feedback::MissingCitation => "Citations are missing",
            Feedback::WrongCitation => "Citations are wrong",
            Feedback::OutOfScope => "The response is not from my data",
            Feedback::InaccurateOrIrrelevant => "Inaccurate or irrelevant",
            Feedback::OtherUnhelpful => "Other",
            Feedback::HateSpeech => "Hate speech, stereotyping, demeaning",
            Feedback::Violent => "Violent: glorification of violence, self-harm",
            Feedback::Sexual => "Sexual: explicit content, grooming",
            Feedback::Manipulative => "Manipulative: devious, emotional, pushy, bullying",
            Feedback::OtherHarmful => "Other",
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown feedback code: {0}")]
pub struct UnknownFeedback(pub String);

impl FromStr for Feedback {
    type Err = UnknownFeedback;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let feedback = match s {
            "neutral" => Feedback::Neutral,
            "positive" => Feedback::Positive,
            "negative" => Feedback::Negative,
            "missing_citation" => Feedback::MissingCitation,
            "wrong_citation" => Feedback::WrongCitation,
            "out_of_scope" => Feedback::OutOfScope,
            "inaccurate_or_irrelevant" => Feedback::InaccurateOrIrrelevant,
            "other_unhelpful" => Feedback::OtherUnhelpful,
            "hate_speech" => Feedback::HateSpeech,
            "violent" => Feedback::Violent,
            "sexual" => Feedback::Sexual,
            "manipulative" => Feedback::Manipulative,
            // older deployments stored the misspelled code
            "other_harmful" | "other_harmlful" => Feedback::OtherHarmful,
            other => return Err(UnknownFeedback(other.to_string())),
        };
        Ok(feedback)
    }
}

/// The value persisted for a message: one code, or the reasons picked in the
/// negative feedback dialog, in the order they were picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackValue {
    Single(Feedback),
    Reasons(Vec<Feedback>),
}

impl FeedbackValue {
    pub fn to_wire(&self) -> String {
        match self {
            FeedbackValue::Single(feedback) => feedback.as_str().to_string(),
            FeedbackValue::Reasons(reasons) => reasons
                .iter()
                .map(Feedback::as_str)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Unknown codes inside a joined list are skipped; a lone unknown code is an error.
    pub fn from_wire(raw: &str) -> Result<Self, UnknownFeedback> {
        if raw.contains(',') {
            let reasons = raw
                .split(',')
                .filter_map(|code| code.trim().parse().ok())
                .collect();
            Ok(FeedbackValue::Reasons(reasons))
        } else {
            raw.trim().parse().map(FeedbackValue::Single)
        }
    }
}

impl fmt::Display for FeedbackValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl Serialize for FeedbackValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_string_answer_deserializes_to_none() {
        let parsed: AskResponse =
            serde_json::from_str(r#"{"answer": 42, "citations": []}"#).unwrap();
        assert_eq!(parsed.answer, None);

        let missing: AskResponse = serde_json::from_str(r#"{"citations": []}"#).unwrap();
        assert_eq!(missing.answer, None);

        let text: AskResponse = serde_json::from_str(r#"{"answer": "hi"}"#).unwrap();
        assert_eq!(text.answer.as_deref(), Some("hi"));
    }

    #[test]
    fn feedback_codes_round_trip_through_from_str() {
        for code in UNHELPFUL_REASONS.iter().chain(INAPPROPRIATE_REASONS.iter()) {
            assert_eq!(code.as_str().parse::<Feedback>().unwrap(), *code);
            assert!(code.is_reason());
        }
        assert!(!Feedback::Negative.is_reason());
    }

    #[test]
    fn legacy_misspelled_harmful_code_is_accepted() {
        assert_eq!("other_harmlful".parse::<Feedback>().unwrap(), Feedback::OtherHarmful);
    }

    #[test]
    fn reasons_join_in_selection_order() {
        let value = FeedbackValue::Reasons(vec![Feedback::WrongCitation, Feedback::MissingCitation]);
        assert_eq!(value.to_wire(), "wrong_citation,missing_citation");
        assert_eq!(FeedbackValue::from_wire("wrong_citation,missing_citation").unwrap(), value);
    }

    #[test]
    fn single_unknown_code_is_rejected() {
        let err = FeedbackValue::from_wire("meh").unwrap_err();
        assert_eq!(err, UnknownFeedback("meh".to_string()));
        assert_eq!(err.to_string(), "unknown feedback code: meh");
        let _: &dyn std::error::Error = &err;
        assert_eq!(
            FeedbackValue::from_wire("positive").unwrap(),
            FeedbackValue::Single(Feedback::Positive)
        );
    }

    #[test]
    fn document_count_stays_in_range() {
        let prefs = CustomizationPreferences::default();
        assert_eq!(prefs.step_documents(1).documents_count, 6);
        assert_eq!(prefs.step_documents(-10).documents_count, 3);
        assert_eq!(prefs.step_documents(40).documents_count, 20);
        assert_eq!(prefs.step_documents(1).response_size, ResponseSize::Medium);
    }

    #[test]
    fn preferences_use_camel_case_on_the_wire() {
        let prefs = CustomizationPreferences {
            response_size: ResponseSize::VeryShort,
            documents_count: 8,
        };
        assert_eq!(
            serde_json::to_value(prefs).unwrap(),
            serde_json::json!({"responseSize": "veryShort", "documentsCount": 8})
        );
        assert_eq!(ResponseSize::Comprehensive.label(Language::Fr), "Très complète");
    }

    #[test]
    fn language_tags_fold_to_french_or_english() {
        assert_eq!(Language::from_tag("fr-FR"), Language::Fr);
        assert_eq!(Language::from_tag("EN"), Language::En);
        assert_eq!(Language::from_tag("de"), Language::En);
    }
}
