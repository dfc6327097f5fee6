use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate};
use thiserror::Error;

use crate::answer_parser::parse_answer;
use crate::api::answer_from_history;
use crate::citation::citation_label;
use crate::models::{ChatMessage, Conversation, Language, Role};

const FRENCH_MONTHS: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No valid messages to export")]
    NoMessages,

    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

/// What a conversation export will contain and where it goes.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub title: String,
    pub filename: String,
    /// The full conversation, tool messages included, so answers keep their citations.
    messages: Vec<ChatMessage>,
}

pub fn format_long_date(date: NaiveDate, language: Language) -> String {
    match language {
        Language::Fr => format!(
            "{} {} {}",
            date.day(),
            FRENCH_MONTHS[date.month0() as usize],
            date.year()
        ),
        Language::En => date.format("%B %-d, %Y").to_string(),
    }
}

impl ExportPlan {
    pub fn from_conversation(
        conversation: &Conversation,
        language: Language,
        today: NaiveDate,
    ) -> Result<Self, ExportError> {
        let has_content = conversation
            .messages
            .iter()
            .any(|m| matches!(m.role, Role::User | Role::Assistant));
        if !has_content {
            return Err(ExportError::NoMessages);
        }

        let chat_date = DateTime::parse_from_rfc3339(&conversation.date)
            .map(|d| d.date_naive())
            .or_else(|_| NaiveDate::parse_from_str(conversation.date.get(..10).unwrap_or(""), "%Y-%m-%d"))
            .unwrap_or(today);
        let long_date = format_long_date(chat_date, language);
        let title = match language {
            Language::Fr => format!("Conversation du {}", long_date),
            Language::En => format!("Conversation - {}", long_date),
        };

        Ok(ExportPlan {
            title,
            filename: format!("conversation-{}.md", today.format("%Y-%m-%d")),
            messages: conversation.messages.clone(),
        })
    }

    /// Number of user and assistant messages that end up in the export.
    pub fn message_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .count()
    }

    pub fn render(&self) -> String {
        let mut out = format!("# {}\n", self.title);

        for (index, message) in self.messages.iter().enumerate() {
            match message.role {
                Role::User => {
                    out.push_str("\n## Question\n\n");
                    out.push_str(message.content.trim());
                    out.push('\n');
                }
                Role::Assistant => {
                    out.push_str("\n## Answer\n\n");
                    let parsed = answer_from_history(&self.messages, index)
                        .as_ref()
                        .and_then(parse_answer);
                    match parsed {
                        Some(parsed) => {
                            out.push_str(parsed.markdown_format_text.trim());
                            out.push('\n');
                            if !parsed.citations.is_empty() {
                                out.push_str("\nReferences:\n\n");
                                for (i, citation) in parsed.citations.iter().enumerate() {
                                    out.push_str(&format!(
                                        "{}. {}\n",
                                        i + 1,
                                        citation_label(citation, i + 1, false)
                                    ));
                                }
                            }
                        }
                        None => {
                            out.push_str(message.content.trim());
                            out.push('\n');
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }

    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        fs::write(&path, self.render())?;
        tracing::info!(path = %path.display(), "conversation exported");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(role: Role, content: &str) -> ChatMessage {
        ChatMessage {
            id: format!("{:?}-id", role),
            role,
            content: content.to_string(),
            date: String::new(),
            feedback: None,
            context: None,
        }
    }

    fn conversation(messages: Vec<ChatMessage>) -> Conversation {
        Conversation {
            id: "c1".to_string(),
            title: "Budget".to_string(),
            messages,
            date: "2026-10-01T09:30:00Z".to_string(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn titles_follow_the_user_language() {
        let conv = conversation(vec![message(Role::User, "hi")]);

        let fr = ExportPlan::from_conversation(&conv, Language::Fr, today()).unwrap();
        assert_eq!(fr.title, "Conversation du 1 octobre 2026");
        assert_eq!(fr.filename, "conversation-2026-10-18.md");

        let en = ExportPlan::from_conversation(&conv, Language::En, today()).unwrap();
        assert_eq!(en.title, "Conversation - October 1, 2026");
    }

    #[test]
    fn conversations_without_user_or_assistant_messages_are_rejected() {
        let conv = conversation(vec![message(Role::Tool, "{}")]);
        assert!(matches!(
            ExportPlan::from_conversation(&conv, Language::En, today()),
            Err(ExportError::NoMessages)
        ));
    }

    #[test]
    fn rendered_answers_are_parsed_and_list_references() {
        let tool = r#"{"citations":[{"filepath":"guide.pdf"}]}"#;
        let conv = conversation(vec![
            message(Role::User, "What is it?"),
            message(Role::Tool, tool),
            message(Role::Assistant, "It is this [doc1]."),
        ]);
        let plan = ExportPlan::from_conversation(&conv, Language::En, today()).unwrap();
        assert_eq!(plan.message_count(), 2);

        let rendered = plan.render();
        assert!(rendered.starts_with("# Conversation - October 1, 2026\n"));
        assert!(rendered.contains("## Question\n\nWhat is it?\n"));
        assert!(rendered.contains("It is this  ^1^ ."));
        assert!(rendered.contains("1. guide.pdf - Part 1\n"));
        assert!(!rendered.contains("citations"));
    }

    #[test]
    fn write_to_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let conv = conversation(vec![message(Role::User, "hi")]);
        let plan = ExportPlan::from_conversation(&conv, Language::En, today()).unwrap();

        let path = plan.write_to(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "conversation-2026-10-18.md");
        assert!(std::fs::read_to_string(path).unwrap().contains("hi"));
    }
}
