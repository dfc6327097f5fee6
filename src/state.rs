//! Application-wide state and its reducer.

use std::collections::HashMap;

use crate::config::BackendConfig;
use crate::models::{
    ChatHistoryLoadingState, Conversation, CosmosDbHealth, CustomizationPreferences, ExecResult,
    Feedback, FrontendSettings, Language,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub is_chat_history_open: bool,
    pub is_help_panel_open: bool,
    pub is_customization_panel_open: bool,
    pub chat_history_loading_state: ChatHistoryLoadingState,
    pub chat_history: Option<Vec<Conversation>>,
    pub filtered_chat_history: Option<Vec<Conversation>>,
    pub current_chat: Option<Conversation>,
    pub is_cosmos_db_available: CosmosDbHealth,
    pub is_loading: bool,
    pub frontend_settings: Option<FrontendSettings>,
    pub feedback_state: HashMap<String, Feedback>,
    pub answer_exec_result: HashMap<String, Vec<ExecResult>>,
    pub auth_token: Option<String>,
    pub user_language: Language,
    pub username: Option<String>,
    pub encrypted_username: Option<String>,
    pub initial_question: Option<String>,
    pub customization_preferences: CustomizationPreferences,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            is_loading: true,
            ..Default::default()
        }
    }

    /// Initial state seeded with the user details from the backend config.
    pub fn from_backend(backend: &BackendConfig) -> Self {
        let mut state = AppState::new();
        state = reduce(state, Action::SetAuthToken(backend.auth_token.clone()));
        state = reduce(
            state,
            Action::SetEncryptedUsername(backend.encrypted_username.clone()),
        );
        reduce(state, Action::SetUserLanguage(backend.language))
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_token.as_deref().is_some_and(|token| !token.is_empty())
    }

    pub fn feedback_enabled(&self) -> bool {
        self.frontend_settings
            .as_ref()
            .is_some_and(|settings| settings.feedback_enabled)
            && self.is_cosmos_db_available.cosmos_db
    }

    pub fn feedback_for(&self, message_id: &str) -> Option<Feedback> {
        self.feedback_state.get(message_id).copied()
    }

    pub fn show_export_button(&self) -> bool {
        self.frontend_settings
            .as_ref()
            .and_then(|settings| settings.ui.as_ref())
            .is_some_and(|ui| ui.show_export_button)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ToggleChatHistory,
    ToggleHelpPanel,
    ToggleCustomizationPanel,
    UpdateCurrentChat(Option<Conversation>),
    UpdateChatHistoryLoadingState(ChatHistoryLoadingState),
    UpdateChatHistory(Conversation),
    UpdateChatTitle { id: String, title: String },
    DeleteChatEntry(String),
    DeleteChatHistory,
    DeleteCurrentChatMessages,
    FetchChatHistory(Option<Vec<Conversation>>),
    SetCosmosDbStatus(CosmosDbHealth),
    FetchFrontendSettings(Option<FrontendSettings>),
    SetFeedbackState { answer_id: String, feedback: Feedback },
    SetAnswerExecResult { answer_id: String, exec_result: Vec<ExecResult> },
    SetAuthToken(Option<String>),
    SetUserLanguage(Language),
    SetUsername(Option<String>),
    SetEncryptedUsername(Option<String>),
    SetInitialQuestion(Option<String>),
    UpdateCustomizationPreferences(CustomizationPreferences),
}

pub fn reduce(mut state: AppState, action: Action) -> AppState {
    match action {
        Action::ToggleChatHistory => {
            let opening = !state.is_chat_history_open;
            state.is_chat_history_open = opening;
            if opening {
                state.is_help_panel_open = false;
            }
        }
        Action::ToggleHelpPanel => {
            let opening = !state.is_help_panel_open;
            state.is_help_panel_open = opening;
            if opening {
                state.is_chat_history_open = false;
            }
        }
        Action::ToggleCustomizationPanel => {
            state.is_customization_panel_open = !state.is_customization_panel_open;
        }
        Action::UpdateCurrentChat(chat) => state.current_chat = chat,
        Action::UpdateChatHistoryLoadingState(loading) => {
            state.chat_history_loading_state = loading;
        }
        Action::UpdateChatHistory(conversation) => {
            let (Some(current), true) = (state.current_chat.clone(), state.chat_history.is_some())
            else {
                return state;
            };
            let history = state.chat_history.get_or_insert_with(Vec::new);
            // an existing entry is refreshed from the current chat, not the payload
            match history.iter().position(|c| c.id == conversation.id) {
                Some(index) => history[index] = current,
                None => history.push(conversation),
            }
        }
        Action::UpdateChatTitle { id, title } => {
            if state.chat_history.is_none() {
                state.chat_history = Some(Vec::new());
                return state;
            }
            let history = state.chat_history.get_or_insert_with(Vec::new);
            for chat in history.iter_mut().filter(|chat| chat.id == id) {
                chat.title = title.clone();
            }
            if let Some(current) = state.current_chat.as_mut().filter(|c| c.id == id) {
                current.title = title;
            }
        }
        Action::DeleteChatEntry(id) => {
            if state.chat_history.is_none() {
                state.chat_history = Some(Vec::new());
                return state;
            }
            let history = state.chat_history.get_or_insert_with(Vec::new);
            history.retain(|chat| chat.id != id);
            state.current_chat = None;
        }
        Action::DeleteChatHistory => {
            state.chat_history = Some(Vec::new());
            state.filtered_chat_history = Some(Vec::new());
            state.current_chat = None;
        }
        Action::DeleteCurrentChatMessages => {
            if state.chat_history.is_none() {
                return state;
            }
            if let Some(current) = state.current_chat.as_mut() {
                current.messages.clear();
            }
        }
        Action::FetchChatHistory(history) => state.chat_history = history,
        Action::SetCosmosDbStatus(status) => state.is_cosmos_db_available = status,
        Action::FetchFrontendSettings(settings) => {
            state.is_loading = false;
            state.frontend_settings = settings;
        }
        Action::SetFeedbackState { answer_id, feedback } => {
            state.feedback_state.insert(answer_id, feedback);
        }
        Action::SetAnswerExecResult {
            answer_id,
            exec_result,
        } => {
            state.answer_exec_result.insert(answer_id, exec_result);
        }
        Action::SetAuthToken(token) => state.auth_token = token,
        Action::SetUserLanguage(language) => state.user_language = language,
        Action::SetUsername(username) => state.username = username,
        Action::SetEncryptedUsername(username) => state.encrypted_username = username,
        Action::SetInitialQuestion(question) => state.initial_question = question,
        Action::UpdateCustomizationPreferences(preferences) => {
            state.customization_preferences = preferences;
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, Role};

    fn conversation(id: &str, title: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            title: title.to_string(),
            messages: vec![ChatMessage::new(Role::User, "hello")],
            date: "2026-10-01T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn backend_config_seeds_user_details() {
        let backend = BackendConfig {
            auth_token: Some("token".to_string()),
            encrypted_username: Some("enc".to_string()),
            language: Language::En,
            ..Default::default()
        };
        let state = AppState::from_backend(&backend);

        assert!(state.is_authenticated());
        assert_eq!(state.encrypted_username.as_deref(), Some("enc"));
        assert_eq!(state.user_language, Language::En);
        assert!(state.is_loading);
    }

    #[test]
    fn customization_panel_and_preferences() {
        let state = reduce(AppState::new(), Action::ToggleCustomizationPanel);
        assert!(state.is_customization_panel_open);

        let prefs = CustomizationPreferences::default().step_documents(3);
        let state = reduce(state, Action::UpdateCustomizationPreferences(prefs));
        assert_eq!(state.customization_preferences.documents_count, 8);

        let state = reduce(
            state,
            Action::UpdateCustomizationPreferences(CustomizationPreferences::default()),
        );
        assert_eq!(state.customization_preferences, CustomizationPreferences::default());
    }

    #[test]
    fn opening_history_closes_help_and_vice_versa() {
        let state = reduce(AppState::new(), Action::ToggleHelpPanel);
        assert!(state.is_help_panel_open);

        let state = reduce(state, Action::ToggleChatHistory);
        assert!(state.is_chat_history_open);
        assert!(!state.is_help_panel_open);

        let state = reduce(state, Action::ToggleHelpPanel);
        assert!(state.is_help_panel_open);
        assert!(!state.is_chat_history_open);

        let state = reduce(state, Action::ToggleHelpPanel);
        assert!(!state.is_help_panel_open);
        assert!(!state.is_chat_history_open);
    }

    #[test]
    fn closing_history_leaves_help_alone() {
        let mut state = AppState::new();
        state.is_chat_history_open = true;
        state.is_help_panel_open = true;
        let state = reduce(state, Action::ToggleChatHistory);
        assert!(!state.is_chat_history_open);
        assert!(state.is_help_panel_open);
    }

    #[test]
    fn update_chat_history_needs_history_and_current_chat() {
        let state = reduce(AppState::new(), Action::UpdateChatHistory(conversation("a", "A")));
        assert_eq!(state.chat_history, None);
    }

    #[test]
    fn update_chat_history_replaces_with_current_or_appends() {
        let mut state = AppState::new();
        state.chat_history = Some(vec![conversation("a", "old")]);
        state.current_chat = Some(conversation("a", "current"));

        let state = reduce(state, Action::UpdateChatHistory(conversation("a", "payload")));
        assert_eq!(state.chat_history.as_ref().unwrap()[0].title, "current");

        let state = reduce(state, Action::UpdateChatHistory(conversation("b", "B")));
        let history = state.chat_history.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].title, "B");
    }

    #[test]
    fn rename_updates_history_and_current_chat() {
        let mut state = AppState::new();
        state.chat_history = Some(vec![conversation("a", "A"), conversation("b", "B")]);
        state.current_chat = Some(conversation("a", "A"));

        let state = reduce(
            state,
            Action::UpdateChatTitle {
                id: "a".to_string(),
                title: "Renamed".to_string(),
            },
        );
        assert_eq!(state.chat_history.as_ref().unwrap()[0].title, "Renamed");
        assert_eq!(state.chat_history.as_ref().unwrap()[1].title, "B");
        assert_eq!(state.current_chat.unwrap().title, "Renamed");
    }

    #[test]
    fn rename_without_history_initializes_empty_history() {
        let state = reduce(
            AppState::new(),
            Action::UpdateChatTitle {
                id: "a".to_string(),
                title: "x".to_string(),
            },
        );
        assert_eq!(state.chat_history, Some(Vec::new()));
    }

    #[test]
    fn delete_entry_filters_and_clears_current_chat() {
        let mut state = AppState::new();
        state.chat_history = Some(vec![conversation("a", "A"), conversation("b", "B")]);
        state.current_chat = Some(conversation("b", "B"));

        let state = reduce(state, Action::DeleteChatEntry("a".to_string()));
        assert_eq!(state.chat_history.as_ref().unwrap().len(), 1);
        assert_eq!(state.current_chat, None);
    }

    #[test]
    fn delete_all_history_clears_everything() {
        let mut state = AppState::new();
        state.chat_history = Some(vec![conversation("a", "A")]);
        state.filtered_chat_history = Some(vec![conversation("a", "A")]);
        state.current_chat = Some(conversation("a", "A"));

        let state = reduce(state, Action::DeleteChatHistory);
        assert_eq!(state.chat_history, Some(Vec::new()));
        assert_eq!(state.filtered_chat_history, Some(Vec::new()));
        assert_eq!(state.current_chat, None);
    }

    #[test]
    fn delete_current_messages_keeps_the_conversation() {
        let mut state = AppState::new();
        state.chat_history = Some(vec![conversation("a", "A")]);
        state.current_chat = Some(conversation("a", "A"));

        let state = reduce(state, Action::DeleteCurrentChatMessages);
        let current = state.current_chat.unwrap();
        assert_eq!(current.id, "a");
        assert!(current.messages.is_empty());
    }

    #[test]
    fn feedback_map_is_keyed_by_answer() {
        let state = reduce(
            AppState::new(),
            Action::SetFeedbackState {
                answer_id: "m1".to_string(),
                feedback: Feedback::Positive,
            },
        );
        let state = reduce(
            state,
            Action::SetFeedbackState {
                answer_id: "m2".to_string(),
                feedback: Feedback::Negative,
            },
        );
        assert_eq!(state.feedback_for("m1"), Some(Feedback::Positive));
        assert_eq!(state.feedback_for("m2"), Some(Feedback::Negative));
        assert_eq!(state.feedback_for("m3"), None);
    }

    #[test]
    fn frontend_settings_end_loading_and_gate_feedback() {
        let state = AppState::new();
        assert!(state.is_loading);

        let state = reduce(
            state,
            Action::FetchFrontendSettings(Some(FrontendSettings {
                feedback_enabled: true,
                ..Default::default()
            })),
        );
        assert!(!state.is_loading);
        assert!(!state.feedback_enabled());

        let state = reduce(
            state,
            Action::SetCosmosDbStatus(CosmosDbHealth {
                cosmos_db: true,
                status: "CosmosDB is configured and working".to_string(),
            }),
        );
        assert!(state.feedback_enabled());
    }

    #[test]
    fn empty_token_is_not_authenticated() {
        let state = reduce(AppState::new(), Action::SetAuthToken(Some(String::new())));
        assert!(!state.is_authenticated());
        let state = reduce(state, Action::SetAuthToken(Some("token".to_string())));
        assert!(state.is_authenticated());
    }
}
