use std::collections::HashSet;
use std::time::Duration;

use base64::Engine;
use iced::{
    widget::{
        button, checkbox, column, container, radio, row, scrollable, text, text_input,
        text_input::Id, Column,
    },
    Element, Length, Task, Theme, Font, Subscription,
    time, clipboard,
    keyboard::{self, Key},
    event::{self, Event as IcedEvent},
    alignment, Padding,
    window,
};
use tracing_subscriber::EnvFilter;

use citebar::answer_parser::{parse_answer, ParsedAnswer};
use citebar::api::{answer_from_history, HistoryClient};
use citebar::citation::{
    citation_label, document_request, references_label, should_display_attachment_link,
    should_display_citation_link, DocumentAction, DocumentRequest,
};
use citebar::export::ExportPlan;
use citebar::feedback::{FeedbackEffect, FeedbackMachine, PersistQueue};
use citebar::markdown::{segments, Block, BlockKind, Inline};
use citebar::models::{
    ChatHistoryLoadingState, ChatMessage, Conversation, CosmosDbHealth, CustomizationPreferences,
    Feedback, FeedbackValue, FrontendSettings, Language, ResponseSize, Role,
};
use citebar::{reduce, Action, AppState, Config};

const TITLE_LIMIT: usize = 40;

fn main() -> iced::Result {
    init_tracing();
    let config = Config::load();

    iced::application("citebar", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window::Settings {
            size: iced::Size::new(config.window.width as f32, config.window.height as f32),
            min_size: Some(iced::Size::new(
                config.window.min_width as f32,
                config.window.min_height as f32,
            )),
            position: window::Position::Centered,
            ..Default::default()
        })
        .default_font(Font::MONOSPACE)
        .run_with(move || App::new(config))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[derive(Debug, Clone)]
enum Message {
    InputChanged(String),
    Submit,
    AnswerReceived(Result<Vec<ChatMessage>, String>),
    SettingsLoaded(Result<FrontendSettings, String>),
    HistoryEnsured(Result<CosmosDbHealth, String>),
    ToggleHistory,
    ToggleHelp,
    ToggleCustomization,
    ResponseSizeSelected(ResponseSize),
    DocumentsStepped(i32),
    SavePreferences,
    ResetPreferences,
    HistoryLoaded(Result<Vec<Conversation>, String>),
    SelectConversation(String),
    ConversationLoaded(String, Result<Vec<ChatMessage>, String>),
    NewChat,
    ClearAllHistory,
    HistoryCleared(Result<bool, String>),
    Like(usize),
    Dislike(usize),
    ReasonToggled(usize, Feedback, bool),
    ShowInappropriate(usize),
    SubmitReasons(usize),
    DismissDialog(usize),
    FeedbackPersisted(String, Result<bool, String>),
    ToggleReferences(usize),
    OpenDocument(DocumentRequest),
    CopyAnswer(usize),
    Export,
    Tick,
    Exit,
}

/// An assistant message with everything derived from it for display.
struct RenderedAnswer {
    parsed: Option<ParsedAnswer>,
    blocks: Vec<Block>,
    feedback: FeedbackMachine,
}

impl RenderedAnswer {
    fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::plain_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

enum Entry {
    Question(String),
    Answer(RenderedAnswer),
}

struct App {
    state: AppState,
    client: HistoryClient,
    feedback_configured: bool,
    input_text: String,
    draft_preferences: CustomizationPreferences,
    is_loading: bool,
    loading_frame: usize,
    entries: Vec<Entry>,
    expanded_references: HashSet<usize>,
    persist_queue: PersistQueue,
    status: Option<String>,
    input_id: Id,
}

impl App {
    fn new(config: Config) -> (Self, Task<Message>) {
        let state = AppState::from_backend(&config.backend);
        let client = HistoryClient::from_config(&config.backend);
        let draft_preferences = state.customization_preferences;

        let input_id = Id::unique();

        let app = App {
            state,
            client: client.clone(),
            feedback_configured: config.feedback.enabled,
            input_text: String::new(),
            draft_preferences,
            is_loading: false,
            loading_frame: 0,
            entries: Vec::new(),
            expanded_references: HashSet::new(),
            persist_queue: PersistQueue::new(),
            status: None,
            input_id: input_id.clone(),
        };

        let focus_task = text_input::focus(input_id);
        let settings_client = client.clone();
        let settings_task = Task::perform(
            async move {
                settings_client
                    .frontend_settings()
                    .await
                    .map_err(|e| e.to_string())
            },
            Message::SettingsLoaded,
        );
        let ensure_task = Task::perform(
            async move { client.ensure_history().await.map_err(|e| e.to_string()) },
            Message::HistoryEnsured,
        );

        (app, Task::batch([focus_task, settings_task, ensure_task]))
    }

    fn dispatch(&mut self, action: Action) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, action);
    }

    fn feedback_enabled(&self) -> bool {
        self.feedback_configured && self.state.feedback_enabled()
    }

    /// Re-derive the rendered entries from the current chat.
    fn rebuild_entries(&mut self) {
        self.entries.clear();
        self.expanded_references.clear();
        let Some(chat) = self.state.current_chat.as_ref() else {
            return;
        };

        for (index, message) in chat.messages.iter().enumerate() {
            match message.role {
                Role::User => self.entries.push(Entry::Question(message.content.clone())),
                Role::Assistant => {
                    let Some(answer) = answer_from_history(&chat.messages, index) else {
                        continue;
                    };
                    let parsed = parse_answer(&answer);
                    let blocks = parsed
                        .as_ref()
                        .map(|p| segments(&p.markdown_format_text))
                        .unwrap_or_default();
                    let mut feedback =
                        FeedbackMachine::new(answer.message_id.clone(), answer.feedback.as_deref());
                    if let Some(id) = answer.message_id.as_deref() {
                        feedback.sync(self.state.feedback_for(id));
                    }
                    self.entries.push(Entry::Answer(RenderedAnswer {
                        parsed,
                        blocks,
                        feedback,
                    }));
                }
                _ => {}
            }
        }
    }

    fn answer_mut(&mut self, index: usize) -> Option<&mut RenderedAnswer> {
        match self.entries.get_mut(index) {
            Some(Entry::Answer(answer)) => Some(answer),
            _ => None,
        }
    }

    fn apply_effects(&mut self, effects: Vec<FeedbackEffect>) -> Task<Message> {
        let mut tasks = Vec::new();
        for effect in effects {
            match effect {
                FeedbackEffect::Dispatch {
                    message_id,
                    feedback,
                } => self.dispatch(Action::SetFeedbackState {
                    answer_id: message_id,
                    feedback,
                }),
                FeedbackEffect::Persist { message_id, value } => {
                    if let Some(value) = self.persist_queue.enqueue(&message_id, value) {
                        tasks.push(self.persist(message_id, value));
                    }
                }
                FeedbackEffect::OpenDialog | FeedbackEffect::CloseDialog => {}
            }
        }
        Task::batch(tasks)
    }

    fn persist(&self, message_id: String, value: FeedbackValue) -> Task<Message> {
        let client = self.client.clone();
        Task::perform(
            async move {
                let result = client
                    .submit_feedback(&message_id, &value)
                    .await
                    .map(|response| response.ok)
                    .map_err(|e| e.to_string());
                (message_id, result)
            },
            |(message_id, result)| Message::FeedbackPersisted(message_id, result),
        )
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::InputChanged(value) => {
                self.input_text = value;
                Task::none()
            }
            Message::Submit => {
                if self.input_text.trim().is_empty() || self.is_loading {
                    return Task::none();
                }
                if !self.client.is_authenticated() {
                    self.status = Some("No auth token configured.".to_string());
                    return Task::none();
                }

                let prompt = std::mem::take(&mut self.input_text);
                let mut chat = self.state.current_chat.clone().unwrap_or_else(|| Conversation {
                    title: prompt.chars().take(TITLE_LIMIT).collect(),
                    date: chrono::Utc::now().to_rfc3339(),
                    ..Default::default()
                });
                chat.messages.push(ChatMessage::new(Role::User, prompt));
                let messages = chat.messages.clone();
                self.dispatch(Action::UpdateCurrentChat(Some(chat)));
                self.rebuild_entries();

                self.is_loading = true;
                self.status = None;

                let client = self.client.clone();
                Task::perform(
                    async move { client.conversation(&messages).await.map_err(|e| e.to_string()) },
                    Message::AnswerReceived,
                )
            }
            Message::AnswerReceived(result) => {
                self.is_loading = false;
                match result {
                    Ok(messages) => {
                        if let Some(mut chat) = self.state.current_chat.clone() {
                            chat.messages.extend(messages);
                            self.dispatch(Action::UpdateCurrentChat(Some(chat.clone())));
                            self.dispatch(Action::UpdateChatHistory(chat));
                        }
                        self.rebuild_entries();
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "conversation request failed");
                        self.status = Some(format!("Error: {}", e));
                    }
                }
                Task::none()
            }
            Message::SettingsLoaded(result) => {
                let settings = result
                    .map_err(|e| tracing::warn!(error = %e, "could not load frontend settings"))
                    .ok();
                self.dispatch(Action::FetchFrontendSettings(settings));
                Task::none()
            }
            Message::HistoryEnsured(result) => {
                let health = result.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "chat history is unavailable");
                    CosmosDbHealth::default()
                });
                self.dispatch(Action::SetCosmosDbStatus(health));
                Task::none()
            }
            Message::ToggleHistory => {
                self.dispatch(Action::ToggleChatHistory);
                if !self.state.is_chat_history_open
                    || self.state.chat_history_loading_state == ChatHistoryLoadingState::Loading
                {
                    return Task::none();
                }
                self.dispatch(Action::UpdateChatHistoryLoadingState(
                    ChatHistoryLoadingState::Loading,
                ));
                let client = self.client.clone();
                Task::perform(
                    async move { client.list_history(0).await.map_err(|e| e.to_string()) },
                    Message::HistoryLoaded,
                )
            }
            Message::ToggleHelp => {
                self.dispatch(Action::ToggleHelpPanel);
                Task::none()
            }
            Message::ToggleCustomization => {
                self.dispatch(Action::ToggleCustomizationPanel);
                self.draft_preferences = self.state.customization_preferences;
                Task::none()
            }
            Message::ResponseSizeSelected(size) => {
                self.draft_preferences.response_size = size;
                Task::none()
            }
            Message::DocumentsStepped(delta) => {
                self.draft_preferences = self.draft_preferences.step_documents(delta);
                Task::none()
            }
            Message::SavePreferences => {
                self.dispatch(Action::UpdateCustomizationPreferences(self.draft_preferences));
                self.status = Some(match self.state.user_language {
                    Language::Fr => "Préférences enregistrées avec succès!".to_string(),
                    Language::En => "Preferences saved successfully!".to_string(),
                });
                Task::none()
            }
            Message::ResetPreferences => {
                self.draft_preferences = CustomizationPreferences::default();
                self.dispatch(Action::UpdateCustomizationPreferences(self.draft_preferences));
                self.status = Some(match self.state.user_language {
                    Language::Fr => "Préférences réinitialisées".to_string(),
                    Language::En => "Preferences reset to defaults".to_string(),
                });
                Task::none()
            }
            Message::HistoryLoaded(result) => {
                match result {
                    Ok(conversations) => {
                        self.dispatch(Action::FetchChatHistory(Some(conversations)));
                        self.dispatch(Action::UpdateChatHistoryLoadingState(
                            ChatHistoryLoadingState::Success,
                        ));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to load chat history");
                        self.dispatch(Action::UpdateChatHistoryLoadingState(
                            ChatHistoryLoadingState::Fail,
                        ));
                    }
                }
                Task::none()
            }
            Message::SelectConversation(id) => {
                let client = self.client.clone();
                Task::perform(
                    async move {
                        let result = client.read_history(&id).await.map_err(|e| e.to_string());
                        (id, result)
                    },
                    |(id, result)| Message::ConversationLoaded(id, result),
                )
            }
            Message::ConversationLoaded(id, result) => {
                match result {
                    Ok(messages) => {
                        let mut chat = self
                            .state
                            .chat_history
                            .as_ref()
                            .and_then(|history| history.iter().find(|c| c.id == id).cloned())
                            .unwrap_or_else(|| Conversation {
                                id: id.clone(),
                                ..Default::default()
                            });
                        chat.messages = messages;
                        self.dispatch(Action::UpdateCurrentChat(Some(chat)));
                        self.rebuild_entries();
                    }
                    Err(e) => {
                        tracing::error!(conversation_id = %id, error = %e, "failed to read conversation");
                        self.status = Some("Error loading chat history".to_string());
                    }
                }
                Task::none()
            }
            Message::NewChat => {
                self.dispatch(Action::UpdateCurrentChat(None));
                self.rebuild_entries();
                Task::none()
            }
            Message::ClearAllHistory => {
                if !self.state.is_authenticated() {
                    return Task::none();
                }
                let client = self.client.clone();
                Task::perform(
                    async move {
                        client
                            .delete_all_history()
                            .await
                            .map(|response| response.ok)
                            .map_err(|e| e.to_string())
                    },
                    Message::HistoryCleared,
                )
            }
            Message::HistoryCleared(result) => {
                match result {
                    Ok(true) => {
                        self.dispatch(Action::DeleteChatHistory);
                        self.rebuild_entries();
                    }
                    Ok(false) => {
                        self.status = Some("Error deleting all of chat history".to_string());
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to clear chat history");
                        self.status = Some("Error deleting all of chat history".to_string());
                    }
                }
                Task::none()
            }
            Message::Like(index) => {
                let authenticated = self.state.is_authenticated();
                let effects = self
                    .answer_mut(index)
                    .map(|answer| answer.feedback.like(authenticated))
                    .unwrap_or_default();
                self.apply_effects(effects)
            }
            Message::Dislike(index) => {
                let authenticated = self.state.is_authenticated();
                let effects = self
                    .answer_mut(index)
                    .map(|answer| answer.feedback.dislike(authenticated))
                    .unwrap_or_default();
                self.apply_effects(effects)
            }
            Message::ReasonToggled(index, reason, checked) => {
                if let Some(answer) = self.answer_mut(index) {
                    answer.feedback.toggle_reason(reason, checked);
                }
                Task::none()
            }
            Message::ShowInappropriate(index) => {
                if let Some(answer) = self.answer_mut(index) {
                    answer.feedback.show_inappropriate();
                }
                Task::none()
            }
            Message::SubmitReasons(index) => {
                let authenticated = self.state.is_authenticated();
                let effects = self
                    .answer_mut(index)
                    .map(|answer| answer.feedback.submit_reasons(authenticated))
                    .unwrap_or_default();
                self.apply_effects(effects)
            }
            Message::DismissDialog(index) => {
                let effects = self
                    .answer_mut(index)
                    .map(|answer| answer.feedback.dismiss_dialog())
                    .unwrap_or_default();
                self.apply_effects(effects)
            }
            Message::FeedbackPersisted(message_id, result) => {
                let failure = match result {
                    Ok(true) => None,
                    Ok(false) => Some("the server rejected it".to_string()),
                    Err(e) => Some(e),
                };
                if let Some(reason) = failure {
                    tracing::warn!(message_id = %message_id, reason = %reason, "feedback was not saved");
                    notify_failure(&format!("Feedback was not saved: {}", reason));
                }
                match self.persist_queue.complete(&message_id) {
                    Some(next) => self.persist(message_id, next),
                    None => Task::none(),
                }
            }
            Message::ToggleReferences(index) => {
                if !self.expanded_references.remove(&index) {
                    self.expanded_references.insert(index);
                }
                Task::none()
            }
            Message::OpenDocument(request) => {
                tracing::info!(action = request.action.as_str(), id_doc = %request.id_doc, "open document");
                self.status = Some(format!(
                    "{} {} (id copied)",
                    request.action.as_str(),
                    request.id_doc
                ));
                clipboard::write(request.id_doc)
            }
            Message::CopyAnswer(index) => match self.entries.get(index) {
                Some(Entry::Answer(answer)) => clipboard::write(answer.plain_text()),
                _ => Task::none(),
            },
            Message::Export => {
                let Some(chat) = self.state.current_chat.as_ref() else {
                    return Task::none();
                };
                let today = chrono::Local::now().date_naive();
                let result = ExportPlan::from_conversation(chat, self.state.user_language, today)
                    .and_then(|plan| plan.write_to(&Config::export_dir()));
                self.status = Some(match result {
                    Ok(path) => format!("Exported to {}", path.display()),
                    Err(e) => {
                        tracing::error!(error = %e, "export failed");
                        format!("Export failed: {}", e)
                    }
                });
                Task::none()
            }
            Message::Tick => {
                if self.is_loading {
                    self.loading_frame = (self.loading_frame + 1) % 80;
                }
                Task::none()
            }
            Message::Exit => iced::exit(),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.is_loading {
            time::every(Duration::from_millis(80)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| {
            if let IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) = event
            {
                Some(Message::Exit)
            } else {
                None
            }
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<Message> {
        let history_label = if self.state.is_chat_history_open {
            "[Hide history]"
        } else {
            "[Show history]"
        };
        let mut toolbar = row![
            button(text(history_label).size(14)).on_press(Message::ToggleHistory),
            button(text("[Help]").size(14)).on_press(Message::ToggleHelp),
            button(text("[Customize]").size(14)).on_press(Message::ToggleCustomization),
            button(text("[New chat]").size(14)).on_press(Message::NewChat),
        ]
        .spacing(8);
        if self.state.show_export_button() {
            let has_messages = self
                .state
                .current_chat
                .as_ref()
                .is_some_and(|chat| !chat.messages.is_empty());
            toolbar = toolbar.push(
                button(text("[Export]").size(14)).on_press_maybe(has_messages.then_some(Message::Export)),
            );
        }

        let input = text_input("Ask a question...", &self.input_text)
            .on_input(Message::InputChanged)
            .on_submit(Message::Submit)
            .padding(15)
            .size(18)
            .id(self.input_id.clone());

        let output: Element<Message> = if self.is_loading {
            let loading_frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
            let spinner_idx = self.loading_frame % loading_frames.len();

            container(
                column![
                    text(loading_frames[spinner_idx]).size(32),
                    text("Searching your documents...").size(15)
                ]
                .spacing(10)
                .align_x(alignment::Horizontal::Center),
            )
            .width(Length::Fill)
            .height(Length::Fill)
            .align_x(alignment::Horizontal::Center)
            .align_y(alignment::Vertical::Center)
            .into()
        } else {
            scrollable(container(self.view_entries()).padding(15).width(Length::Fill))
                .height(Length::Fill)
                .into()
        };

        let mut main_column = column![toolbar, input].spacing(10).padding(10);
        if self.state.is_help_panel_open {
            main_column = main_column.push(view_help());
        }
        if self.state.is_customization_panel_open {
            main_column = main_column.push(self.view_customization());
        }
        main_column = main_column.push(output);
        if let Some(status) = &self.status {
            main_column = main_column.push(text(status.clone()).size(13));
        }

        let content: Element<Message> = if self.state.is_chat_history_open {
            row![self.view_history(), main_column].spacing(10).into()
        } else {
            main_column.into()
        };

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn view_history(&self) -> Element<Message> {
        let mut list = Column::new().spacing(6).padding(10).width(Length::Fixed(240.0));
        list = list.push(text("Chat history").size(16));

        match self.state.chat_history_loading_state {
            ChatHistoryLoadingState::Loading => {
                list = list.push(text("Loading chat history").size(13));
            }
            ChatHistoryLoadingState::Fail => {
                list = list.push(text("Error loading chat history").size(13));
            }
            _ => {
                for conversation in self.state.chat_history.iter().flatten() {
                    let title: String = conversation.title.chars().take(TITLE_LIMIT).collect();
                    list = list.push(
                        button(text(title).size(13))
                            .on_press(Message::SelectConversation(conversation.id.clone()))
                            .width(Length::Fill),
                    );
                }
            }
        }

        let has_history = self
            .state
            .chat_history
            .as_ref()
            .is_some_and(|history| !history.is_empty());
        list = list.push(
            button(text("[Clear all]").size(13))
                .on_press_maybe(has_history.then_some(Message::ClearAllHistory)),
        );

        scrollable(list).height(Length::Fill).into()
    }

    fn view_customization(&self) -> Element<Message> {
        let language = self.state.user_language;
        let draft = self.draft_preferences;

        let mut sizes = row![].spacing(8);
        for size in ResponseSize::ALL {
            sizes = sizes.push(radio(
                size.label(language),
                size,
                Some(draft.response_size),
                Message::ResponseSizeSelected,
            ));
        }

        let documents_label = match language {
            Language::Fr => "Nombre de documents",
            Language::En => "Number of Documents",
        };
        let documents = row![
            button(text("-").size(13)).on_press_maybe(
                (draft.documents_count > CustomizationPreferences::MIN_DOCUMENTS)
                    .then_some(Message::DocumentsStepped(-1))
            ),
            text(format!("{} documents", draft.documents_count)).size(13),
            button(text("+").size(13)).on_press_maybe(
                (draft.documents_count < CustomizationPreferences::MAX_DOCUMENTS)
                    .then_some(Message::DocumentsStepped(1))
            ),
        ]
        .spacing(8)
        .align_y(alignment::Vertical::Center);

        let changed = draft != self.state.customization_preferences;
        column![
            text(documents_label).size(13),
            documents,
            sizes,
            row![
                button(text("Save").size(13))
                    .on_press_maybe(changed.then_some(Message::SavePreferences)),
                button(text("Reset").size(13)).on_press(Message::ResetPreferences),
                button(text("Close").size(13)).on_press(Message::ToggleCustomization),
            ]
            .spacing(8),
        ]
        .spacing(6)
        .padding(10)
        .into()
    }

    fn view_entries(&self) -> Element<Message> {
        let mut entries = Column::new().spacing(16);
        for (index, entry) in self.entries.iter().enumerate() {
            entries = entries.push(match entry {
                Entry::Question(question) => text(format!("> {}", question)).size(15).into(),
                Entry::Answer(answer) => self.view_answer(index, answer),
            });
        }
        entries.into()
    }

    fn view_answer<'a>(&'a self, index: usize, answer: &'a RenderedAnswer) -> Element<'a, Message> {
        let mut body = Column::new().spacing(8);

        if answer.parsed.is_none() {
            body = body.push(text("(no answer to display)").size(13));
        }
        for block in &answer.blocks {
            body = body.push(view_block(block));
        }

        if let Some(chart) = answer.parsed.as_ref().and_then(|p| p.generated_chart.as_ref()) {
            let size = base64::engine::general_purpose::STANDARD
                .decode(chart.trim())
                .map(|bytes| bytes.len())
                .unwrap_or(0);
            body = body.push(text(format!("[chart: {} bytes]", size)).size(13));
        }

        let mut footer = row![button(text("[Copy]").size(13)).on_press(Message::CopyAnswer(index))].spacing(8);
        let citations = answer
            .parsed
            .as_ref()
            .map(|p| p.citations.as_slice())
            .unwrap_or_default();
        if !citations.is_empty() {
            let arrow = if self.expanded_references.contains(&index) { "v" } else { ">" };
            footer = footer.push(
                button(text(format!("{} {}", references_label(citations.len()), arrow)).size(13))
                    .on_press(Message::ToggleReferences(index)),
            );
        }
        if self.feedback_enabled() && answer.feedback.message_id().is_some() {
            let like = if answer.feedback.is_liked() { "[+1 *]" } else { "[+1]" };
            let dislike = if answer.feedback.is_disliked() { "[-1 *]" } else { "[-1]" };
            footer = footer
                .push(button(text(like).size(13)).on_press(Message::Like(index)))
                .push(button(text(dislike).size(13)).on_press(Message::Dislike(index)));
        }
        body = body.push(footer);

        if self.expanded_references.contains(&index) {
            for (i, citation) in citations.iter().enumerate() {
                let mut line = row![text(format!(
                    "{}. {}",
                    i + 1,
                    citation_label(citation, i + 1, true)
                ))
                .size(13)]
                .spacing(8);
                if should_display_citation_link(citation) {
                    if let Some(request) = document_request(citation, DocumentAction::OpenIdDoc) {
                        line = line.push(
                            button(text("Open document").size(12))
                                .on_press(Message::OpenDocument(request)),
                        );
                    }
                }
                if should_display_attachment_link(citation) {
                    if let Some(request) =
                        document_request(citation, DocumentAction::OpenAttachmentsIdDoc)
                    {
                        line = line.push(
                            button(text("Open attachment").size(12))
                                .on_press(Message::OpenDocument(request)),
                        );
                    }
                }
                body = body.push(line);
            }
        }

        if let Some(dialog) = answer.feedback.dialog() {
            let mut form = Column::new().spacing(4).padding(Padding::from([10, 10]));
            form = form.push(text("Your feedback will improve this experience.").size(13));
            let heading = if dialog.show_inappropriate {
                "The content is :"
            } else {
                "Why wasn't this response helpful ?"
            };
            form = form.push(text(heading).size(13));
            for reason in dialog.visible_reasons() {
                let reason = *reason;
                form = form.push(
                    checkbox(reason.label(), dialog.is_selected(reason))
                        .on_toggle(move |checked| Message::ReasonToggled(index, reason, checked)),
                );
            }
            if !dialog.show_inappropriate {
                form = form.push(
                    button(text("Report inappropriate content").size(12))
                        .on_press(Message::ShowInappropriate(index)),
                );
            }
            form = form.push(
                row![
                    button(text("Submit").size(13))
                        .on_press_maybe(dialog.can_submit().then_some(Message::SubmitReasons(index))),
                    button(text("Cancel").size(13)).on_press(Message::DismissDialog(index)),
                ]
                .spacing(8),
            );
            body = body.push(container(form).width(Length::Fill));
        }

        body.into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}

fn view_block<'a>(block: &Block) -> Element<'a, Message> {
    let size = match block.kind {
        BlockKind::Heading(1) => 20,
        BlockKind::Heading(_) => 17,
        _ => 15,
    };
    let prefix = match block.kind {
        BlockKind::ListItem => "• ",
        BlockKind::Quote => "| ",
        _ => "",
    };

    let body = text(format!("{}{}", prefix, block.plain_text())).size(size);
    let links: Vec<(String, String)> = block
        .inlines
        .iter()
        .filter_map(|inline| match inline {
            Inline::Link { label, target } => Some((label.clone(), target.clone())),
            _ => None,
        })
        .collect();
    if links.is_empty() {
        return body.into();
    }

    let mut link_row = row![].spacing(8);
    for (label, target) in links {
        link_row = link_row.push(
            button(text(label).size(12)).on_press(Message::OpenDocument(DocumentRequest {
                action: DocumentAction::OpenIdDoc,
                id_doc: target,
            })),
        );
    }
    column![body, link_row].spacing(4).into()
}

fn view_help<'a>() -> Element<'a, Message> {
    column![
        text("Help").size(16),
        text("Ask a question about your documents. Answers cite their sources as [n];").size(13),
        text("open the references list to see each source and open the document.").size(13),
        text("Use [+1] / [-1] to rate an answer. Press Escape to quit.").size(13),
    ]
    .spacing(4)
    .padding(10)
    .into()
}

fn notify_failure(body: &str) {
    if let Err(e) = notify_rust::Notification::new()
        .summary("citebar")
        .body(body)
        .show()
    {
        tracing::warn!(error = %e, "could not show desktop notification");
    }
}
