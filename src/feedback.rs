//! Per-answer feedback: thumbs up/down plus the negative-reason dialog.
//!
//! The machine is pure. Every transition returns the effects the host has to carry out
//! (store dispatch, persistence, dialog visibility), so the same logic drives the desktop
//! app and the tests.

use std::collections::HashMap;

use crate::models::{Feedback, FeedbackValue, INAPPROPRIATE_REASONS, UNHELPFUL_REASONS};

/// Derive the starting state from what the history API stored for a message.
pub fn initialize_answer_feedback(
    message_id: Option<&str>,
    feedback: Option<&str>,
) -> Option<Feedback> {
    message_id?;
    let feedback = feedback?;
    if feedback.split(',').count() > 1 {
        return Some(Feedback::Negative);
    }
    Some(feedback.parse().unwrap_or(Feedback::Neutral))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackEffect {
    /// Record the new state in the shared store.
    Dispatch { message_id: String, feedback: Feedback },
    /// Send the value to the history API.
    Persist { message_id: String, value: FeedbackValue },
    OpenDialog,
    CloseDialog,
}

/// Pending state of the "why wasn't this helpful" dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasonDialog {
    pub selected: Vec<Feedback>,
    pub show_inappropriate: bool,
}

impl ReasonDialog {
    /// The reason group currently on screen.
    pub fn visible_reasons(&self) -> &'static [Feedback] {
        if self.show_inappropriate {
            &INAPPROPRIATE_REASONS
        } else {
            &UNHELPFUL_REASONS
        }
    }

    pub fn is_selected(&self, reason: Feedback) -> bool {
        self.selected.contains(&reason)
    }

    pub fn can_submit(&self) -> bool {
        !self.selected.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackMachine {
    message_id: Option<String>,
    state: Option<Feedback>,
    dialog: Option<ReasonDialog>,
}

impl FeedbackMachine {
    pub fn new(message_id: Option<String>, stored_feedback: Option<&str>) -> Self {
        let state = initialize_answer_feedback(message_id.as_deref(), stored_feedback);
        FeedbackMachine {
            message_id,
            state,
            dialog: None,
        }
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn state(&self) -> Option<Feedback> {
        self.state
    }

    pub fn dialog(&self) -> Option<&ReasonDialog> {
        self.dialog.as_ref()
    }

    pub fn is_liked(&self) -> bool {
        self.state == Some(Feedback::Positive)
    }

    pub fn is_disliked(&self) -> bool {
        !matches!(
            self.state,
            None | Some(Feedback::Positive) | Some(Feedback::Neutral)
        )
    }

    /// Adopt the value held in the shared store, if it has one for this message.
    pub fn sync(&mut self, stored: Option<Feedback>) {
        if self.message_id.is_none() {
            return;
        }
        if let Some(feedback) = stored {
            self.state = Some(feedback);
        }
    }

    pub fn like(&mut self, authenticated: bool) -> Vec<FeedbackEffect> {
        let Some(message_id) = self.message_id.clone() else {
            return Vec::new();
        };
        if !authenticated {
            return Vec::new();
        }

        let next = if self.state == Some(Feedback::Positive) {
            Feedback::Neutral
        } else {
            Feedback::Positive
        };
        self.state = Some(next);

        vec![
            FeedbackEffect::Dispatch {
                message_id: message_id.clone(),
                feedback: next,
            },
            FeedbackEffect::Persist {
                message_id,
                value: FeedbackValue::Single(next),
            },
        ]
    }

    pub fn dislike(&mut self, authenticated: bool) -> Vec<FeedbackEffect> {
        let Some(message_id) = self.message_id.clone() else {
            return Vec::new();
        };
        if !authenticated {
            return Vec::new();
        }

        match self.state {
            None | Some(Feedback::Neutral) | Some(Feedback::Positive) => {
                self.state = Some(Feedback::Negative);
                self.dialog = Some(ReasonDialog::default());
                vec![
                    FeedbackEffect::OpenDialog,
                    FeedbackEffect::Dispatch {
                        message_id,
                        feedback: Feedback::Negative,
                    },
                ]
            }
            Some(_) => {
                self.state = Some(Feedback::Neutral);
                let mut effects = Vec::new();
                if self.dialog.take().is_some() {
                    effects.push(FeedbackEffect::CloseDialog);
                }
                effects.push(FeedbackEffect::Persist {
                    message_id: message_id.clone(),
                    value: FeedbackValue::Single(Feedback::Neutral),
                });
                effects.push(FeedbackEffect::Dispatch {
                    message_id,
                    feedback: Feedback::Neutral,
                });
                effects
            }
        }
    }

    pub fn toggle_reason(&mut self, reason: Feedback, checked: bool) {
        if self.message_id.is_none() {
            return;
        }
        let Some(dialog) = self.dialog.as_mut() else {
            return;
        };
        if checked {
            if !dialog.selected.contains(&reason) {
                dialog.selected.push(reason);
            }
        } else {
            dialog.selected.retain(|selected| *selected != reason);
        }
    }

    pub fn show_inappropriate(&mut self) {
        if let Some(dialog) = self.dialog.as_mut() {
            dialog.show_inappropriate = true;
        }
    }

    pub fn submit_reasons(&mut self, authenticated: bool) -> Vec<FeedbackEffect> {
        let Some(message_id) = self.message_id.clone() else {
            return Vec::new();
        };
        if !authenticated {
            return Vec::new();
        }
        let Some(dialog) = self.dialog.as_ref() else {
            return Vec::new();
        };
        if !dialog.can_submit() {
            return Vec::new();
        }

        let value = FeedbackValue::Reasons(dialog.selected.clone());
        self.dialog = None;
        vec![
            FeedbackEffect::Persist { message_id, value },
            FeedbackEffect::CloseDialog,
        ]
    }

    /// Closing the dialog without submitting drops the dislike altogether.
    pub fn dismiss_dialog(&mut self) -> Vec<FeedbackEffect> {
        if self.dialog.take().is_none() {
            return Vec::new();
        }
        self.state = Some(Feedback::Neutral);
        let mut effects = vec![FeedbackEffect::CloseDialog];
        if let Some(message_id) = self.message_id.clone() {
            effects.push(FeedbackEffect::Dispatch {
                message_id,
                feedback: Feedback::Neutral,
            });
        }
        effects
    }
}

/// Orders persistence calls per message so a slower request never lands after a newer
/// one. While a call is in flight only the latest value is kept.
#[derive(Debug, Default)]
pub struct PersistQueue {
    in_flight: HashMap<String, Option<FeedbackValue>>,
}

impl PersistQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value to send right away, or `None` if it was parked behind a
    /// running call.
    pub fn enqueue(&mut self, message_id: &str, value: FeedbackValue) -> Option<FeedbackValue> {
        match self.in_flight.get_mut(message_id) {
            Some(waiting) => {
                *waiting = Some(value);
                None
            }
            None => {
                self.in_flight.insert(message_id.to_string(), None);
                Some(value)
            }
        }
    }

    /// Mark the running call for `message_id` as done and hand back the parked value,
    /// if any, which is now in flight.
    pub fn complete(&mut self, message_id: &str) -> Option<FeedbackValue> {
        let next = self.in_flight.remove(message_id).flatten();
        if next.is_some() {
            self.in_flight.insert(message_id.to_string(), None);
        }
        next
    }

    pub fn is_in_flight(&self, message_id: &str) -> bool {
        self.in_flight.contains_key(message_id)
    }
}
