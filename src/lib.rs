pub mod answer_parser;
pub mod api;
pub mod citation;
pub mod config;
pub mod export;
pub mod feedback;
pub mod markdown;
pub mod models;
pub mod state;

pub use answer_parser::{parse_answer, ParsedAnswer};
pub use config::Config;
pub use feedback::{FeedbackEffect, FeedbackMachine};
pub use state::{reduce, Action, AppState};
