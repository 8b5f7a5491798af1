//! The coordinator's two user-facing seams: asking before destructive work,
//! and reporting what happened.

use async_trait::async_trait;
use derive_more::Display;
use time::UtcDateTime;

/// A yes/no question put to the user before a destructive operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Prompt {
    pub message: String,
    /// Label of the confirming action ("Clear", "Delete", ...).
    pub action: &'static str,
}
impl Prompt {
    pub fn new(message: impl Into<String>, action: &'static str) -> Self {
        Self { message: message.into(), action }
    }
}

#[async_trait]
pub trait Confirm: Send + Sync {
    /// Returns `true` only if the user accepted.
    async fn confirm(&self, prompt: &Prompt) -> bool;
}

/// Answers every prompt the same way without asking anyone.
#[derive(Clone, Copy, Debug)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, prompt: &Prompt) -> bool {
        tracing::debug!(prompt = %prompt.message, accepted = self.0, "Answering confirmation prompt automatically");
        self.0
    }
}

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Level {
    #[display("success")]
    Success,
    #[display("info")]
    Info,
    #[display("error")]
    Error,
}

/// A transient, user-visible message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
    pub at: UtcDateTime,
}
impl Notice {
    fn new(level: Level, message: impl Into<String>) -> Self {
        Self { level, message: message.into(), at: UtcDateTime::now() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Level::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }
}

pub trait Notify: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Sends notices to the log instead of a UI.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notify for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            Level::Error => tracing::error!(at = %notice.at, "{}", notice.message),
            Level::Success | Level::Info => {
                tracing::info!(at = %notice.at, level = %notice.level, "{}", notice.message)
            },
        }
    }
}
