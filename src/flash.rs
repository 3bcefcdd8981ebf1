//! One-shot messages carried to the next rendered page through the session.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::AppResult;

const FLASH_KEY: &str = "_flashes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Success,
    Danger,
}

impl Level {
    pub fn css_class(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            level: Level::Danger,
            message: message.into(),
        }
    }
}

/// Queues a message for the next page this session renders.
pub async fn push(session: &Session, flash: Flash) -> AppResult<()> {
    let mut pending: Vec<Flash> = session.get(FLASH_KEY).await?.unwrap_or_default();
    pending.push(flash);
    session.insert(FLASH_KEY, pending).await?;

    Ok(())
}

/// Removes and returns every queued message.
pub async fn take(session: &Session) -> AppResult<Vec<Flash>> {
    Ok(session
        .remove::<Vec<Flash>>(FLASH_KEY)
        .await?
        .unwrap_or_default())
}
