//! Edit-session state machine.
//!
//! `Viewing → Editing → Saving → Viewing`, or back to `Editing` with the
//! error when a save fails and the draft is still worth keeping. Cancelling
//! an edit discards the draft.

use crate::error::{ConfigError, Result};
use crate::error_classification::classify;

#[derive(Debug)]
enum SessionState<D> {
    Viewing,
    Editing {
        draft: D,
        last_error: Option<ConfigError>,
    },
    Saving {
        draft: D,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Viewing,
    Editing,
    Saving,
}

#[derive(Debug)]
pub struct EditSession<D> {
    state: SessionState<D>,
}

impl<D> Default for EditSession<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> EditSession<D> {
    pub fn new() -> Self {
        Self {
            state: SessionState::Viewing,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            SessionState::Viewing => Phase::Viewing,
            SessionState::Editing { .. } => Phase::Editing,
            SessionState::Saving { .. } => Phase::Saving,
        }
    }

    fn wrong_phase(&self, action: &str) -> ConfigError {
        ConfigError::validation(format!("Cannot {action} while {:?}", self.phase()))
    }

    pub fn begin_edit(&mut self, draft: D) -> Result<()> {
        if !matches!(self.state, SessionState::Viewing) {
            return Err(self.wrong_phase("start editing"));
        }
        self.state = SessionState::Editing {
            draft,
            last_error: None,
        };
        Ok(())
    }

    pub fn draft(&self) -> Option<&D> {
        match &self.state {
            SessionState::Editing { draft, .. } | SessionState::Saving { draft } => Some(draft),
            SessionState::Viewing => None,
        }
    }

    /// Only while editing; a draft being saved is frozen.
    pub fn draft_mut(&mut self) -> Option<&mut D> {
        match &mut self.state {
            SessionState::Editing { draft, .. } => Some(draft),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<&ConfigError> {
        match &self.state {
            SessionState::Editing { last_error, .. } => last_error.as_ref(),
            _ => None,
        }
    }

    /// Drop the draft and go back to viewing. Returns the discarded draft.
    pub fn cancel(&mut self) -> Option<D> {
        if !matches!(self.state, SessionState::Editing { .. }) {
            return None;
        }
        match std::mem::replace(&mut self.state, SessionState::Viewing) {
            SessionState::Editing { draft, .. } => Some(draft),
            _ => None,
        }
    }

    /// Freeze the draft for saving.
    pub fn begin_save(&mut self) -> Result<&D> {
        if !matches!(self.state, SessionState::Editing { .. }) {
            return Err(self.wrong_phase("save"));
        }
        if let SessionState::Editing { draft, .. } =
            std::mem::replace(&mut self.state, SessionState::Viewing)
        {
            self.state = SessionState::Saving { draft };
        }
        self.draft().ok_or_else(|| ConfigError::validation("Nothing to save"))
    }

    /// Settle a save started with [`begin_save`](Self::begin_save).
    pub fn finish_save<T>(&mut self, result: Result<T>) -> Result<T> {
        let SessionState::Saving { draft } = std::mem::replace(&mut self.state, SessionState::Viewing)
        else {
            return result;
        };
        match result {
            Ok(value) => Ok(value),
            Err(e) if classify(&e).is_recoverable() => {
                tracing::debug!(kind = classify(&e).as_str(), "Save failed, keeping draft");
                self.state = SessionState::Editing {
                    draft,
                    last_error: Some(e.clone()),
                };
                Err(e)
            }
            Err(e) => {
                tracing::warn!(kind = classify(&e).as_str(), "Save failed, draft discarded: {e}");
                Err(e)
            }
        }
    }
}
