use crate::{Action, ActionError};
use std::sync::{Arc, Mutex};

/// Executes actions on behalf of the trigger engine.
///
/// Called outside the shared state lock; implementations may block briefly
/// (a key is held for a few milliseconds).
pub trait ActionSink: Send {
    fn execute(&mut self, action: &Action) -> Result<(), ActionError>;
}

/// Logs actions instead of injecting input.
#[derive(Debug, Default)]
pub struct LogSink;

impl ActionSink for LogSink {
    fn execute(&mut self, action: &Action) -> Result<(), ActionError> {
        tracing::info!(%action, "Action executed");
        Ok(())
    }
}

/// Keeps every executed action; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    executed: Arc<Mutex<Vec<Action>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records and then reports a dispatch failure.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn executed(&self) -> Vec<Action> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

impl ActionSink for RecordingSink {
    fn execute(&mut self, action: &Action) -> Result<(), ActionError> {
        if let Ok(mut log) = self.executed.lock() {
            log.push(*action);
        }
        if self.fail {
            return Err(ActionError::Dispatch("sink configured to fail".into()));
        }
        Ok(())
    }
}

impl<T: ActionSink + ?Sized> ActionSink for Box<T> {
    fn execute(&mut self, action: &Action) -> Result<(), ActionError> {
        (**self).execute(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MouseButton;

    #[test]
    fn recording_sink_shares_log_between_clones() {
        let sink = RecordingSink::new();
        let mut boxed: Box<dyn ActionSink> = Box::new(sink.clone());
        boxed
            .execute(&Action::MouseClick(MouseButton::Left))
            .unwrap();
        assert_eq!(sink.executed(), vec![Action::MouseClick(MouseButton::Left)]);
    }

    #[test]
    fn failing_sink_still_records() {
        let mut sink = RecordingSink::failing();
        let err = sink.execute(&Action::MouseClick(MouseButton::Right)).unwrap_err();
        assert!(matches!(err, ActionError::Dispatch(_)));
        assert_eq!(sink.executed().len(), 1);
    }
}
