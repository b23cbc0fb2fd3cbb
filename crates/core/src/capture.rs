use thiserror::Error;

/// Raw task fields as submitted by a client, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInput {
    pub text: Vec<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub progress: Option<u8>,
    pub tags: Vec<String>,
    pub completed: bool,
}

impl TaskInput {
    pub fn require_text(&self) -> Result<(), InputError> {
        if self.text.iter().all(|word| word.trim().is_empty()) {
            return Err(InputError::EmptyName);
        }
        Ok(())
    }
}

/// Fields to change on an existing task; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.priority.is_none()
            && self.tags.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Task name cannot be empty")]
    EmptyName,
    #[error("Task due date is required")]
    MissingDueDate,
    #[error("Unrecognized date '{0}'. Try YYYY-MM-DD, today, tomorrow, +3d, mon")]
    InvalidDate(String),
    #[error("Due date {0} is outside the supported years 0000-9999")]
    DateOutOfRange(String),
    #[error("Unknown priority '{0}': expected low|medium|high")]
    InvalidPriority(String),
    #[error("Progress must be between 0 and 100, got {0}")]
    ProgressOutOfRange(u8),
    #[error("Nothing to change")]
    EmptyPatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_rejects_blank_words() {
        let input = TaskInput {
            text: vec!["  ".into(), "".into()],
            ..TaskInput::default()
        };
        assert_eq!(input.require_text(), Err(InputError::EmptyName));

        let input = TaskInput {
            text: vec!["Essay".into()],
            ..TaskInput::default()
        };
        assert!(input.require_text().is_ok());
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(TaskPatch::default().is_empty());
        let patch = TaskPatch {
            priority: Some("high".into()),
            ..TaskPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
