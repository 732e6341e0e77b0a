use crate::{domain::DutyDraft, error::ValidationError};

pub const NAME_MAX_CHARS: usize = 255;

const NAME_REQUIRED: &str = "Name is required";
const NAME_TOO_LONG: &str = "Max 255 characters";

/// A draft that passed the name rules; the name is already trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DutyInput {
    pub name: String,
}

impl DutyDraft {
    pub fn validate(&self) -> Result<DutyInput, ValidationError> {
        let name = self.name.trim();
        let mut messages = Vec::new();

        if name.is_empty() {
            messages.push(NAME_REQUIRED.to_string());
        }
        if name.chars().count() > NAME_MAX_CHARS {
            messages.push(NAME_TOO_LONG.to_string());
        }

        if messages.is_empty() {
            Ok(DutyInput {
                name: name.to_string(),
            })
        } else {
            Err(ValidationError::new(messages))
        }
    }
}
