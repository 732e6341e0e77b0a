//! Fetch state of the duty list and its reducer.

use shared::protocol::DutyPage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    LoadStart,
    LoadSuccess(DutyPage),
    LoadError(String),
}

impl FetchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FetchEvent::LoadStart => "load_start",
            FetchEvent::LoadSuccess(_) => "load_success",
            FetchEvent::LoadError(_) => "load_error",
        }
    }
}

/// `data` survives reloads and errors; only a new success replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchState {
    pub loading: bool,
    pub error: Option<String>,
    pub data: Option<DutyPage>,
}

impl FetchState {
    pub fn reduce(self, event: FetchEvent) -> Self {
        match event {
            FetchEvent::LoadStart => Self {
                loading: true,
                error: None,
                ..self
            },
            FetchEvent::LoadSuccess(page) => Self {
                loading: false,
                error: None,
                data: Some(page),
            },
            FetchEvent::LoadError(message) => Self {
                loading: false,
                error: Some(message),
                ..self
            },
        }
    }
}

#[cfg(test)]
#[path = "tests/fetch_state_tests.rs"]
mod tests;
