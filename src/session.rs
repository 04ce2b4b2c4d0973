//! Session status as an explicit finite-state record.
//!
//! Drives the user-facing status line of a clipping session. State never
//! mutates in place: [`apply`] takes the current state and an event and
//! returns the next state. Setting a status clears both messages, an error
//! clears any prior success, and a success clears any prior error.

/// What the session is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    FetchingSchema,
    ProcessingAi,
    RefiningAi,
    UploadingPage,
}

impl Status {
    /// Short human label for the status line.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::FetchingSchema => "fetching schema",
            Status::ProcessingAi => "processing with AI",
            Status::RefiningAi => "refining with AI",
            Status::UploadingPage => "uploading to Notion",
        }
    }
}

/// The session's status record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub status: Status,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// State transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SetStatus(Status),
    Error(String),
    Success(String),
    Reset,
}

/// Pure transition function: `(state, event) → state`.
pub fn apply(state: SessionState, event: Event) -> SessionState {
    match event {
        Event::SetStatus(status) => SessionState {
            status,
            error: None,
            success: None,
        },
        Event::Error(message) => SessionState {
            status: Status::Idle,
            error: Some(message),
            success: None,
        },
        Event::Success(message) => SessionState {
            status: Status::Idle,
            error: None,
            success: Some(message),
        },
        Event::Reset => SessionState::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_idle_with_no_messages() {
        let state = SessionState::default();
        assert_eq!(state.status, Status::Idle);
        assert!(state.error.is_none());
        assert!(state.success.is_none());
    }

    #[test]
    fn an_error_returns_to_idle_and_clears_success() {
        let state = apply(
            SessionState::default(),
            Event::Success("Page created!".into()),
        );
        let state = apply(state, Event::SetStatus(Status::ProcessingAi));
        assert!(state.success.is_none());

        let state = apply(state, Event::Error("boom".into()));
        assert_eq!(state.status, Status::Idle);
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert!(state.success.is_none());
    }

    #[test]
    fn a_success_clears_a_prior_error() {
        let state = apply(SessionState::default(), Event::Error("boom".into()));
        let state = apply(state, Event::Success("done".into()));
        assert!(state.error.is_none());
        assert_eq!(state.success.as_deref(), Some("done"));
        assert_eq!(state.status, Status::Idle);
    }

    #[test]
    fn setting_a_status_clears_both_messages() {
        let state = apply(SessionState::default(), Event::Error("boom".into()));
        let state = apply(state, Event::SetStatus(Status::FetchingSchema));
        assert_eq!(state.status, Status::FetchingSchema);
        assert!(state.error.is_none());
        assert!(state.success.is_none());
    }

    #[test]
    fn reset_restores_the_initial_state() {
        let state = apply(SessionState::default(), Event::Success("done".into()));
        let state = apply(state, Event::Reset);
        assert_eq!(state, SessionState::default());
    }
}
