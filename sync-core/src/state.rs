//! Fetch state machine for one channel list query.
//!
//! This module provides a pure, side-effect-free state machine for the
//! paging lifecycle of a list. It takes events as input and produces a new
//! state plus a list of actions to execute.
//!
//! The actual I/O (remote fetches, cache writes) is performed by
//! chatsync-client. At most one fetch is in flight per state machine: a
//! page request that arrives while fetching is dropped.

/// Paging state of a list - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    /// Nothing fetched yet.
    Idle,
    /// The first page is being fetched.
    FetchingFirstPage,
    /// At least one page is loaded.
    Ready {
        /// The last fetch returned a short page.
        exhausted: bool,
    },
    /// A later page is being fetched.
    FetchingNextPage,
    /// The last fetch failed. Loaded items are kept.
    Failed {
        /// Whether any page was loaded before the failure.
        loaded: bool,
    },
}

impl FetchState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: FetchEvent) -> (Self, Vec<FetchAction>) {
        match (self, event) {
            // Page requests
            (Self::Idle | Self::Failed { loaded: false }, FetchEvent::NextPageRequested) => (
                Self::FetchingFirstPage,
                vec![FetchAction::Fetch { first_page: true }],
            ),
            (
                Self::Ready { exhausted: false } | Self::Failed { loaded: true },
                FetchEvent::NextPageRequested,
            ) => (
                Self::FetchingNextPage,
                vec![FetchAction::Fetch { first_page: false }],
            ),
            (state @ Self::Ready { exhausted: true }, FetchEvent::NextPageRequested) => {
                (state, vec![])
            }

            // Reload
            (
                Self::Idle | Self::Ready { .. } | Self::Failed { .. },
                FetchEvent::ReloadRequested,
            ) => (
                Self::FetchingFirstPage,
                vec![FetchAction::Fetch { first_page: true }],
            ),

            // Completions
            (
                Self::FetchingFirstPage | Self::FetchingNextPage,
                FetchEvent::FetchSucceeded { exhausted },
            ) => (Self::Ready { exhausted }, vec![]),
            (Self::FetchingFirstPage, FetchEvent::FetchFailed { error }) => (
                Self::Failed { loaded: false },
                vec![FetchAction::EmitError { error }],
            ),
            (Self::FetchingNextPage, FetchEvent::FetchFailed { error }) => (
                Self::Failed { loaded: true },
                vec![FetchAction::EmitError { error }],
            ),

            // Requests while fetching, stray completions
            (state, _) => (state, vec![]),
        }
    }

    /// Whether a fetch is in flight.
    pub fn is_fetching(&self) -> bool {
        matches!(self, Self::FetchingFirstPage | Self::FetchingNextPage)
    }
}

impl Default for FetchState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that drive the paging lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// The consumer wants the next page.
    NextPageRequested,
    /// The consumer wants the list rebuilt from the first page.
    ReloadRequested,
    /// A fetch completed.
    FetchSucceeded {
        /// The page was shorter than requested.
        exhausted: bool,
    },
    /// A fetch failed after all retries.
    FetchFailed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Actions to be executed by the list presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAction {
    /// Fetch the window the cursor points at.
    Fetch {
        /// The list is replaced rather than extended.
        first_page: bool,
    },
    /// Emit an error change; the list stays as it is.
    EmitError {
        /// Error message describing the failure.
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        assert_eq!(FetchState::new(), FetchState::Idle);
        assert!(!FetchState::new().is_fetching());
    }

    #[test]
    fn first_request_fetches_first_page() {
        let (state, actions) = FetchState::Idle.on_event(FetchEvent::NextPageRequested);

        assert_eq!(state, FetchState::FetchingFirstPage);
        assert_eq!(actions, vec![FetchAction::Fetch { first_page: true }]);
    }

    #[test]
    fn request_while_fetching_is_dropped() {
        let (state, actions) =
            FetchState::FetchingFirstPage.on_event(FetchEvent::NextPageRequested);
        assert_eq!(state, FetchState::FetchingFirstPage);
        assert!(actions.is_empty());

        let (state, actions) = FetchState::FetchingNextPage.on_event(FetchEvent::ReloadRequested);
        assert_eq!(state, FetchState::FetchingNextPage);
        assert!(actions.is_empty());
    }

    #[test]
    fn success_moves_to_ready() {
        let (state, actions) =
            FetchState::FetchingFirstPage.on_event(FetchEvent::FetchSucceeded { exhausted: false });
        assert_eq!(state, FetchState::Ready { exhausted: false });
        assert!(actions.is_empty());
    }

    #[test]
    fn ready_requests_next_page() {
        let (state, actions) =
            FetchState::Ready { exhausted: false }.on_event(FetchEvent::NextPageRequested);
        assert_eq!(state, FetchState::FetchingNextPage);
        assert_eq!(actions, vec![FetchAction::Fetch { first_page: false }]);
    }

    #[test]
    fn exhausted_list_ignores_page_requests() {
        let (state, actions) =
            FetchState::Ready { exhausted: true }.on_event(FetchEvent::NextPageRequested);
        assert_eq!(state, FetchState::Ready { exhausted: true });
        assert!(actions.is_empty());
    }

    #[test]
    fn reload_from_exhausted_fetches_first_page() {
        let (state, actions) =
            FetchState::Ready { exhausted: true }.on_event(FetchEvent::ReloadRequested);
        assert_eq!(state, FetchState::FetchingFirstPage);
        assert_eq!(actions, vec![FetchAction::Fetch { first_page: true }]);
    }

    #[test]
    fn failure_emits_error_and_keeps_loaded_flag() {
        let (state, actions) = FetchState::FetchingNextPage.on_event(FetchEvent::FetchFailed {
            error: "offline".into(),
        });
        assert_eq!(state, FetchState::Failed { loaded: true });
        assert_eq!(
            actions,
            vec![FetchAction::EmitError {
                error: "offline".into()
            }]
        );

        let (state, _) = FetchState::FetchingFirstPage.on_event(FetchEvent::FetchFailed {
            error: "offline".into(),
        });
        assert_eq!(state, FetchState::Failed { loaded: false });
    }

    #[test]
    fn retry_after_failure_resumes_where_it_stopped() {
        let (state, actions) =
            FetchState::Failed { loaded: true }.on_event(FetchEvent::NextPageRequested);
        assert_eq!(state, FetchState::FetchingNextPage);
        assert_eq!(actions, vec![FetchAction::Fetch { first_page: false }]);

        let (state, actions) =
            FetchState::Failed { loaded: false }.on_event(FetchEvent::NextPageRequested);
        assert_eq!(state, FetchState::FetchingFirstPage);
        assert_eq!(actions, vec![FetchAction::Fetch { first_page: true }]);
    }

    #[test]
    fn stray_completion_is_ignored() {
        let (state, actions) =
            FetchState::Idle.on_event(FetchEvent::FetchSucceeded { exhausted: true });
        assert_eq!(state, FetchState::Idle);
        assert!(actions.is_empty());
    }
}
