//! Error types for chatsync-types.

use thiserror::Error;

/// Errors raised while parsing or building chatsync types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// A channel id was not in `type:id` form.
    #[error("invalid channel id: {0:?}")]
    InvalidChannelId(String),

    /// A query could not be rendered into its canonical form.
    #[error("query serialization failed: {0}")]
    QuerySerialization(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TypesError::InvalidChannelId("general".into());
        assert_eq!(err.to_string(), "invalid channel id: \"general\"");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypesError>();
    }
}
