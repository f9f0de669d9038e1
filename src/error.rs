//! Error taxonomy for the server core.
//!
//! Handlers never propagate errors out of the dispatch loop — every
//! recoverable error is localized and either turned into a `TXT_ERROR`
//! reply or logged and dropped. This type exists so that localization
//! happens at one seam instead of ad hoc string formatting scattered
//! across handlers.

use thiserror::Error;

use crate::proto::CodecError;

/// A recoverable error raised while handling one client or S2S packet.
#[derive(Debug, Error)]
pub enum DuckChatError {
    #[error("not logged in")]
    NotLoggedIn,

    #[error("already subscribed to {0} channels")]
    ChannelLimitExceeded(usize),

    #[error("malformed packet: {0}")]
    Codec(#[from] CodecError),
}

impl DuckChatError {
    /// The input-validation and resource-exhaustion errors (spec.md §7) all
    /// resolve to a `TXT_ERROR` string sent back to the originating client.
    /// Transient I/O and codec errors on the wire are not reported this way
    /// — they're logged and the datagram is dropped, since there's no
    /// guarantee the sender is even a client in good standing.
    pub fn client_message(&self) -> String {
        match self {
            DuckChatError::NotLoggedIn => "not logged in".to_string(),
            DuckChatError::ChannelLimitExceeded(max) => {
                format!("already subscribed to the maximum of {max} channels")
            }
            DuckChatError::Codec(e) => format!("malformed request: {e}"),
        }
    }
}
