//! Message channel boundary
//!
//! The engine talks to its requesters through this trait: an
//! acknowledgment when a job is accepted, progress edits while the tool
//! runs, and exactly one terminal notification (media, link, or error
//! text) per job. Implementations adapt a concrete transport (a chat bot
//! API, a test recorder); the engine never sees transport details.

use crate::types::RequesterId;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

/// Errors from message channel operations
///
/// Deliberately separate from the crate [`Error`](crate::Error): most
/// channel calls are best-effort notifications whose failure is logged and
/// swallowed, and the type split keeps that path from being confused with
/// critical-path errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel refused the payload as too large
    #[error("payload exceeds the channel's size limit")]
    PayloadTooLarge,

    /// The message could not be sent, edited, or deleted
    #[error("channel operation failed: {0}")]
    SendFailed(String),
}

/// Handle to a previously sent message, used to edit or delete it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    /// Requester the message was addressed to
    pub requester_id: RequesterId,
    /// Channel-assigned identifier of the message
    pub message_id: i64,
}

/// Outbound messaging operations the engine needs
///
/// Four operations, each of which may fail independently and non-fatally.
/// `reply_to` carries the inbound message identifier so transports that
/// support threading can attach replies to the requesting message.
///
/// # Examples
///
/// ```no_run
/// use media_dl::channel::{MessageChannel, NullChannel};
/// use media_dl::types::RequesterId;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let channel = NullChannel::new();
/// let requester = RequesterId::new("user-1");
///
/// let ack = channel.send_text(&requester, 100, "Working on it...").await?;
/// channel.edit_text(&ack, "Done").await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Send a text message to a requester
    ///
    /// Returns a [`MessageRef`] so the message can be edited later; the
    /// engine uses this to turn the initial acknowledgment into progress
    /// updates and finally into the terminal notification.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when the transport rejects the message.
    async fn send_text(
        &self,
        requester: &RequesterId,
        reply_to: i64,
        text: &str,
    ) -> Result<MessageRef, ChannelError>;

    /// Send a media file to a requester
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::PayloadTooLarge`] when the transport
    /// refuses the file for size, or [`ChannelError::SendFailed`] for any
    /// other transport failure. Either way the engine falls back to link
    /// delivery when one is configured.
    async fn send_media(
        &self,
        requester: &RequesterId,
        reply_to: i64,
        artifact: &Path,
        caption: Option<&str>,
    ) -> Result<(), ChannelError>;

    /// Replace the text of a previously sent message
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when the edit is rejected; callers on the
    /// progress path log and ignore this.
    async fn edit_text(&self, message: &MessageRef, text: &str) -> Result<(), ChannelError>;

    /// Delete a previously sent message
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when the deletion is rejected; the engine
    /// treats this as cosmetic and never propagates it.
    async fn delete_message(&self, message: &MessageRef) -> Result<(), ChannelError>;
}

/// No-op channel for embedding without a transport and for tests
///
/// Every operation succeeds without doing anything; `send_text` hands out
/// sequential message identifiers so edit targets stay distinguishable.
#[derive(Debug, Default)]
pub struct NullChannel {
    next_message_id: AtomicI64,
}

impl NullChannel {
    /// Create a no-op channel
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageChannel for NullChannel {
    async fn send_text(
        &self,
        requester: &RequesterId,
        _reply_to: i64,
        _text: &str,
    ) -> Result<MessageRef, ChannelError> {
        Ok(MessageRef {
            requester_id: requester.clone(),
            message_id: self.next_message_id.fetch_add(1, Ordering::Relaxed),
        })
    }

    async fn send_media(
        &self,
        _requester: &RequesterId,
        _reply_to: i64,
        _artifact: &Path,
        _caption: Option<&str>,
    ) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn edit_text(&self, _message: &MessageRef, _text: &str) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn delete_message(&self, _message: &MessageRef) -> Result<(), ChannelError> {
        Ok(())
    }
}
