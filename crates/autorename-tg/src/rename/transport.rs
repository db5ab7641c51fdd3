use super::{MediaKind, StatusView};
use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use teloxide::types::{MessageId, UserId};

/// Receives the number of bytes transferred so far
pub(crate) type ProgressFn<'a> = dyn Fn(u64) + Send + Sync + 'a;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Upload<'a> {
    pub(crate) kind: MediaKind,
    pub(crate) path: &'a Path,
    pub(crate) file_name: &'a str,

    /// Already formatted for the chat markup
    pub(crate) caption: &'a str,

    pub(crate) thumbnail: Option<&'a Path>,
    pub(crate) duration: Option<Duration>,
}

/// The messaging platform as seen from a single chat
#[async_trait]
pub(crate) trait Transport: Send + Sync {
    /// Downloads the file to `dest` and returns its size
    async fn download(&self, file_id: &str, dest: &Path, progress: &ProgressFn<'_>)
        -> Result<u64>;

    async fn upload(&self, upload: Upload<'_>) -> Result;

    async fn send_status(&self, status: &StatusView) -> Result<MessageId>;

    async fn edit_status(&self, id: MessageId, status: &StatusView) -> Result;

    async fn delete_status(&self, id: MessageId) -> Result;

    /// Replies to the user's message with plain text
    async fn reply(&self, to: MessageId, text: &str) -> Result;

    /// Reports a completed job to the maintainers, if they want to see it
    async fn log_completed(&self, _owner: UserId, _original: &str, _rendered: &str) -> Result {
        Ok(())
    }
}
