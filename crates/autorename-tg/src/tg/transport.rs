use crate::prelude::*;
use crate::rename::{
    MediaKind, ProgressFn, StatusView, Transport, Upload, ABORT_ALL_CALLBACK, ABORT_ALL_LABEL,
};
use crate::{tg, Result};
use async_trait::async_trait;
use pin_project_lite::pin_project;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId, ReplyParameters,
    UserId,
};
use teloxide::utils::markdown;
use teloxide::{ApiError, RequestError};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// [`Transport`] bound to a single private chat with the user
pub(crate) struct TgTransport {
    pub(crate) bot: tg::Bot,
    pub(crate) raw_bot: teloxide::Bot,
    pub(crate) chat: ChatId,
    pub(crate) log_chat: Option<ChatId>,
}

#[async_trait]
impl Transport for TgTransport {
    #[instrument(skip(self, progress))]
    async fn download(
        &self,
        file_id: &str,
        dest: &Path,
        progress: &ProgressFn<'_>,
    ) -> Result<u64> {
        let file = self.raw_bot.get_file(file_id).await?;

        let mut writer = ProgressWriter {
            inner: fs_err::tokio::File::create(dest).await?,
            written: 0,
            progress,
        };

        self.raw_bot
            .download_file(&file.path, &mut writer)
            .with_duration_log("Downloading the file from Telegram")
            .await?;

        writer.shutdown().await?;

        Ok(writer.written)
    }

    #[instrument(skip_all, fields(kind = %upload.kind, file_name = upload.file_name))]
    async fn upload(&self, upload: Upload<'_>) -> Result {
        let file = InputFile::file(upload.path).file_name(upload.file_name.to_owned());
        let thumbnail = upload.thumbnail.map(InputFile::file);
        let caption = upload.caption.to_owned();
        let duration = upload
            .duration
            .map(|duration| u32::try_from(duration.as_secs()).unwrap_or(u32::MAX));

        let request = async {
            match upload.kind {
                MediaKind::Document => {
                    let mut request = self.bot.send_document(self.chat, file).caption(caption);
                    if let Some(thumbnail) = thumbnail {
                        request = request.thumbnail(thumbnail);
                    }
                    request.await
                }
                MediaKind::Video => {
                    let mut request = self
                        .bot
                        .send_video(self.chat, file)
                        .caption(caption)
                        .supports_streaming(true);
                    if let Some(thumbnail) = thumbnail {
                        request = request.thumbnail(thumbnail);
                    }
                    if let Some(duration) = duration {
                        request = request.duration(duration);
                    }
                    request.await
                }
                MediaKind::Audio => {
                    let mut request = self.bot.send_audio(self.chat, file).caption(caption);
                    if let Some(thumbnail) = thumbnail {
                        request = request.thumbnail(thumbnail);
                    }
                    if let Some(duration) = duration {
                        request = request.duration(duration);
                    }
                    request.await
                }
            }
        };

        request
            .with_duration_log("Uploading the file to Telegram")
            .await?;

        Ok(())
    }

    async fn send_status(&self, status: &StatusView) -> Result<MessageId> {
        let mut request = self
            .bot
            .send_message(self.chat, markdown::escape(&status.text));

        if status.abort_button {
            request = request.reply_markup(abort_keyboard());
        }

        Ok(request.await?.id)
    }

    async fn edit_status(&self, id: MessageId, status: &StatusView) -> Result {
        let mut request = self
            .bot
            .edit_message_text(self.chat, id, markdown::escape(&status.text));

        // The keyboard is removed if the markup isn't specified
        if status.abort_button {
            request = request.reply_markup(abort_keyboard());
        }

        match request.await {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_status(&self, id: MessageId) -> Result {
        self.bot.delete_message(self.chat, id).await?;
        Ok(())
    }

    async fn reply(&self, to: MessageId, text: &str) -> Result {
        self.bot
            .send_message(self.chat, markdown::escape(text))
            .reply_parameters(ReplyParameters::new(to).allow_sending_without_reply())
            .await?;
        Ok(())
    }

    async fn log_completed(&self, owner: UserId, original: &str, rendered: &str) -> Result {
        let Some(log_chat) = self.log_chat else {
            return Ok(());
        };

        let text = format!(
            "{} renamed a file\n{}\n{}",
            markdown::user_mention(owner, &owner.to_string()),
            markdown::code_inline(original),
            markdown::code_inline(rendered),
        );

        self.bot.send_message(log_chat, text).await?;

        Ok(())
    }
}

fn abort_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(
        ABORT_ALL_LABEL,
        ABORT_ALL_CALLBACK,
    )]])
}

pin_project! {
    /// Reports the number of bytes written so far after every write
    struct ProgressWriter<'p, W> {
        #[pin]
        inner: W,
        written: u64,
        progress: &'p ProgressFn<'p>,
    }
}

impl<W: AsyncWrite> AsyncWrite for ProgressWriter<'_, W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        let poll = this.inner.poll_write(cx, buf);

        if let Poll::Ready(Ok(written)) = &poll {
            *this.written += *written as u64;
            (this.progress)(*this.written);
        }

        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}
