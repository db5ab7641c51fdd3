use crate::prefs::PrefsUpdate;
use crate::prelude::*;
use crate::rename::{InboundFile, InboundMedia, MediaKind, Submission, DUPLICATE_REPLY};
use crate::util::DynResult;
use crate::{tg, Error};
use futures::prelude::*;
use std::sync::Arc;
use teloxide::types::{FileMeta, Message, PhotoSize, UserId};

pub(crate) fn filter_file(msg: Message) -> Option<InboundFile> {
    let owner = msg.from.as_ref()?.id;

    let (filename, media) = if let Some(document) = msg.document() {
        let media = inbound_media(&document.file, MediaKind::Document, &document.thumbnail);
        (document.file_name.clone(), media)
    } else if let Some(video) = msg.video() {
        let media = inbound_media(&video.file, MediaKind::Video, &video.thumbnail);
        (video.file_name.clone(), media)
    } else if let Some(audio) = msg.audio() {
        let media = inbound_media(&audio.file, MediaKind::Audio, &audio.thumbnail);
        (audio.file_name.clone(), media)
    } else {
        return None;
    };

    Some(InboundFile {
        owner,
        message: msg.id,
        filename,
        media: Some(media),
    })
}

fn inbound_media(file: &FileMeta, kind: MediaKind, thumbnail: &Option<PhotoSize>) -> InboundMedia {
    InboundMedia {
        file_id: file.id.clone(),
        kind,
        size: file.size.into(),
        thumbnail: thumbnail.as_ref().map(|thumbnail| thumbnail.file.id.clone()),
    }
}

pub(crate) async fn handle_file(ctx: Arc<tg::Ctx>, msg: Message, file: InboundFile) -> DynResult {
    let span = info_span!(
        "handle_file",
        chat = %msg.chat.debug_id(),
        file_name = file.filename.as_deref(),
    );

    async move {
        match ctx.queue(msg.chat.id).enqueue(file).await {
            Submission::Accepted(job) => debug!(%job, "File submitted"),
            Submission::Duplicate => {
                ctx.bot.reply_text(&msg, DUPLICATE_REPLY).await?;
            }
        }

        Ok::<_, Error>(())
    }
    .instrument(span)
    .err_into()
    .await
}

/// Photo that the user wants to see as the thumbnail of the renamed files
#[derive(Clone)]
pub(crate) struct NewThumbnail {
    owner: UserId,
    file_id: String,
}

pub(crate) fn filter_photo(msg: Message) -> Option<NewThumbnail> {
    // Telegram sends several sizes of the photo, the largest one is the last
    let photo = msg.photo()?.last()?;

    Some(NewThumbnail {
        owner: msg.from.as_ref()?.id,
        file_id: photo.file.id.clone(),
    })
}

pub(crate) async fn handle_photo(
    ctx: Arc<tg::Ctx>,
    msg: Message,
    thumbnail: NewThumbnail,
) -> DynResult {
    async move {
        ctx.prefs
            .set(thumbnail.owner, PrefsUpdate::Thumbnail(Some(thumbnail.file_id)))
            .await?;

        info!(owner = %thumbnail.owner, "Thumbnail saved");

        ctx.bot.reply_text(&msg, "✅ Thumbnail saved").await?;

        Ok::<_, Error>(())
    }
    .err_into()
    .await
}
