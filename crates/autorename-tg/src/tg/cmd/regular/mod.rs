mod metadata;

use crate::prefs::{MetadataField, PrefsUpdate};
use crate::prelude::*;
use crate::rename::MediaKind;
use crate::{err, tg, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ReplyParameters, UserId};
use teloxide::utils::command::BotCommands;
use teloxide::utils::markdown;

#[derive(Debug, thiserror::Error)]
pub(crate) enum CommandError {
    #[error("The /{command} command expects a value after it")]
    MissingValue { command: &'static str },

    #[error("Unknown media type `{input}`, expected one of: document, video, audio")]
    InvalidMediaType { input: String },

    #[error("Expected 4 values separated by `|` (artist|title|genre|album), but got {actual}")]
    InvalidAudioInfo { actual: usize },

    #[error("No thumbnail is saved, send a photo to save one")]
    NoThumbnail,

    #[error("The command must be sent by a user")]
    NoSender,
}

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Commands:")]
pub(crate) enum Cmd {
    #[command(description = "show the guide")]
    Help,

    #[command(description = "set the rename template, e.g. Show S01E{episode} [quality]")]
    Autorename(String),

    #[command(description = "upload the renamed files as a document, video or audio")]
    SetMedia(String),

    #[command(
        rename = "set_caption",
        description = "set the caption with {filename}, {filesize} and {duration}"
    )]
    SetCaption(String),

    #[command(rename = "see_caption", description = "show the caption")]
    SeeCaption,

    #[command(rename = "del_caption", description = "delete the caption")]
    DelCaption,

    #[command(description = "show the thumbnail")]
    ViewThumb,

    #[command(description = "delete the thumbnail")]
    DelThumb,

    #[command(description = "set the title tag of videos")]
    SetTitle(String),

    #[command(description = "set the author tag of videos")]
    SetAuthor(String),

    #[command(description = "set the artist tag of videos")]
    SetArtist(String),

    #[command(description = "set the title of audio streams in videos")]
    SetAudio(String),

    #[command(description = "set the title of subtitle streams in videos")]
    SetSubtitle(String),

    #[command(description = "set the title of video streams in videos")]
    SetVideo(String),

    #[command(description = "set the tags of audio files: artist|title|genre|album")]
    SetAudioInfo(String),

    #[command(description = "show the tags that are written into the files")]
    Metadata,

    #[command(description = "check that ffmpeg is available")]
    Path,
}

#[async_trait]
impl tg::cmd::Command for Cmd {
    async fn handle(self, ctx: &tg::Ctx, msg: &Message) -> Result {
        let user = msg
            .from
            .as_ref()
            .ok_or_else(|| err!(CommandError::NoSender))?
            .id;

        match self {
            Cmd::Help => {
                ctx.bot.reply_help_md_escaped::<Cmd>(msg).await?;
            }
            Cmd::Autorename(template) => {
                let template = required(template, "autorename")?;
                let reply = format!(
                    "✅ Rename format saved: {}",
                    markdown::code_inline(&template)
                );
                set(ctx, user, PrefsUpdate::FormatTemplate(Some(template))).await?;
                ctx.bot.reply_md(msg, reply).await?;
            }
            Cmd::SetMedia(input) => {
                let kind: MediaKind = input
                    .trim()
                    .parse()
                    .map_err(|_| err!(CommandError::InvalidMediaType { input }))?;

                set(ctx, user, PrefsUpdate::MediaType(Some(kind))).await?;
                ctx.bot
                    .reply_text(msg, &format!("✅ Files will be uploaded as {kind}"))
                    .await?;
            }
            Cmd::SetCaption(caption) => {
                let caption = required(caption, "set_caption")?;
                set(ctx, user, PrefsUpdate::Caption(Some(caption))).await?;
                ctx.bot.reply_text(msg, "✅ Caption saved").await?;
            }
            Cmd::SeeCaption => {
                let reply = match ctx.prefs.get(user).await?.caption {
                    Some(caption) => format!("Your caption:\n{}", markdown::code_block(&caption)),
                    None => markdown::escape("You don't have a caption yet, set one via /set_caption"),
                };
                ctx.bot.reply_md(msg, reply).await?;
            }
            Cmd::DelCaption => {
                set(ctx, user, PrefsUpdate::Caption(None)).await?;
                ctx.bot.reply_text(msg, "✅ Caption deleted").await?;
            }
            Cmd::ViewThumb => {
                let thumbnail = ctx
                    .prefs
                    .get(user)
                    .await?
                    .thumbnail
                    .ok_or_else(|| err!(CommandError::NoThumbnail))?;

                ctx.bot
                    .send_photo(msg.chat.id, InputFile::file_id(thumbnail))
                    .reply_parameters(ReplyParameters::new(msg.id))
                    .await?;
            }
            Cmd::DelThumb => {
                set(ctx, user, PrefsUpdate::Thumbnail(None)).await?;
                ctx.bot.reply_text(msg, "✅ Thumbnail deleted").await?;
            }
            Cmd::SetTitle(value) => {
                set_tag(ctx, msg, user, MetadataField::Title, value, "settitle").await?;
            }
            Cmd::SetAuthor(value) => {
                set_tag(ctx, msg, user, MetadataField::Author, value, "setauthor").await?;
            }
            Cmd::SetArtist(value) => {
                set_tag(ctx, msg, user, MetadataField::Artist, value, "setartist").await?;
            }
            Cmd::SetAudio(value) => {
                set_tag(ctx, msg, user, MetadataField::Audio, value, "setaudio").await?;
            }
            Cmd::SetSubtitle(value) => {
                set_tag(ctx, msg, user, MetadataField::Subtitle, value, "setsubtitle").await?;
            }
            Cmd::SetVideo(value) => {
                set_tag(ctx, msg, user, MetadataField::Video, value, "setvideo").await?;
            }
            Cmd::SetAudioInfo(input) => {
                for (field, value) in metadata::parse_audio_info(&input)? {
                    set(ctx, user, PrefsUpdate::Metadata(field, value)).await?;
                }
                ctx.bot.reply_text(msg, "✅ Audio tags saved").await?;
            }
            Cmd::Metadata => {
                let prefs = ctx.prefs.get(user).await?;
                let table = metadata::describe(&prefs.metadata);
                let reply = format!(
                    "{}\n{}",
                    markdown::bold("Your current metadata:"),
                    markdown::code_block(&table)
                );
                ctx.bot.reply_md(msg, reply).await?;
            }
            Cmd::Path => {
                let program = &ctx.ffmpeg.ffmpeg;
                let reply = match ctx.ffmpeg.version().await {
                    Ok(version) => format!(
                        "✅ FFmpeg found at {}\n{}",
                        markdown::code_inline(program),
                        markdown::escape(&version),
                    ),
                    Err(err) => format!(
                        "❌ FFmpeg couldn't be run at {}\n{}",
                        markdown::code_inline(program),
                        markdown::code_block(&err.reason()),
                    ),
                };
                ctx.bot.reply_md(msg, reply).await?;
            }
        }
        Ok(())
    }
}

fn required(value: String, command: &'static str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(err!(CommandError::MissingValue { command }));
    }
    Ok(value.to_owned())
}

async fn set(ctx: &tg::Ctx, user: UserId, update: PrefsUpdate) -> Result {
    ctx.prefs.set(user, update).await
}

async fn set_tag(
    ctx: &tg::Ctx,
    msg: &Message,
    user: UserId,
    field: MetadataField,
    value: String,
    command: &'static str,
) -> Result {
    let value = required(value, command)?;
    let reply = format!(
        "{} {}",
        markdown::escape(&format!("✅ {field} set to")),
        markdown::code_inline(&value)
    );

    set(ctx, user, PrefsUpdate::Metadata(field, Some(value))).await?;
    ctx.bot.reply_md(msg, reply).await?;

    Ok(())
}
