use super::{Metadata, PrefsStore, PrefsUpdate, UserPrefs};
use crate::rename::MediaKind;
use crate::prelude::*;
use crate::Result;
use async_trait::async_trait;
use teloxide::types::UserId;

#[derive(Debug, sqlx::FromRow)]
struct UserPrefsRecord {
    format_template: Option<String>,
    media_type: Option<String>,
    caption: Option<String>,
    thumbnail: Option<String>,
    title: Option<String>,
    author: Option<String>,
    artist: Option<String>,
    video: Option<String>,
    audio: Option<String>,
    subtitle: Option<String>,
    audio_title: Option<String>,
    audio_artist: Option<String>,
    audio_genre: Option<String>,
    audio_album: Option<String>,
}

impl UserPrefsRecord {
    fn into_app(self) -> Result<UserPrefs> {
        let media_type = self
            .media_type
            .map(|media_type| {
                media_type
                    .parse::<MediaKind>()
                    .fatal_ctx(|| format!("Invalid media type in the database: {media_type}"))
            })
            .transpose()?;

        Ok(UserPrefs {
            format_template: self.format_template,
            media_type,
            caption: self.caption,
            thumbnail: self.thumbnail,
            metadata: Metadata {
                title: self.title,
                author: self.author,
                artist: self.artist,
                video: self.video,
                audio: self.audio,
                subtitle: self.subtitle,
                audio_title: self.audio_title,
                audio_artist: self.audio_artist,
                audio_genre: self.audio_genre,
                audio_album: self.audio_album,
            },
        })
    }
}

const USER_PREFS_COLUMNS: &str = "format_template, media_type, caption, thumbnail, \
    title, author, artist, video, audio, subtitle, \
    audio_title, audio_artist, audio_genre, audio_album";

pub(crate) struct PgPrefsRepo {
    db: sqlx::PgPool,
}

impl PgPrefsRepo {
    pub(crate) fn new(db: sqlx::PgPool) -> Self {
        Self { db }
    }
}

fn db_user_id(user: UserId) -> Result<i64> {
    i64::try_from(user.0).fatal_ctx(|| format!("User id doesn't fit into i64: {user}"))
}

impl PrefsUpdate {
    fn column_and_value(self) -> (&'static str, Option<String>) {
        match self {
            PrefsUpdate::FormatTemplate(value) => ("format_template", value),
            PrefsUpdate::MediaType(value) => ("media_type", value.map(|kind| kind.to_string())),
            PrefsUpdate::Caption(value) => ("caption", value),
            PrefsUpdate::Thumbnail(value) => ("thumbnail", value),
            PrefsUpdate::Metadata(field, value) => (field.into(), value),
        }
    }
}

#[async_trait]
impl PrefsStore for PgPrefsRepo {
    /// There is no explicit registration of the user, so the record is
    /// lazily inserted if it doesn't exist.
    #[instrument(skip(self))]
    async fn get(&self, user: UserId) -> Result<UserPrefs> {
        let query = format!(
            "insert into user_prefs (user_id) values ($1) \
            on conflict (user_id) do update set user_id = excluded.user_id \
            returning {USER_PREFS_COLUMNS}"
        );

        sqlx::query_as::<_, UserPrefsRecord>(&query)
            .bind(db_user_id(user)?)
            .fetch_one(&self.db)
            .await?
            .into_app()
    }

    #[instrument(skip(self))]
    async fn set(&self, user: UserId, update: PrefsUpdate) -> Result {
        let (column, value) = update.column_and_value();

        // The column name comes from a closed set of identifiers, it's not user input
        let query = format!(
            "insert into user_prefs (user_id, {column}) values ($1, $2) \
            on conflict (user_id) do update \
            set {column} = excluded.{column}, updated_at = now()"
        );

        sqlx::query(&query)
            .bind(db_user_id(user)?)
            .bind(value)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}
