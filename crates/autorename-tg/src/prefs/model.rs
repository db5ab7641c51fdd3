use crate::rename::MediaKind;
use crate::util::media_conv::RemuxTags;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UserPrefs {
    pub(crate) format_template: Option<String>,

    /// Overrides the kind of media the renamed file is uploaded as
    pub(crate) media_type: Option<MediaKind>,

    /// Template with `{filename}`, `{filesize}` and `{duration}` placeholders
    pub(crate) caption: Option<String>,

    /// Telegram file id of the custom thumbnail
    pub(crate) thumbnail: Option<String>,

    pub(crate) metadata: Metadata,
}

/// Tags written into the remuxed container. The `audio_*` fields are used
/// for audio files, the rest for video files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Metadata {
    pub(crate) title: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) artist: Option<String>,
    pub(crate) video: Option<String>,
    pub(crate) audio: Option<String>,
    pub(crate) subtitle: Option<String>,
    pub(crate) audio_title: Option<String>,
    pub(crate) audio_artist: Option<String>,
    pub(crate) audio_genre: Option<String>,
    pub(crate) audio_album: Option<String>,
}

/// Names double as the database column names
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum MetadataField {
    Title,
    Author,
    Artist,
    Video,
    Audio,
    Subtitle,
    AudioTitle,
    AudioArtist,
    AudioGenre,
    AudioAlbum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PrefsUpdate {
    FormatTemplate(Option<String>),
    MediaType(Option<MediaKind>),
    Caption(Option<String>),
    Thumbnail(Option<String>),
    Metadata(MetadataField, Option<String>),
}

impl Metadata {
    pub(crate) fn get(&self, field: MetadataField) -> Option<&str> {
        self.field(field).as_deref()
    }

    pub(crate) fn set(&mut self, field: MetadataField, value: Option<String>) {
        *self.field_mut(field) = value;
    }

    fn field(&self, field: MetadataField) -> &Option<String> {
        match field {
            MetadataField::Title => &self.title,
            MetadataField::Author => &self.author,
            MetadataField::Artist => &self.artist,
            MetadataField::Video => &self.video,
            MetadataField::Audio => &self.audio,
            MetadataField::Subtitle => &self.subtitle,
            MetadataField::AudioTitle => &self.audio_title,
            MetadataField::AudioArtist => &self.audio_artist,
            MetadataField::AudioGenre => &self.audio_genre,
            MetadataField::AudioAlbum => &self.audio_album,
        }
    }

    fn field_mut(&mut self, field: MetadataField) -> &mut Option<String> {
        match field {
            MetadataField::Title => &mut self.title,
            MetadataField::Author => &mut self.author,
            MetadataField::Artist => &mut self.artist,
            MetadataField::Video => &mut self.video,
            MetadataField::Audio => &mut self.audio,
            MetadataField::Subtitle => &mut self.subtitle,
            MetadataField::AudioTitle => &mut self.audio_title,
            MetadataField::AudioArtist => &mut self.audio_artist,
            MetadataField::AudioGenre => &mut self.audio_genre,
            MetadataField::AudioAlbum => &mut self.audio_album,
        }
    }

    pub(crate) fn video_tags(&self) -> RemuxTags {
        RemuxTags::Video {
            title: self.title.clone(),
            author: self.author.clone(),
            artist: self.artist.clone(),
            video: self.video.clone(),
            audio: self.audio.clone(),
            subtitle: self.subtitle.clone(),
        }
    }

    pub(crate) fn audio_tags(&self) -> RemuxTags {
        RemuxTags::Audio {
            title: self.audio_title.clone(),
            artist: self.audio_artist.clone(),
            genre: self.audio_genre.clone(),
            album: self.audio_album.clone(),
        }
    }
}

#[cfg(test)]
impl UserPrefs {
    pub(crate) fn apply(&mut self, update: PrefsUpdate) {
        match update {
            PrefsUpdate::FormatTemplate(value) => self.format_template = value,
            PrefsUpdate::MediaType(value) => self.media_type = value,
            PrefsUpdate::Caption(value) => self.caption = value,
            PrefsUpdate::Thumbnail(value) => self.thumbnail = value,
            PrefsUpdate::Metadata(field, value) => self.metadata.set(field, value),
        }
    }
}
