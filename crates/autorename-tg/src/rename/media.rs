use crate::util::media_conv::{Ffmpeg, RemuxTags};
use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// External tools that look inside of the media containers
#[async_trait]
pub(crate) trait MediaTools: Send + Sync {
    /// Copies all streams from `input` to `output` rewriting the tags
    async fn remux(&self, input: &Path, output: &Path, tags: &RemuxTags) -> Result;

    async fn probe_duration(&self, input: &Path) -> Result<Option<Duration>>;
}

#[async_trait]
impl MediaTools for Ffmpeg {
    async fn remux(&self, input: &Path, output: &Path, tags: &RemuxTags) -> Result {
        Ffmpeg::remux(self, input, output, tags).await
    }

    async fn probe_duration(&self, input: &Path) -> Result<Option<Duration>> {
        Ffmpeg::probe_duration(self, input).await
    }
}

/// Which set of tags the container supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagFamily {
    Video,
    Audio,
}

#[rustfmt::skip]
const VIDEO_EXTENSIONS: &[&str] = &[
    ".3g2", ".asf", ".avi", ".drc", ".f4v", ".flv", ".gif", ".gifv", ".m2ts", ".m4v",
    ".mkv", ".mov", ".mp4", ".mpe", ".mpeg", ".mpg", ".mpv", ".mxf", ".nsv", ".ogv",
    ".qt", ".rm", ".rmvb", ".svi", ".ts", ".vob", ".webm", ".wmv", ".yuv",
];

#[rustfmt::skip]
const AUDIO_EXTENSIONS: &[&str] = &[
    ".3gp", ".aa", ".aac", ".aax", ".act", ".aiff", ".alac", ".amr", ".ape", ".au",
    ".awb", ".dss", ".dvf", ".flac", ".gsm", ".iklax", ".ivs", ".m4a", ".m4b", ".m4p",
    ".mmf", ".movpkg", ".mp3", ".mpc", ".msv", ".nmf", ".ogg", ".oga", ".mogg", ".opus",
    ".ra", ".rm", ".raw", ".rf64", ".sln", ".tta", ".voc", ".vox", ".wav", ".wma", ".wv",
    ".webm", ".8svx", ".cda",
];

/// Classifies the extension (with the leading dot, any case). Extensions
/// that are in both sets are treated as video.
pub(crate) fn tag_family(extension: &str) -> Option<TagFamily> {
    let extension = extension.to_lowercase();
    let extension = extension.as_str();

    if VIDEO_EXTENSIONS.contains(&extension) {
        Some(TagFamily::Video)
    } else if AUDIO_EXTENSIONS.contains(&extension) {
        Some(TagFamily::Audio)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families() {
        assert_eq!(tag_family(".MKV"), Some(TagFamily::Video));
        assert_eq!(tag_family(".webm"), Some(TagFamily::Video));
        assert_eq!(tag_family(".rm"), Some(TagFamily::Video));
        assert_eq!(tag_family(".flac"), Some(TagFamily::Audio));
        assert_eq!(tag_family(".pdf"), None);
        assert_eq!(tag_family(""), None);
    }
}
