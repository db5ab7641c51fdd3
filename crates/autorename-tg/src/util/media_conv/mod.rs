mod ffmpeg;
mod thumbnail;

pub(crate) use ffmpeg::*;
pub(crate) use thumbnail::*;

#[derive(Debug, thiserror::Error)]
pub(crate) enum MediaConvError {
    #[error("Couldn't decode the thumbnail image")]
    DecodeImage { source: image::ImageError },

    #[error("Couldn't encode the thumbnail image")]
    EncodeImage { source: image::ImageError },
}
