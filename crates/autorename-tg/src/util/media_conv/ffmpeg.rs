use crate::prelude::*;
use crate::util::process::{self, RunOptions};
use crate::Result;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Container tags written by the remux. Fields that are `None` are not
/// written at all, so the tags of the source container are preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RemuxTags {
    Video {
        title: Option<String>,
        author: Option<String>,
        artist: Option<String>,
        video: Option<String>,
        audio: Option<String>,
        subtitle: Option<String>,
    },
    Audio {
        title: Option<String>,
        artist: Option<String>,
        genre: Option<String>,
        album: Option<String>,
    },
}

impl RemuxTags {
    /// Pairs of the `-metadata` option (with an optional stream selector)
    /// and `key=value` argument.
    fn metadata_args(&self) -> Vec<(&'static str, String)> {
        let fields = match self {
            Self::Video {
                title,
                author,
                artist,
                video,
                audio,
                subtitle,
            } => vec![
                ("-metadata", "title", title),
                ("-metadata", "author", author),
                ("-metadata", "artist", artist),
                ("-metadata:s:v", "title", video),
                ("-metadata:s:a", "title", audio),
                ("-metadata:s:s", "title", subtitle),
            ],
            Self::Audio {
                title,
                artist,
                genre,
                album,
            } => vec![
                ("-metadata", "title", title),
                ("-metadata", "artist", artist),
                ("-metadata", "genre", genre),
                ("-metadata", "album", album),
            ],
        };

        fields
            .into_iter()
            .filter_map(|(option, key, value)| {
                let value = value.as_deref()?;
                Some((option, format!("{key}={value}")))
            })
            .collect()
    }
}

/// Builds the arguments for the stream-copying remux with the given tags
pub(crate) fn remux_args(input: &Path, output: &Path, tags: &RemuxTags) -> Vec<String> {
    let mut args: Vec<String> = vec![
        // Overwrite output file without interactive confirmation
        "-y".to_owned(),
        "-i".to_owned(),
        input.to_string_lossy().into_owned(),
    ];

    for (option, value) in tags.metadata_args() {
        args.push(option.to_owned());
        args.push(value);
    }

    #[rustfmt::skip]
    args.extend([
        // Keep every stream of the input (subtitles and attachments too)
        "-map", "0",

        // No re-encoding, only the container is rewritten
        "-c", "copy",

        "-loglevel", "error",
    ].map(ToOwned::to_owned));

    args.push(output.to_string_lossy().into_owned());
    args
}

/// Invocation settings of the ffmpeg suite binaries
#[derive(Debug, Clone)]
pub(crate) struct Ffmpeg {
    pub(crate) ffmpeg: String,
    pub(crate) ffprobe: String,
    pub(crate) remux_timeout: Duration,

    /// Limit for the short informational runs (probe, version)
    pub(crate) probe_timeout: Duration,
}

#[derive(Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Deserialize)]
struct ProbeFormat {
    // ffprobe reports the duration as a decimal string
    duration: Option<String>,
}

impl Ffmpeg {
    #[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
    pub(crate) async fn remux(&self, input: &Path, output: &Path, tags: &RemuxTags) -> Result {
        let args = remux_args(input, output, tags);
        let args: Vec<_> = args.iter().map(String::as_str).collect();

        let opts = RunOptions {
            timeout: Some(self.remux_timeout),
        };

        process::run(&self.ffmpeg, &args, opts)
            .with_duration_log("Remuxing the media container")
            .await?;

        Ok(())
    }

    /// Returns `None` if the container doesn't report its duration
    pub(crate) async fn probe_duration(&self, input: &Path) -> Result<Option<Duration>> {
        let input = input.to_string_lossy();

        #[rustfmt::skip]
        let args = [
            "-v", "error",
            "-show_entries", "format=duration",
            "-of", "json",
            &input,
        ];

        let output: ProbeOutput =
            process::run_json(&self.ffprobe, &args, self.probe_opts()).await?;

        let duration = output
            .format
            .duration
            .and_then(|secs| secs.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64);

        Ok(duration)
    }

    /// First line of `ffmpeg -version`, used to verify the binary is callable
    pub(crate) async fn version(&self) -> Result<String> {
        let output = process::run(&self.ffmpeg, &["-version"], self.probe_opts()).await?;
        let output = String::from_utf8_lossy(&output);
        Ok(output.lines().next().unwrap_or_default().to_owned())
    }

    fn probe_opts(&self) -> RunOptions {
        RunOptions {
            timeout: Some(self.probe_timeout),
        }
    }
}
