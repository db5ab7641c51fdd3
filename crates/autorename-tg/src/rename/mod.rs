//! Serialized processing of the uploaded files: each chat has a queue with a
//! single worker that drives the files through the renaming pipeline one at
//! a time, and keeps a status message in the chat up to date.

mod caption;
mod error;
mod job;
mod media;
mod pipeline;
mod queue;
mod status;
mod suppressor;
mod transport;

#[cfg(test)]
mod tests;

pub(crate) use error::*;
pub(crate) use job::*;
pub(crate) use media::*;
pub(crate) use pipeline::*;
pub(crate) use queue::*;
pub(crate) use status::*;
pub(crate) use suppressor::*;
pub(crate) use transport::*;

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Deserialize, Clone, Debug)]
pub(crate) struct Config {
    /// Directory where per-job temporary directories are created
    #[serde(default = "default_work_dir")]
    pub(crate) work_dir: PathBuf,

    #[serde(default = "default_ffmpeg")]
    pub(crate) ffmpeg: String,

    #[serde(default = "default_ffprobe")]
    pub(crate) ffprobe: String,

    #[serde(default = "default_remux_timeout_secs")]
    pub(crate) remux_timeout_secs: u64,

    #[serde(default = "default_probe_timeout_secs")]
    pub(crate) probe_timeout_secs: u64,

    #[serde(default = "default_suppression_window_secs")]
    pub(crate) suppression_window_secs: u64,

    #[serde(default = "default_thumbnail_side")]
    pub(crate) thumbnail_side: u32,
}

impl Config {
    pub(crate) fn remux_timeout(&self) -> Duration {
        Duration::from_secs(self.remux_timeout_secs)
    }

    pub(crate) fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub(crate) fn suppression_window(&self) -> Duration {
        Duration::from_secs(self.suppression_window_secs)
    }
}

fn default_work_dir() -> PathBuf {
    "downloads".into()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_owned()
}

fn default_ffprobe() -> String {
    "ffprobe".to_owned()
}

fn default_remux_timeout_secs() -> u64 {
    600
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_suppression_window_secs() -> u64 {
    10
}

fn default_thumbnail_side() -> u32 {
    320
}
