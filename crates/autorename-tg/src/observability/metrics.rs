use super::GLOBAL_LABELS;
use crate::config::from_env_or_panic;
use crate::util::units::{KB, MB};
use metrics_exporter_prometheus::Matcher;
use serde::Deserialize;

/// Histogram buckets to measure the distribution of stage durations in seconds.
/// Remuxing and uploading big files takes minutes, so the tail is long.
const DURATION_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0,
];

const KB_F: f64 = KB as f64;
const MB_F: f64 = MB as f64;

const FILE_SIZE_BUCKETS: &[f64] = &[
    KB_F * 64.,
    KB_F * 256.,
    MB_F * 1.,
    MB_F * 4.,
    MB_F * 16.,
    MB_F * 64.,
    MB_F * 256.,
    MB_F * 512.,
    MB_F * 1024.,
    MB_F * 2048.,
    MB_F * 4096.,
];

#[derive(Deserialize)]
struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    metrics_port: u16,
}

fn default_metrics_port() -> u16 {
    2000
}

pub fn init_metrics() {
    let config: MetricsConfig = from_env_or_panic("");

    let mut builder = metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .set_buckets_for_metric(
            Matcher::Suffix("_duration_seconds".to_owned()),
            DURATION_BUCKETS,
        )
        .and_then(|builder| {
            builder.set_buckets_for_metric(
                Matcher::Suffix("_size_bytes".to_owned()),
                FILE_SIZE_BUCKETS,
            )
        })
        .unwrap_or_else(|err| panic!("BUG: invalid histogram buckets: {err:#?}"));

    for (key, value) in GLOBAL_LABELS {
        builder = builder.add_global_label(*key, *value);
    }

    builder
        .install()
        .unwrap_or_else(|err| panic!("BUG: failed to initialize the metrics listener: {err:#?}"));
}

/// Names of the metrics reported by the bot. They are collected here to
/// keep the label sets consistent across call sites.
pub(crate) mod names {
    pub(crate) const FILES_RECEIVED: &str = "autorename_files_received_total";
    pub(crate) const DUPLICATES_SUPPRESSED: &str = "autorename_duplicates_suppressed_total";
    pub(crate) const JOBS_FINISHED: &str = "autorename_jobs_finished_total";
    pub(crate) const JOB_DURATION: &str = "autorename_job_duration_seconds";
    pub(crate) const STAGE_DURATION: &str = "autorename_stage_duration_seconds";
    pub(crate) const FILE_SIZE: &str = "autorename_file_size_bytes";
}
