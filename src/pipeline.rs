// src/pipeline.rs
// Per-channel pre-analysis: smoothing, extrema and distributions

use crate::capture_tools::{open_capture, CalibratedWaveform, CaptureError, Channel};
use crate::distribution::{BinSpec, Distribution};
use crate::export::ExportError;
use crate::extrema::{ExtremaSummary, Extremum};
use crate::smoothing::WindowedSmoother;
use ndarray::ArrayView1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Cannot read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to decode {file}: {source}")]
    Capture {
        file: PathBuf,
        source: CaptureError,
    },

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Parameters of a pre-analysis run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub input_dir: PathBuf,
    pub input_files: Vec<String>,
    pub output_dir: PathBuf,
    /// First sample of the expected signal window.
    pub window_low: usize,
    /// End of the expected signal window.
    pub window_high: usize,
    pub half_window: usize,
    /// Minimum-value histogram resolution for un-windowed waveforms (mV).
    pub raw_resolution_mv: f64,
    /// Minimum-value histogram resolution for smoothed waveforms (mV).
    pub smoothed_resolution_mv: f64,
    pub index_bins: usize,
    pub max_examples: usize,
    pub overlay_waveforms: usize,
    pub progress_interval: usize,
    pub save_artifacts: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            input_dir: PathBuf::from("../data-files/"),
            input_files: Vec::new(),
            output_dir: PathBuf::from("plots/"),
            window_low: 170,
            window_high: 250,
            half_window: 10,
            raw_resolution_mv: 0.4,
            smoothed_resolution_mv: 0.1,
            index_bins: 500,
            max_examples: 3,
            overlay_waveforms: 200,
            progress_interval: 5000,
            save_artifacts: true,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| AnalysisError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            AnalysisError::ConfigParse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn smoother(&self) -> WindowedSmoother {
        WindowedSmoother::new(self.half_window, self.window_low, self.window_high)
    }

    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.input_files
            .iter()
            .map(|name| self.input_dir.join(name))
            .collect()
    }
}

/// What a rendering collaborator draws on one page.
#[derive(Clone, Debug, PartialEq)]
pub enum Series {
    Waveforms(Vec<Vec<f64>>),
    Histogram(Distribution),
}

/// One titled page of a channel document.
#[derive(Clone, Debug, PartialEq)]
pub struct Plot {
    pub title: String,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub series: Series,
}

/// Identifies the artifacts of one channel of one input file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactKey {
    pub file_stem: String,
    pub channel: Channel,
}

/// Receives the pages and the smoothed-minimum summary of each analysed channel.
pub trait ArtifactSink {
    fn emit(&mut self, key: &ArtifactKey, plots: &[Plot], summary: &[f64])
        -> Result<(), ExportError>;
}

/// Extremum statistics of one variant (smoothed or un-windowed) of a channel.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantReport {
    pub extrema: ExtremaSummary,
    pub example_waveforms: Vec<Vec<f64>>,
    pub index_distribution: Distribution,
    pub minimum_distribution: Distribution,
}

impl VariantReport {
    fn new(
        extrema: &[Option<Extremum>],
        waveform: impl Fn(usize) -> Vec<f64>,
        resolution_mv: f64,
        config: &AnalysisConfig,
    ) -> Self {
        let extrema = ExtremaSummary::from_extrema(extrema, config.max_examples);
        VariantReport {
            example_waveforms: extrema.examples.iter().map(|&i| waveform(i)).collect(),
            index_distribution: Distribution::build(
                extrema.minimum_indices.iter().map(|&i| i as f64),
                BinSpec::Count(config.index_bins),
            ),
            minimum_distribution: Distribution::build(
                extrema.minima.iter().copied(),
                BinSpec::Resolution(resolution_mv),
            ),
            extrema,
        }
    }

    fn plots(&self, channel: Channel, pages: &mut Vec<Plot>) {
        for example in &self.example_waveforms {
            pages.push(Plot {
                title: format!("Largest charge waveform for ch{channel}"),
                x_label: "binned time",
                y_label: "charge [mV]",
                series: Series::Waveforms(vec![example.clone()]),
            });
        }
        pages.push(Plot {
            title: format!("Charge peak index for ch{channel}"),
            x_label: "minimum charge bin index",
            y_label: "frequency",
            series: Series::Histogram(self.index_distribution.clone()),
        });
        pages.push(Plot {
            title: format!("Charge peak frequency for ch{channel}"),
            x_label: "minimum charge [mV]",
            y_label: "frequency",
            series: Series::Histogram(self.minimum_distribution.clone()),
        });
    }
}

/// Result of the pre-analysis of one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelReport {
    pub channel: Channel,
    pub num_waveforms: usize,
    /// Leading un-windowed waveforms, for the overlay page.
    pub overlay: Vec<Vec<f64>>,
    pub raw: VariantReport,
    pub smoothed: VariantReport,
}

impl ChannelReport {
    /// Pages in document order: overlay, un-windowed statistics, smoothed statistics.
    pub fn plots(&self) -> Vec<Plot> {
        let mut pages = vec![Plot {
            title: format!(
                "First {} waveforms for ch {}",
                self.overlay.len(),
                self.channel
            ),
            x_label: "binned time",
            y_label: "charge [mV]",
            series: Series::Waveforms(self.overlay.clone()),
        }];
        self.raw.plots(self.channel, &mut pages);
        self.smoothed.plots(self.channel, &mut pages);
        pages
    }

    /// Smoothed per-waveform minima, the persisted summary sequence.
    pub fn summary(&self) -> &[f64] {
        &self.smoothed.extrema.minima
    }
}

fn row_samples<'a>(row: &'a ArrayView1<'a, f64>) -> Cow<'a, [f64]> {
    match row.as_slice() {
        Some(samples) => Cow::Borrowed(samples),
        None => Cow::Owned(row.to_vec()),
    }
}

/// Smooth and extract extrema from every waveform of one channel.
#[instrument(skip_all, fields(channel = %waveforms.channel))]
pub fn analyse_channel(config: &AnalysisConfig, waveforms: &CalibratedWaveform) -> ChannelReport {
    let smoother = config.smoother();
    if smoother.output_len() == 0 {
        warn!(
            "Window {}..{} too narrow for half-window {}, smoothed waveforms are empty",
            config.window_low, config.window_high, config.half_window
        );
    } else if config.window_high > waveforms.samples() {
        warn!(
            "Window end {} exceeds {} samples per waveform, means past the last sample are \
             zero-filled and left out of the smoothed statistics",
            config.window_high,
            waveforms.samples()
        );
    }
    let covered = smoother.covered_len(waveforms.samples());

    let processed = AtomicUsize::new(0);
    let rows: Vec<ArrayView1<f64>> = waveforms.data.outer_iter().collect();
    let per_waveform: Vec<(Vec<f64>, Option<Extremum>, Option<Extremum>)> = rows
        .par_iter()
        .map(|row| {
            let samples = row_samples(row);
            let smoothed = smoother.smooth(&samples);
            let raw_extremum = Extremum::of(&samples);
            let smoothed_extremum = Extremum::of(&smoothed[..covered]);

            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if config.progress_interval > 0 && done % config.progress_interval == 0 {
                info!("event {done}");
            }
            (smoothed, raw_extremum, smoothed_extremum)
        })
        .collect();

    let (smoothed_rows, (raw_extrema, smoothed_extrema)): (Vec<_>, (Vec<_>, Vec<_>)) = per_waveform
        .into_iter()
        .map(|(s, r, m)| (s, (r, m)))
        .unzip();
    info!("Moving average and extrema done");

    let raw = VariantReport::new(
        &raw_extrema,
        |i| waveforms.data.row(i).to_vec(),
        config.raw_resolution_mv,
        config,
    );
    let smoothed = VariantReport::new(
        &smoothed_extrema,
        |i| smoothed_rows[i].clone(),
        config.smoothed_resolution_mv,
        config,
    );

    ChannelReport {
        channel: waveforms.channel,
        num_waveforms: waveforms.num_waveforms(),
        overlay: waveforms
            .data
            .outer_iter()
            .take(config.overlay_waveforms)
            .map(|row| row.to_vec())
            .collect(),
        raw,
        smoothed,
    }
}

/// Decode one capture file and analyse each active channel in turn.
///
/// Only one channel's matrix is held at a time. Returns the number of
/// channels analysed.
#[instrument(skip_all, fields(file = %path.display()))]
pub fn analyse_file<S: ArtifactSink>(
    config: &AnalysisConfig,
    path: &Path,
    sink: &mut S,
) -> Result<usize, AnalysisError> {
    let capture_error = |source| AnalysisError::Capture {
        file: path.to_path_buf(),
        source,
    };

    info!("### Extracting data from '{}'...", path.display());
    let reader = open_capture(path).map_err(capture_error)?;
    let file_stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut analysed = 0;
    for waveforms in reader {
        let waveforms = waveforms.map_err(capture_error)?;
        info!("###### Analyzing channel {}...", waveforms.channel);
        let report = analyse_channel(config, &waveforms);
        drop(waveforms);

        if config.save_artifacts {
            info!("###### Saving...");
            let key = ArtifactKey {
                file_stem: file_stem.clone(),
                channel: report.channel,
            };
            sink.emit(&key, &report.plots(), report.summary())?;
        }
        analysed += 1;
    }
    Ok(analysed)
}

/// Outcome of [`run_pre_analysis`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_analysed: usize,
    pub channels_analysed: usize,
    pub failed_files: Vec<PathBuf>,
}

/// Analyse every configured file. Decode failures skip to the next file;
/// export failures abort the run.
pub fn run_pre_analysis<S: ArtifactSink>(
    config: &AnalysisConfig,
    sink: &mut S,
) -> Result<RunSummary, AnalysisError> {
    info!("Starting extraction and analysis...");
    let mut summary = RunSummary::default();

    for path in config.input_paths() {
        match analyse_file(config, &path, sink) {
            Ok(channels) => {
                summary.files_analysed += 1;
                summary.channels_analysed += channels;
            }
            Err(AnalysisError::Capture { file, source }) => {
                error!("Skipping {}: {source}", file.display());
                summary.failed_files.push(file);
            }
            Err(e) => return Err(e),
        }
    }

    info!("Extraction and analysis finished !");
    Ok(summary)
}
