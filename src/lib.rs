// src/lib.rs
// Capture Reader Library - Public API

//! # Capture Reader
//!
//! A Rust library for decoding PicoScope 6000 rapid-block capture files and
//! running the per-channel peak pre-analysis over them.
//!
//! ## Features
//!
//! - Decode the bit-packed capture header and the per-channel sample blocks
//! - Calibrate digitizer codes to millivolts
//! - Windowed smoothing over the expected signal region
//! - Per-waveform minimum search with tied-index reporting
//! - Equal-width histograms of peak positions and peak values
//! - SVG/CSV export of each channel's results
//!
//! ## Example
//!
//! ```no_run
//! use capture_reader::{analyse_channel, AnalysisConfig, CaptureFile};
//!
//! let capture = CaptureFile::load("capture.dat").expect("Failed to load file");
//!
//! println!("Waveforms per channel: {}", capture.header.num_waveforms);
//!
//! let config = AnalysisConfig::default();
//! for channel in &capture.channels {
//!     let report = analyse_channel(&config, channel);
//!     println!(
//!         "ch{}: lowest smoothed minimum {:?} mV",
//!         report.channel, report.smoothed.extrema.channel_minimum
//!     );
//! }
//! ```

pub mod calibration;
mod capture_tools;
pub mod distribution;
pub mod export;
pub mod extrema;
pub mod pipeline;
pub mod smoothing;

pub use calibration::{adc_to_mv, mv_to_adc, VoltageRange};
pub use capture_tools::{
    open_capture, write_capture, CalibratedWaveform, CaptureError, CaptureFile, CaptureHeader,
    CaptureReader, Channel, ChannelMask, RawWaveformMatrix, Result, TriggerMask,
    FIXED_HEADER_LEN, MAX_STRING_LEN, NUM_CHANNELS,
};
pub use distribution::{BinSpec, Distribution};
pub use export::{ExportError, FileSink};
pub use extrema::{ExtremaSummary, Extremum};
pub use pipeline::{
    analyse_channel, analyse_file, run_pre_analysis, AnalysisConfig, AnalysisError,
    ArtifactKey, ArtifactSink, ChannelReport, Plot, RunSummary, Series, VariantReport,
};
pub use smoothing::WindowedSmoother;
