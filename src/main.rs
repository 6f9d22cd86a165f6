// src/main.rs
// Command-line front end for the capture pre-analysis

use anyhow::Result;
use capture_reader::{run_pre_analysis, AnalysisConfig, FileSink};
use clap::{Parser, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Decode the configured captures and emit per-channel plots and summaries
    PreAnalyse,
    /// Post-processing over extracted summaries (not implemented)
    Analyse,
}

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(value_enum)]
    mode: Mode,

    /// Capture files, relative to the input directory
    files: Vec<String>,

    /// JSON file holding an analysis configuration
    #[clap(long)]
    config: Option<PathBuf>,

    #[clap(long)]
    input_dir: Option<PathBuf>,

    #[clap(long)]
    output_dir: Option<PathBuf>,

    #[clap(long)]
    window_low: Option<usize>,

    #[clap(long)]
    window_high: Option<usize>,

    #[clap(long)]
    half_window: Option<usize>,

    /// Run the analysis without writing plots or summaries
    #[clap(long, default_value = "false")]
    no_save: bool,
}

impl Cli {
    fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };

        if !self.files.is_empty() {
            config.input_files = self.files.clone();
        }
        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(low) = self.window_low {
            config.window_low = low;
        }
        if let Some(high) = self.window_high {
            config.window_high = high;
        }
        if let Some(half_window) = self.half_window {
            config.half_window = half_window;
        }
        if self.no_save {
            config.save_artifacts = false;
        }
        Ok(config)
    }
}

/// Parse the command line. Usage errors are printed and yield `None`.
fn parse_args<I, T>(args: I) -> std::io::Result<Option<Cli>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => err.print().map(|_| None),
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Some(cli) = parse_args(std::env::args_os())? else {
        return Ok(());
    };

    match cli.mode {
        Mode::PreAnalyse => {
            let config = cli.analysis_config()?;
            if config.input_files.is_empty() {
                warn!("No input files configured");
            }

            let mut sink = FileSink::new(&config.output_dir);
            let summary = run_pre_analysis(&config, &mut sink)?;
            info!(
                "Analysed {} channels in {} files, {} files skipped",
                summary.channels_analysed,
                summary.files_analysed,
                summary.failed_files.len()
            );
        }
        Mode::Analyse => {
            info!("To be done...");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names() {
        let cli = Cli::try_parse_from(["capture_reader", "pre-analyse", "a.dat", "b.dat"]).unwrap();
        assert_eq!(cli.mode, Mode::PreAnalyse);
        assert_eq!(cli.files, vec!["a.dat", "b.dat"]);

        let cli = Cli::try_parse_from(["capture_reader", "analyse"]).unwrap();
        assert_eq!(cli.mode, Mode::Analyse);

        assert!(Cli::try_parse_from(["capture_reader", "extract"]).is_err());
        assert!(Cli::try_parse_from(["capture_reader"]).is_err());
    }

    #[test]
    fn test_usage_error_is_not_fatal() {
        assert!(parse_args(["capture_reader", "extract"]).unwrap().is_none());
        assert!(parse_args(["capture_reader"]).unwrap().is_none());
        let cli = parse_args(["capture_reader", "analyse"]).unwrap().unwrap();
        assert_eq!(cli.mode, Mode::Analyse);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "capture_reader",
            "pre-analyse",
            "x.dat",
            "--output-dir",
            "out",
            "--window-low",
            "100",
            "--no-save",
        ])
        .unwrap();
        let config = cli.analysis_config().unwrap();
        assert_eq!(config.input_files, vec!["x.dat"]);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.window_low, 100);
        assert_eq!(config.window_high, 250);
        assert!(!config.save_artifacts);
    }
}
