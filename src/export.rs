// src/export.rs
// File-backed artifact sink: SVG document per channel plus CSV summary

use crate::pipeline::{ArtifactKey, ArtifactSink, Plot, Series};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Render error: {0}")]
    Render(String),
}

fn render_error<E: Display>(e: E) -> ExportError {
    ExportError::Render(e.to_string())
}

/// Height of one page in the stacked SVG document.
const PAGE_SIZE: (u32, u32) = (800, 480);

type Page<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// Writes `<stem>_ch<X>.svg` and `<stem>_ch<X>_minima.csv` under `output_dir`.
#[derive(Clone, Debug)]
pub struct FileSink {
    output_dir: PathBuf,
}

impl FileSink {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        FileSink {
            output_dir: output_dir.into(),
        }
    }

    pub fn document_path(&self, key: &ArtifactKey) -> PathBuf {
        self.output_dir
            .join(format!("{}_ch{}.svg", key.file_stem, key.channel))
    }

    pub fn summary_path(&self, key: &ArtifactKey) -> PathBuf {
        self.output_dir
            .join(format!("{}_ch{}_minima.csv", key.file_stem, key.channel))
    }
}

impl ArtifactSink for FileSink {
    #[instrument(skip_all, fields(file = %key.file_stem, channel = %key.channel))]
    fn emit(
        &mut self,
        key: &ArtifactKey,
        plots: &[Plot],
        summary: &[f64],
    ) -> Result<(), ExportError> {
        fs::create_dir_all(&self.output_dir)?;

        let document = self.document_path(key);
        render_document(&document, plots)?;
        debug!("Wrote {} pages to {}", plots.len(), document.display());

        let summary_path = self.summary_path(key);
        write_summary(&summary_path, summary)?;
        debug!("Wrote {} minima to {}", summary.len(), summary_path.display());
        Ok(())
    }
}

/// Write the summary sequence as CSV
pub fn write_summary(path: &Path, summary: &[f64]) -> Result<(), ExportError> {
    let mut writer = BufWriter::new(File::create(path)?);

    writeln!(writer, "Waveform,Minimum")?;
    for (idx, value) in summary.iter().enumerate() {
        writeln!(writer, "{},{}", idx, value)?;
    }

    writer.flush()?;
    Ok(())
}

/// Stack every plot vertically in a single SVG.
pub fn render_document(path: &Path, plots: &[Plot]) -> Result<(), ExportError> {
    let pages = plots.len().max(1);
    let root =
        SVGBackend::new(path, (PAGE_SIZE.0, PAGE_SIZE.1 * pages as u32)).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    for (area, plot) in root.split_evenly((pages, 1)).iter().zip(plots) {
        draw_page(area, plot)?;
    }

    root.present().map_err(render_error)?;
    Ok(())
}

fn padded(lo: f64, hi: f64) -> Range<f64> {
    if lo < hi {
        let pad = (hi - lo) * 0.05;
        lo - pad..hi + pad
    } else {
        lo - 1.0..hi + 1.0
    }
}

fn page_bounds(series: &Series) -> (Range<f64>, Range<f64>) {
    match series {
        Series::Waveforms(waveforms) => {
            let width = waveforms.iter().map(Vec::len).max().unwrap_or(0).max(1);
            let (lo, hi) = waveforms
                .iter()
                .flatten()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            let y = if lo.is_finite() {
                padded(lo, hi)
            } else {
                -1.0..1.0
            };
            (0.0..width as f64, y)
        }
        Series::Histogram(distribution) => {
            let top = distribution.counts.iter().copied().max().unwrap_or(0).max(1);
            let x = if distribution.bin_width > 0.0 {
                distribution.min..distribution.max
            } else {
                padded(distribution.min, distribution.max)
            };
            (x, 0.0..top as f64 * 1.1)
        }
    }
}

fn draw_page(area: &Page<'_>, plot: &Plot) -> Result<(), ExportError> {
    let (x_range, y_range) = page_bounds(&plot.series);
    let mut chart = ChartBuilder::on(area)
        .caption(&plot.title, ("sans-serif", 24.0).into_font())
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(x_range, y_range)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc(plot.x_label)
        .y_desc(plot.y_label)
        .draw()
        .map_err(render_error)?;

    match &plot.series {
        Series::Waveforms(waveforms) => {
            let style = if waveforms.len() > 1 {
                BLUE.mix(0.3)
            } else {
                BLUE.mix(1.0)
            };
            for waveform in waveforms {
                let points = waveform.iter().enumerate().map(|(x, &y)| (x as f64, y));
                chart
                    .draw_series(LineSeries::new(points, &style))
                    .map_err(render_error)?;
            }
        }
        Series::Histogram(distribution) => {
            let half = if distribution.bin_width > 0.0 { 0.0 } else { 0.5 };
            chart
                .draw_series(distribution.bins().map(|(lower, upper, count)| {
                    Rectangle::new(
                        [(lower - half, 0.0), (upper + half, count as f64)],
                        BLUE.filled(),
                    )
                }))
                .map_err(render_error)?;
        }
    }
    Ok(())
}
