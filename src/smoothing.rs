// src/smoothing.rs
// Sliding-window mean over a sub-range of one waveform

/// Bounded moving average.
///
/// For every centre `c` in `lo + n .. hi - n - 1` the output holds the mean of
/// the `2n` samples in `c - n .. c + n`. Windows are clipped to the waveform and
/// a window holding no samples averages to zero, so the output length depends
/// only on the sub-range and never on the waveform length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowedSmoother {
    half_window: usize,
    low: usize,
    high: usize,
}

impl WindowedSmoother {
    pub fn new(half_window: usize, low: usize, high: usize) -> Self {
        WindowedSmoother {
            half_window,
            low,
            high,
        }
    }

    /// Number of means produced per waveform.
    pub fn output_len(&self) -> usize {
        self.high
            .saturating_sub(self.low)
            .saturating_sub(self.half_window.saturating_mul(2).saturating_add(1))
    }

    /// Leading means whose windows hold at least one sample of a waveform of
    /// `samples` samples. Means past this point are the zero fill.
    pub fn covered_len(&self, samples: usize) -> usize {
        samples.saturating_sub(self.low).min(self.output_len())
    }

    pub fn smooth(&self, waveform: &[f64]) -> Vec<f64> {
        let n = self.half_window;
        let first = self.low.saturating_add(n);
        (first..first + self.output_len())
            .map(|centre| {
                let start = (centre - n).min(waveform.len());
                let end = (centre + n).min(waveform.len());
                let window = &waveform[start..end];
                if window.is_empty() {
                    0.0
                } else {
                    window.iter().sum::<f64>() / window.len() as f64
                }
            })
            .collect()
    }
}
