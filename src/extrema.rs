// src/extrema.rs
// Per-waveform minimum search and channel-wide reduction

/// Minimum of one waveform and every sample index attaining it.
#[derive(Clone, Debug, PartialEq)]
pub struct Extremum {
    pub value: f64,
    pub indices: Vec<usize>,
}

impl Extremum {
    /// Returns `None` for an empty waveform.
    pub fn of(waveform: &[f64]) -> Option<Self> {
        let value = waveform.iter().copied().reduce(f64::min)?;
        let indices = waveform
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| (v == value).then_some(i))
            .collect();
        Some(Extremum { value, indices })
    }
}

/// Channel-wide minimum taken over already computed per-waveform minima.
pub fn channel_minimum<I: IntoIterator<Item = f64>>(minima: I) -> Option<f64> {
    minima.into_iter().reduce(f64::min)
}

/// Extremum statistics for one channel's set of waveforms.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtremaSummary {
    /// One entry per non-empty waveform, in waveform order.
    pub minima: Vec<f64>,
    /// Every tied minimum index of every waveform, in waveform order.
    pub minimum_indices: Vec<usize>,
    pub channel_minimum: Option<f64>,
    /// Waveform indices whose minimum equals the channel minimum, lowest first.
    pub examples: Vec<usize>,
}

impl ExtremaSummary {
    /// Reduce per-waveform extrema, given in waveform order.
    ///
    /// Ties with the channel minimum are taken in ascending waveform index and
    /// capped at `max_examples`.
    pub fn from_extrema(extrema: &[Option<Extremum>], max_examples: usize) -> Self {
        let minima: Vec<f64> = extrema.iter().flatten().map(|e| e.value).collect();
        let channel_minimum = channel_minimum(minima.iter().copied());

        let minimum_indices = extrema
            .iter()
            .flatten()
            .flat_map(|e| e.indices.iter().copied())
            .collect();

        let examples = match channel_minimum {
            Some(lowest) => extrema
                .iter()
                .enumerate()
                .filter_map(|(i, e)| e.as_ref().filter(|e| e.value == lowest).map(|_| i))
                .take(max_examples)
                .collect(),
            None => Vec::new(),
        };

        ExtremaSummary {
            minima,
            minimum_indices,
            channel_minimum,
            examples,
        }
    }
}
