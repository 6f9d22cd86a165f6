// src/distribution.rs
// Equal-width histograms over [min, max]

/// How the bin count of a [`Distribution`] is chosen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BinSpec {
    /// `round((max - min) / resolution)` bins.
    Resolution(f64),
    /// A fixed number of bins.
    Count(usize),
}

/// Equal-width histogram of a scalar sequence.
///
/// Bins are half-open except the last, which also holds values equal to `max`.
/// There is always at least one bin, and the counts always sum to the input
/// length.
#[derive(Clone, Debug, PartialEq)]
pub struct Distribution {
    pub min: f64,
    pub max: f64,
    pub bin_width: f64,
    pub counts: Vec<usize>,
}

impl Distribution {
    pub fn build<I>(values: I, spec: BinSpec) -> Self
    where
        I: IntoIterator<Item = f64>,
        I::IntoIter: Clone,
    {
        let values = values.into_iter();
        let (min, max) = values
            .clone()
            .fold(None, |range: Option<(f64, f64)>, v| match range {
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                None => Some((v, v)),
            })
            .unwrap_or((0.0, 0.0));

        let span = max - min;
        let bin_count = match spec {
            BinSpec::Resolution(resolution) if resolution > 0.0 => (span / resolution).round(),
            BinSpec::Resolution(_) => 1.0,
            BinSpec::Count(count) => count as f64,
        };
        // Degenerate ranges collapse to a single bin.
        let bin_count = if span > 0.0 && bin_count >= 1.0 {
            bin_count as usize
        } else {
            1
        };
        let bin_width = span / bin_count as f64;

        let mut counts = vec![0; bin_count];
        for v in values {
            let bin = if bin_width > 0.0 {
                ((v - min) / bin_width).floor() as usize
            } else {
                0
            };
            counts[bin.min(bin_count - 1)] += 1;
        }

        Distribution {
            min,
            max,
            bin_width,
            counts,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// `(lower edge, upper edge, count)` for every bin.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, usize)> + '_ {
        self.counts.iter().enumerate().map(move |(i, &count)| {
            let lower = self.min + i as f64 * self.bin_width;
            (lower, lower + self.bin_width, count)
        })
    }
}
