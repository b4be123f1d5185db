//! Spectral analysis primitives for RR interval series
//!
//! RR intervals arrive at irregular times (one sample per beat), so spectral
//! estimation needs three steps:
//!
//! 1. **Resampling**: the tachogram is placed on its own time axis (each interval
//!    starts where the previous one ended) and linearly interpolated onto a
//!    uniform grid, 4 Hz by convention.
//! 2. **Welch PSD**: the resampled signal is split into 50% overlapping segments,
//!    each demeaned and Hann-windowed, and their periodograms are averaged.
//!    Output is a one-sided power spectral density in ms²/Hz.
//! 3. **Band integration**: the PSD is integrated with the trapezoidal rule
//!    across the standard HRV bands.
//!
//! | Band | Range (Hz)     | Physiology                          |
//! |------|----------------|-------------------------------------|
//! | VLF  | 0.0033 - 0.04  | thermoregulation, hormonal          |
//! | LF   | 0.04 - 0.15    | mixed sympathetic / parasympathetic |
//! | HF   | 0.15 - 0.40    | respiratory sinus arrhythmia, vagal |

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Half-open frequency interval `[low, high)` in Hz
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyBand {
    pub low: f64,
    pub high: f64,
}

impl FrequencyBand {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, frequency: f64) -> bool {
        frequency >= self.low && frequency < self.high
    }
}

/// Very low frequency band
pub const VLF_BAND: FrequencyBand = FrequencyBand::new(0.0033, 0.04);

/// Low frequency band
pub const LF_BAND: FrequencyBand = FrequencyBand::new(0.04, 0.15);

/// High frequency band
pub const HF_BAND: FrequencyBand = FrequencyBand::new(0.15, 0.40);

/// One-sided power spectral density estimate
#[derive(Debug, Clone, PartialEq)]
pub struct Periodogram {
    /// Bin frequencies in Hz, ascending from 0 to fs/2
    pub frequencies: Vec<f64>,

    /// Power density per bin (signal units² / Hz)
    pub density: Vec<f64>,
}

/// Interpolate an RR series onto a uniform time grid
///
/// Knots sit at interval start times (seconds) carrying the interval value.
/// The grid covers `[0, total_duration)`; points past the last knot hold the
/// last interval. Intervals must be positive.
pub fn resample_uniform(rr_intervals: &[f64], sample_rate: f64) -> Vec<f64> {
    if rr_intervals.is_empty() {
        return Vec::new();
    }

    let mut knots = Vec::with_capacity(rr_intervals.len());
    let mut elapsed = 0.0;
    for rr in rr_intervals {
        knots.push(elapsed);
        elapsed += rr / 1000.0;
    }

    let step = 1.0 / sample_rate;
    let sample_count = (elapsed / step).ceil() as usize;
    let last = knots.len() - 1;

    let mut resampled = Vec::with_capacity(sample_count);
    let mut cursor = 0;

    for i in 0..sample_count {
        let t = i as f64 * step;
        while cursor < last && knots[cursor + 1] <= t {
            cursor += 1;
        }

        if cursor == last {
            resampled.push(rr_intervals[last]);
        } else {
            let span = knots[cursor + 1] - knots[cursor];
            let fraction = (t - knots[cursor]) / span;
            let (a, b) = (rr_intervals[cursor], rr_intervals[cursor + 1]);
            resampled.push(a + fraction * (b - a));
        }
    }

    resampled
}

/// Periodic Hann window of length `len`
fn hann_window(len: usize) -> Vec<f64> {
    if len == 1 {
        return vec![1.0];
    }

    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / len as f64).cos())
        .collect()
}

/// Welch power spectral density estimate
///
/// Segment length is `min(max_segment_len, signal.len())` with 50% overlap.
/// Each segment is demeaned and Hann-windowed; the one-sided periodograms are
/// density-scaled and averaged.
pub fn welch(signal: &[f64], sample_rate: f64, max_segment_len: usize) -> Periodogram {
    let segment_len = max_segment_len.min(signal.len());
    if segment_len == 0 {
        return Periodogram {
            frequencies: Vec::new(),
            density: Vec::new(),
        };
    }

    let overlap = segment_len / 2;
    let step = segment_len - overlap;
    let segment_count = (signal.len() - overlap) / step;

    let window = hann_window(segment_len);
    let scale = 1.0 / (sample_rate * window.iter().map(|w| w * w).sum::<f64>());

    let bins = segment_len / 2 + 1;
    let mut density = vec![0.0; bins];

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(segment_len);
    let mut buffer = vec![Complex::new(0.0, 0.0); segment_len];

    for segment_index in 0..segment_count {
        let start = segment_index * step;
        let segment = &signal[start..start + segment_len];
        let mean = segment.iter().sum::<f64>() / segment_len as f64;

        for ((slot, &value), &w) in buffer.iter_mut().zip(segment).zip(&window) {
            *slot = Complex::new((value - mean) * w, 0.0);
        }

        fft.process(&mut buffer);

        for (acc, bin) in density.iter_mut().zip(&buffer[..bins]) {
            *acc += bin.norm_sqr() * scale;
        }
    }

    // Fold negative frequencies; DC and an even-length Nyquist bin have no mirror
    let fold_end = if segment_len % 2 == 0 { bins - 1 } else { bins };
    for value in density.iter_mut().take(fold_end).skip(1) {
        *value *= 2.0;
    }

    for value in density.iter_mut() {
        *value /= segment_count as f64;
    }

    let frequencies = (0..bins)
        .map(|k| k as f64 * sample_rate / segment_len as f64)
        .collect();

    Periodogram {
        frequencies,
        density,
    }
}

/// Trapezoidal integral of the PSD over the bins falling inside `band`
pub fn band_power(periodogram: &Periodogram, band: FrequencyBand) -> f64 {
    let in_band: Vec<(f64, f64)> = periodogram
        .frequencies
        .iter()
        .zip(&periodogram.density)
        .filter(|(f, _)| band.contains(**f))
        .map(|(f, p)| (*f, *p))
        .collect();

    in_band
        .windows(2)
        .map(|pair| (pair[1].0 - pair[0].0) * (pair[0].1 + pair[1].1) / 2.0)
        .sum()
}
