//! Test helper utilities for generating synthetic composite and IQ signals
#![allow(dead_code)]

use std::f64::consts::PI;

use num_complex::Complex;

pub const PILOT: f64 = 19_000.0;
pub const RDS_CARRIER: f64 = 57_000.0;

/// Generate a real sine tone
///
/// # Arguments
/// * `frequency` - Frequency in Hz
/// * `amplitude` - Peak amplitude
/// * `sample_rate` - Sample rate in Hz
/// * `num_samples` - Number of samples to generate
pub fn tone(frequency: f64, amplitude: f32, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|n| amplitude * (2.0 * PI * frequency * n as f64 / sample_rate).sin() as f32)
        .collect()
}

/// Build a stereo composite `(L+R) + p·sin(φ) + (L−R)·sin(2φ)`
///
/// # Arguments
/// * `lpr` - L+R samples
/// * `lmr` - L−R samples, same length as `lpr`
/// * `pilot_level` - Peak amplitude of the 19 kHz pilot
/// * `sample_rate` - Sample rate in Hz
pub fn stereo_composite(lpr: &[f32], lmr: &[f32], pilot_level: f32, sample_rate: f64) -> Vec<f32> {
    lpr.iter()
        .zip(lmr)
        .enumerate()
        .map(|(n, (&sum, &diff))| {
            let phase = 2.0 * PI * PILOT * n as f64 / sample_rate;
            sum + pilot_level * phase.sin() as f32 + diff * (2.0 * phase).sin() as f32
        })
        .collect()
}

/// Frequency-modulate a composite signal onto a complex baseband carrier
///
/// # Arguments
/// * `mpx` - Modulating signal, ±1.0 maps to ±`deviation`
/// * `deviation` - Peak deviation in Hz
/// * `sample_rate` - Sample rate in Hz
pub fn fm_modulate(mpx: &[f32], deviation: f64, sample_rate: f64) -> Vec<Complex<f32>> {
    let mut phase = 0.0f64;
    mpx.iter()
        .map(|&x| {
            phase += 2.0 * PI * deviation * x as f64 / sample_rate;
            if phase > PI {
                phase -= 2.0 * PI;
            } else if phase < -PI {
                phase += 2.0 * PI;
            }
            Complex::new(phase.cos() as f32, phase.sin() as f32)
        })
        .collect()
}

/// Serialize complex samples as interleaved little-endian f32 (Cf32 format)
pub fn to_cf32_bytes(samples: &[Complex<f32>]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(samples.len() * 8);
    for s in samples {
        buffer.extend_from_slice(&s.re.to_le_bytes());
        buffer.extend_from_slice(&s.im.to_le_bytes());
    }
    buffer
}

/// Mix a baseband waveform onto a `cos` carrier
pub fn mix_cos(baseband: &[f32], frequency: f64, sample_rate: f64) -> Vec<f32> {
    baseband
        .iter()
        .enumerate()
        .map(|(n, &x)| x * (2.0 * PI * frequency * n as f64 / sample_rate).cos() as f32)
        .collect()
}

/// Root mean square of a signal
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Split interleaved stereo into left and right channels
pub fn deinterleave(stereo: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let left = stereo.iter().step_by(2).copied().collect();
    let right = stereo.iter().skip(1).step_by(2).copied().collect();
    (left, right)
}

/// Fraction of consecutive bit pairs that differ
pub fn transition_fraction(bits: &[u8]) -> f64 {
    if bits.len() < 2 {
        return 0.0;
    }
    let transitions = bits.windows(2).filter(|w| w[0] != w[1]).count();
    transitions as f64 / (bits.len() - 1) as f64
}

/// Pseudo-random bits from a 9-bit LFSR (x^9 + x^5 + 1)
pub fn prbs9(count: usize) -> Vec<u8> {
    let mut state: u16 = 0x1ff;
    (0..count)
        .map(|_| {
            let bit = ((state >> 8) ^ (state >> 4)) & 1;
            state = ((state << 1) | bit) & 0x1ff;
            bit as u8
        })
        .collect()
}

/// Best alignment of `decoded` against `sent`.
///
/// Tries every lag in `-max_lag..=max_lag` (decoded bit `i` compared with
/// sent bit `i - lag`) in both polarities, over decoded bits from `skip`
/// onwards. Returns `(lag, inverted, mismatches, compared)` for the fewest
/// mismatches.
pub fn align_bits(
    decoded: &[u8],
    sent: &[u8],
    skip: usize,
    max_lag: isize,
) -> (isize, bool, usize, usize) {
    let mut best = (0, false, usize::MAX, 0);
    for lag in -max_lag..=max_lag {
        let start = (skip as isize).max(lag).max(0) as usize;
        let end = (decoded.len() as isize).min(sent.len() as isize + lag);
        if end <= start as isize {
            continue;
        }
        let end = end as usize;
        let compared = end - start;
        let differ = (start..end)
            .filter(|&i| decoded[i] != sent[(i as isize - lag) as usize])
            .count();
        for (inverted, mismatches) in [(false, differ), (true, compared - differ)] {
            if mismatches < best.2 {
                best = (lag, inverted, mismatches, compared);
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_length_and_peak() {
        let samples = tone(1_000.0, 0.5, 48_000.0, 480);
        assert_eq!(samples.len(), 480);
        assert!((samples[12] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_fm_modulate_unit_magnitude() {
        let iq = fm_modulate(&[0.5; 100], 75_000.0, 384_000.0);
        for s in iq {
            assert!((s.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cf32_bytes_length() {
        let bytes = to_cf32_bytes(&[Complex::new(1.0, -1.0); 10]);
        assert_eq!(bytes.len(), 80);
    }

    #[test]
    fn test_transition_fraction() {
        assert_eq!(transition_fraction(&[0, 1, 0, 1]), 1.0);
        assert_eq!(transition_fraction(&[1, 1, 1]), 0.0);
    }

    #[test]
    fn test_prbs9_period() {
        let bits = prbs9(1_022);
        assert_eq!(&bits[..511], &bits[511..]);
        assert_eq!(bits[..511].iter().filter(|&&b| b == 1).count(), 256);
    }

    #[test]
    fn test_align_bits_finds_lag_and_inversion() {
        let sent = prbs9(400);
        let mut decoded = vec![0u8; 7];
        decoded.extend(sent.iter().map(|b| b ^ 1));
        let (lag, inverted, mismatches, _) = align_bits(&decoded, &sent, 0, 20);
        assert_eq!(lag, 7);
        assert!(inverted);
        assert_eq!(mismatches, 0);
    }
}
