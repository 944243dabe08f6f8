//! Mel spectrogram extraction
//!
//! Turns an uploaded WAV clip into the 128x128 single-channel image the
//! classifier was trained on: STFT power spectrum, mel filterbank, dB scale,
//! per-clip normalization, then pad or crop the time axis to a fixed width.

use std::io::Cursor;

use ndarray::Array4;
use rustfft::{num_complex::Complex, FftPlanner};

use super::detector::DetectorError;

/// Mel bands = image height
pub const MEL_BANDS: usize = 128;
/// Time frames = image width
pub const FRAMES: usize = 128;

const N_FFT: usize = 2048;
const HOP_LENGTH: usize = 512;
const TOP_DB: f32 = 80.0;
const AMIN: f32 = 1e-10;

/// Decode a WAV clip and produce a `(1, 128, 128, 1)` model input tensor
pub fn mel_image(wav_bytes: &[u8]) -> Result<Array4<f32>, DetectorError> {
    let (samples, sample_rate) = decode_wav(wav_bytes)?;
    let mel_db = mel_spectrogram_db(&samples, sample_rate);
    let fixed = fix_frames(normalize(mel_db));

    let mut data = Vec::with_capacity(MEL_BANDS * FRAMES);
    for band in &fixed {
        data.extend_from_slice(band);
    }

    Array4::from_shape_vec((1, MEL_BANDS, FRAMES, 1), data)
        .map_err(|e| DetectorError::Inference(format!("Shape error: {}", e)))
}

/// Decode WAV bytes to mono f32 samples
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32), DetectorError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| DetectorError::InvalidAudio(e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| DetectorError::InvalidAudio(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| DetectorError::InvalidAudio(e.to_string()))?
        }
    };

    if samples.is_empty() {
        return Err(DetectorError::InvalidAudio("Empty audio stream".to_string()));
    }

    let channels = spec.channels as usize;
    let mono = if channels > 1 {
        downmix(&samples, channels)
    } else {
        samples
    };

    Ok((mono, spec.sample_rate))
}

fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

fn mel_spectrogram_db(samples: &[f32], sample_rate: u32) -> Vec<Vec<f32>> {
    let power = power_spectrogram(samples);
    let filters = mel_filterbank(sample_rate);

    let n_frames = power.len();
    let mut mel = vec![vec![0.0f32; n_frames]; MEL_BANDS];
    for (frame_idx, frame) in power.iter().enumerate() {
        for (band_idx, filter) in filters.iter().enumerate() {
            let mut acc = 0.0f32;
            for (weight, p) in filter.iter().zip(frame.iter()) {
                acc += weight * p;
            }
            mel[band_idx][frame_idx] = acc;
        }
    }

    power_to_db(mel)
}

/// STFT power frames (Hann window, |X|^2 over the one-sided spectrum)
fn power_spectrogram(samples: &[f32]) -> Vec<Vec<f32>> {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(N_FFT);
    let window = hann_window(N_FFT);

    // Clips shorter than one window are zero-padded so every clip yields a frame
    let padded;
    let signal = if samples.len() < N_FFT {
        let mut buf = samples.to_vec();
        buf.resize(N_FFT, 0.0);
        padded = buf;
        &padded[..]
    } else {
        samples
    };

    let n_bins = N_FFT / 2 + 1;
    let mut frames = Vec::new();
    let mut start = 0;
    while start + N_FFT <= signal.len() {
        let mut buf: Vec<Complex<f32>> = signal[start..start + N_FFT]
            .iter()
            .zip(window.iter())
            .map(|(s, w)| Complex::new(s * w, 0.0))
            .collect();
        fft.process(&mut buf);

        frames.push(buf[..n_bins].iter().map(|c| c.norm_sqr()).collect());
        start += HOP_LENGTH;
    }

    frames
}

fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (std::f32::consts::PI * i as f32 / len as f32).sin().powi(2))
        .collect()
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank over the one-sided FFT bins
fn mel_filterbank(sample_rate: u32) -> Vec<Vec<f32>> {
    let n_bins = N_FFT / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;
    let max_mel = hz_to_mel(nyquist);

    let band_edges: Vec<f32> = (0..MEL_BANDS + 2)
        .map(|i| mel_to_hz(max_mel * i as f32 / (MEL_BANDS + 1) as f32))
        .collect();

    let bin_hz = sample_rate as f32 / N_FFT as f32;

    let mut filters = vec![vec![0.0f32; n_bins]; MEL_BANDS];
    for (band_idx, filter) in filters.iter_mut().enumerate() {
        let lower = band_edges[band_idx];
        let center = band_edges[band_idx + 1];
        let upper = band_edges[band_idx + 2];

        for (bin, weight) in filter.iter_mut().enumerate() {
            let hz = bin as f32 * bin_hz;
            *weight = if hz >= lower && hz <= center && center > lower {
                (hz - lower) / (center - lower)
            } else if hz > center && hz <= upper && upper > center {
                (upper - hz) / (upper - center)
            } else {
                0.0
            };
        }
    }

    filters
}

/// 10*log10 relative to the peak, floored `TOP_DB` below it
fn power_to_db(mel: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
    let peak = mel.iter().flatten().copied().fold(AMIN, f32::max);
    let ref_db = 10.0 * peak.log10();

    mel.into_iter()
        .map(|band| {
            band.into_iter()
                .map(|p| (10.0 * p.max(AMIN).log10() - ref_db).max(-TOP_DB))
                .collect()
        })
        .collect()
}

/// Per-clip standardization; a silent clip maps to all zeros
fn normalize(mel: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
    let count = (mel.len() * mel[0].len()) as f32;
    let mean = mel.iter().flatten().sum::<f32>() / count;
    let variance = mel.iter().flatten().map(|v| (v - mean).powi(2)).sum::<f32>() / count;
    let std = variance.sqrt().max(1e-8);

    mel.into_iter()
        .map(|band| band.into_iter().map(|v| (v - mean) / std).collect())
        .collect()
}

/// Pad with zeros or crop the time axis to exactly `FRAMES` columns
fn fix_frames(mel: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
    mel.into_iter()
        .map(|mut band| {
            band.resize(FRAMES, 0.0);
            band
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in samples {
                writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn sine(freq: f32, secs: f32, sample_rate: u32) -> Vec<f32> {
        (0..(secs * sample_rate as f32) as usize)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn mel_image_has_model_shape() {
        let bytes = wav_bytes(&sine(440.0, 1.0, 22_050), 22_050, 1);
        let image = mel_image(&bytes).unwrap();
        assert_eq!(image.shape(), &[1, MEL_BANDS, FRAMES, 1]);
        assert!(image.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn short_clips_are_padded() {
        // 0.005 s at 22.05 kHz is shorter than one FFT window
        let bytes = wav_bytes(&sine(200.0, 0.005, 22_050), 22_050, 1);
        let image = mel_image(&bytes).unwrap();
        assert_eq!(image.shape(), &[1, MEL_BANDS, FRAMES, 1]);
    }

    #[test]
    fn long_clips_are_cropped() {
        let bytes = wav_bytes(&sine(440.0, 5.0, 22_050), 22_050, 1);
        let image = mel_image(&bytes).unwrap();
        assert_eq!(image.shape(), &[1, MEL_BANDS, FRAMES, 1]);
    }

    #[test]
    fn stereo_is_downmixed() {
        let mono = sine(440.0, 0.5, 22_050);
        let stereo: Vec<f32> = mono.iter().flat_map(|s| [*s, *s]).collect();
        let bytes = wav_bytes(&stereo, 22_050, 2);

        let (samples, sample_rate) = decode_wav(&bytes).unwrap();
        assert_eq!(sample_rate, 22_050);
        assert_eq!(samples.len(), mono.len());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(matches!(
            mel_image(b"definitely not a wav file"),
            Err(DetectorError::InvalidAudio(_))
        ));
    }

    #[test]
    fn silence_normalizes_to_zeros() {
        let bytes = wav_bytes(&vec![0.0; 22_050], 22_050, 1);
        let image = mel_image(&bytes).unwrap();
        assert!(image.iter().all(|v| v.abs() < 1e-3));
    }

    #[test]
    fn hann_window_is_bounded_and_symmetric() {
        let window = hann_window(N_FFT);
        assert_eq!(window[0], 0.0);
        assert!(window.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((window[1] - window[N_FFT - 1]).abs() < 1e-5);
    }

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0f32, 440.0, 4_000.0, 11_025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 0.5);
        }
    }

    #[test]
    fn filterbank_covers_every_band() {
        let filters = mel_filterbank(22_050);
        assert_eq!(filters.len(), MEL_BANDS);
        for filter in &filters {
            assert!(filter.iter().any(|w| *w > 0.0));
        }
    }
}
