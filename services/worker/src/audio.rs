use base64::Engine;
use bytes::Bytes;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

// Standard sample rates for the two sides of the bridge
pub const ROOM_SAMPLE_RATE: f64 = 48000.0;
pub const MODEL_SAMPLE_RATE: f64 = 24000.0;

/// Input chunk size (in frames) fed to a resampler per process call.
pub const RESAMPLER_CHUNK: usize = 512;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,                     // No cutoff frequency, pass all frequencies
        PolynomialDegree::Cubic, // Cubic interpolation for quality
        chunk_size,
        1, // 1 channel (mono)
    )?;
    Ok(resampler)
}

/// A resampler that accepts arbitrarily sized pushes and feeds the inner
/// fixed-chunk resampler whole chunks, carrying the remainder to the next
/// push so no samples are lost between frames.
pub struct StreamResampler {
    inner: FastFixedIn<f32>,
    pending: Vec<f32>,
}

impl StreamResampler {
    pub fn new(in_sampling_rate: f64, out_sampling_rate: f64) -> anyhow::Result<Self> {
        Ok(Self {
            inner: create_resampler(in_sampling_rate, out_sampling_rate, RESAMPLER_CHUNK)?,
            pending: Vec::new(),
        })
    }

    /// Feeds samples in and returns whatever full chunks produced.
    pub fn push(&mut self, samples: &[f32]) -> Vec<f32> {
        self.pending.extend_from_slice(samples);
        let mut out = Vec::new();
        loop {
            let chunk_size = self.inner.input_frames_next();
            if self.pending.len() < chunk_size {
                break;
            }
            let rest = self.pending.split_off(chunk_size);
            let chunk = std::mem::replace(&mut self.pending, rest);
            match self.inner.process(&[chunk], None) {
                Ok(res) => out.extend_from_slice(&res[0]),
                Err(e) => {
                    tracing::error!(error = %e, "resampler failed to process a chunk");
                    break;
                }
            }
        }
        out
    }
}

/// Interprets little-endian PCM16 bytes as normalized f32 samples.
pub fn pcm16_bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| {
            let v = i16::from_le_bytes([chunk[0], chunk[1]]);
            (v as f32 / 32768.0).clamp(-1.0, 1.0)
        })
        .collect()
}

/// Converts normalized f32 samples to little-endian PCM16 bytes.
pub fn f32_to_pcm16_bytes(samples: &[f32]) -> Bytes {
    let bytes: Vec<u8> = samples
        .iter()
        .flat_map(|&sample| {
            let v = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            v.to_le_bytes()
        })
        .collect();
    Bytes::from(bytes)
}

/// Encodes raw PCM16 bytes for a JSON wire frame.
pub fn encode_pcm16_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decodes a base64 wire frame back to raw PCM16 bytes.
pub fn decode_pcm16_base64(fragment: &str) -> Bytes {
    match base64::engine::general_purpose::STANDARD.decode(fragment) {
        Ok(bytes) => Bytes::from(bytes),
        Err(_) => {
            tracing::error!("Failed to decode base64 audio fragment");
            Bytes::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_resampler_for_bridge_rates() {
        assert!(create_resampler(ROOM_SAMPLE_RATE, MODEL_SAMPLE_RATE, RESAMPLER_CHUNK).is_ok());
        assert!(create_resampler(MODEL_SAMPLE_RATE, ROOM_SAMPLE_RATE, RESAMPLER_CHUNK).is_ok());
    }

    #[test]
    fn test_pcm16_bytes_to_f32_known_values() {
        // 16384 = 0x4000 little endian, normalized to 0.5
        let samples = pcm16_bytes_to_f32(&[0x00, 0x40]);
        assert_eq!(samples.len(), 1);
        assert!((samples[0] - 0.5).abs() < 0.0001);

        // -32768 = 0x8000 little endian, normalized to -1.0
        let samples = pcm16_bytes_to_f32(&[0x00, 0x40, 0x00, 0x80]);
        assert_eq!(samples.len(), 2);
        assert!((samples[1] + 1.0).abs() < 0.0001);

        // An incomplete trailing byte cannot form a sample.
        assert!(pcm16_bytes_to_f32(&[0x00]).is_empty());
    }

    #[test]
    fn test_f32_to_pcm16_clamps_out_of_range_samples() {
        let bytes = f32_to_pcm16_bytes(&[2.0, -2.0]);
        let back = pcm16_bytes_to_f32(&bytes);
        assert!(back[0] <= 1.0);
        assert!(back[1] >= -1.0);
    }

    #[test]
    fn test_base64_decode_rejects_garbage() {
        assert!(decode_pcm16_base64("not base64!").is_empty());
        assert!(decode_pcm16_base64("").is_empty());
    }

    #[test]
    fn test_downsampling_halves_frame_count() {
        let mut resampler = StreamResampler::new(ROOM_SAMPLE_RATE, MODEL_SAMPLE_RATE).unwrap();
        let input = vec![0.0f32; RESAMPLER_CHUNK * 4];
        let output = resampler.push(&input);
        // 48kHz -> 24kHz halves the sample count.
        assert_eq!(output.len(), input.len() / 2);
    }

    #[test]
    fn test_stream_resampler_carries_partial_frames() {
        let mut resampler = StreamResampler::new(ROOM_SAMPLE_RATE, MODEL_SAMPLE_RATE).unwrap();
        // Half a chunk produces nothing yet; the second half completes it.
        assert!(resampler.push(&vec![0.0f32; RESAMPLER_CHUNK / 2]).is_empty());
        let output = resampler.push(&vec![0.0f32; RESAMPLER_CHUNK / 2]);
        assert_eq!(output.len(), RESAMPLER_CHUNK / 2);
    }
}
