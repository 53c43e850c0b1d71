use anyhow::{Context, Result};
use std::io::Cursor;

/// Shape of a decoded WAV stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Sample frames (interleaved samples / channels).
    pub frames: u32,
}

/// Serialize 16-bit PCM samples into an in-memory WAV container.
pub fn encode(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .context("Failed to create WAV writer")?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV")?;
    }

    Ok(cursor.into_inner())
}

/// Decode an in-memory WAV container back into 16-bit PCM samples.
pub fn decode(bytes: &[u8]) -> Result<(WavInfo, Vec<i16>)> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).context("Failed to open WAV data")?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        anyhow::bail!(
            "unsupported WAV format: {:?} {} bits (expected 16-bit PCM)",
            spec.sample_format,
            spec.bits_per_sample
        );
    }

    let samples: Vec<i16> = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read WAV samples")?;

    let frames = samples.len() as u32 / u32::from(spec.channels.max(1));

    Ok((
        WavInfo {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            frames,
        },
        samples,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_preserves_shape() {
        let samples: Vec<i16> = (0..4410).map(|i| (i % 128) as i16).collect();
        let bytes = encode(&samples, 44100, 1).unwrap();

        let (info, decoded) = decode(&bytes).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 1);
        assert_eq!(info.frames, 4410);
        assert_eq!(decoded, samples);
    }

    #[test]
    fn decode_rejects_non_wav_bytes() {
        assert!(decode(b"definitely not a RIFF container").is_err());
    }
}
