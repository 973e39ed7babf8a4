//! WAV input using hound
//!
//! Supports 8 to 32-bit integer and 32-bit float files. Multichannel files
//! are averaged down to mono.

use crate::Result;
use hound::{SampleFormat, WavReader};
use samplekit_core::AudioBuffer;
use std::io::Read;
use std::path::Path;

/// Load a WAV file as a mono buffer at its native sample rate.
pub fn load_mono(path: impl AsRef<Path>) -> Result<AudioBuffer> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    let buffer = read_mono(reader)?;
    tracing::debug!(
        path = %path.display(),
        samples = buffer.len(),
        sample_rate = buffer.sample_rate(),
        "WAV loaded"
    );
    Ok(buffer)
}

/// Decode an open reader into a mono buffer.
pub fn read_mono<R: Read>(reader: WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 * scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let channels = usize::from(spec.channels);
    let mono = AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)?;
    Ok(mono.scaled(1.0 / channels as f32))
}
