//! Sample conversion for the cpal input callback.

use cpal::{FromSample, Sample};

/// Append `data` to `out` as mono i16, averaging each interleaved frame.
/// A trailing partial frame is averaged over the channels it has.
pub fn downmix_to_i16<T>(out: &mut Vec<i16>, data: &[T], channels: usize)
where
    T: Copy,
    i16: FromSample<T>,
{
    if channels <= 1 {
        out.extend(data.iter().map(|&s| i16::from_sample(s)));
        return;
    }

    out.reserve(data.len() / channels + 1);
    for frame in data.chunks(channels) {
        let sum: i32 = frame.iter().map(|&s| i16::from_sample(s) as i32).sum();
        out.push((sum / frame.len() as i32) as i16);
    }
}

/// Write samples into `dst` as little-endian bytes. Returns bytes written.
pub fn samples_to_le_bytes(samples: &[i16], dst: &mut [u8]) -> usize {
    let mut written = 0;
    for (sample, chunk) in samples.iter().zip(dst.chunks_exact_mut(2)) {
        chunk.copy_from_slice(&sample.to_le_bytes());
        written += 2;
    }
    written
}
