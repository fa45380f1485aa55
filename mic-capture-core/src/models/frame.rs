/// One device read worth of 16-bit little-endian mono PCM.
///
/// Produced once per non-empty read and handed by value to exactly one sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Index among the non-empty reads of the session, starting at 0.
    /// Frames dropped by the warm-up policy still consume a number.
    pub sequence: u64,
    pub data: Vec<u8>,
}

impl AudioFrame {
    pub fn new(sequence: u64, data: Vec<u8>) -> Self {
        Self { sequence, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of whole 16-bit samples in the frame.
    pub fn sample_count(&self) -> usize {
        self.data.len() / 2
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Decode the payload into samples. A trailing odd byte is ignored.
    pub fn samples(&self) -> Vec<i16> {
        self.data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_decode_little_endian() {
        let frame = AudioFrame::new(0, vec![0x34, 0x12, 0xFF, 0xFF, 0x07]);
        assert_eq!(frame.sample_count(), 2);
        assert_eq!(frame.samples(), vec![0x1234, -1]);
    }
}
