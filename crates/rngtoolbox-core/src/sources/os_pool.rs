use super::{LineEncoding, OS_ENTROPY_POOL, SampleError, SampleSource};
use crate::error::TransportError;

/// Bytes drawn from the OS pool per sample.
pub const OS_SAMPLE_BYTES: usize = 32;

/// Reads samples from the operating system's entropy pool via `getrandom`.
#[derive(Debug, Default)]
pub struct OsPoolSource;

impl OsPoolSource {
    pub fn new() -> Self {
        Self
    }
}

impl SampleSource for OsPoolSource {
    fn name(&self) -> &str {
        OS_ENTROPY_POOL
    }

    fn read_sample(&mut self) -> Result<Option<Vec<u8>>, SampleError> {
        let mut buf = [0u8; OS_SAMPLE_BYTES];
        getrandom::fill(&mut buf).map_err(|e| {
            SampleError::Fatal(TransportError::new(format!(
                "Failed to read from OS entropy pool: {e}"
            )))
        })?;
        Ok(Some(buf.to_vec()))
    }

    fn encoding(&self) -> LineEncoding {
        LineEncoding::Base64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_full_samples() {
        let mut source = OsPoolSource::new();
        let a = source.read_sample().unwrap().unwrap();
        let b = source.read_sample().unwrap().unwrap();
        assert_eq!(a.len(), OS_SAMPLE_BYTES);
        assert_ne!(a, b, "two 32-byte OS samples should differ");
    }
}
