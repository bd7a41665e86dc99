//! Sample sources.
//!
//! A [`SampleSource`] yields one raw sample per call. Three kinds exist:
//!
//! - [`OsPoolSource`]: 32 bytes from the operating system's entropy pool
//! - [`LineSource`]: one text line from a serial HRNG device
//! - [`RemoteSource`]: 32 bytes fetched from an ANU-QRNG-compatible HTTP API
//!
//! Sources are blocking and are driven from a blocking thread by the backend.

mod os_pool;
mod remote;
mod serial;

pub use os_pool::OsPoolSource;
pub use remote::RemoteSource;
pub use serial::{LineSource, SerialSource, open_serial};

use base64::{Engine as _, engine::general_purpose};

use crate::error::TransportError;

/// Source identifier for the operating system's entropy pool.
pub const OS_ENTROPY_POOL: &str = "OS Entropy Pool";

/// Source identifier for the configured remote fetch endpoint.
pub const REMOTE_ENDPOINT: &str = "Remote Endpoint";

/// Why a read produced no sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    /// A problem with this one sample; the next read may well succeed.
    Transient(String),
    /// The source is unusable.
    Fatal(TransportError),
}

/// How a source's samples are shown as text lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEncoding {
    Base64,
    Hex,
    /// The sample already is text.
    Text,
}

impl LineEncoding {
    /// Render sample bytes as one line. Conditioned text samples are binary
    /// and therefore rendered as hex.
    pub fn render(self, bytes: &[u8], conditioned: bool) -> String {
        match self {
            Self::Base64 => general_purpose::STANDARD.encode(bytes),
            Self::Hex => hex::encode(bytes),
            Self::Text if conditioned => hex::encode(bytes),
            Self::Text => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// A blocking producer of raw samples.
pub trait SampleSource: Send {
    /// Identifier shown in messages.
    fn name(&self) -> &str;

    /// Read one sample. `Ok(None)` means nothing usable arrived this time
    /// (e.g. a blank line) and the caller should simply try again.
    fn read_sample(&mut self) -> Result<Option<Vec<u8>>, SampleError>;

    fn encoding(&self) -> LineEncoding;
}

/// Open the source named `source`.
///
/// `baud_rate` is only consulted for serial devices, `remote_endpoint` only
/// for [`REMOTE_ENDPOINT`].
pub fn open(
    source: &str,
    baud_rate: &str,
    remote_endpoint: Option<&str>,
) -> Result<Box<dyn SampleSource>, TransportError> {
    match source {
        OS_ENTROPY_POOL => Ok(Box::new(OsPoolSource::new())),
        REMOTE_ENDPOINT => {
            let endpoint = remote_endpoint
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .ok_or_else(|| TransportError::new("Remote endpoint not configured"))?;
            Ok(Box::new(RemoteSource::new(endpoint)?))
        }
        path => Ok(Box::new(open_serial(path, baud_rate)?)),
    }
}

/// Selectable source identifiers: the OS pool first, the remote endpoint when
/// configured, then every serial port found on this machine.
pub fn list_sources(remote_configured: bool) -> Vec<String> {
    let mut sources = vec![OS_ENTROPY_POOL.to_string()];
    if remote_configured {
        sources.push(REMOTE_ENDPOINT.to_string());
    }
    match serialport::available_ports() {
        Ok(ports) => sources.extend(ports.into_iter().map(|p| p.port_name)),
        Err(e) => log::warn!("failed to enumerate serial ports: {e}"),
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_encodings() {
        assert_eq!(LineEncoding::Base64.render(b"hi", false), "aGk=");
        assert_eq!(LineEncoding::Hex.render(&[0, 255], false), "00ff");
        assert_eq!(LineEncoding::Text.render(b"512", false), "512");
        assert_eq!(LineEncoding::Text.render(&[0x35, 0x31], true), "3531");
    }

    #[test]
    fn test_open_os_pool() {
        let source = open(OS_ENTROPY_POOL, "", None).unwrap();
        assert_eq!(source.name(), OS_ENTROPY_POOL);
        assert_eq!(source.encoding(), LineEncoding::Base64);
    }

    #[test]
    fn test_open_remote_requires_endpoint() {
        let err = open(REMOTE_ENDPOINT, "", None).err().unwrap();
        assert_eq!(err.message(), "Remote endpoint not configured");
        let err = open(REMOTE_ENDPOINT, "", Some("  ")).err().unwrap();
        assert_eq!(err.message(), "Remote endpoint not configured");
    }

    #[test]
    fn test_open_serial_rejects_bad_baud_rate() {
        let err = open("/dev/ttyUSB-missing", "fast", None).err().unwrap();
        assert_eq!(err.message(), "Invalid baud rate");
    }

    #[test]
    fn test_open_missing_serial_port_fails() {
        let err = open("/dev/rngtoolbox-no-such-port", "9600", None)
            .err()
            .unwrap();
        assert!(err.message().starts_with("Failed to open port /dev/rngtoolbox-no-such-port"));
    }

    #[test]
    fn test_list_sources_order() {
        let sources = list_sources(false);
        assert_eq!(sources[0], OS_ENTROPY_POOL);
        assert!(!sources.iter().any(|s| s == REMOTE_ENDPOINT));

        let sources = list_sources(true);
        assert_eq!(sources[1], REMOTE_ENDPOINT);
    }
}
