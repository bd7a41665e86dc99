use std::io::{BufRead, BufReader, ErrorKind};
use std::time::Duration;

use super::{LineEncoding, SampleError, SampleSource};
use crate::error::TransportError;

/// Read timeout for serial devices.
pub const SERIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// A serial HRNG device: one sample per text line.
pub type SerialSource = LineSource<BufReader<Box<dyn serialport::SerialPort>>>;

/// Open the serial device at `path` with the given baud rate.
pub fn open_serial(path: &str, baud_rate: &str) -> Result<SerialSource, TransportError> {
    let baud: u32 = baud_rate
        .trim()
        .parse()
        .map_err(|_| TransportError::new("Invalid baud rate"))?;
    let port = serialport::new(path, baud)
        .timeout(SERIAL_TIMEOUT)
        .open()
        .map_err(|e| TransportError::new(format!("Failed to open port {path}: {e}")))?;
    log::info!("opened {path} at {baud} baud");
    Ok(LineSource::new(path, BufReader::new(port)))
}

/// Line-oriented sample source over any buffered reader.
pub struct LineSource<R> {
    name: String,
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead + Send> LineSource<R> {
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
            buf: Vec::with_capacity(64),
        }
    }
}

impl<R: BufRead + Send> SampleSource for LineSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_sample(&mut self) -> Result<Option<Vec<u8>>, SampleError> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => Err(SampleError::Transient(format!("No data from {}", self.name))),
            Ok(_) => {
                let end = self
                    .buf
                    .iter()
                    .rposition(|&b| b != b'\n' && b != b'\r')
                    .map_or(0, |i| i + 1);
                if end == 0 {
                    return Ok(None);
                }
                Ok(Some(self.buf[..end].to_vec()))
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Err(SampleError::Transient(format!(
                "Timed out waiting for data from {}",
                self.name
            ))),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(SampleError::Fatal(TransportError::new(format!(
                "Error reading from port: {e}"
            )))),
        }
    }

    fn encoding(&self) -> LineEncoding {
        LineEncoding::Text
    }
}
