use std::time::Duration;

use serde::Deserialize;

use super::{LineEncoding, REMOTE_ENDPOINT, SampleError, SampleSource};
use crate::error::TransportError;

/// Bytes requested per sample.
pub const REMOTE_SAMPLE_BYTES: usize = 32;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Response body of an ANU-QRNG-compatible `random` endpoint.
#[derive(Debug, Deserialize)]
struct RandomResponse {
    #[serde(default)]
    data: Vec<String>,
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Fetches samples over HTTP from an ANU-QRNG-compatible API
/// (`GET <endpoint>?length=32&type=hex16`).
pub struct RemoteSource {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl RemoteSource {
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::new(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn fetch(&self) -> Result<RandomResponse, reqwest::Error> {
        self.client
            .get(&self.endpoint)
            .query(&[
                ("length", REMOTE_SAMPLE_BYTES.to_string()),
                ("type", "hex16".to_string()),
            ])
            .send()?
            .error_for_status()?
            .json()
    }
}

/// Flatten hex16 words into bytes.
fn decode_hex16(words: &[String]) -> Option<Vec<u8>> {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for word in words {
        bytes.extend(hex::decode(word).ok()?);
    }
    Some(bytes)
}

fn parse_response(response: RandomResponse) -> Result<Vec<u8>, SampleError> {
    if !response.success {
        let reason = response.error.unwrap_or_else(|| "unknown error".to_string());
        return Err(SampleError::Transient(format!("Remote endpoint refused: {reason}")));
    }
    match decode_hex16(&response.data) {
        Some(bytes) if !bytes.is_empty() => Ok(bytes),
        Some(_) => Err(SampleError::Transient(
            "Remote endpoint returned no data".to_string(),
        )),
        None => Err(SampleError::Transient(
            "Remote endpoint returned malformed hex".to_string(),
        )),
    }
}

impl SampleSource for RemoteSource {
    fn name(&self) -> &str {
        REMOTE_ENDPOINT
    }

    fn read_sample(&mut self) -> Result<Option<Vec<u8>>, SampleError> {
        let response = self
            .fetch()
            .map_err(|e| SampleError::Transient(format!("Remote fetch failed: {e}")))?;
        parse_response(response).map(Some)
    }

    fn encoding(&self) -> LineEncoding {
        LineEncoding::Hex
    }
}
