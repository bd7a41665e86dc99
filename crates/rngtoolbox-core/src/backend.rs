//! Acquisition backends.
//!
//! A backend receives one [`AcquisitionRequest`] per session, streams events
//! through the [`EventSink`] while it works, and finally resolves (request
//! completed) or rejects with a [`TransportError`]. It should check the
//! [`CancellationToken`] between samples and return promptly once cancelled.
//!
//! [`DeviceBackend`] is the production backend: it opens the selected
//! [`SampleSource`], conditions every sample, and routes it to the screen, a
//! file, nowhere, or the OS entropy pool.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::conditioning::{ConditioningMode, condition};
use crate::config::{OutputDestination, SampleLimit, SessionConfig};
use crate::error::TransportError;
use crate::event::EventSink;
use crate::sources::{self, SampleError, SampleSource};

/// Device the kernel exposes for mixing data into its entropy pool.
pub const OS_POOL_DEVICE: &str = "/dev/random";

/// Consecutive transient read failures tolerated before giving up.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// How often (in samples) entropy-direct streaming reports back.
pub const POOL_REPORT_INTERVAL: u64 = 1024;

/// Everything a backend needs for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionRequest {
    pub source: String,
    pub baud_rate: String,
    pub output_destination: OutputDestination,
    /// Decimal count or `"*"`; parsed by the backend.
    pub sample_count: String,
    pub file_path: Option<String>,
    /// Pipe samples into the OS entropy pool (unbounded streams only).
    pub entropy_direct: bool,
    pub conditioner_id: String,
    pub remote_endpoint: Option<String>,
}

impl AcquisitionRequest {
    /// Build a request from a validated configuration.
    pub fn from_config(config: &SessionConfig) -> Self {
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        Self {
            source: config.source_port.clone().unwrap_or_default(),
            baud_rate: config.baud_rate.clone(),
            output_destination: config.output_destination,
            sample_count: config.sample_count.clone(),
            file_path: non_empty(&config.file_path),
            entropy_direct: config.entropy_direct,
            conditioner_id: config.conditioner_id.clone(),
            remote_endpoint: config.remote_fetch_endpoint.as_deref().and_then(non_empty),
        }
    }
}

/// Produces sample events for a request.
#[async_trait]
pub trait AcquisitionBackend: Send + Sync {
    async fn collect(
        &self,
        request: AcquisitionRequest,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> Result<(), TransportError>;
}

/// Production backend over real sample sources.
#[derive(Debug, Clone, Default)]
pub struct DeviceBackend {
    pool_device: Option<String>,
}

impl DeviceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write entropy-direct samples to `path` instead of [`OS_POOL_DEVICE`].
    pub fn with_pool_device(mut self, path: impl Into<String>) -> Self {
        self.pool_device = Some(path.into());
        self
    }
}

#[async_trait]
impl AcquisitionBackend for DeviceBackend {
    async fn collect(
        &self,
        request: AcquisitionRequest,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> Result<(), TransportError> {
        let pool_device = self
            .pool_device
            .clone()
            .unwrap_or_else(|| OS_POOL_DEVICE.to_string());
        tokio::task::spawn_blocking(move || {
            let limit = SampleLimit::parse(&request.sample_count)?;
            let mode = ConditioningMode::from_id(&request.conditioner_id).ok_or_else(|| {
                TransportError::new(format!("Unknown conditioner: {}", request.conditioner_id))
            })?;
            let mut output = Output::open(&request, limit, Path::new(&pool_device))?;
            let mut source = sources::open(
                &request.source,
                &request.baud_rate,
                request.remote_endpoint.as_deref(),
            )?;
            run_collection(source.as_mut(), limit, mode, &mut output, &sink, &cancel)
        })
        .await
        .map_err(|e| TransportError::new(format!("Collection task failed: {e}")))?
    }
}

/// Where conditioned samples end up.
pub enum Output {
    Screen,
    File(BufWriter<File>),
    Discard,
    EntropyPool(File),
}

impl Output {
    pub fn open(
        request: &AcquisitionRequest,
        limit: SampleLimit,
        pool_device: &Path,
    ) -> Result<Self, TransportError> {
        if request.entropy_direct && limit == SampleLimit::Unbounded {
            let pool = OpenOptions::new()
                .write(true)
                .open(pool_device)
                .map_err(|e| {
                    TransportError::new(format!("Failed to open OS entropy pool: {e}"))
                })?;
            return Ok(Self::EntropyPool(pool));
        }
        match request.output_destination {
            OutputDestination::Screen => Ok(Self::Screen),
            OutputDestination::None => Ok(Self::Discard),
            OutputDestination::File => {
                let path = request
                    .file_path
                    .as_deref()
                    .ok_or_else(|| TransportError::new("File path is required for file output"))?;
                let file = File::create(path)
                    .map_err(|e| TransportError::new(format!("Failed to create file: {e}")))?;
                Ok(Self::File(BufWriter::new(file)))
            }
        }
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        let result = match self {
            Self::File(w) => w.flush(),
            Self::EntropyPool(f) => f.flush(),
            Self::Screen | Self::Discard => Ok(()),
        };
        result.map_err(|e| TransportError::new(format!("Flush failed: {e}")))
    }
}

/// Blocking collection loop shared by every source.
///
/// Returns `Ok(())` without a `Finished` event when cancelled or when the
/// controller closed the stream; the controller decides the terminal phase.
pub fn run_collection(
    source: &mut dyn SampleSource,
    limit: SampleLimit,
    mode: ConditioningMode,
    output: &mut Output,
    sink: &EventSink,
    cancel: &CancellationToken,
) -> Result<(), TransportError> {
    let encoding = source.encoding();
    let conditioned = mode != ConditioningMode::Raw;
    let mut done: u64 = 0;
    let mut last_reported = 0u64;
    let mut failures = 0u32;

    log::info!("collecting from {} ({limit:?}, conditioning={mode})", source.name());

    while !limit.reached(done) {
        if cancel.is_cancelled() || sink.is_closed() {
            log::info!("collection from {} stopped after {done} samples", source.name());
            return Ok(());
        }

        let raw = match source.read_sample() {
            Ok(Some(raw)) => {
                failures = 0;
                raw
            }
            Ok(None) => continue,
            Err(SampleError::Transient(message)) => {
                failures += 1;
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(TransportError::new(message));
                }
                log::debug!("transient read failure {failures}: {message}");
                sink.error(&message);
                continue;
            }
            Err(SampleError::Fatal(e)) => return Err(e),
        };

        let bytes = condition(&raw, raw.len(), mode);
        done += 1;
        let percent = limit.percent(done);

        match output {
            Output::Screen => {
                sink.sample(&encoding.render(&bytes, conditioned), percent);
            }
            Output::File(w) => {
                writeln!(w, "{}", encoding.render(&bytes, conditioned))
                    .map_err(|e| TransportError::new(format!("Failed to write output: {e}")))?;
                let whole = limit.whole_percent(done);
                if whole > last_reported {
                    last_reported = whole;
                    sink.sample("", percent);
                }
            }
            Output::Discard => {}
            Output::EntropyPool(pool) => {
                pool.write_all(&bytes).map_err(|e| {
                    TransportError::new(format!("Failed to write to OS entropy pool: {e}"))
                })?;
                if done % POOL_REPORT_INTERVAL == 0 {
                    sink.sample(&format!("Fed {done} samples to the OS entropy pool"), percent);
                }
            }
        }
    }

    output.flush()?;
    sink.finished();
    log::info!("collection from {} finished: {done} samples", source.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{self, AcquisitionEvent};
    use crate::sources::LineEncoding;
    use std::collections::VecDeque;

    /// Replays a fixed script of read results.
    struct ScriptedSource {
        script: VecDeque<Result<Option<Vec<u8>>, SampleError>>,
        encoding: LineEncoding,
    }

    impl ScriptedSource {
        fn lines(lines: &[&str]) -> Self {
            Self {
                script: lines
                    .iter()
                    .map(|l| Ok(Some(l.as_bytes().to_vec())))
                    .collect(),
                encoding: LineEncoding::Text,
            }
        }

        fn with(script: Vec<Result<Option<Vec<u8>>, SampleError>>) -> Self {
            Self {
                script: script.into(),
                encoding: LineEncoding::Text,
            }
        }
    }

    impl SampleSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }
        fn read_sample(&mut self) -> Result<Option<Vec<u8>>, SampleError> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(SampleError::Transient("script exhausted".into())))
        }
        fn encoding(&self) -> LineEncoding {
            self.encoding
        }
    }

    async fn drain(mut stream: event::EventStream) -> Vec<AcquisitionEvent> {
        let mut events = Vec::new();
        while let Some(e) = stream.next().await {
            events.push(e);
        }
        events
    }

    fn sample(line: &str, percent: f64) -> AcquisitionEvent {
        AcquisitionEvent::Sample {
            line: line.into(),
            percent,
        }
    }

    fn request(config: SessionConfig) -> AcquisitionRequest {
        AcquisitionRequest::from_config(&config)
    }

    #[tokio::test]
    async fn test_screen_emits_every_sample_then_finished() {
        let (sink, stream) = event::channel();
        let mut source = ScriptedSource::lines(&["10", "20", "30", "40"]);
        let result = run_collection(
            &mut source,
            SampleLimit::Count(4),
            ConditioningMode::Raw,
            &mut Output::Screen,
            &sink,
            &CancellationToken::new(),
        );
        assert!(result.is_ok());
        drop(sink);
        assert_eq!(
            drain(stream).await,
            vec![
                sample("10", 25.0),
                sample("20", 50.0),
                sample("30", 75.0),
                sample("40", 100.0),
                AcquisitionEvent::Finished,
            ]
        );
    }

    #[tokio::test]
    async fn test_discard_emits_only_finished() {
        let (sink, stream) = event::channel();
        let mut source = ScriptedSource::lines(&["1", "2"]);
        run_collection(
            &mut source,
            SampleLimit::Count(2),
            ConditioningMode::Raw,
            &mut Output::Discard,
            &sink,
            &CancellationToken::new(),
        )
        .unwrap();
        drop(sink);
        assert_eq!(drain(stream).await, vec![AcquisitionEvent::Finished]);
    }

    #[tokio::test]
    async fn test_file_output_writes_lines_and_throttles_progress() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.txt");
        let req = request(SessionConfig {
            source_port: Some("scripted".into()),
            output_destination: OutputDestination::File,
            file_path: path.to_string_lossy().into_owned(),
            ..Default::default()
        });
        let mut output = Output::open(&req, SampleLimit::Count(200), Path::new("/dev/null")).unwrap();

        let lines: Vec<String> = (0..200).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let mut source = ScriptedSource::lines(&refs);

        let (sink, stream) = event::channel();
        run_collection(
            &mut source,
            SampleLimit::Count(200),
            ConditioningMode::Raw,
            &mut output,
            &sink,
            &CancellationToken::new(),
        )
        .unwrap();
        drop(sink);
        drop(output);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 200);
        assert_eq!(written.lines().next(), Some("0"));

        let events = drain(stream).await;
        // One progress event per whole percentage point: 2 samples per point.
        let progress: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                AcquisitionEvent::Sample { line, percent } => {
                    assert!(line.is_empty());
                    Some(*percent)
                }
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 100);
        assert_eq!(progress.last().copied(), Some(100.0));
        assert_eq!(events.last(), Some(&AcquisitionEvent::Finished));
    }

    #[tokio::test]
    async fn test_transient_errors_are_reported_and_collection_continues() {
        let (sink, stream) = event::channel();
        let mut source = ScriptedSource::with(vec![
            Ok(Some(b"1".to_vec())),
            Err(SampleError::Transient("Timed out".into())),
            Ok(None),
            Ok(Some(b"2".to_vec())),
        ]);
        run_collection(
            &mut source,
            SampleLimit::Count(2),
            ConditioningMode::Raw,
            &mut Output::Screen,
            &sink,
            &CancellationToken::new(),
        )
        .unwrap();
        drop(sink);
        assert_eq!(
            drain(stream).await,
            vec![
                sample("1", 50.0),
                AcquisitionEvent::Error {
                    message: "Timed out".into()
                },
                sample("2", 100.0),
                AcquisitionEvent::Finished,
            ]
        );
    }

    #[test]
    fn test_repeated_transient_errors_escalate() {
        let (sink, _stream) = event::channel();
        let mut source = ScriptedSource::with(Vec::new());
        let err = run_collection(
            &mut source,
            SampleLimit::Count(1),
            ConditioningMode::Raw,
            &mut Output::Screen,
            &sink,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.message(), "script exhausted");
    }

    #[test]
    fn test_fatal_error_rejects() {
        let (sink, _stream) = event::channel();
        let mut source = ScriptedSource::with(vec![Err(SampleError::Fatal(TransportError::new(
            "Error reading from port: gone",
        )))]);
        let err = run_collection(
            &mut source,
            SampleLimit::Count(3),
            ConditioningMode::Raw,
            &mut Output::Screen,
            &sink,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.message(), "Error reading from port: gone");
    }

    #[tokio::test]
    async fn test_cancelled_collection_stops_without_finished() {
        let (sink, stream) = event::channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut source = ScriptedSource::lines(&["1"]);
        run_collection(
            &mut source,
            SampleLimit::Unbounded,
            ConditioningMode::Raw,
            &mut Output::Screen,
            &sink,
            &cancel,
        )
        .unwrap();
        drop(sink);
        assert!(drain(stream).await.is_empty());
    }

    #[tokio::test]
    async fn test_conditioned_text_samples_render_as_hex() {
        let (sink, stream) = event::channel();
        let mut source = ScriptedSource::lines(&["512"]);
        run_collection(
            &mut source,
            SampleLimit::Count(1),
            ConditioningMode::Sha256,
            &mut Output::Screen,
            &sink,
            &CancellationToken::new(),
        )
        .unwrap();
        drop(sink);
        let events = drain(stream).await;
        match &events[0] {
            AcquisitionEvent::Sample { line, percent } => {
                assert_eq!(line.len(), 6, "3 conditioned bytes as hex");
                assert!(line.chars().all(|c| c.is_ascii_hexdigit()));
                assert_eq!(*percent, 100.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_entropy_direct_writes_to_pool_device() {
        let tmp = tempfile::tempdir().unwrap();
        let pool_path = tmp.path().join("pool");
        std::fs::write(&pool_path, b"").unwrap();
        let req = request(SessionConfig {
            source_port: Some("scripted".into()),
            sample_count: "*".into(),
            entropy_direct: true,
            ..Default::default()
        });
        let mut output = Output::open(&req, SampleLimit::Unbounded, &pool_path).unwrap();
        assert!(matches!(output, Output::EntropyPool(_)));

        // Three samples, then the exhausted script escalates.
        let (sink, _stream) = event::channel();
        let mut source = ScriptedSource::lines(&["ab", "cd", "ef"]);
        let err = run_collection(
            &mut source,
            SampleLimit::Unbounded,
            ConditioningMode::Raw,
            &mut output,
            &sink,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.message(), "script exhausted");
        drop(output);
        assert_eq!(std::fs::read(&pool_path).unwrap(), b"abcdef");
    }

    #[test]
    fn test_entropy_direct_ignored_for_bounded_counts() {
        let req = request(SessionConfig {
            source_port: Some("x".into()),
            sample_count: "10".into(),
            entropy_direct: true,
            ..Default::default()
        });
        let output = Output::open(&req, SampleLimit::Count(10), Path::new("/nonexistent")).unwrap();
        assert!(matches!(output, Output::Screen));
    }

    #[test]
    fn test_file_output_requires_path() {
        let req = request(SessionConfig {
            source_port: Some("x".into()),
            output_destination: OutputDestination::File,
            ..Default::default()
        });
        let err = Output::open(&req, SampleLimit::Count(1), Path::new("/dev/null"))
            .err()
            .unwrap();
        assert_eq!(err.message(), "File path is required for file output");
    }

    #[test]
    fn test_request_from_config() {
        let config = SessionConfig {
            source_port: Some("/dev/ttyUSB0".into()),
            baud_rate: "9600".into(),
            sample_count: "*".into(),
            file_path: "  ".into(),
            remote_fetch_endpoint: Some(" http://localhost:8042/api/v1/random ".into()),
            entropy_direct: true,
            ..Default::default()
        };
        let req = AcquisitionRequest::from_config(&config);
        assert_eq!(req.source, "/dev/ttyUSB0");
        assert_eq!(req.file_path, None);
        assert_eq!(
            req.remote_endpoint.as_deref(),
            Some("http://localhost:8042/api/v1/random")
        );
        assert!(req.entropy_direct);
        assert_eq!(req.conditioner_id, "none");
    }

    #[tokio::test]
    async fn test_device_backend_rejects_bad_sample_count() {
        let (sink, _stream) = event::channel();
        let req = request(SessionConfig {
            source_port: Some(sources::OS_ENTROPY_POOL.into()),
            sample_count: "lots".into(),
            ..Default::default()
        });
        let err = DeviceBackend::new()
            .collect(req, sink, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Invalid sample count");
    }

    #[tokio::test]
    async fn test_device_backend_rejects_unknown_conditioner() {
        let (sink, _stream) = event::channel();
        let req = request(SessionConfig {
            source_port: Some(sources::OS_ENTROPY_POOL.into()),
            sample_count: "1".into(),
            conditioner_id: "rot13".into(),
            ..Default::default()
        });
        let err = DeviceBackend::new()
            .collect(req, sink, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Unknown conditioner: rot13");
    }

    #[tokio::test]
    async fn test_device_backend_streams_os_pool_samples() {
        let (sink, stream) = event::channel();
        let req = request(SessionConfig {
            source_port: Some(sources::OS_ENTROPY_POOL.into()),
            sample_count: "3".into(),
            ..Default::default()
        });
        DeviceBackend::new()
            .collect(req, sink, CancellationToken::new())
            .await
            .unwrap();
        let events = drain(stream).await;
        assert_eq!(events.len(), 4);
        for e in &events[..3] {
            match e {
                // 32 bytes base64 → 44 chars
                AcquisitionEvent::Sample { line, .. } => assert_eq!(line.len(), 44),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(events[3], AcquisitionEvent::Finished);
    }
}
