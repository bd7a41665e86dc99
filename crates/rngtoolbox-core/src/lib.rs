//! # rngtoolbox-core
//!
//! **Acquisition sessions for hardware random-number generators.**
//!
//! `rngtoolbox-core` turns a "collect" action into a long-running, cancellable
//! stream of sample events from an HRNG (a serial device, the OS entropy pool,
//! or a remote QRNG endpoint), folds that stream into bounded session state,
//! and persists the session configuration across restarts.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use rngtoolbox_core::{DeviceBackend, SessionController, SettingsStore, SettingsWriter};
//!
//! # async fn run() {
//! let store = SettingsStore::default_location();
//! let config = store.load().await;
//! let mut controller = SessionController::new(Arc::new(DeviceBackend::new()), config)
//!     .with_settings(SettingsWriter::spawn(store));
//!
//! controller.update_config(|c| c.sample_count = "100".into());
//! controller.start().expect("valid configuration");
//! let state = controller.wait().await;
//! println!("{}: {} lines, {}%", state.phase, state.output_lines.len(), state.percent);
//! # }
//! ```
//!
//! ## Architecture
//!
//! Backend → EventSink → EventStream (classify) → SessionController (fold) → watch
//!
//! - The [`AcquisitionBackend`] streams `sample`/`error`/`finished` events and
//!   finally resolves or rejects. [`DeviceBackend`] reads a [`SampleSource`],
//!   conditions each sample, and routes it to the screen, a file, nowhere, or
//!   the OS entropy pool.
//! - [`on_event`] classifies wire payloads; unrecognized ones become
//!   `Unknown` and are shown, never fatal.
//! - [`SessionState`] keeps at most [`MAX_VISIBLE_LINES`] lines, evicting the
//!   oldest first, and reports the backend's progress verbatim.
//! - [`SettingsWriter`] serializes configuration saves so rapid edits never
//!   lose the newest record.

pub mod applications;
pub mod backend;
pub mod conditioning;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod session;
pub mod settings;
pub mod sources;

pub use applications::{
    CoinSide, DEFAULT_OTP_LENGTH, decrypt, draw_integer, encrypt, flip_coin, generate_key,
    generate_otp, generate_pad, list_key_algorithms, random_bytes,
};
pub use backend::{AcquisitionBackend, AcquisitionRequest, DeviceBackend};
pub use conditioning::{ConditionerInfo, ConditioningMode, condition, list_conditioners};
pub use config::{OutputDestination, SampleLimit, SessionConfig, UNBOUNDED_SAMPLES};
pub use controller::SessionController;
pub use error::{ApplicationError, PersistenceError, TransportError, ValidationError};
pub use event::{AcquisitionEvent, EVENT_BUFFER, EventSink, EventStream, WireEvent, on_event};
pub use session::{MAX_VISIBLE_LINES, Phase, SessionState};
pub use settings::{SettingsStore, SettingsWriter};
pub use sources::{OS_ENTROPY_POOL, REMOTE_ENDPOINT, SampleError, SampleSource, list_sources};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
