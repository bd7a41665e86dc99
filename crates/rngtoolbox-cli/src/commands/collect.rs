//! `rngtoolbox collect`: run one acquisition session.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use rngtoolbox_core::{
    DeviceBackend, OutputDestination, Phase, SessionController, SessionState, SettingsWriter,
};

use super::{ConfigOverrides, describe, runtime, settings_store};

pub fn run(settings: Option<&Path>, overrides: &ConfigOverrides, tui: bool, no_save: bool) {
    let rt = runtime();
    let _guard = rt.enter();

    let store = settings_store(settings);
    let mut config = rt.block_on(store.load());
    let mut controller = if no_save {
        overrides.apply(&mut config);
        SessionController::new(Arc::new(DeviceBackend::new()), config)
    } else {
        let mut controller = SessionController::new(Arc::new(DeviceBackend::new()), config)
            .with_settings(SettingsWriter::spawn(store));
        controller.update_config(|c| overrides.apply(c));
        controller
    };

    let ok = if tui {
        let mut app = crate::tui::app::App::new(controller);
        let result = app.run();
        let started = app.started();
        controller = app.into_controller();
        rt.block_on(controller.wait());
        if let Err(e) = result {
            eprintln!("Terminal error: {e}");
        }
        succeeded(started, controller.phase())
    } else {
        let phase = rt.block_on(follow(&mut controller));
        succeeded(true, phase)
    };

    if let Some(writer) = controller.settings() {
        rt.block_on(writer.flush());
    }
    if !ok {
        std::process::exit(1);
    }
}

/// A run fails when no session ever started, or when the last one failed.
fn succeeded(started: bool, phase: Phase) -> bool {
    started && phase != Phase::Failed
}

/// Run a session in the terminal, printing lines as they arrive.
async fn follow(controller: &mut SessionController) -> Phase {
    let config = controller.config().clone();
    if let Err(e) = controller.start() {
        eprintln!("Error: {e}");
        if let Some(writer) = controller.settings() {
            writer.flush().await;
        }
        std::process::exit(1);
    }

    if let Some(token) = controller.cancel_token()
        && let Err(e) = ctrlc::set_handler(move || token.cancel())
    {
        log::warn!("failed to install Ctrl+C handler: {e}");
    }

    println!("Collecting");
    for line in describe(&config) {
        println!("{line}");
    }
    if config.is_unbounded() {
        println!("  Press Ctrl+C to stop.");
    }
    println!();

    let show_progress =
        config.output_destination != OutputDestination::Screen && !config.is_unbounded();
    let mut rx = controller.subscribe();
    let mut seen = 0u64;
    let mut last_percent = None;
    loop {
        let done = {
            let state = rx.borrow_and_update();
            print_new_lines(&state, seen);
            seen = state.lines_appended;
            if show_progress && last_percent != Some(state.percent) {
                last_percent = Some(state.percent);
                eprint!("\r{}", progress_line(state.percent));
                let _ = std::io::stderr().flush();
            }
            state.phase.is_terminal()
        };
        if done || rx.changed().await.is_err() {
            break;
        }
    }
    if show_progress {
        eprintln!();
    }

    let state = controller.wait().await;
    print_new_lines(&state, seen);
    println!();
    println!("{}", summary(&state));
    state.phase
}

fn print_new_lines(state: &SessionState, seen: u64) {
    for line in state.lines_since(seen).filter(|l| !l.is_empty()) {
        println!("{line}");
    }
}

fn progress_line(percent: f64) -> String {
    const WIDTH: usize = 30;
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {percent:5.1}%",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled)
    )
}

fn summary(state: &SessionState) -> String {
    let lines = state.lines_appended;
    match state.phase {
        Phase::Finished => format!("Collection finished ({lines} lines)"),
        Phase::Cancelled => format!("Collection cancelled after {lines} lines"),
        Phase::Failed => format!(
            "Collection failed: {}",
            state.last_error.as_deref().unwrap_or("unknown error")
        ),
        Phase::Idle | Phase::Collecting => format!("Collection {}", state.phase),
    }
}
