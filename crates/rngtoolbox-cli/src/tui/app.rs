//! TUI application state and event loop.
//!
//! The collection view owns the session controller. Collection runs on the
//! tokio runtime; the view only reads the published session state, so the UI
//! never blocks on the device.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tokio::sync::watch;

use rngtoolbox_core::{Phase, SessionConfig, SessionController, SessionState};

pub struct App {
    controller: SessionController,
    state_rx: watch::Receiver<SessionState>,
    running: bool,
    started: bool,
    notice: Option<String>,
}

impl App {
    pub fn new(controller: SessionController) -> Self {
        let state_rx = controller.subscribe();
        Self {
            controller,
            state_rx,
            running: true,
            started: false,
            notice: None,
        }
    }

    pub fn into_controller(self) -> SessionController {
        self.controller
    }

    /// Must be called with a tokio runtime entered.
    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Install panic hook that restores terminal before printing the panic.
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
            original_hook(info);
        }));

        let result = self.run_loop(&mut terminal);

        let _ = std::panic::take_hook();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;

        // Leaving the view stops the session.
        self.controller.cancel();

        if let Some(notice) = &self.notice {
            println!("{notice}");
        }
        result
    }

    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        self.start();

        while self.running {
            let state = self.state_rx.borrow_and_update().clone();
            terminal.draw(|f| super::ui::draw(f, self, &state))?;

            if event::poll(Duration::from_millis(50))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key.code);
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.controller.cancel();
                self.running = false;
            }
            KeyCode::Char('s') | KeyCode::Enter => self.start(),
            KeyCode::Char('c') => {
                if !self.controller.cancel() {
                    self.notice = Some("Nothing to cancel".to_string());
                }
            }
            _ => {}
        }
    }

    fn start(&mut self) {
        match self.controller.start() {
            Ok(id) => {
                log::debug!("tui started session {id}");
                self.started = true;
                self.notice = None;
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        self.controller.config()
    }

    /// Whether any session was started from this view.
    pub fn started(&self) -> bool {
        self.started
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn is_collecting(&self) -> bool {
        self.controller.phase() == Phase::Collecting
    }
}
