//! TUI rendering for the collection view.
//!
//! ┌──────────────────────────────────────────────┐
//! │  rngtoolbox   /dev/ttyUSB0   collecting       │
//! ├──────────────────────────────────────────────┤
//! │  ████████████░░░░░░░░░░░░░░░░  42.0%          │
//! ├──────────────────────────────────────────────┤
//! │  Output (812 lines)                          │
//! │  512                                          │
//! │  Error: Timed out waiting for data            │
//! │  498                                          │
//! ├──────────────────────────────────────────────┤
//! │  s: start   c: cancel   q: quit              │
//! └──────────────────────────────────────────────┘
//!
//! The output pane always shows the newest lines.

use std::collections::VecDeque;

use super::app::App;
use ratatui::{prelude::*, widgets::*};
use rngtoolbox_core::{Phase, SessionState};

pub fn draw(f: &mut Frame, app: &App, state: &SessionState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Length(3), // progress
            Constraint::Min(5),    // output
            Constraint::Length(1), // notice
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_title(f, rows[0], app, state);
    draw_progress(f, rows[1], app, state);
    draw_output(f, rows[2], state);
    draw_notice(f, rows[3], app, state);
    draw_keys(f, rows[4], app);
}

fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Idle => Color::DarkGray,
        Phase::Collecting => Color::Yellow,
        Phase::Finished => Color::Green,
        Phase::Failed => Color::Red,
        Phase::Cancelled => Color::Magenta,
    }
}

fn draw_title(f: &mut Frame, area: Rect, app: &App, state: &SessionState) {
    let config = app.config();
    let source = config.source_port.as_deref().unwrap_or("no source");
    let session = state
        .session_id
        .map(|id| id.simple().to_string()[..8].to_string())
        .unwrap_or_default();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(" rngtoolbox ", Style::default().bold().fg(Color::Cyan)),
            Span::raw("  source: "),
            Span::styled(source, Style::default().bold().fg(Color::Yellow)),
            Span::raw("  "),
            Span::styled(
                state.phase.to_string(),
                Style::default().bold().fg(phase_color(state.phase)),
            ),
            Span::styled(
                format!("  {} → {}  {session} ", config.conditioner_id, config.output_destination),
                Style::default().fg(Color::DarkGray),
            ),
        ]));

    f.render_widget(block, area);
}

fn draw_progress(f: &mut Frame, area: Rect, app: &App, state: &SessionState) {
    let block = Block::default().borders(Borders::ALL).title(" Progress ");
    let unbounded = app.config().is_unbounded();
    let label = if unbounded {
        if app.config().routes_to_entropy_pool() {
            "streaming into the OS entropy pool".to_string()
        } else {
            "streaming until cancelled".to_string()
        }
    } else {
        format!("{:.1}%", state.percent)
    };
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(phase_color(state.phase)))
        .ratio(if unbounded { 0.0 } else { gauge_ratio(state.percent) })
        .label(label);
    f.render_widget(gauge, area);
}

fn draw_output(f: &mut Frame, area: Rect, state: &SessionState) {
    let height = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = tail(&state.output_lines, height)
        .map(|l| {
            if l.starts_with("Error: ") || l.starts_with("Collection failed: ") {
                Line::styled(l.as_str(), Style::default().fg(Color::Red))
            } else {
                Line::raw(l.as_str())
            }
        })
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Output ({} lines) ", state.lines_appended));
    let p = Paragraph::new(lines).block(block);
    f.render_widget(p, area);
}

fn draw_notice(f: &mut Frame, area: Rect, app: &App, state: &SessionState) {
    let text = match (app.notice(), &state.last_error) {
        (Some(notice), _) => notice.to_string(),
        (None, Some(error)) => format!("last error: {error}"),
        (None, None) => String::new(),
    };
    let p = Paragraph::new(format!(" {text}")).style(Style::default().fg(Color::Red));
    f.render_widget(p, area);
}

fn draw_keys(f: &mut Frame, area: Rect, app: &App) {
    let keys = if app.is_collecting() {
        " c: cancel   q: quit"
    } else {
        " s: start   q: quit"
    };
    let bar = Paragraph::new(keys).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}

/// The newest `height` lines, oldest first.
fn tail(lines: &VecDeque<String>, height: usize) -> impl Iterator<Item = &String> {
    lines.iter().skip(lines.len().saturating_sub(height))
}

fn gauge_ratio(percent: f64) -> f64 {
    if percent.is_finite() {
        (percent / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> VecDeque<String> {
        (1..=n).map(|i| i.to_string()).collect()
    }

    #[test]
    fn tail_shows_newest_lines() {
        let buf = lines(10);
        let shown: Vec<&String> = tail(&buf, 3).collect();
        assert_eq!(shown, ["8", "9", "10"]);
    }

    #[test]
    fn tail_shorter_than_pane_shows_everything() {
        assert_eq!(tail(&lines(2), 5).count(), 2);
        assert_eq!(tail(&lines(4), 0).count(), 0);
    }

    #[test]
    fn gauge_ratio_is_clamped() {
        assert_eq!(gauge_ratio(42.0), 0.42);
        assert_eq!(gauge_ratio(120.0), 1.0);
        assert_eq!(gauge_ratio(-1.0), 0.0);
        assert_eq!(gauge_ratio(f64::NAN), 0.0);
    }
}
