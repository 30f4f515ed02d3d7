//! Header component: 2-row top bar.
//!
//! Row 1: player state icon, now-playing station, its country and genre.
//! Row 2: list source, station count, last update time | volume gauge.
//!
//! Not focusable.

use ratatui::crossterm::event::{KeyEvent, MouseEvent};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{
        player_state_icon, C_ACCENT, C_LOCATION, C_MUTED, C_PRIMARY, C_SECONDARY, C_TAG,
    },
};

const VOLUME_GAUGE_CELLS: usize = 10;

pub struct Header;

impl Header {
    pub fn new() -> Self {
        Self
    }
}

impl Component for Header {
    fn id(&self) -> ComponentId {
        ComponentId::Header
    }

    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn handle_mouse(&mut self, _event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn on_action(&mut self, _action: &Action, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        frame.render_widget(Clear, area);
        if area.height < 2 {
            frame.render_widget(Paragraph::new(build_row1(state)), area);
            return;
        }

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(area);
        frame.render_widget(Paragraph::new(build_row1(state)), rows[0]);

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(22)])
            .split(rows[1]);
        frame.render_widget(Paragraph::new(build_source_line(state)), cols[0]);
        frame.render_widget(
            Paragraph::new(volume_line(state.volume)).alignment(Alignment::Right),
            cols[1],
        );
    }
}

fn build_row1(state: &AppState) -> Line<'static> {
    let mut spans = vec![Span::styled(
        " worldradio ",
        Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
    )];

    match &state.now_playing {
        Some(station) => {
            let (icon, color) = player_state_icon(state.player_state);
            spans.push(Span::styled(format!("{} ", icon), Style::default().fg(color)));
            spans.push(Span::styled(
                station.name.clone(),
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            ));
            if !station.country.is_empty() {
                spans.push(Span::raw("  "));
                spans.push(Span::styled(
                    station.country.clone(),
                    Style::default().fg(C_LOCATION),
                ));
            }
            let genre = station.genre_display();
            if !genre.is_empty() {
                spans.push(Span::raw("  "));
                spans.push(Span::styled(genre, Style::default().fg(C_TAG)));
            }
            spans.push(Span::styled(
                format!("  [{}]", state.player_state.label()),
                Style::default().fg(color),
            ));
        }
        None => spans.push(Span::styled("nothing playing", Style::default().fg(C_MUTED))),
    }

    Line::from(spans)
}

fn build_source_line(state: &AppState) -> Line<'static> {
    let mut spans = vec![Span::styled(
        format!(" {}", state.view_mode.label()),
        Style::default().fg(C_SECONDARY),
    )];
    if !state.source_label.is_empty() {
        spans.push(Span::styled(" · ", Style::default().fg(C_MUTED)));
        spans.push(Span::styled(
            format!("{} ({})", state.source_label, state.stations.len()),
            Style::default().fg(C_SECONDARY),
        ));
    }
    spans.push(Span::styled(" · ", Style::default().fg(C_MUTED)));
    spans.push(Span::styled(
        format!("{} favorites", state.favorites.len()),
        Style::default().fg(C_SECONDARY),
    ));
    if let Some(ts) = state.last_updated {
        spans.push(Span::styled(
            format!(" · updated {}", ts.format("%H:%M")),
            Style::default().fg(C_MUTED),
        ));
    }
    Line::from(spans)
}

fn volume_line(volume: u8) -> Line<'static> {
    let filled = (volume as usize * VOLUME_GAUGE_CELLS + 50) / 100;
    Line::from(vec![
        Span::styled("vol ", Style::default().fg(C_MUTED)),
        Span::styled("█".repeat(filled), Style::default().fg(C_SECONDARY)),
        Span::styled(
            "░".repeat(VOLUME_GAUGE_CELLS - filled),
            Style::default().fg(C_MUTED),
        ),
        Span::styled(format!(" {:>3}% ", volume), Style::default().fg(C_PRIMARY)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_gauge_bounds() {
        let text = |v| {
            volume_line(v)
                .spans
                .iter()
                .map(|s| s.content.to_string())
                .collect::<String>()
        };
        assert_eq!(text(0), "vol ░░░░░░░░░░   0% ");
        assert_eq!(text(100), "vol ██████████ 100% ");
        assert_eq!(text(70), "vol ███████░░░  70% ");
    }
}
