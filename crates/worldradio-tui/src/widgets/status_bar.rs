//! Status line and keybindings footer.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_MODE_NORMAL, C_MODE_SEARCH, C_MUTED, C_PAUSED, C_PLAYING, C_SECONDARY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
}

impl InputMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "BROWSE",
            Self::Search => "SEARCH",
        }
    }

    pub fn color(self) -> ratatui::style::Color {
        match self {
            Self::Normal => C_MODE_NORMAL,
            Self::Search => C_MODE_SEARCH,
        }
    }
}

/// One-row status line: a loading dot, then the latest status message.
pub fn draw_status_line(frame: &mut Frame, area: Rect, status: &str, loading: bool) {
    let dot = if loading {
        Span::styled("●", Style::default().fg(C_PAUSED))
    } else {
        Span::styled("●", Style::default().fg(C_PLAYING))
    };
    let line = Line::from(vec![
        Span::raw(" "),
        dot,
        Span::raw(" "),
        Span::styled(status, Style::default().fg(C_SECONDARY)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

pub fn draw_keys_bar(frame: &mut Frame, area: Rect, mode: InputMode) {
    let keys = match mode {
        InputMode::Normal => {
            " ↑↓/jk select  Enter play  Space pause  s stop  ←→ vol  f fav  Tab view  / search  r refresh  y copy  ? help  q quit"
        }
        InputMode::Search => " type to search  ↑↓ move  Enter keep  Esc clear+close  Tab view",
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", mode.label()),
            Style::default()
                .fg(mode.color())
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(keys, Style::default().fg(C_MUTED)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}
