//! StationList component: the station table.

use std::time::Instant;

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::Span,
    widgets::{Cell, Paragraph, Row, Table},
    Frame,
};

use worldradio_proto::model::Station;

use crate::{
    action::{Action, ComponentId, ViewMode},
    app_state::AppState,
    component::Component,
    theme::{
        player_state_icon, style_muted, style_selected, C_HEADER_ROW, C_LANGUAGE, C_LOCATION,
        C_PRIMARY, C_SECONDARY, C_STARS, C_TAG,
    },
    widgets::{
        filter_input::{FilterAction, FilterInput},
        pane_chrome::{pane_chrome, Badge},
        scrollable_list::ScrollableList,
    },
};

const DOUBLE_CLICK_MS: u128 = 400;
/// Border plus the column header row.
const TABLE_TOP_ROWS: u16 = 2;

pub struct StationList {
    pub list: ScrollableList<Station>,
    pub filter_input: FilterInput,
    /// View the current items were built for.
    synced_view: ViewMode,
    /// Last click (row, time) for double-click detection.
    last_click: Option<(usize, Instant)>,
}

impl StationList {
    pub fn new() -> Self {
        Self {
            list: ScrollableList::new(|station: &Station, q: &str| station.matches(q)),
            filter_input: FilterInput::new("name, country, genre, language…"),
            synced_view: ViewMode::All,
            last_click: None,
        }
    }

    /// Rebuild the rows from the current view's base list, keeping the
    /// search text. Switching views starts at the top.
    pub fn sync_stations(&mut self, state: &AppState) {
        let selected_id = self.list.selected_item().map(|s| s.id.clone());
        self.list.set_items(state.base_list().to_vec());

        if self.synced_view != state.view_mode {
            self.synced_view = state.view_mode;
            self.list.select_first();
        } else if let Some(id) = selected_id {
            let pos = self.list.visible().position(|s| s.id == id);
            if let Some(pos) = pos {
                self.list.selected = pos;
            }
        }
    }

    pub fn is_filter_active(&self) -> bool {
        self.filter_input.is_active()
    }

    pub fn selected_station(&self) -> Option<&Station> {
        self.list.selected_item()
    }

    fn play_selected(&self) -> Vec<Action> {
        match self.selected_station() {
            Some(st) => vec![Action::Play(st.clone())],
            None => vec![Action::Status("select a station first".into())],
        }
    }

    fn render_row<'a>(&self, station: &'a Station, is_selected: bool, state: &AppState) -> Row<'a> {
        let is_current = state.is_current(station);
        let (icon, icon_color) = if is_current {
            player_state_icon(state.player_state)
        } else {
            (" ", C_SECONDARY)
        };
        let star = if state.is_favorite(station) { "★" } else { " " };

        let name_style = if is_current {
            Style::default().fg(icon_color).add_modifier(Modifier::BOLD)
        } else if is_selected {
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(C_SECONDARY)
        };
        let bitrate = if station.bitrate > 0 {
            station.bitrate.to_string()
        } else {
            "-".to_string()
        };

        let row = Row::new(vec![
            Cell::from(Span::styled(icon, Style::default().fg(icon_color))),
            Cell::from(Span::styled(star, Style::default().fg(C_STARS))),
            Cell::from(Span::styled(station.name.as_str(), name_style)),
            Cell::from(Span::styled(
                station.country.as_str(),
                Style::default().fg(C_LOCATION),
            )),
            Cell::from(Span::styled(
                station.genre_display(),
                Style::default().fg(C_TAG),
            )),
            Cell::from(Span::styled(
                station.language.as_str(),
                Style::default().fg(C_LANGUAGE),
            )),
            Cell::from(Span::styled(bitrate, Style::default().fg(C_SECONDARY))),
        ]);
        if is_selected {
            row.style(style_selected())
        } else {
            row
        }
    }
}

impl Default for StationList {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for StationList {
    fn id(&self) -> ComponentId {
        ComponentId::StationList
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }

        if self.is_filter_active() {
            match key.code {
                KeyCode::Up => {
                    self.list.select_up(1);
                    return vec![];
                }
                KeyCode::Down => {
                    self.list.select_down(1);
                    return vec![];
                }
                _ => {}
            }
            return match self.filter_input.handle_key(key) {
                FilterAction::Changed(q) => {
                    self.list.set_filter(&q);
                    vec![Action::FilterChanged(q)]
                }
                FilterAction::Confirmed => vec![Action::CloseFilter],
                FilterAction::Cancelled => {
                    self.list.set_filter("");
                    vec![Action::FilterChanged(String::new()), Action::CloseFilter]
                }
            };
        }

        let step = if key.modifiers.contains(KeyModifiers::SHIFT) {
            5
        } else {
            1
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.list.select_up(step),
            KeyCode::Down | KeyCode::Char('j') => self.list.select_down(step),
            KeyCode::PageUp => self.list.select_up(10),
            KeyCode::PageDown => self.list.select_down(10),
            KeyCode::Home | KeyCode::Char('g') => self.list.select_first(),
            KeyCode::End | KeyCode::Char('G') => self.list.select_last(),

            KeyCode::Enter => return self.play_selected(),
            KeyCode::Char(' ') => {
                // Space pauses whatever is loaded, or starts the selection.
                if state.player_state.is_active() {
                    return vec![Action::TogglePause];
                }
                return self.play_selected();
            }
            KeyCode::Char('s') => return vec![Action::Stop],

            KeyCode::Char('f') | KeyCode::Char('*') => {
                return match self.selected_station() {
                    Some(st) => vec![Action::ToggleFavorite(st.clone())],
                    None => vec![Action::Status("select a station first".into())],
                };
            }

            KeyCode::Char('/') => {
                self.filter_input.activate();
                return vec![Action::OpenFilter];
            }

            KeyCode::Char('y') => {
                if let Some(url) = self.selected_station().and_then(|s| s.stream_url()) {
                    return vec![Action::CopyToClipboard(url.to_string())];
                }
            }

            _ => {}
        }

        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, _state: &AppState) -> Vec<Action> {
        match event.kind {
            MouseEventKind::ScrollUp => self.list.select_up(1),
            MouseEventKind::ScrollDown => self.list.select_down(1),
            MouseEventKind::Down(MouseButton::Left) => {
                if event.row < area.y + TABLE_TOP_ROWS {
                    return vec![];
                }
                let rel_row = (event.row - (area.y + TABLE_TOP_ROWS)) as usize;
                let now = Instant::now();
                let is_double = self
                    .last_click
                    .map(|(row, t)| row == rel_row && t.elapsed().as_millis() < DOUBLE_CLICK_MS)
                    .unwrap_or(false);

                if self.list.handle_click(rel_row) && is_double {
                    self.last_click = None;
                    return self.play_selected();
                }
                self.last_click = Some((rel_row, now));
            }
            _ => {}
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, state: &AppState) -> Vec<Action> {
        match action {
            Action::FilterChanged(q) => {
                if self.list.filter != *q {
                    self.list.set_filter(q);
                }
            }
            Action::CloseFilter => self.filter_input.deactivate(),
            Action::SwitchView(_) | Action::ToggleFavorite(_) => self.sync_stations(state),
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let badge_text = if self.list.filter.is_empty() {
            format!("{}", self.list.total_len())
        } else {
            format!("{}/{}", self.list.len(), self.list.total_len())
        };
        let block = pane_chrome(
            state.view_mode.label(),
            focused,
            Some(Badge {
                text: &badge_text,
                color: C_SECONDARY,
            }),
        );
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let show_filter = self.filter_input.is_active() || !self.list.filter.is_empty();
        let filter_h = u16::from(show_filter && inner.height > 1);
        let table_area = Rect {
            height: inner.height.saturating_sub(filter_h),
            ..inner
        };
        if filter_h > 0 {
            let filter_area = Rect {
                y: inner.y + inner.height - 1,
                height: 1,
                ..inner
            };
            self.filter_input.draw(frame, filter_area);
        }

        if self.list.is_empty() {
            let msg = if state.loading && self.list.total_len() == 0 {
                "  loading stations…"
            } else if self.list.total_len() > 0 {
                "  no stations match search"
            } else {
                "  no stations to display"
            };
            frame.render_widget(Paragraph::new(Span::styled(msg, style_muted())), table_area);
            return;
        }

        let content_h = table_area.height.saturating_sub(1) as usize;
        self.list.ensure_visible(content_h);
        let sel_in_view = self.list.selected_in_view(content_h);

        let rows: Vec<Row> = self
            .list
            .visible_items(content_h)
            .into_iter()
            .enumerate()
            .map(|(view_row, station)| self.render_row(station, view_row == sel_in_view, state))
            .collect();

        let header = Row::new(vec!["", "★", "name", "country", "genre", "language", "kbps"])
            .style(Style::default().fg(C_HEADER_ROW).add_modifier(Modifier::BOLD));
        let widths = [
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(3),
            Constraint::Fill(1),
            Constraint::Length(30),
            Constraint::Fill(1),
            Constraint::Length(4),
        ];
        let table = Table::new(rows, widths).header(header).column_spacing(1);
        frame.render_widget(table, table_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEventState;
    use std::time::Duration;

    fn station(id: &str, name: &str, country: &str, tags: &str) -> Station {
        Station {
            id: id.into(),
            name: name.into(),
            country: country.into(),
            tags: tags.into(),
            language: "english".into(),
            url_resolved: format!("http://stream.example/{}", id),
            ..Station::default()
        }
    }

    fn state() -> AppState {
        let mut state = AppState::new(70);
        state.stations = vec![
            station("a", "Radio Paradise", "United States", "eclectic,rock"),
            station("b", "FIP", "France", "jazz,world"),
            station("c", "Jazz24", "United States", "jazz,smooth jazz"),
        ];
        state.favorites = vec![station("b", "FIP", "France", "jazz,world")];
        state.favorite_ids.insert("b".into());
        state
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn names(list: &StationList) -> Vec<String> {
        list.list.visible().map(|s| s.name.clone()).collect()
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let state = state();
        let mut list = StationList::new();
        list.sync_stations(&state);

        list.list.set_filter("JAZZ");
        assert_eq!(names(&list), vec!["FIP", "Jazz24"]);
        list.list.set_filter("france");
        assert_eq!(names(&list), vec!["FIP"]);
        list.list.set_filter("English");
        assert_eq!(list.list.len(), 3);
    }

    #[test]
    fn test_empty_query_restores_base_list_in_each_view() {
        let mut state = state();
        let mut list = StationList::new();
        list.sync_stations(&state);

        list.list.set_filter("paradise");
        assert_eq!(list.list.len(), 1);
        list.list.set_filter("");
        assert_eq!(list.list.visible().cloned().collect::<Vec<_>>(), state.stations);

        state.view_mode = ViewMode::Favorites;
        list.sync_stations(&state);
        list.list.set_filter("zzz");
        assert!(list.list.is_empty());
        list.list.set_filter("");
        assert_eq!(list.list.visible().cloned().collect::<Vec<_>>(), state.favorites);
    }

    #[test]
    fn test_search_survives_refresh() {
        let mut state = state();
        let mut list = StationList::new();
        list.sync_stations(&state);
        list.list.set_filter("jazz");

        state.stations.push(station("d", "Smooth Jazz Florida", "United States", "jazz"));
        list.sync_stations(&state);
        assert_eq!(names(&list), vec!["FIP", "Jazz24", "Smooth Jazz Florida"]);
    }

    #[test]
    fn test_typing_in_search_box_filters_rows() {
        let state = state();
        let mut list = StationList::new();
        list.sync_stations(&state);

        assert!(matches!(
            list.handle_key(key(KeyCode::Char('/')), &state)[..],
            [Action::OpenFilter]
        ));
        list.handle_key(key(KeyCode::Char('f')), &state);
        list.handle_key(key(KeyCode::Char('i')), &state);
        assert_eq!(names(&list), vec!["FIP"]);

        // first Esc clears, second closes
        list.handle_key(key(KeyCode::Esc), &state);
        assert_eq!(list.list.len(), 3);
        assert!(list.is_filter_active());
        let actions = list.handle_key(key(KeyCode::Esc), &state);
        assert!(matches!(actions.last(), Some(Action::CloseFilter)));
        assert!(!list.is_filter_active());
    }

    #[test]
    fn test_enter_and_favorite_resolve_the_selected_station() {
        let state = state();
        let mut list = StationList::new();
        list.sync_stations(&state);
        list.handle_key(key(KeyCode::Down), &state);

        match &list.handle_key(key(KeyCode::Enter), &state)[..] {
            [Action::Play(st)] => assert_eq!(st.id, "b"),
            other => panic!("unexpected actions: {:?}", other),
        }
        match &list.handle_key(key(KeyCode::Char('f')), &state)[..] {
            [Action::ToggleFavorite(st)] => assert_eq!(st.id, "b"),
            other => panic!("unexpected actions: {:?}", other),
        }
    }

    #[test]
    fn test_enter_on_empty_list_asks_for_a_selection() {
        let state = AppState::new(70);
        let mut list = StationList::new();
        list.sync_stations(&state);
        match &list.handle_key(key(KeyCode::Enter), &state)[..] {
            [Action::Status(msg)] => assert_eq!(msg, "select a station first"),
            other => panic!("unexpected actions: {:?}", other),
        }
    }

    #[test]
    fn test_switching_view_resets_selection() {
        let mut state = state();
        let mut list = StationList::new();
        list.sync_stations(&state);
        list.handle_key(key(KeyCode::Char('G')), &state);
        assert_eq!(list.selected_station().map(|s| s.id.as_str()), Some("c"));

        state.view_mode = ViewMode::Favorites;
        list.on_action(&Action::SwitchView(ViewMode::Favorites), &state);
        assert_eq!(list.selected_station().map(|s| s.id.as_str()), Some("b"));
    }

    const TABLE_AREA: Rect = Rect {
        x: 0,
        y: 3,
        width: 80,
        height: 20,
    };

    fn click(row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 10,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    /// Screen row of the `n`th visible station.
    fn station_row(n: u16) -> u16 {
        TABLE_AREA.y + TABLE_TOP_ROWS + n
    }

    fn played(actions: &[Action]) -> Option<String> {
        match actions {
            [Action::Play(st)] => Some(st.id.clone()),
            _ => None,
        }
    }

    #[test]
    fn test_double_click_plays_clicked_row() {
        let state = state();
        let mut list = StationList::new();
        list.sync_stations(&state);

        let first = list.handle_mouse(click(station_row(1)), TABLE_AREA, &state);
        assert!(first.is_empty());
        assert_eq!(list.selected_station().map(|s| s.id.as_str()), Some("b"));

        let second = list.handle_mouse(click(station_row(1)), TABLE_AREA, &state);
        assert_eq!(played(&second).as_deref(), Some("b"));

        // a third click starts a new pair
        let third = list.handle_mouse(click(station_row(1)), TABLE_AREA, &state);
        assert!(third.is_empty());
    }

    #[test]
    fn test_clicks_on_different_rows_only_select() {
        let state = state();
        let mut list = StationList::new();
        list.sync_stations(&state);

        assert!(list
            .handle_mouse(click(station_row(0)), TABLE_AREA, &state)
            .is_empty());
        let second = list.handle_mouse(click(station_row(2)), TABLE_AREA, &state);
        assert_eq!(played(&second), None);
        assert_eq!(list.selected_station().map(|s| s.id.as_str()), Some("c"));
    }

    #[test]
    fn test_slow_second_click_does_not_play() {
        let state = state();
        let mut list = StationList::new();
        list.sync_stations(&state);

        list.handle_mouse(click(station_row(0)), TABLE_AREA, &state);
        let stale = Instant::now()
            .checked_sub(Duration::from_millis(DOUBLE_CLICK_MS as u64 + 100))
            .unwrap();
        list.last_click = Some((0, stale));

        let second = list.handle_mouse(click(station_row(0)), TABLE_AREA, &state);
        assert_eq!(played(&second), None);
    }

    #[test]
    fn test_clicks_on_border_and_header_are_ignored() {
        let state = state();
        let mut list = StationList::new();
        list.sync_stations(&state);
        list.list.select_last();

        for row in TABLE_AREA.y..TABLE_AREA.y + TABLE_TOP_ROWS {
            assert!(list.handle_mouse(click(row), TABLE_AREA, &state).is_empty());
            assert!(list.handle_mouse(click(row), TABLE_AREA, &state).is_empty());
        }
        assert_eq!(list.selected_station().map(|s| s.id.as_str()), Some("c"));
    }
}
