use std::io::{self, Stdout};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use tracing::{info, warn};
use unicode_width::UnicodeWidthStr;
use url::Url;

use crate::dataset::{Dataset, Record};
use crate::links::ImageRef;
use crate::session::{self, Event, SessionState};
use crate::view::{self, BrowsePage, SearchResults, View};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_WARNING: Color = Color::Rgb(249, 226, 175);

const NUMERIC_JUMP_TIMEOUT: Duration = Duration::from_millis(800);
const PARAGRAPH_INDENT: &str = "    ";
const DEFAULT_REPORT_WIDTH: usize = 80;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Pane {
    Weeks,
    Report,
}

impl Pane {
    fn title(self) -> &'static str {
        match self {
            Pane::Weeks => "Weeks",
            Pane::Report => "Report",
        }
    }

    fn toggle(self) -> Self {
        match self {
            Pane::Weeks => Pane::Report,
            Pane::Report => Pane::Weeks,
        }
    }
}

struct NumericJump {
    value: usize,
    last_input: Instant,
}

pub struct Options {
    pub title: String,
    pub dataset: Dataset,
    pub source_label: String,
}

pub struct Model {
    title: String,
    dataset: Dataset,
    state: SessionState,
    status_message: String,
    focused_pane: Pane,
    search_focused: bool,
    week_cursor: usize,
    search_cursor: usize,
    content_scroll: u16,
    report_viewport: (usize, u16),
    numeric_jump: Option<NumericJump>,
    needs_redraw: bool,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let state = SessionState::for_dataset(&opts.dataset);
        let status_message = if opts.dataset.weeks().is_empty() {
            format!(
                "Loaded {} from {} (no dated rows).",
                record_count(opts.dataset.len()),
                opts.source_label
            )
        } else {
            format!(
                "Loaded {} across {} week(s) from {}.",
                record_count(opts.dataset.len()),
                opts.dataset.weeks().len(),
                opts.source_label
            )
        };
        Self {
            title: opts.title,
            dataset: opts.dataset,
            state,
            status_message,
            focused_pane: Pane::Report,
            search_focused: false,
            week_cursor: 0,
            search_cursor: 0,
            content_scroll: 0,
            report_viewport: (DEFAULT_REPORT_WIDTH, 0),
            numeric_jump: None,
            needs_redraw: true,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> &str {
        &self.status_message
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let tick_rate = Duration::from_millis(250);

        loop {
            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            if event::poll(tick_rate)? {
                match event::read()? {
                    TermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                warn!(error = %err, "key handler failed");
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                    TermEvent::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    /// Feeds one controller event through the session reducer.
    fn dispatch(&mut self, event: Event) {
        let was_searching = self.state.search_active;
        let previous_week = self.state.selected_week.clone();
        let previous_page = self.state.current_page;

        let transition = session::apply(&self.dataset, &self.state, event);
        self.state = transition.state;
        if let Some(notice) = transition.notice {
            self.status_message = notice;
        }

        if was_searching != self.state.search_active
            || previous_week != self.state.selected_week
            || previous_page != self.state.current_page
        {
            self.content_scroll = 0;
            self.search_cursor = 0;
        }
        self.mark_dirty();
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.search_focused {
            self.handle_search_key(code);
            return Ok(false);
        }

        if !matches!(code, KeyCode::Char(ch) if ch.is_ascii_digit()) {
            self.numeric_jump = None;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('/') => {
                self.search_focused = true;
                self.status_message =
                    "Type a search term, Enter to search, Esc to leave the search box.".to_string();
                self.mark_dirty();
            }
            KeyCode::Char('x') => self.press_search_button(),
            KeyCode::Tab | KeyCode::BackTab => {
                self.focused_pane = self.focused_pane.toggle();
                self.status_message = Self::focus_status_for(self.focused_pane);
                self.mark_dirty();
            }
            KeyCode::Char('h') => {
                if self.focused_pane != Pane::Weeks {
                    self.focused_pane = Pane::Weeks;
                    self.status_message = Self::focus_status_for(self.focused_pane);
                    self.mark_dirty();
                }
            }
            KeyCode::Char('l') => {
                if self.focused_pane != Pane::Report {
                    self.focused_pane = Pane::Report;
                    self.status_message = Self::focus_status_for(self.focused_pane);
                    self.mark_dirty();
                }
            }
            KeyCode::Char('o') | KeyCode::Char('O') => self.open_current_image()?,
            _ => match self.focused_pane {
                Pane::Weeks => self.handle_weeks_key(code),
                Pane::Report => self.handle_report_key(code),
            },
        }
        Ok(false)
    }

    fn handle_search_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.search_focused = false;
                self.status_message = Self::focus_status_for(self.focused_pane);
                self.mark_dirty();
            }
            KeyCode::Enter => {
                self.press_search_button();
                if self.state.search_active {
                    self.search_focused = false;
                }
            }
            KeyCode::Backspace => {
                let mut text = self.state.search_input.clone();
                text.pop();
                self.dispatch(Event::TypeSearchInput(text));
            }
            KeyCode::Char(ch) => {
                let mut text = self.state.search_input.clone();
                text.push(ch);
                self.dispatch(Event::TypeSearchInput(text));
            }
            _ => {}
        }
    }

    fn press_search_button(&mut self) {
        let was_active = self.state.search_active;
        self.dispatch(Event::ToggleSearch);
        if was_active {
            self.status_message = "Search cleared.".to_string();
        } else if self.state.search_active {
            let results = self.dataset.search(&self.state.search_query).len();
            info!(query = %self.state.search_query, results, "search");
            self.status_message = format!(
                "{} for \"{}\". Press x to clear.",
                match results {
                    0 => "No matches".to_string(),
                    1 => "1 match".to_string(),
                    n => format!("{n} matches"),
                },
                self.state.search_query
            );
        }
    }

    fn handle_weeks_key(&mut self, code: KeyCode) {
        let weeks = self.dataset.weeks().len();
        match code {
            KeyCode::Char('j') | KeyCode::Down => {
                if weeks > 0 && self.week_cursor + 1 < weeks {
                    self.week_cursor += 1;
                    self.mark_dirty();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.week_cursor > 0 {
                    self.week_cursor -= 1;
                    self.mark_dirty();
                }
            }
            KeyCode::Home => {
                self.week_cursor = 0;
                self.mark_dirty();
            }
            KeyCode::End => {
                self.week_cursor = weeks.saturating_sub(1);
                self.mark_dirty();
            }
            KeyCode::Enter => {
                let Some(week) = self.dataset.weeks().get(self.week_cursor).cloned() else {
                    self.status_message = "No weeks to select.".to_string();
                    self.mark_dirty();
                    return;
                };
                self.dispatch(Event::SelectWeek(week.clone()));
                let count = self.dataset.week_len(&week);
                self.status_message = if self.state.search_active {
                    format!("Week {week} selected; clear the search to browse it.")
                } else {
                    format!("Week {week}: {}.", record_count(count))
                };
            }
            _ => {}
        }
    }

    fn handle_report_key(&mut self, code: KeyCode) {
        if self.state.search_active {
            self.handle_results_key(code);
            return;
        }

        let max_page = self.max_page();
        let page = self.state.current_page;
        match code {
            KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown | KeyCode::Char(' ') => {
                if page < max_page {
                    self.dispatch(Event::SetPage(page + 1));
                }
            }
            KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp => {
                if page > 1 {
                    self.dispatch(Event::SetPage(page - 1));
                }
            }
            KeyCode::Home => self.dispatch(Event::SetPage(1)),
            KeyCode::End => self.dispatch(Event::SetPage(max_page)),
            KeyCode::Char('j') | KeyCode::Down => {
                if self.content_scroll < self.max_content_scroll() {
                    self.content_scroll += 1;
                    self.mark_dirty();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.content_scroll = self.content_scroll.saturating_sub(1);
                self.mark_dirty();
            }
            KeyCode::Char(ch) if ch.is_ascii_digit() => self.jump_to_page_digit(ch),
            _ => {}
        }
    }

    fn handle_results_key(&mut self, code: KeyCode) {
        let total = self.dataset.search(&self.state.search_query).len();
        match code {
            KeyCode::Char('j') | KeyCode::Down | KeyCode::Char('n') => {
                if self.search_cursor + 1 < total {
                    self.search_cursor += 1;
                    self.mark_dirty();
                }
            }
            KeyCode::Char('k') | KeyCode::Up | KeyCode::Char('p') => {
                if self.search_cursor > 0 {
                    self.search_cursor -= 1;
                    self.mark_dirty();
                }
            }
            KeyCode::Home => {
                self.search_cursor = 0;
                self.mark_dirty();
            }
            KeyCode::End => {
                self.search_cursor = total.saturating_sub(1);
                self.mark_dirty();
            }
            _ => {}
        }
    }

    fn jump_to_page_digit(&mut self, ch: char) {
        let Some(digit) = ch.to_digit(10).map(|d| d as usize) else {
            return;
        };
        let now = Instant::now();
        let continuing = self
            .numeric_jump
            .as_ref()
            .filter(|jump| now.duration_since(jump.last_input) <= NUMERIC_JUMP_TIMEOUT)
            .map(|jump| jump.value);
        let value = match continuing {
            Some(base) => base.saturating_mul(10).saturating_add(digit),
            None if digit == 0 => 10,
            None => digit,
        };
        self.numeric_jump = Some(NumericJump {
            value,
            last_input: now,
        });

        let max_page = self.max_page();
        if value > max_page {
            self.status_message = format!("This week only has {} page(s).", max_page);
            self.mark_dirty();
            return;
        }
        self.dispatch(Event::SetPage(value));
        self.status_message = format!("Jumped to page {}.", value);
    }

    /// Last scroll offset that still keeps the record's tail on screen.
    fn max_content_scroll(&self) -> u16 {
        let view = view::derive(&self.dataset, &self.state);
        let View::Browse(page) = &view else {
            return 0;
        };
        let (width, height) = self.report_viewport;
        let total = browse_lines(page, width).len();
        total
            .saturating_sub(height as usize)
            .min(u16::MAX as usize) as u16
    }

    fn max_page(&self) -> usize {
        session::max_page(&self.dataset, self.state.selected_week.as_deref())
    }

    fn current_image(&self) -> Option<ImageRef> {
        match view::derive(&self.dataset, &self.state) {
            View::Browse(page) => page.record.and_then(|record| record.image.clone()),
            View::Search(results) => results
                .matches
                .get(self.search_cursor)
                .and_then(|record| record.image.clone()),
        }
    }

    fn open_current_image(&mut self) -> Result<()> {
        let Some(image) = self.current_image() else {
            self.status_message = "This record has no image.".to_string();
            self.mark_dirty();
            return Ok(());
        };
        let target = open_target(&image)?;
        webbrowser::open(&target).with_context(|| format!("open image {}", image.label()))?;
        info!(target = %target, "opened image");
        self.status_message = format!("Opened {}.", image.label());
        self.mark_dirty();
        Ok(())
    }

    fn focus_status_for(pane: Pane) -> String {
        match pane {
            Pane::Weeks => "Weeks: j/k to move, Enter to select the week.".to_string(),
            Pane::Report => {
                "Report: n/p change page, digits jump, j/k scroll, o opens the image.".to_string()
            }
        }
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_line = Paragraph::new(format!("{} · {}", self.title, self.status_message))
            .style(
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .bg(COLOR_PANEL_FOCUSED_BG)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(status_line, layout[0]);

        self.draw_search_bar(frame, layout[1]);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(22), Constraint::Percentage(78)])
            .split(layout[2]);
        self.draw_weeks(frame, main_chunks[0]);
        self.draw_report(frame, main_chunks[1]);

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[3]);
    }

    fn pane_block(&self, pane: Pane, title: String) -> Block<'static> {
        let focused = self.focused_pane == pane && !self.search_focused;
        let border_style = if focused {
            Style::default().fg(COLOR_BORDER_FOCUSED)
        } else {
            Style::default().fg(COLOR_BORDER_IDLE)
        };
        let title_style = if focused {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        Block::default()
            .title(Span::styled(title, title_style))
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::horizontal(1))
    }

    fn draw_search_bar(&self, frame: &mut Frame<'_>, area: Rect) {
        let border = if self.search_focused {
            COLOR_BORDER_FOCUSED
        } else {
            COLOR_BORDER_IDLE
        };
        let block = Block::default()
            .title(Span::styled(
                "Search",
                Style::default().fg(if self.search_focused {
                    COLOR_ACCENT
                } else {
                    COLOR_TEXT_SECONDARY
                }),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(COLOR_PANEL_BG));

        let mut spans = Vec::new();
        if self.state.search_input.is_empty() && !self.search_focused {
            spans.push(Span::styled(
                "press / to search titles and contents",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            ));
        } else {
            spans.push(Span::styled(
                self.state.search_input.clone(),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            ));
        }
        if self.search_focused {
            spans.push(Span::styled("▏", Style::default().fg(COLOR_ACCENT)));
        }
        spans.push(Span::raw("   "));
        spans.push(Span::styled(
            format!("[ {} ]", self.state.toggle_label()),
            Style::default()
                .fg(COLOR_BG)
                .bg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        ));

        let paragraph = Paragraph::new(Line::from(spans)).block(block);
        frame.render_widget(paragraph, area);
    }

    fn draw_weeks(&self, frame: &mut Frame<'_>, area: Rect) {
        let title = if self.state.search_active {
            format!("{} (search active)", Pane::Weeks.title())
        } else {
            Pane::Weeks.title().to_string()
        };
        let block = self.pane_block(Pane::Weeks, title);
        let inner = block.inner(area);
        let focused = self.focused_pane == Pane::Weeks && !self.search_focused;

        let mut items: Vec<ListItem> = Vec::with_capacity(self.dataset.weeks().len().max(1));
        for (idx, week) in self.dataset.weeks().iter().enumerate() {
            let is_cursor = focused && idx == self.week_cursor;
            let is_active = self.state.selected_week.as_deref() == Some(week.as_str());
            let background = if is_cursor {
                COLOR_PANEL_SELECTED_BG
            } else {
                COLOR_PANEL_BG
            };
            let mut style = Style::default()
                .fg(if is_cursor || is_active {
                    COLOR_TEXT_PRIMARY
                } else {
                    COLOR_TEXT_SECONDARY
                })
                .bg(background);
            if is_active {
                style = style.add_modifier(Modifier::BOLD);
            }
            let marker = if is_active { "●" } else { "○" };
            let count = self.dataset.week_len(week);
            let mut lines = vec![Line::from(Span::styled(
                format!("{marker} {week} ({count})"),
                style,
            ))];
            pad_lines_to_width(&mut lines, inner.width);
            items.push(ListItem::new(lines));
        }

        if items.is_empty() {
            let mut lines = vec![Line::from(Span::styled(
                "No dated records",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            ))];
            pad_lines_to_width(&mut lines, inner.width);
            items.push(ListItem::new(lines));
        }

        let visible = inner.height as usize;
        let skip = if visible > 0 && self.week_cursor >= visible {
            self.week_cursor + 1 - visible
        } else {
            0
        };
        let items: Vec<ListItem> = items.into_iter().skip(skip).collect();
        frame.render_widget(List::new(items).block(block), area);
    }

    fn draw_report(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let view = view::derive(&self.dataset, &self.state);
        let title = match &view {
            View::Search(results) => format!("{} ({})", view::SEARCH_HEADER, results.matches.len()),
            View::Browse(page) => match &page.week {
                Some(week) => format!("{} · week {}", Pane::Report.title(), week),
                None => Pane::Report.title().to_string(),
            },
        };
        let block = self.pane_block(Pane::Report, title);
        let inner = block.inner(area);
        let width = inner.width.max(1) as usize;
        self.report_viewport = (width, inner.height);

        let (lines, scroll) = match &view {
            View::Search(results) => {
                let (lines, offsets) = search_lines(results, width, self.search_cursor);
                let scroll = offsets
                    .get(self.search_cursor)
                    .copied()
                    .unwrap_or(0)
                    .min(u16::MAX as usize) as u16;
                (lines, scroll)
            }
            View::Browse(page) => {
                let lines = browse_lines(page, width);
                let max_scroll = lines.len().saturating_sub(inner.height as usize);
                let scroll = (self.content_scroll as usize).min(max_scroll) as u16;
                (lines, scroll)
            }
        };

        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0));
        frame.render_widget(paragraph, area);
    }

    fn footer_text(&self) -> String {
        let mut parts = Vec::new();
        if self.search_focused {
            parts.push("type to edit".to_string());
            parts.push(format!("Enter {}", self.state.toggle_label().to_lowercase()));
            parts.push("Esc leave search box".to_string());
            return parts.join(" · ");
        }
        if !self.state.search_active {
            let max_page = self.max_page();
            parts.push(view::page_footer(self.state.current_page, max_page));
        }
        parts.push("Tab switch pane".to_string());
        parts.push("/ search".to_string());
        if self.state.search_active {
            parts.push("x clear search".to_string());
        }
        parts.push("o open image".to_string());
        parts.push("q quit".to_string());
        parts.join(" · ")
    }
}

fn record_count(count: usize) -> String {
    if count == 1 {
        "1 record".to_string()
    } else {
        format!("{count} records")
    }
}

/// Resolves an image reference into something the system opener accepts.
fn open_target(image: &ImageRef) -> Result<String> {
    match image {
        ImageRef::Remote(url) => Ok(url.clone()),
        ImageRef::Local(path) => local_file_url(path),
    }
}

fn local_file_url(path: &Path) -> Result<String> {
    let absolute = path
        .canonicalize()
        .with_context(|| format!("locate image {}", path.display()))?;
    Url::from_file_path(&absolute)
        .map(|url| url.to_string())
        .map_err(|_| anyhow::anyhow!("image path {} is not absolute", absolute.display()))
}

fn browse_lines(page: &BrowsePage<'_>, width: usize) -> Vec<Line<'static>> {
    let Some(record) = page.record else {
        return vec![
            Line::default(),
            Line::from(Span::styled(
                view::NO_WEEK_DATA_NOTICE,
                Style::default()
                    .fg(COLOR_WARNING)
                    .add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center),
        ];
    };

    let mut lines = Vec::new();
    let box_style = Style::default()
        .fg(COLOR_TEXT_PRIMARY)
        .add_modifier(Modifier::BOLD);
    let category = wrap_centered(&record.category, width.saturating_sub(4), box_style);
    let widest = category.iter().map(total_width).max().unwrap_or(0);
    let rule = "─".repeat((widest + 4).min(width));
    lines.push(Line::from(Span::styled(rule.clone(), box_style)).alignment(Alignment::Center));
    lines.extend(category);
    lines.push(Line::from(Span::styled(rule, box_style)).alignment(Alignment::Center));
    lines.push(Line::default());
    lines.extend(record_lines(record, width, false));
    lines.push(Line::default());
    lines.extend(
        wrap_plain(&page.footer(), width, Style::default().fg(COLOR_TEXT_SECONDARY))
            .into_iter()
            .map(|line| line.alignment(Alignment::Right)),
    );
    lines
}

/// Lines for every match plus the starting line of each match, so the pane
/// can scroll to the highlighted one.
fn search_lines(
    results: &SearchResults<'_>,
    width: usize,
    cursor: usize,
) -> (Vec<Line<'static>>, Vec<usize>) {
    let mut lines = wrap_plain(
        &format!("{}: \"{}\"", view::SEARCH_HEADER, results.query),
        width,
        Style::default()
            .fg(COLOR_ACCENT)
            .add_modifier(Modifier::BOLD),
    );

    if results.matches.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            view::NO_RESULTS_NOTICE,
            Style::default()
                .fg(COLOR_WARNING)
                .add_modifier(Modifier::BOLD),
        )));
        return (lines, Vec::new());
    }

    let mut offsets = Vec::with_capacity(results.matches.len());
    for (idx, record) in results.matches.iter().enumerate() {
        lines.push(Line::default());
        offsets.push(lines.len());
        let separator = if idx == cursor { "━" } else { "─" };
        let separator_color = if idx == cursor {
            COLOR_ACCENT
        } else {
            COLOR_BORDER_IDLE
        };
        lines.push(Line::from(Span::styled(
            separator.repeat(width),
            Style::default().fg(separator_color),
        )));
        lines.extend(record_lines(record, width, idx == cursor));
    }
    (lines, offsets)
}

fn record_lines(record: &Record, width: usize, highlight: bool) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let media_style = Style::default()
        .fg(if highlight {
            COLOR_ACCENT
        } else {
            COLOR_TEXT_PRIMARY
        })
        .add_modifier(Modifier::BOLD);
    lines.extend(wrap_centered(&record.media, width, media_style));
    lines.extend(wrap_centered(
        &format!("[{}]", record.date_label()),
        width,
        Style::default().fg(COLOR_TEXT_SECONDARY),
    ));
    lines.push(Line::default());
    lines.extend(wrap_plain(
        &record.title,
        width,
        Style::default()
            .fg(COLOR_TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD),
    ));
    lines.push(Line::default());
    let body_style = Style::default().fg(COLOR_TEXT_PRIMARY);
    for paragraph in record.contents.lines() {
        lines.extend(wrap_with_prefixes(paragraph, width, PARAGRAPH_INDENT, "", body_style));
    }
    if let Some(image) = &record.image {
        lines.push(Line::default());
        lines.extend(image_lines(image, width));
    }
    lines
}

fn image_lines(image: &ImageRef, width: usize) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .fg(COLOR_ACCENT)
        .add_modifier(Modifier::ITALIC);
    let mut lines = wrap_plain(&format!("[image: {}]", image.label()), width, label_style);
    lines.extend(wrap_plain(
        &image.target(),
        width,
        Style::default().fg(COLOR_TEXT_SECONDARY),
    ));
    lines
}

fn wrap_with_prefixes(
    text: &str,
    width: usize,
    first_prefix: &str,
    rest_prefix: &str,
    style: Style,
) -> Vec<Line<'static>> {
    if text.trim().is_empty() {
        return vec![Line::from(Span::styled(String::new(), style))];
    }

    let min_width = first_prefix
        .chars()
        .count()
        .max(rest_prefix.chars().count())
        .saturating_add(1);
    let wrap_width = width.max(min_width);
    let options = WrapOptions::new(wrap_width)
        .initial_indent(first_prefix)
        .subsequent_indent(rest_prefix);

    wrap(text, options)
        .into_iter()
        .map(|cow| Line::from(Span::styled(cow.into_owned(), style)))
        .collect()
}

fn wrap_plain(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    wrap_with_prefixes(text, width, "", "", style)
}

/// Pre-wrapped so each returned line is exactly one row on screen.
fn wrap_centered(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    wrap_plain(text, width, style)
        .into_iter()
        .map(|line| line.alignment(Alignment::Center))
        .collect()
}

fn total_width(line: &Line<'_>) -> usize {
    line.spans
        .iter()
        .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
        .sum()
}

fn pad_lines_to_width(lines: &mut [Line<'static>], width: u16) {
    let width = width as usize;
    if width == 0 {
        return;
    }

    for line in lines {
        let current_width = total_width(line);
        if current_width >= width {
            continue;
        }
        let pad_style = line.spans.last().map(|span| span.style).unwrap_or_default();
        let padding = " ".repeat(width - current_width);
        line.spans.push(Span::styled(padding, pad_style));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::normalize_date;

    fn record(date: &str, title: &str, contents: &str) -> Record {
        Record {
            media: "SBS".into(),
            date: normalize_date(date),
            category: "Broadcast".into(),
            title: title.into(),
            contents: contents.into(),
            image: None,
        }
    }

    fn model() -> Model {
        let dataset = Dataset::from_records(vec![
            record("2024-03-01", "first", "alpha"),
            record("2024-03-01", "second", "beta"),
            record("2024-03-01", "third", "gamma news"),
            record("2024-03-08", "Evening News", ""),
        ]);
        Model::new(Options {
            title: "Report".into(),
            dataset,
            source_label: "test".into(),
        })
    }

    fn type_text(model: &mut Model, text: &str) {
        for ch in text.chars() {
            model.handle_key(KeyCode::Char(ch)).unwrap();
        }
    }

    #[test]
    fn starts_on_newest_week() {
        let model = model();
        assert_eq!(model.state().selected_week.as_deref(), Some("2024-03-08"));
        assert!(model.status().contains("4 records across 2 week(s)"));
    }

    #[test]
    fn selecting_a_week_from_the_list() {
        let mut model = model();
        model.handle_key(KeyCode::Tab).unwrap();
        model.handle_key(KeyCode::Char('j')).unwrap();
        model.handle_key(KeyCode::Enter).unwrap();
        assert_eq!(model.state().selected_week.as_deref(), Some("2024-03-01"));
        assert_eq!(model.status(), "Week 2024-03-01: 3 records.");
    }

    #[test]
    fn paging_stays_within_the_week() {
        let mut model = model();
        model.handle_key(KeyCode::Tab).unwrap();
        model.handle_key(KeyCode::Down).unwrap();
        model.handle_key(KeyCode::Enter).unwrap();
        model.handle_key(KeyCode::Tab).unwrap();

        model.handle_key(KeyCode::Char('n')).unwrap();
        model.handle_key(KeyCode::Char('n')).unwrap();
        model.handle_key(KeyCode::Char('n')).unwrap();
        assert_eq!(model.state().current_page, 3);
        model.handle_key(KeyCode::Char('p')).unwrap();
        assert_eq!(model.state().current_page, 2);
        model.handle_key(KeyCode::Char('9')).unwrap();
        assert_eq!(model.state().current_page, 2);
        assert!(model.status().contains("only has 3 page(s)"));
        model.handle_key(KeyCode::End).unwrap();
        assert_eq!(model.state().current_page, 3);
    }

    #[test]
    fn empty_search_shows_notice() {
        let mut model = model();
        model.handle_key(KeyCode::Char('/')).unwrap();
        type_text(&mut model, "   ");
        model.handle_key(KeyCode::Enter).unwrap();
        assert!(!model.state().search_active);
        assert_eq!(model.status(), session::EMPTY_SEARCH_NOTICE);
    }

    #[test]
    fn search_box_captures_letters_then_toggles() {
        let mut model = model();
        model.handle_key(KeyCode::Char('/')).unwrap();
        type_text(&mut model, "newsq");
        model.handle_key(KeyCode::Backspace).unwrap();
        assert_eq!(model.state().search_input, "news");
        model.handle_key(KeyCode::Enter).unwrap();
        assert!(model.state().search_active);
        assert_eq!(model.state().search_query, "news");
        assert!(model.status().starts_with("2 matches"));

        model.handle_key(KeyCode::Char('x')).unwrap();
        assert!(!model.state().search_active);
        assert_eq!(model.state().search_input, "");
        assert_eq!(model.state().current_page, 1);
        assert_eq!(model.status(), "Search cleared.");
    }

    #[test]
    fn quit_keys_end_the_loop() {
        let mut model = model();
        assert!(model.handle_key(KeyCode::Char('q')).unwrap());
        let mut model = self::model();
        model.handle_key(KeyCode::Char('/')).unwrap();
        assert!(!model.handle_key(KeyCode::Char('q')).unwrap());
        assert_eq!(model.state().search_input, "q");
    }

    #[test]
    fn missing_image_is_reported() {
        let mut model = model();
        model.handle_key(KeyCode::Char('o')).unwrap();
        assert_eq!(model.status(), "This record has no image.");
    }

    #[test]
    fn browse_lines_end_with_page_footer() {
        let data = Dataset::from_records(vec![record("2024-03-01", "t", "body")]);
        let state = SessionState::for_dataset(&data);
        let View::Browse(page) = view::derive(&data, &state) else {
            panic!("expected browse view");
        };
        let lines = browse_lines(&page, 40);
        let last = lines.last().unwrap();
        assert_eq!(last.spans[0].content.as_ref(), "page 1 / 1");
    }

    #[test]
    fn search_offsets_point_at_each_match() {
        let data = Dataset::from_records(vec![
            record("2024-03-01", "news one", ""),
            record("2024-03-08", "news two", "long body"),
        ]);
        let results = SearchResults {
            query: "news".into(),
            matches: data.search("news"),
        };
        let (lines, offsets) = search_lines(&results, 30, 0);
        assert_eq!(offsets.len(), 2);
        assert!(offsets[0] < offsets[1]);
        assert!(offsets[1] < lines.len());
    }

    #[test]
    fn long_media_names_are_wrapped_before_offsets_are_counted() {
        let mut long = record("2024-03-01", "news one", "");
        long.media = "Korean Broadcasting System Radio Network".into();
        let data = Dataset::from_records(vec![long, record("2024-03-08", "news two", "")]);
        let results = SearchResults {
            query: "news".into(),
            matches: data.search("news"),
        };
        let (lines, offsets) = search_lines(&results, 12, 1);
        assert!(lines.iter().all(|line| total_width(line) <= 12));
        for offset in offsets {
            let first = lines[offset].spans[0].content.as_ref();
            assert!(first.starts_with('─') || first.starts_with('━'), "{first:?}");
        }
    }

    #[test]
    fn scrolling_stops_at_end_of_record() {
        let mut model = model();
        model.report_viewport = (40, 5);
        let view = view::derive(&model.dataset, &model.state);
        let View::Browse(page) = &view else {
            panic!("expected browse view");
        };
        let expected = (browse_lines(page, 40).len() - 5) as u16;

        for _ in 0..200 {
            model.handle_key(KeyCode::Char('j')).unwrap();
        }
        assert_eq!(model.content_scroll, expected);
        model.handle_key(KeyCode::Char('k')).unwrap();
        assert_eq!(model.content_scroll, expected - 1);
    }

    #[test]
    fn pad_lines_extends_to_width() {
        let mut lines = vec![Line::from(vec![Span::raw("abc")])];
        pad_lines_to_width(&mut lines, 6);
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(total_width(&lines[0]), 6);
    }

    #[test]
    fn pad_lines_supports_wide_glyphs() {
        let mut lines = vec![Line::from(vec![Span::raw("뉴스")])];
        pad_lines_to_width(&mut lines, 5);
        assert_eq!(total_width(&lines[0]), 5);
    }
}
