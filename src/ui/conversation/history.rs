//! Conversation history display component

use crate::events::{ChatRole, TurnId};
use crate::markup::{Document, Inline};
use chrono::{DateTime, Local};
use std::cell::Cell;
use std::rc::Rc;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

pub const PENDING_TEXT: &str = "Typing...";

/// What a history entry shows
#[derive(Debug, Clone, PartialEq)]
pub enum EntryBody {
    Text(String),
    Formatted(Document),
    Pending,
}

/// A single message in the conversation history
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub role: ChatRole,
    pub turn: Option<TurnId>,
    pub body: EntryBody,
    pub timestamp: DateTime<Local>,
}

/// Scrolling message list of the chat panel
#[derive(Clone, Default)]
pub struct ConversationHistory {
    entries: Vec<HistoryEntry>,
    /// Lines scrolled up from the bottom; 0 follows the latest message
    scroll_offset: usize,
    /// Largest useful offset as of the last render, shared with rendered clones
    max_offset: Rc<Cell<usize>>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, role: ChatRole, turn: Option<TurnId>, body: EntryBody) {
        self.entries.push(HistoryEntry {
            role,
            turn,
            body,
            timestamp: Local::now(),
        });
        self.scroll_to_bottom();
    }

    pub fn add_user_message(&mut self, turn: TurnId, content: String) {
        self.push(ChatRole::User, Some(turn), EntryBody::Text(content));
    }

    /// Show the "Typing..." placeholder for a turn
    pub fn add_pending(&mut self, turn: TurnId) {
        self.push(ChatRole::Assistant, Some(turn), EntryBody::Pending);
    }

    /// Local notice that is not part of the conversation
    pub fn add_system_message(&mut self, content: String) {
        self.push(ChatRole::System, None, EntryBody::Text(content));
    }

    /// Replace the placeholder of `turn`. Appends when no placeholder exists.
    pub fn resolve(&mut self, turn: TurnId, body: EntryBody) {
        let placeholder = self
            .entries
            .iter_mut()
            .find(|entry| entry.turn == Some(turn) && entry.body == EntryBody::Pending);

        match placeholder {
            Some(entry) => {
                entry.body = body;
                entry.timestamp = Local::now();
            }
            None => self.push(ChatRole::Assistant, Some(turn), body),
        }
        self.scroll_to_bottom();
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self
            .scroll_offset
            .saturating_add(lines)
            .min(self.max_offset.get());
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    #[allow(dead_code)]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Whether any placeholder is still showing
    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|entry| entry.body == EntryBody::Pending)
    }
}

impl Widget for ConversationHistory {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title("💬 Conversation");

        let inner_area = block.inner(area);
        block.render(area, buf);

        let all_lines: Vec<Line> = if self.entries.is_empty() {
            vec![
                Line::from(Span::styled("Welcome! 🏖", Style::default().fg(Color::Green))),
                Line::from(""),
                Line::from(Span::styled(
                    "Ask about locations, ratings or availability of our rentals.",
                    Style::default().fg(Color::Gray),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "Press Enter to send, Shift+Enter for a new line, /help for commands.",
                    Style::default().fg(Color::DarkGray),
                )),
            ]
        } else {
            let width = inner_area.width.saturating_sub(2) as usize;
            let mut lines = Vec::new();
            for entry in &self.entries {
                lines.extend(render_entry(entry, width));
                lines.push(Line::from(""));
            }
            lines
        };

        let height = inner_area.height as usize;
        let total = all_lines.len();
        let max_offset = total.saturating_sub(height);
        self.max_offset.set(max_offset);
        let end = total - self.scroll_offset.min(max_offset);
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

/// Render a single entry into wrapped lines
fn render_entry(entry: &HistoryEntry, width: usize) -> Vec<Line<'static>> {
    let (icon, label) = match entry.role {
        ChatRole::User => ("👤", "You"),
        ChatRole::Assistant => ("🤖", "Assistant"),
        ChatRole::System => ("⚙", "Notice"),
    };
    let header = format!("{} {} {}", icon, label, entry.timestamp.format("%H:%M"));

    let mut lines = vec![Line::from(Span::styled(
        header,
        Style::default().fg(Color::DarkGray),
    ))];

    let base = content_style(entry.role);
    let body_lines = match &entry.body {
        EntryBody::Text(text) => text
            .split('\n')
            .flat_map(|line| wrap_spans(&[(line.to_string(), base)], width))
            .collect(),
        EntryBody::Formatted(document) => document_lines(document, base, width),
        EntryBody::Pending => vec![Line::from(Span::styled(
            PENDING_TEXT,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ))],
    };

    for line in body_lines {
        let mut spans = vec![Span::raw("  ")];
        spans.extend(line.spans);
        lines.push(Line::from(spans));
    }
    lines
}

/// Terminal rendering of a formatted reply: strong runs in bold, a blank
/// line between paragraphs
pub fn document_lines(document: &Document, base: Style, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (index, paragraph) in document.paragraphs.iter().enumerate() {
        if index > 0 {
            lines.push(Line::from(""));
        }
        for line in &paragraph.lines {
            let runs: Vec<(String, Style)> = line
                .iter()
                .map(|run| match run {
                    Inline::Text(text) => (text.clone(), base),
                    Inline::Strong(text) => (text.clone(), base.add_modifier(Modifier::BOLD)),
                })
                .collect();
            lines.extend(wrap_spans(&runs, width));
        }
    }
    lines
}

/// Greedy word wrap over styled runs. Whitespace between words collapses to
/// a single space; words longer than `width` are left whole.
fn wrap_spans(runs: &[(String, Style)], width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut current_width = 0;
    let mut pending_space = false;

    for (text, style) in runs {
        if text.starts_with(char::is_whitespace) {
            pending_space = true;
        }
        for (index, word) in text.split_whitespace().enumerate() {
            let word_width = word.chars().count();
            let wants_space = current_width > 0 && (index > 0 || pending_space);

            if width > 0 && current_width > 0 && current_width + wants_space as usize + word_width > width {
                lines.push(Line::from(std::mem::take(&mut current)));
                current_width = 0;
            } else if wants_space {
                current.push(Span::styled(" ", *style));
                current_width += 1;
            }

            current.push(Span::styled(word.to_string(), *style));
            current_width += word_width;
            pending_space = false;
        }
        if text.ends_with(char::is_whitespace) {
            pending_space = true;
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(Line::from(current));
    }
    lines
}

fn content_style(role: ChatRole) -> Style {
    match role {
        ChatRole::User => Style::default().fg(Color::Blue),
        ChatRole::Assistant => Style::default().fg(Color::Green),
        ChatRole::System => Style::default().fg(Color::Yellow),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn reply_replaces_its_placeholder() {
        let mut history = ConversationHistory::new();
        history.add_user_message(TurnId(1), "hi".into());
        history.add_pending(TurnId(1));
        history.add_user_message(TurnId(2), "again".into());
        history.add_pending(TurnId(2));

        history.resolve(TurnId(1), EntryBody::Text("fallback".into()));

        assert_eq!(history.entries().len(), 4);
        assert_eq!(history.entries()[1].body, EntryBody::Text("fallback".into()));
        assert_eq!(history.entries()[3].body, EntryBody::Pending);
        assert!(history.has_pending());

        history.resolve(TurnId(2), EntryBody::Formatted(markup::parse("ok")));
        assert!(!history.has_pending());
    }

    #[test]
    fn resolve_without_placeholder_appends() {
        let mut history = ConversationHistory::new();
        history.resolve(TurnId(7), EntryBody::Text("late".into()));
        assert_eq!(history.entries().len(), 1);
        assert_eq!(history.entries()[0].role, ChatRole::Assistant);
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_spans(&[("one two three four".to_string(), Style::default())], 9);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, ["one two", "three", "four"]);
    }

    #[test]
    fn strong_runs_are_bold_with_paragraph_gap() {
        let document = markup::parse("**Beach House**\n\ngreat view");
        let lines = document_lines(&document, Style::default(), 40);

        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, ["Beach House", "", "great view"]);
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert!(!lines[2].spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn keeps_spacing_between_runs() {
        let document = markup::parse("Try the **Loft** today");
        let lines = document_lines(&document, Style::default(), 80);
        assert_eq!(line_text(&lines[0]), "Try the Loft today");
    }

    #[test]
    fn scroll_offset_clamps_at_bottom() {
        let mut history = ConversationHistory::new();
        history.scroll_up(3);
        history.scroll_down(10);
        assert_eq!(history.scroll_offset, 0);
    }

    #[test]
    fn scroll_up_stops_at_oldest_line() {
        let mut history = ConversationHistory::new();
        for turn in 1..=5 {
            history.add_user_message(TurnId(turn), format!("message {}", turn));
        }
        let area = Rect::new(0, 0, 40, 8);
        let mut buf = Buffer::empty(area);
        history.clone().render(area, &mut buf);

        let max = history.max_offset.get();
        assert!(max > 0);

        history.scroll_up(100);
        assert_eq!(history.scroll_offset, max);
        history.scroll_down(1);
        assert_eq!(history.scroll_offset, max - 1);
    }

    #[test]
    fn short_history_does_not_scroll() {
        let mut history = ConversationHistory::new();
        history.add_user_message(TurnId(1), "hi".into());
        let area = Rect::new(0, 0, 40, 20);
        let mut buf = Buffer::empty(area);
        history.clone().render(area, &mut buf);

        history.scroll_up(100);
        history.scroll_down(5);
        assert_eq!(history.scroll_offset, 0);
    }
}
