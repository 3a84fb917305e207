use crate::events::AppEvent;
use crate::session::ChatSession;
use crate::ui::conversation::commands::{get_help_text, ParsedCommand, SlashCommand};
use crate::ui::conversation::composer::ConversationResult;
use crate::ui::conversation::history::EntryBody;
use crate::ui::conversation::{ConversationComposer, ConversationHistory};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};
use std::sync::Arc;
use tokio::sync::mpsc;

const OPEN_ICON: &str = "💬";
const CLOSE_ICON: &str = "✕";
const SCROLL_STEP: usize = 5;

/// Actions that can be requested by the chat panel
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// The chat panel: toggle control, message list and composer
pub struct ConversationManager {
    history: ConversationHistory,
    composer: ConversationComposer,
    session: Arc<ChatSession>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    is_open: bool,
}

impl ConversationManager {
    pub fn new(session: Arc<ChatSession>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            history: ConversationHistory::new(),
            composer: ConversationComposer::new("Where would you like to stay?"),
            session,
            events_tx,
            events_rx,
            is_open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Open or close the panel
    pub fn toggle(&mut self) {
        self.set_open(!self.is_open);
    }

    fn set_open(&mut self, open: bool) {
        self.is_open = open;
        self.composer.set_focus(open);
        log::debug!("Chat panel {}", if open { "opened" } else { "closed" });
    }

    /// Start a turn in the background. Blank input is ignored by the session.
    pub fn handle_input(&mut self, input: String) {
        let session = Arc::clone(&self.session);
        let view = self.events_tx.clone();
        tokio::spawn(async move {
            session.submit(&input, &view).await;
        });
    }

    /// Apply view events from running turns (called from the draw loop)
    pub fn process_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
        }
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::UserMessage { turn, content } => self.history.add_user_message(turn, content),
            AppEvent::Pending { turn } => self.history.add_pending(turn),
            AppEvent::Reply { turn, document } => {
                self.history.resolve(turn, EntryBody::Formatted(document))
            }
            AppEvent::Fallback { turn, text } => self.history.resolve(turn, EntryBody::Text(text)),
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => return ConversationAction::Exit,
            KeyCode::Char('t') if ctrl => {
                self.toggle();
                return ConversationAction::None;
            }
            KeyCode::F(2) => {
                self.toggle();
                return ConversationAction::None;
            }
            _ => {}
        }

        if !self.is_open {
            return ConversationAction::None;
        }

        match key.code {
            KeyCode::Esc if !self.composer.palette_open() => {
                self.set_open(false);
                return ConversationAction::None;
            }
            KeyCode::PageUp => {
                self.history.scroll_up(SCROLL_STEP);
                return ConversationAction::None;
            }
            KeyCode::PageDown => {
                self.history.scroll_down(SCROLL_STEP);
                return ConversationAction::None;
            }
            _ => {}
        }

        match self.composer.handle_key(key) {
            ConversationResult::Submitted(input) => {
                self.handle_input(input);
                ConversationAction::None
            }
            ConversationResult::Command(command) => self.handle_slash_command(command),
            ConversationResult::None => ConversationAction::None,
        }
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        match command.command {
            SlashCommand::Help => {
                self.history.add_system_message(get_help_text());
                ConversationAction::None
            }
            SlashCommand::Prompt => {
                self.history.add_system_message(self.session.system_prompt().to_string());
                ConversationAction::None
            }
            SlashCommand::Close => {
                self.set_open(false);
                ConversationAction::None
            }
            SlashCommand::Bye => ConversationAction::Exit,
        }
    }

    #[allow(dead_code)]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Draw the launcher badge or the open panel into `area`
    pub fn render_conversation_ui(&self, area: Rect, buf: &mut Buffer) {
        if self.is_open() {
            self.render_panel(area, buf);
        } else {
            self.render_launcher(area, buf);
        }
    }

    fn render_launcher(&self, area: Rect, buf: &mut Buffer) {
        let label = format!(" {} Chat  (Ctrl+T) ", OPEN_ICON);
        let width = (label.chars().count() as u16 + 3).min(area.width);
        let height = 3u16.min(area.height);
        let badge = Rect {
            x: area.right().saturating_sub(width),
            y: area.bottom().saturating_sub(height),
            width,
            height,
        };

        Clear.render(badge, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Cyan));
        let inner = block.inner(badge);
        block.render(badge, buf);
        buf.set_line(
            inner.x,
            inner.y,
            &Line::from(Span::styled(label, Style::default().add_modifier(Modifier::BOLD))),
            inner.width,
        );
    }

    fn render_panel(&self, area: Rect, buf: &mut Buffer) {
        let panel = panel_area(area);
        Clear.render(panel, buf);

        let busy = self.session.in_flight() > 0 || self.history.has_pending();
        let title = format!(
            " Rental assistant{}  [{} Esc] ",
            if busy { " (typing...)" } else { "" },
            CLOSE_ICON
        );
        let frame = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .style(Style::default().fg(Color::Cyan));
        let inner = frame.inner(panel);
        frame.render(panel, buf);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),    // History
                Constraint::Length(4), // Composer
            ])
            .split(inner);

        self.history.clone().render(chunks[0], buf);
        self.composer.clone().render(chunks[1], buf);
    }
}

/// Panel docked to the bottom right, like a site chat widget
fn panel_area(area: Rect) -> Rect {
    let width = (area.width * 3 / 5).max(40).min(area.width);
    let height = (area.height * 4 / 5).max(16).min(area.height);
    Rect {
        x: area.right().saturating_sub(width),
        y: area.bottom().saturating_sub(height),
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChatMessage, TurnId};
    use crate::llm::{CompletionBackend, CompletionError};
    use async_trait::async_trait;

    struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, CompletionError> {
            let last = messages.last().map(|m| m.content().to_string()).unwrap_or_default();
            Ok(format!("**{}**", last))
        }
    }

    fn manager() -> ConversationManager {
        ConversationManager::new(Arc::new(ChatSession::new("catalog prompt", Arc::new(EchoBackend))))
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[tokio::test]
    async fn toggle_controls_visibility() {
        let mut manager = manager();
        assert!(!manager.is_open());

        manager.handle_key(key(KeyCode::Char('t'), KeyModifiers::CONTROL));
        assert!(manager.is_open());

        manager.handle_key(key(KeyCode::Esc, KeyModifiers::NONE));
        assert!(!manager.is_open());

        manager.handle_key(key(KeyCode::F(2), KeyModifiers::NONE));
        assert!(manager.is_open());
    }

    #[tokio::test]
    async fn typing_is_ignored_while_closed() {
        let mut manager = manager();
        manager.handle_key(key(KeyCode::Char('x'), KeyModifiers::NONE));
        manager.handle_key(key(KeyCode::Enter, KeyModifiers::NONE));
        manager.process_events();
        assert!(manager.history().entries().is_empty());
    }

    #[tokio::test]
    async fn events_fill_history_in_place() {
        let mut manager = manager();
        manager.apply_event(AppEvent::UserMessage { turn: TurnId(1), content: "hi".into() });
        manager.apply_event(AppEvent::Pending { turn: TurnId(1) });
        assert!(manager.history().has_pending());

        manager.apply_event(AppEvent::Fallback { turn: TurnId(1), text: "sorry".into() });
        let entries = manager.history().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].body, EntryBody::Text("sorry".into()));
    }

    #[tokio::test]
    async fn submitted_turn_reaches_history() {
        let mut manager = manager();
        manager.toggle();
        for c in "beach".chars() {
            manager.handle_key(key(KeyCode::Char(c), KeyModifiers::NONE));
        }
        manager.handle_key(key(KeyCode::Enter, KeyModifiers::NONE));

        // the turn runs on a spawned task; wait until it has been recorded
        for _ in 0..50 {
            if manager.session.transcript().await.len() == 3 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        manager.process_events();

        let entries = manager.history().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].body, EntryBody::Text("beach".into()));
        assert!(matches!(entries[1].body, EntryBody::Formatted(_)));
    }

    #[test]
    fn slash_commands() {
        let mut manager = manager();
        manager.toggle();
        let prompt = ParsedCommand { command: SlashCommand::Prompt };
        assert_eq!(manager.handle_slash_command(prompt), ConversationAction::None);
        assert_eq!(
            manager.history().entries()[0].body,
            EntryBody::Text("catalog prompt".into())
        );

        let bye = ParsedCommand { command: SlashCommand::Bye };
        assert_eq!(manager.handle_slash_command(bye), ConversationAction::Exit);
    }
}
