//! Terminal front end: the rentals page with the chat panel docked over it.

pub mod conversation;

use crate::listings::Listing;
use crate::session::ChatSession;
use anyhow::{Context, Result};
use conversation::{ConversationAction, ConversationManager};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

const TICK: Duration = Duration::from_millis(50);

/// Initialize terminal
pub fn init_terminal() -> Result<Tui> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal
pub fn restore_terminal(mut terminal: Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the chat front end until the user quits
pub async fn run(session: Arc<ChatSession>, listings: Vec<Listing>) -> Result<()> {
    let mut terminal = init_terminal()?;
    let result = event_loop(&mut terminal, session, &listings).await;
    restore_terminal(terminal)?;
    result
}

/// Needs the multi-thread runtime: input polling blocks in place while
/// spawned turns keep running on the other workers.
async fn event_loop(terminal: &mut Tui, session: Arc<ChatSession>, listings: &[Listing]) -> Result<()> {
    let mut manager = ConversationManager::new(session);

    loop {
        manager.process_events();
        terminal.draw(|frame| draw(frame, &manager, listings))?;

        let ready = tokio::task::block_in_place(|| event::poll(TICK))?;
        if ready {
            if let Event::Key(key) = event::read()? {
                if manager.handle_key(key) == ConversationAction::Exit {
                    log::info!("Exit requested");
                    return Ok(());
                }
            }
        }
    }
}

fn draw(frame: &mut Frame, manager: &ConversationManager, listings: &[Listing]) {
    let area = frame.size();
    frame.render_widget(listings_page(listings), area);
    manager.render_conversation_ui(area, frame.buffer_mut());
}

/// The page the chat widget sits on: the rentals catalog
fn listings_page(listings: &[Listing]) -> Paragraph<'_> {
    let mut lines = vec![
        Line::from(Span::styled(
            "Find your next vacation rental",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    if listings.is_empty() {
        lines.push(Line::from(Span::styled(
            "Listings are unavailable right now. The assistant can still help.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for listing in listings {
        lines.push(Line::from(vec![
            Span::styled(listing.name.as_str(), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("  {}  ", listing.location)),
            Span::styled(format!("★ {}", listing.rating), Style::default().fg(Color::Yellow)),
        ]));
        if !listing.description.is_empty() {
            lines.push(Line::from(Span::styled(
                listing.description.as_str(),
                Style::default().fg(Color::Gray),
            )));
        }
        if !listing.availability.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("Available: {}", listing.availability),
                Style::default().fg(Color::DarkGray),
            )));
        }
        lines.push(Line::from(""));
    }

    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Rentals "))
        .wrap(Wrap { trim: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::buffer::Buffer;
    use ratatui::layout::Rect;
    use ratatui::widgets::Widget;

    fn buffer_text(buf: &Buffer) -> String {
        buf.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn page_lists_each_rental() {
        let listings = vec![Listing {
            name: "Beach House".to_string(),
            location: "Outer Banks".to_string(),
            description: String::new(),
            rating: 4.8,
            availability: String::new(),
        }];
        let area = Rect::new(0, 0, 60, 10);
        let mut buf = Buffer::empty(area);

        listings_page(&listings).render(area, &mut buf);

        let text = buffer_text(&buf);
        assert!(text.contains("Beach House"));
        assert!(text.contains("Outer Banks"));
        assert!(text.contains("4.8"));
    }
}
