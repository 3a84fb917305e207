use crate::events::TurnId;
use crate::listings::Listing;
use crate::markup::{self, Document};
use crate::session::{ChatSession, ChatView, TurnOutcome};
use anyhow::Result;
use std::io::{self, Write};

/// Prints a turn to the terminal without the chat panel
struct ConsoleView {
    html: bool,
}

impl ChatView for ConsoleView {
    fn user_message(&self, _turn: TurnId, content: &str) {
        println!("👤 {}", content);
    }

    fn pending(&self, _turn: TurnId) {
        eprint!("🤖 Typing...");
        let _ = io::stderr().flush();
    }

    fn reply(&self, _turn: TurnId, document: &Document) {
        eprint!("\r{}\r", " ".repeat(16));
        if self.html {
            println!("{}", markup::to_html(document));
        } else {
            println!("🤖 {}", markup::to_plain(document));
        }
    }

    fn fallback(&self, _turn: TurnId, text: &str) {
        eprint!("\r{}\r", " ".repeat(16));
        println!("🤖 {}", text);
    }
}

/// Run a single turn and print the reply, as HTML when `html` is set
pub async fn ask(session: &ChatSession, message: &str, html: bool) -> Result<()> {
    let Some(outcome) = session.submit(message, &ConsoleView { html }).await else {
        println!("Nothing to ask. Try: rental-chat ask \"Any cabins near a lake?\"");
        return Ok(());
    };

    if let TurnOutcome::Failed { .. } = outcome {
        println!("💡 Run with --verbose or check RUST_LOG output for details.");
    }
    let transcript = session.transcript().await;
    log::debug!(
        "Session {} turn {} finished: {} messages, {} replies",
        session.id(),
        outcome.turn(),
        transcript.len(),
        transcript.reply_count()
    );
    Ok(())
}

pub fn print_prompt(session: &ChatSession) {
    println!("{}", session.system_prompt());
}

pub fn print_listings(listings: &[Listing]) {
    if listings.is_empty() {
        println!("📭 No listings loaded.");
        return;
    }

    println!("🏖  Rentals:");
    println!("{}", "=".repeat(50));

    for listing in listings {
        println!("🏠 {}", listing.name);
        println!("   📍 {}", listing.location);
        println!("   ⭐ {}", listing.rating);
        if !listing.availability.is_empty() {
            println!("   📅 {}", listing.availability);
        }
        println!();
    }
}
