//! Chat panel components

pub mod commands;
pub mod composer;
pub mod history;
pub mod manager;

pub use composer::ConversationComposer;
pub use history::ConversationHistory;
pub use manager::{ConversationAction, ConversationManager};
