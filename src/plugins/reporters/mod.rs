// Reporter plugin implementations
pub mod console;
pub mod discord;

pub use console::ConsoleReporter;
pub use discord::{DiscordReporter, DiscordWebhook};
