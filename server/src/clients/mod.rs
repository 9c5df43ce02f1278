pub mod control;
pub mod discord;
pub mod messages;
pub mod query;

pub use control::{RemoteControl, UnlinkedControl};
pub use discord::DiscordClient;
pub use messages::{MessageLayer, Notice};
pub use query::{ServerQuery, UnlinkedQuery};
