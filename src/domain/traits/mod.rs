//! Domain traits - Abstractions for infrastructure implementations

pub mod clock;
pub mod command;
pub mod gateway;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{CommandContext, SlashCommand};
pub use gateway::{BotInfo, Gateway, InteractionResponse, Reply, SentMessage};
