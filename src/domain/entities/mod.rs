//! Domain entities - Core business objects with no external dependencies

pub mod command;
pub mod community;
pub mod invocation;
pub mod session;
pub mod usage;
pub mod user;

pub use command::{CommandOption, CommandRegistry, CommandSpec, OptionKind};
pub use community::{Community, Destination, Permissions};
pub use invocation::{snowflake_timestamp, InteractionRef, Invocation, OptionValue, DISCORD_EPOCH_MS};
pub use session::Session;
pub use usage::UsageEntry;
pub use user::User;
