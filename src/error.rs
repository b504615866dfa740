use thiserror::Error;

/// Error type shared by every poise command and hook.
pub(crate) type Error = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub(crate) enum ConfigError {
    /// An environment variable was set but could not be parsed.
    #[error("Invalid value {value:?} for environment variable {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Reasons a `tp` invocation produces no move plan.
///
/// The `Display` text is what the bot replies in chat.
#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum TeleportError {
    #[error("Nothing to teleport.")]
    EmptyArgument,
    #[error("Couldn't find the id.")]
    IdNotFound,
    #[error("No voice channel or user found.")]
    NoDestination,
    #[error("Specified user {name} is not in a voice channel.")]
    NotInVoice { name: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum LotteryError {
    #[error("No members are eligible for the lottery")]
    NoParticipants,
    #[error("Role {0} does not exist in the lottery guild")]
    UnknownRole(u64),
    #[error("Channel {0} is not a guild channel")]
    NotAGuildChannel(u64),
}

#[derive(Error, Debug)]
pub(crate) enum LoginError {
    #[error("Could not log in after {0} attempts")]
    AttemptsExhausted(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
