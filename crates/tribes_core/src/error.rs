//! Error types for the game simulation.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Player identifier does not exist.
    #[error("Player not found: {0}")]
    PlayerNotFound(u8),

    /// Unit identifier does not exist.
    #[error("Unit not found: {0}")]
    UnitNotFound(u32),

    /// Settlement identifier does not exist.
    #[error("Settlement not found: {0}")]
    SettlementNotFound(u32),

    /// War-band identifier does not exist.
    #[error("War-band not found: {0}")]
    WarBandNotFound(u32),

    /// Coordinate is outside the map.
    #[error("Tile not found: {0}")]
    TileNotFound(String),

    /// A command was well-formed but is not legal in the current state.
    #[error("Command rejected: {0}")]
    CommandRejected(String),

    /// Rules file could not be parsed.
    #[error("Failed to parse rules: {0}")]
    RulesParseError(String),

    /// Snapshot could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

impl GameError {
    /// Shorthand for a [`GameError::CommandRejected`] with a message.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::CommandRejected(reason.into())
    }
}
