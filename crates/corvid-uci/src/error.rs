//! UCI protocol errors.

use corvid_engine::LimitsError;

/// Errors that can occur during UCI protocol handling.
#[derive(Debug, thiserror::Error)]
pub enum UciError {
    /// The `position` command is missing `startpos` or `fen` keyword.
    #[error("malformed position command: missing startpos or fen keyword")]
    MalformedPosition,

    /// Failed to parse a FEN string.
    #[error("invalid FEN: {fen}")]
    InvalidFen {
        /// The FEN string that failed to parse.
        fen: String,
    },

    /// A move in the `position` command is unparsable or illegal.
    #[error("invalid move: {uci_move}")]
    InvalidMove {
        /// The UCI move string that failed to parse.
        uci_move: String,
    },

    /// A `go` parameter was given without its value.
    #[error("missing value for go parameter {param}")]
    MissingGoValue { param: String },

    /// A `go` parameter value could not be parsed.
    #[error("invalid value {value:?} for go parameter {param}")]
    InvalidGoValue { param: String, value: String },

    /// `setoption` without both `name` and `value`.
    #[error("malformed setoption command: expected name <id> value <x>")]
    MalformedOption,

    #[error("unknown option: {name}")]
    UnknownOption { name: String },

    #[error("invalid value {value:?} for option {name}")]
    InvalidOptionValue { name: String, value: String },

    /// The `go` parameters describe a search the engine refuses.
    #[error("rejected search limits: {0}")]
    Limits(#[from] LimitsError),

    /// An I/O error occurred while reading from stdin.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
