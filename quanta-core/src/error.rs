//! Error types for the Quanta runtime.
//!
//! Only misuse and shape errors are reported here. Pipe rejection, dedup
//! short-circuits and ignored re-entrant writes are normal outcomes of a
//! write, not errors.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by cells, kinds, fusions and buses.
#[derive(Debug, Error)]
pub enum Error {
    /// The target cell already has fusion sources wired into it.
    #[error("cell {uid} is already wired to fusion sources")]
    AlreadyWired { uid: u64 },

    /// A strategy name did not match any known fusion strategy.
    #[error("unknown fusion strategy `{0}`")]
    UnknownStrategy(String),

    /// A kind selector referenced a name that was never defined.
    #[error("unknown kind `{0}`")]
    UnknownKind(String),

    /// A kind was redefined after a registry using it had been compiled.
    #[error("kind `{0}` is already compiled into a registry and cannot be redefined")]
    KindSealed(String),

    /// The cell's kind has no method with this name.
    #[error("no method `{0}` on this cell")]
    UnknownMethod(String),

    /// The cell's kind has no property with this name.
    #[error("no property `{0}` on this cell")]
    UnknownProperty(String),

    /// The property exists but has no setter.
    #[error("property `{0}` is read-only")]
    ReadOnlyProperty(String),

    /// An extension method found a value of the wrong shape.
    #[error("`{method}` expects {expected} value, found {found}")]
    TypeMismatch {
        method: String,
        expected: &'static str,
        found: &'static str,
    },

    /// An extension method was called with missing or ill-typed arguments.
    #[error("invalid argument for `{method}`: {reason}")]
    InvalidArgument { method: String, reason: String },

    /// A scope path did not follow the dot-delimited identifier grammar.
    #[error("invalid scope path `{0}`")]
    InvalidScope(String),

    /// Runtime configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}
