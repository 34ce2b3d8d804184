//! Buffer contexts.

use std::fmt;

/// Selects which buffer set mutation notifications land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Context {
    /// Changes made by client code; drained by `commit`.
    #[default]
    User,
    /// Changes made while loading or merging backend results; transient.
    Engine,
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Engine => write!(f, "engine"),
        }
    }
}
