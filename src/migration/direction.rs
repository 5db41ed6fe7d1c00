//! Migration direction and the inverse-resolution protocol

use serde::Serialize;
use std::fmt;

/// Direction a driver runs a migration in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Apply the migration
    Up,
    /// Revert the migration
    Down,
}

impl Direction {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Up => "Applying",
            Self::Down => "Reverting",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// Direction an operation observes on its context
///
/// `NotReversible` is entered only through
/// [`MigratorContext::not_reversible`](super::MigratorContext::not_reversible)
/// while a derived inverse runs, so it cannot be requested by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    Up,
    Down,
    NotReversible,
}

impl From<Direction> for MigrationDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => MigrationDirection::Up,
            Direction::Down => MigrationDirection::Down,
        }
    }
}

/// How an operation invocation can be reversed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reversibility<T> {
    /// The inverse is always derivable from the forward options
    Natural(T),
    /// The inverse needs an author-supplied payload; `None` means "do not reverse"
    OptIn(Option<T>),
    /// Never reversed; always runs forward
    Irreversible,
}

/// What a single operation invocation must do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// Execute the operation's own effect
    Primary,
    /// Execute the inverse operation with these options, in `NotReversible` mode
    Inverse(T),
    /// Issue nothing
    Skip,
}

/// Decide what an invocation does given the context direction.
///
/// Direction is checked before the payload, so a derived inverse (running in
/// `NotReversible`) always lands on `Primary` and cannot derive again.
pub fn resolve<T>(direction: MigrationDirection, reversibility: Reversibility<T>) -> Resolution<T> {
    match direction {
        MigrationDirection::Up | MigrationDirection::NotReversible => Resolution::Primary,
        MigrationDirection::Down => match reversibility {
            Reversibility::Natural(inverse) | Reversibility::OptIn(Some(inverse)) => {
                Resolution::Inverse(inverse)
            }
            Reversibility::OptIn(None) => Resolution::Skip,
            Reversibility::Irreversible => Resolution::Primary,
        },
    }
}
