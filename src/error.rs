//! Error types for the grid coordinator
//!
//! Only local precondition violations are typed here. Transport and
//! collaborator failures travel as `anyhow::Error`, and authorization
//! failures on remote entry points are never errors at all (they answer
//! `accepted: false`).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// Enrollment payload lacks a required field
    #[error("instance info is missing required field '{0}'")]
    MissingField(&'static str),

    /// Enrollment payload carries an unusable URL
    #[error("invalid instance URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Slaves cannot have slaves
    #[error("this instance is a slave and cannot enslave other instances")]
    SlaveCannotEnslave,

    /// Promotion refused because another master owns this process
    #[error("this instance is enslaved to {master} and cannot become a master")]
    PromotionRefused { master: String },
}

pub type GridResult<T> = std::result::Result<T, GridError>;
