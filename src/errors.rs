//! Unified application error type.
//! All modules (store, core, cli, db) return AppError at the command
//! boundary so every failure reaches the user through one message category.

use std::io;
use thiserror::Error;

use crate::models::record::RecordId;

/// Geolocation could not produce a position. Fatal to the current command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// A create/update against the record store failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("record {0} does not exist")]
    NotFound(RecordId),

    #[error("record {0} is already checked out")]
    AlreadyClosed(RecordId),

    #[error("check-out time must be later than check-in time for record {0}")]
    NonMonotonic(RecordId),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// The record subscription failed or went away.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("record stream disconnected: {0}")]
    Disconnected(String),

    #[error("record stream closed")]
    Closed,

    #[error("record stream backend error: {0}")]
    Backend(String),
}

/// Reverse geocoding failed. Never surfaces to the user: the resolver
/// degrades to a coordinate string instead.
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoding service answered with status {0}")]
    Status(u16),

    #[error("malformed geocoding payload: {0}")]
    Payload(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    // ---------------------------
    // IO
    // ---------------------------
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // ---------------------------
    // Database-related
    // ---------------------------
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    // ---------------------------
    // Session commands
    // ---------------------------
    #[error("Could not determine location: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Failed to save attendance: {0}")]
    Write(#[from] WriteError),

    #[error("Attendance sync lost: {0}")]
    Stream(#[from] StreamError),

    #[error("Attendance state is not known yet (waiting for sync)")]
    StateUnknown,

    #[error("Already checked in")]
    AlreadyCheckedIn,

    #[error("Not checked in")]
    NotCheckedIn,

    #[error("A check-in/check-out is already in progress")]
    CommandInFlight,

    #[error("Timed out waiting for the record stream to confirm the change")]
    ConfirmationTimeout,

    // ---------------------------
    // Parsing errors
    // ---------------------------
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    // ---------------------------
    // Config errors
    // ---------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // ---------------------------
    // Export errors
    // ---------------------------
    #[error("Export error: {0}")]
    Export(String),

    // ---------------------------
    // Generic fallback
    // ---------------------------
    #[error("Internal error: {0}")]
    Other(String),
}

impl From<serde_yaml::Error> for AppError {
    fn from(e: serde_yaml::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
