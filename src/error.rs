// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Typed errors for the source contract and the radio control plane.

use thiserror::Error;

/// Error returned by signal-source operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// A pending read was rejected because the source closed or the radio
    /// stopped.
    #[error("transfer canceled")]
    TransferCanceled,
    /// The pending-read ring was full when another read was issued.
    #[error("too many simultaneous reads")]
    TooManyReads,
    /// Any other failure reported by a source implementation.
    #[error("source failure: {0}")]
    Failure(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Error returned by radio commands.
#[derive(Debug, Clone, Error)]
pub enum RadioError {
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The radio task is gone; no further commands can be processed.
    #[error("radio command channel closed")]
    ChannelClosed,
}

pub type RadioResult<T> = Result<T, RadioError>;
