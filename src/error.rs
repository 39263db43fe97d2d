// seq-input-val: Validation of sequencing manifests and paired FASTQ inputs.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! Error type shared by the manifest and sequence validators.
//!
//! The variants follow the kind of failure rather than where it happened:
//!
//!   - [Error::Config] the rule configuration itself is broken.
//!   - [Error::Parsing] the manifest cannot be matched to a rule configuration.
//!   - [Error::Validation] the manifest data violates the rules.
//!   - [Error::SeqValidation] a FASTQ record or pair is malformed.
//!   - [Error::FileValidation] a file listed in a manifest is absent or empty.
//!
//! I/O failures keep the path that caused them and are not folded into the
//! domain variants.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A rule configuration is missing required sections or has an
    /// inconsistent rule.
    #[error("{0}")]
    Config(String),

    /// Header and rule configuration do not line up, or the header lacks the
    /// keys needed to look a configuration up.
    #[error("{0}")]
    Parsing(String),

    /// Manifest content does not satisfy the rule configuration.
    #[error("{0}")]
    Validation(String),

    /// FASTQ structure or pairing violation.
    #[error("{0}")]
    SeqValidation(String),

    /// File referenced from a manifest is missing or empty.
    #[error("{0}")]
    FileValidation(String),

    /// Input is not in a format the operation accepts.
    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("{} - {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Excel(#[from] calamine::Error),

    #[error(transparent)]
    Stream(#[from] std::io::Error),
}

impl Error {
    /// Attach `path` to an I/O error.
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}
