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

//! Reading and validating paired FASTQ.
//!
//!   - [record]: records, header dialects and a line counting reader.
//!   - [validator]: checks for paired and interleaved input.
//!   - [report]: json summary of a validation run.
//!
pub mod record;
pub mod report;
pub mod validator;
