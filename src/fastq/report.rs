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
use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::fastq::record::Dialect;
use crate::write_json;

/// ASCII range of the quality characters of a FASTQ encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityEncoding {
    pub name: &'static str,
    pub min: u8,
    pub max: u8,
}

impl QualityEncoding {
    pub fn contains(
        &self,
        min: u8,
        max: u8,
    ) -> bool {
        self.min <= min && max <= self.max
    }
}

pub const QUALITY_ENCODINGS: [QualityEncoding; 5] = [
    QualityEncoding { name: "Sanger", min: 33, max: 73 },
    QualityEncoding { name: "Solexa", min: 59, max: 104 },
    QualityEncoding { name: "Illumina 1.3+", min: 64, max: 104 },
    QualityEncoding { name: "Illumina 1.5+", min: 66, max: 105 },
    QualityEncoding { name: "Illumina 1.8+", min: 33, max: 74 },
];

/// Quality scores expected by downstream tools: Sanger or Illumina 1.8+.
const VALID_Q: (u8, u8) = (33, 74);

/// Summary of a FASTQ validation run.
///
/// Fields are declared in the order they appear in the json output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Header dialect of the reads.
    pub format: String,
    pub interleaved: bool,
    pub pairs: u64,
    /// Encodings whose range covers `quality_ascii_range`.
    pub possible_encoding: Vec<String>,
    pub quality_ascii_range: Option<[u8; 2]>,
    pub valid_q: bool,
}

impl Report {
    /// Build the report from a finished run.
    ///
    /// `quality_range` is None if no quality values were sampled.
    pub fn new(
        dialect: Option<Dialect>,
        interleaved: bool,
        pairs: u64,
        quality_range: Option<(u8, u8)>,
    ) -> Self {
        let possible_encoding = quality_range.map(|(min, max)| {
            QUALITY_ENCODINGS.iter()
                .filter(|encoding| encoding.contains(min, max))
                .map(|encoding| encoding.name.to_string())
                .collect()
        }).unwrap_or_default();

        Self {
            format: dialect.map(|x| x.name().to_string()).unwrap_or_default(),
            interleaved,
            pairs,
            possible_encoding,
            quality_ascii_range: quality_range.map(|(min, max)| [min, max]),
            valid_q: quality_range.is_some_and(|(min, max)| min >= VALID_Q.0 && max <= VALID_Q.1),
        }
    }

    /// Write the report as json to `conn_out`.
    pub fn write<W: Write>(
        &self,
        conn_out: &mut W,
    ) -> Result<()> {
        write_json(self, conn_out)
    }
}
