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

//! FASTQ records and their header dialects.
//!
//! [FastqReader] cuts a text stream into [FastqRecord]s while keeping track of
//! line numbers. Sequence and quality strings may be wrapped over several
//! lines. A record is checked against a [Dialect] with
//! [FastqRecord::validate].
//!
//! ## Usage
//!
//! ```rust
//! use seq_input_val::fastq::record::{Dialect, FastqReader};
//!
//! let data = b"@read1/1\nACGT\n+\nIIII\n";
//! let mut reader = FastqReader::new(&data[..]);
//!
//! let mut record = reader.next_record().unwrap().unwrap();
//! let dialect = Dialect::detect(&record.seq_header).unwrap();
//! record.validate(dialect, "reads.fq").unwrap();
//!
//! assert_eq!(dialect, Dialect::Illumina);
//! assert_eq!(record.read_name.as_deref(), Some("read1"));
//! assert_eq!(record.pair_member, Some('1'));
//! assert_eq!(record.source_line_range, (1, 4));
//! ```
//!
use std::io::BufRead;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;
use crate::error::Result;

static ILLUMINA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@(\S+)/([12])(?:\s.*)?$").expect("Illumina header pattern compiles")
});

static CASAVA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@(\S+) ([12]):[YN]:[0-9]+:(.*)$").expect("Casava header pattern compiles")
});

/// Header conventions for naming the reads of a pair.
///
///   - Illumina: `@<name>/<1|2>`, optionally followed by a comment
///   - Casava 1.8: `@<name> <1|2>:<Y|N>:<control>:<index>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Illumina,
    Casava,
}

impl Dialect {
    pub const ALL: [Dialect; 2] = [Dialect::Illumina, Dialect::Casava];

    fn pattern(&self) -> &'static Regex {
        match self {
            Dialect::Illumina => &ILLUMINA,
            Dialect::Casava => &CASAVA,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Illumina => "Illumina",
            Dialect::Casava => "Casava 1.8",
        }
    }

    /// Find the dialect of a record header.
    ///
    /// ## Errors
    ///
    /// Returns [Error::SeqValidation] if `header` matches neither dialect.
    pub fn detect(header: &str) -> Result<Self> {
        Self::ALL.into_iter()
            .find(|dialect| dialect.pattern().is_match(header))
            .ok_or_else(|| Error::SeqValidation(format!(
                "Unable to determine fastq header format from: '{}'", header
            )))
    }

    /// Read name and pair member encoded in `header`.
    pub fn read_name(
        &self,
        header: &str,
    ) -> Option<(String, char)> {
        let caps = self.pattern().captures(header)?;
        let name = caps.get(1)?.as_str().to_string();
        let member = caps.get(2)?.as_str().chars().next()?;
        Some((name, member))
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One read as found in a FASTQ stream.
///
/// `source_line_range` holds the first and last line of the record. The
/// `dialect`, `read_name` and `pair_member` fields are None until
/// [validate](FastqRecord::validate) succeeds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FastqRecord {
    pub seq_header: String,
    pub qual_header: String,
    pub seq: String,
    pub qual: String,
    pub source_line_range: (usize, usize),
    /// False if the stream ended before the `+` line.
    pub complete: bool,
    pub dialect: Option<Dialect>,
    pub read_name: Option<String>,
    pub pair_member: Option<char>,
}

impl FastqRecord {
    /// Check the header follows `dialect` and that the record is intact.
    ///
    /// `filename` is only used in error messages.
    pub fn validate(
        &mut self,
        dialect: Dialect,
        filename: &str,
    ) -> Result<()> {
        let Some((name, member)) = dialect.read_name(&self.seq_header) else {
            return Err(Error::SeqValidation(format!(
                "Sequence record header at line {} of {} does not follow the {} format: '{}'",
                self.source_line_range.0, filename, dialect, self.seq_header
            )));
        };
        if !self.complete || self.qual.len() != self.seq.len() {
            return Err(Error::SeqValidation(format!(
                "Fastq record at line {} of {} appears to be corrupt",
                self.source_line_range.0, filename
            )));
        }
        self.dialect = Some(dialect);
        self.read_name = Some(name);
        self.pair_member = Some(member);
        Ok(())
    }

    /// Lowest and highest quality byte of the record.
    pub fn quality_range(&self) -> Option<(u8, u8)> {
        let min = self.qual.bytes().min()?;
        let max = self.qual.bytes().max()?;
        Some((min, max))
    }

    /// Read id without the leading `@`.
    pub fn id(&self) -> &str {
        self.seq_header.strip_prefix('@').unwrap_or(&self.seq_header)
    }
}

impl std::fmt::Display for FastqRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n{}\n+\n{}", self.seq_header, self.seq, self.qual)
    }
}

/// Reads [FastqRecord]s from a line oriented stream.
pub struct FastqReader<R: BufRead> {
    conn: R,
    line_no: usize,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(conn: R) -> Self {
        Self { conn, line_no: 0 }
    }

    /// Number of lines consumed so far.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    fn next_line(&mut self) -> Result<Option<(usize, String)>> {
        let mut buf = String::new();
        if self.conn.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        let len = buf.trim_end().len();
        buf.truncate(len);
        Ok(Some((self.line_no, buf)))
    }

    /// Read the next record, None at the end of the stream.
    ///
    /// A record cut short before its `+` line is returned with
    /// `complete == false`.
    pub fn next_record(&mut self) -> Result<Option<FastqRecord>> {
        // header, blank lines in between records are skipped
        let (start, seq_header) = loop {
            match self.next_line()? {
                None => return Ok(None),
                Some((_, line)) if line.is_empty() => continue,
                Some(line) => break line,
            }
        };
        let mut record = FastqRecord {
            seq_header,
            source_line_range: (start, start),
            ..Default::default()
        };

        // sequence
        loop {
            match self.next_line()? {
                None => return Ok(Some(record)),
                Some((no, line)) => {
                    record.source_line_range.1 = no;
                    if line.starts_with('+') {
                        record.qual_header = line;
                        record.complete = true;
                        break;
                    }
                    record.seq.push_str(&line);
                },
            }
        }

        // quality
        while let Some((no, line)) = self.next_line()? {
            if line.is_empty() {
                break;
            }
            record.source_line_range.1 = no;
            record.qual.push_str(&line);
            if record.qual.len() >= record.seq.len() {
                break;
            }
        }

        Ok(Some(record))
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<FastqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn detect_dialects() {
        use super::Dialect;

        assert_eq!(Dialect::detect("@r1/1").unwrap(), Dialect::Illumina);
        assert_eq!(Dialect::detect("@r1 2:N:0:ACGT").unwrap(), Dialect::Casava);
        assert_eq!(Dialect::Casava.read_name("@r1 2:Y:18:").unwrap(), ("r1".to_string(), '2'));
        assert!(Dialect::detect("@r1").is_err());
        assert!(Dialect::detect("r1/1").is_err());
    }

    #[test]
    fn illumina_header_with_comment() {
        use super::Dialect;

        assert_eq!(Dialect::detect("@r1/1 run=7 len=150").unwrap(), Dialect::Illumina);
        assert_eq!(Dialect::Illumina.read_name("@r1/2\tbarcode").unwrap(), ("r1".to_string(), '2'));
        assert!(Dialect::detect("@r1/1x").is_err());
    }

    #[test]
    fn detect_error_quotes_header() {
        use super::Dialect;
        use crate::Error;

        let got = Dialect::detect("@weird header");

        assert!(matches!(got, Err(Error::SeqValidation(ref msg)) if msg.contains("'@weird header'")));
    }

    #[test]
    fn read_multiline_records() {
        use super::FastqReader;

        let data = b"@r1/1\nACGT\nAC\n+\nIIII\nII\n\n@r1/2\r\nTT\r\n+r1/2\r\nHH\r\n";
        let records: Vec<_> = FastqReader::new(&data[..]).collect::<Result<_, _>>().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq, "ACGTAC");
        assert_eq!(records[0].qual, "IIIIII");
        assert_eq!(records[0].source_line_range, (1, 6));
        assert_eq!(records[1].seq_header, "@r1/2");
        assert_eq!(records[1].qual_header, "+r1/2");
        assert_eq!(records[1].source_line_range, (8, 11));
    }

    #[test]
    fn quality_starting_with_at() {
        use super::FastqReader;

        let data = b"@r1/1\nAC\n+\n@I\n@r2/1\nA\n+\nI\n";
        let mut reader = FastqReader::new(&data[..]);

        assert_eq!(reader.next_record().unwrap().unwrap().qual, "@I");
        assert_eq!(reader.next_record().unwrap().unwrap().seq_header, "@r2/1");
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn validate_sets_name_and_member() {
        use super::{Dialect, FastqReader};

        let data = b"@r7 2:N:0:1\nACGT\n+\nIIII\n";
        let mut record = FastqReader::new(&data[..]).next_record().unwrap().unwrap();
        record.validate(Dialect::Casava, "x.fq").unwrap();

        assert_eq!(record.dialect, Some(Dialect::Casava));
        assert_eq!(record.read_name.as_deref(), Some("r7"));
        assert_eq!(record.pair_member, Some('2'));
        assert_eq!(record.id(), "r7 2:N:0:1");
    }

    #[test]
    fn validate_wrong_dialect() {
        use super::{Dialect, FastqReader};
        use crate::Error;

        let data = b"@r7 2:N:0:1\nACGT\n+\nIIII\n";
        let mut record = FastqReader::new(&data[..]).next_record().unwrap().unwrap();
        let got = record.validate(Dialect::Illumina, "x.fq");

        assert!(matches!(got, Err(Error::SeqValidation(ref msg)) if msg.contains("line 1 of x.fq") && msg.contains("Illumina")));
    }

    #[test]
    fn validate_length_mismatch() {
        use super::{Dialect, FastqReader};
        use crate::Error;

        let data = b"@r1/1\nACGT\n+\nIIII\n@r2/1\nACGT\n+\nIII\n";
        let mut reader = FastqReader::new(&data[..]);
        reader.next_record().unwrap().unwrap().validate(Dialect::Illumina, "x.fq").unwrap();
        let got = reader.next_record().unwrap().unwrap().validate(Dialect::Illumina, "x.fq");

        assert!(matches!(got, Err(Error::SeqValidation(ref msg)) if msg == "Fastq record at line 5 of x.fq appears to be corrupt"));
    }

    #[test]
    fn incomplete_record() {
        use super::{Dialect, FastqReader};
        use crate::Error;

        let data = b"@r1/1\nACGT\n";
        let mut record = FastqReader::new(&data[..]).next_record().unwrap().unwrap();

        assert!(!record.complete);
        assert!(matches!(record.validate(Dialect::Illumina, "x.fq"), Err(Error::SeqValidation(ref msg)) if msg.contains("corrupt")));
    }

    #[test]
    fn display_four_lines() {
        use super::FastqReader;

        let data = b"@r1/1\nAC\nGT\n+r1/1\nIIII\n";
        let record = FastqReader::new(&data[..]).next_record().unwrap().unwrap();

        assert_eq!(record.to_string(), "@r1/1\nACGT\n+\nIIII");
        assert_eq!(record.quality_range(), Some((b'I', b'I')));
    }
}
