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

//! Validation of paired reads.
//!
//! [SeqValidator] walks two FASTQ files in lockstep, or one interleaved file
//! two records at a time, and checks that:
//!
//!   - every record is intact and follows the header [Dialect] of the first
//!     record,
//!   - both reads of a pair have the same name,
//!   - the first read is tagged `1` and the second `2`,
//!   - paired files hold the same number of reads.
//!
//! Quality characters of the pairs are sampled to guess the quality encoding
//! reported in [Report].
//!
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use flate2::write::GzEncoder;
use flate2::Compression;
use needletail::parser::LineEnding;

use crate::error::Error;
use crate::error::Result;
use crate::fastq::record::Dialect;
use crate::fastq::record::FastqReader;
use crate::fastq::record::FastqRecord;
use crate::fastq::report::Report;
use crate::full_ext;

/// Pairs between progress messages.
const PROGRESS_PAIRS: u64 = 100_000;

const COMPRESSIONS: [&str; 2] = [".gz", ".bz2"];
const FASTQ_EXTS: [&str; 2] = [".fastq", ".fq"];

/// How many pairs contribute to the quality range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualitySampling {
    Disabled,
    /// The first `n` pairs.
    Pairs(u64),
    All,
}

impl Default for QualitySampling {
    fn default() -> Self {
        QualitySampling::Pairs(100_000)
    }
}

impl QualitySampling {
    /// Sample the first `n` pairs, or all pairs if `n` is 0.
    pub fn from_limit(n: u64) -> Self {
        match n {
            0 => QualitySampling::All,
            n => QualitySampling::Pairs(n),
        }
    }

    fn includes(
        &self,
        pairs_seen: u64,
    ) -> bool {
        match self {
            QualitySampling::Disabled => false,
            QualitySampling::Pairs(n) => pairs_seen < *n,
            QualitySampling::All => true,
        }
    }
}

enum FastqSink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl FastqSink {
    fn create(path: &Path) -> Result<Self> {
        let fp = File::create(path).map_err(|e| Error::io(path, e))?;
        let conn = BufWriter::new(fp);
        if path.to_string_lossy().ends_with(".gz") {
            Ok(FastqSink::Gzip(GzEncoder::new(conn, Compression::default())))
        } else {
            Ok(FastqSink::Plain(conn))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            FastqSink::Plain(conn) => conn,
            FastqSink::Gzip(conn) => conn,
        }
    }

    fn finish(self) -> Result<()> {
        match self {
            FastqSink::Plain(mut conn) => conn.flush()?,
            FastqSink::Gzip(conn) => conn.finish()?.flush()?,
        }
        Ok(())
    }
}

fn write_record(
    conn: &mut dyn Write,
    record: &FastqRecord,
) -> Result<()> {
    needletail::parser::write_fastq(
        record.id().as_bytes(),
        record.seq.as_bytes(),
        Some(record.qual.as_bytes()),
        conn,
        LineEnding::Unix,
    ).map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(())
}

// Compressed content must match a .gz or .bz2 extension.
fn open_fastq(
    path: &Path,
    compression: Option<&str>,
) -> Result<BufReader<Box<dyn std::io::Read>>> {
    let fp = File::open(path).map_err(|e| Error::io(path, e))?;
    let (conn, format) = niffler::get_reader(Box::new(BufReader::new(fp)))
        .map_err(|e| Error::SeqValidation(format!("Unable to read {}: {}", path.display(), e)))?;

    let expected = match compression {
        Some(".gz") => Some(niffler::compression::Format::Gzip),
        Some(".bz2") => Some(niffler::compression::Format::Bzip),
        _ => None,
    };
    match expected {
        Some(expected) if expected != format => {
            return Err(Error::SeqValidation(format!(
                "{} has a {} extension but is not {} compressed",
                path.display(), compression.unwrap_or_default(), compression.unwrap_or_default().trim_start_matches('.')
            )));
        },
        None if format != niffler::compression::Format::No => {
            log::warn!("{} is compressed but has no compression extension", path.display());
        },
        _ => (),
    }

    Ok(BufReader::new(conn))
}

/// Validates one interleaved or two paired FASTQ files.
///
/// ## Usage
///
/// ```rust
/// use seq_input_val::fastq::validator::{QualitySampling, SeqValidator};
/// use std::io::Cursor;
///
/// let reads_1 = b"@r1/1\nACGT\n+\nIIII\n@r2/1\nAC\n+\n##\n";
/// let reads_2 = b"@r1/2\nTTGA\n+\nIIHI\n@r2/2\nGG\n+\n#I\n";
///
/// let mut validator = SeqValidator::new("s_1.fq", Some("s_2.fq")).unwrap()
///     .with_quality_sampling(QualitySampling::All);
/// validator.validate_paired_readers(Cursor::new(reads_1), Cursor::new(reads_2), None).unwrap();
///
/// let report = validator.report();
/// assert_eq!(report.pairs, 2);
/// assert!(!report.interleaved);
/// assert_eq!(report.quality_ascii_range, Some([b'#', b'I']));
/// ```
///
#[derive(Debug, Clone)]
pub struct SeqValidator {
    file_a: PathBuf,
    file_b: Option<PathBuf>,
    compression: Option<&'static str>,
    sampling: QualitySampling,
    output: Option<PathBuf>,
    pairs: u64,
    dialect: Option<Dialect>,
    quality_range: Option<(u8, u8)>,
}

impl SeqValidator {
    /// Validator for `file_a`, paired with `file_b` if given.
    ///
    /// A single file is read as interleaved.
    ///
    /// ## Errors
    ///
    /// Returns [Error::SeqValidation] if a file is not named
    /// `.fastq` or `.fq` with an optional `.gz` or `.bz2`, or if the two
    /// files have different extensions.
    pub fn new<P: AsRef<Path>>(
        file_a: P,
        file_b: Option<P>,
    ) -> Result<Self> {
        let file_a = file_a.as_ref().to_path_buf();
        let name_a = file_a.to_string_lossy();
        let ext = full_ext(&name_a, &COMPRESSIONS);
        let compression = COMPRESSIONS.into_iter().find(|x| ext.ends_with(x));
        let base_ext = compression.map_or(ext.as_str(), |x| &ext[..ext.len() - x.len()]);
        if !FASTQ_EXTS.contains(&base_ext) {
            return Err(Error::SeqValidation("Input files must be fastq|fq[.gz|.bz2]".to_string()));
        }

        let file_b = file_b.map(|x| x.as_ref().to_path_buf());
        if let Some(file_b) = &file_b {
            if full_ext(&file_b.to_string_lossy(), &COMPRESSIONS) != ext {
                return Err(Error::SeqValidation("Input files must be of same type".to_string()));
            }
        }

        Ok(Self {
            file_a,
            file_b,
            compression,
            sampling: QualitySampling::default(),
            output: None,
            pairs: 0,
            dialect: None,
            quality_range: None,
        })
    }

    pub fn with_quality_sampling(
        mut self,
        sampling: QualitySampling,
    ) -> Self {
        self.sampling = sampling;
        self
    }

    /// Write the validated pairs of paired input to `path` as interleaved
    /// FASTQ, gzipped if `path` ends with `.gz`.
    pub fn with_interleaved_output<P: AsRef<Path>>(
        mut self,
        path: P,
    ) -> Self {
        self.output = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn is_interleaved(&self) -> bool {
        self.file_b.is_none()
    }

    /// Number of pairs validated.
    pub fn pairs(&self) -> u64 {
        self.pairs
    }

    /// Open and validate the input files.
    pub fn validate(&mut self) -> Result<()> {
        let file_a = self.file_a.clone();
        let conn_a = open_fastq(&file_a, self.compression)?;
        match self.file_b.clone() {
            Some(file_b) => {
                let conn_b = open_fastq(&file_b, self.compression)?;
                let mut sink = self.output.as_deref().map(FastqSink::create).transpose()?;
                self.validate_paired_readers(conn_a, conn_b, sink.as_mut().map(FastqSink::writer))?;
                if let Some(sink) = sink {
                    sink.finish()?;
                }
            },
            None => {
                if let Some(output) = &self.output {
                    log::warn!("Input is already interleaved, not writing {}", output.display());
                }
                self.validate_interleaved_reader(conn_a)?;
            },
        }
        log::info!("Validated {} pairs", self.pairs);
        Ok(())
    }

    fn reset(&mut self) {
        self.pairs = 0;
        self.dialect = None;
        self.quality_range = None;
    }

    fn check_read(
        &mut self,
        mut read: FastqRecord,
        filename: &str,
    ) -> Result<FastqRecord> {
        let dialect = match self.dialect {
            Some(dialect) => dialect,
            None => {
                let dialect = Dialect::detect(&read.seq_header)?;
                log::info!("Reads have {} headers", dialect);
                self.dialect = Some(dialect);
                dialect
            },
        };
        read.validate(dialect, filename)?;
        Ok(read)
    }

    fn check_pair(
        &self,
        read_1: &FastqRecord,
        read_2: &FastqRecord,
        name_a: &str,
        name_b: &str,
    ) -> Result<()> {
        if read_1.read_name != read_2.read_name {
            return Err(Error::SeqValidation(format!(
                "Fastq record name at line {} should be a match to paired file line {}:\n\t{} ({})\n\t{} ({})",
                read_1.source_line_range.0, read_2.source_line_range.0,
                read_1.read_name.as_deref().unwrap_or_default(), name_a,
                read_2.read_name.as_deref().unwrap_or_default(), name_b,
            )));
        }
        if read_1.pair_member != Some('1') {
            return Err(Error::SeqValidation(format!(
                "Fastq record at line {} of {} should be for first in pair, got '{}'",
                read_1.source_line_range.0, name_a, read_1.pair_member.unwrap_or_default()
            )));
        }
        if read_2.pair_member != Some('2') {
            return Err(Error::SeqValidation(format!(
                "Fastq record at line {} of {} should be for second in pair, got '{}'",
                read_2.source_line_range.0, name_b, read_2.pair_member.unwrap_or_default()
            )));
        }
        Ok(())
    }

    fn accept_pair(
        &mut self,
        read_1: &FastqRecord,
        read_2: &FastqRecord,
        conn_out: Option<&mut dyn Write>,
    ) -> Result<()> {
        if self.sampling.includes(self.pairs) {
            for (min, max) in [read_1.quality_range(), read_2.quality_range()].into_iter().flatten() {
                self.quality_range = Some(match self.quality_range {
                    Some((lo, hi)) => (lo.min(min), hi.max(max)),
                    None => (min, max),
                });
            }
        }
        if let Some(conn_out) = conn_out {
            write_record(conn_out, read_1)?;
            write_record(conn_out, read_2)?;
        }
        self.pairs += 1;
        if self.pairs % PROGRESS_PAIRS == 0 {
            log::debug!("Validated {} pairs", self.pairs);
        }
        Ok(())
    }

    /// Validate paired reads from `conn_a` and `conn_b`.
    ///
    /// If `conn_out` is given each validated pair is written to it.
    pub fn validate_paired_readers<A: BufRead, B: BufRead>(
        &mut self,
        conn_a: A,
        conn_b: B,
        mut conn_out: Option<&mut dyn Write>,
    ) -> Result<()> {
        self.reset();
        let name_a = self.file_a.display().to_string();
        let name_b = self.file_b.as_ref().map_or_else(|| name_a.clone(), |x| x.display().to_string());
        let mut reader_a = FastqReader::new(conn_a);
        let mut reader_b = FastqReader::new(conn_b);

        loop {
            let Some(read_1) = reader_a.next_record()? else {
                if reader_b.next_record()?.is_some() {
                    return Err(Error::SeqValidation(format!(
                        "Read 1 file ({}) finished before read 2 ({})", name_a, name_b
                    )));
                }
                break;
            };
            let read_1 = self.check_read(read_1, &name_a)?;

            let Some(read_2) = reader_b.next_record()? else {
                return Err(Error::SeqValidation(format!(
                    "Read 2 file ({}) finished before read 1 ({})", name_b, name_a
                )));
            };
            let read_2 = self.check_read(read_2, &name_b)?;

            self.check_pair(&read_1, &read_2, &name_a, &name_b)?;
            self.accept_pair(&read_1, &read_2, conn_out.as_mut().map(|c| &mut **c as &mut dyn Write))?;
        }

        if self.pairs == 0 {
            return Err(Error::SeqValidation(format!("No fastq records found in {}", name_a)));
        }
        Ok(())
    }

    /// Validate interleaved reads from `conn`.
    pub fn validate_interleaved_reader<R: BufRead>(
        &mut self,
        conn: R,
    ) -> Result<()> {
        self.reset();
        let name = self.file_a.display().to_string();
        let mut reader = FastqReader::new(conn);

        while let Some(read_1) = reader.next_record()? {
            let read_1 = self.check_read(read_1, &name)?;
            let Some(read_2) = reader.next_record()? else {
                return Err(Error::SeqValidation(format!(
                    "Interleaved file {} ended after the first read of a pair, line {}",
                    name, read_1.source_line_range.0
                )));
            };
            let read_2 = self.check_read(read_2, &name)?;

            self.check_pair(&read_1, &read_2, &name, &name)?;
            self.accept_pair(&read_1, &read_2, None)?;
        }

        if self.pairs == 0 {
            return Err(Error::SeqValidation(format!("No fastq records found in {}", name)));
        }
        Ok(())
    }

    pub fn report(&self) -> Report {
        Report::new(self.dialect, self.is_interleaved(), self.pairs, self.quality_range)
    }
}
