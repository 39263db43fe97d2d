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

//! seq-input-val is a library and a command-line client for:
//!
//!   - Converting sample manifests from spreadsheet formats to TSV.
//!   - Validating TSV manifests against a rule configuration selected by the
//!     manifest's form type and version.
//!   - Validating paired or interleaved FASTQ files and reporting on their
//!     quality encoding.
//!
//! ## Usage
//!
//! ### Command line
//!
//! The seqinputval CLI supports the following subcommands:
//!   - `seqinputval man-norm` convert a xls, xlsx or csv manifest to tsv.
//!   - `seqinputval man-valid` validate a tsv manifest and write a UUID
//!     stamped copy as tsv and json.
//!   - `seqinputval seq-valid` validate one interleaved or two paired FASTQ
//!     files and write a json report.
//!
//! ### Rust API
//!
//! The API provides functions that run a whole validation:
//!
//!   - [normalise_manifest]: convert a manifest to tsv.
//!   - [validate_manifest]: validate a tsv manifest and write the outputs.
//!   - [validate_seq_files]: validate FASTQ input and write the report.
//!
//! For finer control the following structs are provided:
//!
//!   - [Manifest](manifest::Manifest): a manifest with its
//!     [Header](manifest::header::Header) and [Body](manifest::body::Body).
//!   - [SchemaStore](config::SchemaStore): source of
//!     [RuleConfig](config::RuleConfig)s keyed by type and version.
//!   - [FastqReader](fastq::record::FastqReader): reads
//!     [FastqRecord](fastq::record::FastqRecord)s from a [BufRead](std::io::BufRead).
//!   - [SeqValidator](fastq::validator::SeqValidator): walks paired or
//!     interleaved FASTQ and produces a [Report](fastq::report::Report).
//!
//! ## Manifest format
//!
//! A manifest starts with `key<TAB>value` header rows. The row whose first
//! cell is `Group_ID` ends the header and holds the column headings of the
//! file table; every following row describes one sample file or file pair.
//!
//! ```text
//! Form type:       IMPORT
//! Form version:    1.0
//! Our Ref:
//! ...
//! Group_ID  Sample  Normal_Tissue  Group_Control  Library  File        File_2
//! 1         S1      Y              Y              L1       s1_1.fq.gz  s1_2.fq.gz
//! ```
//!

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;

pub mod config;
pub mod convert;
pub mod error;
pub mod fastq;
pub mod manifest;

pub use error::Error;
pub use error::Result;

use config::SchemaStore;
use fastq::report::Report;
use fastq::validator::QualitySampling;
use fastq::validator::SeqValidator;
use manifest::Manifest;

/// Split `path` into everything before its final extension and the extension.
///
/// Leading dots of the file name are not treated as an extension separator,
/// so `.bashrc` has no extension.
///
/// ```rust
/// use seq_input_val::split_ext;
///
/// assert_eq!(split_ext("dir/reads.fq.gz"), ("dir/reads.fq", ".gz"));
/// assert_eq!(split_ext(".hidden"), (".hidden", ""));
/// assert_eq!(split_ext("no_extension"), ("no_extension", ""));
/// ```
pub fn split_ext(path: &str) -> (&str, &str) {
    let name_start = path.rfind('/').map_or(0, |idx| idx + 1);
    let name = &path[name_start..];
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name.rfind('.') {
        Some(dot) if dot > leading_dots => path.split_at(name_start + dot),
        _ => (path, ""),
    }
}

/// Extension of `path` including at most one trailing compression suffix.
///
/// ```rust
/// use seq_input_val::full_ext;
///
/// assert_eq!(full_ext("reads.fq.gz", &[".gz"]), ".fq.gz");
/// assert_eq!(full_ext("reads.fq.bz2", &[".gz"]), ".bz2");
/// assert_eq!(full_ext("reads.bam", &[".gz"]), ".bam");
/// ```
pub fn full_ext(path: &str, compressions: &[&str]) -> String {
    let (base, ext) = split_ext(path);
    if compressions.contains(&ext) {
        let (_, inner) = split_ext(base);
        inner.to_string() + ext
    } else {
        ext.to_string()
    }
}

/// Serialize `value` as JSON with 4-space indentation.
pub(crate) fn write_json<W: Write, T: Serialize>(
    value: &T,
    conn_out: &mut W,
) -> Result<()> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut *conn_out, formatter);
    value.serialize(&mut serializer)?;
    writeln!(conn_out)?;
    conn_out.flush()?;
    Ok(())
}

/// Convert a manifest in any supported format to tsv.
///
/// If `output` is None the output path is the input path with a `.tsv`
/// extension. A tsv input is copied, or left alone if it would be copied onto
/// itself.
///
/// Returns the path of the tsv manifest.
///
/// ## Usage
///
/// ```rust
/// use seq_input_val::normalise_manifest;
///
/// let dir = tempfile::tempdir().unwrap();
/// let input = dir.path().join("manifest.csv");
/// std::fs::write(&input, "Form type:,IMPORT\nForm version:,1.0\n,ignored\n").unwrap();
///
/// let output = normalise_manifest(&input, None).unwrap();
///
/// assert_eq!(output, dir.path().join("manifest.tsv"));
/// assert_eq!(std::fs::read_to_string(&output).unwrap(), "Form type:\tIMPORT\nForm version:\t1.0\n");
/// ```
///
pub fn normalise_manifest(
    input: &Path,
    output: Option<&Path>,
) -> Result<PathBuf> {
    convert::normalise(input, output)
}

/// Validate a tsv manifest and write the UUID stamped tsv and json to `out_dir`.
///
/// The rule configuration is taken from `store` using the manifest's
/// `Form type:` and `Form version:`. If `check_files` is true the files
/// listed in the manifest must exist and be non-empty.
///
/// Returns the paths of the tsv and json outputs.
///
/// ## Usage
///
/// ```rust
/// use seq_input_val::validate_manifest;
/// use seq_input_val::config::SchemaStore;
///
/// let dir = tempfile::tempdir().unwrap();
/// let input = dir.path().join("manifest.tsv");
/// let mut contents = String::new();
/// contents += "Form type:\tIMPORT\nForm version:\t1.0\nOur Ref:\t\n";
/// contents += "Your Name:\tA. Person\nYour Institute:\tSomewhere\nContact email:\ta@b.c\n";
/// contents += "Species:\tHuman\nSequencing type:\tWGS\nStudy description:\t\n";
/// contents += "Group_ID\tSample\tNormal_Tissue\tGroup_Control\tLibrary\tFile\tFile_2\n";
/// contents += "1\tS1\tN\tY\tL1\ts1_1.fq.gz\ts1_2.fq.gz\n";
/// std::fs::write(&input, contents).unwrap();
///
/// let (tsv, json) = validate_manifest(&input, dir.path(), &SchemaStore::default(), false).unwrap();
///
/// assert!(tsv.exists());
/// assert_eq!(json.extension().unwrap(), "json");
/// ```
///
pub fn validate_manifest(
    input: &Path,
    out_dir: &Path,
    store: &SchemaStore,
    check_files: bool,
) -> Result<(PathBuf, PathBuf)> {
    let mut manifest = Manifest::new(input);
    manifest.validate(store, check_files)?;
    manifest.write(out_dir)
}

/// Validate one interleaved or two paired FASTQ files and write the json
/// report to `report_out`.
///
/// `sampling` controls how many pairs are used to estimate the quality
/// encoding. If `output` is given and two files were supplied, the pairs are
/// also written to `output` as interleaved FASTQ.
///
/// ## Usage
///
/// ```rust
/// use seq_input_val::validate_seq_files;
/// use seq_input_val::fastq::validator::QualitySampling;
///
/// let dir = tempfile::tempdir().unwrap();
/// let input = dir.path().join("reads.fq");
/// std::fs::write(&input, "@r1/1\nACGT\n+\nIIII\n@r1/2\nTTGA\n+\nIIHI\n").unwrap();
///
/// let mut report_bytes: Vec<u8> = Vec::new();
/// let report = validate_seq_files(&[input], &mut report_bytes, QualitySampling::All, None).unwrap();
///
/// assert_eq!(report.pairs, 1);
/// assert!(report.interleaved);
/// assert!(String::from_utf8(report_bytes).unwrap().contains("\"pairs\": 1"));
/// ```
///
pub fn validate_seq_files<W: Write>(
    inputs: &[PathBuf],
    report_out: &mut W,
    sampling: QualitySampling,
    output: Option<&Path>,
) -> Result<Report> {
    let mut validator = match inputs {
        [file_a] => SeqValidator::new(file_a, None)?,
        [file_a, file_b] => SeqValidator::new(file_a, Some(file_b))?,
        _ => return Err(Error::SeqValidation(format!(
            "Expected 1 or 2 input files, got {}", inputs.len()
        ))),
    };
    validator = validator.with_quality_sampling(sampling);
    if let Some(path) = output {
        validator = validator.with_interleaved_output(path);
    }
    validator.validate()?;
    let report = validator.report();
    report.write(report_out)?;
    Ok(report)
}
