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
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use seq_input_val::convert::ManifestFormat;

fn readable(path: &str) -> Result<PathBuf, String> {
    std::fs::File::open(path).map_err(|e| format!("{}: {}", path, e))?;
    Ok(PathBuf::from(path))
}

// Manifest in any supported format
fn manifest_file(path: &str) -> Result<PathBuf, String> {
    let path = readable(path)?;
    ManifestFormat::from_path(&path).map_err(|e| e.to_string())?;
    Ok(path)
}

fn tsv_file(path: &str) -> Result<PathBuf, String> {
    let path = readable(path)?;
    match ManifestFormat::from_path(&path) {
        Ok(ManifestFormat::Tsv) => Ok(path),
        _ => Err(format!("{} must be a tsv file", path.display())),
    }
}

fn tsv_output(path: &str) -> Result<PathBuf, String> {
    if !path.ends_with(".tsv") {
        return Err(format!("{} must have the extension .tsv", path));
    }
    Ok(PathBuf::from(path))
}

fn directory(path: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path);
    if !path.is_dir() {
        return Err(format!("{} is not a directory", path.display()));
    }
    Ok(path)
}

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // Convert a xls, xlsx or csv manifest to tsv
    ManNorm {
        // Input manifest
        #[arg(short = 'i', long = "input", required = true, value_parser = manifest_file, help = "Input manifest (xls, xlsx, csv or tsv)")]
        input: PathBuf,

        // Output file, defaults to input with .tsv extension
        #[arg(short = 'o', long = "output", required = false, value_parser = tsv_output)]
        output: Option<PathBuf>,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Validate a tsv manifest
    ManValid {
        // Input manifest
        #[arg(short = 'i', long = "input", required = true, value_parser = tsv_file, help = "Input manifest (tsv)")]
        input: PathBuf,

        // Directory for <uuid>.tsv and <uuid>.json
        #[arg(short = 'o', long = "output", required = true, value_parser = directory)]
        out_dir: PathBuf,

        // Check the files listed in the manifest exist and are not empty
        #[arg(short = 'c', long = "checkfiles", default_value_t = false)]
        check_files: bool,

        // Read rule configurations from <dir>/<type>-<version>.json
        #[arg(long = "config-dir", required = false, value_parser = directory)]
        config_dir: Option<PathBuf>,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Validate interleaved or paired fastq files
    SeqValid {
        // One interleaved or two paired files
        #[arg(short = 'i', long = "input", required = true, num_args = 1..=2, value_parser = readable, help = "Input fastq file(s)")]
        input_files: Vec<PathBuf>,

        // Report file, '-' for stdout
        #[arg(short = 'r', long = "report", default_value = "-")]
        report: String,

        // Pairs to sample for the quality encoding, 0 for all
        #[arg(short = 'q', long = "qual-samples", default_value_t = 100000)]
        qual_samples: u64,

        // Write paired input as interleaved fastq[.gz]
        #[arg(short = 'o', long = "output", required = false)]
        output: Option<PathBuf>,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },
}
