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
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;

use clap::CommandFactory;
use clap::Parser;

use seq_input_val::config::SchemaStore;
use seq_input_val::fastq::validator::QualitySampling;
use seq_input_val::Error;

mod cli;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) {
    stderrlog::new()
    .module(module_path!())
    .module("seq_input_val")
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init()
    .unwrap_or_else(|e| eprintln!("WARNING: logging not available: {}", e));
}

fn run(command: &cli::Commands) -> Result<(), Error> {
    match command {
        // Normalise
        cli::Commands::ManNorm {
            input,
            output,
            verbose,
        } => {
            init_log(if *verbose { 2 } else { 1 });

            let out_path = seq_input_val::normalise_manifest(input, output.as_deref())?;
            log::info!("Manifest written to {}", out_path.display());
        },

        // Validate manifest
        cli::Commands::ManValid {
            input,
            out_dir,
            check_files,
            config_dir,
            verbose,
        } => {
            init_log(if *verbose { 2 } else { 1 });

            let store = match config_dir {
                Some(dir) => SchemaStore::from_dir(dir),
                None => SchemaStore::default(),
            };
            let (tsv, json) = seq_input_val::validate_manifest(input, out_dir, &store, *check_files)?;
            println!("{}\t{}", tsv.display(), json.display());
        },

        // Validate fastq
        cli::Commands::SeqValid {
            input_files,
            report,
            qual_samples,
            output,
            verbose,
        } => {
            init_log(if *verbose { 2 } else { 1 });

            let sampling = QualitySampling::from_limit(*qual_samples);
            if report == "-" {
                let mut conn_out = std::io::stdout().lock();
                seq_input_val::validate_seq_files(input_files, &mut conn_out, sampling, output.as_deref())?;
            } else {
                // Report file is only created after validation succeeds
                let mut report_bytes: Vec<u8> = Vec::new();
                seq_input_val::validate_seq_files(input_files, &mut report_bytes, sampling, output.as_deref())?;
                let fp = File::create(report).map_err(|e| Error::io(report, e))?;
                let mut conn_out = BufWriter::new(fp);
                conn_out.write_all(&report_bytes).map_err(|e| Error::io(report, e))?;
                conn_out.flush().map_err(|e| Error::io(report, e))?;
            }
        },
    }
    Ok(())
}

fn main() {
    let cli = cli::Cli::parse();

    // Subcommands:
    let Some(command) = &cli.command else {
        if let Err(e) = cli::Cli::command().print_help() {
            eprintln!("ERROR: {}", e);
        }
        std::process::exit(1);
    };

    if let Err(e) = run(command) {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

// Tests
#[cfg(test)]
mod tests {

    fn seq_valid(input: std::path::PathBuf, report: &std::path::Path) -> super::cli::Commands {
        super::cli::Commands::SeqValid {
            input_files: vec![input],
            report: report.display().to_string(),
            qual_samples: 0,
            output: None,
            verbose: false,
        }
    }

    #[test]
    fn seq_valid_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("reads.fq");
        std::fs::write(&input, "@r1/1\nACGT\n+\nIIII\n@r1/2\nTTGA\n+\nIIHI\n").unwrap();
        let report = dir.path().join("report.json");

        super::run(&seq_valid(input, &report)).unwrap();

        assert!(std::fs::read_to_string(&report).unwrap().contains("\"pairs\": 1"));
    }

    #[test]
    fn seq_valid_failure_leaves_no_report() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("reads.fq");
        std::fs::write(&input, "@r1/1\nACGT\n+\nIIII\n").unwrap();
        let report = dir.path().join("report.json");

        assert!(super::run(&seq_valid(input, &report)).is_err());
        assert!(!report.exists());
    }
}
