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

//! Conversion of manifests to tsv.
//!
//! Manifests are often filled in as spreadsheets. [normalise] converts `csv`,
//! `xls` and `xlsx` manifests to the tab separated form read by
//! [Manifest](crate::manifest::Manifest). Rows whose first cell is empty are
//! dropped during conversion.
//!
use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use calamine::Reader;

use crate::error::Error;
use crate::error::Result;

/// Name of the worksheet that holds the manifest in xls and xlsx files.
pub const EXCEL_SHEET: &str = "For entry";

/// Supported manifest file formats.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Csv,
    Xls,
    Xlsx,
    Tsv,
}

impl std::str::FromStr for ManifestFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "csv" => Ok(ManifestFormat::Csv),
            "xls" => Ok(ManifestFormat::Xls),
            "xlsx" => Ok(ManifestFormat::Xlsx),
            "tsv" => Ok(ManifestFormat::Tsv),
            _ => Err(format!("'{}' is not a valid ManifestFormat", s)),
        }
    }
}

impl ManifestFormat {
    /// Format of `path` based on its extension.
    ///
    /// ```rust
    /// use seq_input_val::convert::ManifestFormat;
    /// use std::path::Path;
    ///
    /// assert_eq!(ManifestFormat::from_path(Path::new("in/manifest.xlsx")).unwrap(), ManifestFormat::Xlsx);
    /// assert!(ManifestFormat::from_path(Path::new("manifest.txt")).is_err());
    /// ```
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|x| x.to_str()).unwrap_or_default();
        ext.parse::<ManifestFormat>().map_err(|_| Error::UnsupportedFormat(format!(
            "Unsupported manifest format '{}' ({}), expected one of xls, xlsx, csv or tsv",
            ext, path.display()
        )))
    }
}

/// Converts a manifest of one format to tsv.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatConverter {
    Csv,
    Excel,
    Tsv,
}

impl FormatConverter {
    pub fn for_format(format: ManifestFormat) -> Self {
        match format {
            ManifestFormat::Csv => FormatConverter::Csv,
            ManifestFormat::Xls | ManifestFormat::Xlsx => FormatConverter::Excel,
            ManifestFormat::Tsv => FormatConverter::Tsv,
        }
    }

    /// Write the contents of `input` as tsv to `conn_out`.
    pub fn convert<W: Write>(
        &self,
        input: &Path,
        conn_out: &mut W,
    ) -> Result<()> {
        match self {
            FormatConverter::Csv => csv_to_tsv(input, conn_out),
            FormatConverter::Excel => excel_to_tsv(input, conn_out),
            FormatConverter::Tsv => {
                let fp = File::open(input).map_err(|e| Error::io(input, e))?;
                std::io::copy(&mut BufReader::new(fp), conn_out)?;
                Ok(())
            },
        }
    }
}

fn csv_to_tsv<W: Write>(
    input: &Path,
    conn_out: &mut W,
) -> Result<()> {
    let fp = File::open(input).map_err(|e| Error::io(input, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(fp));

    let mut dropped: usize = 0;
    for row in reader.records() {
        let row = row?;
        if row.get(0).unwrap_or_default().is_empty() {
            dropped += 1;
            continue;
        }
        writeln!(conn_out, "{}", row.iter().collect::<Vec<&str>>().join("\t"))?;
    }
    log::debug!("Dropped {} csv rows with an empty first cell", dropped);
    Ok(())
}

fn excel_to_tsv<W: Write>(
    input: &Path,
    conn_out: &mut W,
) -> Result<()> {
    let mut workbook = calamine::open_workbook_auto(input)?;
    if !workbook.sheet_names().iter().any(|name| name == EXCEL_SHEET) {
        return Err(Error::Parsing(format!(
            "xls[x] workbooks require the data sheet to be named \"{}\"", EXCEL_SHEET
        )));
    }
    let range = workbook.worksheet_range(EXCEL_SHEET)?;

    // Cells left of the used range are empty, so every row would be dropped
    if range.start().is_some_and(|(_, col)| col > 0) {
        log::warn!("First column of sheet \"{}\" in {} is empty", EXCEL_SHEET, input.display());
        return Ok(());
    }

    for row in range.rows() {
        let cells: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
        let used = cells.iter().rposition(|cell| !cell.is_empty()).map_or(0, |idx| idx + 1);
        if used == 0 || cells[0].is_empty() {
            continue;
        }
        writeln!(conn_out, "{}", cells[..used].join("\t"))?;
    }
    Ok(())
}

fn same_file(
    a: &Path,
    b: &Path,
) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Convert `input` to tsv and return the path of the tsv manifest.
///
/// Without `output` the result is written next to `input` with a `.tsv`
/// extension. A tsv `input` that would be written onto itself is left as is.
///
/// ## Errors
///
/// Returns [Error::UnsupportedFormat] if the extension of `input` is not
/// one of `csv`, `xls`, `xlsx` or `tsv`.
pub fn normalise(
    input: &Path,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let format = ManifestFormat::from_path(input)?;
    let output = output.map_or_else(|| input.with_extension("tsv"), Path::to_path_buf);

    if same_file(input, &output) {
        if format == ManifestFormat::Tsv {
            log::info!("{} is already tsv, nothing to do", input.display());
            return Ok(output);
        }
        return Err(Error::UnsupportedFormat(format!(
            "Refusing to overwrite {} with its own conversion", input.display()
        )));
    }

    log::info!("Converting {} to {}", input.display(), output.display());
    let converter = FormatConverter::for_format(format);
    let fp = File::create(&output).map_err(|e| Error::io(&output, e))?;
    let mut conn_out = BufWriter::new(fp);
    converter.convert(input, &mut conn_out)?;
    conn_out.flush().map_err(|e| Error::io(&output, e))?;

    Ok(output)
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn format_from_str() {
        use super::ManifestFormat;

        assert_eq!("tsv".parse::<ManifestFormat>(), Ok(ManifestFormat::Tsv));
        assert_eq!("xls".parse::<ManifestFormat>(), Ok(ManifestFormat::Xls));
        assert!("TSV".parse::<ManifestFormat>().is_err());
    }

    #[test]
    fn format_from_path_unsupported() {
        use super::ManifestFormat;
        use crate::Error;
        use std::path::Path;

        let got = ManifestFormat::from_path(Path::new("manifest"));

        assert!(matches!(got, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn converter_for_format() {
        use super::{FormatConverter, ManifestFormat};

        assert_eq!(FormatConverter::for_format(ManifestFormat::Xlsx), FormatConverter::Excel);
        assert_eq!(FormatConverter::for_format(ManifestFormat::Xls), FormatConverter::Excel);
        assert_eq!(FormatConverter::for_format(ManifestFormat::Csv), FormatConverter::Csv);
    }

    #[test]
    fn csv_drops_rows_with_empty_first_cell() {
        use super::FormatConverter;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("manifest.csv");
        std::fs::write(&input, "Form type:,IMPORT\n,,note\nGroup_ID,Sample,File\n1,\"S, 1\",a.bam\n").unwrap();

        let mut got: Vec<u8> = Vec::new();
        FormatConverter::Csv.convert(&input, &mut got).unwrap();

        assert_eq!(String::from_utf8(got).unwrap(), "Form type:\tIMPORT\nGroup_ID\tSample\tFile\n1\tS, 1\ta.bam\n");
    }

    #[test]
    fn normalise_csv_to_given_output() {
        use super::normalise;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("manifest.csv");
        let output = dir.path().join("converted.tsv");
        std::fs::write(&input, "Form type:,IMPORT\n").unwrap();

        let got = normalise(&input, Some(&output)).unwrap();

        assert_eq!(got, output);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "Form type:\tIMPORT\n");
    }

    #[test]
    fn normalise_tsv_onto_itself() {
        use super::normalise;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("manifest.tsv");
        std::fs::write(&input, "Form type:\tIMPORT\n").unwrap();

        let got = normalise(&input, None).unwrap();

        assert_eq!(got, input);
        assert_eq!(std::fs::read_to_string(&input).unwrap(), "Form type:\tIMPORT\n");
    }

    #[test]
    fn normalise_tsv_copy() {
        use super::normalise;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("manifest.tsv");
        let output = dir.path().join("copy.tsv");
        std::fs::write(&input, "Form type:\tIMPORT\n").unwrap();

        normalise(&input, Some(&output)).unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "Form type:\tIMPORT\n");
    }

    #[test]
    fn excel_not_a_workbook() {
        use super::FormatConverter;
        use crate::Error;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("manifest.xlsx");
        std::fs::write(&input, "not a zip archive").unwrap();

        let mut got: Vec<u8> = Vec::new();
        let res = FormatConverter::Excel.convert(&input, &mut got);

        assert!(matches!(res, Err(Error::Excel(_))));
    }
}
