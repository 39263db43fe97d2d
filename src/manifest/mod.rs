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

//! Validation of tab separated sample manifests.
//!
//! A [Manifest] is validated in two parts:
//!
//!   - [Header](header::Header): `key<TAB>value` rows that select the rule
//!     configuration and carry the manifest UUID.
//!   - [Body](body::Body): the table of sample files that follows the
//!     [HEADER_BODY_SWITCH] row.
//!
//! After validation the manifest can be written as a UUID stamped tsv and as
//! json with [Manifest::write].
//!
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::config::RuleConfig;
use crate::config::SchemaStore;
use crate::convert::ManifestFormat;
use crate::error::Error;
use crate::error::Result;
use crate::write_json;

pub mod body;
pub mod file_meta;
pub mod header;

use body::Body;
use header::Header;

/// First cell of the row that ends the header and holds the body headings.
pub const HEADER_BODY_SWITCH: &str = "Group_ID";
pub const FORM_TYPE: &str = "Form type:";
pub const FORM_VERSION: &str = "Form version:";
/// Header field holding the manifest UUID.
pub const OUR_REF: &str = "Our Ref:";
/// Stands for an absent value in the body.
pub const PLACEHOLDER: &str = ".";
/// Column identifying the sample of a body row.
pub const SAMPLE_COLUMN: &str = "Sample";
/// Body columns that name data files.
pub const FILE_COLUMNS: [&str; 2] = ["File", "File_2"];

pub(crate) fn tsv_reader<R: Read>(conn: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(conn)
}

#[derive(Debug, Clone)]
struct Validated {
    header: Header,
    config: RuleConfig,
    body: Body,
}

/// A manifest file and, once validated, its contents.
///
/// ## Usage
///
/// ```rust
/// use seq_input_val::config::SchemaStore;
/// use seq_input_val::manifest::Manifest;
///
/// let dir = tempfile::tempdir().unwrap();
/// let input = dir.path().join("manifest.tsv");
/// let mut contents = String::new();
/// contents += "Form type:\tIMPORT\nForm version:\t1.0\nOur Ref:\t\n";
/// contents += "Your Name:\tA. Person\nYour Institute:\tSomewhere\nContact email:\ta@b.c\n";
/// contents += "Species:\tMouse\nSequencing type:\tWXS\nStudy description:\tExome\n";
/// contents += "Group_ID\tSample\tNormal_Tissue\tGroup_Control\tLibrary\tFile\tFile_2\n";
/// contents += "1\tS1\tN\tY\tL1\ts1.bam\t.\n";
/// std::fs::write(&input, contents).unwrap();
///
/// let mut manifest = Manifest::new(&input);
/// assert!(manifest.uuid().is_err());
///
/// manifest.validate(&SchemaStore::default(), false).unwrap();
/// let json = manifest.for_json().unwrap();
///
/// assert_eq!(json["type"], "IMPORT");
/// assert_eq!(json["body"][0]["File"], "s1.bam");
/// assert_eq!(json["header"]["Our Ref:"], manifest.uuid().unwrap());
/// ```
///
#[derive(Debug, Clone)]
pub struct Manifest {
    infile: PathBuf,
    validated: Option<Validated>,
}

impl Manifest {
    pub fn new<P: AsRef<Path>>(infile: P) -> Self {
        Self { infile: infile.as_ref().to_path_buf(), validated: None }
    }

    pub fn infile(&self) -> &Path {
        &self.infile
    }

    /// Validate the header and body of the manifest.
    ///
    /// The rule configuration is loaded from `store` using the header's
    /// `Form type:` and `Form version:`. With `check_files` the files in the
    /// body must exist and be non-empty.
    ///
    /// ## Errors
    ///
    /// Returns [Error::UnsupportedFormat] if the manifest is not tsv, and the
    /// first error met by the header or body checks otherwise.
    pub fn validate(
        &mut self,
        store: &SchemaStore,
        check_files: bool,
    ) -> Result<()> {
        if !matches!(ManifestFormat::from_path(&self.infile), Ok(ManifestFormat::Tsv)) {
            return Err(Error::UnsupportedFormat(
                "Manifest.validate only accepts files of type \"tsv\"".to_string()
            ));
        }
        log::info!("Validating manifest {}", self.infile.display());
        let contents = std::fs::read(&self.infile).map_err(|e| Error::io(&self.infile, e))?;

        let mut header = Header::parse(contents.as_slice())?;
        let config = store.load(&header.form_type, &header.version)?;
        header.validate(&config.header)?;
        log::debug!("Header of {} is valid", self.infile.display());

        let manifest_dir = self.infile.parent().map(Path::to_path_buf).unwrap_or_default();
        let body = Body::parse(contents.as_slice(), &manifest_dir, &config.body)?;
        body.validate(&config.body)?;
        if check_files {
            body.file_tests()?;
        }
        log::debug!("Body of {} is valid ({} rows)", self.infile.display(), body.entries().len());

        self.validated = Some(Validated { header, config, body });
        Ok(())
    }

    fn validated(&self) -> Result<&Validated> {
        self.validated.as_ref().ok_or_else(|| Error::Validation(
            "manifest.validate() must be called before using the manifest contents".to_string()
        ))
    }

    /// UUID of the validated manifest.
    pub fn uuid(&self) -> Result<&str> {
        let validated = self.validated()?;
        validated.header.uuid().ok_or_else(|| Error::Validation(
            "manifest.validate() must be called before manifest.uuid()".to_string()
        ))
    }

    pub fn header(&self) -> Option<&Header> {
        self.validated.as_ref().map(|x| &x.header)
    }

    pub fn body(&self) -> Option<&Body> {
        self.validated.as_ref().map(|x| &x.body)
    }

    /// Json representation with `body`, `header`, `type` and `version`.
    pub fn for_json(&self) -> Result<serde_json::Value> {
        let validated = self.validated()?;
        let body = validated.body.write(None, &validated.config.body)?;
        Self::json_value(&validated.header, validated.header.items(), body)
    }

    fn json_value(
        header: &Header,
        items: &indexmap::IndexMap<String, String>,
        body: Vec<BTreeMap<String, String>>,
    ) -> Result<serde_json::Value> {
        let items: BTreeMap<&String, &String> = items.iter().collect();
        Ok(serde_json::json!({
            "body": body,
            "header": items,
            "type": header.form_type,
            "version": header.version,
        }))
    }

    /// Write `<uuid>.tsv` and `<uuid>.json` to `out_dir`.
    ///
    /// Returns the paths of the two files.
    pub fn write(
        &self,
        out_dir: &Path,
    ) -> Result<(PathBuf, PathBuf)> {
        let validated = self.validated()?;
        let uuid = self.uuid()?;
        let tsv_file = out_dir.join(format!("{}.tsv", uuid));
        let json_file = tsv_file.with_extension("json");

        let fp = File::create(&tsv_file).map_err(|e| Error::io(&tsv_file, e))?;
        let mut conn_out = BufWriter::new(fp);
        let items = validated.header.write(&mut conn_out)?;
        let body = validated.body.write(Some(&mut conn_out as &mut dyn Write), &validated.config.body)?;
        conn_out.flush().map_err(|e| Error::io(&tsv_file, e))?;
        log::info!("Wrote {}", tsv_file.display());

        let value = Self::json_value(&validated.header, items, body)?;
        let fp = File::create(&json_file).map_err(|e| Error::io(&json_file, e))?;
        write_json(&value, &mut BufWriter::new(fp))?;
        log::info!("Wrote {}", json_file.display());

        Ok((tsv_file, json_file))
    }
}
