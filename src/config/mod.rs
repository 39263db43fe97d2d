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

//! Rule configurations that drive manifest validation.
//!
//! A [RuleConfig] is selected by the `Form type:` and `Form version:` fields
//! of a manifest header and describes:
//!
//!   - [HeaderRules]: which header fields must exist, which need a value,
//!     and which are restricted to a set of allowed values.
//!   - [BodyRules]: the ordered column headings of the file table, the
//!     columns that need a value, the allowed values per column (optionally
//!     limited in how many samples of a group may carry them), and the
//!     allowed file extensions.
//!
//! Configurations are JSON documents looked up by exact `(type, version)`
//! from a [SchemaStore]. The store bundled with the crate contains
//! `IMPORT-1.0`.
//!
//! ## Usage
//!
//! ```rust
//! use seq_input_val::config::SchemaStore;
//!
//! let store = SchemaStore::default();
//! let config = store.load("IMPORT", "1.0").unwrap();
//!
//! assert_eq!(config.body.ordered[0], "Group_ID");
//! assert!(config.header.expected.contains(&"Our Ref:".to_string()));
//! ```
//!

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;
use crate::error::Result;

/// Schemas compiled into the crate as `(type, version, json)`.
static EMBEDDED: &[(&str, &str, &str)] = &[
    ("IMPORT", "1.0", include_str!("../../config/IMPORT-1.0.json")),
];

/// Sections that must be present in every schema, as JSON pointers.
const REQUIRED_SECTIONS: [(&str, &str); 5] = [
    ("/header", "header (dict/hash)"),
    ("/header/expected", "header.expected (list/array)"),
    ("/header/required", "header.required (list/array)"),
    ("/header/validate", "header.validate (dict/hash)"),
    ("/body", "body (dict/hash)"),
];

/// Allowed value of a body column.
///
/// `limit` and `limit_by` restrict how many distinct samples within a group
/// of rows (rows sharing the `limit_by` column value) may carry `value`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ValueRule {
    pub value: String,
    pub limit: Option<usize>,
    pub limit_by: Option<String>,
}

impl ValueRule {
    /// Returns the `(limit, limit_by)` pair if this rule is limited.
    ///
    /// ## Errors
    ///
    /// Returns [Error::Config] if only one of the two is defined.
    pub fn limit_pair(
        &self,
        column: &str,
    ) -> Result<Option<(usize, &str)>> {
        match (self.limit, self.limit_by.as_deref()) {
            (Some(limit), Some(limit_by)) => Ok(Some((limit, limit_by))),
            (None, None) => Ok(None),
            _ => Err(Error::Config(format!(
                "'limit' and 'limit_by' must both be defined when either is present, check body.validate.{}",
                column
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HeaderRules {
    pub expected: Vec<String>,
    pub required: Vec<String>,
    pub validate: IndexMap<String, Vec<String>>,
}

impl HeaderRules {
    // validate keys must be required, required keys must be expected.
    fn check_nesting(
        &self,
        name: &str,
    ) -> Result<()> {
        if let Some(key) = self.validate.keys().find(|key| !self.required.contains(key)) {
            return Err(Error::Config(format!(
                "header.validate key '{}' is not listed in header.required in json file: {}.json",
                key, name
            )));
        }
        if let Some(key) = self.required.iter().find(|key| !self.expected.contains(key)) {
            return Err(Error::Config(format!(
                "header.required key '{}' is not listed in header.expected in json file: {}.json",
                key, name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BodyRules {
    pub ordered: Vec<String>,
    pub required: Vec<String>,
    pub validate: IndexMap<String, Vec<ValueRule>>,
    pub validate_ext: IndexMap<String, Vec<String>>,
}

/// Validation rules for one `(type, version)` of manifest.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RuleConfig {
    #[serde(rename = "type")]
    pub form_type: String,
    pub version: String,
    pub header: HeaderRules,
    pub body: BodyRules,
}

impl RuleConfig {
    /// Parse and check a rule configuration.
    ///
    /// `source` is only used in error messages. The document must declare
    /// the requested `form_type` and `version`.
    ///
    /// ## Errors
    ///
    /// - [Error::Parsing] if `type` or `version` in the document differ from
    ///   the requested ones.
    /// - [Error::Config] if the document is not valid JSON, misses a required
    ///   section, or breaks the header nesting rules.
    pub fn from_json_str(
        text: &str,
        source: &str,
        form_type: &str,
        version: &str,
    ) -> Result<Self> {
        let name = format!("{}-{}", form_type, version);
        let doc: Value = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("{} is not valid json: {}", source, e)))?;

        let found_type = doc.get("type").and_then(Value::as_str);
        if found_type != Some(form_type) {
            return Err(Error::Parsing(format!(
                "Filename ({}) does not match 'type' ({}) within file",
                source, found_type.unwrap_or("<absent>")
            )));
        }
        let found_version = doc.get("version").and_then(Value::as_str);
        if found_version != Some(version) {
            return Err(Error::Parsing(format!(
                "Filename ({}) does not match 'version' ({}) within file",
                source, found_version.unwrap_or("<absent>")
            )));
        }

        for (pointer, section) in REQUIRED_SECTIONS {
            if doc.pointer(pointer).is_none() {
                return Err(Error::Config(format!(
                    "{} not found in json file: {}.json",
                    section, name
                )));
            }
        }

        let config: RuleConfig = serde_json::from_value(doc)
            .map_err(|e| Error::Config(format!("Malformed json file {}.json: {}", name, e)))?;
        config.header.check_nesting(&name)?;

        Ok(config)
    }

    /// Read a rule configuration from `path`.
    pub fn from_path(
        path: &Path,
        form_type: &str,
        version: &str,
    ) -> Result<Self> {
        log::debug!("Loading rule configuration from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json_str(&text, &path.to_string_lossy(), form_type, version)
    }
}

/// Source of rule configurations keyed by `(type, version)`.
///
/// Lookup order is schemas added with [insert](SchemaStore::insert), then
/// `<type>-<version>.json` in the directory given to
/// [with_dir](SchemaStore::with_dir), then the schemas bundled with the
/// crate. There is no fallback between versions.
#[derive(Debug, Clone)]
pub struct SchemaStore {
    dir: Option<PathBuf>,
    schemas: HashMap<(String, String), String>,
}

impl Default for SchemaStore {
    fn default() -> Self {
        Self::embedded()
    }
}

impl SchemaStore {
    /// Store holding the schemas bundled with the crate.
    pub fn embedded() -> Self {
        Self { dir: None, schemas: HashMap::new() }
    }

    /// Bundled schemas plus those in `dir`.
    pub fn from_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self::embedded().with_dir(dir)
    }

    /// Also resolve `<dir>/<type>-<version>.json`, ahead of the bundled schemas.
    pub fn with_dir<P: Into<PathBuf>>(
        mut self,
        dir: P,
    ) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Add or replace the schema for `(form_type, version)`.
    pub fn insert(
        &mut self,
        form_type: &str,
        version: &str,
        json: impl Into<String>,
    ) -> &mut Self {
        self.schemas.insert((form_type.to_string(), version.to_string()), json.into());
        self
    }

    /// Load the rule configuration for `(form_type, version)`.
    ///
    /// ## Errors
    ///
    /// Returns [Error::Parsing] if the store has no schema for the key, and
    /// any error from [RuleConfig::from_json_str].
    pub fn load(
        &self,
        form_type: &str,
        version: &str,
    ) -> Result<RuleConfig> {
        let name = format!("{}-{}.json", form_type, version);
        if let Some(json) = self.schemas.get(&(form_type.to_string(), version.to_string())) {
            return RuleConfig::from_json_str(json, &name, form_type, version);
        }
        if let Some(dir) = &self.dir {
            let path = dir.join(&name);
            if path.is_file() {
                return RuleConfig::from_path(&path, form_type, version);
            }
            log::debug!("{} not found, trying bundled schemas", path.display());
        }
        if let Some((_, _, json)) = EMBEDDED.iter().find(|(t, v, _)| *t == form_type && *v == version) {
            return RuleConfig::from_json_str(json, &name, form_type, version);
        }
        Err(Error::Parsing(format!(
            "No rule configuration for 'Form type:' {} and 'Form version:' {}",
            form_type, version
        )))
    }
}
