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

//! Key/value preamble of a manifest.
//!
//! The header is read until the row whose first cell is
//! [HEADER_BODY_SWITCH](crate::manifest::HEADER_BODY_SWITCH). Its
//! `Form type:` and `Form version:` select the
//! [RuleConfig](crate::config::RuleConfig) and `Our Ref:` holds the UUID that
//! identifies the manifest.
//!
//! ## Usage
//!
//! ```rust
//! use seq_input_val::manifest::header::Header;
//! use seq_input_val::config::HeaderRules;
//! use indexmap::IndexMap;
//!
//! let data = b"Form type:\tIMPORT\nForm version:\t1.0\nOur Ref:\t\nYour Name:\tA. Person\nGroup_ID\tSample\n";
//! let mut header = Header::parse(&data[..]).unwrap();
//!
//! let rules = HeaderRules {
//!     expected: vec!["Form type:".to_string(), "Form version:".to_string(), "Our Ref:".to_string(), "Your Name:".to_string()],
//!     required: vec!["Your Name:".to_string()],
//!     validate: IndexMap::new(),
//! };
//! header.validate(&rules).unwrap();
//!
//! // An empty `Our Ref:` gets a fresh UUID
//! assert_eq!(header.uuid().unwrap().len(), 36);
//! assert_eq!(header.items()["Our Ref:"], header.uuid().unwrap());
//! ```
//!

use std::io::Read;
use std::io::Write;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::config::HeaderRules;
use crate::error::Error;
use crate::error::Result;
use crate::manifest::tsv_reader;
use crate::manifest::FORM_TYPE;
use crate::manifest::FORM_VERSION;
use crate::manifest::HEADER_BODY_SWITCH;
use crate::manifest::OUR_REF;

/// Check that `value` is a version 4 UUID.
///
/// The value must be the lowercase hexadecimal form, with or without hyphens.
pub fn uuid4_chk(value: &str) -> bool {
    match Uuid::try_parse(value) {
        Ok(id) => {
            id.get_version() == Some(uuid::Version::Random)
                && id.get_variant() == uuid::Variant::RFC4122
                && id.simple().to_string() == value.replace('-', "")
        },
        Err(_) => false,
    }
}

fn quoted_list<'a, I: Iterator<Item = &'a String>>(names: I) -> String {
    names.map(|name| format!("'{}'", name)).collect::<Vec<String>>().join("\n\t")
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub form_type: String,
    pub version: String,
    all_items: IndexMap<String, String>,
    items: IndexMap<String, String>,
    uuid: Option<String>,
}

impl Header {
    /// Read the header rows of a tab separated manifest from `conn`.
    ///
    /// A row with only a key gets an empty value. If a key appears more than
    /// once the last value is kept.
    ///
    /// ## Errors
    ///
    /// Returns [Error::Parsing] if `Form type:` or `Form version:` is absent.
    pub fn parse<R: Read>(
        conn: R,
    ) -> Result<Self> {
        let mut all_items: IndexMap<String, String> = IndexMap::new();
        let mut reader = tsv_reader(conn);
        for row in reader.records() {
            let row = row?;
            let key = row.get(0).unwrap_or_default();
            if key == HEADER_BODY_SWITCH {
                break;
            }
            let value = row.get(1).unwrap_or_default();
            if let Some(previous) = all_items.insert(key.to_string(), value.to_string()) {
                log::debug!("Header key '{}' repeated, replacing '{}' with '{}'", key, previous, value);
            }
        }

        let form_type = all_items.get(FORM_TYPE).cloned()
            .ok_or_else(|| Error::Parsing(format!("\"{}\" not found in header", FORM_TYPE)))?;
        let version = all_items.get(FORM_VERSION).cloned()
            .ok_or_else(|| Error::Parsing(format!("\"{}\" not found in header", FORM_VERSION)))?;

        Ok(Self { form_type, version, all_items, items: IndexMap::new(), uuid: None })
    }

    /// Every row read from the header, including `Form type:` and `Form version:`.
    pub fn all_items(&self) -> &IndexMap<String, String> {
        &self.all_items
    }

    /// Header fields accepted by [fields_exist](Header::fields_exist).
    pub fn items(&self) -> &IndexMap<String, String> {
        &self.items
    }

    /// UUID assigned or confirmed by [validate](Header::validate).
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    /// Check the header holds exactly the `expected` fields.
    ///
    /// On success all fields except `Form type:` and `Form version:` are
    /// copied to [items](Header::items).
    pub fn fields_exist(
        &mut self,
        expected: &[String],
    ) -> Result<()> {
        let unexpected: Vec<&String> = self.all_items.keys().filter(|key| !expected.contains(key)).collect();
        let missing: Vec<&String> = expected.iter().filter(|key| !self.all_items.contains_key(*key)).collect();

        let mut problems: Vec<String> = Vec::new();
        if !unexpected.is_empty() {
            problems.push(format!(
                "The following unexpected fields were found in the header of your file:\n\t{}",
                quoted_list(unexpected.into_iter())
            ));
        }
        if !missing.is_empty() {
            problems.push(format!(
                "The following expected fields were missing from the header of your file:\n\t{}",
                quoted_list(missing.into_iter())
            ));
        }
        if !problems.is_empty() {
            return Err(Error::Validation(problems.join("\n")));
        }

        self.items = self.all_items.iter()
            .filter(|(key, _)| *key != FORM_TYPE && *key != FORM_VERSION)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(())
    }

    /// Check all `required` fields have a value.
    pub fn fields_have_values(
        &self,
        required: &[String],
    ) -> Result<()> {
        for item in required {
            if self.items.get(item).is_none_or(|value| value.is_empty()) {
                return Err(Error::Validation(format!("Header item '{}' has no value.", item)));
            }
        }
        Ok(())
    }

    /// Check restricted fields hold one of their allowed values.
    pub fn field_values_valid(
        &self,
        validate: &IndexMap<String, Vec<String>>,
    ) -> Result<()> {
        for (item, allowed) in validate {
            let value = self.items.get(item).map(String::as_str).unwrap_or_default();
            if !allowed.iter().any(|x| x == value) {
                return Err(Error::Validation(format!(
                    "Header item '{}' has an invalid value of: {}", item, value
                )));
            }
        }
        Ok(())
    }

    /// Validate the header against `rules` and settle its UUID.
    ///
    /// Runs [fields_exist](Header::fields_exist),
    /// [fields_have_values](Header::fields_have_values) and
    /// [field_values_valid](Header::field_values_valid) in turn. An empty
    /// `Our Ref:` is filled with a new UUID, a non-empty one must already be
    /// a valid version 4 UUID.
    pub fn validate(
        &mut self,
        rules: &HeaderRules,
    ) -> Result<()> {
        self.fields_exist(&rules.expected)?;
        self.fields_have_values(&rules.required)?;
        self.field_values_valid(&rules.validate)?;

        let found = self.items.get(OUR_REF).cloned().unwrap_or_default();
        if found.is_empty() {
            let uuid = Uuid::new_v4().to_string();
            log::info!("Assigned {} to manifest", uuid);
            self.items.insert(OUR_REF.to_string(), uuid.clone());
            self.uuid = Some(uuid);
        } else {
            if !uuid4_chk(&found) {
                return Err(Error::Validation(format!(
                    "Value found at '{}' is not a valid uuid4: {}", OUR_REF, found
                )));
            }
            self.uuid = Some(found);
        }
        Ok(())
    }

    /// Write the validated header as tab separated rows to `conn`.
    ///
    /// Returns the items for the json representation.
    pub fn write<W: Write + ?Sized>(
        &self,
        conn: &mut W,
    ) -> Result<&IndexMap<String, String>> {
        for (key, value) in &self.items {
            writeln!(conn, "{}\t{}", key, value)?;
        }
        writeln!(conn, "{}\t{}", FORM_TYPE, self.form_type)?;
        writeln!(conn, "{}\t{}", FORM_VERSION, self.version)?;
        Ok(&self.items)
    }
}

// Tests
#[cfg(test)]
mod tests {
    use crate::config::HeaderRules;
    use indexmap::IndexMap;

    const GOOD: &[u8] = b"Form type:\tIMPORT\nForm version:\t1.0\nOur Ref:\t\nYour Name:\tA. Person\nSpecies:\tHuman\nGroup_ID\tSample\tFile\n1\tS1\ta.bam\n";

    fn rules() -> HeaderRules {
        let mut validate: IndexMap<String, Vec<String>> = IndexMap::new();
        validate.insert("Species:".to_string(), vec!["Human".to_string(), "Mouse".to_string()]);
        HeaderRules {
            expected: ["Form type:", "Form version:", "Our Ref:", "Your Name:", "Species:"].iter().map(|x| x.to_string()).collect(),
            required: vec!["Your Name:".to_string(), "Species:".to_string()],
            validate,
        }
    }

    #[test]
    fn parse_stops_at_switch() {
        use super::Header;

        let got = Header::parse(GOOD).unwrap();

        assert_eq!(got.form_type, "IMPORT");
        assert_eq!(got.version, "1.0");
        assert_eq!(got.all_items().len(), 5);
        assert_eq!(got.all_items()["Our Ref:"], "");
        assert!(!got.all_items().contains_key("Group_ID"));
    }

    #[test]
    fn parse_last_duplicate_wins() {
        use super::Header;

        let data = b"Form type:\tIMPORT\nForm version:\t1.0\nYour Name:\tFirst\nYour Name:\tSecond\nGroup_ID\n";
        let got = Header::parse(&data[..]).unwrap();

        assert_eq!(got.all_items()["Your Name:"], "Second");
    }

    #[test]
    fn parse_missing_form_type() {
        use super::Header;
        use crate::Error;

        let data = b"Form version:\t1.0\nGroup_ID\n";
        let got = Header::parse(&data[..]);

        assert!(matches!(got, Err(Error::Parsing(ref msg)) if msg.contains("Form type:")));
    }

    #[test]
    fn parse_missing_form_version() {
        use super::Header;
        use crate::Error;

        let data = b"Form type:\tIMPORT\nGroup_ID\n";
        let got = Header::parse(&data[..]);

        assert!(matches!(got, Err(Error::Parsing(ref msg)) if msg.contains("Form version:")));
    }

    #[test]
    fn validate_assigns_uuid() {
        use super::{uuid4_chk, Header};

        let mut header = Header::parse(GOOD).unwrap();
        header.validate(&rules()).unwrap();

        let uuid = header.uuid().unwrap();
        assert!(uuid4_chk(uuid));
        assert_eq!(header.items()["Our Ref:"], uuid);
        assert!(!header.items().contains_key("Form type:"));
    }

    #[test]
    fn validate_keeps_existing_uuid() {
        use super::Header;

        let data = b"Form type:\tIMPORT\nForm version:\t1.0\nOur Ref:\t05218fd0-79e5-4214-92d5-e133cd16a798\nYour Name:\tA. Person\nSpecies:\tMouse\nGroup_ID\n";
        let mut header = Header::parse(&data[..]).unwrap();
        header.validate(&rules()).unwrap();

        assert_eq!(header.uuid(), Some("05218fd0-79e5-4214-92d5-e133cd16a798"));
    }

    #[test]
    fn validate_bad_uuid() {
        use super::Header;
        use crate::Error;

        let data = b"Form type:\tIMPORT\nForm version:\t1.0\nOur Ref:\tnot-a-uuid\nYour Name:\tA. Person\nSpecies:\tMouse\nGroup_ID\n";
        let mut header = Header::parse(&data[..]).unwrap();
        let got = header.validate(&rules());

        assert!(matches!(got, Err(Error::Validation(ref msg)) if msg.contains("not a valid uuid4")));
    }

    #[test]
    fn validate_extra_and_missing_fields() {
        use super::Header;
        use crate::Error;

        let data = b"Form type:\tIMPORT\nForm version:\t1.0\nOur Ref:\t\nSpecies:\tHuman\nFavourite colour:\tblue\nGroup_ID\n";
        let mut header = Header::parse(&data[..]).unwrap();
        let got = header.validate(&rules());

        assert!(matches!(got, Err(Error::Validation(ref msg)) if msg.contains("'Favourite colour:'") && msg.contains("'Your Name:'")));
    }

    #[test]
    fn validate_missing_value() {
        use super::Header;
        use crate::Error;

        let data = b"Form type:\tIMPORT\nForm version:\t1.0\nOur Ref:\t\nYour Name:\t\nSpecies:\tHuman\nGroup_ID\n";
        let mut header = Header::parse(&data[..]).unwrap();
        let got = header.validate(&rules());

        assert!(matches!(got, Err(Error::Validation(ref msg)) if msg == "Header item 'Your Name:' has no value."));
    }

    #[test]
    fn validate_invalid_value() {
        use super::Header;
        use crate::Error;

        let data = b"Form type:\tIMPORT\nForm version:\t1.0\nOur Ref:\t\nYour Name:\tA. Person\nSpecies:\tCat\nGroup_ID\n";
        let mut header = Header::parse(&data[..]).unwrap();
        let got = header.validate(&rules());

        assert!(matches!(got, Err(Error::Validation(ref msg)) if msg.contains("Cat")));
    }

    #[test]
    fn uuid4_chk_forms() {
        use super::uuid4_chk;

        assert!(uuid4_chk("05218fd0-79e5-4214-92d5-e133cd16a798"));
        assert!(uuid4_chk("05218fd079e5421492d5e133cd16a798"));
        assert!(!uuid4_chk("05218FD0-79E5-4214-92D5-E133CD16A798"));
        // version 1
        assert!(!uuid4_chk("05218fd0-79e5-1214-92d5-e133cd16a798"));
        assert!(!uuid4_chk(""));
    }

    #[test]
    fn write_appends_form_fields() {
        use super::Header;

        let data = b"Form type:\tIMPORT\nForm version:\t1.0\nOur Ref:\t05218fd0-79e5-4214-92d5-e133cd16a798\nYour Name:\tA. Person\nSpecies:\tMouse\nGroup_ID\n";
        let mut header = Header::parse(&data[..]).unwrap();
        header.validate(&rules()).unwrap();

        let mut got: Vec<u8> = Vec::new();
        let items = header.write(&mut got).unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(
            String::from_utf8(got).unwrap(),
            "Our Ref:\t05218fd0-79e5-4214-92d5-e133cd16a798\nYour Name:\tA. Person\nSpecies:\tMouse\nForm type:\tIMPORT\nForm version:\t1.0\n"
        );
    }
}
