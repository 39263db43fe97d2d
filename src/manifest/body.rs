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

//! Table of sample files in a manifest.
//!
//! The body starts at the [HEADER_BODY_SWITCH] row, which holds the column
//! headings, and every following row is one [FileEntry]. Checks on the body
//! run in a fixed order and stop at the first problem:
//!
//!   1. [fields_have_values](Body::fields_have_values)
//!   2. [field_values_valid](Body::field_values_valid)
//!   3. [uniq_files](Body::uniq_files)
//!   4. [file_ext_check](Body::file_ext_check)
//!
//! Errors name the line of the offending row in the manifest.
//!
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashSet;
use std::io::Read;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;

use crate::config::BodyRules;
use crate::config::ValueRule;
use crate::error::Error;
use crate::error::Result;
use crate::full_ext;
use crate::manifest::file_meta::FileEntry;
use crate::manifest::tsv_reader;
use crate::manifest::FILE_COLUMNS;
use crate::manifest::HEADER_BODY_SWITCH;
use crate::manifest::PLACEHOLDER;
use crate::manifest::SAMPLE_COLUMN;

/// Distinct samples seen per `(column, value)` and `limit_by` group.
#[derive(Debug, Default)]
struct LimitTally {
    counts: BTreeMap<(String, String), BTreeMap<String, BTreeSet<String>>>,
}

impl LimitTally {
    fn add(
        &mut self,
        column: &str,
        value: &str,
        group: &str,
        sample: &str,
    ) {
        self.counts
            .entry((column.to_string(), value.to_string()))
            .or_default()
            .entry(group.to_string())
            .or_default()
            .insert(sample.to_string());
    }

    fn check(
        &self,
        column: &str,
        rules: &[ValueRule],
    ) -> Result<()> {
        for rule in rules {
            let Some((limit, limit_by)) = rule.limit_pair(column)? else {
                continue;
            };
            let Some(groups) = self.counts.get(&(column.to_string(), rule.value.clone())) else {
                continue;
            };
            for (group, samples) in groups {
                log::debug!("{} '{}' in {} '{}': {} sample(s)", column, rule.value, limit_by, group, samples.len());
                if samples.len() > limit {
                    return Err(Error::Validation(format!(
                        "Only {} sample(s) with a value of '{}' is allowed in column '{}' when rows grouped by '{}'",
                        limit, rule.value, column, limit_by
                    )));
                }
            }
        }
        Ok(())
    }
}

fn heading_check(
    expected: &[String],
    found: &[String],
) -> Result<()> {
    if expected != found {
        return Err(Error::Validation(format!(
            "Expected row headings of\n\t{}\nbut got\n\t{}",
            expected.join(", "), found.join(", ")
        )));
    }
    Ok(())
}

// 1-based line where `row` starts in the manifest
fn record_line(
    row: &csv::StringRecord,
    fallback: usize,
) -> usize {
    row.position().map_or(fallback, |pos| pos.line() as usize)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Body {
    headings: Vec<String>,
    offset: usize,
    file_detail: Vec<FileEntry>,
    line_nos: Vec<usize>,
}

impl Body {
    /// Read the body of a tab separated manifest from `conn`.
    ///
    /// Rows before the [HEADER_BODY_SWITCH] row are counted but skipped. The
    /// switch row must match `rules.ordered` exactly. File names in the rows
    /// are relative to `manifest_dir`.
    ///
    /// ## Errors
    ///
    /// Returns [Error::Validation] if the headings differ from
    /// `rules.ordered`, if the switch row is missing, or if a row is short.
    pub fn parse<R: Read>(
        conn: R,
        manifest_dir: &Path,
        rules: &BodyRules,
    ) -> Result<Self> {
        let mut reader = tsv_reader(conn);
        let mut records = reader.records();

        // Blank lines are skipped by the reader, so line numbers come from
        // the record positions.
        let mut offset: usize = 0;
        let headings: Vec<String> = loop {
            match records.next() {
                Some(row) => {
                    let row = row?;
                    offset = record_line(&row, offset + 1);
                    if row.get(0) == Some(HEADER_BODY_SWITCH) {
                        break row.iter().map(str::to_string).collect();
                    }
                },
                None => {
                    return Err(Error::Validation(format!(
                        "No row starting with '{}' found, the manifest has no file table",
                        HEADER_BODY_SWITCH
                    )));
                },
            }
        };
        heading_check(&rules.ordered, &headings)?;

        let mut file_detail: Vec<FileEntry> = Vec::new();
        let mut line_nos: Vec<usize> = Vec::new();
        for row in records {
            let row = row?;
            let line = record_line(&row, line_nos.last().copied().unwrap_or(offset) + 1);
            let details: Vec<&str> = row.iter().collect();
            file_detail.push(FileEntry::new(&headings, &details, manifest_dir, line)?);
            line_nos.push(line);
        }

        Ok(Self { headings, offset, file_detail, line_nos })
    }

    pub fn headings(&self) -> &[String] {
        &self.headings
    }

    /// Number of the heading row in the manifest.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.file_detail
    }

    // 1-based manifest line of each entry
    fn lines(&self) -> impl Iterator<Item = (usize, &FileEntry)> {
        self.line_nos.iter().copied().zip(self.file_detail.iter())
    }

    /// Run all checks against `rules`.
    pub fn validate(
        &self,
        rules: &BodyRules,
    ) -> Result<()> {
        self.fields_have_values(&rules.required)?;
        self.field_values_valid(&rules.validate)?;
        self.uniq_files()?;
        self.file_ext_check(&rules.validate_ext)?;
        Ok(())
    }

    /// Check the `required` columns are not empty or `.` on any row.
    pub fn fields_have_values(
        &self,
        required: &[String],
    ) -> Result<()> {
        for (line, entry) in self.lines() {
            for column in required {
                let value = entry.attribute(column).unwrap_or_default();
                if value.is_empty() || value == PLACEHOLDER {
                    return Err(Error::Validation(format!(
                        "Required metadata value absent for '{}' on line {} ('.' not acceptable)",
                        column, line
                    )));
                }
            }
        }
        Ok(())
    }

    /// Check restricted columns hold an allowed value and honour value limits.
    ///
    /// A [ValueRule] with `limit` and `limit_by` allows at most `limit`
    /// distinct samples with that value among the rows that share a
    /// `limit_by` value. Limits are evaluated after all rows of a column have
    /// been seen.
    ///
    /// ## Errors
    ///
    /// - [Error::Config] if a rule defines only one of `limit` and `limit_by`,
    ///   or names a `limit_by` column the table does not have.
    /// - [Error::Validation] for a value that is not allowed or an exceeded
    ///   limit.
    pub fn field_values_valid(
        &self,
        validate: &IndexMap<String, Vec<ValueRule>>,
    ) -> Result<()> {
        for (column, rules) in validate {
            for rule in rules {
                rule.limit_pair(column)?;
            }
        }

        for (column, rules) in validate {
            let mut tally = LimitTally::default();
            for (line, entry) in self.lines() {
                let value = entry.attribute(column).unwrap_or_default();
                let Some(rule) = rules.iter().find(|rule| rule.value == value) else {
                    return Err(Error::Validation(format!(
                        "Metadata item '{}' has an invalid value of '{}' on line {}",
                        column, value, line
                    )));
                };
                if let Some((_, limit_by)) = rule.limit_pair(column)? {
                    let group = entry.attribute(limit_by).ok_or_else(|| Error::Config(format!(
                        "'limit_by' column '{}' of body.validate.{} is not a body column",
                        limit_by, column
                    )))?;
                    let sample = entry.attribute(SAMPLE_COLUMN).unwrap_or_default();
                    tally.add(column, value, group, sample);
                }
            }
            tally.check(column, rules)?;
        }
        Ok(())
    }

    /// Check no file name appears twice in the `File` and `File_2` columns.
    ///
    /// Names are compared as written, not as resolved paths.
    pub fn uniq_files(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for (line, entry) in self.lines() {
            for column in FILE_COLUMNS {
                let item = entry.attribute(column).unwrap_or(PLACEHOLDER);
                if item == PLACEHOLDER {
                    continue;
                }
                if !seen.insert(item) {
                    return Err(Error::Validation(format!(
                        "Metadata item '{}' has a duplicate value of '{}' on line {}",
                        column, item, line
                    )));
                }
            }
        }
        Ok(())
    }

    /// Check file extensions are allowed and match within a row.
    pub fn file_ext_check(
        &self,
        validate_ext: &IndexMap<String, Vec<String>>,
    ) -> Result<()> {
        for (line, entry) in self.lines() {
            let mut last_ext: Option<String> = None;
            for column in FILE_COLUMNS {
                let item = entry.attribute(column).unwrap_or(PLACEHOLDER);
                if item == PLACEHOLDER {
                    continue;
                }
                let ext = full_ext(item, &[".gz"]);
                let allowed = validate_ext.get(column).is_some_and(|exts| exts.contains(&ext));
                if !allowed {
                    return Err(Error::Validation(format!(
                        "File extension of '{}' is not valid, '{}' on line {}",
                        ext, column, line
                    )));
                }
                if let Some(last) = &last_ext {
                    if *last != ext {
                        return Err(Error::Validation(format!(
                            "File extensions for same row must match, '{}' vs '{}' on line {}",
                            last, ext, line
                        )));
                    }
                }
                last_ext = Some(ext);
            }
        }
        Ok(())
    }

    /// Check the files of every row exist and are not empty.
    pub fn file_tests(&self) -> Result<()> {
        for (line, entry) in self.lines() {
            entry.test_files(line)?;
        }
        Ok(())
    }

    /// Write the heading and rows in `rules.ordered` order to `conn`.
    ///
    /// Returns the rows as maps from heading to value for the json output.
    pub fn write(
        &self,
        mut conn: Option<&mut dyn Write>,
        rules: &BodyRules,
    ) -> Result<Vec<BTreeMap<String, String>>> {
        if let Some(conn) = conn.as_mut() {
            writeln!(conn, "{}", rules.ordered.join("\t"))?;
        }
        let mut for_json: Vec<BTreeMap<String, String>> = Vec::with_capacity(self.file_detail.len());
        for entry in &self.file_detail {
            if let Some(conn) = conn.as_mut() {
                let row: Vec<&str> = rules.ordered.iter()
                    .map(|column| entry.attribute(column).unwrap_or_default())
                    .collect();
                writeln!(conn, "{}", row.join("\t"))?;
            }
            for_json.push(entry.attributes.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        }
        Ok(for_json)
    }
}

// Tests
#[cfg(test)]
mod tests {
    use crate::config::BodyRules;
    use crate::config::ValueRule;
    use indexmap::IndexMap;

    const PREAMBLE: &str = "Form type:\tIMPORT\nForm version:\t1.0\n";
    const HEADINGS: &str = "Group_ID\tSample\tNormal_Tissue\tGroup_Control\tLibrary\tFile\tFile_2\n";

    fn value(value: &str) -> ValueRule {
        ValueRule { value: value.to_string(), limit: None, limit_by: None }
    }

    fn rules() -> BodyRules {
        let ordered: Vec<String> = HEADINGS.trim_end().split('\t').map(str::to_string).collect();
        let required: Vec<String> = ordered[..6].to_vec();
        let mut validate: IndexMap<String, Vec<ValueRule>> = IndexMap::new();
        validate.insert("Normal_Tissue".to_string(), vec![value("Y"), value("N")]);
        validate.insert("Group_Control".to_string(), vec![
            ValueRule { value: "Y".to_string(), limit: Some(1), limit_by: Some("Group_ID".to_string()) },
            value("N"),
        ]);
        let mut validate_ext: IndexMap<String, Vec<String>> = IndexMap::new();
        validate_ext.insert("File".to_string(), vec![".bam".to_string(), ".fq.gz".to_string(), ".fq".to_string()]);
        validate_ext.insert("File_2".to_string(), vec![".fq.gz".to_string(), ".fq".to_string()]);
        BodyRules { ordered, required, validate, validate_ext }
    }

    fn body(rows: &[&str]) -> Result<super::Body, crate::Error> {
        let mut data = PREAMBLE.to_string() + HEADINGS;
        for row in rows {
            data += row;
            data += "\n";
        }
        super::Body::parse(data.as_bytes(), std::path::Path::new("/data"), &rules())
    }

    #[test]
    fn parse_offset_and_entries() {
        let got = body(&["1\tS1\tY\tY\tL1\ta.bam\t.", "1\tS2\tN\tN\tL1\tb.bam"]).unwrap();

        assert_eq!(got.offset(), 3);
        assert_eq!(got.entries().len(), 2);
        assert_eq!(got.entries()[1].attribute("File_2"), Some("."));
        assert_eq!(got.entries()[0].get_path("File"), Some(std::path::PathBuf::from("/data/a.bam")));
    }

    #[test]
    fn parse_wrong_headings() {
        use super::Body;
        use crate::Error;

        let data = "Form type:\tIMPORT\nGroup_ID\tFile\tSample\n1\ta.bam\tS1\n";
        let got = Body::parse(data.as_bytes(), std::path::Path::new("."), &rules());

        assert!(matches!(got, Err(Error::Validation(ref msg)) if msg.starts_with("Expected row headings of\n\tGroup_ID, Sample")));
    }

    #[test]
    fn parse_without_switch_row() {
        use super::Body;
        use crate::Error;

        let got = Body::parse(PREAMBLE.as_bytes(), std::path::Path::new("."), &rules());

        assert!(matches!(got, Err(Error::Validation(_))));
    }

    #[test]
    fn valid_body() {
        let got = body(&[
            "1\tS1\tY\tY\tL1\ts1_1.fq.gz\ts1_2.fq.gz",
            "1\tS2\tN\tN\tL1\ts2.bam\t.",
            "2\tS3\tN\tY\tL1\ts3.bam\t.",
        ]).unwrap();

        assert!(got.validate(&rules()).is_ok());
    }

    #[test]
    fn required_value_absent() {
        use crate::Error;

        let got = body(&["1\tS1\tY\tY\t.\ta.bam\t."]).unwrap();

        assert!(matches!(got.validate(&rules()), Err(Error::Validation(ref msg))
            if msg == "Required metadata value absent for 'Library' on line 4 ('.' not acceptable)"));
    }

    #[test]
    fn invalid_value() {
        use crate::Error;

        let got = body(&["1\tS1\tY\tY\tL1\ta.bam\t.", "1\tS2\tMaybe\tN\tL1\tb.bam\t."]).unwrap();

        assert!(matches!(got.validate(&rules()), Err(Error::Validation(ref msg))
            if msg == "Metadata item 'Normal_Tissue' has an invalid value of 'Maybe' on line 5"));
    }

    #[test]
    fn limit_reached_same_sample_twice() {
        // Two rows of one sample count once
        let got = body(&[
            "1\tS1\tY\tY\tL1\ta.bam\t.",
            "1\tS1\tY\tY\tL2\tb.bam\t.",
            "1\tS2\tN\tN\tL1\tc.bam\t.",
        ]).unwrap();

        assert!(got.validate(&rules()).is_ok());
    }

    #[test]
    fn limit_exceeded() {
        use crate::Error;

        let got = body(&[
            "1\tS1\tY\tY\tL1\ta.bam\t.",
            "1\tS2\tN\tY\tL1\tb.bam\t.",
        ]).unwrap();

        assert!(matches!(got.validate(&rules()), Err(Error::Validation(ref msg))
            if msg == "Only 1 sample(s) with a value of 'Y' is allowed in column 'Group_Control' when rows grouped by 'Group_ID'"));
    }

    #[test]
    fn lone_limit_is_config_error() {
        use crate::Error;

        let mut rules = rules();
        rules.validate.insert("Library".to_string(), vec![
            super::ValueRule { value: "L1".to_string(), limit: Some(2), limit_by: None },
        ]);
        let got = body(&["1\tS1\tY\tY\tL1\ta.bam\t."]).unwrap();

        assert!(matches!(got.validate(&rules), Err(Error::Config(ref msg)) if msg.contains("body.validate.Library")));
    }

    #[test]
    fn duplicate_file() {
        use crate::Error;

        let got = body(&[
            "1\tS1\tY\tY\tL1\ta_1.fq\ta_2.fq",
            "2\tS2\tY\tY\tL1\tb_1.fq\ta_2.fq",
        ]).unwrap();

        assert!(matches!(got.validate(&rules()), Err(Error::Validation(ref msg))
            if msg == "Metadata item 'File_2' has a duplicate value of 'a_2.fq' on line 5"));
    }

    #[test]
    fn duplicate_file_across_columns() {
        use crate::Error;

        let got = body(&[
            "1\tS1\tY\tY\tL1\ta_1.fq\ta_2.fq",
            "2\tS2\tY\tY\tL1\ta_1.fq\tb_2.fq",
        ]).unwrap();
        assert!(matches!(got.validate(&rules()), Err(Error::Validation(ref msg))
            if msg == "Metadata item 'File' has a duplicate value of 'a_1.fq' on line 5"));

        let got = body(&[
            "1\tS1\tY\tY\tL1\ta_1.fq\ta_2.fq",
            "2\tS2\tY\tY\tL1\ta_2.fq\t.",
        ]).unwrap();
        assert!(matches!(got.validate(&rules()), Err(Error::Validation(ref msg))
            if msg == "Metadata item 'File' has a duplicate value of 'a_2.fq' on line 5"));

        let got = body(&["1\tS1\tY\tY\tL1\ta.fq\ta.fq"]).unwrap();
        assert!(matches!(got.validate(&rules()), Err(Error::Validation(ref msg))
            if msg == "Metadata item 'File_2' has a duplicate value of 'a.fq' on line 4"));
    }

    #[test]
    fn blank_lines_keep_line_numbers() {
        use super::Body;
        use crate::Error;

        let data = PREAMBLE.to_string() + "\n" + HEADINGS
            + "1\tS1\tY\tY\tL1\ta.bam\t.\n\n"
            + "1\tS2\tMaybe\tN\tL1\tb.bam\t.\n";
        let got = Body::parse(data.as_bytes(), std::path::Path::new("/data"), &rules()).unwrap();

        assert_eq!(got.offset(), 4);
        assert!(matches!(got.validate(&rules()), Err(Error::Validation(ref msg))
            if msg == "Metadata item 'Normal_Tissue' has an invalid value of 'Maybe' on line 7"));
    }

    #[test]
    fn bad_extension() {
        use crate::Error;

        let got = body(&["1\tS1\tY\tY\tL1\ta.cram\t."]).unwrap();

        assert!(matches!(got.validate(&rules()), Err(Error::Validation(ref msg))
            if msg == "File extension of '.cram' is not valid, 'File' on line 4"));
    }

    #[test]
    fn mismatched_extensions() {
        use crate::Error;

        let got = body(&["1\tS1\tY\tY\tL1\ta_1.fq\ta_2.fq.gz"]).unwrap();

        assert!(matches!(got.validate(&rules()), Err(Error::Validation(ref msg))
            if msg == "File extensions for same row must match, '.fq' vs '.fq.gz' on line 4"));
    }

    #[test]
    fn write_ordered_rows() {
        let got = body(&["1\tS1\tY\tY\tL1\ta.bam"]).unwrap();

        let mut tsv: Vec<u8> = Vec::new();
        let for_json = got.write(Some(&mut tsv as &mut dyn std::io::Write), &rules()).unwrap();

        assert_eq!(String::from_utf8(tsv).unwrap(), HEADINGS.to_string() + "1\tS1\tY\tY\tL1\ta.bam\t.\n");
        assert_eq!(for_json.len(), 1);
        assert_eq!(for_json[0]["Sample"], "S1");
        assert_eq!(got.write(None, &rules()).unwrap(), for_json);
    }
}
