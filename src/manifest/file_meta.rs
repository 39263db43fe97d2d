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
use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;

use crate::error::Error;
use crate::error::Result;
use crate::manifest::FILE_COLUMNS;
use crate::manifest::PLACEHOLDER;

/// One row of the manifest file table.
///
/// `attributes` maps column headings to the row's values in heading order.
/// File names are relative to the directory of the manifest, `rel_path`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileEntry {
    pub rel_path: PathBuf,
    pub attributes: IndexMap<String, String>,
}

impl FileEntry {
    /// Pair the `details` of the row at `line` with `headings`.
    ///
    /// A row that is one column short gets `.` for a trailing `File_2`, and
    /// an empty `File_2` is stored as `.`.
    ///
    /// ## Errors
    ///
    /// Returns [Error::Validation] if any other column is missing.
    pub fn new(
        headings: &[String],
        details: &[&str],
        rel_path: &Path,
        line: usize,
    ) -> Result<Self> {
        let mut attributes: IndexMap<String, String> = IndexMap::with_capacity(headings.len());
        for (idx, heading) in headings.iter().enumerate() {
            let value = match details.get(idx).copied() {
                Some(value) if heading == "File_2" && value.is_empty() => PLACEHOLDER,
                Some(value) => value,
                None if idx == details.len() && heading == "File_2" => PLACEHOLDER,
                None => {
                    return Err(Error::Validation(format!(
                        "Row on line {} has {} columns, expected {} ({})",
                        line, details.len(), headings.len(), headings.join(", ")
                    )));
                },
            };
            attributes.insert(heading.clone(), value.to_string());
        }
        Ok(Self { rel_path: rel_path.to_path_buf(), attributes })
    }

    /// Value of `column`, None if the table has no such column.
    pub fn attribute(
        &self,
        column: &str,
    ) -> Option<&str> {
        self.attributes.get(column).map(String::as_str)
    }

    /// Path of the file in `column` relative to the manifest.
    ///
    /// Returns None for the `.` placeholder and for absent columns.
    pub fn get_path(
        &self,
        column: &str,
    ) -> Option<PathBuf> {
        match self.attribute(column) {
            None | Some(PLACEHOLDER) => None,
            Some(item) => Some(self.rel_path.join(item)),
        }
    }

    /// Check that the files of this row exist and are not empty.
    ///
    /// `File` is always checked, `File_2` only when it is not `.`.
    pub fn test_files(
        &self,
        line: usize,
    ) -> Result<()> {
        for column in FILE_COLUMNS {
            let item = self.attribute(column).unwrap_or(PLACEHOLDER);
            let full_path = match self.get_path(column) {
                Some(path) => path,
                None if column == "File_2" => continue,
                None => {
                    return Err(Error::FileValidation(format!(
                        "'{}' is not a file ('{}' - line {}).", item, column, line
                    )));
                },
            };
            log::debug!("Checking {}", full_path.display());
            if !full_path.is_file() {
                return Err(Error::FileValidation(format!(
                    "'{}' is not a file ('{}' - line {}).", item, column, line
                )));
            }
            let size = std::fs::metadata(&full_path).map_err(|e| Error::io(&full_path, e))?.len();
            if size == 0 {
                return Err(Error::FileValidation(format!(
                    "'{}' is an empty file ('{}' - line {}).", item, column, line
                )));
            }
        }
        Ok(())
    }
}

// Tests
#[cfg(test)]
mod tests {

    fn headings() -> Vec<String> {
        ["Group_ID", "Sample", "Normal_Tissue", "Group_Control", "Library", "File", "File_2"]
            .iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn file_absent() {
        use super::FileEntry;
        use crate::Error;
        use std::path::Path;

        let details = ["1", "Start", "Y", "Y", "1", "bello.bam"];
        let entry = FileEntry::new(&headings(), &details, Path::new("/"), 1).unwrap();
        let got = entry.test_files(1);

        assert!(matches!(got, Err(Error::FileValidation(ref msg)) if msg.contains("is not a file")));
    }

    #[test]
    fn file_empty() {
        use super::FileEntry;
        use crate::Error;

        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("bello.bam")).unwrap();

        let details = ["1", "Start", "Y", "Y", "1", "bello.bam"];
        let entry = FileEntry::new(&headings(), &details, dir.path(), 1).unwrap();
        let got = entry.test_files(1);

        assert!(matches!(got, Err(Error::FileValidation(ref msg)) if msg.contains("empty file")));
    }

    #[test]
    fn file_present() {
        use super::FileEntry;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("r_1.fq"), "@r/1\nA\n+\nI\n").unwrap();
        std::fs::write(dir.path().join("r_2.fq"), "@r/2\nA\n+\nI\n").unwrap();

        let details = ["1", "Start", "Y", "Y", "1", "r_1.fq", "r_2.fq"];
        let entry = FileEntry::new(&headings(), &details, dir.path(), 1).unwrap();

        assert!(entry.test_files(1).is_ok());
    }

    #[test]
    fn get_path() {
        use super::FileEntry;
        use std::path::{Path, PathBuf};

        let details = ["1", "Start", "Y", "Y", "1", "bello.bam", "."];
        let entry = FileEntry::new(&headings(), &details, Path::new("/"), 1).unwrap();

        assert_eq!(entry.get_path("File"), Some(PathBuf::from("/bello.bam")));
        assert_eq!(entry.get_path("File_2"), None);
    }

    #[test]
    fn missing_file_2_is_placeholder() {
        use super::FileEntry;
        use std::path::Path;

        let details = ["1", "Start", "Y", "Y", "1", "bello.bam"];
        let entry = FileEntry::new(&headings(), &details, Path::new("/"), 1).unwrap();

        assert_eq!(entry.attribute("File_2"), Some("."));
    }

    #[test]
    fn short_row() {
        use super::FileEntry;
        use crate::Error;
        use std::path::Path;

        let details = ["1", "Start", "Y"];
        let got = FileEntry::new(&headings(), &details, Path::new("/"), 12);

        assert!(matches!(got, Err(Error::Validation(ref msg)) if msg.contains("line 12")));
    }
}
