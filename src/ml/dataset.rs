use crate::ml::error::{ArtifactError, ArtifactResult};
use crate::models::ComplaintRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const COMPLAINT_TEXT: &str = "Complaint Text";
pub const COMPLAINT_TYPE: &str = "Complaint Type";
pub const RESOLUTION_DESCRIPTION: &str = "Resolution Description";
pub const RESOLUTION_TIME: &str = "Complaint Resolution Time";
pub const FACULTY_DEPARTMENT: &str = "Faculty Department";
pub const COURSE_CODE: &str = "Course Code";
pub const SEMESTER: &str = "Semester";

/// Read-only tabular reference dataset
#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    name: String,
    headers: Vec<String>,
    columns: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

/// A resolved complaint row
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRow<'a> {
    pub complaint_type: &'a str,
    pub complaint_text: &'a str,
    pub resolution_description: &'a str,
    pub resolution_days: Option<u32>,
}

/// Shape of a loaded dataset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetInfo {
    pub name: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

impl ReferenceDataset {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let columns = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| (header.clone(), idx))
            .collect();
        Self {
            name: name.into(),
            headers,
            columns,
            rows,
        }
    }

    /// Load a CSV file with a header row
    pub fn load(name: &str, path: &Path) -> ArtifactResult<Self> {
        if !path.exists() {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| ArtifactError::corrupt(path, e))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ArtifactError::corrupt(path, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ArtifactError::corrupt(path, e))?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self::new(name, headers, rows))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Cell value; empty for unknown columns
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = *self.columns.get(column)?;
        self.rows.get(row).and_then(|r| r.get(idx)).map(String::as_str)
    }

    /// All values of a column in row order, `None` if the column is absent
    pub fn column_values(&self, column: &str) -> Option<Vec<String>> {
        let idx = *self.columns.get(column)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).cloned().unwrap_or_default())
                .collect(),
        )
    }

    /// Resolved-complaint view of a row
    pub fn resolved_row(&self, row: usize) -> Option<ResolvedRow<'_>> {
        if row >= self.rows.len() {
            return None;
        }
        let cell = |column: &str| self.get(row, column).unwrap_or("");
        Some(ResolvedRow {
            complaint_type: cell(COMPLAINT_TYPE),
            complaint_text: cell(COMPLAINT_TEXT),
            resolution_description: cell(RESOLUTION_DESCRIPTION),
            resolution_days: parse_days(cell(RESOLUTION_TIME)),
        })
    }

    /// Rows as complaint records (rows without text are skipped)
    pub fn complaint_records(&self) -> Vec<ComplaintRecord> {
        let optional = |row: usize, column: &str| {
            self.get(row, column)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        (0..self.rows.len())
            .filter_map(|row| {
                let text = optional(row, COMPLAINT_TEXT)?;
                Some(ComplaintRecord {
                    text,
                    category: optional(row, COMPLAINT_TYPE),
                    department: optional(row, FACULTY_DEPARTMENT),
                    course_code: optional(row, COURSE_CODE),
                    semester: optional(row, SEMESTER),
                })
            })
            .collect()
    }

    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            name: self.name.clone(),
            rows: self.rows.len(),
            columns: self.headers.clone(),
        }
    }
}

/// Whole days from a recorded duration; blank, negative or unparseable values are absent
fn parse_days(value: &str) -> Option<u32> {
    let days: f64 = value.trim().parse().ok()?;
    if !days.is_finite() || days < 0.0 || days > f64::from(u32::MAX) {
        return None;
    }
    Some(days.trunc() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESOLVED_CSV: &str = "\
Complaint Text,Complaint Type,Resolution Description,Complaint Resolution Time
\"Marked absent, but I was present\",Absentee Error,Attendance corrected,3.0
Internal marks total is wrong,Incorrect Calculation,Recomputed total,
Grade missing for CS101,Missing Grade,Grade uploaded,4.7
";

    fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_and_resolved_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "resolved.csv", RESOLVED_CSV);
        let dataset = ReferenceDataset::load("resolved_complaints", &path).unwrap();

        assert_eq!(dataset.len(), 3);
        assert!(dataset.has_column(COMPLAINT_TEXT));

        let row = dataset.resolved_row(0).unwrap();
        assert_eq!(row.complaint_text, "Marked absent, but I was present");
        assert_eq!(row.complaint_type, "Absentee Error");
        assert_eq!(row.resolution_days, Some(3));

        assert_eq!(dataset.resolved_row(1).unwrap().resolution_days, None);
        assert_eq!(dataset.resolved_row(2).unwrap().resolution_days, Some(4));
        assert!(dataset.resolved_row(3).is_none());
    }

    #[test]
    fn test_info_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "resolved.csv", RESOLVED_CSV);
        let dataset = ReferenceDataset::load("resolved_complaints", &path).unwrap();

        let info = dataset.info();
        assert_eq!(info.rows, 3);
        assert_eq!(info.columns.len(), 4);
        assert_eq!(info.columns[3], RESOLUTION_TIME);

        let texts = dataset.column_values(COMPLAINT_TEXT).unwrap();
        assert_eq!(texts[2], "Grade missing for CS101");
        assert!(dataset.column_values("Student Year").is_none());
    }

    #[test]
    fn test_short_rows_are_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "complaints.csv",
            "Complaint Text,Complaint Type,Faculty Department\nTotal is wrong,Marks Mismatch\n,Missing Grade,EE\n",
        );
        let dataset = ReferenceDataset::load("complaints", &path).unwrap();
        assert_eq!(dataset.get(0, FACULTY_DEPARTMENT), Some(""));

        let records = dataset.complaint_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category.as_deref(), Some("Marks Mismatch"));
        assert_eq!(records[0].department, None);
    }

    #[test]
    fn test_ragged_rows_built_in_memory() {
        let dataset = ReferenceDataset::new(
            "resolved",
            vec![COMPLAINT_TEXT.to_string(), RESOLUTION_TIME.to_string()],
            vec![vec!["marks missing".to_string()], Vec::new()],
        );

        assert_eq!(
            dataset.column_values(RESOLUTION_TIME).unwrap(),
            vec![String::new(), String::new()]
        );
        assert_eq!(
            dataset.column_values(COMPLAINT_TEXT).unwrap(),
            vec!["marks missing".to_string(), String::new()]
        );
        assert_eq!(dataset.resolved_row(1).unwrap().resolution_days, None);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ReferenceDataset::load("complaints", &dir.path().join("none.csv")),
            Err(ArtifactError::NotFound(_))
        ));
    }

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days("7"), Some(7));
        assert_eq!(parse_days(" 2.9 "), Some(2));
        assert_eq!(parse_days("-1"), None);
        assert_eq!(parse_days("n/a"), None);
        assert_eq!(parse_days(""), None);
    }
}
