use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use validator::Validate;

/// Fixed label set produced by the complaint classifier
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, EnumIter, Display,
)]
pub enum ComplaintCategory {
    #[serde(rename = "Marks Mismatch")]
    #[strum(serialize = "Marks Mismatch")]
    MarksMismatch,

    #[serde(rename = "Absentee Error")]
    #[strum(serialize = "Absentee Error")]
    AbsenteeError,

    #[serde(rename = "Missing Grade")]
    #[strum(serialize = "Missing Grade")]
    MissingGrade,

    #[serde(rename = "Calculation Discrepancy")]
    #[strum(serialize = "Calculation Discrepancy")]
    CalculationDiscrepancy,
}

impl ComplaintCategory {
    /// Map a numeric classifier id onto the label set.
    ///
    /// Ids outside the known range fall back to `CalculationDiscrepancy`.
    pub fn from_class_id(id: i64) -> Self {
        match id {
            0 => ComplaintCategory::MarksMismatch,
            1 => ComplaintCategory::AbsenteeError,
            2 => ComplaintCategory::MissingGrade,
            3 => ComplaintCategory::CalculationDiscrepancy,
            _ => ComplaintCategory::CalculationDiscrepancy,
        }
    }

    /// Numeric id used by the classifier artifact
    pub fn class_id(&self) -> i64 {
        match self {
            ComplaintCategory::MarksMismatch => 0,
            ComplaintCategory::AbsenteeError => 1,
            ComplaintCategory::MissingGrade => 2,
            ComplaintCategory::CalculationDiscrepancy => 3,
        }
    }

    /// Resolve a stored category value, which may be either a label or a numeric id
    pub fn from_stored(value: &str) -> Self {
        let value = value.trim();
        if let Ok(category) = value.parse::<ComplaintCategory>() {
            return category;
        }
        value
            .parse::<i64>()
            .map(Self::from_class_id)
            .unwrap_or(ComplaintCategory::CalculationDiscrepancy)
    }
}

/// Complaint record as handed over by the persistence layer
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ComplaintRecord {
    /// Free-text complaint body
    #[validate(length(max = 20000))]
    pub text: String,

    /// Stored category label (if already classified)
    #[serde(default)]
    pub category: Option<String>,

    /// Faculty department handling the complaint
    #[serde(default)]
    pub department: Option<String>,

    #[serde(default)]
    pub course_code: Option<String>,

    #[serde(default)]
    pub semester: Option<String>,
}

impl ComplaintRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_course(mut self, course_code: impl Into<String>, semester: impl Into<String>) -> Self {
        self.course_code = Some(course_code.into());
        self.semester = Some(semester.into());
        self
    }

    /// Department or empty string when unknown
    pub fn department_or_empty(&self) -> &str {
        self.department.as_deref().unwrap_or("")
    }
}

/// Resolution metadata scored by the anomaly detector
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ResolutionRecord {
    /// Days taken to resolve the complaint
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub resolution_time_days: Option<f64>,

    #[serde(default)]
    pub student_program: String,

    #[serde(default)]
    pub faculty_department: String,
}

impl ResolutionRecord {
    pub fn new(
        resolution_time_days: f64,
        student_program: impl Into<String>,
        faculty_department: impl Into<String>,
    ) -> Self {
        Self {
            resolution_time_days: Some(resolution_time_days),
            student_program: student_program.into(),
            faculty_department: faculty_department.into(),
        }
    }
}
