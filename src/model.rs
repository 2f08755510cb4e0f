use crate::error::{AppError, AppResult};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "Laki-laki")]
    Male,
    #[serde(rename = "Perempuan")]
    Female,
}

impl Gender {
    pub const LABELS: [&'static str; 2] = ["Laki-laki", "Perempuan"];

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "Laki-laki",
            Gender::Female => "Perempuan",
        }
    }

    /// Exact label match; surrounding whitespace is ignored, case is not.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Laki-laki" => Some(Gender::Male),
            "Perempuan" => Some(Gender::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StudentStatus {
    #[default]
    #[serde(rename = "Aktif")]
    Active,
    #[serde(rename = "Tidak Aktif")]
    Inactive,
}

impl StudentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StudentStatus::Active => "Aktif",
            StudentStatus::Inactive => "Tidak Aktif",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Aktif" => Some(StudentStatus::Active),
            "Tidak Aktif" => Some(StudentStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub nis: String,
    pub class_name: String,
    pub gender: Gender,
    pub status: StudentStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub name: String,
    pub nis: String,
    pub class_name: String,
    pub gender: Gender,
    #[serde(default)]
    pub status: Option<StudentStatus>,
}

/// Partial update: only fields that are present get validated and written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub name: Option<String>,
    pub nis: Option<String>,
    pub class_name: Option<String>,
    pub gender: Option<Gender>,
    pub status: Option<StudentStatus>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.nis.is_none()
            && self.class_name.is_none()
            && self.gender.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningObjective {
    pub id: String,
    pub text: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectClassObjective {
    pub id: String,
    pub subject_id: String,
    pub class_name: String,
    pub objective_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoInput {
    pub subject_id: String,
    pub class_name: String,
    #[serde(default)]
    pub objective_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub class_name: String,
    pub objective_id: String,
    pub value: f64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeInput {
    pub student_id: String,
    pub subject_id: String,
    pub class_name: String,
    pub objective_id: String,
    pub value: f64,
}

/// Checks the `gender` and `status` labels of a raw student payload, so an
/// unknown label is reported as invalid data rather than a malformed request.
/// Absent and null fields are left to the typed decoding.
pub fn check_student_labels(fields: &serde_json::Value) -> AppResult<()> {
    let label = move |key: &str| fields.get(key).filter(|v| !v.is_null());
    if let Some(raw) = label("gender") {
        if raw.as_str().and_then(Gender::parse).is_none() {
            return Err(AppError::validation(format!(
                "gender must be {} or {}, got {raw}",
                Gender::LABELS[0],
                Gender::LABELS[1]
            )));
        }
    }
    if let Some(raw) = label("status") {
        if raw.as_str().and_then(StudentStatus::parse).is_none() {
            return Err(AppError::validation(format!(
                "status must be {} or {}, got {raw}",
                StudentStatus::Active.as_str(),
                StudentStatus::Inactive.as_str()
            )));
        }
    }
    Ok(())
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Word-wise title case: a letter is uppercased when the character before it
/// is not a cased letter, and lowercased otherwise ("o'neil 2nd" -> "O'Neil 2Nd").
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_cased = false;
    for c in raw.chars() {
        let cased = c.is_uppercase() || c.is_lowercase();
        if cased && !prev_cased {
            out.extend(c.to_uppercase());
        } else if cased {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        prev_cased = cased;
    }
    out
}

fn required_trimmed<'a>(raw: &'a str, field: &str) -> AppResult<&'a str> {
    let v = raw.trim();
    if v.is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    Ok(v)
}

pub fn normalize_person_name(raw: &str, field: &str) -> AppResult<String> {
    Ok(title_case(required_trimmed(raw, field)?))
}

/// Registration numbers and class labels are compared and stored uppercased.
pub fn normalize_code(raw: &str, field: &str) -> AppResult<String> {
    Ok(required_trimmed(raw, field)?.to_uppercase())
}

pub fn normalize_text(raw: &str, field: &str) -> AppResult<String> {
    Ok(required_trimmed(raw, field)?.to_string())
}

pub fn validate_grade_value(value: f64) -> AppResult<f64> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(AppError::validation(format!(
            "grade value must be between 0 and 100, got {value}"
        )));
    }
    Ok(value)
}
