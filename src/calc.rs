use crate::curriculum;
use crate::error::AppResult;
use crate::model::{Student, SubjectClassObjective};
use crate::students;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

/// Rounds to 2 decimals; exact ties go to the even neighbour (80.125 -> 80.12).
pub fn round_off_2_decimals(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

/// Mean over entered values only. Returns `(average, entered_count)`; the
/// average is 0 when nothing was entered.
pub fn entered_average<I>(values: I) -> (f64, usize)
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values.into_iter().flatten() {
        sum += v;
        count += 1;
    }
    if count == 0 {
        return (0.0, 0);
    }
    (round_off_2_decimals(sum / count as f64), count)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeCell {
    pub subject: String,
    pub objective: String,
    pub value: Option<f64>,
}

impl GradeCell {
    /// Export column label of this cell.
    pub fn column_label(&self) -> String {
        format!("{} - {}", self.subject, self.objective)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub student: Student,
    pub grades: Vec<GradeCell>,
    /// 0 doubles as "no grades entered"; `graded_count` tells the two apart.
    pub average: f64,
    pub graded_count: usize,
}

/// Everything the aggregation needs, already fetched from the store.
#[derive(Debug, Clone, Default)]
pub struct ReportInputs {
    pub students: Vec<Student>,
    pub scos: Vec<SubjectClassObjective>,
    pub subject_names: HashMap<String, String>,
    pub objective_texts: HashMap<String, String>,
    /// Grade values of the class keyed by (student, subject, objective).
    pub grades: HashMap<(String, String, String), f64>,
}

/// One row per student; cells follow configuration order, then objective
/// list order. Unknown subject/objective ids label their cells with "".
pub fn build_report(inputs: &ReportInputs) -> Vec<ReportRow> {
    let mut rows = Vec::with_capacity(inputs.students.len());
    for student in &inputs.students {
        let mut cells = Vec::new();
        for sco in &inputs.scos {
            let subject = inputs
                .subject_names
                .get(&sco.subject_id)
                .cloned()
                .unwrap_or_default();
            for objective_id in &sco.objective_ids {
                let key = (
                    student.id.clone(),
                    sco.subject_id.clone(),
                    objective_id.clone(),
                );
                cells.push(GradeCell {
                    subject: subject.clone(),
                    objective: inputs
                        .objective_texts
                        .get(objective_id)
                        .cloned()
                        .unwrap_or_default(),
                    value: inputs.grades.get(&key).copied(),
                });
            }
        }
        let (average, graded_count) = entered_average(cells.iter().map(|c| c.value));
        rows.push(ReportRow {
            student: student.clone(),
            grades: cells,
            average,
            graded_count,
        });
    }
    rows
}

fn load_report_inputs(conn: &Connection, class_name: &str) -> AppResult<ReportInputs> {
    let students = students::students_in_class(conn, class_name)?;
    if students.is_empty() {
        return Ok(ReportInputs::default());
    }
    let scos = curriculum::scos_for_class(conn, class_name)?;

    let mut subject_names = HashMap::new();
    let mut objective_texts = HashMap::new();
    for sco in &scos {
        if !subject_names.contains_key(&sco.subject_id) {
            if let Some(s) = curriculum::find_subject(conn, &sco.subject_id)? {
                subject_names.insert(s.id, s.name);
            }
        }
        for id in &sco.objective_ids {
            if !objective_texts.contains_key(id) {
                if let Some(o) = curriculum::find_objective(conn, id)? {
                    objective_texts.insert(o.id, o.text);
                }
            }
        }
    }

    // One pass over the class's grades instead of a lookup per cell.
    let mut stmt = conn.prepare(
        "SELECT student_id, subject_id, learning_objective_id, value
         FROM grades
         WHERE class_name = ?",
    )?;
    let grades = stmt
        .query_map([class_name], |r| {
            Ok((
                (r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?),
                r.get::<_, f64>(3)?,
            ))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;

    Ok(ReportInputs {
        students,
        scos,
        subject_names,
        objective_texts,
        grades,
    })
}

/// Grade report of a class. An unknown class yields an empty report.
pub fn class_grade_report(conn: &Connection, class_name: &str) -> AppResult<Vec<ReportRow>> {
    let class_name = class_name.trim().to_uppercase();
    let inputs = load_report_inputs(conn, &class_name)?;
    Ok(build_report(&inputs))
}
