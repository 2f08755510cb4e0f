use crate::curriculum;
use crate::error::{AppError, AppResult};
use crate::model::{new_id, normalize_code, now_timestamp, validate_grade_value, Grade, GradeInput, Student};
use crate::students;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

const GRADE_COLUMNS: &str =
    "id, student_id, subject_id, class_name, learning_objective_id, value, created_at, updated_at";

fn grade_from_row(r: &Row<'_>) -> rusqlite::Result<Grade> {
    Ok(Grade {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_id: r.get(2)?,
        class_name: r.get(3)?,
        objective_id: r.get(4)?,
        value: r.get(5)?,
        created_at: r.get(6)?,
        updated_at: r.get(7)?,
    })
}

/// Natural key of a grade; at most one grade exists per key.
#[derive(Debug, Clone, Copy)]
pub struct GradeKey<'a> {
    pub student_id: &'a str,
    pub subject_id: &'a str,
    pub class_name: &'a str,
    pub objective_id: &'a str,
}

pub fn find_grade(conn: &Connection, key: GradeKey<'_>) -> AppResult<Option<Grade>> {
    let sql = format!(
        "SELECT {GRADE_COLUMNS} FROM grades
         WHERE student_id = ? AND subject_id = ? AND class_name = ? AND learning_objective_id = ?"
    );
    Ok(conn
        .query_row(
            &sql,
            (
                key.student_id,
                key.subject_id,
                key.class_name,
                key.objective_id,
            ),
            grade_from_row,
        )
        .optional()?)
}

/// Insert-or-update keyed on (student, subject, class, objective). The store's
/// unique constraint makes concurrent upserts of the same key converge.
pub fn upsert_grade(conn: &Connection, input: GradeInput) -> AppResult<Grade> {
    let value = validate_grade_value(input.value)?;
    let class_name = normalize_code(&input.class_name, "className")?;
    students::get_student(conn, &input.student_id)?;
    curriculum::get_subject(conn, &input.subject_id)?;
    curriculum::get_objective(conn, &input.objective_id)?;

    let now = now_timestamp();
    conn.execute(
        "INSERT INTO grades(id, student_id, subject_id, class_name, learning_objective_id, value, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, subject_id, class_name, learning_objective_id) DO UPDATE SET
           value = excluded.value,
           updated_at = excluded.updated_at",
        (
            new_id(),
            &input.student_id,
            &input.subject_id,
            &class_name,
            &input.objective_id,
            value,
            &now,
            &now,
        ),
    )?;

    find_grade(
        conn,
        GradeKey {
            student_id: &input.student_id,
            subject_id: &input.subject_id,
            class_name: &class_name,
            objective_id: &input.objective_id,
        },
    )?
    .ok_or_else(|| AppError::not_found("grade not found after upsert"))
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentGrade {
    pub student: Student,
    pub grade: Option<Grade>,
}

/// Every student of the class in name order, paired with its grade for one
/// subject objective (or none).
pub fn grades_by_criteria(
    conn: &Connection,
    subject_id: &str,
    class_name: &str,
    objective_id: &str,
) -> AppResult<Vec<StudentGrade>> {
    let class_name = class_name.trim().to_uppercase();
    let roster = students::students_in_class(conn, &class_name)?;
    let mut out = Vec::with_capacity(roster.len());
    for student in roster {
        let grade = find_grade(
            conn,
            GradeKey {
                student_id: &student.id,
                subject_id,
                class_name: &class_name,
                objective_id,
            },
        )?;
        out.push(StudentGrade { student, grade });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::students::tests::new_student;

    struct Fixture {
        student_id: String,
        subject_id: String,
        objective_id: String,
    }

    fn fixture(conn: &Connection) -> Fixture {
        let st = students::create_student(conn, new_student("Ani", "N1", "X1")).unwrap();
        let su = curriculum::create_subject(conn, "Matematika").unwrap();
        let ob = curriculum::create_objective(conn, "Pecahan").unwrap();
        Fixture {
            student_id: st.id,
            subject_id: su.id,
            objective_id: ob.id,
        }
    }

    fn input(f: &Fixture, class_name: &str, value: f64) -> GradeInput {
        GradeInput {
            student_id: f.student_id.clone(),
            subject_id: f.subject_id.clone(),
            class_name: class_name.to_string(),
            objective_id: f.objective_id.clone(),
            value,
        }
    }

    #[test]
    fn upsert_converges_to_one_record_holding_last_value() {
        let conn = crate::db::open_memory();
        let f = fixture(&conn);

        let first = upsert_grade(&conn, input(&f, "x1", 70.0)).unwrap();
        let second = upsert_grade(&conn, input(&f, "X1", 95.5)).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.value, 95.5);
        assert_eq!(second.class_name, "X1");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM grades", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn upsert_validates_value_and_references() {
        let conn = crate::db::open_memory();
        let f = fixture(&conn);
        assert!(matches!(
            upsert_grade(&conn, input(&f, "X1", 101.0)),
            Err(AppError::Validation(_))
        ));
        let mut bad = input(&f, "X1", 50.0);
        bad.objective_id = "missing".into();
        assert!(matches!(upsert_grade(&conn, bad), Err(AppError::NotFound(_))));
    }

    #[test]
    fn grades_by_criteria_lists_whole_class() {
        let conn = crate::db::open_memory();
        let f = fixture(&conn);
        students::create_student(&conn, new_student("Budi", "N2", "X1")).unwrap();
        upsert_grade(&conn, input(&f, "X1", 80.0)).unwrap();

        let rows = grades_by_criteria(&conn, &f.subject_id, "x1", &f.objective_id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].student.name, "Ani");
        assert_eq!(rows[0].grade.as_ref().map(|g| g.value), Some(80.0));
        assert!(rows[1].grade.is_none());
    }
}
