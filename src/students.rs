use crate::error::{AppError, AppResult};
use crate::model::{
    new_id, normalize_code, normalize_person_name, now_timestamp, Gender, NewStudent, Student,
    StudentPatch, StudentStatus,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};

const STUDENT_COLUMNS: &str =
    "id, name, nis, class_name, gender, status, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct StudentQuery {
    pub search: Option<String>,
    pub class_name: Option<String>,
}

fn label<T>(idx: usize, raw: String, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown label {raw:?}").into(),
        )
    })
}

pub(crate) fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        nis: r.get(2)?,
        class_name: r.get(3)?,
        gender: label(4, r.get(4)?, Gender::parse)?,
        status: label(5, r.get(5)?, StudentStatus::parse)?,
        created_at: r.get(6)?,
        updated_at: r.get(7)?,
    })
}

pub fn find_by_nis(conn: &Connection, nis: &str) -> AppResult<Option<Student>> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE nis = ?");
    Ok(conn
        .query_row(&sql, [nis.trim().to_uppercase()], student_from_row)
        .optional()?)
}

pub fn get_student(conn: &Connection, student_id: &str) -> AppResult<Student> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?");
    conn.query_row(&sql, [student_id], student_from_row)
        .optional()?
        .ok_or_else(|| AppError::not_found("student not found"))
}

pub fn create_student(conn: &Connection, input: NewStudent) -> AppResult<Student> {
    let now = now_timestamp();
    let student = Student {
        id: new_id(),
        name: normalize_person_name(&input.name, "name")?,
        nis: normalize_code(&input.nis, "nis")?,
        class_name: normalize_code(&input.class_name, "className")?,
        gender: input.gender,
        status: input.status.unwrap_or_default(),
        created_at: now.clone(),
        updated_at: now,
    };

    if find_by_nis(conn, &student.nis)?.is_some() {
        return Err(AppError::conflict(format!(
            "student with NIS {} already exists",
            student.nis
        )));
    }

    conn.execute(
        "INSERT INTO students(id, name, nis, class_name, gender, status, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &student.id,
            &student.name,
            &student.nis,
            &student.class_name,
            student.gender.as_str(),
            student.status.as_str(),
            &student.created_at,
            &student.updated_at,
        ),
    )?;
    tracing::info!(student_id = %student.id, nis = %student.nis, "student created");
    Ok(student)
}

pub fn list_students(conn: &Connection, query: &StudentQuery) -> AppResult<Vec<Student>> {
    let class_name = query
        .class_name
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_uppercase);

    let students = match class_name {
        Some(class_name) => students_in_class(conn, &class_name)?,
        None => {
            let sql = format!("SELECT {STUDENT_COLUMNS} FROM students ORDER BY name, rowid");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], student_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };

    let needle = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    let Some(needle) = needle else {
        return Ok(students);
    };
    Ok(students
        .into_iter()
        .filter(|s| {
            s.name.to_lowercase().contains(&needle) || s.nis.to_lowercase().contains(&needle)
        })
        .collect())
}

/// Students of one class in name order; insertion order breaks ties.
pub fn students_in_class(conn: &Connection, class_name: &str) -> AppResult<Vec<Student>> {
    let sql = format!(
        "SELECT {STUDENT_COLUMNS} FROM students WHERE class_name = ? ORDER BY name, rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([class_name], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_student(
    conn: &Connection,
    student_id: &str,
    patch: StudentPatch,
) -> AppResult<Student> {
    let mut student = get_student(conn, student_id)?;
    if patch.is_empty() {
        return Ok(student);
    }

    if let Some(name) = patch.name.as_deref() {
        student.name = normalize_person_name(name, "name")?;
    }
    if let Some(nis) = patch.nis.as_deref() {
        let nis = normalize_code(nis, "nis")?;
        if let Some(other) = find_by_nis(conn, &nis)? {
            if other.id != student.id {
                return Err(AppError::conflict(format!(
                    "student with NIS {nis} already exists"
                )));
            }
        }
        student.nis = nis;
    }
    if let Some(class_name) = patch.class_name.as_deref() {
        student.class_name = normalize_code(class_name, "className")?;
    }
    if let Some(gender) = patch.gender {
        student.gender = gender;
    }
    if let Some(status) = patch.status {
        student.status = status;
    }
    student.updated_at = now_timestamp();

    conn.execute(
        "UPDATE students
         SET name = ?, nis = ?, class_name = ?, gender = ?, status = ?, updated_at = ?
         WHERE id = ?",
        (
            &student.name,
            &student.nis,
            &student.class_name,
            student.gender.as_str(),
            student.status.as_str(),
            &student.updated_at,
            &student.id,
        ),
    )?;
    Ok(student)
}

/// Distinct class labels across all students, sorted.
pub fn class_list(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT class_name FROM students ORDER BY class_name")?;
    let rows = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
