//! Subjects, learning objectives and the per-class objective configurations
//! (SCOs) that bind them together.

use crate::error::{AppError, AppResult};
use crate::model::{
    new_id, normalize_code, normalize_person_name, normalize_text, now_timestamp,
    LearningObjective, ScoInput, Subject, SubjectClassObjective,
};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashSet;

fn subject_from_row(r: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: r.get(0)?,
        name: r.get(1)?,
        created_at: r.get(2)?,
        updated_at: r.get(3)?,
    })
}

fn objective_from_row(r: &Row<'_>) -> rusqlite::Result<LearningObjective> {
    Ok(LearningObjective {
        id: r.get(0)?,
        text: r.get(1)?,
        created_at: r.get(2)?,
        updated_at: r.get(3)?,
    })
}

// ---------------------------------------------------------------------------
// Subjects
// ---------------------------------------------------------------------------

pub fn find_subject(conn: &Connection, subject_id: &str) -> AppResult<Option<Subject>> {
    Ok(conn
        .query_row(
            "SELECT id, name, created_at, updated_at FROM subjects WHERE id = ?",
            [subject_id],
            subject_from_row,
        )
        .optional()?)
}

pub fn get_subject(conn: &Connection, subject_id: &str) -> AppResult<Subject> {
    find_subject(conn, subject_id)?.ok_or_else(|| AppError::not_found("subject not found"))
}

fn subject_name_taken(conn: &Connection, name: &str, except_id: Option<&str>) -> AppResult<bool> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM subjects WHERE name = ? AND id != ?",
            (name, except_id.unwrap_or("")),
            |r| r.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

pub fn create_subject(conn: &Connection, name: &str) -> AppResult<Subject> {
    let name = normalize_person_name(name, "name")?;
    if subject_name_taken(conn, &name, None)? {
        return Err(AppError::conflict(format!("subject {name} already exists")));
    }
    let now = now_timestamp();
    let subject = Subject {
        id: new_id(),
        name,
        created_at: now.clone(),
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO subjects(id, name, created_at, updated_at) VALUES(?, ?, ?, ?)",
        (
            &subject.id,
            &subject.name,
            &subject.created_at,
            &subject.updated_at,
        ),
    )?;
    tracing::info!(subject_id = %subject.id, name = %subject.name, "subject created");
    Ok(subject)
}

pub fn list_subjects(conn: &Connection) -> AppResult<Vec<Subject>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, created_at, updated_at FROM subjects ORDER BY name, rowid",
    )?;
    let rows = stmt
        .query_map([], subject_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_subject(conn: &Connection, subject_id: &str, name: &str) -> AppResult<Subject> {
    let mut subject = get_subject(conn, subject_id)?;
    let name = normalize_person_name(name, "name")?;
    if subject_name_taken(conn, &name, Some(subject_id))? {
        return Err(AppError::conflict(format!("subject {name} already exists")));
    }
    subject.name = name;
    subject.updated_at = now_timestamp();
    conn.execute(
        "UPDATE subjects SET name = ?, updated_at = ? WHERE id = ?",
        (&subject.name, &subject.updated_at, &subject.id),
    )?;
    Ok(subject)
}

// ---------------------------------------------------------------------------
// Learning objectives
// ---------------------------------------------------------------------------

pub fn find_objective(conn: &Connection, objective_id: &str) -> AppResult<Option<LearningObjective>> {
    Ok(conn
        .query_row(
            "SELECT id, text, created_at, updated_at FROM learning_objectives WHERE id = ?",
            [objective_id],
            objective_from_row,
        )
        .optional()?)
}

pub fn get_objective(conn: &Connection, objective_id: &str) -> AppResult<LearningObjective> {
    find_objective(conn, objective_id)?
        .ok_or_else(|| AppError::not_found("learning objective not found"))
}

pub fn create_objective(conn: &Connection, text: &str) -> AppResult<LearningObjective> {
    let now = now_timestamp();
    let objective = LearningObjective {
        id: new_id(),
        text: normalize_text(text, "text")?,
        created_at: now.clone(),
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO learning_objectives(id, text, created_at, updated_at) VALUES(?, ?, ?, ?)",
        (
            &objective.id,
            &objective.text,
            &objective.created_at,
            &objective.updated_at,
        ),
    )?;
    tracing::info!(objective_id = %objective.id, "learning objective created");
    Ok(objective)
}

pub fn list_objectives(conn: &Connection) -> AppResult<Vec<LearningObjective>> {
    let mut stmt = conn.prepare(
        "SELECT id, text, created_at, updated_at FROM learning_objectives ORDER BY text, rowid",
    )?;
    let rows = stmt
        .query_map([], objective_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_objective(
    conn: &Connection,
    objective_id: &str,
    text: &str,
) -> AppResult<LearningObjective> {
    let mut objective = get_objective(conn, objective_id)?;
    objective.text = normalize_text(text, "text")?;
    objective.updated_at = now_timestamp();
    conn.execute(
        "UPDATE learning_objectives SET text = ?, updated_at = ? WHERE id = ?",
        (&objective.text, &objective.updated_at, &objective.id),
    )?;
    Ok(objective)
}

// ---------------------------------------------------------------------------
// Subject-class objective configurations
// ---------------------------------------------------------------------------

/// SCO with its subject and objectives resolved, as listed to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoView {
    pub id: String,
    pub subject: Option<Subject>,
    pub class_name: String,
    pub learning_objectives: Vec<LearningObjective>,
    pub created_at: String,
    pub updated_at: String,
}

fn sco_objective_ids(conn: &Connection, sco_id: &str) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT learning_objective_id FROM sco_objectives WHERE sco_id = ? ORDER BY position",
    )?;
    let ids = stmt
        .query_map([sco_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn load_scos(conn: &Connection, where_sql: &str, args: &[&str]) -> AppResult<Vec<SubjectClassObjective>> {
    let sql = format!(
        "SELECT id, subject_id, class_name, created_at, updated_at
         FROM subject_class_objectives
         {where_sql}
         ORDER BY rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let heads = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(heads.len());
    for (id, subject_id, class_name, created_at, updated_at) in heads {
        let objective_ids = sco_objective_ids(conn, &id)?;
        out.push(SubjectClassObjective {
            id,
            subject_id,
            class_name,
            objective_ids,
            created_at,
            updated_at,
        });
    }
    Ok(out)
}

pub fn get_sco(conn: &Connection, sco_id: &str) -> AppResult<SubjectClassObjective> {
    load_scos(conn, "WHERE id = ?", &[sco_id])?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::not_found("subject class configuration not found"))
}

pub fn find_sco_for(
    conn: &Connection,
    subject_id: &str,
    class_name: &str,
) -> AppResult<Option<SubjectClassObjective>> {
    let class_name = class_name.trim().to_uppercase();
    Ok(load_scos(
        conn,
        "WHERE subject_id = ? AND class_name = ?",
        &[subject_id, class_name.as_str()],
    )?
    .into_iter()
    .next())
}

/// Configurations of one class, in creation order.
pub fn scos_for_class(conn: &Connection, class_name: &str) -> AppResult<Vec<SubjectClassObjective>> {
    load_scos(conn, "WHERE class_name = ?", &[class_name])
}

struct ValidSco {
    subject_id: String,
    class_name: String,
    objective_ids: Vec<String>,
}

fn validate_sco(conn: &Connection, input: ScoInput) -> AppResult<ValidSco> {
    let class_name = normalize_code(&input.class_name, "className")?;
    get_subject(conn, &input.subject_id)?;

    let mut seen = HashSet::new();
    let mut objective_ids = Vec::with_capacity(input.objective_ids.len());
    for id in input.objective_ids {
        if !seen.insert(id.clone()) {
            continue;
        }
        if find_objective(conn, &id)?.is_none() {
            return Err(AppError::not_found(format!(
                "learning objective {id} not found"
            )));
        }
        objective_ids.push(id);
    }

    Ok(ValidSco {
        subject_id: input.subject_id,
        class_name,
        objective_ids,
    })
}

fn sco_combination_taken(
    conn: &Connection,
    subject_id: &str,
    class_name: &str,
    except_id: Option<&str>,
) -> AppResult<bool> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM subject_class_objectives
             WHERE subject_id = ? AND class_name = ? AND id != ?",
            (subject_id, class_name, except_id.unwrap_or("")),
            |r| r.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

fn write_sco_objectives(conn: &Connection, sco_id: &str, ids: &[String]) -> AppResult<()> {
    conn.execute("DELETE FROM sco_objectives WHERE sco_id = ?", [sco_id])?;
    let mut stmt = conn.prepare(
        "INSERT INTO sco_objectives(sco_id, position, learning_objective_id) VALUES(?, ?, ?)",
    )?;
    for (pos, id) in ids.iter().enumerate() {
        stmt.execute((sco_id, pos as i64, id))?;
    }
    Ok(())
}

pub fn create_sco(conn: &Connection, input: ScoInput) -> AppResult<SubjectClassObjective> {
    let valid = validate_sco(conn, input)?;
    if sco_combination_taken(conn, &valid.subject_id, &valid.class_name, None)? {
        return Err(AppError::conflict(
            "a configuration for this subject and class already exists",
        ));
    }

    let now = now_timestamp();
    let sco = SubjectClassObjective {
        id: new_id(),
        subject_id: valid.subject_id,
        class_name: valid.class_name,
        objective_ids: valid.objective_ids,
        created_at: now.clone(),
        updated_at: now,
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO subject_class_objectives(id, subject_id, class_name, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?)",
        (
            &sco.id,
            &sco.subject_id,
            &sco.class_name,
            &sco.created_at,
            &sco.updated_at,
        ),
    )?;
    write_sco_objectives(&tx, &sco.id, &sco.objective_ids)?;
    tx.commit()?;

    tracing::info!(
        sco_id = %sco.id,
        class_name = %sco.class_name,
        objectives = sco.objective_ids.len(),
        "subject class configuration created"
    );
    Ok(sco)
}

pub fn update_sco(
    conn: &Connection,
    sco_id: &str,
    input: ScoInput,
) -> AppResult<SubjectClassObjective> {
    let mut sco = get_sco(conn, sco_id)?;
    let valid = validate_sco(conn, input)?;
    if sco_combination_taken(conn, &valid.subject_id, &valid.class_name, Some(sco_id))? {
        return Err(AppError::conflict(
            "a configuration for this subject and class already exists",
        ));
    }

    sco.subject_id = valid.subject_id;
    sco.class_name = valid.class_name;
    sco.objective_ids = valid.objective_ids;
    sco.updated_at = now_timestamp();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE subject_class_objectives
         SET subject_id = ?, class_name = ?, updated_at = ?
         WHERE id = ?",
        (&sco.subject_id, &sco.class_name, &sco.updated_at, &sco.id),
    )?;
    write_sco_objectives(&tx, &sco.id, &sco.objective_ids)?;
    tx.commit()?;
    Ok(sco)
}

pub fn delete_sco(conn: &Connection, sco_id: &str) -> AppResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM sco_objectives WHERE sco_id = ?", [sco_id])?;
    let n = tx.execute("DELETE FROM subject_class_objectives WHERE id = ?", [sco_id])?;
    if n == 0 {
        return Err(AppError::not_found("subject class configuration not found"));
    }
    tx.commit()?;
    tracing::info!(sco_id, "subject class configuration deleted");
    Ok(())
}

pub fn resolve_sco(conn: &Connection, sco: SubjectClassObjective) -> AppResult<ScoView> {
    let subject = find_subject(conn, &sco.subject_id)?;
    let mut learning_objectives = Vec::with_capacity(sco.objective_ids.len());
    for id in &sco.objective_ids {
        if let Some(obj) = find_objective(conn, id)? {
            learning_objectives.push(obj);
        }
    }
    Ok(ScoView {
        id: sco.id,
        subject,
        class_name: sco.class_name,
        learning_objectives,
        created_at: sco.created_at,
        updated_at: sco.updated_at,
    })
}

pub fn list_scos(conn: &Connection) -> AppResult<Vec<ScoView>> {
    load_scos(conn, "", &[])?
        .into_iter()
        .map(|sco| resolve_sco(conn, sco))
        .collect()
}

/// Objectives configured for a subject in a class, in list order. Empty when
/// the subject has no configuration for that class.
pub fn objectives_for(
    conn: &Connection,
    subject_id: &str,
    class_name: &str,
) -> AppResult<Vec<LearningObjective>> {
    match find_sco_for(conn, subject_id, class_name)? {
        Some(sco) => Ok(resolve_sco(conn, sco)?.learning_objectives),
        None => Ok(Vec::new()),
    }
}
