//! Cascading deletes. The schema declares foreign keys but no `ON DELETE`
//! actions, so dependents are removed here, in dependency order, inside one
//! transaction per operation.

use crate::error::{AppError, AppResult};
use rusqlite::Connection;
use serde::Serialize;

/// What happens to configurations that list a deleted learning objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoCleanup {
    /// Remove the objective from each list and keep the configuration.
    #[default]
    Prune,
    /// Delete every configuration that listed the objective.
    DeleteConfig,
}

impl ScoCleanup {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "prune" => Some(ScoCleanup::Prune),
            "deleteConfig" => Some(ScoCleanup::DeleteConfig),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeSummary {
    pub students_deleted: usize,
    pub grades_deleted: usize,
    pub scos_deleted: usize,
    pub scos_pruned: usize,
}

pub fn delete_student(conn: &Connection, student_id: &str) -> AppResult<CascadeSummary> {
    let tx = conn.unchecked_transaction()?;
    let grades_deleted = tx.execute("DELETE FROM grades WHERE student_id = ?", [student_id])?;
    let students_deleted = tx.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    if students_deleted == 0 {
        return Err(AppError::not_found("student not found"));
    }
    tx.commit()?;

    tracing::info!(student_id, grades_deleted, "student deleted");
    Ok(CascadeSummary {
        students_deleted,
        grades_deleted,
        ..Default::default()
    })
}

/// Clears students and grades; curriculum data is left alone.
pub fn delete_all_students(conn: &Connection) -> AppResult<CascadeSummary> {
    let tx = conn.unchecked_transaction()?;
    let grades_deleted = tx.execute("DELETE FROM grades", [])?;
    let students_deleted = tx.execute("DELETE FROM students", [])?;
    tx.commit()?;

    tracing::info!(students_deleted, grades_deleted, "all students deleted");
    Ok(CascadeSummary {
        students_deleted,
        grades_deleted,
        ..Default::default()
    })
}

pub fn delete_subject(conn: &Connection, subject_id: &str) -> AppResult<CascadeSummary> {
    let tx = conn.unchecked_transaction()?;
    let grades_deleted = tx.execute("DELETE FROM grades WHERE subject_id = ?", [subject_id])?;
    tx.execute(
        "DELETE FROM sco_objectives
         WHERE sco_id IN (SELECT id FROM subject_class_objectives WHERE subject_id = ?)",
        [subject_id],
    )?;
    let scos_deleted = tx.execute(
        "DELETE FROM subject_class_objectives WHERE subject_id = ?",
        [subject_id],
    )?;
    if tx.execute("DELETE FROM subjects WHERE id = ?", [subject_id])? == 0 {
        return Err(AppError::not_found("subject not found"));
    }
    tx.commit()?;

    tracing::info!(subject_id, grades_deleted, scos_deleted, "subject deleted");
    Ok(CascadeSummary {
        grades_deleted,
        scos_deleted,
        ..Default::default()
    })
}

pub fn delete_objective(
    conn: &Connection,
    objective_id: &str,
    cleanup: ScoCleanup,
) -> AppResult<CascadeSummary> {
    let tx = conn.unchecked_transaction()?;
    let grades_deleted = tx.execute(
        "DELETE FROM grades WHERE learning_objective_id = ?",
        [objective_id],
    )?;

    let mut stmt = tx.prepare(
        "SELECT DISTINCT sco_id FROM sco_objectives WHERE learning_objective_id = ? ORDER BY sco_id",
    )?;
    let sco_ids = stmt
        .query_map([objective_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);

    let mut summary = CascadeSummary {
        grades_deleted,
        ..Default::default()
    };
    for sco_id in &sco_ids {
        match cleanup {
            ScoCleanup::Prune => {
                tx.execute(
                    "DELETE FROM sco_objectives WHERE sco_id = ? AND learning_objective_id = ?",
                    (sco_id, objective_id),
                )?;
                compact_positions(&tx, sco_id)?;
                tx.execute(
                    "UPDATE subject_class_objectives SET updated_at = ? WHERE id = ?",
                    (crate::model::now_timestamp(), sco_id),
                )?;
                summary.scos_pruned += 1;
            }
            ScoCleanup::DeleteConfig => {
                tx.execute("DELETE FROM sco_objectives WHERE sco_id = ?", [sco_id])?;
                summary.scos_deleted +=
                    tx.execute("DELETE FROM subject_class_objectives WHERE id = ?", [sco_id])?;
            }
        }
    }

    if tx.execute("DELETE FROM learning_objectives WHERE id = ?", [objective_id])? == 0 {
        return Err(AppError::not_found("learning objective not found"));
    }
    tx.commit()?;

    tracing::info!(
        objective_id,
        grades_deleted = summary.grades_deleted,
        scos_pruned = summary.scos_pruned,
        scos_deleted = summary.scos_deleted,
        "learning objective deleted"
    );
    Ok(summary)
}

/// Renumbers list positions to 0..n after a removal, keeping relative order.
fn compact_positions(conn: &Connection, sco_id: &str) -> AppResult<()> {
    let mut stmt = conn.prepare(
        "SELECT learning_objective_id FROM sco_objectives WHERE sco_id = ? ORDER BY position",
    )?;
    let ids = stmt
        .query_map([sco_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);

    conn.execute("DELETE FROM sco_objectives WHERE sco_id = ?", [sco_id])?;
    for (pos, id) in ids.iter().enumerate() {
        conn.execute(
            "INSERT INTO sco_objectives(sco_id, position, learning_objective_id) VALUES(?, ?, ?)",
            (sco_id, pos as i64, id),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum;
    use crate::db;
    use crate::grades;
    use crate::model::{GradeInput, ScoInput};
    use crate::students::{self, tests::new_student};

    fn count(conn: &Connection, sql: &str, arg: &str) -> i64 {
        conn.query_row(sql, [arg], |r| r.get(0)).unwrap()
    }

    struct World {
        student_id: String,
        subject_id: String,
        keep_id: String,
        drop_id: String,
        sco_id: String,
    }

    fn world(conn: &Connection) -> World {
        let st = students::create_student(conn, new_student("Ani", "N1", "X1")).unwrap();
        let su = curriculum::create_subject(conn, "Matematika").unwrap();
        let keep = curriculum::create_objective(conn, "Keep").unwrap();
        let drop_ = curriculum::create_objective(conn, "Drop").unwrap();
        let sco = curriculum::create_sco(
            conn,
            ScoInput {
                subject_id: su.id.clone(),
                class_name: "X1".into(),
                objective_ids: vec![drop_.id.clone(), keep.id.clone()],
            },
        )
        .unwrap();
        for obj in [&keep.id, &drop_.id] {
            grades::upsert_grade(
                conn,
                GradeInput {
                    student_id: st.id.clone(),
                    subject_id: su.id.clone(),
                    class_name: "X1".into(),
                    objective_id: obj.clone(),
                    value: 75.0,
                },
            )
            .unwrap();
        }
        World {
            student_id: st.id,
            subject_id: su.id,
            keep_id: keep.id,
            drop_id: drop_.id,
            sco_id: sco.id,
        }
    }

    #[test]
    fn deleting_subject_removes_its_configs_and_grades() {
        let conn = db::open_memory();
        let w = world(&conn);
        let summary = delete_subject(&conn, &w.subject_id).unwrap();
        assert_eq!(summary.grades_deleted, 2);
        assert_eq!(summary.scos_deleted, 1);
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM grades WHERE subject_id = ?", &w.subject_id),
            0
        );
        assert_eq!(
            count(
                &conn,
                "SELECT COUNT(*) FROM subject_class_objectives WHERE subject_id = ?",
                &w.subject_id
            ),
            0
        );
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM sco_objectives WHERE sco_id = ?", &w.sco_id),
            0
        );
    }

    #[test]
    fn deleting_student_removes_only_its_grades() {
        let conn = db::open_memory();
        let w = world(&conn);
        let summary = delete_student(&conn, &w.student_id).unwrap();
        assert_eq!(summary.students_deleted, 1);
        assert_eq!(summary.grades_deleted, 2);
        assert!(matches!(
            delete_student(&conn, &w.student_id),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(curriculum::list_scos(&conn).unwrap().len(), 1);
    }

    #[test]
    fn deleting_objective_prunes_it_from_config_lists() {
        let conn = db::open_memory();
        let w = world(&conn);
        let summary = delete_objective(&conn, &w.drop_id, ScoCleanup::Prune).unwrap();
        assert_eq!(summary.grades_deleted, 1);
        assert_eq!(summary.scos_pruned, 1);
        assert_eq!(summary.scos_deleted, 0);

        let sco = curriculum::get_sco(&conn, &w.sco_id).unwrap();
        assert_eq!(sco.objective_ids, vec![w.keep_id.clone()]);
        let pos: i64 = conn
            .query_row(
                "SELECT position FROM sco_objectives WHERE sco_id = ?",
                [&w.sco_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(pos, 0);
    }

    #[test]
    fn deleting_objective_can_drop_whole_configs() {
        let conn = db::open_memory();
        let w = world(&conn);
        let summary = delete_objective(&conn, &w.drop_id, ScoCleanup::DeleteConfig).unwrap();
        assert_eq!(summary.scos_deleted, 1);
        assert!(matches!(
            curriculum::get_sco(&conn, &w.sco_id),
            Err(AppError::NotFound(_))
        ));
        // The other objective's grade survives.
        assert_eq!(
            count(
                &conn,
                "SELECT COUNT(*) FROM grades WHERE learning_objective_id = ?",
                &w.keep_id
            ),
            1
        );
    }

    #[test]
    fn delete_all_students_keeps_curriculum() {
        let conn = db::open_memory();
        let w = world(&conn);
        let summary = delete_all_students(&conn).unwrap();
        assert_eq!(summary.students_deleted, 1);
        assert_eq!(summary.grades_deleted, 2);
        assert!(curriculum::get_subject(&conn, &w.subject_id).is_ok());
        assert!(curriculum::get_sco(&conn, &w.sco_id).is_ok());
    }
}
