use crate::curriculum;
use crate::grades;
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, decode, fail, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::GradeInput;
use serde_json::json;

/// Objectives configured for a subject in a class. An unconfigured pair lists
/// no objectives rather than failing.
fn handle_grades_objectives(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_name = match required_str(req, "className") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::objectives_for(conn, &subject_id, &class_name) {
        Ok(rows) => ok(&req.id, json!({ "objectives": rows })),
        Err(e) => fail(req, e),
    }
}

fn handle_grades_by_criteria(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_name = match required_str(req, "className") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let objective_id = match required_str(req, "objectiveId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match grades::grades_by_criteria(conn, &subject_id, &class_name, &objective_id) {
        Ok(rows) => ok(&req.id, json!({ "rows": rows })),
        Err(e) => fail(req, e),
    }
}

fn handle_grades_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input: GradeInput = match decode(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match grades::upsert_grade(conn, input) {
        Ok(grade) => ok(&req.id, json!({ "grade": grade })),
        Err(e) => fail(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.objectives" => Some(handle_grades_objectives(state, req)),
        "grades.byCriteria" => Some(handle_grades_by_criteria(state, req)),
        "grades.upsert" => Some(handle_grades_upsert(state, req)),
        _ => None,
    }
}
