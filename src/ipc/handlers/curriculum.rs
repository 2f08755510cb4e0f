use crate::curriculum;
use crate::integrity::{self, ScoCleanup};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, decode, fail, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::ScoInput;
use serde_json::json;

// ---------------------------------------------------------------------------
// subjects.*
// ---------------------------------------------------------------------------

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::create_subject(conn, &name) {
        Ok(subject) => ok(&req.id, json!({ "subject": subject })),
        Err(e) => fail(req, e),
    }
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "subjects": [] }));
    };
    match curriculum::list_subjects(conn) {
        Ok(rows) => ok(&req.id, json!({ "subjects": rows })),
        Err(e) => fail(req, e),
    }
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::update_subject(conn, &subject_id, &name) {
        Ok(subject) => ok(&req.id, json!({ "subject": subject })),
        Err(e) => fail(req, e),
    }
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match integrity::delete_subject(conn, &subject_id) {
        Ok(summary) => ok(&req.id, json!({ "ok": true, "deleted": summary })),
        Err(e) => fail(req, e),
    }
}

// ---------------------------------------------------------------------------
// objectives.*
// ---------------------------------------------------------------------------

fn handle_objectives_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let text = match required_str(req, "text") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::create_objective(conn, &text) {
        Ok(objective) => ok(&req.id, json!({ "objective": objective })),
        Err(e) => fail(req, e),
    }
}

fn handle_objectives_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "objectives": [] }));
    };
    match curriculum::list_objectives(conn) {
        Ok(rows) => ok(&req.id, json!({ "objectives": rows })),
        Err(e) => fail(req, e),
    }
}

fn handle_objectives_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let objective_id = match required_str(req, "objectiveId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let text = match required_str(req, "text") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::update_objective(conn, &objective_id, &text) {
        Ok(objective) => ok(&req.id, json!({ "objective": objective })),
        Err(e) => fail(req, e),
    }
}

fn handle_objectives_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let objective_id = match required_str(req, "objectiveId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let cleanup = match optional_str(req, "scoCleanup") {
        None => ScoCleanup::default(),
        Some(raw) => match ScoCleanup::parse(&raw) {
            Some(v) => v,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "scoCleanup must be one of: prune, deleteConfig",
                    Some(json!({ "scoCleanup": raw })),
                )
            }
        },
    };
    match integrity::delete_objective(conn, &objective_id, cleanup) {
        Ok(summary) => ok(&req.id, json!({ "ok": true, "deleted": summary })),
        Err(e) => fail(req, e),
    }
}

// ---------------------------------------------------------------------------
// scos.*
// ---------------------------------------------------------------------------

fn handle_scos_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input: ScoInput = match decode(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::create_sco(conn, input).and_then(|sco| curriculum::resolve_sco(conn, sco)) {
        Ok(sco) => ok(&req.id, json!({ "sco": sco })),
        Err(e) => fail(req, e),
    }
}

fn handle_scos_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "scos": [] }));
    };
    match curriculum::list_scos(conn) {
        Ok(rows) => ok(&req.id, json!({ "scos": rows })),
        Err(e) => fail(req, e),
    }
}

fn handle_scos_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let sco_id = match required_str(req, "scoId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input: ScoInput = match decode(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::update_sco(conn, &sco_id, input)
        .and_then(|sco| curriculum::resolve_sco(conn, sco))
    {
        Ok(sco) => ok(&req.id, json!({ "sco": sco })),
        Err(e) => fail(req, e),
    }
}

fn handle_scos_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let sco_id = match required_str(req, "scoId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::delete_sco(conn, &sco_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => fail(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.update" => Some(handle_subjects_update(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        "objectives.create" => Some(handle_objectives_create(state, req)),
        "objectives.list" => Some(handle_objectives_list(state, req)),
        "objectives.update" => Some(handle_objectives_update(state, req)),
        "objectives.delete" => Some(handle_objectives_delete(state, req)),
        "scos.create" => Some(handle_scos_create(state, req)),
        "scos.list" => Some(handle_scos_list(state, req)),
        "scos.update" => Some(handle_scos_update(state, req)),
        "scos.delete" => Some(handle_scos_delete(state, req)),
        _ => None,
    }
}
