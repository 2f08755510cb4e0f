use crate::integrity;
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, decode, fail, optional_str, required_path, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{check_student_labels, NewStudent, StudentPatch};
use crate::students::{self, StudentQuery};
use crate::xlsx;
use serde_json::json;

const TEMPLATE_FILE_NAME: &str = "template_data_siswa.xlsx";

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = check_student_labels(&req.params) {
        return fail(req, e);
    }
    let input: NewStudent = match decode(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match students::create_student(conn, input) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => fail(req, e),
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    let query = StudentQuery {
        search: optional_str(req, "search"),
        class_name: optional_str(req, "className"),
    };
    match students::list_students(conn, &query) {
        Ok(rows) => ok(&req.id, json!({ "students": rows })),
        Err(e) => fail(req, e),
    }
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match students::get_student(conn, &student_id) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => fail(req, e),
    }
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Some(fields) = req.params.get("patch") {
        if let Err(e) = check_student_labels(fields) {
            return fail(req, e);
        }
    }
    let patch: StudentPatch = match decode(req, Some("patch")) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match students::update_student(conn, &student_id, patch) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => fail(req, e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match integrity::delete_student(conn, &student_id) {
        Ok(summary) => ok(&req.id, json!({ "ok": true, "deleted": summary })),
        Err(e) => fail(req, e),
    }
}

fn handle_students_delete_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match integrity::delete_all_students(conn) {
        Ok(summary) => ok(&req.id, json!({ "ok": true, "deleted": summary })),
        Err(e) => fail(req, e),
    }
}

fn handle_students_classes(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    match students::class_list(conn) {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => fail(req, e),
    }
}

fn handle_students_template_download(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match required_path(req, "outPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let bytes = match xlsx::student_template() {
        Ok(v) => v,
        Err(e) => return fail(req, e),
    };
    if let Err(e) = xlsx::write_output(&out_path, &bytes) {
        return fail(req, e);
    }
    ok(
        &req.id,
        json!({
            "path": out_path.to_string_lossy(),
            "fileName": TEMPLATE_FILE_NAME,
            "bytes": bytes.len()
        }),
    )
}

fn handle_students_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let in_path = match required_path(req, "inPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match xlsx::import_students(conn, &in_path) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => fail(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_students_create(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "students.deleteAll" => Some(handle_students_delete_all(state, req)),
        "students.classes" => Some(handle_students_classes(state, req)),
        "students.templateDownload" => Some(handle_students_template_download(state, req)),
        "students.import" => Some(handle_students_import(state, req)),
        _ => None,
    }
}
