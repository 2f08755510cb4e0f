use crate::calc;
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, fail, required_path, required_str};
use crate::ipc::types::{AppState, Request};
use crate::xlsx;
use serde_json::json;

fn report_file_name(class_name: &str) -> String {
    format!("nilai_kelas_{}.xlsx", class_name.trim().to_uppercase())
}

fn handle_reports_grades(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_name = match required_str(req, "className") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match calc::class_grade_report(conn, &class_name) {
        Ok(rows) => ok(
            &req.id,
            json!({ "className": class_name.trim().to_uppercase(), "rows": rows }),
        ),
        Err(e) => fail(req, e),
    }
}

fn handle_reports_grades_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_name = match required_str(req, "className") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let out_path = match required_path(req, "outPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_name = class_name.trim().to_uppercase();

    let bytes = match calc::class_grade_report(conn, &class_name)
        .and_then(|rows| xlsx::grade_report_workbook(&class_name, &rows))
    {
        Ok(v) => v,
        Err(e) => return fail(req, e),
    };
    if let Err(e) = xlsx::write_output(&out_path, &bytes) {
        return fail(req, e);
    }
    tracing::info!(class_name = %class_name, path = %out_path.display(), "grade report exported");
    ok(
        &req.id,
        json!({
            "path": out_path.to_string_lossy(),
            "fileName": report_file_name(&class_name),
            "bytes": bytes.len(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.grades" => Some(handle_reports_grades(state, req)),
        "reports.gradesExport" => Some(handle_reports_grades_export(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::report_file_name;

    #[test]
    fn report_file_name_uses_normalized_class() {
        assert_eq!(report_file_name(" x1 "), "nilai_kelas_X1.xlsx");
    }
}
