mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, spawn_with_workspace};

#[test]
fn health_reports_version_and_no_workspace() {
    let mut sidecar = spawn_sidecar();
    let res = sidecar.request_ok("health", json!({}));
    assert_eq!(
        res.get("version").and_then(|v| v.as_str()),
        Some(env!("CARGO_PKG_VERSION"))
    );
    assert!(res.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));
}

#[test]
fn unknown_method_is_not_implemented() {
    let mut sidecar = spawn_sidecar();
    let error = sidecar.request_err("nope.nothing", json!({}));
    assert_eq!(error["code"], "not_implemented");
}

#[test]
fn bad_json_line_gets_error_and_loop_continues() {
    let mut sidecar = spawn_sidecar();
    let resp = sidecar.send_line("{not json");
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "bad_json");
    sidecar.request_ok("health", json!({}));
}

#[test]
fn mutations_need_a_workspace_but_lists_are_empty() {
    let mut sidecar = spawn_sidecar();
    let error = sidecar.request_err(
        "subjects.create",
        json!({ "name": "matematika" }),
    );
    assert_eq!(error["code"], "no_workspace");

    let res = sidecar.request_ok("students.list", json!({}));
    assert_eq!(res["students"], json!([]));
    let res = sidecar.request_ok("scos.list", json!({}));
    assert_eq!(res["scos"], json!([]));
}

#[test]
fn workspace_select_persists_across_restarts() {
    let (workspace, mut sidecar) = spawn_with_workspace();
    sidecar.create_student("budi santoso", "1001", "x1");
    drop(sidecar);

    let mut sidecar = spawn_sidecar();
    sidecar.request_ok(
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    let res = sidecar.request_ok("students.list", json!({}));
    assert_eq!(res["students"][0]["name"], "Budi Santoso");
}

#[test]
fn missing_params_are_bad_params() {
    let (_workspace, mut sidecar) = spawn_with_workspace();
    let error = sidecar.request_err("students.get", json!({}));
    assert_eq!(error["code"], "bad_params");
    let error = sidecar.request_err("students.create", json!({ "name": "x" }));
    assert_eq!(error["code"], "bad_params");
}
