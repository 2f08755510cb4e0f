mod test_support;

use serde_json::json;
use test_support::{array_len, spawn_with_workspace, str_at};

#[test]
fn create_normalizes_fields_and_defaults_status() {
    let (_workspace, mut sidecar) = spawn_with_workspace();
    let res = sidecar.request_ok(
        "students.create",
        json!({ "name": "  siti aminah ", "nis": " 2001 ", "className": "xi2", "gender": "Perempuan" }),
    );
    let student = &res["student"];
    assert_eq!(student["name"], "Siti Aminah");
    assert_eq!(student["nis"], "2001");
    assert_eq!(student["className"], "XI2");
    assert_eq!(student["gender"], "Perempuan");
    assert_eq!(student["status"], "Aktif");
}

#[test]
fn nis_is_unique_on_create_and_update() {
    let (_workspace, mut sidecar) = spawn_with_workspace();
    sidecar.create_student("Budi", "1001", "X1");
    let other = sidecar.create_student("Siti", "1002", "X1");

    let error = sidecar.request_err(
        "students.create",
        json!({ "name": "Andi", "nis": "1001", "className": "X2", "gender": "Laki-laki" }),
    );
    assert_eq!(error["code"], "conflict");

    let error = sidecar.request_err(
        "students.update",
        json!({ "studentId": other, "patch": { "nis": "1001" } }),
    );
    assert_eq!(error["code"], "conflict");

    // Keeping its own nis is not a conflict.
    sidecar.request_ok(
        "students.update",
        json!({ "studentId": other, "patch": { "nis": "1002", "status": "Tidak Aktif" } }),
    );
    let res = sidecar.request_ok("students.get", json!({ "studentId": other }));
    assert_eq!(res["student"]["status"], "Tidak Aktif");
    assert_eq!(res["student"]["name"], "Siti");
}

#[test]
fn unknown_gender_or_status_label_is_invalid_data() {
    let (_workspace, mut sidecar) = spawn_with_workspace();
    let error = sidecar.request_err(
        "students.create",
        json!({ "name": "Andi", "nis": "1", "className": "X1", "gender": "male" }),
    );
    assert_eq!(error["code"], "validation_failed");

    let id = sidecar.create_student("Andi", "1", "X1");
    let error = sidecar.request_err(
        "students.update",
        json!({ "studentId": id, "patch": { "status": "inactive" } }),
    );
    assert_eq!(error["code"], "validation_failed");

    let res = sidecar.request_ok("students.get", json!({ "studentId": id }));
    assert_eq!(res["student"]["status"], "Aktif");
}

#[test]
fn list_filters_by_search_and_class() {
    let (_workspace, mut sidecar) = spawn_with_workspace();
    sidecar.create_student("Budi Santoso", "1001", "X1");
    sidecar.create_student("Siti Aminah", "1002", "X1");
    sidecar.create_student("Andi Wijaya", "2001", "X2");

    let res = sidecar.request_ok("students.list", json!({ "search": "siti" }));
    assert_eq!(array_len(&res, "students"), 1);
    let res = sidecar.request_ok("students.list", json!({ "search": "200" }));
    assert_eq!(str_at(&res["students"][0], &["name"]), "Andi Wijaya");
    let res = sidecar.request_ok("students.list", json!({ "className": "x1" }));
    assert_eq!(array_len(&res, "students"), 2);

    let res = sidecar.request_ok("students.classes", json!({}));
    assert_eq!(res["classes"], json!(["X1", "X2"]));
}

#[test]
fn unknown_student_is_not_found() {
    let (_workspace, mut sidecar) = spawn_with_workspace();
    let error = sidecar.request_err("students.get", json!({ "studentId": "missing" }));
    assert_eq!(error["code"], "not_found");
    let error = sidecar.request_err("students.delete", json!({ "studentId": "missing" }));
    assert_eq!(error["code"], "not_found");
}
