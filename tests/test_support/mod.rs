#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .env_remove("GRADEBOOKD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

/// A sidecar with a fresh workspace already selected.
pub fn spawn_with_workspace() -> (TempDir, Sidecar) {
    let workspace = tempfile::tempdir().expect("temp workspace");
    let mut sidecar = spawn_sidecar();
    sidecar.request_ok(
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    (workspace, sidecar)
}

impl Sidecar {
    pub fn send_line(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(serde_json::Value::Null)
    }

    /// Asserts failure and returns the error code.
    pub fn request_err(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value.get("error").cloned().expect("error object")
    }

    pub fn create_student(&mut self, name: &str, nis: &str, class_name: &str) -> String {
        let res = self.request_ok(
            "students.create",
            json!({ "name": name, "nis": nis, "className": class_name, "gender": "Perempuan" }),
        );
        str_at(&res, &["student", "id"])
    }

    pub fn create_subject(&mut self, name: &str) -> String {
        let res = self.request_ok("subjects.create", json!({ "name": name }));
        str_at(&res, &["subject", "id"])
    }

    pub fn create_objective(&mut self, text: &str) -> String {
        let res = self.request_ok("objectives.create", json!({ "text": text }));
        str_at(&res, &["objective", "id"])
    }

    pub fn create_sco(
        &mut self,
        subject_id: &str,
        class_name: &str,
        objective_ids: &[impl AsRef<str>],
    ) -> String {
        let objective_ids: Vec<&str> = objective_ids.iter().map(|id| id.as_ref()).collect();
        let res = self.request_ok(
            "scos.create",
            json!({ "subjectId": subject_id, "className": class_name, "objectiveIds": objective_ids }),
        );
        str_at(&res, &["sco", "id"])
    }

    pub fn upsert_grade(
        &mut self,
        student_id: &str,
        subject_id: &str,
        class_name: &str,
        objective_id: &str,
        value: f64,
    ) -> serde_json::Value {
        self.request_ok(
            "grades.upsert",
            json!({
                "studentId": student_id,
                "subjectId": subject_id,
                "className": class_name,
                "objectiveId": objective_id,
                "value": value
            }),
        )
    }
}

pub fn str_at(value: &serde_json::Value, path: &[&str]) -> String {
    let mut cur = value;
    for key in path {
        cur = cur.get(key).unwrap_or_else(|| panic!("missing {} in {}", key, value));
    }
    cur.as_str().expect("string value").to_string()
}

pub fn array_len(value: &serde_json::Value, key: &str) -> usize {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .unwrap_or_else(|| panic!("missing array {} in {}", key, value))
}

/// Writes a one-sheet workbook from string rows, first row as header.
pub fn write_sheet(path: &Path, rows: &[Vec<&str>]) {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            sheet
                .write_string(r as u32, c as u16, *cell)
                .expect("write cell");
        }
    }
    workbook.save(path).expect("save workbook");
}

/// All cells of the first sheet rendered as strings.
pub fn read_sheet(path: &Path) -> Vec<Vec<String>> {
    use calamine::{open_workbook_auto, Reader};
    let mut workbook = open_workbook_auto(path).expect("open workbook");
    let range = workbook
        .worksheet_range_at(0)
        .expect("first sheet")
        .expect("sheet range");
    range
        .rows()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect()
}
