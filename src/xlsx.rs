//! Spreadsheet codec: the student import template, student import, and the
//! class grade report export.

use crate::calc::ReportRow;
use crate::error::{AppError, AppResult};
use crate::model::{Gender, NewStudent, StudentStatus};
use crate::students;
use calamine::{open_workbook_auto, Data, Reader};
use rusqlite::Connection;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Column names of the student sheet. Import looks columns up by these exact
/// labels, so they must not drift from what the template emits.
pub const TEMPLATE_HEADERS: [&str; 5] = ["Nama", "NIS", "Kelas", "Jenis Kelamin", "Status"];

const TEMPLATE_EXAMPLE: [&str; 5] = ["Budi Santoso", "12345", "X1", "Laki-laki", "Aktif"];

const TEMPLATE_NOTES: [&str; 6] = [
    "Petunjuk pengisian:",
    "1. Nama dan NIS wajib diisi; baris tanpa Nama atau NIS dilewati.",
    "2. NIS harus unik; NIS yang sudah terdaftar dihitung sebagai duplikat.",
    "3. Jenis Kelamin diisi Laki-laki atau Perempuan.",
    "4. Status diisi Aktif atau Tidak Aktif (kosong berarti Aktif).",
    "5. Baris petunjuk ini diabaikan saat impor.",
];

pub const REPORT_PLACEHOLDER: &str = "-";
pub const MAX_REPORTED_ERRORS: usize = 10;
const MAX_COLUMN_WIDTH: usize = 50;
const COLUMN_PADDING: usize = 2;

// ============================================================================
// WRITING
// ============================================================================

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x1F4E78))
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
}

fn cell_format() -> Format {
    Format::new()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
}

/// Tracks the widest content per column so widths can be set at the end.
#[derive(Default)]
struct ColumnWidths(HashMap<u16, usize>);

impl ColumnWidths {
    fn observe(&mut self, col: u16, text: &str) {
        let len = text.chars().count();
        let w = self.0.entry(col).or_insert(0);
        *w = (*w).max(len);
    }

    fn apply(&self, worksheet: &mut Worksheet) -> AppResult<()> {
        for (col, len) in &self.0 {
            let width = (len + COLUMN_PADDING).min(MAX_COLUMN_WIDTH);
            worksheet.set_column_width(*col, width as f64)?;
        }
        Ok(())
    }
}

/// Excel forbids some characters in sheet names and caps them at 31 chars.
fn sheet_name(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .take(31)
        .collect()
}

pub fn student_template() -> AppResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Data Siswa")?;

    let header = header_format();
    let mut widths = ColumnWidths::default();

    for (col, title) in TEMPLATE_HEADERS.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, *title, &header)?;
        widths.observe(col, title);
    }
    for (col, value) in TEMPLATE_EXAMPLE.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string(1, col, *value)?;
        widths.observe(col, value);
    }
    // Notes sit in column A below a blank row; they carry no NIS, so import
    // skips them.
    for (i, note) in TEMPLATE_NOTES.iter().enumerate() {
        worksheet.write_string(3 + i as u32, 0, *note)?;
        widths.observe(0, note);
    }

    widths.apply(worksheet)?;
    Ok(workbook.save_to_buffer()?)
}

/// Workbook of a class report: fixed identity columns, one column per distinct
/// "subject - objective" label in lexicographic order, then the average.
pub fn grade_report_workbook(class_name: &str, rows: &[ReportRow]) -> AppResult<Vec<u8>> {
    if rows.is_empty() {
        return Err(AppError::not_found(format!(
            "no data for class {class_name}"
        )));
    }

    let columns: BTreeSet<String> = rows
        .iter()
        .flat_map(|r| r.grades.iter().map(|c| c.column_label()))
        .collect();

    let mut headers: Vec<String> = vec!["No".into(), "Nama".into(), "NIS".into()];
    headers.extend(columns.iter().cloned());
    headers.push("Rata-rata".into());

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(&format!("Nilai {class_name}")))?;

    let header = header_format();
    let cell = cell_format();
    let mut widths = ColumnWidths::default();

    for (col, title) in headers.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, title, &header)?;
        widths.observe(col, title);
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        let no = (i + 1).to_string();
        worksheet.write_number_with_format(r, 0, (i + 1) as f64, &cell)?;
        widths.observe(0, &no);
        worksheet.write_string_with_format(r, 1, &row.student.name, &cell)?;
        widths.observe(1, &row.student.name);
        worksheet.write_string_with_format(r, 2, &row.student.nis, &cell)?;
        widths.observe(2, &row.student.nis);

        // Objective texts may repeat within a configuration; an entered value
        // wins over an empty cell with the same label.
        let mut by_label: HashMap<String, Option<f64>> = HashMap::new();
        for c in &row.grades {
            by_label
                .entry(c.column_label())
                .and_modify(|v| {
                    if v.is_none() {
                        *v = c.value;
                    }
                })
                .or_insert(c.value);
        }
        for (j, label) in columns.iter().enumerate() {
            let col = (3 + j) as u16;
            match by_label.get(label).copied().flatten() {
                Some(v) => {
                    worksheet.write_number_with_format(r, col, v, &cell)?;
                    widths.observe(col, &v.to_string());
                }
                None => {
                    worksheet.write_string_with_format(r, col, REPORT_PLACEHOLDER, &cell)?;
                }
            }
        }

        let avg_col = (3 + columns.len()) as u16;
        if row.average == 0.0 {
            worksheet.write_string_with_format(r, avg_col, REPORT_PLACEHOLDER, &cell)?;
        } else {
            worksheet.write_number_with_format(r, avg_col, row.average, &cell)?;
            widths.observe(avg_col, &row.average.to_string());
        }
    }

    worksheet.set_freeze_panes(1, 0)?;
    widths.apply(worksheet)?;
    Ok(workbook.save_to_buffer()?)
}

pub fn write_output(out_path: &Path, bytes: &[u8]) -> AppResult<()> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(out_path, bytes)?;
    Ok(())
}

// ============================================================================
// READING
// ============================================================================

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        // Registration numbers typed into Excel usually arrive as floats.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
    }
}

fn check_extension(path: &Path) -> AppResult<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("xlsx") | Some("xls") => Ok(()),
        _ => Err(AppError::validation(
            "file must be an Excel workbook (.xlsx or .xls)",
        )),
    }
}

/// Used range of a worksheet. calamine trims leading blank rows, so the
/// sheet row of `rows[0]` is kept alongside.
#[derive(Debug, Clone, Default)]
pub struct SheetTable {
    /// 1-based sheet row number of `rows[0]`.
    pub first_row: usize,
    pub rows: Vec<Vec<String>>,
}

/// First worksheet as rows of cell text, untrimmed. Fails on a wrong
/// extension or anything calamine cannot read as a workbook.
pub fn read_table(path: &Path) -> AppResult<SheetTable> {
    check_extension(path)?;
    std::fs::metadata(path)?;

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AppError::validation(format!("cannot read spreadsheet: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::validation("workbook contains no sheets"))?
        .map_err(|e| AppError::validation(format!("cannot read spreadsheet: {e}")))?;

    let first_row = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
    Ok(SheetTable {
        first_row,
        rows: range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported_count: usize,
    pub duplicate_count: usize,
    pub error_count: usize,
    /// At most `MAX_REPORTED_ERRORS` messages, in row order.
    pub errors: Vec<String>,
}

impl ImportSummary {
    fn row_error(&mut self, sheet_row: usize, message: impl std::fmt::Display) {
        self.error_count += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(format!("Row {sheet_row}: {message}"));
        }
    }
}

struct ColumnMap([usize; 5]);

impl ColumnMap {
    fn locate(header: &[String]) -> AppResult<Self> {
        let mut idx = [0usize; 5];
        let mut missing = Vec::new();
        for (slot, name) in TEMPLATE_HEADERS.iter().enumerate() {
            match header.iter().position(|h| h.trim() == *name) {
                Some(i) => idx[slot] = i,
                None => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(AppError::MissingColumns(missing));
        }
        Ok(ColumnMap(idx))
    }

    fn get<'a>(&self, row: &'a [String], slot: usize) -> &'a str {
        row.get(self.0[slot]).map(|s| s.trim()).unwrap_or("")
    }
}

/// Imports rows in order. Duplicates are judged against what is already
/// stored, including rows inserted earlier in the same file.
pub fn import_students(conn: &Connection, path: &Path) -> AppResult<ImportSummary> {
    let table = read_table(path)?;
    let Some((header, data)) = table.rows.split_first() else {
        return Err(AppError::MissingColumns(
            TEMPLATE_HEADERS.iter().map(|s| s.to_string()).collect(),
        ));
    };
    let cols = ColumnMap::locate(header)?;

    let mut summary = ImportSummary::default();
    for (i, row) in data.iter().enumerate() {
        let sheet_row = table.first_row + i + 1;
        let name = cols.get(row, 0);
        let nis = cols.get(row, 1);
        if name.is_empty() || nis.is_empty() {
            continue;
        }

        let gender_raw = cols.get(row, 3);
        let Some(gender) = Gender::parse(gender_raw) else {
            summary.row_error(
                sheet_row,
                format!(
                    "invalid gender {gender_raw:?}, expected {} or {}",
                    Gender::LABELS[0],
                    Gender::LABELS[1]
                ),
            );
            continue;
        };
        let status = StudentStatus::parse(cols.get(row, 4)).unwrap_or_default();

        if students::find_by_nis(conn, nis)?.is_some() {
            summary.duplicate_count += 1;
            continue;
        }

        let input = NewStudent {
            name: name.to_string(),
            nis: nis.to_string(),
            class_name: cols.get(row, 2).to_string(),
            gender,
            status: Some(status),
        };
        match students::create_student(conn, input) {
            Ok(_) => summary.imported_count += 1,
            Err(AppError::Conflict(_)) => summary.duplicate_count += 1,
            Err(e) => summary.row_error(sheet_row, e),
        }
    }

    tracing::info!(
        path = %path.display(),
        imported = summary.imported_count,
        duplicates = summary.duplicate_count,
        errors = summary.error_count,
        "student import finished"
    );
    Ok(summary)
}
