mod records;
pub mod schema;

use crate::errors::{AppError, AppResult};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::Utc;
use rust_xlsxwriter::Format;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

pub use schema::SheetKind;

/// Most characters a worksheet cell holds. Longer values continue in extra
/// `column#2`, `column#3`, .. cells of the same row.
pub const MAX_CELL_CHARS: usize = 32_767;

/// One sheet row, keyed by column name. Absent cells are stored as `""`.
pub type Row = BTreeMap<String, String>;

/// A typed record persisted one-per-row in a fixed sheet.
pub trait SheetRecord: Sized {
    const SHEET: SheetKind;

    fn from_row(row: &Row) -> AppResult<Self>;
    fn to_row(&self) -> Row;
}

#[derive(Debug)]
pub struct Workbook {
    path: PathBuf,
    file_lock: Mutex<()>,
    mutation_lock: Mutex<()>,
}

impl Workbook {
    pub fn new(path: &Path) -> AppResult<Self> {
        let store = Self {
            path: path.to_path_buf(),
            file_lock: Mutex::new(()),
            mutation_lock: Mutex::new(()),
        };
        store.ensure_store()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ensure_store(&self) -> AppResult<()> {
        let _file = self.lock_file()?;
        create_if_missing(&self.path)
    }

    pub fn read_sheet(&self, name: &str) -> AppResult<Vec<Row>> {
        let kind = SheetKind::from_name(name)?;
        let _file = self.lock_file()?;
        create_if_missing(&self.path)?;

        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;
        read_rows(&mut workbook, kind)
    }

    /// Replaces every row of `name`. The other sheets are carried over from disk
    /// and the whole file is swapped in with a rename.
    pub fn write_sheet(&self, name: &str, rows: &[Row]) -> AppResult<()> {
        let kind = SheetKind::from_name(name)?;
        let _file = self.lock_file()?;
        create_if_missing(&self.path)?;

        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;
        let mut sheets = Vec::with_capacity(SheetKind::ALL.len());
        for current in SheetKind::ALL {
            if current == kind {
                sheets.push((current, rows.to_vec()));
            } else {
                sheets.push((current, read_rows(&mut workbook, current)?));
            }
        }
        drop(workbook);

        write_workbook(&self.path, &sheets)?;
        tracing::debug!(sheet = kind.name(), rows = rows.len(), "sheet rewritten");
        Ok(())
    }

    pub fn load<T: SheetRecord>(&self) -> AppResult<Vec<T>> {
        self.read_sheet(T::SHEET.name())?
            .iter()
            .map(T::from_row)
            .collect()
    }

    pub fn save<T: SheetRecord>(&self, records: &[T]) -> AppResult<()> {
        let rows: Vec<Row> = records.iter().map(SheetRecord::to_row).collect();
        self.write_sheet(T::SHEET.name(), &rows)
    }

    /// Serializes read-modify-write cycles of this process. Held for the whole
    /// mutation, activity log append included.
    pub fn lock_mutations(&self) -> AppResult<MutexGuard<'_, ()>> {
        self.mutation_lock
            .lock()
            .map_err(|_| AppError::Internal("workbook mutation mutex poisoned".to_string()))
    }

    fn lock_file(&self) -> AppResult<MutexGuard<'_, ()>> {
        self.file_lock
            .lock()
            .map_err(|_| AppError::Internal("workbook file mutex poisoned".to_string()))
    }
}

pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn today_date() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn create_if_missing(path: &Path) -> AppResult<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let empty: Vec<(SheetKind, Vec<Row>)> = SheetKind::ALL.into_iter().map(|kind| (kind, Vec::new())).collect();
    write_workbook(path, &empty)?;
    tracing::info!(path = %path.display(), "created empty workbook");
    Ok(())
}

fn read_rows<RS>(workbook: &mut Xlsx<RS>, kind: SheetKind) -> AppResult<Vec<Row>>
where
    RS: std::io::Read + std::io::Seek,
{
    if !workbook.sheet_names().iter().any(|name| name == kind.name()) {
        return Err(AppError::Storage(format!(
            "unexpected sheet shape: workbook has no '{}' sheet",
            kind.name()
        )));
    }
    let range = workbook.worksheet_range(kind.name())?;
    rows_from_range(kind, &range)
}

fn rows_from_range(kind: SheetKind, range: &Range<Data>) -> AppResult<Vec<Row>> {
    let mut lines = range.rows();
    let Some(header) = lines.next() else {
        return Err(AppError::Storage(format!(
            "unexpected sheet shape: '{}' has no header row",
            kind.name()
        )));
    };
    let header: Vec<String> = header.iter().map(cell_to_string).collect();

    let mut positions = Vec::with_capacity(kind.columns().len());
    for column in kind.columns() {
        let index = header
            .iter()
            .position(|value| value.trim() == *column)
            .ok_or_else(|| {
                AppError::Storage(format!(
                    "unexpected sheet shape: '{}' is missing column '{}'",
                    kind.name(),
                    column
                ))
            })?;
        let mut parts: Vec<(usize, usize)> = header
            .iter()
            .enumerate()
            .filter_map(|(index, value)| {
                let part = value.trim().strip_prefix(*column)?.strip_prefix('#')?.parse::<usize>().ok()?;
                (part >= 2).then_some((part, index))
            })
            .collect();
        parts.sort_unstable();

        let mut indices = vec![index];
        indices.extend(parts.into_iter().map(|(_, index)| index));
        positions.push((*column, indices));
    }

    let rows = lines
        .map(|cells| {
            positions
                .iter()
                .map(|(column, indices)| {
                    let value: String = indices
                        .iter()
                        .map(|index| cells.get(*index).map(cell_to_string).unwrap_or_default())
                        .collect();
                    (column.to_string(), value)
                })
                .collect::<Row>()
        })
        .filter(|row| !is_blank(kind, row))
        .collect();
    Ok(rows)
}

fn write_workbook(path: &Path, sheets: &[(SheetKind, Vec<Row>)]) -> AppResult<()> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let header_format = Format::new().set_bold();

    for (kind, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(kind.name())?;

        let rows: Vec<&Row> = rows.iter().filter(|row| !is_blank(*kind, row)).collect();
        let layout = cell_layout(*kind, &rows);
        for (col, (column, part)) in layout.iter().enumerate() {
            let title = if *part == 1 {
                column.to_string()
            } else {
                format!("{}#{}", column, part)
            };
            worksheet.write_string_with_format(0, col as u16, title, &header_format)?;
        }

        for (line, row) in rows.iter().enumerate() {
            for (col, (column, part)) in layout.iter().enumerate() {
                let value = row.get(*column).map(String::as_str).unwrap_or("");
                if let Some(chunk) = split_cell(value).get(part - 1) {
                    worksheet.write_string(line as u32 + 1, col as u16, *chunk)?;
                }
            }
        }
    }

    let staging = staging_path(path);
    workbook.save(&staging)?;
    fs::rename(&staging, path)?;
    Ok(())
}

/// Write order of the sheet's columns: the schema columns, then one
/// continuation column per extra part the longest value of a column needs.
fn cell_layout(kind: SheetKind, rows: &[&Row]) -> Vec<(&'static str, usize)> {
    let mut layout: Vec<(&'static str, usize)> = kind.columns().iter().map(|column| (*column, 1)).collect();
    for column in kind.columns() {
        let parts = rows
            .iter()
            .map(|row| row.get(*column).map_or(0, |value| value.chars().count().div_ceil(MAX_CELL_CHARS)))
            .max()
            .unwrap_or(0);
        layout.extend((2..=parts).map(|part| (*column, part)));
    }
    layout
}

fn split_cell(value: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = value;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(MAX_CELL_CHARS)
            .map_or(rest.len(), |(index, _)| index);
        chunks.push(&rest[..end]);
        rest = &rest[end..];
    }
    chunks
}

fn staging_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "workbook.xlsx".to_string());
    path.with_file_name(format!(".{}.tmp", file_name))
}

fn is_blank(kind: SheetKind, row: &Row) -> bool {
    kind.columns()
        .iter()
        .all(|column| row.get(*column).map_or(true, |value| value.is_empty()))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => decode_escapes(value),
        Data::DateTimeIso(value) | Data::DurationIso(value) => value.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) => {
            if value.fract() == 0.0 && value.abs() < 1e15 {
                format!("{}", *value as i64)
            } else {
                value.to_string()
            }
        }
        Data::Bool(value) => (if *value { "TRUE" } else { "FALSE" }).to_string(),
        Data::DateTime(value) => value.as_f64().to_string(),
        Data::Error(error) => format!("#{:?}", error),
    }
}

/// Reverses the `_xHHHH_` escaping xlsx writers apply to control characters
/// and to literal `_xHHHH_` text (stored as `_x005F_xHHHH_`).
fn decode_escapes(text: &str) -> String {
    if !text.contains("_x") {
        return text.to_string();
    }
    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("_x") {
        decoded.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match escaped_char(candidate) {
            Some(ch) => {
                decoded.push(ch);
                rest = &candidate[7..];
            }
            None => {
                decoded.push('_');
                rest = &candidate[1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

fn escaped_char(candidate: &str) -> Option<char> {
    if candidate.as_bytes().get(6) != Some(&b'_') {
        return None;
    }
    let hex = candidate.get(2..6)?;
    if !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}
