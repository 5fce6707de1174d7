use crate::errors::{AppError, Result};
use crate::models::{DailyRecord, FieldValue};
use crate::prompt::{ask_bool, InputSource};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::path::{Path, PathBuf};
use tracing::info;
use umya_spreadsheet::{reader, writer, Spreadsheet, Worksheet};

const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";
const MILLIS_PER_DAY: f64 = 86_400_000.0;
// Serial of 9999-12-31; spreadsheet dates stop there.
const MAX_SERIAL: f64 = 2_958_465.0;

/// Cell access used by the upsert logic; columns and rows are 1-based.
pub trait Grid {
    /// Trimmed cell text, `None` for an empty cell.
    fn text(&self, col: u32, row: u32) -> Option<String>;
    fn write(&mut self, col: u32, row: u32, value: &FieldValue);
    /// Highest column holding a value in any row, 0 for an empty sheet.
    fn width(&self) -> u32;
}

impl Grid for Worksheet {
    fn text(&self, col: u32, row: u32) -> Option<String> {
        let value = self.get_cell((col, row))?.get_value();
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    }

    fn width(&self) -> u32 {
        self.get_highest_column()
    }

    fn write(&mut self, col: u32, row: u32, value: &FieldValue) {
        let cell = self.get_cell_mut((col, row));
        match value {
            FieldValue::Date(date) => {
                cell.set_value_number(to_serial(date.and_time(NaiveTime::MIN)));
                cell.get_style_mut()
                    .get_number_format_mut()
                    .set_format_code(DATE_FORMAT);
            }
            FieldValue::DateTime(at) => {
                cell.set_value_number(to_serial(*at));
                cell.get_style_mut()
                    .get_number_format_mut()
                    .set_format_code(DATETIME_FORMAT);
            }
            FieldValue::Int(number) => {
                cell.set_value_number(*number as f64);
            }
            FieldValue::Float(number) => {
                cell.set_value_number(*number);
            }
            FieldValue::Bool(flag) => {
                cell.set_value_bool(*flag);
            }
            FieldValue::Text(text) => {
                cell.set_value_string(text.clone());
            }
        }
    }
}

fn serial_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

/// Spreadsheet serial number: days since 1899-12-30 plus the fraction of the day.
pub fn to_serial(at: NaiveDateTime) -> f64 {
    at.signed_duration_since(serial_epoch()).num_milliseconds() as f64 / MILLIS_PER_DAY
}

pub fn from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..=MAX_SERIAL + 1.0).contains(&serial) {
        return None;
    }
    let millis = (serial * MILLIS_PER_DAY).round() as i64;
    serial_epoch().checked_add_signed(Duration::milliseconds(millis))
}

/// Reads a date from a first-column cell written either as a serial number or as text.
pub fn cell_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(serial) = raw.parse::<f64>() {
        return from_serial(serial).map(|at| at.date());
    }
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Row 1 across every used column; blank header cells stay `None`.
pub fn header(grid: &dyn Grid) -> Vec<Option<String>> {
    (1..=grid.width()).map(|col| grid.text(col, 1)).collect()
}

/// First row, from the top, whose first cell is empty.
pub fn first_empty_row(grid: &dyn Grid) -> u32 {
    let mut row = 1;
    while grid.text(1, row).is_some() {
        row += 1;
    }
    row
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Append(u32),
    Duplicate(u32),
}

pub fn locate(grid: &dyn Grid, date: NaiveDate) -> Result<Placement> {
    let row = first_empty_row(grid);
    if row > 2 {
        let above = row - 1;
        let raw = grid.text(1, above).unwrap_or_default();
        let last = cell_date(&raw).ok_or_else(|| {
            AppError::Workbook(format!("row {above} does not start with a date ('{raw}')"))
        })?;
        if last == date {
            return Ok(Placement::Duplicate(above));
        }
        if last > date {
            return Err(AppError::OutOfOrder { last, date });
        }
    }
    Ok(Placement::Append(row.max(2)))
}

/// Writes every field under its header column. Fields the header does not
/// name yet get a new column after the last used one.
pub fn write_record(grid: &mut dyn Grid, row: u32, record: &DailyRecord) {
    let mut columns = header(grid);
    for (name, value) in record.fields.iter() {
        let col = match columns.iter().position(|column| column.as_deref() == Some(name)) {
            Some(index) => index as u32 + 1,
            None => {
                columns.push(Some(name.to_string()));
                let col = columns.len() as u32;
                grid.write(col, 1, &FieldValue::Text(name.to_string()));
                col
            }
        };
        grid.write(col, row, value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Written(u32),
    Skipped,
}

/// Places `record` in the grid. A row already holding the same date is only
/// overwritten when the user agrees.
pub fn upsert(grid: &mut dyn Grid, record: &DailyRecord, input: &mut dyn InputSource) -> Result<Upsert> {
    let row = match locate(grid, record.date)? {
        Placement::Append(row) => row,
        Placement::Duplicate(row) => {
            let reenter = ask_bool(
                input,
                "Data already entered for today. Would you like to re-enter data? (y/n)",
            )?;
            if !reenter {
                return Ok(Upsert::Skipped);
            }
            row
        }
    };
    write_record(grid, row, record);
    Ok(Upsert::Written(row))
}

/// The `.xlsx` file behind the journal, held in memory until `save`.
pub struct Workbook {
    book: Spreadsheet,
    path: PathBuf,
    sheet_name: String,
}

impl Workbook {
    /// Reads `path`, or starts an empty workbook when the file does not exist yet.
    /// The named sheet is created when missing.
    pub fn open(path: &Path, sheet_name: &str) -> Result<Self> {
        let mut book = if path.exists() {
            reader::xlsx::read(path).map_err(AppError::workbook)?
        } else {
            info!("workbook '{}' not found, starting a new one", path.display());
            umya_spreadsheet::new_file_empty_worksheet()
        };
        if book.get_sheet_by_name(sheet_name).is_none() {
            book.new_sheet(sheet_name).map_err(AppError::workbook)?;
        }
        Ok(Self {
            book,
            path: path.to_path_buf(),
            sheet_name: sheet_name.to_string(),
        })
    }

    pub fn sheet(&self) -> Result<&Worksheet> {
        self.book
            .get_sheet_by_name(&self.sheet_name)
            .ok_or_else(|| AppError::Workbook(format!("sheet '{}' is missing", self.sheet_name)))
    }

    pub fn sheet_mut(&mut self) -> Result<&mut Worksheet> {
        self.book
            .get_sheet_by_name_mut(&self.sheet_name)
            .ok_or_else(|| AppError::Workbook(format!("sheet '{}' is missing", self.sheet_name)))
    }

    pub fn save(&self) -> Result<()> {
        writer::xlsx::write(&self.book, &self.path).map_err(AppError::workbook)?;
        info!("workbook saved to '{}'", self.path.display());
        Ok(())
    }
}
