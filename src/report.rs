//! Spreadsheet export of the attendance report.

use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::error::{AppError, AppResult};
use crate::models::ReportRow;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLSX_FILE_NAME: &str = "attendance_report.xlsx";

pub const SHEET_NAME: &str = "Attendance Report";

/// Column headers of the spreadsheet export.
pub const XLSX_HEADERS: [&str; 5] = ["Name", "Roll Number", "Date", "Time", "Status"];

/// Renders the report as an `.xlsx` workbook with a header row followed by one row per record.
pub fn to_xlsx(rows: &[ReportRow]) -> AppResult<Vec<u8>> {
    build_workbook(rows).map_err(|e| AppError::Internal(format!("spreadsheet export: {e}")))
}

fn build_workbook(rows: &[ReportRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, header) in XLSX_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let sheet_row = index as u32 + 1;
        for (col, cell) in row.cells().into_iter().enumerate() {
            sheet.write_string(sheet_row, col as u16, cell)?;
        }
    }

    sheet.autofit();

    workbook.save_to_buffer()
}
