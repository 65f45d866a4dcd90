//! services/api/src/export/xlsx.rs
//!
//! One worksheet, a bold header row of the record keys, one row per record.

use register_assistant_core::StudentRecord;
use rust_xlsxwriter::{Format, Workbook, XlsxError};

pub fn to_xlsx(records: &[StudentRecord], sheet_name: &str) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;
    for (col, name) in StudentRecord::FIELD_NAMES.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header)?;
    }
    for (row, record) in records.iter().enumerate() {
        for (col, value) in record.values().into_iter().enumerate() {
            worksheet.write_string(row as u32 + 1, col as u16, value)?;
        }
    }

    workbook.save_to_buffer()
}
