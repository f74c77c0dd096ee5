use csv::Writer;
use rust_xlsxwriter::{Format, Workbook};

use crate::error::{AppError, AppResult};
use crate::report::MemberTotal;
use crate::store::MEMBER_COLUMNS;

const TOTAL_COLUMN: &str = "Total Paid";

/// Flatten one member row into export cells, in `MEMBER_COLUMNS` order
/// followed by the total paid
fn member_record(row: &MemberTotal) -> [String; 12] {
    let m = &row.member;
    [
        m.id.to_string(),
        m.full_name.clone(),
        m.initial.clone(),
        m.father_name.clone(),
        m.city.to_string(),
        m.uae_address.clone(),
        m.home_address.clone(),
        m.contact_number.clone(),
        m.other_contacts.clone(),
        m.email.clone(),
        m.remarks.clone(),
        row.total_paid.to_string(),
    ]
}

/// Members table with a trailing `Total Paid` column, as CSV
///
/// Quoting of commas, quotes and newlines inside fields is left to the `csv`
/// writer.
///
/// # Arguments
/// * `rows` - Members with their summed payments, in the order to export
///
/// # Returns
/// * `AppResult<String>` - CSV text including the header row
///
/// # Errors
/// * `AppError::Export` if the writer fails
pub fn members_csv(rows: &[MemberTotal]) -> AppResult<String> {
    let mut wtr = Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = MEMBER_COLUMNS.to_vec();
    header.push(TOTAL_COLUMN);
    wtr.write_record(&header).map_err(export_error)?;

    for row in rows {
        wtr.write_record(member_record(row)).map_err(export_error)?;
    }

    let bytes = wtr.into_inner().map_err(export_error)?;
    String::from_utf8(bytes).map_err(export_error)
}

/// Same content as [`members_csv`] as a one-sheet workbook
///
/// The header row is bold. `MemberID` and `Total Paid` are written as
/// numbers, everything else as text.
///
/// # Arguments
/// * `rows` - Members with their summed payments, in the order to export
///
/// # Returns
/// * `AppResult<Vec<u8>>` - XLSX file content as bytes
///
/// # Errors
/// * `AppError::Export` if the workbook cannot be built
pub fn members_xlsx(rows: &[MemberTotal]) -> AppResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Members").map_err(export_error)?;

    let bold = Format::new().set_bold();
    for (c, name) in MEMBER_COLUMNS.iter().chain([TOTAL_COLUMN].iter()).enumerate() {
        worksheet
            .write_string_with_format(0, c as u16, *name, &bold)
            .map_err(export_error)?;
    }

    for (r, row) in rows.iter().enumerate() {
        let r = r as u32 + 1;
        let record = member_record(row);
        worksheet.write_number(r, 0, row.member.id as f64).map_err(export_error)?;
        for (c, value) in record.iter().enumerate().take(11).skip(1) {
            worksheet.write_string(r, c as u16, value.as_str()).map_err(export_error)?;
        }
        worksheet.write_number(r, 11, row.total_paid).map_err(export_error)?;
    }

    workbook.save_to_buffer().map_err(export_error)
}

fn export_error(e: impl ToString) -> AppError {
    AppError::Export(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{City, NewMember};

    fn row(id: u32, name: &str, total: f64) -> MemberTotal {
        let mut member = NewMember::new(name, City::Ajman).into_member(id);
        member.other_contacts = "Uncle: 050 1\nAunt, 050 2".to_string();
        MemberTotal {
            member,
            total_paid: total,
        }
    }

    #[test]
    fn csv_has_header_and_total_column() {
        let csv = members_csv(&[row(1, "Ali Khan", 80.0), row(2, "Sara \"S\" Noor", 0.0)]).unwrap();

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 12);
        assert_eq!(&headers[0], "MemberID");
        assert_eq!(&headers[11], "Total Paid");

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][11], "80");
        assert_eq!(&records[0][8], "Uncle: 050 1\nAunt, 050 2");
        assert_eq!(&records[1][1], "Sara \"S\" Noor");
    }

    #[test]
    fn csv_for_no_members_is_header_only() {
        let csv = members_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn xlsx_export_is_a_zip_container() {
        let bytes = members_xlsx(&[row(1, "Ali Khan", 10.0)]).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
