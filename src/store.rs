//! Persistence of the Members and Payments tables.
//!
//! The container is a single `.xlsx` workbook with one sheet per table. It is
//! read completely on every [`TableStore::load`] and rewritten completely on
//! every [`TableStore::save`]; there is no locking, so two writers racing on
//! the same file keep only the later save.

use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use chrono::NaiveDate;
use log::{debug, info};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::models::{Member, Payment, Tables};

pub const MEMBERS_SHEET: &str = "Members";
pub const PAYMENTS_SHEET: &str = "Payments";

pub const MEMBER_COLUMNS: [&str; 11] = [
    "MemberID",
    "Full Name",
    "Initial",
    "Father Name",
    "City",
    "UAE Address",
    "Home Address",
    "Contact Number",
    "Other Contacts",
    "Email",
    "Remarks",
];

pub const PAYMENT_COLUMNS: [&str; 6] = [
    "PaymentID",
    "MemberID",
    "Payment Date",
    "Paid Months",
    "Amount",
    "Remarks",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Load/save access to the two tables
///
/// Registry, ledger and reports only ever see this trait, so tests can swap
/// the workbook for [`MemoryStore`].
pub trait TableStore: Send + Sync {
    /// Read both tables, creating an empty container first if none exists.
    fn load(&self) -> AppResult<Tables>;

    /// Overwrite the container with `tables`.
    fn save(&self, tables: &Tables) -> AppResult<()>;
}

/// Tables kept in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(tables: Tables) -> Self {
        MemoryStore {
            tables: RwLock::new(tables),
        }
    }
}

impl TableStore for MemoryStore {
    fn load(&self) -> AppResult<Tables> {
        self.tables
            .read()
            .map(|tables| tables.clone())
            .map_err(|_| AppError::storage("in-memory tables poisoned"))
    }

    fn save(&self, tables: &Tables) -> AppResult<()> {
        let mut current = self
            .tables
            .write()
            .map_err(|_| AppError::storage("in-memory tables poisoned"))?;
        *current = tables.clone();
        Ok(())
    }
}

/// Tables persisted to an `.xlsx` workbook on disk
#[derive(Debug, Clone)]
pub struct XlsxStore {
    path: PathBuf,
}

impl XlsxStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        XlsxStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the container with headed, empty tables if it is missing
    ///
    /// Returns `true` when a new file was written.
    pub fn ensure_exists(&self) -> AppResult<bool> {
        if self.path.exists() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }

        self.save(&Tables::default())?;
        info!("Created empty container at {}", self.path.display());
        Ok(true)
    }
}

impl TableStore for XlsxStore {
    fn load(&self) -> AppResult<Tables> {
        self.ensure_exists()?;

        let mut workbook: Xlsx<_> = open_workbook(&self.path).map_err(AppError::storage)?;

        let members_range = workbook
            .worksheet_range(MEMBERS_SHEET)
            .map_err(|e| AppError::storage(format!("sheet {}: {}", MEMBERS_SHEET, e)))?;
        let payments_range = workbook
            .worksheet_range(PAYMENTS_SHEET)
            .map_err(|e| AppError::storage(format!("sheet {}: {}", PAYMENTS_SHEET, e)))?;

        let members = read_rows(&members_range, MEMBERS_SHEET, &MEMBER_COLUMNS)?
            .iter()
            .enumerate()
            .map(|(n, row)| member_from_row(row).map_err(|e| row_error(MEMBERS_SHEET, n, e)))
            .collect::<AppResult<Vec<_>>>()?;

        let payments = read_rows(&payments_range, PAYMENTS_SHEET, &PAYMENT_COLUMNS)?
            .iter()
            .enumerate()
            .map(|(n, row)| payment_from_row(row).map_err(|e| row_error(PAYMENTS_SHEET, n, e)))
            .collect::<AppResult<Vec<_>>>()?;

        debug!(
            "Loaded {} members and {} payments from {}",
            members.len(),
            payments.len(),
            self.path.display()
        );

        Ok(Tables { members, payments })
    }

    fn save(&self, tables: &Tables) -> AppResult<()> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();

        let mut members = Worksheet::new();
        members.set_name(MEMBERS_SHEET).map_err(AppError::storage)?;
        write_header(&mut members, &MEMBER_COLUMNS, &header)?;
        for (r, member) in tables.members.iter().enumerate() {
            write_member(&mut members, r as u32 + 1, member).map_err(AppError::storage)?;
        }
        workbook.push_worksheet(members);

        let mut payments = Worksheet::new();
        payments.set_name(PAYMENTS_SHEET).map_err(AppError::storage)?;
        write_header(&mut payments, &PAYMENT_COLUMNS, &header)?;
        for (r, payment) in tables.payments.iter().enumerate() {
            write_payment(&mut payments, r as u32 + 1, payment).map_err(AppError::storage)?;
        }
        workbook.push_worksheet(payments);

        workbook.save(&self.path).map_err(AppError::storage)?;

        debug!(
            "Saved {} members and {} payments to {}",
            tables.members.len(),
            tables.payments.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn write_header(sheet: &mut Worksheet, columns: &[&str], format: &Format) -> AppResult<()> {
    for (c, name) in columns.iter().enumerate() {
        sheet
            .write_string_with_format(0, c as u16, *name, format)
            .map_err(AppError::storage)?;
    }
    Ok(())
}

fn write_member(
    sheet: &mut Worksheet,
    row: u32,
    m: &Member,
) -> Result<(), rust_xlsxwriter::XlsxError> {
    sheet.write_number(row, 0, m.id as f64)?;
    let text = [
        m.full_name.as_str(),
        m.initial.as_str(),
        m.father_name.as_str(),
        m.city.as_str(),
        m.uae_address.as_str(),
        m.home_address.as_str(),
        m.contact_number.as_str(),
        m.other_contacts.as_str(),
        m.email.as_str(),
        m.remarks.as_str(),
    ];
    for (offset, value) in text.iter().enumerate() {
        sheet.write_string(row, offset as u16 + 1, *value)?;
    }
    Ok(())
}

fn write_payment(
    sheet: &mut Worksheet,
    row: u32,
    p: &Payment,
) -> Result<(), rust_xlsxwriter::XlsxError> {
    sheet.write_number(row, 0, p.id as f64)?;
    sheet.write_number(row, 1, p.member_id as f64)?;
    let date = p.payment_date.format(DATE_FORMAT).to_string();
    sheet.write_string(row, 2, &date)?;
    sheet.write_string(row, 3, &p.paid_months)?;
    sheet.write_number(row, 4, p.amount)?;
    sheet.write_string(row, 5, &p.remarks)?;
    Ok(())
}

/// Body rows of a sheet with cells reordered to `columns`
///
/// Columns are matched by header text, so a workbook whose columns were
/// rearranged by hand still loads. Fully blank rows are skipped.
fn read_rows(range: &Range<Data>, sheet: &str, columns: &[&str]) -> AppResult<Vec<Vec<String>>> {
    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(cell_text).collect(),
        None => return Err(AppError::storage(format!("sheet {} has no header row", sheet))),
    };

    let positions = columns
        .iter()
        .map(|name| {
            header
                .iter()
                .position(|h| h.trim() == *name)
                .ok_or_else(|| AppError::storage(format!("sheet {} is missing column {}", sheet, name)))
        })
        .collect::<AppResult<Vec<usize>>>()?;

    Ok(rows
        .filter(|cells| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|cells| {
            positions
                .iter()
                .map(|&i| cells.get(i).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        // Excel date cells would otherwise print as serial numbers
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|value| value.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| cell.to_string()),
        Data::DateTimeIso(s) => s.clone(),
        other => other.to_string(),
    }
}

fn row_error(sheet: &str, index: usize, message: String) -> AppError {
    // +2: one for the header row, one for 1-based numbering
    AppError::storage(format!("sheet {} row {}: {}", sheet, index + 2, message))
}

fn parse_id(value: &str, column: &str) -> Result<u32, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{} is not an id: {:?}", column, value))
}

fn member_from_row(row: &[String]) -> Result<Member, String> {
    Ok(Member {
        id: parse_id(&row[0], MEMBER_COLUMNS[0])?,
        full_name: row[1].clone(),
        initial: row[2].clone(),
        father_name: row[3].clone(),
        city: row[4].parse()?,
        uae_address: row[5].clone(),
        home_address: row[6].clone(),
        contact_number: row[7].clone(),
        other_contacts: row[8].clone(),
        email: row[9].clone(),
        remarks: row[10].clone(),
    })
}

fn payment_from_row(row: &[String]) -> Result<Payment, String> {
    let date_text = row[2].trim();
    // Accept "YYYY-MM-DD" with or without a trailing time part
    let date_part = date_text.get(..10).unwrap_or(date_text);
    let payment_date = NaiveDate::parse_from_str(date_part, DATE_FORMAT)
        .map_err(|_| format!("Payment Date is not a date: {:?}", date_text))?;

    let amount: f64 = row[4]
        .trim()
        .parse()
        .map_err(|_| format!("Amount is not a number: {:?}", row[4]))?;

    Ok(Payment {
        id: parse_id(&row[0], PAYMENT_COLUMNS[0])?,
        member_id: parse_id(&row[1], PAYMENT_COLUMNS[1])?,
        payment_date,
        paid_months: row[3].clone(),
        amount,
        remarks: row[5].clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::City;
    use std::fs;
    use tempfile::tempdir;

    fn sample_tables() -> Tables {
        Tables {
            members: vec![Member {
                id: 1,
                full_name: "Ali Khan".to_string(),
                initial: "A".to_string(),
                father_name: "Karim Khan".to_string(),
                city: City::AbuDhabi,
                uae_address: "Villa 4, Street 12".to_string(),
                home_address: "Kozhikode".to_string(),
                contact_number: "+971500000001".to_string(),
                other_contacts: "Brother: 0500000002\nCousin: 0500000003".to_string(),
                email: "ali@example.com".to_string(),
                remarks: String::new(),
            }],
            payments: vec![Payment {
                id: 1,
                member_id: 1,
                payment_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
                paid_months: "2025-01,2025-02".to_string(),
                amount: 42.5,
                remarks: "cash".to_string(),
            }],
        }
    }

    #[test]
    fn load_creates_missing_container_with_empty_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("members.xlsx");
        let store = XlsxStore::new(&path);

        let tables = store.load().unwrap();

        assert!(tables.members.is_empty());
        assert!(tables.payments.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = XlsxStore::new(dir.path().join("members.xlsx"));
        let tables = sample_tables();

        store.save(&tables).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, tables);

        store.save(&loaded).unwrap();
        assert_eq!(store.load().unwrap(), tables);
    }

    #[test]
    fn corrupted_container_is_storage_unavailable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("members.xlsx");
        fs::write(&path, b"definitely not a workbook").unwrap();

        let err = XlsxStore::new(&path).load().unwrap_err();
        assert!(matches!(err, AppError::StorageUnavailable(_)));
    }

    #[test]
    fn memory_store_keeps_last_save() {
        let store = MemoryStore::new();
        assert_eq!(store.load().unwrap(), Tables::default());

        store.save(&sample_tables()).unwrap();
        assert_eq!(store.load().unwrap(), sample_tables());
    }
}
