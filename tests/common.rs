#![allow(dead_code)]
use chrono::NaiveDate;
use membership::{City, NewMember, NewPayment, XlsxStore};
use std::path::PathBuf;
use tempfile::TempDir;

/// Scratch workbook path inside a fresh temp dir; the file itself does not exist yet
pub fn scratch_store() -> (TempDir, PathBuf, XlsxStore) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("data").join("members.xlsx");
    let store = XlsxStore::new(&path);
    (dir, path, store)
}

pub fn member(name: &str, city: City) -> NewMember {
    let mut member = NewMember::new(name, city);
    member.contact_number = "+971500000000".to_string();
    member.other_contacts = "Brother: 0501111111, Father: 0502222222".to_string();
    member
}

pub fn payment(amount: f64, months: &str) -> NewPayment {
    NewPayment {
        payment_date: NaiveDate::from_ymd_opt(2025, 1, 20).expect("valid date"),
        paid_months: months.to_string(),
        amount,
        remarks: String::new(),
    }
}
