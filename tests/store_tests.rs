mod common;

use common::{member, payment, scratch_store};
use membership::report::{totals_by_city, totals_by_month};
use chrono::NaiveDate;
use membership::store::{MEMBER_COLUMNS, MEMBERS_SHEET, PAYMENT_COLUMNS, PAYMENTS_SHEET};
use membership::{AppError, City, MemberRegistry, PaymentLedger, TableStore, XlsxStore};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet};
use std::collections::BTreeMap;
use std::fs;

/// Add a sheet holding `header` and `rows` as plain text cells
fn add_text_sheet<'a>(
    workbook: &'a mut Workbook,
    name: &str,
    header: &[&str],
    rows: &[Vec<&str>],
) -> &'a mut Worksheet {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name).unwrap();
    for (c, text) in header.iter().enumerate() {
        sheet.write_string(0, c as u16, *text).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, text) in row.iter().enumerate() {
            sheet.write_string(r as u32 + 1, c as u16, *text).unwrap();
        }
    }
    sheet
}

#[test]
fn fresh_deployment_creates_headed_empty_container() {
    let (_dir, path, store) = scratch_store();
    assert!(!path.exists());

    let tables = store.load().unwrap();

    assert!(tables.members.is_empty());
    assert!(tables.payments.is_empty());
    assert!(path.exists());

    // A second store over the same file sees the same empty tables
    let again = XlsxStore::new(&path).load().unwrap();
    assert_eq!(again, tables);
}

#[test]
fn member_and_payment_scenario_on_disk() {
    let (_dir, path, store) = scratch_store();
    let registry = MemberRegistry::new(&store);
    let ledger = PaymentLedger::new(&store);

    assert_eq!(registry.add(member("Ali Khan", City::Dubai)).unwrap(), 1);
    assert_eq!(registry.add(member("Sara Noor", City::Sharjah)).unwrap(), 2);
    assert_eq!(ledger.add(1, payment(50.0, "2025-01")).unwrap(), 1);
    assert_eq!(ledger.add(2, payment(30.0, "2025-01,2025-02")).unwrap(), 2);

    // Everything goes through the file, so a new store sees it all
    let tables = XlsxStore::new(&path).load().unwrap();
    assert_eq!(
        totals_by_city(&tables.members, &tables.payments),
        BTreeMap::from([(City::Dubai, 50.0), (City::Sharjah, 30.0)])
    );
    assert_eq!(
        totals_by_month(&tables.payments),
        BTreeMap::from([("2025-01".to_string(), 80.0), ("2025-02".to_string(), 30.0)])
    );
    assert_eq!(tables.members[1].other_contacts, "Brother: 0501111111, Father: 0502222222");
}

#[test]
fn ids_keep_increasing_across_reopen() {
    let (_dir, path, store) = scratch_store();
    let registry = MemberRegistry::new(&store);
    for n in 1..=4 {
        assert_eq!(registry.add(member(&format!("Member {}", n), City::Ajman)).unwrap(), n);
    }

    let reopened = XlsxStore::new(&path);
    let registry = MemberRegistry::new(&reopened);
    assert_eq!(registry.add(member("Member 5", City::Alain)).unwrap(), 5);
    assert_eq!(registry.list().unwrap().len(), 5);
}

#[test]
fn save_of_load_is_idempotent() {
    let (_dir, path, store) = scratch_store();
    MemberRegistry::new(&store).add(member("Ali Khan", City::AbuDhabi)).unwrap();
    PaymentLedger::new(&store).add(1, payment(12.5, "2025-01")).unwrap();

    let before = store.load().unwrap();
    store.save(&before).unwrap();
    let after = XlsxStore::new(&path).load().unwrap();
    assert_eq!(before, after);
}

#[test]
fn workbook_missing_a_sheet_is_storage_unavailable() {
    let (_dir, path, store) = scratch_store();
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(MEMBERS_SHEET).unwrap();
    sheet.write_string(0, 0, "MemberID").unwrap();
    workbook.save(&path).unwrap();

    match store.load() {
        Err(AppError::StorageUnavailable(message)) => {
            assert!(message.contains("Full Name") || message.contains(PAYMENTS_SHEET))
        }
        other => panic!("expected storage error, got {:?}", other),
    }
}

#[test]
fn truncated_container_is_storage_unavailable() {
    let (_dir, path, store) = scratch_store();
    store.load().unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(matches!(store.load(), Err(AppError::StorageUnavailable(_))));
}

#[test]
fn payment_dates_entered_as_excel_dates_load() {
    let (_dir, path, store) = scratch_store();
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    let mut workbook = Workbook::new();
    add_text_sheet(
        &mut workbook,
        MEMBERS_SHEET,
        &MEMBER_COLUMNS,
        &[vec!["1", "Ali Khan", "", "", "Dubai"]],
    );
    let payments = add_text_sheet(
        &mut workbook,
        PAYMENTS_SHEET,
        &PAYMENT_COLUMNS,
        &[vec!["1", "1", "", "2025-01", "50"]],
    );
    let date = ExcelDateTime::from_ymd(2025, 1, 15).unwrap();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    payments
        .write_datetime_with_format(1, 2, &date, &date_format)
        .unwrap();
    workbook.save(&path).unwrap();

    let tables = store.load().unwrap();

    assert_eq!(tables.payments.len(), 1);
    assert_eq!(
        tables.payments[0].payment_date,
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    );
    assert_eq!(tables.payments[0].amount, 50.0);
    assert_eq!(tables.members[0].city, City::Dubai);
}

#[test]
fn columns_rearranged_by_hand_still_load() {
    let (_dir, path, store) = scratch_store();
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    let mut member_header = MEMBER_COLUMNS.to_vec();
    member_header.reverse();
    let mut payment_header = PAYMENT_COLUMNS.to_vec();
    payment_header.reverse();

    let mut workbook = Workbook::new();
    add_text_sheet(
        &mut workbook,
        MEMBERS_SHEET,
        &member_header,
        &[vec![
            "likes tea",
            "sara@example.com",
            "",
            "+971500000000",
            "Villa 4",
            "Flat 12",
            "Sharjah",
            "Noor Ahmed",
            "S",
            "Sara Noor",
            "7",
        ]],
    );
    add_text_sheet(
        &mut workbook,
        PAYMENTS_SHEET,
        &payment_header,
        &[vec!["cash", "30.5", "2025-02,2025-03", "2025-02-01", "7", "3"]],
    );
    workbook.save(&path).unwrap();

    let tables = store.load().unwrap();

    let sara = &tables.members[0];
    assert_eq!(sara.id, 7);
    assert_eq!(sara.full_name, "Sara Noor");
    assert_eq!(sara.father_name, "Noor Ahmed");
    assert_eq!(sara.city, City::Sharjah);
    assert_eq!(sara.remarks, "likes tea");

    let payment = &tables.payments[0];
    assert_eq!(payment.id, 3);
    assert_eq!(payment.member_id, 7);
    assert_eq!(payment.payment_date, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
    assert_eq!(payment.paid_months, "2025-02,2025-03");
    assert_eq!(payment.amount, 30.5);
    assert_eq!(payment.remarks, "cash");

    // The next id still follows the largest one in the file
    assert_eq!(
        MemberRegistry::new(&store).add(member("Omar Faris", City::Ajman)).unwrap(),
        8
    );
}
