//! Form boundary: raw submitted fields in, typed records out.
//!
//! [`FormController`] keeps nothing between requests; everything it needs is
//! reloaded from the store it is given.

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::downloader;
use crate::error::{AppError, AppResult};
use crate::ledger::{self, PaymentLedger};
use crate::models::{City, Member, NewMember, NewPayment, Payment};
use crate::registry::MemberRegistry;
use crate::report::{self, MemberTotal, Summary};
use crate::store::TableStore;

/// Add-member form as submitted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberForm {
    pub full_name: String,
    pub initial: String,
    pub father_name: String,
    pub city: String,
    pub uae_address: String,
    pub home_address: String,
    pub contact_number: String,
    pub other_contacts: String,
    pub email: String,
    pub remarks: String,
}

impl MemberForm {
    /// Full name and city are required; everything else is optional text.
    pub fn validate(&self) -> AppResult<NewMember> {
        let full_name = required(&self.full_name, "Full Name")?;
        let city_text = required(&self.city, "City")?;
        let city: City = city_text.parse().map_err(AppError::Validation)?;

        Ok(NewMember {
            full_name,
            initial: self.initial.trim().to_string(),
            father_name: self.father_name.trim().to_string(),
            city,
            uae_address: self.uae_address.trim().to_string(),
            home_address: self.home_address.trim().to_string(),
            contact_number: self.contact_number.trim().to_string(),
            other_contacts: self.other_contacts.trim().to_string(),
            email: self.email.trim().to_string(),
            remarks: self.remarks.trim().to_string(),
        })
    }
}

/// Record-payment form as submitted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentForm {
    pub member_id: String,
    pub paid_months: String,
    pub amount: String,
    pub payment_date: String,
    pub remarks: String,
}

impl PaymentForm {
    /// Returns the target member id and the payment to record
    ///
    /// A blank date means `today`.
    pub fn validate(&self, today: NaiveDate) -> AppResult<(u32, NewPayment)> {
        let member_id: u32 = required(&self.member_id, "Member")?
            .parse()
            .map_err(|_| AppError::validation("Select a member"))?;

        let paid_months = required(&self.paid_months, "Paid Months")?;

        let amount: f64 = required(&self.amount, "Amount")?
            .parse()
            .map_err(|_| AppError::validation("Amount must be a number"))?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(AppError::validation("Amount cannot be negative"));
        }

        let payment_date = match self.payment_date.trim() {
            "" => today,
            text => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map_err(|_| AppError::validation("Payment Date must be YYYY-MM-DD"))?,
        };

        Ok((
            member_id,
            NewPayment {
                payment_date,
                paid_months,
                amount,
                remarks: self.remarks.trim().to_string(),
            },
        ))
    }
}

fn required(value: &str, label: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{} is required", label)));
    }
    Ok(value.to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub summary: Summary,
    pub by_city: BTreeMap<City, f64>,
    pub by_month: BTreeMap<String, f64>,
    /// False until there is at least one member and one payment
    pub has_data: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberDetail {
    pub member: Member,
    pub payments: Vec<Payment>,
    pub total_paid: f64,
}

/// Request glue between submitted forms and the registry, ledger and reports
pub struct FormController<'a> {
    store: &'a dyn TableStore,
}

impl<'a> FormController<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        FormController { store }
    }

    pub fn submit_member(&self, form: &MemberForm) -> AppResult<u32> {
        let member = form.validate().inspect_err(|e| warn!("Add member rejected: {}", e))?;
        MemberRegistry::new(self.store).add(member)
    }

    pub fn submit_payment(&self, form: &PaymentForm, today: NaiveDate) -> AppResult<u32> {
        let (member_id, payment) = form
            .validate(today)
            .inspect_err(|e| warn!("Record payment rejected: {}", e))?;
        PaymentLedger::new(self.store).add(member_id, payment)
    }

    pub fn members(&self) -> AppResult<Vec<Member>> {
        MemberRegistry::new(self.store).list()
    }

    pub fn dashboard(&self) -> AppResult<Dashboard> {
        let tables = self.store.load()?;
        Ok(Dashboard {
            summary: report::summary(&tables),
            by_city: report::totals_by_city(&tables.members, &tables.payments),
            by_month: report::totals_by_month(&tables.payments),
            has_data: !tables.members.is_empty() && !tables.payments.is_empty(),
        })
    }

    pub fn members_overview(&self) -> AppResult<Vec<MemberTotal>> {
        let tables = self.store.load()?;
        Ok(report::member_totals(&tables.members, &tables.payments))
    }

    pub fn member_detail(&self, id: u32) -> AppResult<Option<MemberDetail>> {
        let tables = self.store.load()?;
        let Some(member) = tables.members.iter().find(|m| m.id == id).cloned() else {
            return Ok(None);
        };

        let payments: Vec<Payment> = ledger::payments_for(&tables.payments, id).cloned().collect();
        let total_paid = payments.iter().map(|p| p.amount).sum();
        Ok(Some(MemberDetail {
            member,
            payments,
            total_paid,
        }))
    }

    pub fn members_csv(&self) -> AppResult<String> {
        downloader::members_csv(&self.members_overview()?)
    }

    pub fn members_xlsx(&self) -> AppResult<Vec<u8>> {
        downloader::members_xlsx(&self.members_overview()?)
    }
}
