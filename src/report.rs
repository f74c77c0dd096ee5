//! Aggregate views over the Members and Payments tables.
//!
//! All functions are pure: callers load the tables once and pass them in.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::ledger;
use crate::models::{City, Member, Payment, Tables};

/// Headline figures shown at the top of the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_members: usize,
    pub total_payments: usize,
    pub total_revenue: f64,
}

/// A member together with everything they have paid so far
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberTotal {
    #[serde(flatten)]
    pub member: Member,
    pub total_paid: f64,
}

pub fn summary(tables: &Tables) -> Summary {
    Summary {
        total_members: tables.members.len(),
        total_payments: tables.payments.len(),
        total_revenue: tables.payments.iter().map(|p| p.amount).sum(),
    }
}

/// Revenue per city
///
/// Payments are joined to members on id; a payment whose member does not
/// exist is left out.
pub fn totals_by_city(members: &[Member], payments: &[Payment]) -> BTreeMap<City, f64> {
    let city_of: HashMap<u32, City> = members.iter().map(|m| (m.id, m.city)).collect();

    let mut totals = BTreeMap::new();
    for payment in payments {
        if let Some(city) = city_of.get(&payment.member_id) {
            *totals.entry(*city).or_insert(0.0) += payment.amount;
        }
    }
    totals
}

/// Revenue per paid month, keyed by "YYYY-MM" and sorted
///
/// A payment covering several months adds its whole amount to each of them.
pub fn totals_by_month(payments: &[Payment]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for payment in payments {
        for month in payment.months() {
            *totals.entry(month.to_string()).or_insert(0.0) += payment.amount;
        }
    }
    totals
}

/// Every member with their total paid, in member order
pub fn member_totals(members: &[Member], payments: &[Payment]) -> Vec<MemberTotal> {
    members
        .iter()
        .map(|m| MemberTotal {
            member: m.clone(),
            total_paid: ledger::total_for(payments, m.id),
        })
        .collect()
}
