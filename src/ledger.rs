use log::info;

use crate::error::AppResult;
use crate::models::{NewPayment, Payment};
use crate::registry::next_id;
use crate::store::TableStore;

/// Records payments and answers per-member questions about them
pub struct PaymentLedger<'a> {
    store: &'a dyn TableStore,
}

impl<'a> PaymentLedger<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        PaymentLedger { store }
    }

    /// Record a payment for `member_id` and return its id
    ///
    /// The member is not looked up; a payment for an unknown id is stored as
    /// is.
    pub fn add(&self, member_id: u32, payment: NewPayment) -> AppResult<u32> {
        let mut tables = self.store.load()?;
        let id = next_id(tables.payments.iter().map(|p| p.id))?;

        tables.payments.push(payment.into_payment(id, member_id));
        self.store.save(&tables)?;

        info!("Payment {} recorded for member {}", id, member_id);
        Ok(id)
    }

    pub fn list(&self) -> AppResult<Vec<Payment>> {
        Ok(self.store.load()?.payments)
    }

    pub fn payments_for(&self, member_id: u32) -> AppResult<Vec<Payment>> {
        let payments = self.list()?;
        Ok(payments_for(&payments, member_id).cloned().collect())
    }

    pub fn total_for(&self, member_id: u32) -> AppResult<f64> {
        Ok(total_for(&self.list()?, member_id))
    }
}

/// Payments belonging to `member_id`, in table order
///
/// The iterator is `Clone`, so it can be walked again without reloading.
pub fn payments_for(payments: &[Payment], member_id: u32) -> impl Iterator<Item = &Payment> + Clone {
    payments.iter().filter(move |p| p.member_id == member_id)
}

/// Sum of amounts paid by `member_id`; 0 when there are no payments
pub fn total_for(payments: &[Payment], member_id: u32) -> f64 {
    payments_for(payments, member_id).map(|p| p.amount).sum()
}
