use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Locations a member can be registered under
///
/// The set is fixed; the display name is also the value stored in the
/// container and submitted by the add-member form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum City {
    Dubai,
    Sharjah,
    Ajman,
    AbuDhabi,
    Alain,
    NorthernEmirates,
}

impl City {
    pub const ALL: [City; 6] = [
        City::Dubai,
        City::Sharjah,
        City::Ajman,
        City::AbuDhabi,
        City::Alain,
        City::NorthernEmirates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            City::Dubai => "Dubai",
            City::Sharjah => "Sharjah",
            City::Ajman => "Ajman",
            City::AbuDhabi => "Abu Dhabi",
            City::Alain => "Alain",
            City::NorthernEmirates => "Northern Emirates",
        }
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for City {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        City::ALL
            .iter()
            .copied()
            .find(|city| city.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown city: {}", wanted))
    }
}

impl From<City> for String {
    fn from(city: City) -> Self {
        city.as_str().to_string()
    }
}

impl TryFrom<String> for City {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A registered member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: u32,
    pub full_name: String,
    pub initial: String,
    pub father_name: String,
    pub city: City,
    pub uae_address: String,
    pub home_address: String,
    pub contact_number: String,
    /// Free text, one relative per line or comma separated
    pub other_contacts: String,
    pub email: String,
    pub remarks: String,
}

/// Member fields as accepted from the form, before an id is assigned
#[derive(Debug, Clone, PartialEq)]
pub struct NewMember {
    pub full_name: String,
    pub initial: String,
    pub father_name: String,
    pub city: City,
    pub uae_address: String,
    pub home_address: String,
    pub contact_number: String,
    pub other_contacts: String,
    pub email: String,
    pub remarks: String,
}

impl NewMember {
    /// Minimal record with only the required fields filled in
    pub fn new(full_name: impl Into<String>, city: City) -> Self {
        NewMember {
            full_name: full_name.into(),
            initial: String::new(),
            father_name: String::new(),
            city,
            uae_address: String::new(),
            home_address: String::new(),
            contact_number: String::new(),
            other_contacts: String::new(),
            email: String::new(),
            remarks: String::new(),
        }
    }

    pub(crate) fn into_member(self, id: u32) -> Member {
        Member {
            id,
            full_name: self.full_name,
            initial: self.initial,
            father_name: self.father_name,
            city: self.city,
            uae_address: self.uae_address,
            home_address: self.home_address,
            contact_number: self.contact_number,
            other_contacts: self.other_contacts,
            email: self.email,
            remarks: self.remarks,
        }
    }
}

/// A dues payment recorded against a member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: u32,
    /// Expected to name an existing member; not checked.
    pub member_id: u32,
    pub payment_date: NaiveDate,
    /// Comma separated "YYYY-MM" tokens
    pub paid_months: String,
    pub amount: f64,
    pub remarks: String,
}

impl Payment {
    /// Month buckets this payment is attributed to.
    ///
    /// Each comma separated token is trimmed and cut to its first seven
    /// characters; blank tokens are skipped.
    pub fn months(&self) -> impl Iterator<Item = &str> + Clone {
        self.paid_months
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| match token.char_indices().nth(7) {
                Some((cut, _)) => &token[..cut],
                None => token,
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub payment_date: NaiveDate,
    pub paid_months: String,
    pub amount: f64,
    pub remarks: String,
}

impl NewPayment {
    pub(crate) fn into_payment(self, id: u32, member_id: u32) -> Payment {
        Payment {
            id,
            member_id,
            payment_date: self.payment_date,
            paid_months: self.paid_months,
            amount: self.amount,
            remarks: self.remarks,
        }
    }
}

/// Both tables of the container, loaded and saved as one unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub members: Vec<Member>,
    pub payments: Vec<Payment>,
}
