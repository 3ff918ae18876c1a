//! Domain Model
//!
//! The person record served by the cache and its optional address. A
//! `Person` owns its `Address` by value; there is no back-reference.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A person in the authoritative dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Stable surrogate key
    pub id: i64,

    /// Full name
    pub name: String,

    /// National identifier code (CPF, `000.000.000-00`)
    #[serde(rename = "cpf")]
    pub national_id: String,

    /// Date of birth
    pub birth_date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,

    /// One-to-one location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl Person {
    /// Create a person with the mandatory fields set.
    pub fn new(
        id: i64,
        name: impl Into<String>,
        national_id: impl Into<String>,
        birth_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            national_id: national_id.into(),
            birth_date,
            phone_number: None,
            email: None,
            created_at: None,
            updated_at: None,
            address: None,
        }
    }

    /// Attach an address.
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Set the contact fields.
    pub fn with_contact(mut self, phone_number: Option<String>, email: Option<String>) -> Self {
        self.phone_number = phone_number;
        self.email = email;
        self
    }

    pub fn city(&self) -> Option<&str> {
        self.address.as_ref().and_then(|a| a.city.as_deref())
    }

    pub fn state(&self) -> Option<&str> {
        self.address.as_ref().and_then(|a| a.state.as_deref())
    }

    pub fn country(&self) -> Option<&str> {
        self.address.as_ref().and_then(|a| a.country.as_deref())
    }
}

/// Postal location of a person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Address {
    /// Address with the three indexed fields set.
    pub fn new(
        country: impl Into<String>,
        state: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            country: Some(country.into()),
            state: Some(state.into()),
            city: Some(city.into()),
            ..Default::default()
        }
    }
}
