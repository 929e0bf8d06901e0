//! Value objects for one purchase attempt.
//!
//! Everything here is transient: card credentials and purchase requests are
//! built for a single automation run and must never be written to durable
//! storage beyond the opaque card/cardholder ids.

use common::Money;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A product as presented at checkout time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductListing {
    /// Retailer-side handle used by the automation to reach the product page.
    pub handle: String,
    pub name: String,
    /// Base (retailer) price before fees.
    pub base_price: Money,
    pub image_url: Option<String>,
}

impl ProductListing {
    /// Validates the fields required before anything is charged.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.handle.trim().is_empty() {
            return Err(DomainError::MissingField("product handle"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::MissingField("product name"));
        }
        if !self.base_price.is_positive() {
            return Err(DomainError::NonPositivePrice(self.base_price));
        }
        Ok(())
    }
}

/// A postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    /// Field-wise equality for deciding whether a separate billing form is
    /// needed: text fields compare case-insensitively, the postal code must
    /// match exactly.
    pub fn matches(&self, other: &Address) -> bool {
        self.line1.eq_ignore_ascii_case(&other.line1)
            && self.city.eq_ignore_ascii_case(&other.city)
            && self.state.eq_ignore_ascii_case(&other.state)
            && self.postal_code == other.postal_code
            && self.country.eq_ignore_ascii_case(&other.country)
    }

    /// Fixed fallback used when a customer supplied no billing address.
    pub fn default_billing() -> Self {
        Self {
            line1: "123 Main Street".to_string(),
            line2: None,
            city: "San Francisco".to_string(),
            state: "CA".to_string(),
            postal_code: "94111".to_string(),
            country: "US".to_string(),
        }
    }
}

/// Full credentials of a disposable virtual card.
///
/// The number and CVC are only ever held in memory for the duration of one
/// automation attempt. The `Debug` impl redacts them so they cannot leak
/// through logs or error payloads.
#[derive(Clone, PartialEq, Eq)]
pub struct CardCredentials {
    pub card_id: String,
    pub number: String,
    /// Expiry as `MM/YY`.
    pub expiry: String,
    pub cvc: String,
}

impl CardCredentials {
    /// The card number grouped in blocks of four, as some payment forms
    /// require (`"4242 4242 4242 4242"`).
    pub fn grouped_number(&self) -> String {
        self.number
            .as_bytes()
            .chunks(4)
            .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Expiry in the spaced `MM / YY` form some payment forms expect.
    pub fn spaced_expiry(&self) -> String {
        match self.expiry.split_once('/') {
            Some((m, y)) => format!("{m} / {y}"),
            None if self.expiry.len() == 4 => {
                format!("{} / {}", &self.expiry[..2], &self.expiry[2..])
            }
            None => self.expiry.clone(),
        }
    }
}

impl std::fmt::Debug for CardCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardCredentials")
            .field("card_id", &self.card_id)
            .field("number", &"[redacted]")
            .field("expiry", &self.expiry)
            .field("cvc", &"[redacted]")
            .finish()
    }
}

/// Billing identity registered with the card-issuing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingIdentity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub billing_address: Address,
}

impl BillingIdentity {
    /// Derives an identity from whatever the checkout customer entered.
    ///
    /// When no name was captured, the email local-part stands in for the
    /// first name; a missing surname falls back to `"User"`. A missing
    /// billing address falls back to the fixed default.
    pub fn derive(
        name: Option<&str>,
        email: &str,
        phone: Option<&str>,
        billing_address: Option<Address>,
    ) -> Self {
        let fallback = email.split('@').next().unwrap_or(email);
        let name = match name {
            Some(n) if !n.trim().is_empty() => n.trim(),
            _ => fallback,
        };

        let (first_name, last_name) = match name.split_once(' ') {
            Some((first, rest)) => (first.to_string(), rest.to_string()),
            None => (name.to_string(), "User".to_string()),
        };

        Self {
            first_name,
            last_name,
            email: email.to_string(),
            phone: phone.map(String::from),
            billing_address: billing_address.unwrap_or_else(Address::default_billing),
        }
    }

    /// The full name as printed on the card.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The exact payload handed to a purchase automation routine.
///
/// Constructed fresh per attempt and never stored.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub product_handle: String,
    pub credentials: CardCredentials,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub shipping_address: Address,
    /// Present only when it may differ from the shipping address.
    pub billing_address: Option<Address>,
}

impl PurchaseRequest {
    /// The cardholder name filled into payment forms.
    pub fn cardholder_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// True when a separate billing form must be filled.
    pub fn needs_billing_form(&self) -> bool {
        self.billing_address
            .as_ref()
            .is_some_and(|billing| !billing.matches(&self.shipping_address))
    }
}
