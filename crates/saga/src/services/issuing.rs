//! Card issuing trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::UserId;
use domain::{BillingIdentity, CardCredentials};

use crate::error::SagaError;

/// A registered cardholder, as read back from the issuer.
#[derive(Debug, Clone)]
pub struct CardholderRecord {
    pub id: String,
    pub identity: BillingIdentity,
}

/// Metadata attached to an issued card for later reconciliation.
#[derive(Debug, Clone)]
pub struct CardMetadata {
    pub session_id: String,
    pub user_id: UserId,
}

/// Trait for the service issuing disposable virtual cards.
#[async_trait]
pub trait CardIssuer: Send + Sync {
    /// Registers a cardholder and returns its id.
    async fn create_cardholder(&self, identity: &BillingIdentity) -> Result<String, SagaError>;

    /// Issues an active virtual card for the cardholder.
    async fn create_virtual_card(
        &self,
        cardholder_id: &str,
        metadata: &CardMetadata,
    ) -> Result<String, SagaError>;

    /// Privileged read of the card's full number, expiry, and CVC.
    async fn get_card_credentials(&self, card_id: &str) -> Result<CardCredentials, SagaError>;

    /// Reads a cardholder's registered billing identity.
    async fn get_cardholder(&self, cardholder_id: &str) -> Result<CardholderRecord, SagaError>;

    /// Permanently deactivates a card so it can never authorize again.
    async fn deactivate_card(&self, card_id: &str) -> Result<(), SagaError>;
}

#[async_trait]
impl<T: CardIssuer + ?Sized> CardIssuer for std::sync::Arc<T> {
    async fn create_cardholder(&self, identity: &BillingIdentity) -> Result<String, SagaError> {
        (**self).create_cardholder(identity).await
    }

    async fn create_virtual_card(
        &self,
        cardholder_id: &str,
        metadata: &CardMetadata,
    ) -> Result<String, SagaError> {
        (**self).create_virtual_card(cardholder_id, metadata).await
    }

    async fn get_card_credentials(&self, card_id: &str) -> Result<CardCredentials, SagaError> {
        (**self).get_card_credentials(card_id).await
    }

    async fn get_cardholder(&self, cardholder_id: &str) -> Result<CardholderRecord, SagaError> {
        (**self).get_cardholder(cardholder_id).await
    }

    async fn deactivate_card(&self, card_id: &str) -> Result<(), SagaError> {
        (**self).deactivate_card(card_id).await
    }
}

#[derive(Debug, Default)]
struct InMemoryIssuerState {
    cardholders: HashMap<String, BillingIdentity>,
    cards: HashMap<String, CardRecord>,
    next_id: u32,
    fail_on_create_cardholder: bool,
    fail_on_create_card: bool,
    fail_on_credentials: bool,
    fail_on_deactivate: bool,
    deactivated_count: u32,
}

#[derive(Debug)]
struct CardRecord {
    cardholder_id: String,
    active: bool,
}

/// In-memory card issuer for testing and default wiring.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCardIssuer {
    state: Arc<RwLock<InMemoryIssuerState>>,
}

impl InMemoryCardIssuer {
    /// Creates a new in-memory issuer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the issuer to fail the next `create_cardholder` call.
    pub fn set_fail_on_create_cardholder(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create_cardholder = fail;
    }

    /// Configures the issuer to fail the next `create_virtual_card` call.
    pub fn set_fail_on_create_card(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create_card = fail;
    }

    /// Configures the issuer to fail the credential read while still
    /// letting card creation succeed. Exercises the partial-success path.
    pub fn set_fail_on_credentials(&self, fail: bool) {
        self.state.write().unwrap().fail_on_credentials = fail;
    }

    /// Configures the issuer to fail the next `deactivate_card` call.
    pub fn set_fail_on_deactivate(&self, fail: bool) {
        self.state.write().unwrap().fail_on_deactivate = fail;
    }

    /// Returns the number of registered cardholders.
    pub fn cardholder_count(&self) -> usize {
        self.state.read().unwrap().cardholders.len()
    }

    /// Returns the number of cards still able to authorize.
    pub fn active_card_count(&self) -> usize {
        self.state
            .read()
            .unwrap()
            .cards
            .values()
            .filter(|c| c.active)
            .count()
    }

    /// Returns how many cards have been deactivated.
    pub fn deactivated_count(&self) -> u32 {
        self.state.read().unwrap().deactivated_count
    }
}

#[async_trait]
impl CardIssuer for InMemoryCardIssuer {
    async fn create_cardholder(&self, identity: &BillingIdentity) -> Result<String, SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create_cardholder {
            return Err(SagaError::Issuing("cardholder rejected".to_string()));
        }

        state.next_id += 1;
        let id = format!("ich_{:04}", state.next_id);
        state.cardholders.insert(id.clone(), identity.clone());
        Ok(id)
    }

    async fn create_virtual_card(
        &self,
        cardholder_id: &str,
        _metadata: &CardMetadata,
    ) -> Result<String, SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create_card {
            return Err(SagaError::Issuing("card issuance declined".to_string()));
        }
        if !state.cardholders.contains_key(cardholder_id) {
            return Err(SagaError::Issuing(format!(
                "no such cardholder: {cardholder_id}"
            )));
        }

        state.next_id += 1;
        let card_id = format!("ic_{:04}", state.next_id);
        state.cards.insert(
            card_id.clone(),
            CardRecord {
                cardholder_id: cardholder_id.to_string(),
                active: true,
            },
        );
        Ok(card_id)
    }

    async fn get_card_credentials(&self, card_id: &str) -> Result<CardCredentials, SagaError> {
        let state = self.state.read().unwrap();

        if state.fail_on_credentials {
            return Err(SagaError::Issuing("credential read failed".to_string()));
        }

        let card = state
            .cards
            .get(card_id)
            .ok_or_else(|| SagaError::Issuing(format!("no such card: {card_id}")))?;
        if !card.active {
            return Err(SagaError::Issuing(format!("card deactivated: {card_id}")));
        }

        Ok(CardCredentials {
            card_id: card_id.to_string(),
            number: "4242424242424242".to_string(),
            expiry: "11/27".to_string(),
            cvc: "123".to_string(),
        })
    }

    async fn get_cardholder(&self, cardholder_id: &str) -> Result<CardholderRecord, SagaError> {
        let state = self.state.read().unwrap();
        let identity = state
            .cardholders
            .get(cardholder_id)
            .cloned()
            .ok_or_else(|| SagaError::Issuing(format!("no such cardholder: {cardholder_id}")))?;
        Ok(CardholderRecord {
            id: cardholder_id.to_string(),
            identity,
        })
    }

    async fn deactivate_card(&self, card_id: &str) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_deactivate {
            return Err(SagaError::Issuing("deactivation failed".to_string()));
        }

        let card = state
            .cards
            .get_mut(card_id)
            .ok_or_else(|| SagaError::Issuing(format!("no such card: {card_id}")))?;
        if card.active {
            card.active = false;
            state.deactivated_count += 1;
        }
        Ok(())
    }
}
