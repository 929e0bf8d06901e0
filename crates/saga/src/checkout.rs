//! Checkout session creation.
//!
//! Computes the grossed-up final price and opens the gateway hold the
//! frontend renders its payment form against. Reuses the user's cached
//! gateway customer so repeat buyers keep one customer record.

use common::{Money, UserId};
use domain::{ProductListing, pricing};
use store::UserStore;

use crate::error::SagaError;
use crate::services::gateway::{LineItem, PaymentGateway};

/// An open checkout session ready for the frontend.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub session_id: String,
    pub client_secret: String,
    /// The grossed-up amount actually charged.
    pub amount: Money,
}

/// Opens checkout sessions for product listings.
pub struct CheckoutService<G, U> {
    gateway: G,
    users: U,
}

impl<G, U> CheckoutService<G, U>
where
    G: PaymentGateway,
    U: UserStore,
{
    pub fn new(gateway: G, users: U) -> Self {
        Self { gateway, users }
    }

    /// Validates the listing, computes the final price, and opens a hold.
    #[tracing::instrument(skip(self, listing), fields(product = %listing.handle))]
    pub async fn open_session(
        &self,
        user_id: UserId,
        listing: &ProductListing,
    ) -> Result<CheckoutSession, SagaError> {
        listing
            .validate()
            .map_err(|e| SagaError::Validation(e.to_string()))?;
        let amount =
            pricing::final_price(listing.base_price).map_err(|e| SagaError::Validation(e.to_string()))?;

        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or(SagaError::UserNotFound(user_id))?;

        let hold = self
            .gateway
            .open_hold(
                amount,
                LineItem {
                    name: listing.name.clone(),
                    image_url: listing.image_url.clone(),
                },
                user.customer_id.as_deref(),
            )
            .await?;

        metrics::counter!("checkout_sessions_total").increment(1);
        tracing::info!(session_id = %hold.session_id, amount = %amount, "checkout session opened");

        Ok(CheckoutSession {
            session_id: hold.session_id,
            client_secret: hold.client_secret,
            amount,
        })
    }
}
