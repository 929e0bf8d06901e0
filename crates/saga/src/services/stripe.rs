//! Stripe-backed implementations of the gateway and issuing traits.
//!
//! Talks to the Stripe REST API directly with form-encoded requests. One
//! client implements both [`PaymentGateway`] and [`CardIssuer`] since both
//! concerns live behind the same account and secret key.

use async_trait::async_trait;
use common::Money;
use domain::{Address, BillingIdentity, CardCredentials};
use serde::Deserialize;
use url::Url;

use crate::error::SagaError;
use crate::services::gateway::{
    CheckoutHold, GatewayCustomer, LineItem, PaymentGateway, SessionDetails,
};
use crate::services::issuing::{CardIssuer, CardMetadata, CardholderRecord};

const DEFAULT_BASE_URL: &str = "https://api.stripe.com/";

/// Thin Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base_url: Url,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct ApiSession {
    id: String,
    client_secret: Option<String>,
    payment_intent: Option<String>,
    customer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiAddress {
    line1: Option<String>,
    line2: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCustomer {
    id: String,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<ApiAddress>,
}

#[derive(Debug, Deserialize)]
struct ApiRefund {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiCardholder {
    id: String,
    name: Option<String>,
    email: Option<String>,
    phone_number: Option<String>,
    billing: Option<ApiBilling>,
}

#[derive(Debug, Deserialize)]
struct ApiBilling {
    address: Option<ApiAddress>,
}

#[derive(Debug, Deserialize)]
struct ApiCard {
    id: String,
    number: Option<String>,
    cvc: Option<String>,
    exp_month: Option<u32>,
    exp_year: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

impl ApiAddress {
    fn into_address(self) -> Option<Address> {
        Some(Address {
            line1: self.line1?,
            line2: self.line2,
            city: self.city?,
            state: self.state?,
            postal_code: self.postal_code?,
            country: self.country?,
        })
    }
}

impl StripeClient {
    /// Creates a client against the live Stripe API.
    pub fn new(secret_key: impl Into<String>) -> Result<Self, url::ParseError> {
        Self::with_base_url(secret_key, DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom base URL (stripe-mock, tests).
    pub fn with_base_url(
        secret_key: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            secret_key: secret_key.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SagaError> {
        self.base_url
            .join(path)
            .map_err(|e| SagaError::Gateway(format!("invalid endpoint {path}: {e}")))
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
        kind: fn(String) -> SagaError,
    ) -> Result<T, SagaError> {
        let response = self
            .http
            .post(self.endpoint(path)?)
            .bearer_auth(&self.secret_key)
            .form(params)
            .send()
            .await
            .map_err(|e| kind(e.to_string()))?;
        Self::decode(response, kind).await
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        kind: fn(String) -> SagaError,
    ) -> Result<T, SagaError> {
        let response = self
            .http
            .get(self.endpoint(path)?)
            .bearer_auth(&self.secret_key)
            .query(query)
            .send()
            .await
            .map_err(|e| kind(e.to_string()))?;
        Self::decode(response, kind).await
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
        kind: fn(String) -> SagaError,
    ) -> Result<T, SagaError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("http status {status}"));
            return Err(kind(message));
        }
        response.json::<T>().await.map_err(|e| kind(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[tracing::instrument(skip(self, line_item))]
    async fn open_hold(
        &self,
        amount: Money,
        line_item: LineItem,
        customer_id: Option<&str>,
    ) -> Result<CheckoutHold, SagaError> {
        let mut params: Vec<(&str, String)> = vec![
            ("ui_mode", "embedded".to_string()),
            ("mode", "payment".to_string()),
            ("redirect_on_completion", "never".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "line_items[0][price_data][currency]",
                "usd".to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                amount.cents().to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                line_item.name,
            ),
        ];
        if let Some(image_url) = line_item.image_url {
            params.push((
                "line_items[0][price_data][product_data][images][0]",
                image_url,
            ));
        }
        match customer_id {
            Some(id) => params.push(("customer", id.to_string())),
            None => params.push(("customer_creation", "always".to_string())),
        }

        let session: ApiSession = self
            .post_form("v1/checkout/sessions", &params, SagaError::Gateway)
            .await?;
        let client_secret = session
            .client_secret
            .ok_or_else(|| SagaError::Gateway("session has no client secret".to_string()))?;
        Ok(CheckoutHold {
            session_id: session.id,
            client_secret,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get_session(&self, session_id: &str) -> Result<SessionDetails, SagaError> {
        let session: ApiSession = self
            .get_json(
                &format!("v1/checkout/sessions/{session_id}"),
                &[],
                SagaError::Gateway,
            )
            .await?;
        Ok(SessionDetails {
            payment_intent_id: session.payment_intent,
            customer_id: session.customer,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get_customer(&self, customer_id: &str) -> Result<GatewayCustomer, SagaError> {
        let customer: ApiCustomer = self
            .get_json(
                &format!("v1/customers/{customer_id}"),
                &[],
                SagaError::Gateway,
            )
            .await?;
        Ok(GatewayCustomer {
            id: customer.id,
            name: customer.name,
            email: customer.email,
            phone: customer.phone,
            billing_address: customer.address.and_then(ApiAddress::into_address),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn refund(&self, session_id: &str) -> Result<String, SagaError> {
        let session = self.get_session(session_id).await?;
        let payment_intent = session
            .payment_intent_id
            .ok_or_else(|| SagaError::Gateway("session has no payment intent".to_string()))?;

        let refund: ApiRefund = self
            .post_form(
                "v1/refunds",
                &[
                    ("payment_intent", payment_intent),
                    ("reason", "requested_by_customer".to_string()),
                ],
                SagaError::Gateway,
            )
            .await?;
        Ok(refund.id)
    }
}

#[async_trait]
impl CardIssuer for StripeClient {
    #[tracing::instrument(skip(self, identity))]
    async fn create_cardholder(&self, identity: &BillingIdentity) -> Result<String, SagaError> {
        let address = &identity.billing_address;
        let mut params: Vec<(&str, String)> = vec![
            ("type", "individual".to_string()),
            ("status", "active".to_string()),
            ("name", identity.full_name()),
            ("email", identity.email.clone()),
            ("individual[first_name]", identity.first_name.clone()),
            ("individual[last_name]", identity.last_name.clone()),
            ("billing[address][line1]", address.line1.clone()),
            ("billing[address][city]", address.city.clone()),
            ("billing[address][state]", address.state.clone()),
            ("billing[address][postal_code]", address.postal_code.clone()),
            ("billing[address][country]", address.country.clone()),
        ];
        if let Some(line2) = &address.line2 {
            params.push(("billing[address][line2]", line2.clone()));
        }
        if let Some(phone) = &identity.phone {
            params.push(("phone_number", phone.clone()));
        }

        let cardholder: ApiCardholder = self
            .post_form("v1/issuing/cardholders", &params, SagaError::Issuing)
            .await?;
        Ok(cardholder.id)
    }

    #[tracing::instrument(skip(self, metadata))]
    async fn create_virtual_card(
        &self,
        cardholder_id: &str,
        metadata: &CardMetadata,
    ) -> Result<String, SagaError> {
        let params: Vec<(&str, String)> = vec![
            ("cardholder", cardholder_id.to_string()),
            ("currency", "usd".to_string()),
            ("type", "virtual".to_string()),
            ("status", "active".to_string()),
            (
                "metadata[checkout_session_id]",
                metadata.session_id.clone(),
            ),
            ("metadata[user_id]", metadata.user_id.to_string()),
        ];

        let card: ApiCard = self
            .post_form("v1/issuing/cards", &params, SagaError::Issuing)
            .await?;
        Ok(card.id)
    }

    #[tracing::instrument(skip(self))]
    async fn get_card_credentials(&self, card_id: &str) -> Result<CardCredentials, SagaError> {
        let card: ApiCard = self
            .get_json(
                &format!("v1/issuing/cards/{card_id}"),
                &[("expand[]", "number"), ("expand[]", "cvc")],
                SagaError::Issuing,
            )
            .await?;

        let number = card
            .number
            .ok_or_else(|| SagaError::Issuing("card number not expanded".to_string()))?;
        let cvc = card
            .cvc
            .ok_or_else(|| SagaError::Issuing("card cvc not expanded".to_string()))?;
        let (month, year) = match (card.exp_month, card.exp_year) {
            (Some(m), Some(y)) => (m, y),
            _ => return Err(SagaError::Issuing("card has no expiry".to_string())),
        };

        Ok(CardCredentials {
            card_id: card.id,
            number,
            expiry: format!("{month:02}/{:02}", year % 100),
            cvc,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get_cardholder(&self, cardholder_id: &str) -> Result<CardholderRecord, SagaError> {
        let cardholder: ApiCardholder = self
            .get_json(
                &format!("v1/issuing/cardholders/{cardholder_id}"),
                &[],
                SagaError::Issuing,
            )
            .await?;

        let email = cardholder
            .email
            .ok_or_else(|| SagaError::Issuing("cardholder has no email".to_string()))?;
        let billing_address = cardholder
            .billing
            .and_then(|b| b.address)
            .and_then(ApiAddress::into_address);
        let identity = BillingIdentity::derive(
            cardholder.name.as_deref(),
            &email,
            cardholder.phone_number.as_deref(),
            billing_address,
        );

        Ok(CardholderRecord {
            id: cardholder.id,
            identity,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn deactivate_card(&self, card_id: &str) -> Result<(), SagaError> {
        let _: ApiCard = self
            .post_form(
                &format!("v1/issuing/cards/{card_id}"),
                &[("status", "canceled".to_string())],
                SagaError::Issuing,
            )
            .await?;
        Ok(())
    }
}
