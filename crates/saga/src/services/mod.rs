//! External service traits and implementations.

pub mod gateway;
pub mod issuing;
pub mod stripe;

pub use gateway::{
    CheckoutHold, GatewayCustomer, InMemoryPaymentGateway, LineItem, PaymentGateway,
    SessionDetails,
};
pub use issuing::{CardIssuer, CardMetadata, CardholderRecord, InMemoryCardIssuer};
pub use stripe::StripeClient;
