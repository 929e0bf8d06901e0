//! Domain layer for the purchase fulfillment service.
//!
//! Holds the durable [`Order`] record with its status state machine, the
//! fee calculator that turns a listing's base price into the amount held at
//! the payment gateway, and the value objects handed to the purchase
//! automation (addresses, disposable card credentials, purchase requests).

pub mod error;
pub mod order;
pub mod pricing;
pub mod purchase;

pub use error::DomainError;
pub use order::{Order, OrderStatus};
pub use purchase::{
    Address, BillingIdentity, CardCredentials, ProductListing, PurchaseRequest,
};
