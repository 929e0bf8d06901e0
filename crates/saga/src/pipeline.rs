//! Step names shared between the coordinator, logs, and the audit narrative.

/// Saga type recorded in tracing spans.
pub const SAGA_TYPE: &str = "PurchaseFulfillment";

/// Step 1: reuse or register the user's cardholder identity.
pub const STEP_PROVISION_CARDHOLDER: &str = "provision_cardholder";

/// Step 2: issue a single-use virtual card and read its credentials.
pub const STEP_ISSUE_CARD: &str = "issue_card";

/// Step 3: load the shipping address the automation will enter.
pub const STEP_FETCH_SHIPPING_ADDRESS: &str = "fetch_shipping_address";

/// Step 4: drive the vendor storefront with the issued card.
pub const STEP_RUN_AUTOMATION: &str = "run_automation";
