use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionStatusResponse {
    pub tier: String,
}
