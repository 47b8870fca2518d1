//! Hosted checkout session client.
//!
//! All payment processing is delegated to Stripe's hosted Checkout: the
//! server only creates a session (one form-encoded POST) and hands the
//! redirect URL back to the UI. Two products exist — a one-time 100-message
//! credit pack and an unlimited subscription — and the success redirect
//! carries which one was bought so the UI can apply the purchase event.

use serde::Deserialize;
use tracing::{debug, warn};

use warmline_config::BillingConfig;
use warmline_core::BillingError;

const STRIPE_API_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

/// Which checkout flow the user is entering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    /// One-time purchase (the 100-message pack).
    Payment,
    /// Recurring subscription (unlimited chat).
    Subscription,
}

impl CheckoutMode {
    /// Parse the wire value; anything other than "subscription" is a
    /// one-time payment, matching the original checkout contract.
    pub fn parse(s: &str) -> Self {
        if s == "subscription" {
            CheckoutMode::Subscription
        } else {
            CheckoutMode::Payment
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "payment",
            CheckoutMode::Subscription => "subscription",
        }
    }

    /// The `type` query value the success page uses to apply the purchase.
    fn success_type(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "credits",
            CheckoutMode::Subscription => "unlimited",
        }
    }
}

/// A created hosted-checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// The hosted payment page to redirect the user to.
    pub url: String,
}

/// Client creating hosted checkout sessions.
pub struct CheckoutClient {
    secret_key: String,
    origin: String,
    client: reqwest::Client,
}

impl CheckoutClient {
    pub fn new(secret_key: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            origin: origin.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build a client from billing configuration. `None` when no secret key
    /// is configured — a detected condition, not a silent failure.
    pub fn from_config(config: &BillingConfig) -> Option<Self> {
        let secret_key = config.secret_key.clone()?;
        Some(Self::new(secret_key, config.checkout_origin.clone()))
    }

    /// Create a hosted checkout session for one price, returning the
    /// redirect URL. The price id must be validated by the caller before
    /// any network call is made.
    pub async fn create_session(
        &self,
        price_id: &str,
        mode: CheckoutMode,
    ) -> Result<CheckoutSession, BillingError> {
        let success_url = format!("{}/success?type={}", self.origin, mode.success_type());
        let cancel_url = format!("{}/cancel", self.origin);

        let form = [
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("mode", mode.as_str()),
            ("success_url", success_url.as_str()),
            ("cancel_url", cancel_url.as_str()),
        ];

        debug!(mode = mode.as_str(), "Creating checkout session");

        let response = self
            .client
            .post(STRIPE_API_URL)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| BillingError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Checkout session creation failed");
            return Err(BillingError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| BillingError::MalformedResponse(e.to_string()))?;

        if session.url.is_empty() {
            return Err(BillingError::MalformedResponse(
                "session has no redirect URL".into(),
            ));
        }

        Ok(session)
    }
}
