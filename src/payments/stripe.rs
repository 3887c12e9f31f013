use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{Charge, ChargeRequest, GatewayError, PaymentProcessor};

/// HTTP client for a Stripe-style payment-intents API.
pub struct StripeGateway {
    client: Client,
    base_url: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct PaymentIntentResponse {
    id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    /// Create a gateway client. The timeout bounds the whole request; a
    /// request that exceeds it surfaces as an ambiguous outcome, since the
    /// charge may have been created server-side.
    pub fn new(base_url: &str, secret_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build payment gateway HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }
}

#[async_trait]
impl PaymentProcessor for StripeGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError> {
        let params = [
            ("amount", request.amount_cents.to_string()),
            ("currency", request.currency.clone()),
            ("description", request.description.clone()),
            ("metadata[trip_id]", request.trip_id.clone()),
            ("metadata[sender_id]", request.sender_id.clone()),
            ("metadata[recipient_id]", request.recipient_id.clone()),
            (
                "metadata[commission_cents]",
                request.commission_cents.to_string(),
            ),
        ];

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&params)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("HTTP {status}"));

            // A 5xx is not a confirmed decline: the processor may have
            // created the charge before failing.
            return if status.is_server_error() {
                Err(GatewayError::Ambiguous(message))
            } else {
                Err(GatewayError::Declined(message))
            };
        }

        let intent: PaymentIntentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Ambiguous(format!("unreadable charge response: {e}")))?;

        Ok(Charge {
            id: intent.id,
            client_secret: intent.client_secret,
        })
    }
}

fn classify_send_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Ambiguous(format!("request timed out: {err}"))
    } else if err.is_connect() {
        // Never reached the processor, so no charge exists
        GatewayError::Unreachable(err.to_string())
    } else {
        GatewayError::Ambiguous(err.to_string())
    }
}
