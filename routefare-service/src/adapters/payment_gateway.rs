//! [`PaymentGateway`] adapter (spec §4.H), mirroring the JSON request/
//! response HTTP client `routefare-ticketing::anchor::HttpAnchorSubmitter`
//! uses for its own "speak to an external system behind a trait" boundary
//! — here aimed at a sandbox checkout gateway instead of a chain RPC node.

use async_trait::async_trait;
use chrono::NaiveDate;
use routefare_payment::gateway::{ChargeHandle, GatewayChargeStatus, GatewayError, GatewayTransaction, PaymentGateway};
use routefare_runtime::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thin HTTP JSON client for the sandbox checkout gateway.
///
/// The spec leaves the real provider unspecified; this speaks a small
/// JSON contract (`POST /charges`, `GET /charges/{reference}`,
/// `GET /transactions?date=`) against whatever sandbox endpoint the
/// deployment configures, so the payment core never hardcodes a
/// specific vendor's SDK.
///
/// Every call goes through a shared [`CircuitBreaker`]: once the sandbox
/// starts failing, we stop hammering it for 30s rather than piling up
/// timed-out requests behind `verify_payment_outcome`'s reconciliation
/// sweep.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    breaker: CircuitBreaker,
}

impl HttpPaymentGateway {
    /// Build a client against `base_url` (no trailing slash).
    #[must_use]
    pub fn new(base_url: String) -> Self {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(5)
            .timeout(Duration::from_secs(30))
            .success_threshold(2)
            .build();
        Self { client: reqwest::Client::new(), base_url, breaker: CircuitBreaker::new(config) }
    }
}

impl From<CircuitBreakerError<GatewayError>> for GatewayError {
    fn from(error: CircuitBreakerError<GatewayError>) -> Self {
        match error {
            CircuitBreakerError::Open => Self::Transient("gateway circuit breaker is open".to_string()),
            CircuitBreakerError::Inner(inner) => inner,
        }
    }
}

#[derive(Serialize)]
struct InitializeChargeRequest<'a> {
    reference: &'a str,
    amount: Decimal,
    currency: &'a str,
}

#[derive(Deserialize)]
struct InitializeChargeResponse {
    checkout_url: String,
}

#[derive(Deserialize)]
struct QueryChargeResponse {
    status: WireChargeStatus,
}

#[derive(Deserialize)]
struct TransactionResponse {
    reference: String,
    amount: Decimal,
    status: WireChargeStatus,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum WireChargeStatus {
    Pending,
    Succeeded,
    Failed,
}

impl From<WireChargeStatus> for GatewayChargeStatus {
    fn from(status: WireChargeStatus) -> Self {
        match status {
            WireChargeStatus::Pending => Self::Pending,
            WireChargeStatus::Succeeded => Self::Succeeded,
            WireChargeStatus::Failed => Self::Failed,
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn initialize_charge(
        &self,
        gateway_reference: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<ChargeHandle, GatewayError> {
        self.breaker
            .call(|| async {
                let response = self
                    .client
                    .post(format!("{}/charges", self.base_url))
                    .json(&InitializeChargeRequest { reference: gateway_reference, amount, currency })
                    .send()
                    .await
                    .map_err(|e| GatewayError::Transient(e.to_string()))?;

                if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
                    let body = response.text().await.unwrap_or_default();
                    return Err(GatewayError::Rejected(body));
                }
                if !response.status().is_success() {
                    return Err(GatewayError::Transient(format!("gateway returned {}", response.status())));
                }

                let body: InitializeChargeResponse =
                    response.json().await.map_err(|e| GatewayError::Transient(e.to_string()))?;
                Ok(ChargeHandle { checkout_url: body.checkout_url })
            })
            .await
            .map_err(GatewayError::from)
    }

    async fn query_charge(&self, gateway_reference: &str) -> Result<GatewayChargeStatus, GatewayError> {
        self.breaker
            .call(|| async {
                let response = self
                    .client
                    .get(format!("{}/charges/{gateway_reference}", self.base_url))
                    .send()
                    .await
                    .map_err(|e| GatewayError::Transient(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(GatewayError::Transient(format!("gateway returned {}", response.status())));
                }
                let body: QueryChargeResponse =
                    response.json().await.map_err(|e| GatewayError::Transient(e.to_string()))?;
                Ok(body.status.into())
            })
            .await
            .map_err(GatewayError::from)
    }

    async fn list_transactions_for_date(&self, date: NaiveDate) -> Result<Vec<GatewayTransaction>, GatewayError> {
        self.breaker
            .call(|| async {
                let response = self
                    .client
                    .get(format!("{}/transactions", self.base_url))
                    .query(&[("date", date.to_string())])
                    .send()
                    .await
                    .map_err(|e| GatewayError::Transient(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(GatewayError::Transient(format!("gateway returned {}", response.status())));
                }
                let body: Vec<TransactionResponse> =
                    response.json().await.map_err(|e| GatewayError::Transient(e.to_string()))?;
                Ok(body
                    .into_iter()
                    .map(|t| GatewayTransaction {
                        gateway_reference: t.reference,
                        amount: t.amount,
                        status: t.status.into(),
                    })
                    .collect())
            })
            .await
            .map_err(GatewayError::from)
    }
}
