use crate::domain::payment::{self, InitiateRequest, PaymentId, PaymentOrder, PaymentStatus};
use crate::domain::ports::PaymentGateway;
use crate::error::{Result, TerminalError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: serde_json::Value,
}

/// Gateway backed by the payments REST API (`/api/v2/payments/`).
///
/// `Clone` shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Builds a client for the API rooted at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server root, e.g. `https://pos.example`. A trailing slash is ignored.
    /// * `timeout` - Upper bound for each request, including status checks.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn payments_url(&self) -> String {
        format!("{}/api/v2/payments/", self.base_url)
    }

    fn payment_url(&self, payment_id: &PaymentId, action: Option<&str>) -> String {
        match action {
            Some(action) => format!("{}{}/{}/", self.payments_url(), payment_id, action),
            None => format!("{}{}/", self.payments_url(), payment_id),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn initiate(&self, request: &InitiateRequest) -> Result<PaymentOrder> {
        let response = self
            .client
            .post(self.payments_url())
            .json(request)
            .send()
            .await
            .map_err(|e| TerminalError::GatewayRejected(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(ErrorBody {
                    error: serde_json::Value::String(message),
                }) => message,
                Ok(ErrorBody { error }) => error.to_string(),
                Err(_) => format!("status {}", status),
            };
            return Err(TerminalError::GatewayRejected(message));
        }

        let order: PaymentOrder = response.json().await?;
        debug!(payment_id = %order.payment_id, "payment order created");
        Ok(order)
    }

    async fn status(&self, payment_id: &PaymentId) -> Result<PaymentStatus> {
        let body: StatusBody = self
            .client
            .get(self.payment_url(payment_id, None))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.status)
    }

    async fn cancel(&self, payment_id: &PaymentId) -> Result<()> {
        self.client
            .post(self.payment_url(payment_id, Some("cancel")))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn receipt_uri(&self, payment_id: &PaymentId) -> String {
        payment::receipt_uri(&self.base_url, payment_id)
    }
}
