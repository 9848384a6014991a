use super::amount::format_fixed;
use crate::error::{Result, TerminalError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque payment identifier issued by the gateway (`uid` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status reported by the gateway.
///
/// The server also reports intermediate states (`new`, `recieved`,
/// `forwarded`, ...); those all decode as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Notified,
    Confirmed,
    Timeout,
    Failed,
    #[serde(other)]
    Pending,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// `None` while the payment is still open, otherwise the settled status or
    /// a `PaymentFailed` error.
    pub fn into_outcome(self) -> Option<Result<PaymentStatus>> {
        match self {
            PaymentStatus::Pending => None,
            PaymentStatus::Notified | PaymentStatus::Confirmed => Some(Ok(self)),
            PaymentStatus::Timeout | PaymentStatus::Failed => {
                Some(Err(TerminalError::PaymentFailed(self)))
            }
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Notified => "notified",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Timeout => "timeout",
            PaymentStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Who the payment is collected for. Serialized as `{"device": key}` or
/// `{"account": id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalRef {
    Device(String),
    Account(String),
}

/// Body of the payment initiation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitiateRequest {
    #[serde(flatten)]
    pub terminal: TerminalRef,
    pub amount: Decimal,
}

impl InitiateRequest {
    pub fn new(terminal: TerminalRef, mut amount: Decimal) -> Self {
        amount.rescale(2);
        Self { terminal, amount }
    }
}

/// The gateway's answer to a successful initiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    #[serde(rename = "uid")]
    pub payment_id: PaymentId,
    pub fiat_amount: Decimal,
    #[serde(rename = "btc_amount")]
    pub crypto_amount: Decimal,
    pub exchange_rate: Decimal,
    pub payment_uri: String,
}

/// One attempt to collect a payment, held in memory only.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSession {
    pub order: PaymentOrder,
    pub status: PaymentStatus,
}

impl PaymentSession {
    pub fn new(order: PaymentOrder) -> Self {
        Self {
            order,
            status: PaymentStatus::Pending,
        }
    }

    pub fn payment_id(&self) -> &PaymentId {
        &self.order.payment_id
    }

    pub fn fiat_display(&self) -> String {
        format_fixed(self.order.fiat_amount, 2)
    }

    /// Crypto amount in milli-units (BTC x 1000).
    // NOTE: the x1000 / /1000 pair below mirrors the gateway's current
    // response units; normalize both sides together if the contract changes.
    pub fn crypto_display(&self) -> String {
        format_fixed(self.order.crypto_amount * Decimal::ONE_THOUSAND, 2)
    }

    /// Exchange rate per milli-unit (rate / 1000).
    pub fn exchange_rate_display(&self) -> String {
        format_fixed(self.order.exchange_rate / Decimal::ONE_THOUSAND, 3)
    }
}

/// Short receipt link served by the gateway for a payment.
pub fn receipt_uri(base_url: &str, payment_id: &PaymentId) -> String {
    format!("{}/prc/{}", base_url.trim_end_matches('/'), payment_id)
}
