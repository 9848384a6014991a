use super::payment::{InitiateRequest, PaymentId, PaymentOrder, PaymentStatus};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The server side of a payment: opens payment requests and reports on them.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, request: &InitiateRequest) -> Result<PaymentOrder>;
    async fn status(&self, payment_id: &PaymentId) -> Result<PaymentStatus>;
    async fn cancel(&self, payment_id: &PaymentId) -> Result<()>;
    /// Derived link, no network call.
    fn receipt_uri(&self, payment_id: &PaymentId) -> String;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
