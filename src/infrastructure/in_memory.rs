use crate::domain::payment::{self, InitiateRequest, PaymentId, PaymentOrder, PaymentStatus};
use crate::domain::ports::PaymentGateway;
use crate::error::{Result, TerminalError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
enum StatusStep {
    Status(PaymentStatus),
    NetworkError,
}

#[derive(Debug)]
struct GatewayState {
    exchange_rate: Decimal,
    next_orders: VecDeque<Result<PaymentOrder>>,
    statuses: HashMap<PaymentId, VecDeque<StatusStep>>,
    last_status: HashMap<PaymentId, PaymentStatus>,
    status_calls: HashMap<PaymentId, usize>,
    initiated: Vec<InitiateRequest>,
    cancelled: Vec<PaymentId>,
    initiate_delay: Duration,
    status_delay: Duration,
    issued: u32,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self {
            exchange_rate: dec!(8333.3),
            next_orders: VecDeque::new(),
            statuses: HashMap::new(),
            last_status: HashMap::new(),
            status_calls: HashMap::new(),
            initiated: Vec::new(),
            cancelled: Vec::new(),
            initiate_delay: Duration::ZERO,
            status_delay: Duration::ZERO,
            issued: 0,
        }
    }
}

/// A scriptable gateway kept entirely in memory.
///
/// Payments it issues stay `pending` until a status script says otherwise.
/// Scripted steps are consumed one per status request and the last status
/// repeats once the script runs out. Used by the tests and for offline runs.
#[derive(Debug, Clone)]
pub struct InMemoryGateway {
    base_url: String,
    state: Arc<RwLock<GatewayState>>,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::with_base_url("memory://terminal")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            state: Arc::default(),
        }
    }

    pub async fn set_exchange_rate(&self, rate: Decimal) {
        self.state.write().await.exchange_rate = rate;
    }

    /// The next initiation returns exactly this order.
    pub async fn push_order(&self, order: PaymentOrder) {
        self.state.write().await.next_orders.push_back(Ok(order));
    }

    /// The next initiation fails with `GatewayRejected`.
    pub async fn reject_next(&self, message: &str) {
        self.state
            .write()
            .await
            .next_orders
            .push_back(Err(TerminalError::GatewayRejected(message.to_string())));
    }

    pub async fn script_statuses(
        &self,
        payment_id: &PaymentId,
        statuses: impl IntoIterator<Item = PaymentStatus>,
    ) {
        let mut state = self.state.write().await;
        state
            .statuses
            .entry(payment_id.clone())
            .or_default()
            .extend(statuses.into_iter().map(StatusStep::Status));
    }

    /// The next scripted status request for `payment_id` fails at the network level.
    pub async fn script_status_error(&self, payment_id: &PaymentId) {
        let mut state = self.state.write().await;
        state
            .statuses
            .entry(payment_id.clone())
            .or_default()
            .push_back(StatusStep::NetworkError);
    }

    pub async fn set_initiate_delay(&self, delay: Duration) {
        self.state.write().await.initiate_delay = delay;
    }

    pub async fn set_status_delay(&self, delay: Duration) {
        self.state.write().await.status_delay = delay;
    }

    pub async fn status_calls(&self, payment_id: &PaymentId) -> usize {
        let state = self.state.read().await;
        state.status_calls.get(payment_id).copied().unwrap_or(0)
    }

    pub async fn initiated(&self) -> Vec<InitiateRequest> {
        self.state.read().await.initiated.clone()
    }

    pub async fn cancelled(&self) -> Vec<PaymentId> {
        self.state.read().await.cancelled.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn initiate(&self, request: &InitiateRequest) -> Result<PaymentOrder> {
        let delay = self.state.read().await.initiate_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        state.initiated.push(request.clone());
        if let Some(scripted) = state.next_orders.pop_front() {
            return scripted;
        }

        state.issued += 1;
        let payment_id = PaymentId::new(format!("mem{:04}", state.issued));
        let crypto_amount = (request.amount / state.exchange_rate).round_dp(8);
        Ok(PaymentOrder {
            payment_uri: format!("bitcoin:mem-{}?amount={}", payment_id, crypto_amount),
            payment_id,
            fiat_amount: request.amount,
            crypto_amount,
            exchange_rate: state.exchange_rate,
        })
    }

    async fn status(&self, payment_id: &PaymentId) -> Result<PaymentStatus> {
        let delay = {
            let mut state = self.state.write().await;
            *state.status_calls.entry(payment_id.clone()).or_default() += 1;
            state.status_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        let step = state
            .statuses
            .get_mut(payment_id)
            .and_then(VecDeque::pop_front);
        match step {
            Some(StatusStep::Status(status)) => {
                state.last_status.insert(payment_id.clone(), status);
                Ok(status)
            }
            Some(StatusStep::NetworkError) => Err(TerminalError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "scripted network failure",
            ))),
            None => Ok(state
                .last_status
                .get(payment_id)
                .copied()
                .unwrap_or(PaymentStatus::Pending)),
        }
    }

    async fn cancel(&self, payment_id: &PaymentId) -> Result<()> {
        self.state.write().await.cancelled.push(payment_id.clone());
        Ok(())
    }

    fn receipt_uri(&self, payment_id: &PaymentId) -> String {
        payment::receipt_uri(&self.base_url, payment_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::TerminalRef;

    #[tokio::test]
    async fn test_issues_pending_orders() {
        let gateway = InMemoryGateway::new();
        let request = InitiateRequest::new(TerminalRef::Device("dev".into()), dec!(10));

        let order = gateway.initiate(&request).await.unwrap();
        assert_eq!(order.payment_id, PaymentId::new("mem0001"));
        assert_eq!(order.fiat_amount, dec!(10.00));
        assert_eq!(order.crypto_amount, dec!(0.00120000));
        assert_eq!(
            gateway.status(&order.payment_id).await.unwrap(),
            PaymentStatus::Pending
        );
        assert_eq!(gateway.initiated().await, vec![request]);
    }

    #[tokio::test]
    async fn test_scripted_statuses_stick_to_last() {
        let gateway = InMemoryGateway::new();
        let id = PaymentId::new("p1");
        gateway
            .script_statuses(&id, [PaymentStatus::Pending, PaymentStatus::Notified])
            .await;

        assert_eq!(gateway.status(&id).await.unwrap(), PaymentStatus::Pending);
        assert_eq!(gateway.status(&id).await.unwrap(), PaymentStatus::Notified);
        assert_eq!(gateway.status(&id).await.unwrap(), PaymentStatus::Notified);
        assert_eq!(gateway.status_calls(&id).await, 3);
    }

    #[tokio::test]
    async fn test_rejection_and_cancel() {
        let gateway = InMemoryGateway::new();
        gateway.reject_next("Invalid device key.").await;
        let request = InitiateRequest::new(TerminalRef::Device("bad".into()), dec!(1));

        let result = gateway.initiate(&request).await;
        assert!(matches!(result, Err(TerminalError::GatewayRejected(_))));

        let id = PaymentId::new("p9");
        gateway.cancel(&id).await.unwrap();
        assert_eq!(gateway.cancelled().await, vec![id.clone()]);
        assert_eq!(gateway.receipt_uri(&id), "memory://terminal/prc/p9");
    }
}
