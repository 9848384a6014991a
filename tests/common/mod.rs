#![allow(dead_code)]

use pos_terminal::application::controller::{
    Mode, PaymentSessionController, TerminalHandle, TerminalView,
};
use pos_terminal::config::TerminalConfig;
use pos_terminal::domain::amount::Key;
use pos_terminal::domain::payment::{PaymentId, PaymentOrder};
use pos_terminal::infrastructure::in_memory::InMemoryGateway;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub fn device_config() -> TerminalConfig {
    TerminalConfig {
        device: Some("test-device".to_string()),
        ..TerminalConfig::default()
    }
}

/// The order from the reference scenario: 10.00 fiat at 8333.3.
pub fn sample_order(id: &str) -> PaymentOrder {
    PaymentOrder {
        payment_id: PaymentId::new(id),
        fiat_amount: dec!(10.00),
        crypto_amount: dec!(0.0012),
        exchange_rate: dec!(8333.3),
        payment_uri: format!("bitcoin:1PosTerminal?amount=0.0012&label={}", id),
    }
}

pub fn spawn_terminal(gateway: &InMemoryGateway, config: TerminalConfig) -> TerminalHandle {
    let (controller, handle) =
        PaymentSessionController::new(config, Arc::new(gateway.clone())).unwrap();
    tokio::spawn(controller.run());
    handle
}

pub fn type_digits(handle: &TerminalHandle, digits: &str) {
    for c in digits.chars() {
        let digit = c.to_digit(10).unwrap() as u8;
        handle.key(Key::Digit(digit)).unwrap();
    }
}

pub async fn wait_for(
    views: &mut watch::Receiver<TerminalView>,
    predicate: impl FnMut(&TerminalView) -> bool,
) -> TerminalView {
    tokio::time::timeout(Duration::from_secs(600), views.wait_for(predicate))
        .await
        .expect("timed out waiting for view")
        .expect("controller stopped")
        .clone()
}

pub async fn wait_for_mode(views: &mut watch::Receiver<TerminalView>, mode: Mode) -> TerminalView {
    wait_for(views, |view| view.mode == mode).await
}
