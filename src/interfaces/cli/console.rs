use crate::application::controller::{Input, Mode, TerminalView};
use crate::domain::amount::Key;
use crate::error::{Result, TerminalError};

/// Parses one operator line into controller inputs.
///
/// A run of digits types each digit in turn. Words: `b`/`back`,
/// `enter`/`submit`, `pay <amount>`, `cancel`, `touch`, `quit`.
pub fn parse_line(line: &str) -> Result<Vec<Input>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Vec::new());
    }
    if line.chars().all(|c| c.is_ascii_digit()) {
        return Ok(line
            .bytes()
            .map(|b| Input::Key(Key::Digit(b - b'0')))
            .collect());
    }

    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default().to_ascii_lowercase();
    let input = match (command.as_str(), words.next()) {
        ("b" | "back" | "backspace", None) => Input::Key(Key::Backspace),
        ("enter" | "submit", None) => Input::Submit(None),
        ("pay", Some(amount)) => Input::Submit(Some(amount.to_string())),
        ("cancel" | "clear", None) => Input::Cancel,
        ("touch", None) => Input::Touch,
        ("quit" | "exit", None) => Input::Shutdown,
        _ => {
            return Err(TerminalError::InvalidInput(format!(
                "unrecognised command '{}'",
                line
            )));
        }
    };
    Ok(vec![input])
}

/// One-line text rendering of a view.
pub fn render(view: &TerminalView) -> String {
    let mut line = match view.mode {
        Mode::Entry => format!("[entry] amount={}", view.amount),
        Mode::Initiating => format!("[initiating] amount={}", view.amount),
        Mode::Pending => format!("[pending] amount={}", view.amount),
        Mode::Success => format!("[success] amount={}", view.amount),
    };
    if let Some(payment) = &view.payment {
        line.push_str(&format!(
            " payment={} fiat={} mbtc={} rate={} uri={}",
            payment.payment_id,
            payment.fiat_amount,
            payment.crypto_amount,
            payment.exchange_rate,
            payment.payment_uri
        ));
    }
    if let Some(receipt) = &view.receipt_uri {
        line.push_str(&format!(" receipt={}", receipt));
    }
    if let Some(error) = &view.error {
        line.push_str(&format!(" error=\"{}\"", error));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::controller::PaymentView;
    use crate::domain::payment::PaymentId;

    #[test]
    fn test_parse_digits_and_words() {
        assert_eq!(
            parse_line("105").unwrap(),
            vec![
                Input::Key(Key::Digit(1)),
                Input::Key(Key::Digit(0)),
                Input::Key(Key::Digit(5)),
            ]
        );
        assert_eq!(parse_line(" back ").unwrap(), vec![Input::Key(Key::Backspace)]);
        assert_eq!(parse_line("ENTER").unwrap(), vec![Input::Submit(None)]);
        assert_eq!(
            parse_line("pay 0.005").unwrap(),
            vec![Input::Submit(Some("0.005".to_string()))]
        );
        assert_eq!(parse_line("cancel").unwrap(), vec![Input::Cancel]);
        assert_eq!(parse_line("quit").unwrap(), vec![Input::Shutdown]);
        assert!(parse_line("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(matches!(
            parse_line("refund 3"),
            Err(TerminalError::InvalidInput(_))
        ));
        assert!(parse_line("cancel now").is_err());
    }

    #[test]
    fn test_render_pending_view() {
        let view = TerminalView {
            mode: Mode::Pending,
            amount: "10.00".to_string(),
            input_enabled: false,
            error: None,
            payment: Some(PaymentView {
                payment_id: PaymentId::new("p1"),
                fiat_amount: "10.00".to_string(),
                crypto_amount: "1.20".to_string(),
                exchange_rate: "8.333".to_string(),
                payment_uri: "bitcoin:1abc".to_string(),
            }),
            receipt_uri: None,
        };
        assert_eq!(
            render(&view),
            "[pending] amount=10.00 payment=p1 fiat=10.00 mbtc=1.20 rate=8.333 uri=bitcoin:1abc"
        );
    }

    #[test]
    fn test_render_error() {
        let view = TerminalView {
            mode: Mode::Entry,
            amount: "0.00".to_string(),
            input_enabled: true,
            error: Some("Server error".to_string()),
            payment: None,
            receipt_uri: None,
        };
        assert_eq!(render(&view), "[entry] amount=0.00 error=\"Server error\"");
    }
}
