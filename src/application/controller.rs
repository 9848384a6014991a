use super::inactivity::{ActivityClock, InactivityMonitor};
use super::poller::{PollReport, StatusPoller};
use crate::config::TerminalConfig;
use crate::domain::amount::{AmountAccumulator, Key, KeyOutcome, parse_amount};
use crate::domain::payment::{
    InitiateRequest, PaymentId, PaymentOrder, PaymentSession, TerminalRef,
};
use crate::domain::ports::PaymentGatewayRef;
use crate::error::{Result, TerminalError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

const SERVER_ERROR_MESSAGE: &str = "Server error";

/// Visible mode of the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Entry,
    Initiating,
    Pending,
    Success,
}

/// Payment attributes as shown to the customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentView {
    pub payment_id: PaymentId,
    pub fiat_amount: String,
    /// Milli-units (crypto amount x 1000).
    pub crypto_amount: String,
    /// Rate per milli-unit (exchange rate / 1000).
    pub exchange_rate: String,
    pub payment_uri: String,
}

impl From<&PaymentSession> for PaymentView {
    fn from(session: &PaymentSession) -> Self {
        Self {
            payment_id: session.payment_id().clone(),
            fiat_amount: session.fiat_display(),
            crypto_amount: session.crypto_display(),
            exchange_rate: session.exchange_rate_display(),
            payment_uri: session.order.payment_uri.clone(),
        }
    }
}

/// Snapshot of everything the terminal renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalView {
    pub mode: Mode,
    pub amount: String,
    pub input_enabled: bool,
    pub error: Option<String>,
    pub payment: Option<PaymentView>,
    pub receipt_uri: Option<String>,
}

/// Operator inputs accepted by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Key(Key),
    /// Submit the amount field, or the given raw amount.
    Submit(Option<String>),
    Cancel,
    /// Pointer or other activity with no effect beyond the idle clock.
    Touch,
    Shutdown,
}

enum Event {
    Initiated {
        generation: u64,
        result: Result<PaymentOrder>,
    },
    Idle,
}

/// Cloneable front door to a running controller.
///
/// Every input counts as user activity before it is queued.
#[derive(Clone)]
pub struct TerminalHandle {
    inputs: mpsc::UnboundedSender<Input>,
    activity: ActivityClock,
    view: watch::Receiver<TerminalView>,
}

impl TerminalHandle {
    pub fn send(&self, input: Input) -> Result<()> {
        self.activity.touch();
        self.inputs.send(input).map_err(|_| TerminalError::Closed)
    }

    pub fn key(&self, key: Key) -> Result<()> {
        self.send(Input::Key(key))
    }

    pub fn submit(&self) -> Result<()> {
        self.send(Input::Submit(None))
    }

    pub fn submit_amount(&self, raw: &str) -> Result<()> {
        self.send(Input::Submit(Some(raw.to_string())))
    }

    pub fn cancel(&self) -> Result<()> {
        self.send(Input::Cancel)
    }

    pub fn touch(&self) -> Result<()> {
        self.send(Input::Touch)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.inputs
            .send(Input::Shutdown)
            .map_err(|_| TerminalError::Closed)
    }

    pub fn subscribe(&self) -> watch::Receiver<TerminalView> {
        self.view.clone()
    }

    pub fn view(&self) -> TerminalView {
        self.view.borrow().clone()
    }
}

/// Owns one terminal's payment session: amount entry, initiation, status
/// polling and every path back to `Entry`.
///
/// All state changes happen inside [`run`](Self::run), one input or event at
/// a time. Network work is spawned and reports back through channels, with
/// generation stamps so that answers for a superseded session are dropped.
pub struct PaymentSessionController {
    config: TerminalConfig,
    terminal: TerminalRef,
    gateway: PaymentGatewayRef,
    accumulator: AmountAccumulator,
    mode: Mode,
    session: Option<PaymentSession>,
    error: Option<String>,
    receipt_uri: Option<String>,
    initiation: u64,
    // idle threshold crossed while initiating; applied once the response lands
    idle_deferred: bool,
    poller: StatusPoller,
    poll_reports: mpsc::UnboundedReceiver<PollReport>,
    inputs: mpsc::UnboundedReceiver<Input>,
    events_tx: mpsc::UnboundedSender<Event>,
    events: mpsc::UnboundedReceiver<Event>,
    // Held for its Drop, which stops the idle check task.
    _monitor: InactivityMonitor,
    view: watch::Sender<TerminalView>,
}

impl PaymentSessionController {
    /// Must be called inside a Tokio runtime: the inactivity monitor starts
    /// here, before the first view is published.
    pub fn new(
        config: TerminalConfig,
        gateway: PaymentGatewayRef,
    ) -> Result<(Self, TerminalHandle)> {
        config.validate()?;
        let terminal = config.terminal_ref()?;

        let (events_tx, events) = mpsc::unbounded_channel();
        let idle_tx = events_tx.clone();
        let monitor = InactivityMonitor::spawn(
            config.idle_timeout(),
            config.idle_check_interval(),
            move || {
                let _ = idle_tx.send(Event::Idle);
            },
        );

        let (reports_tx, poll_reports) = mpsc::unbounded_channel();
        let poller = StatusPoller::new(gateway.clone(), config.poll_interval(), reports_tx);
        let (inputs_tx, inputs) = mpsc::unbounded_channel();

        let accumulator = AmountAccumulator::new(config.max_amount_digits);
        let (view, view_rx) = watch::channel(TerminalView {
            mode: Mode::Entry,
            amount: accumulator.display(),
            input_enabled: true,
            error: None,
            payment: None,
            receipt_uri: None,
        });

        let handle = TerminalHandle {
            inputs: inputs_tx,
            activity: monitor.clock(),
            view: view_rx,
        };
        let controller = Self {
            config,
            terminal,
            gateway,
            accumulator,
            mode: Mode::Entry,
            session: None,
            error: None,
            receipt_uri: None,
            initiation: 0,
            idle_deferred: false,
            poller,
            poll_reports,
            inputs,
            events_tx,
            events,
            _monitor: monitor,
            view,
        };
        Ok((controller, handle))
    }

    /// Processes inputs until a shutdown is requested or every handle is gone.
    ///
    /// An initiation already on the wire is allowed to land before the loop
    /// exits; inputs queued after the shutdown are not processed.
    pub async fn run(mut self) {
        info!(terminal = ?self.terminal, "payment terminal ready");
        self.render();
        let mut draining = false;
        loop {
            if draining && self.mode != Mode::Initiating {
                break;
            }
            tokio::select! {
                input = self.inputs.recv(), if !draining => match input {
                    Some(Input::Shutdown) | None => draining = true,
                    Some(input) => self.on_input(input),
                },
                Some(event) = self.events.recv() => self.on_event(event),
                Some(report) = self.poll_reports.recv() => self.on_poll_report(report),
            }
        }
        self.poller.stop();
        info!(mode = ?self.mode, "payment terminal stopped");
    }

    fn on_input(&mut self, input: Input) {
        self.idle_deferred = false;
        match input {
            Input::Key(key) => self.on_key(key),
            Input::Submit(raw) => self.submit(raw),
            Input::Cancel => self.reset("cancelled"),
            Input::Touch | Input::Shutdown => {}
        }
    }

    fn on_event(&mut self, event: Event) {
        match event {
            Event::Initiated { generation, result } => self.on_initiated(generation, result),
            Event::Idle if self.mode == Mode::Initiating => {
                debug!("idle reset deferred until initiation completes");
                self.idle_deferred = true;
            }
            Event::Idle => self.reset("inactivity"),
        }
    }

    fn on_key(&mut self, key: Key) {
        if self.mode != Mode::Entry {
            debug!(?key, mode = ?self.mode, "key ignored, amount input disabled");
            return;
        }
        match self.accumulator.apply(key) {
            KeyOutcome::Updated => self.render(),
            KeyOutcome::Submit => self.submit(None),
            KeyOutcome::Rejected => debug!(?key, "digit rejected at amount cap"),
            KeyOutcome::PassThrough => {}
        }
    }

    fn submit(&mut self, raw: Option<String>) {
        if self.mode != Mode::Entry {
            debug!(mode = ?self.mode, "duplicate submit ignored");
            return;
        }
        let raw = raw.unwrap_or_else(|| self.accumulator.display());
        let amount = match parse_amount(
            &raw,
            self.config.min_amount,
            self.config.max_amount_digits,
        ) {
            Ok(amount) => amount,
            Err(e) => {
                info!(error = %e, "amount rejected");
                self.error = Some(e.to_string());
                self.render();
                return;
            }
        };
        self.accumulator.load(&raw);
        self.error = None;
        self.mode = Mode::Initiating;
        self.initiation += 1;

        let generation = self.initiation;
        let request = InitiateRequest::new(self.terminal.clone(), amount);
        let gateway = self.gateway.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = gateway.initiate(&request).await;
            let _ = events.send(Event::Initiated { generation, result });
        });
        info!(%amount, generation, "initiating payment");
        self.render();
    }

    fn on_initiated(&mut self, generation: u64, result: Result<PaymentOrder>) {
        if self.mode != Mode::Initiating || generation != self.initiation {
            debug!(generation, error = %TerminalError::StaleResponse, "initiation response dropped");
            if let Ok(order) = result {
                self.cancel_remote(order.payment_id);
            }
            return;
        }
        match result {
            Ok(order) => {
                let session = PaymentSession::new(order);
                self.poller.start(session.payment_id().clone());
                info!(
                    payment_id = %session.payment_id(),
                    fiat = %session.fiat_display(),
                    "payment pending"
                );
                self.session = Some(session);
                self.mode = Mode::Pending;
            }
            Err(e) => {
                warn!(error = %e, "payment initiation failed");
                self.error = Some(SERVER_ERROR_MESSAGE.to_string());
                self.mode = Mode::Entry;
            }
        }
        self.render();
        if std::mem::take(&mut self.idle_deferred) {
            self.reset("inactivity");
        }
    }

    fn on_poll_report(&mut self, report: PollReport) {
        if self.mode != Mode::Pending || !self.poller.is_current(&report) {
            debug!(
                payment_id = %report.payment_id,
                generation = report.generation,
                error = %TerminalError::StaleResponse,
                "poll report dropped"
            );
            return;
        }
        self.poller.stop();
        match report.status.into_outcome() {
            Some(Ok(status)) => {
                info!(payment_id = %report.payment_id, %status, "payment settled");
                if let Some(session) = self.session.as_mut() {
                    session.status = status;
                }
                self.receipt_uri = Some(self.gateway.receipt_uri(&report.payment_id));
                self.mode = Mode::Success;
                self.render();
            }
            Some(Err(e)) => {
                info!(payment_id = %report.payment_id, error = %e, "payment did not complete");
                self.clear_session();
            }
            None => {}
        }
    }

    /// Back to `Entry` from anywhere. An unfinished payment is cancelled on
    /// the gateway in the background.
    fn reset(&mut self, reason: &'static str) {
        if self.mode == Mode::Pending
            && let Some(session) = &self.session
        {
            self.cancel_remote(session.payment_id().clone());
        }
        info!(reason, mode = ?self.mode, "session reset");
        self.clear_session();
    }

    fn clear_session(&mut self) {
        // poller goes first so no tick can repopulate the cleared view
        self.poller.stop();
        self.idle_deferred = false;
        self.session = None;
        self.receipt_uri = None;
        self.error = None;
        self.accumulator.reset();
        self.mode = Mode::Entry;
        self.render();
    }

    fn cancel_remote(&self, payment_id: PaymentId) {
        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            if let Err(e) = gateway.cancel(&payment_id).await {
                warn!(payment_id = %payment_id, error = %e, "gateway cancel failed");
            }
        });
    }

    fn render(&self) {
        let next = TerminalView {
            mode: self.mode,
            amount: self.accumulator.display(),
            input_enabled: self.mode == Mode::Entry,
            error: self.error.clone(),
            payment: self.session.as_ref().map(PaymentView::from),
            receipt_uri: self.receipt_uri.clone(),
        };
        self.view.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
