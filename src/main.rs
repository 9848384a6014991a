use clap::Parser;
use miette::{IntoDiagnostic, Result};
use pos_terminal::application::controller::{Input, PaymentSessionController};
use pos_terminal::config::TerminalConfig;
use pos_terminal::domain::ports::PaymentGatewayRef;
use pos_terminal::infrastructure::http::HttpGateway;
use pos_terminal::infrastructure::in_memory::InMemoryGateway;
use pos_terminal::interfaces::cli::console;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file (camelCase keys)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Gateway root URL
    #[arg(long)]
    base_url: Option<String>,

    /// Device key payments are collected for
    #[arg(long, conflicts_with = "account")]
    device: Option<String>,

    /// Account id payments are collected for
    #[arg(long)]
    account: Option<String>,

    #[arg(long)]
    poll_interval_ms: Option<u64>,

    #[arg(long)]
    idle_timeout_ms: Option<u64>,

    /// Use an in-memory gateway instead of the REST API.
    #[arg(long)]
    offline: bool,
}

impl Cli {
    fn load_config(&self) -> pos_terminal::error::Result<TerminalConfig> {
        let mut config = match &self.config {
            Some(path) => TerminalConfig::from_file(path)?,
            None => TerminalConfig::default(),
        };
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(device) = &self.device {
            config.device = Some(device.clone());
            config.account = None;
        }
        if let Some(account) = &self.account {
            config.account = Some(account.clone());
            config.device = None;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(ms) = self.idle_timeout_ms {
            config.idle_timeout_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.load_config().into_diagnostic()?;

    let gateway: PaymentGatewayRef = if cli.offline {
        Arc::new(InMemoryGateway::with_base_url(config.base_url.clone()))
    } else {
        Arc::new(HttpGateway::new(&config.base_url, config.request_timeout()).into_diagnostic()?)
    };

    let (controller, handle) = PaymentSessionController::new(config, gateway).into_diagnostic()?;
    let mut views = handle.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            println!("{}", console::render(&views.borrow_and_update()));
            if views.changed().await.is_err() {
                break;
            }
        }
    });
    let runner = tokio::spawn(controller.run());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    'input: while let Some(line) = lines.next_line().await.into_diagnostic()? {
        let inputs = match console::parse_line(&line) {
            Ok(inputs) => inputs,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        for input in inputs {
            let quit = input == Input::Shutdown;
            handle.send(input).into_diagnostic()?;
            if quit {
                break 'input;
            }
        }
    }

    let _ = handle.shutdown();

    runner.await.into_diagnostic()?;
    printer.await.into_diagnostic()?;
    Ok(())
}
