#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;

use anyhow::Error;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use yansi::Paint;

use crate::application::cli;
use crate::application::terminal;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendName;
use crate::domain::models::Event;
use crate::domain::models::RetryPolicy;
use crate::domain::services::Consultation;
use crate::domain::services::ModelGateway;
use crate::domain::services::Prompts;
use crate::infrastructure::backends::BackendManager;

fn handle_error(err: Error) {
    eprintln!(
        "{}",
        Paint::red(format!(
            "Oh no! The OSCE simulator has failed with the following app version and error.\n\nVersion: {}\nCommit: {}\nError: {:#}",
            env!("CARGO_PKG_VERSION"),
            env!("VERGEN_GIT_DESCRIBE"),
            err
        ))
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning `osce doctor` checks the API key and model access step by step.");
        eprintln!("\nOtherwise, running the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

async fn run() -> Result<()> {
    Config::validate()?;

    let backend = BackendManager::get(BackendName::parse(Config::get(ConfigKey::Backend))?)?;
    let gateway = ModelGateway::new(backend, RetryPolicy::from_config()?);
    tracing::info!(
        backend = %gateway.backend_name(),
        max_retries = gateway.policy().max_retries,
        "Starting consultation"
    );

    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
    let consultation = Consultation::new(
        gateway,
        Prompts::default(),
        StdRng::from_entropy(),
        event_tx,
    );

    return terminal::start(consultation, event_rx).await;
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            handle_error(err.into());
            return;
        }
    }

    let file_appender = tracing_appender::rolling::never(cli::debug_log_dir(), "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("osce")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    match cli::parse().await {
        Ok(true) => {}
        Ok(false) => process::exit(0),
        Err(err) => {
            handle_error(err);
            return;
        }
    }

    if let Err(err) = run().await {
        handle_error(err);
    }

    process::exit(0);
}
