//! oplog-tail
//!
//! Connects to an oplog and prints every operation streamed through it. A
//! state file can be provided to simulate a full replication while
//! maintaining the current position.
//!
//! Logs go to stderr (`RUST_LOG`, default `oplogc=info`) so stdout only
//! carries the operation feed.

use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use oplogc::cli::{error_action, format_operation, ErrorAction, TailArgs};
use oplogc::consumer::Consumer;
use oplogc::traits::FULL_REPLICATION;

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = TailArgs::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("oplogc=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(tail(args))
}

async fn tail(args: TailArgs) -> Result<()> {
    let consumer = Consumer::subscribe(&args.url, args.options());
    let has_state_file = args.state_file.is_some();

    {
        let consumer = consumer.clone();
        ctrlc::set_handler(move || consumer.stop())?;
    }

    let mut subscription = consumer.start();
    let mut failure = None;
    let mut operations_open = true;
    let mut errors_open = true;

    loop {
        tokio::select! {
            delivery = subscription.operations.recv(), if operations_open => match delivery {
                Some(delivery) => {
                    println!("{}", format_operation(&delivery.operation));
                    delivery.done();
                }
                None => operations_open = false,
            },
            err = subscription.errors.recv(), if errors_open => match err {
                Some(err) => match error_action(&err, has_state_file) {
                    ErrorAction::Exit => {
                        error!("{} ({})", err, err.category().recovery_hint());
                        if failure.is_none() {
                            failure = Some(err);
                        }
                        consumer.stop();
                    }
                    ErrorAction::Replicate => {
                        warn!("Resume failed, forcing full replication");
                        consumer.set_position(FULL_REPLICATION);
                    }
                    ErrorAction::Log => warn!("{}", err),
                },
                None => errors_open = false,
            },
            _ = &mut subscription.done => break,
        }
    }

    info!(position = %consumer.position(), "Done");
    match failure {
        Some(err) => Err(eyre!(err)),
        None => Ok(()),
    }
}
