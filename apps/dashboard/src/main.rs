use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::Result;
use clap::Parser;
use client_core::{CommandEmitter, EventChannel, Panel, StateProjector, WsChannel};
use shared::protocol::DATA_MONITOR;
use tokio::sync::{mpsc, Notify};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod operator;

use operator::{read_commands, OperatorCommand, PromptConfirmation};

#[derive(Parser, Debug)]
#[command(about = "Operator dashboard for the water-treatment plant feed")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    server_url: String,
    /// Send the emergency SOP without asking for confirmation.
    #[arg(long)]
    assume_yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let channel = Arc::new(WsChannel::connect(&args.server_url).await?);
    let panel = Panel::new();
    StateProjector::new(panel.bindings()).attach(channel.as_ref());

    // registered after the projector, so it fires once the panel is updated
    let redraw = Arc::new(Notify::new());
    let notify = Arc::clone(&redraw);
    channel.on_event(DATA_MONITOR, Box::new(move |_| notify.notify_one()));

    let prompting = Arc::new(AtomicBool::new(false));
    let emitter = CommandEmitter::new(
        channel.clone(),
        PromptConfirmation {
            assume_yes: args.assume_yes,
            prompting: Arc::clone(&prompting),
        },
    );
    let (actions_tx, mut actions) = mpsc::unbounded_channel();
    // detached: a reader parked in read_line must not hold the process open
    std::thread::spawn(move || read_commands(emitter, actions_tx));

    println!("connected to {}; e = emergency stop, r = redraw, q = quit", args.server_url);
    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let exit = run_panel(
        &panel,
        &redraw,
        &prompting,
        &mut actions,
        channel.closed(),
        interrupted,
    )
    .await;
    info!(?exit, "dashboard stopped");

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Quit,
    Closed,
    Interrupted,
}

/// Redraws the panel until the operator quits, the feed closes or the
/// process is interrupted.
async fn run_panel(
    panel: &Panel,
    redraw: &Notify,
    prompting: &AtomicBool,
    actions: &mut mpsc::UnboundedReceiver<OperatorCommand>,
    closed: impl Future<Output = ()>,
    interrupted: impl Future<Output = ()>,
) -> Exit {
    tokio::pin!(closed);
    tokio::pin!(interrupted);
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = redraw.notified() => {
                if !prompting.load(Ordering::SeqCst) {
                    draw(panel);
                }
            }
            action = actions.recv(), if input_open => match action {
                Some(OperatorCommand::Quit) => return Exit::Quit,
                Some(OperatorCommand::Redraw) => draw(panel),
                Some(OperatorCommand::Emergency) => {}
                None => input_open = false,
            },
            _ = &mut closed => {
                info!("plant feed closed the connection");
                return Exit::Closed;
            }
            _ = &mut interrupted => return Exit::Interrupted,
        }
    }
}

fn draw(panel: &Panel) {
    print!("{}", panel.render());
    println!();
}
