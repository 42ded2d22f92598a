//! Operator console input: commands typed on stdin and the emergency prompt.

use std::{
    io::{self, BufRead, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use client_core::{CommandEmitter, Confirmation, EmergencyOutcome};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Emergency,
    Redraw,
    Quit,
}

pub fn parse_command(line: &str) -> Option<OperatorCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "e" | "emergency" | "stop" => Some(OperatorCommand::Emergency),
        "" | "r" | "redraw" => Some(OperatorCommand::Redraw),
        "q" | "quit" | "exit" => Some(OperatorCommand::Quit),
        _ => None,
    }
}

pub fn answer_is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Blocking `[y/N]` prompt on the terminal. The panel stops redrawing while
/// the prompt is open.
pub struct PromptConfirmation {
    pub assume_yes: bool,
    pub prompting: Arc<AtomicBool>,
}

impl Confirmation for PromptConfirmation {
    fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        self.prompting.store(true, Ordering::SeqCst);
        print!("{message} [y/N] ");
        let _ = io::stdout().flush();
        let mut answer = String::new();
        let confirmed = match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => answer_is_yes(&answer),
        };
        self.prompting.store(false, Ordering::SeqCst);
        confirmed
    }
}

/// Reads operator commands until stdin closes or the operator quits. Runs on
/// a blocking thread; the emergency prompt reads from the same stdin.
pub fn read_commands(emitter: CommandEmitter, actions: mpsc::UnboundedSender<OperatorCommand>) {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => {
                debug!("operator input closed");
                return;
            }
            Ok(_) => {}
        }

        let Some(command) = parse_command(&line) else {
            println!("unknown command '{}'; use e(mergency), r(edraw) or q(uit)", line.trim());
            continue;
        };
        if command == OperatorCommand::Emergency {
            match emitter.trigger_emergency() {
                EmergencyOutcome::Sent => println!("emergency SOP sent"),
                EmergencyOutcome::Cancelled => println!("emergency SOP cancelled"),
            }
        }
        if actions.send(command).is_err() || command == OperatorCommand::Quit {
            return;
        }
    }
}
