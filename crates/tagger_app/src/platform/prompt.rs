//! Terminal side of the operator channel: pipeline events are printed as
//! they arrive and campaign letters are typed on stdin.

use std::sync::Arc;

use tagger_core::OperatorEvent;
use tagger_engine::{
    LetterResolver, OperatorPrompt, PanelRegistry, PendingResolution, ResolverError,
};
use tagger_logging::{tagger_debug, tagger_info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

const SKIP_COMMAND: &str = "skip";
/// Typed after panels were edited in the admin view.
const REFRESH_PANELS_COMMAND: &str = "panels";

#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl OperatorPrompt for TerminalPrompt {
    fn show(&self, head: &PendingResolution, queued: usize) {
        println!();
        println!("Campaign letter needed ({queued} waiting)");
        println!("  panel: {}", head.panel_name);
        println!("  url:   {}", head.url);
        println!("Type a letter A-Z, or '{SKIP_COMMAND}':");
    }

    fn rejected(&self, input: &str) {
        println!("{input:?} is not a single letter A-Z; try again.");
    }

    fn close(&self) {
        println!("All URLs have a letter.");
    }

    fn attention(&self) {
        // Terminal bell.
        print!("\x07");
    }
}

/// Feeds stdin lines to the resolver until stdin closes.
pub fn spawn_operator_input(resolver: Arc<LetterResolver>, registry: Arc<dyn PanelRegistry>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            handle_input(&resolver, registry.as_ref(), input);
        }
        tagger_debug!("operator input closed");
    });
}

fn handle_input(resolver: &LetterResolver, registry: &dyn PanelRegistry, input: &str) {
    if input.eq_ignore_ascii_case(REFRESH_PANELS_COMMAND) {
        registry.invalidate();
        tagger_info!("panel list will be refetched");
        println!("Panel list refreshed.");
        return;
    }
    let outcome = if input.eq_ignore_ascii_case(SKIP_COMMAND) {
        resolver
            .skip()
            .map(|skipped| format!("skipped {}", skipped.url))
    } else {
        resolver
            .submit_letter(input)
            .map(|letter| format!("letter {letter} saved"))
    };
    match outcome {
        Ok(message) => println!("{message}"),
        Err(ResolverError::NoActivePrompt) => println!("Nothing is waiting for a letter."),
        // The prompt already told the operator.
        Err(ResolverError::InvalidOperatorInput(_)) => {}
    }
}

/// Prints every pipeline event until the pipeline drops its sender.
pub async fn print_events(mut events: UnboundedReceiver<OperatorEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            OperatorEvent::ScrollProgress { .. } => {}
            OperatorEvent::Error { .. } | OperatorEvent::OutageDetected { .. } => {
                eprintln!("! {event}")
            }
            _ => println!("- {event}"),
        }
    }
}
