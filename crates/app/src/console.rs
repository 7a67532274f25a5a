//! Console adapter: the UIAdapter collaborator
//!
//! Translates stdin lines into command events and mirrors engine progress
//! events back to the terminal. The engine has no idea this exists; it
//! only ever sees the bus.

use std::sync::Arc;

use numvox_core::{Command, Event, EventBus, EventKind, Subscription};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::grid::NumberGrid;

pub struct ConsoleAdapter {
    _subscriptions: Vec<Subscription>,
    reader: JoinHandle<()>,
}

impl ConsoleAdapter {
    pub fn spawn(
        bus: Arc<EventBus>,
        grid: Arc<NumberGrid>,
        quit_tx: mpsc::UnboundedSender<()>,
    ) -> Self {
        let subscriptions = Self::subscribe_progress(&bus);
        let reader = tokio::spawn(Self::read_commands(bus, grid, quit_tx));
        Self {
            _subscriptions: subscriptions,
            reader,
        }
    }

    fn subscribe_progress(bus: &Arc<EventBus>) -> Vec<Subscription> {
        let mut subs = Vec::new();
        subs.push(bus.subscribe(EventKind::StateChanged, |event| {
            if let Event::StateChanged(state) = event {
                println!("[{state}]");
            }
        }));
        subs.push(bus.subscribe(EventKind::CellHighlighted, |event| {
            if let Event::CellHighlighted { cell } = event {
                println!("  -> cell {cell}");
            }
        }));
        subs.push(bus.subscribe(EventKind::OverlayShown, |event| {
            if let Event::OverlayShown { value } = event {
                println!("  ===== {value} =====");
            }
        }));
        subs.push(bus.subscribe(EventKind::RepeatsRemaining, |event| {
            if let Event::RepeatsRemaining { remaining } = event {
                println!("  repeats left: {remaining}");
            }
        }));
        subs.push(bus.subscribe(EventKind::SequenceFinished, |_| {
            println!("sequence finished");
        }));
        subs.push(bus.subscribe(EventKind::VoicesChanged, |event| {
            if let Event::VoicesChanged(snapshot) = event {
                println!(
                    "voices: {} ({} languages)",
                    snapshot.voices.len(),
                    snapshot.languages.len()
                );
            }
        }));
        subs
    }

    async fn read_commands(
        bus: Arc<EventBus>,
        grid: Arc<NumberGrid>,
        quit_tx: mpsc::UnboundedSender<()>,
    ) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        print_help();
        while let Ok(Some(line)) = lines.next_line().await {
            match line.trim() {
                "start" => bus.publish(Event::Command(Command::Start)),
                "pause" => bus.publish(Event::Command(Command::Pause)),
                "resume" | "continue" => bus.publish(Event::Command(Command::Resume)),
                "stop" | "reset" => bus.publish(Event::Command(Command::Stop)),
                "toggle" | "t" | "" => bus.publish(Event::Command(Command::Toggle)),
                "fill" => {
                    grid.fill_random();
                    println!("grid refilled");
                }
                "grid" => {
                    for row in grid.cells().chunks(10) {
                        println!("  {}", row.join(" "));
                    }
                }
                "quit" | "q" | "exit" => {
                    let _ = quit_tx.send(());
                    break;
                }
                other => {
                    debug!("unknown console command: {other:?}");
                    print_help();
                }
            }
        }
    }

    pub fn shutdown(self) {
        self.reader.abort();
    }
}

fn print_help() {
    println!("commands: start | pause | resume | stop | toggle (enter) | fill | grid | quit");
}
