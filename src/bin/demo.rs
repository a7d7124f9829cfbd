//! Demo binary for logpane E2E testing.
//!
//! This binary exercises logpane's public API for PTY-based integration tests.
//! Each subcommand demonstrates a specific feature.

use logpane::{
    ChannelColors, Console, LogEntry, LogValue, Sink, SinkConfig, Subscriber, ThrottleMode,
    classify_args, format_entry, format_entry_expanded, format_mode_badge, format_status,
    format_tokens, values,
};
use serde_json::json;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Prints every notification to stdout.
struct TerminalPanel {
    colors: ChannelColors,
}

impl Subscriber for TerminalPanel {
    fn on_entry(&self, entry: &Arc<LogEntry>) {
        println!("{}", format_entry(entry, &self.colors));
    }

    fn on_state_change(&self, mode: ThrottleMode) {
        println!("mode {}", format_mode_badge(mode));
    }
}

fn attach_panel(console: &Console, config: SinkConfig) -> Sink {
    let panel = Arc::new(TerminalPanel {
        colors: config.colors.clone(),
    });
    Sink::builder(console).config(config).subscriber(panel).attach()
}

/// Parse a command-line argument: JSON objects/arrays, numbers, booleans and
/// null keep their type, everything else is text.
fn parse_arg(arg: &str) -> LogValue {
    match serde_json::from_str::<serde_json::Value>(arg) {
        Ok(value) if !value.is_string() => LogValue::from(value),
        _ => LogValue::from(arg),
    }
}

fn main() {
    // Force color output even in non-TTY (for test capture)
    colored::control::set_override(true);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: logpane-demo <command> [args...]");
        eprintln!("Commands:");
        eprintln!("  classify <text> [args...]");
        eprintln!("  throttle-cycle");
        eprintln!("  early-replay");
        eprintln!("  paused");
        eprintln!("  search-pause");
        eprintln!("  structured");
        eprintln!("  destroy");
        eprintln!("  signal <interval_ms> <ticks>");
        std::process::exit(1);
    }

    match args[1].as_str() {
        "classify" => {
            let values: Vec<LogValue> = args[2..].iter().map(|a| parse_arg(a)).collect();
            println!("{}", format_tokens(&classify_args(&values)));
        }

        "throttle-cycle" => {
            let console = Console::new();
            let sink = Sink::attach(&console, SinkConfig::default());
            for _ in 0..6 {
                println!("{}", format_status(&sink.toggle_throttle()));
            }
            sink.destroy();
        }

        "early-replay" => {
            // Printed by the plain channels first, then replayed by the panel.
            let console = Console::new();
            console.log(&values!["[Boot] init step", 1]);
            console.warn(&values!["[Boot] config missing: theme"]);
            console.error(&values!["[Boot] failed retries: 3, cause: null"]);
            println!("attaching");
            let sink = attach_panel(&console, SinkConfig::default());
            sink.destroy();
        }

        "paused" => {
            let console = Console::new();
            let sink = Sink::attach(&console, SinkConfig::default());
            for _ in 0..4 {
                sink.toggle_throttle();
            }
            for i in 0..5 {
                sink.log(values!["[Paused] dropped index", i]);
            }
            println!("mode {} admitted {}", sink.mode(), sink.admitted_count());
            sink.destroy();
        }

        "search-pause" => {
            let console = Console::new();
            let sink = attach_panel(&console, SinkConfig::default());
            sink.toggle_throttle();
            sink.set_search("error");
            println!("searching {}", sink.mode());
            sink.set_search("");
            println!("restored {}", sink.mode());
            sink.destroy();
        }

        "structured" => {
            let console = Console::new();
            let sink = Sink::attach(&console, SinkConfig::default());
            sink.info(values![
                "[Store] snapshot",
                json!({"user": {"id": 7, "name": "ada"}, "tags": ["a", "b", "c", "d"], "active": true})
            ]);
            let colors = sink.config().colors.clone();
            for entry in sink.entries() {
                println!("{}", format_entry_expanded(&entry, &colors, 80));
            }
            sink.destroy();
        }

        "destroy" => {
            let console = Console::new();
            let sink = Sink::attach(&console, SinkConfig::default());
            sink.destroy();
            sink.destroy();
            console.log(&values!["after destroy"]);
            println!("captured {}", sink.entries().len());
        }

        "signal" => {
            let interval_ms: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(20);
            let ticks: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(4);
            let console = Console::new();
            let sink = attach_panel(&console, SinkConfig::default());
            sink.start_test_signal(Duration::from_millis(interval_ms));
            std::thread::sleep(Duration::from_millis(interval_ms * ticks + interval_ms / 2));
            sink.stop_test_signal();
            println!("signal entries {}", sink.entries().len());
            sink.destroy();
        }

        _ => {
            eprintln!("Unknown command: {}", args[1]);
            std::process::exit(1);
        }
    }
}
