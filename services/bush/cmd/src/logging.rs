//! Console log format for the `bush` binary.
//!
//! Lines look like `time LEVEL origin: message key=value...`. The origin is
//! the event's `component` field when present, otherwise its target with
//! the `bush_` crate prefix dropped (`upackets::reassembler`).

use std::fmt::{self, Write as _};
use std::io::IsTerminal;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Event formatter for the `bush` binary
pub struct BushLogFormatter {
    color_enabled: bool,
}

/// Log at info level with a `component` field
#[macro_export]
macro_rules! component_info {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, $($arg)*)
    };
}

/// Log at warn level with a `component` field
#[macro_export]
macro_rules! component_warn {
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, $($arg)*)
    };
}

/// Log at debug level with a `component` field
#[macro_export]
macro_rules! component_debug {
    ($component:expr, $($arg:tt)*) => {
        tracing::debug!(component = $component, $($arg)*)
    };
}

/// Log at error level with a `component` field
#[macro_export]
macro_rules! component_error {
    ($component:expr, $($arg:tt)*) => {
        tracing::error!(component = $component, $($arg)*)
    };
}

impl BushLogFormatter {
    /// Colors the level only when stderr is a terminal
    pub fn new() -> Self {
        Self {
            color_enabled: std::io::stderr().is_terminal()
                && std::env::var("TERM").map_or(true, |t| t != "dumb"),
        }
    }

    fn level_label(&self, level: &Level) -> String {
        let (label, color) = match *level {
            Level::ERROR => ("ERROR", "\x1b[91m"),
            Level::WARN => ("WARN", "\x1b[93m"),
            Level::INFO => ("INFO", "\x1b[32m"),
            Level::DEBUG => ("DEBUG", "\x1b[90m"),
            Level::TRACE => ("TRACE", "\x1b[90m"),
        };
        if self.color_enabled {
            format!("{}{:<5}\x1b[0m", color, label)
        } else {
            format!("{:<5}", label)
        }
    }
}

impl Default for BushLogFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn origin<'a>(component: Option<&'a str>, target: &'a str) -> &'a str {
    component.unwrap_or_else(|| target.strip_prefix("bush_").unwrap_or(target))
}

impl<S, N> FormatEvent<S, N> for BushLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        writeln!(
            writer,
            "{} {} {}: {}{}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            self.level_label(metadata.level()),
            origin(visitor.component.as_deref(), metadata.target()),
            visitor.message,
            visitor.extra
        )
    }
}

/// Splits an event into its message, its `component` and the remaining
/// fields rendered as ` key=value`
#[derive(Default)]
struct FieldVisitor {
    message: String,
    component: Option<String>,
    extra: String,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "component" => self.component = Some(format!("{:?}", value).trim_matches('"').to_string()),
            name => {
                let _ = write!(self.extra, " {}={:?}", name, value);
            }
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "component" => self.component = Some(value.to_string()),
            name => {
                let _ = write!(self.extra, " {}={}", name, value);
            }
        }
    }
}
