use crate::error::CoreError;
use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter, Layer,
};

/// Target used by the pool event sink; kept at INFO on every layer.
const POOL_TARGET: &str = "voucher_pool";

/// Install the file + console subscriber.
///
/// Files roll daily under `log_dir` with `file_prefix`. Pool events are kept
/// at INFO everywhere; everything else goes to the file at WARN and to the
/// console at ERROR unless `RUST_LOG` says otherwise.
///
/// The returned guard flushes the file writer and MUST be kept alive.
pub fn setup_logger(log_dir: &str, file_prefix: &str) -> Result<WorkerGuard, CoreError> {
    std::fs::create_dir_all(log_dir).map_err(|e| CoreError::Logger {
        reason: format!("cannot create {}: {}", log_dir, e),
    })?;

    let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = tracing_subscriber::filter::Targets::new()
        .with_target(POOL_TARGET, Level::INFO)
        .with_default(Level::WARN);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("error,{}=info", POOL_TARGET)));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| CoreError::Logger {
            reason: e.to_string(),
        })?;

    Ok(guard)
}

// --- Formatters ---

#[derive(Default)]
struct EventVisitor {
    message: String,
    key_index: Option<u64>,
    fields: Vec<(&'static str, String)>,
}

impl tracing::field::Visit for EventVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push((field.name(), format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        if field.name() == "key_index" {
            self.key_index = Some(value);
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }
}

impl EventVisitor {
    fn render(&self) -> String {
        let mut out = String::new();
        if let Some(key) = self.key_index {
            out.push_str(&format!("[key {}] ", key));
        }
        out.push_str(&self.message);
        for (name, value) in &self.fields {
            out.push_str(&format!(" {}={}", name, value));
        }
        out
    }
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
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
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let level = *event.metadata().level();
        let style = match level {
            Level::ERROR => Style::new().fg(Color::LightRed).bold(),
            Level::WARN => Style::new().fg(Color::Yellow).bold(),
            Level::INFO => Style::new().fg(Color::LightGreen),
            _ => Style::new().dimmed(),
        };

        write!(writer, "{} ", style.paint(format!("{:>5}", level.to_string())))?;
        write!(writer, "{}", visitor.render())?;
        writeln!(writer)
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
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
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();

        write!(writer, "{} [{}] ", timestamp, level)?;

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        writeln!(writer, "{}", visitor.render())
    }
}
