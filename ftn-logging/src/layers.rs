// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

use crate::{Result, DEFAULT_DIRECTIVES, LOG_ENV_VAR};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::{
    fmt::{
        self as tracing_fmt,
        format::Writer,
        time::{FormatTime, SystemTime},
        FmtContext, FormatEvent, FormatFields,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Where log lines go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogOutputDest {
    #[default]
    Stderr,
    /// Tee into a daily-rotated file in this directory as well.
    Dir(PathBuf),
}

/// Single-line event formatter: timestamp, level, module, message.
#[derive(Default)]
struct LogFormatter;

impl<S, N> FormatEvent<S, N> for LogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let level = *event.metadata().level();
        let module = event.metadata().module_path().unwrap_or("<unknown module>");

        write!(writer, "[")?;
        SystemTime.format_time(&mut writer)?;
        write!(writer, " {level} {module}")?;
        ctx.visit_spans(|span| write!(writer, "/{}", span.name()))?;
        write!(writer, "] ")?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Builds and installs the global subscriber.
#[derive(Debug, Clone, Default)]
pub struct LogBuilder {
    dest: LogOutputDest,
}

impl LogBuilder {
    pub fn new(dest: LogOutputDest) -> Self {
        Self { dest }
    }

    fn env_filter() -> EnvFilter {
        if std::env::var(LOG_ENV_VAR).is_ok() {
            EnvFilter::from_env(LOG_ENV_VAR)
        } else {
            EnvFilter::new(DEFAULT_DIRECTIVES)
        }
    }

    /// Install the subscriber. Keep the returned guard alive for as long
    /// as file logging should flush.
    pub fn initialize(self) -> Result<Option<WorkerGuard>> {
        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

        layers.push(
            tracing_fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .event_format(LogFormatter)
                .with_writer(std::io::stderr)
                .with_filter(Self::env_filter())
                .boxed(),
        );

        let guard = match &self.dest {
            LogOutputDest::Stderr => None,
            LogOutputDest::Dir(dir) => {
                std::fs::create_dir_all(dir)?;
                let appender = tracing_appender::rolling::daily(dir, "ftn-prober.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                layers.push(
                    tracing_fmt::layer()
                        .with_ansi(false)
                        .with_target(false)
                        .event_format(LogFormatter)
                        .with_writer(writer)
                        .with_filter(Self::env_filter())
                        .boxed(),
                );
                Some(guard)
            }
        };

        tracing_subscriber::registry().with(layers).try_init()?;

        Ok(guard)
    }
}
