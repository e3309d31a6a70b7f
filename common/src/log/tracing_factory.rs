use std::sync::Once;

use tracing::Level;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::MakeWriterExt;

static INIT: Once = Once::new();

/// One-shot tracing bootstrap shared by the server binary and tests.
/// Repeated calls are no-ops, so every test can start with
/// `TracingFactory::init_log(true)` without fighting over the global
/// subscriber.
#[derive(Debug, Clone, Default)]
pub struct TracingFactory {
    options: TracingFactoryOptions,
}

#[derive(Debug, Clone)]
pub struct TracingFactoryOptions {
    debug: bool,

    output_type: OutputType,

    level: Option<Level>,

    log_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub enum OutputType {
    Stdout,

    Log,
}

impl TracingFactory {
    pub fn init_log(debug: bool) -> Self {
        TracingFactory::init_log_with_options(TracingFactoryOptions::new_with_debug(debug))
    }

    pub fn init_log_with_options(opt: TracingFactoryOptions) -> Self {
        let mut opts = opt.clone();

        if opts.log_dir.is_none() {
            opts.log_dir = Some(String::from("/tmp/dbserver/logs"));
        }

        let level = match opts.level {
            None => {
                if opts.debug {
                    Level::DEBUG
                } else {
                    Level::INFO
                }
            }
            Some(l) => l,
        };

        INIT.call_once(|| {
            // Configure a custom event formatter
            let format = fmt::format()
                .with_file(true)
                .with_line_number(false)
                .with_target(false)
                .with_thread_ids(true)
                .with_thread_names(true)
                .compact();

            match opts.output_type {
                OutputType::Stdout => {
                    fmt()
                        .event_format(format)
                        .with_max_level(level)
                        .init();
                }
                OutputType::Log => {
                    let dir = opts.log_dir.clone().unwrap();
                    let file_appender = rolling::daily(dir, "dbserver.log");
                    fmt()
                        .event_format(format)
                        .with_max_level(level)
                        .with_writer(file_appender.with_max_level(level))
                        .with_ansi(false)
                        .init();
                }
            }
        });

        TracingFactory { options: opts }
    }

    pub fn options(&self) -> &TracingFactoryOptions {
        &self.options
    }
}

impl TracingFactoryOptions {
    pub fn new(debug: bool, output_type: OutputType, level: Option<Level>, log_dir: Option<String>) -> Self {
        TracingFactoryOptions {
            debug,
            output_type,
            level,
            log_dir,
        }
    }

    pub fn new_with_debug(debug: bool) -> Self {
        TracingFactoryOptions {
            debug,
            output_type: OutputType::Stdout,
            level: None,
            log_dir: None,
        }
    }

    pub fn new_with_log_dir(debug: bool, log_dir: String) -> Self {
        TracingFactoryOptions {
            debug,
            output_type: OutputType::Log,
            level: None,
            log_dir: Some(log_dir),
        }
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }
}

impl Default for TracingFactoryOptions {
    fn default() -> Self {
        TracingFactoryOptions::new_with_debug(false)
    }
}
