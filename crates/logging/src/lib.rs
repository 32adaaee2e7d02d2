//! helpers for logging.
//!
//! Verbosity comes from the `ROSTER_LOG` environment variable, which takes the usual env_logger filter syntax (e.g.
//! `ROSTER_LOG=roster_datastore=debug`).  Without it, we log at info.
use std::cell::RefCell;

/// Environment variable holding the log filter.
pub const FILTER_ENV: &str = "ROSTER_LOG";

const DEFAULT_FILTER: &str = "info";

fn builder() -> env_logger::Builder {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::new().filter_or(FILTER_ENV, DEFAULT_FILTER));
    builder.format(|buf, record| {
        use std::io::Write;

        let now = time::OffsetDateTime::now_utc();

        writeln!(
            buf,
            "{} {} time={} target={}",
            record.level(),
            record.args(),
            now,
            record.target()
        )
    });
    builder
}

/// Log to stderr.
///
/// If called multiple times in the same process, only applies once.
pub fn log_to_stderr() {
    static ONCE: std::sync::Once = std::sync::Once::new();

    ONCE.call_once(|| {
        builder().init();
    });
}

thread_local! {
    static CAPTURED: RefCell<Option<Vec<String>>> = RefCell::new(None);
}

/// The test logger: env_logger output, plus a per-thread record of messages for [capture_logs].
struct TestLogger {
    inner: env_logger::Logger,
}

impl log::Log for TestLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata) || metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        CAPTURED.with(|captured| {
            if let Some(lines) = captured.borrow_mut().as_mut() {
                if record.level() <= log::Level::Info {
                    lines.push(format!("{} {}", record.level(), record.args()));
                }
            }
        });
        self.inner.log(record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Like [log_to_stderr], but routes through the test harness's output capture.
///
/// Safe to call from every test; only the first call in a process does anything.
pub fn log_for_tests() {
    static ONCE: std::sync::Once = std::sync::Once::new();

    ONCE.call_once(|| {
        let inner = builder().is_test(true).build();
        let max_level = inner.filter().max(log::LevelFilter::Info);
        // Fails if some other logger got there first, in which case nothing is captured.
        if log::set_boxed_logger(Box::new(TestLogger { inner })).is_ok() {
            log::set_max_level(max_level);
        }
    });
}

/// Run `f`, returning what it logged at info or above on this thread as `LEVEL message` lines.
///
/// Installs the test logger if needed.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    log_for_tests();
    let previous = CAPTURED.with(|c| c.borrow_mut().replace(vec![]));
    let ret = f();
    let lines = CAPTURED.with(|c| std::mem::replace(&mut *c.borrow_mut(), previous));
    (ret, lines.unwrap_or_default())
}
