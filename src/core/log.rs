use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Installs the global subscriber. Logs go to stderr.
///
/// `RUST_LOG` directives take precedence over `default_level` (or debug when
/// `verbose` is set), for every target including `bidwatch` itself.
pub fn init_logging(verbose: bool, default_level: LevelFilter) {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(build_filter(verbose, default_level, directives.as_deref()))
        .init();
}

fn build_filter(verbose: bool, default_level: LevelFilter, directives: Option<&str>) -> EnvFilter {
    let level_filter = if verbose { LevelFilter::DEBUG } else { default_level };
    EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .parse_lossy(directives.unwrap_or_default())
}

/// Collects formatted log output in memory so tests can assert on it.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl CapturedLogs {
    /// Routes this thread's logs into the buffer until the guard drops.
    pub(crate) fn install(&self, max_level: tracing::Level) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(max_level)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[cfg(test)]
impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl<'a> fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
