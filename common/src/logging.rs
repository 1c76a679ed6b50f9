use std::sync::Once;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

static INIT: Once = Once::new();

/// Initializes the global tracing subscriber exactly once, guarded by a
/// safe `std::sync::Once` rather than a hand-rolled init flag.
///
/// `debug` raises the level to `DEBUG`; otherwise the tool logs at `INFO`.
/// Every propagated error is logged with the table name (if any) and the
/// underlying driver/subprocess message.
pub fn init(debug: bool) {
    INIT.call_once(|| {
        let level = if debug { Level::DEBUG } else { Level::INFO };

        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::NONE)
            .compact()
            .try_init();
    });
}
