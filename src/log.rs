#[macro_export]
macro_rules! info {
    ($ctx:expr,  $msg:expr) => {
        info!($ctx, $msg,)
    };
    ($ctx:expr, $msg:expr, $($args:expr),* $(,)?) => {
        let formatted = format!($msg, $($args),*);
        emit_event!($ctx, $crate::Event::Info(formatted));
    };
}

#[macro_export]
macro_rules! warn {
    ($ctx:expr, $msg:expr) => {
        warn!($ctx, $msg,)
    };
    ($ctx:expr, $msg:expr, $($args:expr),* $(,)?) => {
        let formatted = format!($msg, $($args),*);
        emit_event!($ctx, $crate::Event::Warning(formatted));
    };
}

#[macro_export]
macro_rules! error {
    ($ctx:expr, $msg:expr) => {
        error!($ctx, $msg,)
    };
    ($ctx:expr, $msg:expr, $($args:expr),* $(,)?) => {
        let formatted = format!($msg, $($args),*);
        emit_event!($ctx, $crate::Event::Error(formatted));
    };
}

#[macro_export]
macro_rules! emit_event {
    ($ctx:expr, $event:expr) => {
        $ctx.call_cb($event);
    };
}

/// Debug-only trace of manual lock/unlock call sites, gated behind
/// `cfg(debug_assertions)` callers ([`crate::sql::Sql::lock_dbg`]/
/// `unlock_dbg`). Prints to stderr rather than through a [`Context`], since
/// the whole point is to catch lock misuse independent of event wiring.
///
/// [`Context`]: crate::Context
#[cfg(debug_assertions)]
pub(crate) fn log_lock_debug(file: &'static str, line: u32, action: &str) {
    eprintln!("[sql-lock] {action} at {file}:{line}");
}
