//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Structured logging adapters and sinks."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Logging macros that stamp [`crate::LogContext`] fields on every event.

#[doc(hidden)]
#[macro_export]
macro_rules! __vpp_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        $crate::tracing::event!(
            $level,
            controller = ctx.controller.unwrap_or(""),
            tick = ctx.tick.unwrap_or_default(),
            channel = ctx.channel.unwrap_or(""),
            mode = ctx.mode.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with engine context.
#[macro_export]
macro_rules! vpp_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__vpp_event!($crate::tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__vpp_event!($crate::tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with engine context.
#[macro_export]
macro_rules! vpp_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__vpp_event!($crate::tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__vpp_event!($crate::tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with engine context.
#[macro_export]
macro_rules! vpp_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__vpp_event!($crate::tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__vpp_event!($crate::tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with engine context.
#[macro_export]
macro_rules! vpp_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__vpp_event!($crate::tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__vpp_event!($crate::tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
