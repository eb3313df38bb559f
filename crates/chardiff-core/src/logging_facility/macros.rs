//! Operation boundary macros
//!
//! `log_op_start!`, `log_op_end!` and `log_op_error!` all expand to one
//! event carrying `component`, `op` and `event`; end events add
//! `duration_ms` and error events add `err.kind` / `err.code`. Any extra
//! `tracing` fields are passed through after those.

#[doc(hidden)]
#[macro_export]
macro_rules! __op_event {
    ($level:ident, $op:expr, $event:ident $(, $($field:tt)+)?) => {
        tracing::$level!(
            component = module_path!(),
            op = $op,
            event = $crate::chardiff_core_types::schema::$event,
            $($($field)+)?
        )
    };
}

/// Operation started.
///
/// ```
/// # use chardiff_core::log_op_start;
/// log_op_start!("analyze");
/// log_op_start!("analyze", character_id = "c-42");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)+)?) => {
        $crate::__op_event!(info, $op, EVENT_START $(, $($field)+)?)
    };
}

/// Operation finished; `duration_ms` is required.
///
/// ```
/// # use chardiff_core::log_op_end;
/// log_op_end!("analyze", duration_ms = 3);
/// log_op_end!("analyze", duration_ms = 3, change_count = 7);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {
        $crate::__op_event!(info, $op, EVENT_END, duration_ms = $duration $(, $($field)+)?)
    };
}

/// Operation failed.
///
/// `$err` is anything convertible into
/// [`ExError`](crate::errors::ExError); its kind and stable code are logged.
///
/// ```
/// # use chardiff_core::{log_op_error, errors::DetectError};
/// let err = DetectError::InvalidContext { reason: "blank rule version".to_string() };
/// log_op_error!("analyze", err, duration_ms = 1);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        $crate::__op_event!(
            error,
            $op,
            EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code()
            $(, $($field)+)?
        )
    }};
}
