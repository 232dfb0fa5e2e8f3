//! Logging abstraction
//!
//! The control core logs through these macros so the same code runs on the
//! target and on the host:
//! - `defmt` feature: forwards to the matching `defmt` macro (RTT transport)
//! - Host tests: `println!` with a level prefix
//! - Anything else: arguments are type-checked and discarded
//!
//! Format strings must stay compatible with both `defmt` and `core::fmt`,
//! so stick to `{}` for primitives and `{:?}` for domain enums.

/// Log informational message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::info!($($arg)*);

        #[cfg(all(not(feature = "defmt"), test))]
        println!("[INFO] {}", format!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(test)))]
        match ::core::format_args!($($arg)*) {
            _ => (),
        }
    }};
}

/// Log warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($arg)*);

        #[cfg(all(not(feature = "defmt"), test))]
        println!("[WARN] {}", format!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(test)))]
        match ::core::format_args!($($arg)*) {
            _ => (),
        }
    }};
}

/// Log error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::error!($($arg)*);

        #[cfg(all(not(feature = "defmt"), test))]
        println!("[ERROR] {}", format!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(test)))]
        match ::core::format_args!($($arg)*) {
            _ => (),
        }
    }};
}

/// Log debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)*);

        #[cfg(all(not(feature = "defmt"), test))]
        println!("[DEBUG] {}", format!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(test)))]
        match ::core::format_args!($($arg)*) {
            _ => (),
        }
    }};
}

/// Wraps a foreign error or value so it can be logged with `{:?}`
///
/// With `defmt` this is [`defmt::Debug2Format`], otherwise the value itself.
#[cfg(feature = "defmt")]
pub fn debug_fmt<T: core::fmt::Debug + ?Sized>(value: &T) -> defmt::Debug2Format<'_, T> {
    defmt::Debug2Format(value)
}

/// Wraps a foreign error or value so it can be logged with `{:?}`
///
/// With `defmt` this is `defmt::Debug2Format`, otherwise the value itself.
#[cfg(not(feature = "defmt"))]
pub fn debug_fmt<T: core::fmt::Debug + ?Sized>(value: &T) -> &T {
    value
}
