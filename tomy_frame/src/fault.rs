//! Severity-classified faults raised by units of work
//!
//! A [`Fault`] is an ordinary error value: units of work return it through
//! `?` and the fault boundary around every worker (see
//! [`crate::thread`]) recognizes it by downcasting. Only
//! [`Severity::Fatal`] escalates to a process-wide stop; every other
//! severity is logged and absorbed by the boundary.
//!
//! ```rust
//! use tomy_frame::{Severity, fault};
//!
//! fn connect(port: u16) -> Result<(), tomy_frame::Fault> {
//!     if port == 0 {
//!         return Err(fault!(Severity::Error, 101, "invalid port {}", port));
//!     }
//!     Ok(())
//! }
//!
//! let fault = connect(0).unwrap_err();
//! assert_eq!(fault.code(), 101);
//! assert!(!fault.is_fatal());
//! assert!(fault.origin().function.ends_with("connect"));
//! ```

use crate::context::ProcessContext;
use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Fault severity, ordered for escalation.
///
/// Only `Fatal` triggers a process-wide stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Informational
    Info,
    /// Recoverable anomaly
    Warn,
    /// Developer diagnostics
    Debug,
    /// Failed operation, process keeps running
    Error,
    /// Unrecoverable; stops the whole process
    Fatal,
}

impl Severity {
    /// Upper-case tag used in rendered records
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Debug => "DEBUG",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a fault was created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    /// Source file
    pub file: &'static str,
    /// Enclosing function path, empty when unknown
    pub function: &'static str,
    /// Source line
    pub line: u32,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.function.is_empty() {
            write!(f, "{}:{}", self.file, self.line)
        } else {
            write!(f, "{}:{} {}", self.file, self.line, self.function)
        }
    }
}

/// Immutable error value with severity, numeric code, message and origin.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{severity}] {origin}: ({code}) {message}")]
pub struct Fault {
    severity: Severity,
    code: i32,
    message: String,
    origin: Origin,
}

impl Fault {
    /// Fault originating at the caller's location.
    ///
    /// The function name is not available this way; use [`fault!`](crate::fault!)
    /// to capture it as well.
    #[track_caller]
    pub fn new(severity: Severity, code: i32, message: impl Into<String>) -> Self {
        let caller = Location::caller();
        Self::with_origin(
            severity,
            code,
            message,
            Origin {
                file: caller.file(),
                function: "",
                line: caller.line(),
            },
        )
    }

    /// Fault with an explicit origin
    pub fn with_origin(
        severity: Severity,
        code: i32,
        message: impl Into<String>,
        origin: Origin,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            origin,
        }
    }

    /// Severity
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Numeric code
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Message text
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Creation site
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// True only for [`Severity::Fatal`]
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// Render the fault into the process log and emit a matching tracing event.
    pub fn write_message(&self, ctx: &ProcessContext) {
        match self.severity {
            Severity::Fatal | Severity::Error => tracing::error!(code = self.code, "{}", self),
            Severity::Warn => tracing::warn!(code = self.code, "{}", self),
            Severity::Info => tracing::info!(code = self.code, "{}", self),
            Severity::Debug => tracing::debug!(code = self.code, "{}", self),
        }
        if let Err(e) = ctx.put_log(format_args!("{self}")) {
            tracing::error!("Failed to log fault {}: {}", self.code, e);
        }
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __function_path {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        match name.strip_suffix("::f") {
            Some(stripped) => stripped,
            None => name,
        }
    }};
}

/// Create a [`Fault`] capturing file, line and enclosing function.
///
/// `fault!(severity, code, "format {}", args...)`
#[macro_export]
macro_rules! fault {
    ($severity:expr, $code:expr, $($arg:tt)+) => {
        $crate::fault::Fault::with_origin(
            $severity,
            $code,
            ::std::format!($($arg)+),
            $crate::fault::Origin {
                file: ::std::file!(),
                function: $crate::__function_path!(),
                line: ::std::line!(),
            },
        )
    };
}
