//! Internal error handling macros.
//!
//! [`fatal!`] handles unrecoverable contract violations (a broken iterator
//! fingerprint, a cursor handed to the wrong dictionary). The process is
//! aborted without unwinding: once one of these fires, entry chains or
//! timer bookkeeping can no longer be trusted.

/// Displays a contract-violation message and aborts the program.
///
/// Use this for misuse that indicates a bug in the calling code rather
/// than a recoverable condition. The program prints a diagnostic message
/// and immediately aborts without unwinding.
///
/// # Examples
///
/// ```ignore
/// if fingerprint != self.fingerprint {
///   fatal!("dictionary mutated during unsafe iteration");
/// }
/// ```
macro_rules! fatal {
  ($error:expr) => {{
    ::std::eprintln!(
      "{}:{}: a usage contract has been violated: {}",
      ::std::file!(),
      ::std::line!(),
      $error,
    );

    ::std::process::abort();
  }};
}

pub(crate) use fatal;
