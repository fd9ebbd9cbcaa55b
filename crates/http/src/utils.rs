//! Small helpers shared inside the crate.

/// Returns early with `$error` when `$predicate` does not hold.
///
/// Like `assert!`, but for input validation where the failure is an error
/// value instead of a panic:
///
/// ```ignore
/// ensure!(size <= limit, ParseError::too_large_body(size, limit));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
