//! Error handling foundation for the greenlight platform.
//!
//! Only the `Result` type alias lives here. Domain-specific error types
//! belong to the crates that produce them, each adding layer-appropriate
//! context through rootcause's `.context()` as errors propagate upward.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_type_works() {
        let ok: Result<i32> = Ok(42);
        assert_eq!(ok.expect("should be ok"), 42);
    }
}
