//! Ordered fallback resolution.
//!
//! Both the dispatch forwarder and the symbol resolver try a fixed list of
//! strategies in priority order. A strategy either handles the input,
//! declines it, or fails; a failure stops the chain, a decline moves on to
//! the next strategy. Each strategy is tried at most once.

use crate::error::Result;

/// One way of handling an input.
pub trait Strategy<I: ?Sized, O> {
    /// Short name reported when every strategy declines.
    fn name(&self) -> &'static str;

    /// Returns `Ok(None)` to decline.
    fn attempt(&self, input: &I) -> Result<Option<O>>;
}

/// Outcome of running a chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<O> {
    /// The first strategy that handled the input produced this.
    Found(O),
    /// Every strategy declined; their names, in order.
    Exhausted(Vec<&'static str>),
}

/// Runs `strategies` in order and returns the first success.
///
/// # Errors
///
/// Returns the first error raised by a strategy. Later strategies are not
/// tried.
pub fn resolve<I: ?Sized, O>(strategies: &[&dyn Strategy<I, O>], input: &I) -> Result<Resolution<O>> {
    let mut tried = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        if let Some(found) = strategy.attempt(input)? {
            return Ok(Resolution::Found(found));
        }
        tried.push(strategy.name());
    }
    Ok(Resolution::Exhausted(tried))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::Cell;

    struct Decline<'a>(&'a Cell<u32>);
    struct Answer(i64);
    struct Fail;

    impl Strategy<str, i64> for Decline<'_> {
        fn name(&self) -> &'static str {
            "decline"
        }
        fn attempt(&self, _: &str) -> Result<Option<i64>> {
            self.0.set(self.0.get() + 1);
            Ok(None)
        }
    }

    impl Strategy<str, i64> for Answer {
        fn name(&self) -> &'static str {
            "answer"
        }
        fn attempt(&self, _: &str) -> Result<Option<i64>> {
            Ok(Some(self.0))
        }
    }

    impl Strategy<str, i64> for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }
        fn attempt(&self, input: &str) -> Result<Option<i64>> {
            Err(Error::NameNotFound { name: input.to_string() })
        }
    }

    #[test]
    fn test_first_success_wins() {
        let calls = Cell::new(0);
        let decline = Decline(&calls);
        let result = resolve::<str, i64>(&[&decline, &Answer(1), &Answer(2)], "x").unwrap();
        assert_eq!(result, Resolution::Found(1));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_exhausted_lists_names() {
        let calls = Cell::new(0);
        let decline = Decline(&calls);
        let result = resolve::<str, i64>(&[&decline, &decline], "x").unwrap();
        assert_eq!(result, Resolution::Exhausted(vec!["decline", "decline"]));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_error_stops_chain() {
        let calls = Cell::new(0);
        let decline = Decline(&calls);
        let err = resolve::<str, i64>(&[&Fail, &decline], "Foo").unwrap_err();
        assert_eq!(err, Error::NameNotFound { name: "Foo".into() });
        assert_eq!(calls.get(), 0);
    }
}
