use std::fmt::Display;
use std::panic::Location;

use crate::call_matcher::NCalls;
use crate::invocation::Invocation;

/// File and line of the public entry point a failure is attributed to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
}

impl SourceLocation {
    /// The location of the nearest caller not marked `#[track_caller]`.
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&'static Location<'static>> for SourceLocation {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Why a test assertion made through this crate failed.
#[derive(Clone, Debug)]
pub enum TestFailure {
    /// A verified invocation's recorded count did not satisfy its call matcher.
    IncorrectInvocationCount {
        invocation: Invocation,
        count: usize,
        matcher_description: String,
        /// Everything recorded for the invocation's selector.
        all_invocations: Vec<Invocation>,
    },
    /// A call had no matching stub and its return type no fallback value.
    MissingStubbedImplementation {
        invocation: Invocation,
        stubbed_selectors: Vec<&'static str>,
    },
    /// A deferred verification never saw a satisfying count.
    UnsatisfiedAsyncExpectation {
        description: Option<String>,
        invocation: Invocation,
        matcher_description: String,
        count: usize,
    },
    /// No way of assigning the recorded calls to an ordered block's verifications, in order,
    /// satisfies every count.
    UnsatisfiableExpectations {
        /// Each verified invocation with the count it expected.
        expectations: Vec<(Invocation, String)>,
        /// Everything the involved mocks recorded, in record order.
        all_invocations: Vec<Invocation>,
    },
    /// Calls were recorded where an ordered block's options allow none.
    UnexpectedInvocations {
        base: Invocation,
        unexpected: Vec<Invocation>,
        prior_to_base: bool,
    },
    /// A `given` or `verify` closure finished without calling any mock.
    NoInvocationInScope { scope: &'static str },
}

impl Display for TestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IncorrectInvocationCount {
                invocation,
                count,
                matcher_description,
                all_invocations,
            } => {
                writeln!(f, "Incorrect invocation count for `{invocation}`: expected {matcher_description}, but it actually matched {}.", NCalls(*count))?;
                writeln!(f)?;
                writeln!(f, "All invocations of `{}`:", invocation.selector_name())?;
                write!(f, "{}", Indented(all_invocations))?;

                if *count == 0 {
                    if let Some(nearest) = all_invocations.last() {
                        writeln!(f)?;
                        writeln!(f, "Most recent call (actual / expected):")?;
                        Diff::new(&nearest.to_string(), &invocation.to_string()).fmt(f)?;
                    }
                }
                Ok(())
            }
            Self::MissingStubbedImplementation {
                invocation,
                stubbed_selectors,
            } => {
                writeln!(f, "Missing stubbed implementation for `{invocation}`.")?;
                writeln!(f)?;
                writeln!(f, "Register a stub with `given(|| mock.{invocation}).will_return(value)`, or configure the mock to fall back to default values.")?;
                writeln!(f)?;
                writeln!(f, "All stubs:")?;
                if stubbed_selectors.is_empty() {
                    write!(f, "   No concrete stubs")
                } else {
                    for (index, selector) in stubbed_selectors.iter().enumerate() {
                        if index > 0 {
                            writeln!(f)?;
                        }
                        write!(f, "   - {selector}")?;
                    }
                    Ok(())
                }
            }
            Self::UnsatisfiedAsyncExpectation {
                description,
                invocation,
                matcher_description,
                count,
            } => {
                if let Some(description) = description {
                    write!(f, "{description}: ")?;
                }
                write!(f, "Async expectation for `{invocation}` was never satisfied: expected {matcher_description}, but it matched {}.", NCalls(*count))
            }
            Self::UnsatisfiableExpectations {
                expectations,
                all_invocations,
            } => {
                writeln!(f, "Unable to simultaneously satisfy expectations")?;
                writeln!(f)?;
                writeln!(f, "Expectations:")?;
                for (index, (invocation, matcher_description)) in expectations.iter().enumerate() {
                    writeln!(f, "   ({}) `{invocation}`: {matcher_description}", index + 1)?;
                }
                writeln!(f)?;
                writeln!(f, "All invocations:")?;
                write!(f, "{}", Indented(all_invocations))
            }
            Self::UnexpectedInvocations {
                base,
                unexpected,
                prior_to_base,
            } => {
                let position = if *prior_to_base { "before" } else { "after" };
                writeln!(f, "Got unexpected invocations {position} `{base}`")?;
                writeln!(f)?;
                writeln!(f, "Invocations:")?;
                write!(f, "{}", Indented(unexpected))
            }
            Self::NoInvocationInScope { scope } => {
                write!(f, "`{scope}` expects its closure to call exactly one mocked method, but no mock was called.")
            }
        }
    }
}

impl std::error::Error for TestFailure {}

/// A [TestFailure] attributed to the test source line that caused it.
#[derive(Clone, Debug)]
pub struct Failure {
    pub failure: TestFailure,
    pub location: SourceLocation,
}

impl Failure {
    pub fn new(failure: TestFailure, location: SourceLocation) -> Self {
        Self { failure, location }
    }
}

impl Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.failure)
    }
}

impl std::error::Error for Failure {}

struct Indented<'a>(&'a [Invocation]);

impl<'a> Display for Indented<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "   No invocations recorded");
        }
        for (index, invocation) in self.0.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "   ({}) {invocation}", index + 1)?;
        }
        Ok(())
    }
}

struct Diff<'s> {
    actual: &'s str,
    expected: &'s str,
}

impl<'s> Diff<'s> {
    fn new(actual: &'s str, expected: &'s str) -> Self {
        Self { actual, expected }
    }
}

impl<'s> Display for Diff<'s> {
    #[cfg(feature = "pretty-print")]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let comparison = pretty_assertions::StrComparison::new(self.actual, self.expected);
        write!(f, "{comparison}")
    }

    #[cfg(not(feature = "pretty-print"))]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  actual: {}", self.actual)?;
        write!(f, "expected: {}", self.expected)
    }
}
