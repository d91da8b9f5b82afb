use std::fmt::Display;
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::invocation::Invocation;

type Predicate = Arc<dyn Fn(usize) -> bool + Send + Sync>;
type Describer = Arc<dyn Fn(&Invocation, usize, bool) -> String + Send + Sync>;

///
/// A predicate over an invocation count, with a description for failure messages.
///
/// Call matchers are plain values and compose with [CallMatcher::and], [CallMatcher::or],
/// [CallMatcher::xor] and [not]:
///
/// ```rust,ignore
/// verify(|| bird.fly()).was_called(at_least(1).and(at_most(3)));
/// verify(|| bird.fly()).was_called(not(once()));
/// ```
///
#[derive(Clone)]
pub struct CallMatcher {
    predicate: Predicate,
    describer: Describer,
}

impl CallMatcher {
    /// Build a matcher from a count predicate and a description builder.
    ///
    /// The describer receives the verified invocation, the actual count and whether the
    /// description is requested in negated form.
    pub fn new(
        predicate: impl Fn(usize) -> bool + Send + Sync + 'static,
        describer: impl Fn(&Invocation, usize, bool) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            predicate: Arc::new(predicate),
            describer: Arc::new(describer),
        }
    }

    pub fn matches(&self, count: usize) -> bool {
        (self.predicate)(count)
    }

    /// The expected count, phrased as a comparison against `n`.
    pub fn describe(&self, invocation: &Invocation, count: usize) -> String {
        self.describe_negated(invocation, count, false)
    }

    pub fn describe_negated(&self, invocation: &Invocation, count: usize, negated: bool) -> String {
        (self.describer)(invocation, count, negated)
    }

    /// Matches when either operand matches.
    pub fn or(self, other: impl Into<CallMatcher>) -> CallMatcher {
        self.combine(other.into(), |a, b| a || b, ["||", "&&"])
    }

    /// Matches when both operands match.
    pub fn and(self, other: impl Into<CallMatcher>) -> CallMatcher {
        self.combine(other.into(), |a, b| a && b, ["&&", "||"])
    }

    /// Matches when exactly one operand matches.
    pub fn xor(self, other: impl Into<CallMatcher>) -> CallMatcher {
        self.combine(other.into(), |a, b| a != b, ["≠", "="])
    }

    fn combine(
        self,
        other: CallMatcher,
        op: fn(bool, bool) -> bool,
        [plain, negated_op]: [&'static str; 2],
    ) -> CallMatcher {
        let (lhs, rhs) = (self.clone(), other.clone());
        CallMatcher::new(
            move |count| op(lhs.matches(count), rhs.matches(count)),
            move |invocation, count, negated| {
                let operator = if negated { negated_op } else { plain };
                format!(
                    "({}) {operator} ({})",
                    self.describe_negated(invocation, count, negated),
                    other.describe_negated(invocation, count, negated)
                )
            },
        )
    }
}

impl std::ops::Not for CallMatcher {
    type Output = CallMatcher;

    fn not(self) -> CallMatcher {
        not(self)
    }
}

impl From<usize> for CallMatcher {
    fn from(times: usize) -> Self {
        exactly(times)
    }
}

impl std::fmt::Debug for CallMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallMatcher").finish_non_exhaustive()
    }
}

fn comparison(
    predicate: impl Fn(usize) -> bool + Send + Sync + 'static,
    [plain, negated_op]: [&'static str; 2],
    times: usize,
) -> CallMatcher {
    CallMatcher::new(predicate, move |_, _, negated| {
        let operator = if negated { negated_op } else { plain };
        format!("n {operator} {times}")
    })
}

/// Matches exactly `times` calls.
pub fn exactly(times: usize) -> CallMatcher {
    comparison(move |count| count == times, ["=", "≠"], times)
}

/// Matches exactly one call.
pub fn once() -> CallMatcher {
    exactly(1)
}

pub fn twice() -> CallMatcher {
    exactly(2)
}

/// Matches zero calls.
pub fn never() -> CallMatcher {
    exactly(0)
}

/// Matches `times` or more calls.
pub fn at_least(times: usize) -> CallMatcher {
    comparison(move |count| count >= times, ["≥", "<"], times)
}

/// Matches `times` or fewer calls.
pub fn at_most(times: usize) -> CallMatcher {
    comparison(move |count| count <= times, ["≤", ">"], times)
}

/// Matches a count inside the inclusive `range`.
pub fn between(range: RangeInclusive<usize>) -> CallMatcher {
    at_least(*range.start()).and(at_most(*range.end()))
}

/// Inverts the predicate, and the comparison operators in the description.
pub fn not(matcher: impl Into<CallMatcher>) -> CallMatcher {
    let matcher = matcher.into();
    let inner = matcher.clone();
    CallMatcher::new(
        move |count| !inner.matches(count),
        move |invocation, count, negated| matcher.describe_negated(invocation, count, !negated),
    )
}

/// Count phrasing for failure messages.
pub(crate) struct NCalls(pub usize);

impl Display for NCalls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            0 => write!(f, "no calls"),
            1 => write!(f, "1 call"),
            _ => write!(f, "{} calls", self.0),
        }
    }
}
