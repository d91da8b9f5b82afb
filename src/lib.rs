//!
//! `decoy` is the runtime core of a mocking library: it records the calls made against mock
//! objects, resolves stubbed return values, and verifies call counts, synchronously or once the
//! calls have arrived on some other thread.
//!
//! Mock types are normally generated. A mock embeds a [Mock] and routes every method through
//! [Mock::call], accepting either plain values or matchers as arguments:
//!
//! ```rust,ignore
//! use decoy::*;
//!
//! struct BirdMock {
//!     mock: Mock,
//! }
//!
//! impl Mocked for BirdMock {
//!     fn mock(&self) -> &Mock {
//!         &self.mock
//!     }
//! }
//!
//! impl BirdMock {
//!     #[track_caller]
//!     fn can_fly(&self) -> bool {
//!         self.mock.call("can_fly", vec![])
//!     }
//!
//!     #[track_caller]
//!     fn fly(&self) {
//!         self.mock.call("fly", vec![])
//!     }
//! }
//!
//! let bird = BirdMock { mock: Mock::new("bird") };
//!
//! given(|| bird.can_fly()).will_return(true);
//! if bird.can_fly() {
//!     bird.fly();
//!     bird.fly();
//! }
//!
//! verify(|| bird.fly()).was_called(exactly(2));
//! ```
//!
//! # Scopes
//! [given] and [verify] take a closure containing a single mock call. The call is not executed:
//! while the closure runs, the mock hands its invocation to the enclosing scope through a
//! thread-local channel and leaves the closure. The scope then registers a stub, or compares a
//! [CallMatcher] against the recorded invocations. Leaving the closure unwinds, so the crate
//! needs `panic = "unwind"`.
//!
//! Stubs can be chained; each implementation is used until its [Transition] fires:
//!
//! ```rust,ignore
//! given(|| bird.can_fly()).will_return(true).will_return(false);
//! ```
//!
//! # Async verification
//! Verifications inside [eventually] are deferred until matching invocations have been recorded,
//! which may happen on any thread. The returned [CompletionHandle] can be waited on, or awaited.
//! An [in_order] block inside [eventually] is deferred as a whole.
//!
//! # Failures
//! Verification failures go to the mock's [Reporter]: the default [PanicReporter] fails the test
//! right away, a [FailureLog] collects failures so several can be reported together.
//!

#![forbid(unsafe_code)]

mod async_group;
mod call_matcher;
mod captor;
mod config;
mod error;
mod invocation;
mod lock;
mod matcher;
mod mock;
mod mocking_context;
mod ordered;
mod reporter;
mod scope;
mod stubbing;
mod stubbing_context;
mod verification;

pub use async_group::{begin_async_verification, eventually, AsyncVerification, CompletionHandle};
pub use call_matcher::{at_least, at_most, between, exactly, never, not, once, twice, CallMatcher};
pub use captor::ArgumentCaptor;
pub use config::{FallbackPolicy, MockConfig, ValueProvider};
pub use error::{Failure, SourceLocation, TestFailure};
pub use invocation::Invocation;
pub use matcher::{
    any, any_containing, any_count, any_of, any_where, any_with_keys, any_with_values, around,
    comparator, not_empty, not_nil, AnyValue, Arg, ArgumentMatcher, Commutativity, Comparator,
    IntoArg, TypeTag,
};
pub use mock::{clear_default_values, clear_invocations, clear_stubs, reset, Mock, Mocked};
pub use mocking_context::{InvocationObserver, MockingContext, ObserverId};
pub use ordered::{in_order, OrderedVerificationOptions};
pub use reporter::{FailureLog, PanicReporter, Reporter};
pub use stubbing::{given, sequence, SequenceType, Stubbing, Transition};
pub use stubbing_context::{Implementation, StubbingContext};
pub use verification::{verify, Expectation, Verification};
