use std::any::Any;
use std::panic::Location;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::{produce, FallbackPolicy, MockConfig, ValueProvider};
use crate::error::{Failure, TestFailure};
use crate::invocation::Invocation;
use crate::lock::SyncCell;
use crate::matcher::ArgumentMatcher;
use crate::mocking_context::MockingContext;
use crate::reporter::Reporter;
use crate::scope;
use crate::stubbing_context::StubbingContext;

///
/// Shared handle to one mock object's recording ledger and stub table.
///
/// A generated mock type embeds a `Mock`, implements [Mocked], and routes each method through
/// [Mock::call]:
///
/// ```rust,ignore
/// struct BirdMock {
///     mock: Mock,
/// }
///
/// impl BirdMock {
///     #[track_caller]
///     fn eat(&self, fruit: impl IntoArg<Fruit>) {
///         self.mock.call("eat", vec![fruit.into_arg().into_matcher()])
///     }
/// }
/// ```
///
/// Clones share the same state, so a clone handed to the code under test records into the
/// same ledger the test verifies against.
///
#[derive(Clone)]
pub struct Mock {
    state: Arc<MockState>,
}

struct MockState {
    config: MockConfig,
    values: SyncCell<ValueProvider>,
    mocking: MockingContext,
    stubbing: StubbingContext,
}

/// Implemented by generated mock types to expose their [Mock].
pub trait Mocked {
    fn mock(&self) -> &Mock;
}

impl Mocked for Mock {
    fn mock(&self) -> &Mock {
        self
    }
}

impl Mock {
    /// A mock with the default [MockConfig].
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(MockConfig::new(name))
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self {
            state: Arc::new(MockState {
                values: SyncCell::new(config.values.clone()),
                config,
                mocking: MockingContext::new(),
                stubbing: StubbingContext::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.state.config.name()
    }

    pub fn config(&self) -> &MockConfig {
        &self.state.config
    }

    pub fn mocking_context(&self) -> &MockingContext {
        &self.state.mocking
    }

    pub fn stubbing_context(&self) -> &StubbingContext {
        &self.state.stubbing
    }

    /// Whether both handles refer to the same mock object.
    pub fn ptr_eq(&self, other: &Mock) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn reporter(&self) -> &dyn Reporter {
        self.state.config.reporter.as_ref()
    }

    ///
    /// Handle a call to the method `selector` with the given arguments.
    ///
    /// Inside a `given` or `verify` closure the invocation is handed to that scope and the
    /// closure is left without producing a value. Otherwise the most recently registered matching
    /// stub runs, the invocation is recorded, and the stub's result is returned. Without a
    /// matching stub the mock's [FallbackPolicy] applies; if that yields no value either, the
    /// call panics with a missing stubbed implementation failure.
    ///
    #[track_caller]
    pub fn call<R: 'static>(&self, selector: &'static str, arguments: Vec<ArgumentMatcher>) -> R {
        let invocation = self.enter(selector, arguments);

        let output = self.dispatch::<R>(&invocation);
        self.state.mocking.record(invocation.clone());

        match output.or_else(|| self.fallback::<R>()) {
            Some(output) => output,
            None => self.missing_stub(invocation, Location::caller()),
        }
    }

    /// Like [Mock::call], for methods returning `Option<T>`: unstubbed calls return `None`.
    #[track_caller]
    pub fn call_optional<T: 'static>(
        &self,
        selector: &'static str,
        arguments: Vec<ArgumentMatcher>,
    ) -> Option<T> {
        let invocation = self.enter(selector, arguments);

        let output = self.dispatch::<Option<T>>(&invocation);
        self.state.mocking.record(invocation);

        output.flatten()
    }

    /// Forget recorded invocations and registered stubs. Default values are kept.
    pub fn reset(&self) {
        self.clear_invocations();
        self.clear_stubs();
    }

    /// Add `values` to the ones returned under [FallbackPolicy::ReturnDefault], replacing
    /// existing values of the same types.
    pub fn use_default_values(&self, values: &ValueProvider) {
        debug!(mock = self.name(), "adding default values");
        self.state
            .values
            .locked(|current| *current = std::mem::take(current).extend(values));
    }

    /// Forget every default value, including the standard ones the mock started with.
    pub fn clear_default_values(&self) {
        debug!(mock = self.name(), "clearing default values");
        self.state.values.locked(|values| *values = ValueProvider::new());
    }

    pub fn clear_invocations(&self) {
        debug!(mock = self.name(), "clearing invocations");
        self.state.mocking.clear_invocations();
    }

    pub fn clear_stubs(&self) {
        debug!(mock = self.name(), "clearing stubs");
        self.state.stubbing.clear_stubs();
    }

    fn enter(&self, selector: &'static str, arguments: Vec<ArgumentMatcher>) -> Invocation {
        let invocation = Invocation::new(selector, arguments);
        if let Some(kind) = scope::capture(self, &invocation) {
            trace!(mock = self.name(), %invocation, scope = kind.name(), "captured invocation");
            scope::exit();
        }
        invocation
    }

    fn dispatch<R: 'static>(&self, invocation: &Invocation) -> Option<R> {
        let output = self.state.stubbing.resolve(invocation)?;
        match output.downcast::<R>() {
            Ok(output) => Some(*output),
            Err(_) => {
                self.state.mocking.record(invocation.clone());
                panic!(
                    "{}: stub for `{invocation}` returned a value that is not a `{}`",
                    self.name(),
                    std::any::type_name::<R>()
                );
            }
        }
    }

    fn fallback<R: 'static>(&self) -> Option<R> {
        // `()` has a safe value under every policy.
        let unit: Box<dyn Any> = Box::new(());
        if let Ok(unit) = unit.downcast::<R>() {
            return Some(*unit);
        }

        match self.state.config.fallback {
            FallbackPolicy::Fail => None,
            FallbackPolicy::ReturnDefault => {
                // Factories run unlocked, they may call into this mock.
                let factory = self.state.values.locked(|values| values.factory::<R>())?;
                produce(&factory)
            }
        }
    }

    fn missing_stub(&self, invocation: Invocation, location: &'static Location<'static>) -> ! {
        debug!(mock = self.name(), %invocation, "missing stubbed implementation");
        let failure = Failure::new(
            TestFailure::MissingStubbedImplementation {
                invocation,
                stubbed_selectors: self.state.stubbing.stubbed_selectors(),
            },
            location.into(),
        );
        panic!("{failure}");
    }
}

impl std::fmt::Debug for Mock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Mock").field(&self.name()).finish()
    }
}

/// Clear invocations and stubs on every mock.
pub fn reset(mocks: &[&dyn Mocked]) {
    for mocked in mocks {
        mocked.mock().reset();
    }
}

/// Clear recorded invocations on every mock, keeping stubs.
pub fn clear_invocations(mocks: &[&dyn Mocked]) {
    for mocked in mocks {
        mocked.mock().clear_invocations();
    }
}

/// Clear stubs on every mock, keeping recorded invocations.
pub fn clear_stubs(mocks: &[&dyn Mocked]) {
    for mocked in mocks {
        mocked.mock().clear_stubs();
    }
}

/// Drop the default values of every mock, see [Mock::clear_default_values].
pub fn clear_default_values(mocks: &[&dyn Mocked]) {
    for mocked in mocks {
        mocked.mock().clear_default_values();
    }
}
