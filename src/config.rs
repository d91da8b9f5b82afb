use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::reporter::{PanicReporter, Reporter};

/// What a mock does when a call matches no stub.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FallbackPolicy {
    /// Report a missing stubbed implementation. Calls returning `()` still succeed.
    #[default]
    Fail,
    /// Return a value from the mock's [ValueProvider] when it has one for the return type.
    ReturnDefault,
}

pub(crate) type Factory = Arc<dyn Fn() -> Box<dyn Any> + Send + Sync>;

///
/// Registry of fallback return values, keyed by type.
///
/// ```rust,ignore
/// let values = ValueProvider::standard().register(Fruit::Apple);
/// let bird = BirdMock::with_config(
///     MockConfig::new("bird")
///         .fallback(FallbackPolicy::ReturnDefault)
///         .value_provider(values),
/// );
/// ```
///
#[derive(Clone, Default)]
pub struct ValueProvider {
    factories: HashMap<TypeId, Factory>,
}

static STANDARD: Lazy<ValueProvider> = Lazy::new(|| {
    ValueProvider::new()
        .register_default::<()>()
        .register_default::<bool>()
        .register_default::<char>()
        .register_default::<String>()
        .register_default::<i8>()
        .register_default::<i16>()
        .register_default::<i32>()
        .register_default::<i64>()
        .register_default::<i128>()
        .register_default::<isize>()
        .register_default::<u8>()
        .register_default::<u16>()
        .register_default::<u32>()
        .register_default::<u64>()
        .register_default::<u128>()
        .register_default::<usize>()
        .register_default::<f32>()
        .register_default::<f64>()
});

impl ValueProvider {
    /// An empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero values for the primitive types, `String` and `()`.
    pub fn standard() -> Self {
        STANDARD.clone()
    }

    /// Provide clones of `value` for `T`.
    pub fn register<T: Clone + Send + Sync + 'static>(self, value: T) -> Self {
        self.register_with(move || value.clone())
    }

    /// Provide values of `T` produced by `factory`.
    pub fn register_with<T: 'static>(mut self, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.factories.insert(
            TypeId::of::<T>(),
            Arc::new(move || Box::new(factory()) as Box<dyn Any>),
        );
        self
    }

    /// Provide `T::default()` for `T`.
    pub fn register_default<T: Default + 'static>(self) -> Self {
        self.register_with(T::default)
    }

    pub fn remove<T: 'static>(mut self) -> Self {
        self.factories.remove(&TypeId::of::<T>());
        self
    }

    /// Add all of `other`'s values, replacing existing ones of the same type.
    pub fn extend(mut self, other: &ValueProvider) -> Self {
        self.factories
            .extend(other.factories.iter().map(|(id, factory)| (*id, factory.clone())));
        self
    }

    pub fn provides<T: 'static>(&self) -> bool {
        self.factories.contains_key(&TypeId::of::<T>())
    }

    /// A fresh value of `T`, if one is registered.
    pub fn provide<T: 'static>(&self) -> Option<T> {
        produce(&self.factory::<T>()?)
    }

    pub(crate) fn factory<T: 'static>(&self) -> Option<Factory> {
        self.factories.get(&TypeId::of::<T>()).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

pub(crate) fn produce<T: 'static>(factory: &Factory) -> Option<T> {
    factory().downcast::<T>().ok().map(|value| *value)
}

impl std::fmt::Debug for ValueProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueProvider")
            .field("types", &self.factories.len())
            .finish()
    }
}

/// Per-mock settings.
#[derive(Clone)]
pub struct MockConfig {
    pub(crate) name: String,
    pub(crate) fallback: FallbackPolicy,
    pub(crate) values: ValueProvider,
    pub(crate) reporter: Arc<dyn Reporter>,
}

impl MockConfig {
    /// Defaults: fail on unstubbed calls, standard values, panic on failures.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fallback: FallbackPolicy::default(),
            values: ValueProvider::standard(),
            reporter: Arc::new(PanicReporter),
        }
    }

    pub fn fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// The initial value provider consulted under [FallbackPolicy::ReturnDefault].
    pub fn value_provider(mut self, values: ValueProvider) -> Self {
        self.values = values;
        self
    }

    /// Send verification failures to `reporter` instead of panicking.
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for MockConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConfig")
            .field("name", &self.name)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}
