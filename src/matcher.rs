use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::Sub;
use std::sync::Arc;

use crate::call_matcher::{at_least, CallMatcher};
use crate::invocation::Invocation;

/// Type-erased argument value, as stored inside an [ArgumentMatcher].
pub type AnyValue = dyn Any + Send + Sync;

/// Comparator deciding whether two argument bases are the same.
///
/// The first parameter is the base of the matcher owning the comparator (the receiver),
/// the second is the base of the other side.
pub type Comparator = Arc<dyn Fn(Option<&AnyValue>, Option<&AnyValue>) -> bool + Send + Sync>;

/// Which side of an equality check a matcher's comparator may be used from.
///
/// Wildcard matchers like [any] can only act as the receiver ([Commutativity::Lhs]),
/// they do not have a meaningful base value that another matcher could inspect.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Commutativity {
    /// The matcher can be the receiver of a comparison.
    Lhs,
    /// The matcher can be the argument of a comparison.
    Rhs,
    /// The matcher can sit on either side.
    Both,
}

/// Runtime tag for the static type of an argument.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// The tag of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Whether this tag belongs to `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// The type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

///
/// Equality wrapper around one call argument.
///
/// Concrete values compare structurally, matchers created by [any], [not_nil], [any_of] or
/// [any_where] compare with a predicate. Two matchers are compared with `==`; which side's
/// comparator is used is decided by their [Commutativity].
///
/// Values that do not implement [PartialEq] can only be compared by identity,
/// see [ArgumentMatcher::by_reference].
///
#[derive(Clone)]
pub struct ArgumentMatcher {
    base: Option<Arc<AnyValue>>,
    base_type: TypeTag,
    description: String,
    commutativity: Commutativity,
    comparator: Comparator,
}

impl ArgumentMatcher {
    /// Create a matcher from its raw parts.
    ///
    /// Without a `comparator` the bases are compared by identity and the matcher is
    /// [Commutativity::Both]. A custom comparator makes it [Commutativity::Lhs]; use
    /// [ArgumentMatcher::with_commutativity] to let it sit elsewhere.
    pub fn new(
        base: Option<Arc<AnyValue>>,
        base_type: TypeTag,
        description: Option<String>,
        comparator: Option<Comparator>,
    ) -> Self {
        let by_reference = comparator.is_none() && base.is_some();
        let description = description.unwrap_or_else(|| {
            if by_reference {
                format!("{} (by reference)", base_type.name())
            } else {
                base_type.name().to_string()
            }
        });

        let (commutativity, comparator) = match comparator {
            Some(comparator) => (Commutativity::Lhs, comparator),
            None => (Commutativity::Both, Arc::new(identical) as Comparator),
        };
        Self {
            base,
            base_type,
            description,
            commutativity,
            comparator,
        }
    }

    pub fn with_commutativity(mut self, commutativity: Commutativity) -> Self {
        self.commutativity = commutativity;
        self
    }

    /// Matcher for a concrete value, compared structurally from both sides.
    pub fn value<T>(value: T) -> Self
    where
        T: PartialEq + Debug + Send + Sync + 'static,
    {
        let description = format!("{value:?}");
        Self::new(
            Some(Arc::new(value)),
            TypeTag::of::<T>(),
            Some(description),
            Some(comparator(|lhs, rhs| {
                match (
                    lhs.and_then(|lhs| lhs.downcast_ref::<T>()),
                    rhs.and_then(|rhs| rhs.downcast_ref::<T>()),
                ) {
                    (Some(lhs), Some(rhs)) => lhs == rhs,
                    _ => false,
                }
            })),
        )
        .with_commutativity(Commutativity::Both)
    }

    /// Matcher for a value that can only be compared by identity.
    ///
    /// Two separately created `Arc`s never match, even when their contents are equal.
    /// Generated mocks fall back to this for argument types without [PartialEq], so such
    /// arguments can only be stubbed or verified with wildcard matchers.
    pub fn by_reference<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self::new(Some(value), TypeTag::of::<T>(), None, None)
    }

    /// Receiver-only matcher deciding with a thunk that ignores both bases.
    pub fn with_thunk(
        base: Option<Arc<AnyValue>>,
        base_type: TypeTag,
        description: impl Into<String>,
        thunk: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            base,
            base_type,
            Some(description.into()),
            Some(comparator(move |_, _| thunk())),
        )
    }

    /// Receiver-only matcher accepting the other side's value when `predicate` holds.
    ///
    /// Values of another type than `T` never match.
    pub fn predicate<T: 'static>(
        description: impl Into<String>,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            None,
            TypeTag::of::<T>(),
            Some(description.into()),
            Some(comparator(move |_, rhs| {
                rhs.and_then(|rhs| rhs.downcast_ref::<T>())
                    .map(&predicate)
                    .unwrap_or(false)
            })),
        )
    }

    /// The wrapped value, if this is not a wildcard.
    pub fn base(&self) -> Option<&AnyValue> {
        self.base.as_deref()
    }

    /// Downcast the wrapped value.
    pub fn base_as<T: 'static>(&self) -> Option<&T> {
        self.base().and_then(|base| base.downcast_ref::<T>())
    }

    /// The static type of the argument.
    pub fn base_type(&self) -> TypeTag {
        self.base_type
    }

    /// Human readable form used in failure messages.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Which sides this matcher can be compared from.
    pub fn commutativity(&self) -> Commutativity {
        self.commutativity
    }

    fn compare(&self, rhs: Option<&AnyValue>) -> bool {
        (self.comparator)(self.base(), rhs)
    }
}

/// Erase a comparator closure.
pub fn comparator(
    compare: impl Fn(Option<&AnyValue>, Option<&AnyValue>) -> bool + Send + Sync + 'static,
) -> Comparator {
    Arc::new(compare)
}

fn identical(lhs: Option<&AnyValue>, rhs: Option<&AnyValue>) -> bool {
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => std::ptr::eq(
            lhs as *const AnyValue as *const (),
            rhs as *const AnyValue as *const (),
        ),
        (None, None) => true,
        _ => false,
    }
}

impl PartialEq for ArgumentMatcher {
    fn eq(&self, rhs: &Self) -> bool {
        match self.commutativity {
            Commutativity::Lhs => return self.compare(rhs.base()),
            Commutativity::Rhs => return rhs.compare(self.base()),
            Commutativity::Both => {}
        }

        match rhs.commutativity {
            Commutativity::Lhs => return rhs.compare(self.base()),
            Commutativity::Rhs => return self.compare(rhs.base()),
            Commutativity::Both => {}
        }

        self.compare(rhs.base()) && rhs.compare(self.base())
    }
}

impl Display for ArgumentMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description)
    }
}

impl Debug for ArgumentMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description)
    }
}

///
/// An argument passed to a mock: either a concrete value or a matcher.
///
/// The mock's call-handling code inspects which one it got before building the [ArgumentMatcher]
/// for its invocation. Wildcards never need a value of `T`.
///
pub enum Arg<T> {
    /// A concrete argument value.
    Value(T),
    /// A matcher standing in for any value it accepts.
    Matcher(ArgumentMatcher, PhantomData<fn() -> T>),
}

impl<T> Arg<T> {
    /// Wrap a matcher that applies to arguments of type `T`.
    pub fn matcher(matcher: ArgumentMatcher) -> Self {
        Self::Matcher(matcher, PhantomData)
    }

    /// The concrete value, if one was passed.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Matcher(..) => None,
        }
    }

    /// Build the matcher recorded for this argument, comparing values with [PartialEq].
    pub fn into_matcher(self) -> ArgumentMatcher
    where
        T: PartialEq + Debug + Send + Sync + 'static,
    {
        match self {
            Self::Value(value) => ArgumentMatcher::value(value),
            Self::Matcher(matcher, _) => matcher,
        }
    }

    /// Build the matcher recorded for this argument when `T` has no [PartialEq].
    ///
    /// Concrete values are compared by identity, see [ArgumentMatcher::by_reference].
    pub fn into_identity_matcher(self) -> ArgumentMatcher
    where
        T: Send + Sync + 'static,
    {
        match self {
            Self::Value(value) => ArgumentMatcher::by_reference(Arc::new(value)),
            Self::Matcher(matcher, _) => matcher,
        }
    }
}

/// Conversion accepted by mock methods: a plain `T` or an [Arg] of `T`.
pub trait IntoArg<T> {
    /// Convert into the tagged argument.
    fn into_arg(self) -> Arg<T>;
}

impl<T> IntoArg<T> for T {
    fn into_arg(self) -> Arg<T> {
        Arg::Value(self)
    }
}

impl<T> IntoArg<T> for Arg<T> {
    fn into_arg(self) -> Arg<T> {
        self
    }
}

/// Matches every value of type `T`, including `None` when `T` is an [Option].
///
/// ```rust,ignore
/// given(|| bird.can_eat(any())).will_return(true);
/// ```
pub fn any<T: 'static>() -> Arg<T> {
    Arg::matcher(ArgumentMatcher::predicate::<T>("any()", |_| true))
}

/// Matches every `Some` value of an optional argument and rejects `None`.
pub fn not_nil<T: 'static>() -> Arg<Option<T>> {
    Arg::matcher(ArgumentMatcher::predicate::<Option<T>>(
        "not_nil()",
        Option::is_some,
    ))
}

/// Matches values equal to one of `values`.
pub fn any_of<T>(values: impl IntoIterator<Item = T>) -> Arg<T>
where
    T: PartialEq + Debug + Send + Sync + 'static,
{
    let values: Vec<T> = values.into_iter().collect();
    let description = format!("any_of({values:?})");
    Arg::matcher(ArgumentMatcher::predicate::<T>(description, move |other| {
        values.contains(other)
    }))
}

/// Matches values for which `predicate` returns `true`.
///
/// Useful for argument types that do not implement [PartialEq].
pub fn any_where<T: 'static>(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Arg<T> {
    Arg::matcher(ArgumentMatcher::predicate::<T>("any_where(..)", predicate))
}

/// Matches collections holding every one of `values`, in any order.
///
/// ```rust,ignore
/// verify(|| bird.eat_all(any_containing([Fruit::Apple]))).was_called(once());
/// ```
pub fn any_containing<C, T>(values: impl IntoIterator<Item = T>) -> Arg<C>
where
    C: 'static,
    for<'a> &'a C: IntoIterator<Item = &'a T>,
    T: PartialEq + Debug + Send + Sync + 'static,
{
    let values: Vec<T> = values.into_iter().collect();
    let description = format!("any_containing({values:?})");
    Arg::matcher(ArgumentMatcher::predicate::<C>(description, move |collection: &C| {
        values
            .iter()
            .all(|value| collection.into_iter().any(|item| item == value))
    }))
}

/// Matches maps that have an entry for each of `keys`.
pub fn any_with_keys<K, V>(keys: impl IntoIterator<Item = K>) -> Arg<HashMap<K, V>>
where
    K: Eq + Hash + Debug + Send + Sync + 'static,
    V: 'static,
{
    let keys: Vec<K> = keys.into_iter().collect();
    let description = format!("any_with_keys({keys:?})");
    Arg::matcher(ArgumentMatcher::predicate::<HashMap<K, V>>(
        description,
        move |map| keys.iter().all(|key| map.contains_key(key)),
    ))
}

/// Matches maps holding each of `values` under some key.
pub fn any_with_values<K, V>(values: impl IntoIterator<Item = V>) -> Arg<HashMap<K, V>>
where
    K: 'static,
    V: PartialEq + Debug + Send + Sync + 'static,
{
    let values: Vec<V> = values.into_iter().collect();
    let description = format!("any_with_values({values:?})");
    Arg::matcher(ArgumentMatcher::predicate::<HashMap<K, V>>(
        description,
        move |map| {
            values
                .iter()
                .all(|value| map.values().any(|other| other == value))
        },
    ))
}

///
/// Matches collections whose length satisfies `count`, using the call matchers as length
/// predicates.
///
/// ```rust,ignore
/// given(|| bird.eat_all(any_count(at_most(2)))).will_return(());
/// ```
///
pub fn any_count<C>(count: impl Into<CallMatcher>) -> Arg<C>
where
    C: 'static,
    for<'a> &'a C: IntoIterator,
{
    let count = count.into();
    let description = format!(
        "any_count({})",
        count.describe(&Invocation::new("len", vec![]), 0)
    );
    length_matcher(description, count)
}

/// Matches collections with at least one element.
pub fn not_empty<C>() -> Arg<C>
where
    C: 'static,
    for<'a> &'a C: IntoIterator,
{
    length_matcher("not_empty()".to_string(), at_least(1))
}

fn length_matcher<C>(description: String, count: CallMatcher) -> Arg<C>
where
    C: 'static,
    for<'a> &'a C: IntoIterator,
{
    Arg::matcher(ArgumentMatcher::predicate::<C>(description, move |collection: &C| {
        count.matches(collection.into_iter().count())
    }))
}

/// Matches values strictly closer to `value` than `tolerance`.
///
/// Meant for floating point arguments, which rarely compare equal after arithmetic.
pub fn around<T>(value: T, tolerance: T) -> Arg<T>
where
    T: Copy + PartialOrd + Sub<Output = T> + Debug + Send + Sync + 'static,
{
    let description = format!("around({value:?}, tolerance: {tolerance:?})");
    Arg::matcher(ArgumentMatcher::predicate::<T>(description, move |other| {
        let distance = if *other > value {
            *other - value
        } else {
            value - *other
        };
        distance < tolerance
    }))
}
