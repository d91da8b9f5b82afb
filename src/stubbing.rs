use std::any::Any;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fragile::Fragile;
use tracing::{debug, trace};

use crate::error::{Failure, SourceLocation, TestFailure};
use crate::invocation::Invocation;
use crate::lock::SyncCell;
use crate::mock::Mock;
use crate::scope::{self, Captured, ScopeKind};
use crate::stubbing_context::Implementation;

/// How [sequence] behaves once every value has been returned.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SequenceType {
    /// Keep returning the last value.
    #[default]
    LastValue,
    /// Start over from the first value.
    Looping,
    /// Return `None`, handing over to the next chained implementation.
    Finite,
}

/// When a chained implementation hands over to the next one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transition {
    /// After it has been used this many times.
    After(usize),
    /// The first time it returns `None`. That `None` is not returned.
    OnFirstNone,
}

///
/// Handle returned by [given], binding implementations to the captured invocation.
///
/// Nothing is registered until one of the `will*` methods is called. Each of them returns the
/// handle again; further calls queue more implementations behind the first one:
///
/// ```rust,ignore
/// given(|| bird.can_fly())
///     .will_return(true)
///     .will_return(false);
/// ```
///
/// Every implementation but the last is used until its [Transition] fires. The last one is used
/// for good.
///
pub struct Stubbing<R> {
    mock: Mock,
    invocation: Invocation,
    location: SourceLocation,
    chain: Option<Arc<Chain>>,
    _output: PhantomData<fn() -> R>,
}

///
/// Start stubbing the mock call made inside `expr`.
///
/// The first mock method called by the closure is captured instead of executed. Later calls
/// whose arguments match the captured ones (concrete values structurally, matchers by predicate)
/// run the bound implementation. Stubs registered later take precedence.
///
/// ```rust,ignore
/// given(|| bird.can_eat(any())).will_return(true);
/// given(|| bird.can_eat(Fruit::Pear)).will_return(false);
/// ```
///
/// The closure is left by unwinding once the mock call is captured, so this needs
/// `panic = "unwind"`. A `std::sync::Mutex` guard held across the mock call inside the closure
/// gets poisoned on the way out.
///
#[track_caller]
#[must_use = "bind an implementation with one of the `will` methods"]
pub fn given<R: 'static>(expr: impl FnOnce() -> R) -> Stubbing<R> {
    let location = SourceLocation::caller();

    match scope::evaluate(ScopeKind::Given, expr) {
        Some(Captured { mock, invocation }) => Stubbing {
            mock,
            invocation,
            location,
            chain: None,
            _output: PhantomData,
        },
        None => panic!(
            "{}",
            Failure::new(
                TestFailure::NoInvocationInScope {
                    scope: ScopeKind::Given.name()
                },
                location
            )
        ),
    }
}

impl<R: 'static> Stubbing<R> {
    /// Return clones of `value`.
    pub fn will_return(self, value: R) -> Self
    where
        R: Clone + Send + Sync,
    {
        self.will_provide(move |_: &Invocation| Some(value.clone()), Transition::After(1))
    }

    /// Return whatever `producer` returns on each call.
    pub fn will(self, producer: impl Fn() -> R + Send + Sync + 'static) -> Self {
        self.will_provide(move |_: &Invocation| Some(producer()), Transition::After(1))
    }

    /// Compute the return value from the actual invocation.
    ///
    /// ```rust,ignore
    /// given(|| bird.set_name(any())).will_answer(|invocation| {
    ///     invocation.argument::<String>(0).is_some()
    /// });
    /// ```
    pub fn will_answer(self, answer: impl Fn(&Invocation) -> R + Send + Sync + 'static) -> Self {
        self.will_provide(
            move |invocation: &Invocation| Some(answer(invocation)),
            Transition::After(1),
        )
    }

    ///
    /// Like [Stubbing::will_answer], for closures that are not `Send` or `Sync`.
    ///
    /// The closure stays on the thread that registered it. Calling the stubbed method from
    /// another thread panics, and so does dropping the mock there.
    ///
    pub fn will_st(self, answer: impl Fn(&Invocation) -> R + 'static) -> Self {
        let answer = Fragile::new(answer);
        self.link(
            Arc::new(move |invocation: &Invocation| match answer.try_get() {
                Ok(answer) => Some(Box::new(answer(invocation)) as Box<dyn Any>),
                Err(_) => panic!(
                    "`{invocation}` was stubbed with `will_st` and can only be called on the thread that stubbed it"
                ),
            }),
            Transition::After(1),
        )
    }

    /// Return `values` one per call, continuing as `sequence_type` says once they run out.
    ///
    /// A finite sequence hands over to the next implementation when it is exhausted, or to older
    /// stubs and the fallback policy when it is the last one. An empty sequence never matches.
    pub fn will_return_sequence(self, values: Vec<R>, sequence_type: SequenceType) -> Self
    where
        R: Clone + Send + Sync,
    {
        self.will_provide(sequence(values, sequence_type), Transition::OnFirstNone)
    }

    ///
    /// Queue a provider that may decline with `None`, handing over per `transition`.
    ///
    /// ```rust,ignore
    /// given(|| bird.can_fly())
    ///     .will_provide(sequence(vec![true, false, true], SequenceType::Looping), Transition::After(3))
    ///     .will_return(false);
    /// ```
    ///
    pub fn will_provide(
        self,
        provider: impl Fn(&Invocation) -> Option<R> + Send + Sync + 'static,
        transition: Transition,
    ) -> Self {
        self.link(
            Arc::new(move |invocation: &Invocation| {
                provider(invocation).map(|value| Box::new(value) as Box<dyn Any>)
            }),
            transition,
        )
    }

    /// The invocation the implementation is bound to.
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    fn link(mut self, implementation: Implementation, transition: Transition) -> Self {
        match &self.chain {
            Some(chain) => {
                let position = chain.push(implementation, transition);
                debug!(
                    mock = self.mock.name(),
                    template = %self.invocation,
                    position,
                    ?transition,
                    "chained stub"
                );
            }
            None => {
                debug!(
                    mock = self.mock.name(),
                    template = %self.invocation,
                    location = %self.location,
                    "registered stub"
                );
                let chain = Arc::new(Chain::new(implementation, transition));
                self.mock.stubbing_context().stub(
                    self.invocation.clone(),
                    Arc::new({
                        let chain = chain.clone();
                        move |invocation: &Invocation| chain.provide(invocation)
                    }),
                );
                self.chain = Some(chain);
            }
        }
        self
    }
}

/// Values handed out one per call, for [Stubbing::will_provide].
pub fn sequence<R>(
    values: Vec<R>,
    sequence_type: SequenceType,
) -> impl Fn(&Invocation) -> Option<R> + Send + Sync + 'static
where
    R: Clone + Send + Sync + 'static,
{
    let ticket = AtomicUsize::new(0);
    move |_: &Invocation| {
        let last = values.len().checked_sub(1)?;
        let index = ticket.fetch_add(1, Ordering::SeqCst);
        let value = match sequence_type {
            SequenceType::LastValue => values.get(index.min(last)),
            SequenceType::Looping => values.get(index % values.len()),
            SequenceType::Finite => values.get(index),
        }?;
        Some(value.clone())
    }
}

/// Implementations registered through one [Stubbing] handle, used one after another.
struct Chain {
    state: SyncCell<ChainState>,
}

struct ChainState {
    links: Vec<(Implementation, Transition)>,
    current: usize,
    provided: usize,
}

impl Chain {
    fn new(implementation: Implementation, transition: Transition) -> Self {
        Self {
            state: SyncCell::new(ChainState {
                links: vec![(implementation, transition)],
                current: 0,
                provided: 0,
            }),
        }
    }

    fn push(&self, implementation: Implementation, transition: Transition) -> usize {
        self.state.locked(|state| {
            state.links.push((implementation, transition));
            state.links.len() - 1
        })
    }

    /// The bodies run without the state lock held, so they may call back into the mock.
    fn provide(&self, invocation: &Invocation) -> Option<Box<dyn Any>> {
        loop {
            let (current, (implementation, transition), is_last) = self.state.locked(|state| {
                (
                    state.current,
                    state.links[state.current].clone(),
                    state.current + 1 == state.links.len(),
                )
            });

            let value = implementation(invocation);
            if is_last {
                return value;
            }

            let skip = self.state.locked(|state| {
                // Another thread moved the chain on while this body ran.
                if state.current != current {
                    return false;
                }
                state.provided += 1;
                let (advance, skip) = match transition {
                    Transition::After(uses) => (state.provided >= uses, state.provided > uses),
                    Transition::OnFirstNone => (value.is_none(), value.is_none()),
                };
                if advance {
                    state.current += 1;
                    state.provided = 0;
                    trace!(%invocation, link = state.current, "stub chain advanced");
                }
                skip
            });
            if !skip {
                return value;
            }
        }
    }
}
