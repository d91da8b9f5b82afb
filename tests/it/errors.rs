use std::any::Any;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;

use decoy::*;

use crate::bird::{BirdMock, Fruit};

#[test]
#[should_panic(expected = "Missing stubbed implementation for `can_fly()`")]
fn missing_stub() {
    let bird = BirdMock::new();
    bird.can_fly();
}

#[test]
#[should_panic(expected = "All stubs:\n   - can_eat\n   - chirp")]
fn missing_stub_lists_stubbed_selectors() {
    let bird = BirdMock::new();
    given(|| bird.chirp(any())).will_return("tweet".to_string());
    given(|| bird.can_eat(any())).will_return(true);

    bird.can_fly();
}

#[test]
#[should_panic(expected = "All stubs:\n   No concrete stubs")]
fn missing_stub_without_any_stubs() {
    let bird = BirdMock::new();
    bird.perch(None);
}

#[test]
fn missing_stub_still_records() {
    let bird = BirdMock::new();
    let remote = bird.clone();
    let outcome = thread::spawn(move || remote.can_fly()).join();

    assert!(outcome.is_err());
    verify(|| bird.can_fly()).was_called(once());
}

#[test]
#[should_panic(expected = "`given` expects its closure to call exactly one mocked method, but no mock was called.")]
fn given_without_a_mock_call() {
    given(|| 42).will_return(7);
}

#[test]
#[should_panic(expected = "`verify` expects its closure to call exactly one mocked method, but no mock was called.")]
fn verify_without_a_mock_call() {
    verify(|| ()).was_called(once());
}

#[test]
#[should_panic(expected = "returned a value that is not a `bool`")]
fn stub_with_the_wrong_output_type() {
    let bird = BirdMock::new();
    let wrong: Implementation = Arc::new(|_: &Invocation| Some(Box::new(1_u8) as Box<dyn Any>));
    bird.mock()
        .stubbing_context()
        .stub(Invocation::new("can_fly", vec![]), wrong);

    bird.can_fly();
}

#[test]
#[should_panic(expected = "Most recent call (actual / expected):")]
fn zero_matches_show_the_nearest_call() {
    let bird = BirdMock::new();
    bird.eat(Fruit::Apple);

    verify(|| bird.eat(Fruit::Pear)).was_called(once());
}

#[cfg(not(feature = "pretty-print"))]
#[test]
#[should_panic(expected = "  actual: eat(Apple)\nexpected: eat(Pear)")]
fn plain_diff_without_pretty_print() {
    let bird = BirdMock::new();
    bird.eat(Fruit::Apple);

    verify(|| bird.eat(Fruit::Pear)).was_called(once());
}

#[test]
fn failure_carries_structured_details() {
    let log = FailureLog::new();
    let bird = BirdMock::with_config(MockConfig::new("bird").reporter(log.reporter()));
    bird.fly();

    verify(|| bird.fly()).was_called(never());

    let failures = log.drain();
    let TestFailure::IncorrectInvocationCount {
        invocation,
        count,
        all_invocations,
        ..
    } = &failures[0].failure
    else {
        panic!("unexpected failure: {}", failures[0]);
    };
    assert_eq!("fly", invocation.selector_name());
    assert_eq!(1, *count);
    assert_eq!(1, all_invocations.len());
    assert!(failures[0].location.file.ends_with("errors.rs"));
}

#[test]
fn single_threaded_stub_on_its_own_thread() {
    let bird = BirdMock::new();
    let greeting = Rc::new("tweet".to_string());
    given(|| bird.chirp(any())).will_st({
        let greeting = greeting.clone();
        move |_: &Invocation| (*greeting).clone()
    });

    assert_eq!("tweet", bird.chirp(3));
}

#[test]
fn single_threaded_stub_on_another_thread() {
    let bird = BirdMock::new();
    let greeting = Rc::new("tweet".to_string());
    given(|| bird.chirp(any())).will_st(move |_| (*greeting).clone());

    let remote = bird.clone();
    let outcome = thread::spawn(move || remote.chirp(3)).join();

    let message = outcome.unwrap_err();
    let message = message
        .downcast_ref::<String>()
        .map(String::as_str)
        .unwrap_or_default();
    assert!(message.contains("can only be called on the thread that stubbed it"));
}
