use decoy::*;

use crate::bird::{go_flying, BirdMock, Fruit};

#[test]
fn calls_across_mocks_in_order() {
    let robin = BirdMock::new();
    let crow = BirdMock::new();
    given(|| robin.can_fly()).will_return(true);

    go_flying(&robin);
    crow.eat(Fruit::Apple);

    in_order(OrderedVerificationOptions::new(), || {
        verify(|| robin.can_fly()).was_called(once());
        verify(|| robin.fly()).was_called(twice());
        verify(|| crow.eat(any())).was_called(once());
    });
}

#[test]
#[should_panic(expected = "Unable to simultaneously satisfy expectations")]
fn out_of_order_fails() {
    let bird = BirdMock::new();
    given(|| bird.can_fly()).will_return(true);

    go_flying(&bird);

    in_order(OrderedVerificationOptions::new(), || {
        verify(|| bird.fly()).was_called(once());
        verify(|| bird.can_fly()).was_called(once());
    });
}

#[test]
#[should_panic(expected = "Got unexpected invocations after `eat(Apple)`")]
fn nothing_after_the_last_verified_call() {
    let bird = BirdMock::new();
    bird.eat(Fruit::Apple);
    bird.fly();

    in_order(OrderedVerificationOptions::new().no_invocations_after(), || {
        verify(|| bird.eat(Fruit::Apple)).was_called(once());
    });
}

#[test]
#[should_panic(expected = "Got unexpected invocations before `fly()`")]
fn nothing_before_the_first_verified_call() {
    let bird = BirdMock::new();
    bird.eat(Fruit::Pear);
    bird.fly();

    in_order(OrderedVerificationOptions::new().no_invocations_before(), || {
        verify(|| bird.fly()).was_called(once());
    });
}

#[test]
fn options_consider_only_involved_mocks() {
    let bird = BirdMock::new();
    let bystander = BirdMock::new();
    bystander.fly();
    bird.eat(Fruit::Watermelon);
    bystander.fly();

    in_order(
        OrderedVerificationOptions::new()
            .no_invocations_before()
            .no_invocations_after(),
        || {
            verify(|| bird.eat(Fruit::Watermelon)).was_called(once());
        },
    );
}

#[test]
#[should_panic(expected = "Unable to simultaneously satisfy expectations")]
fn never_between_two_verified_calls() {
    let bird = BirdMock::new();
    bird.fly();
    bird.eat(Fruit::Pear);
    bird.set_name("robin".to_string());

    in_order(OrderedVerificationOptions::new(), || {
        verify(|| bird.fly()).was_called(once());
        verify(|| bird.eat(any())).was_never_called();
        verify(|| bird.set_name(any())).was_called(once());
    });
}

#[test]
fn extra_calls_break_an_exact_count() {
    let log = FailureLog::new();
    let bird = BirdMock::with_config(MockConfig::new("bird").reporter(log.reporter()));
    given(|| bird.can_fly()).will_return(true);
    go_flying(&bird);
    bird.eat(Fruit::Pear);

    in_order(OrderedVerificationOptions::new(), || {
        verify(|| bird.fly()).was_called(once());
        verify(|| bird.eat(any())).was_called(once());
    });

    let failures = log.drain();
    assert_eq!(1, failures.len());
    let TestFailure::UnsatisfiableExpectations { expectations, all_invocations } = &failures[0].failure else {
        panic!("unexpected failure: {}", failures[0]);
    };
    assert_eq!("fly()", expectations[0].0.to_string());
    assert_eq!(4, all_invocations.len());
    assert!(failures[0].location.file.ends_with("ordered.rs"));
}

#[test]
#[should_panic(expected = "Got unexpected invocations before `eat(Apple)`")]
fn only_consecutive_calls() {
    let bird = BirdMock::new();
    bird.fly();
    bird.eat(Fruit::Pear);
    bird.eat(Fruit::Apple);

    in_order(OrderedVerificationOptions::new().only_consecutive_invocations(), || {
        verify(|| bird.fly()).was_called(once());
        verify(|| bird.eat(Fruit::Apple)).was_called(once());
    });
}
