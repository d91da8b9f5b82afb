use decoy::*;

use crate::bird::{feed, go_flying, BirdMock, Fruit};

fn flying_bird() -> BirdMock {
    let bird = BirdMock::new();
    given(|| bird.can_fly()).will_return(true);
    go_flying(&bird);
    bird
}

#[test]
fn exact_count_passes() {
    let bird = flying_bird();
    verify(|| bird.fly()).was_called(exactly(2));
    verify(|| bird.can_fly()).was_called(once());
}

#[test]
#[should_panic(
    expected = "Incorrect invocation count for `fly()`: expected n = 0, but it actually matched 2 calls."
)]
fn never_fails_with_the_actual_count() {
    let bird = flying_bird();
    verify(|| bird.fly()).was_called(never());
}

#[test]
#[should_panic(
    expected = "tests/it/verification.rs:34: Incorrect invocation count for `fly()`: expected n = 3"
)]
fn failure_points_at_the_verify_call() {
    let bird = flying_bird();
    verify(|| bird.fly()).was_called(3);
}

#[test]
#[should_panic(expected = "All invocations of `fly`:\n   (1) fly()\n   (2) fly()")]
fn failure_lists_recorded_invocations() {
    let bird = flying_bird();
    verify(|| bird.fly()).was_never_called();
}

#[test]
#[should_panic(expected = "All invocations of `eat`:\n   No invocations recorded")]
fn failure_without_history() {
    let bird = BirdMock::new();
    verify(|| bird.eat(Fruit::Apple)).was_called(once());
}

#[test]
fn never_called_is_exactly_zero() {
    let bird = BirdMock::new();
    verify(|| bird.fly()).was_never_called();
    verify(|| bird.fly()).was_called(exactly(0));
}

#[test]
fn feeding_scenario() {
    let bird = BirdMock::new();
    given(|| bird.can_eat(any())).will_return(true);

    feed(&bird, &[Fruit::Apple, Fruit::Watermelon]);

    verify(|| bird.eat(any())).was_called(at_least(2));
    verify(|| bird.can_eat(any())).was_called(2);
}

#[test]
fn n_plus_one_fails() {
    let log = FailureLog::new();
    let bird = BirdMock::with_config(MockConfig::new("bird").reporter(log.reporter()));
    for _ in 0..4 {
        bird.eat(Fruit::Pear);
    }

    verify(|| bird.eat(Fruit::Pear)).was_called(4);
    assert!(log.is_empty());
    verify(|| bird.eat(Fruit::Pear)).was_called(5);
    assert_eq!(1, log.drain().len());
}

#[test]
fn verification_does_not_record() {
    let bird = BirdMock::new();
    verify(|| bird.fly()).was_never_called();
    verify(|| bird.fly()).was_never_called();

    assert!(bird.mock().mocking_context().all_invocations().is_empty());
}

#[test]
fn failure_log_keeps_running() {
    let log = FailureLog::new();
    let bird = BirdMock::with_config(MockConfig::new("bird").reporter(log.reporter()));
    bird.fly();

    verify(|| bird.fly()).was_called(twice());
    verify(|| bird.eat(Fruit::Apple)).was_called(once());

    let failures = log.drain();
    assert_eq!(2, failures.len());
    assert!(failures[0].to_string().contains("`fly()`"));
    assert!(failures[1].to_string().contains("`eat(Apple)`"));
}

#[test]
#[should_panic(expected = "2 test failures")]
fn finishing_a_log_reports_everything() {
    let log = FailureLog::new();
    let bird = BirdMock::with_config(MockConfig::new("bird").reporter(log.reporter()));

    verify(|| bird.fly()).was_called(once());
    verify(|| bird.can_fly()).was_called(once());

    log.finish();
}
