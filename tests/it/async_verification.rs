use std::thread;
use std::time::Duration;

use decoy::*;

use crate::bird::{feed, BirdMock, Fruit};
use crate::AsyncTest;

const PATIENCE: Duration = Duration::from_secs(5);

#[test]
fn invocations_from_another_thread_complete_the_group() {
    let bird = BirdMock::new();
    let handle = eventually("bird flies twice", || {
        verify(|| bird.fly()).was_called(twice());
    });
    assert!(!handle.is_fulfilled());

    let remote = bird.clone();
    thread::spawn(move || {
        remote.fly();
        remote.fly();
    })
    .join()
    .unwrap();

    handle.wait(PATIENCE).unwrap();
}

#[test]
fn two_expectations_in_either_order() {
    for reversed in [false, true] {
        let bird = BirdMock::new();
        given(|| bird.can_eat(any())).will_return(true);

        let handle = begin_async_verification("bird eats").run(|| {
            verify(|| bird.eat(Fruit::Apple)).was_called(once());
            verify(|| bird.eat(Fruit::Pear)).was_called(once());
        });
        assert_eq!(2, handle.required_count());

        let remote = bird.clone();
        let fruits = if reversed {
            [Fruit::Pear, Fruit::Apple]
        } else {
            [Fruit::Apple, Fruit::Pear]
        };
        let worker = thread::spawn(move || feed(&remote, &fruits));

        handle.wait(PATIENCE).unwrap();
        worker.join().unwrap();
    }
}

#[test]
fn one_of_two_leaves_the_group_incomplete() {
    let bird = BirdMock::new();
    let handle = eventually("bird eats", || {
        verify(|| bird.eat(Fruit::Apple)).was_called(once());
        verify(|| bird.eat(Fruit::Pear)).was_called(once());
    });

    bird.eat(Fruit::Apple);
    assert_eq!(1, handle.fulfilled_count());
    assert!(!handle.is_fulfilled());

    let failures = handle.wait(Duration::from_millis(20)).unwrap_err();
    assert_eq!(1, failures.len());
    assert!(matches!(
        &failures[0].failure,
        TestFailure::UnsatisfiedAsyncExpectation { count: 0, .. }
    ));

    bird.eat(Fruit::Pear);
    assert!(handle.is_fulfilled());
}

#[test]
fn waiting_thread_is_woken_by_the_last_invocation() {
    let bird = BirdMock::new();
    let handle = eventually("lands", || {
        verify(|| bird.fly()).was_called(at_least(3));
    });

    let remote = bird.clone();
    let worker = thread::spawn(move || {
        for _ in 0..3 {
            thread::sleep(Duration::from_millis(5));
            remote.fly();
        }
    });

    handle.wait(PATIENCE).unwrap();
    assert_eq!(1, handle.fulfilled_count());
    worker.join().unwrap();
}

#[test]
fn invocations_before_the_group_count() {
    let bird = BirdMock::new();
    bird.fly();

    let handle = eventually("already flew", || {
        verify(|| bird.fly()).was_called(once());
    });

    assert!(handle.is_fulfilled());
}

#[test]
fn empty_group_is_fulfilled() {
    let handle = eventually("nothing", || {});
    assert_eq!(0, handle.required_count());
    handle.wait(Duration::ZERO).unwrap();
}

#[test]
#[should_panic(expected = "bird flies: Async expectation for `fly()` was never satisfied: expected n = 1")]
fn dropping_an_unfulfilled_handle_fails() {
    let bird = BirdMock::new();
    let _handle = eventually("bird flies", || {
        verify(|| bird.fly()).was_called(once());
    });
}

#[test]
#[should_panic(expected = "was never satisfied")]
fn wait_and_report_uses_the_reporter() {
    let bird = BirdMock::new();
    let handle = eventually("bird flies", || {
        verify(|| bird.fly()).was_called(once());
    });
    handle.wait_and_report(Duration::from_millis(10));
}

#[test]
fn observers_are_detached_when_the_handle_drops() {
    let log = FailureLog::new();
    let bird = BirdMock::with_config(MockConfig::new("bird").reporter(log.reporter()));
    let handle = eventually("bird flies", || {
        verify(|| bird.fly()).was_called(once());
    });
    assert_eq!(1, bird.mock().mocking_context().observer_count("fly"));

    drop(handle);

    assert_eq!(0, bird.mock().mocking_context().observer_count("fly"));
    assert_eq!(1, log.drain().len());
}

#[test]
fn verifications_outside_the_block_stay_synchronous() {
    let bird = BirdMock::new();
    let handle = eventually("flies", || {
        verify(|| bird.fly()).was_called(once());
    });
    bird.fly();
    handle.wait(PATIENCE).unwrap();

    verify(|| bird.fly()).was_called(once());
}

#[test]
fn awaiting_the_handle() {
    async {
        let bird = BirdMock::new();
        let handle = eventually("chirps", || {
            verify(|| bird.chirp(any())).was_called(twice());
        });
        given(|| bird.chirp(any())).will_return("tweet".to_string());

        let remote = bird.clone();
        let worker = tokio_1::spawn(async move {
            tokio_1::time::sleep(Duration::from_millis(5)).await;
            remote.chirp(1);
            remote.chirp(2);
        });

        handle.await;
        worker.await.unwrap();
    }
    .test()
}

#[cfg(feature = "tokio")]
#[test]
fn waiting_asynchronously_with_a_timeout() {
    async {
        let bird = BirdMock::new();
        let handle = eventually("flies", || {
            verify(|| bird.fly()).was_called(once());
        });

        let failures = handle
            .wait_async(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(1, failures.len());
    }
    .test()
}

#[test]
fn ordered_block_inside_eventually_waits_for_the_order() {
    let bird = BirdMock::new();
    given(|| bird.can_fly()).will_return(true);

    let handle = eventually("checks, then flies", || {
        in_order(OrderedVerificationOptions::new(), || {
            verify(|| bird.can_fly()).was_called(once());
            verify(|| bird.fly()).was_called(twice());
        });
    });
    assert!(!handle.is_fulfilled());

    let remote = bird.clone();
    let worker = thread::spawn(move || crate::bird::go_flying(&remote));

    handle.wait(PATIENCE).unwrap();
    worker.join().unwrap();
}
