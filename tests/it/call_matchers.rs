use decoy::*;

use crate::bird::BirdMock;

fn bird_that_flew(times: usize) -> BirdMock {
    let bird = BirdMock::new();
    for _ in 0..times {
        bird.fly();
    }
    bird
}

#[test]
fn bounds() {
    let bird = bird_that_flew(3);

    verify(|| bird.fly()).was_called(at_least(3));
    verify(|| bird.fly()).was_called(at_most(3));
    verify(|| bird.fly()).was_called(between(2..=4));
}

#[test]
fn combinators() {
    let bird = bird_that_flew(2);

    verify(|| bird.fly()).was_called(once().or(twice()));
    verify(|| bird.fly()).was_called(at_least(1).and(at_most(2)));
    verify(|| bird.fly()).was_called(once().xor(at_least(2)));
    verify(|| bird.fly()).was_called(not(once()));
    verify(|| bird.fly()).was_called(!never());
}

#[test]
#[should_panic(expected = "expected (n ≥ 3) && (n ≤ 5), but it actually matched 2 calls.")]
fn between_describes_both_bounds() {
    let bird = bird_that_flew(2);
    verify(|| bird.fly()).was_called(between(3..=5));
}

#[test]
#[should_panic(expected = "expected n ≠ 2, but it actually matched 2 calls.")]
fn negation_flips_the_operator() {
    let bird = bird_that_flew(2);
    verify(|| bird.fly()).was_called(not(exactly(2)));
}

#[test]
#[should_panic(expected = "expected (n < 1) || (n > 3), but it actually matched 1 call.")]
fn negated_conjunction_reads_as_disjunction() {
    let bird = bird_that_flew(1);
    verify(|| bird.fly()).was_called(not(between(1..=3)));
}

#[test]
fn custom_matcher() {
    let even = CallMatcher::new(
        |count| count % 2 == 0,
        |_, _, negated| {
            if negated {
                "n is odd".to_string()
            } else {
                "n is even".to_string()
            }
        },
    );
    let bird = bird_that_flew(4);

    verify(|| bird.fly()).was_called(even.clone());
    verify(|| bird.fly()).was_called(even.and(at_most(4)));
}
