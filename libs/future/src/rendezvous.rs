//! Wait-free two-party handshake. Grounded on `magic::Rendezvous`
//! (`examples/original_source/src/magic/concurrency/rendezvous.h`): two
//! sides race to arrive in either order; whichever arrives second is told
//! the other is already there, via a single `fetch_or` each.

use std::sync::atomic::{AtomicI64, Ordering};

const INITIAL: i64 = 0;
const CONSUMER: i64 = 1;
const PRODUCER: i64 = 2;

/// Two parties, producer and consumer, each arrive exactly once. The party
/// that arrives second gets `true` back from its call and should act on
/// the rendezvous; the party that arrives first gets `false` and does
/// nothing further.
pub struct Rendezvous {
    state: AtomicI64,
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl Rendezvous {
    pub const fn new() -> Self {
        Self { state: AtomicI64::new(INITIAL) }
    }

    /// Returns `true` if the consumer had already arrived.
    pub fn produce(&self) -> bool {
        match self.state.fetch_or(PRODUCER, Ordering::AcqRel) {
            INITIAL => false,
            CONSUMER => true,
            _ => unreachable!("rendezvous produced twice"),
        }
    }

    /// Returns `true` if the producer had already arrived.
    pub fn consume(&self) -> bool {
        match self.state.fetch_or(CONSUMER, Ordering::AcqRel) {
            INITIAL => false,
            PRODUCER => true,
            _ => unreachable!("rendezvous consumed twice"),
        }
    }

    pub fn produced(&self) -> bool {
        self.state.load(Ordering::Acquire) == PRODUCER
    }

    /// True once the producer has arrived, whether or not the consumer
    /// has too.
    pub fn has_produced(&self) -> bool {
        self.state.load(Ordering::Acquire) & PRODUCER != 0
    }

    /// True once the consumer has arrived, whether or not the producer
    /// has too.
    pub fn has_consumed(&self) -> bool {
        self.state.load(Ordering::Acquire) & CONSUMER != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_arrival_does_not_see_a_rendezvous() {
        let r = Rendezvous::new();
        assert!(!r.produce());
    }

    #[test]
    fn second_arrival_sees_the_rendezvous() {
        let r = Rendezvous::new();
        assert!(!r.produce());
        assert!(r.consume());
    }

    #[test]
    fn order_reversed_still_rendezvouses() {
        let r = Rendezvous::new();
        assert!(!r.consume());
        assert!(r.produce());
    }

    #[test]
    fn produced_reflects_a_lone_producer_arrival() {
        let r = Rendezvous::new();
        assert!(!r.produced());
        r.produce();
        assert!(r.produced());
    }
}
