//! A cyclic barrier: `n` parties must all call `wait` before any of them
//! proceeds, after which the barrier resets for reuse (spec §4.7).
//!
//! Grounded the same way as [`super::waitgroup::WaitGroup`]: a
//! spinlock-guarded generation counter plus a wait queue, modeled on
//! `std::sync::Barrier`'s generation-count reset but blocking tasks
//! instead of OS threads.

use super::spinlock::Spinlock;
use super::WaitQueue;

struct State {
    n: usize,
    arrived: usize,
    generation: u64,
}

pub struct Barrier {
    state: Spinlock<State>,
    waiters: WaitQueue,
}

/// Returned by `wait` for exactly one caller per generation, mirroring
/// `std::sync::Barrier`'s "leader" signal.
pub struct BarrierWaitResult(bool);

impl BarrierWaitResult {
    pub fn is_leader(&self) -> bool {
        self.0
    }
}

impl Barrier {
    pub fn new(n: usize) -> Self {
        Self {
            state: Spinlock::new(State { n, arrived: 0, generation: 0 }),
            waiters: WaitQueue::new(),
        }
    }

    pub fn wait(&self) -> BarrierWaitResult {
        let mut state = self.state.lock();
        let my_generation = state.generation;
        state.arrived += 1;
        if state.arrived == state.n {
            state.arrived = 0;
            state.generation += 1;
            drop(state);
            self.waiters.wake_all();
            return BarrierWaitResult(true);
        }
        loop {
            let current_generation = state.generation;
            if current_generation != my_generation {
                return BarrierWaitResult(false);
            }
            self.waiters.wait_and_release(|| drop(state));
            state = self.state.lock();
        }
    }
}
