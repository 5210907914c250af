//! Fiber scheduler for cooperative, instruction-granular round robin.
//!
//! The running fiber is held by the VM (the "active" state); its registry
//! slot holds a placeholder until the next switch writes it back.

use std::collections::VecDeque;
use std::mem;

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;

use crate::error::{VmError, VmResult};
use crate::fiber::{Fiber, FiberId, FiberStatus, MAIN_FIBER};
use crate::heap::Addr;

#[derive(Debug, Default)]
pub struct Scheduler {
    /// Fibers indexed by id (id == index). Ids are never reused.
    fibers: Vec<Fiber>,
    /// Ready fibers other than the running one.
    pub ready_queue: VecDeque<FiberId>,
    current: FiberId,
    /// Fibers waiting for a busy channel to finish its current exchange.
    waiters: HashMap<Addr, VecDeque<FiberId>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create goroutine 0 and make it the active fiber.
    pub fn init_base_routine(&mut self, env: Addr) -> Fiber {
        self.fibers.clear();
        self.ready_queue.clear();
        self.waiters.clear();
        self.fibers.push(Fiber::default());
        self.current = MAIN_FIBER;
        Fiber::new(MAIN_FIBER, env, 0)
    }

    #[inline]
    pub fn current(&self) -> FiberId {
        self.current
    }

    pub fn fiber_count(&self) -> usize {
        self.fibers.len()
    }

    /// Saved state of a fiber that is not currently running.
    pub fn fiber(&self, id: FiberId) -> Option<&Fiber> {
        if id == self.current {
            return None;
        }
        self.fibers.get(id as usize)
    }

    /// Register a new fiber at the tail of the ready queue.
    pub fn spawn(&mut self, env: Addr, rts: Vec<Addr>, pc: usize) -> FiberId {
        let id = self.fibers.len() as FiberId;
        let mut fiber = Fiber::new(id, env, pc);
        fiber.rts = rts;
        self.fibers.push(fiber);
        self.ready_queue.push_back(id);
        tracing::debug!(target: "gos::sched", fiber = id, pc, "spawn");
        id
    }

    /// Save `active` into its registry slot and load fiber `to` in its place.
    pub fn switch_to(&mut self, active: &mut Fiber, to: FiberId) {
        let from = active.id;
        let incoming = mem::take(&mut self.fibers[to as usize]);
        let outgoing = mem::replace(active, incoming);
        self.fibers[from as usize] = outgoing;
        self.current = to;
    }

    /// Remove the active fiber from scheduling until it is woken.
    pub fn park(&mut self, active: &mut Fiber) {
        active.status = FiberStatus::Parked;
        tracing::debug!(target: "gos::sched", fiber = active.id, pc = active.pc, "park");
    }

    pub fn kill(&mut self, active: &mut Fiber) {
        active.status = FiberStatus::Dead;
        self.ready_queue.retain(|&id| id != active.id);
        tracing::debug!(target: "gos::sched", fiber = active.id, "kill");
    }

    /// Make a parked fiber runnable again. A rendezvous partner goes to the
    /// front of the queue so it completes its half of the exchange next.
    pub fn wake(&mut self, id: FiberId, front: bool) {
        debug_assert_ne!(id, self.current, "the running fiber is never parked");
        let Some(fiber) = self.fibers.get_mut(id as usize) else {
            return;
        };
        if fiber.status != FiberStatus::Parked {
            return;
        }
        fiber.status = FiberStatus::Ready;
        if front {
            self.ready_queue.push_front(id);
        } else {
            self.ready_queue.push_back(id);
        }
        tracing::debug!(target: "gos::sched", fiber = id, front, "wake");
    }

    /// Queue `id` behind the exchange currently occupying `chan`.
    pub fn wait_on(&mut self, chan: Addr, id: FiberId) {
        self.waiters.entry(chan).or_default().push_back(id);
    }

    /// Wake the oldest fiber waiting for `chan` to become idle. A channel
    /// with no waiters left has no entry.
    pub fn wake_next_waiter(&mut self, chan: Addr) {
        let Entry::Occupied(mut queue) = self.waiters.entry(chan) else {
            return;
        };
        let next = queue.get_mut().pop_front();
        if queue.get().is_empty() {
            queue.remove();
        }
        if let Some(id) = next {
            self.wake(id, false);
        }
    }

    /// Number of parked fibers, the active one included.
    pub fn parked_count(&self, active: &Fiber) -> usize {
        let saved = self
            .fibers
            .iter()
            .enumerate()
            .filter(|(i, f)| *i != active.id as usize && f.status == FiberStatus::Parked)
            .count();
        saved + (active.status == FiberStatus::Parked) as usize
    }

    /// Round-robin step: requeue the active fiber if it can continue, then
    /// switch to the head of the ready queue.
    pub fn rotate(&mut self, active: &mut Fiber) -> VmResult<()> {
        if active.status == FiberStatus::Ready {
            self.ready_queue.push_back(active.id);
        }
        let next = match self.ready_queue.pop_front() {
            Some(id) => id,
            None => {
                return Err(VmError::Deadlock {
                    parked: self.parked_count(active),
                })
            }
        };
        if next != active.id {
            self.switch_to(active, next);
        }
        Ok(())
    }
}
