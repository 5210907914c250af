//! Unbuffered channel rendezvous: SEND and RECV.
//!
//! A channel carries one exchange at a time. The first party to arrive
//! records itself as the channel's dormant routine and parks; the partner
//! completes its own half immediately and wakes the dormant party at the
//! front of the ready queue. The dormant party re-executes its instruction
//! (pc is rewound on every park), sees the exchange finished, resets the
//! channel and hands it to the next fiber waiting for it.
//!
//! Flag states, as (read, written):
//! - (0, 0): idle
//! - (1, 0): a reader is parked
//! - (0, 1): a writer is parked with its value stored
//! - (1, 1): matched, the dormant party has not yet resumed

use crate::error::{VmError, VmResult};
use crate::fiber::Fiber;
use crate::heap::{Addr, Heap, Tag, UNDEFINED};
use crate::scheduler::Scheduler;

use super::ExecResult;

fn expect_channel(heap: &Heap, addr: Addr, op: &'static str) -> VmResult<()> {
    let found = heap.tag(addr)?;
    if found != Tag::Channel {
        return Err(VmError::TypeMismatch { op, found });
    }
    Ok(())
}

/// Finish an exchange from the dormant side.
fn complete(heap: &mut Heap, scheduler: &mut Scheduler, chan: Addr) {
    heap.reset_channel(chan);
    scheduler.wake_next_waiter(chan);
}

fn park(fiber: &mut Fiber) -> ExecResult {
    fiber.pc -= 1;
    ExecResult::Block
}

pub fn exec_create_chan(fiber: &mut Fiber, heap: &mut Heap) -> VmResult<()> {
    let chan = heap.alloc_channel()?;
    fiber.push(chan);
    Ok(())
}

/// OS: `[.., chan, value]` on first execution, `[.., chan]` when a parked
/// writer resumes (its value already lives on the channel).
pub fn exec_send(fiber: &mut Fiber, heap: &mut Heap, scheduler: &mut Scheduler) -> VmResult<ExecResult> {
    let me = fiber.id;

    // A fiber is dormant on a channel only while parked inside this SEND, so
    // a channel on top naming us is our own resumed exchange.
    let top = fiber.peek(0)?;
    if heap.is(top, Tag::Channel) && heap.channel_dormant(top) == Some(me) {
        if !heap.channel_is_read(top) {
            return Ok(park(fiber));
        }
        fiber.pop()?;
        fiber.push(UNDEFINED);
        complete(heap, scheduler, top);
        tracing::trace!(target: "gos::vm", fiber = me, "send completed");
        return Ok(ExecResult::Continue);
    }

    let chan = fiber.peek(1)?;
    expect_channel(heap, chan, "send")?;
    let read = heap.channel_is_read(chan);
    let written = heap.channel_is_written(chan);
    let dormant = heap.channel_dormant(chan);

    if read && !written {
        // reader already parked: hand over the value and let it finish
        let value = fiber.pop()?;
        heap.write_channel(chan, value);
        fiber.pop()?;
        fiber.push(UNDEFINED);
        if let Some(reader) = dormant {
            scheduler.wake(reader, true);
        }
        Ok(ExecResult::Continue)
    } else if !read && !written && dormant.is_none() {
        let value = fiber.pop()?;
        heap.write_channel(chan, value);
        heap.set_channel_dormant(chan, Some(me));
        Ok(park(fiber))
    } else {
        scheduler.wait_on(chan, me);
        Ok(park(fiber))
    }
}

/// OS: `[.., chan]` on every execution.
pub fn exec_recv(fiber: &mut Fiber, heap: &mut Heap, scheduler: &mut Scheduler) -> VmResult<ExecResult> {
    let me = fiber.id;
    let chan = fiber.peek(0)?;
    expect_channel(heap, chan, "recv")?;
    let read = heap.channel_is_read(chan);
    let written = heap.channel_is_written(chan);
    let dormant = heap.channel_dormant(chan);

    if dormant == Some(me) {
        if !written {
            return Ok(park(fiber));
        }
        let value = heap.channel_value(chan);
        fiber.pop()?;
        fiber.push(value);
        complete(heap, scheduler, chan);
        tracing::trace!(target: "gos::vm", fiber = me, "recv completed");
        return Ok(ExecResult::Continue);
    }

    if written && !read {
        // writer already parked: take the value and let it finish
        heap.set_channel_read(chan);
        let value = heap.channel_value(chan);
        fiber.pop()?;
        fiber.push(value);
        if let Some(writer) = dormant {
            scheduler.wake(writer, true);
        }
        Ok(ExecResult::Continue)
    } else if !read && !written && dormant.is_none() {
        heap.set_channel_read(chan);
        heap.set_channel_dormant(chan, Some(me));
        Ok(park(fiber))
    } else {
        scheduler.wait_on(chan, me);
        Ok(park(fiber))
    }
}
