// File: src/concurrency.rs
//
// Promise and Channel, ported from the reference implementation's
// stdlib/async.go: a condvar-backed single-assignment cell and a
// rendezvous channel wrapped in a ready/close-requested/closed status
// machine. Both ends are drop-safe — abandoning either a channel's
// reader or writer unblocks the other side instead of deadlocking it.

use crate::errors::{AleError, AleResult};
use crate::value::Value;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Condvar, Mutex};

// ---------------------------------------------------------------- Promise

struct PromiseState {
    mutex: Mutex<Option<Value>>,
    condvar: Condvar,
}

/// A single-assignment cell: `deliver` sets the value exactly once and
/// wakes every waiter; `resolve` blocks until delivered.
pub struct Promise(Arc<PromiseState>);

impl Promise {
    pub fn new() -> Self {
        Promise(Arc::new(PromiseState { mutex: Mutex::new(None), condvar: Condvar::new() }))
    }

    pub fn resolve(&self) -> AleResult<Value> {
        let mut guard = self.0.mutex.lock().unwrap();
        while guard.is_none() {
            guard = self.0.condvar.wait(guard).unwrap();
        }
        Ok(guard.clone().unwrap())
    }

    /// Delivers a value. A second delivery of the *same* value (by
    /// `Equal`) is idempotent; a second delivery of a different value
    /// fails with a `PromiseError`.
    pub fn deliver(&self, value: Value) -> AleResult<Value> {
        let mut guard = self.0.mutex.lock().unwrap();
        match &*guard {
            None => {
                *guard = Some(value.clone());
                self.0.condvar.notify_all();
                Ok(value)
            }
            Some(existing) if existing.equal(&value) => Ok(existing.clone()),
            Some(_) => Err(AleError::promise("can't deliver a promise twice")),
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.0.mutex.lock().unwrap().is_some()
    }
}

impl Default for Promise {
    fn default() -> Self {
        Promise::new()
    }
}

// ---------------------------------------------------------------- Channel

const READY: u8 = 0;
const CLOSE_REQUESTED: u8 = 1;
const CLOSED: u8 = 2;

struct ChannelResult {
    value: Value,
    error: Option<AleError>,
}

struct ChannelShared {
    status: AtomicU8,
}

impl ChannelShared {
    fn close(&self, tx: &Mutex<Option<SyncSender<ChannelResult>>>) {
        if self.status.swap(CLOSED, Ordering::SeqCst) != CLOSED {
            tx.lock().unwrap().take();
        }
    }
}

struct EmitterInner {
    shared: Arc<ChannelShared>,
    tx: Mutex<Option<SyncSender<ChannelResult>>>,
}

/// The writer end of a channel: `write`, `error`, and `close`.
#[derive(Clone)]
pub struct Emitter(Arc<EmitterInner>);

impl Emitter {
    pub fn write(&self, v: Value) {
        let status = self.0.shared.status.load(Ordering::SeqCst);
        if status == READY {
            let tx = self.0.tx.lock().unwrap();
            if let Some(tx) = tx.as_ref() {
                let _ = tx.send(ChannelResult { value: v, error: None });
            }
        }
        if self.0.shared.status.load(Ordering::SeqCst) == CLOSE_REQUESTED {
            self.close();
        }
    }

    pub fn error(&self, err: AleError) {
        if self.0.shared.status.load(Ordering::SeqCst) == READY {
            let tx = self.0.tx.lock().unwrap();
            if let Some(tx) = tx.as_ref() {
                let _ = tx.send(ChannelResult { value: Value::Nil, error: Some(err) });
            }
        }
        self.close();
    }

    pub fn close(&self) {
        self.0.shared.close(&self.0.tx);
    }
}

impl Drop for EmitterInner {
    fn drop(&mut self) {
        if self.shared.status.load(Ordering::SeqCst) != CLOSED {
            self.shared.close(&self.tx);
        }
    }
}

/// The receiving half shared by every node of one channel's lazy
/// sequence: the `mpsc::Receiver` is read from in position order, one
/// `recv()` per node, no matter how many `ChannelSequence` handles
/// exist for that position.
struct RxSlot {
    shared: Arc<ChannelShared>,
    rx: Mutex<Receiver<ChannelResult>>,
}

impl Drop for RxSlot {
    /// If the reader is abandoned mid-channel, request close and drain
    /// whatever is in flight so a blocked writer doesn't wait forever.
    fn drop(&mut self) {
        if self.shared.status.swap(CLOSE_REQUESTED, Ordering::SeqCst) == READY {
            let _ = self.rx.lock().unwrap().try_recv();
        }
    }
}

enum ResolveState {
    Pending,
    Resolved { is_seq: bool, value: Value, rest: Option<ChannelSequence> },
}

struct SeqNode {
    rx_slot: Arc<RxSlot>,
    state: Mutex<ResolveState>,
}

/// The lazy, single-shot-memoized read end of a channel. Each position
/// resolves at most once; `first`/`rest`/`split` all force it.
#[derive(Clone)]
pub struct ChannelSequence(Arc<SeqNode>);

impl ChannelSequence {
    fn from_slot(rx_slot: Arc<RxSlot>) -> Self {
        ChannelSequence(Arc::new(SeqNode { rx_slot, state: Mutex::new(ResolveState::Pending) }))
    }

    fn resolve(&self) -> AleResult<(bool, Value, Option<ChannelSequence>)> {
        let mut guard = self.0.state.lock().unwrap();
        if matches!(&*guard, ResolveState::Pending) {
            let received = self.0.rx_slot.rx.lock().unwrap().recv();
            *guard = match received {
                Ok(r) => {
                    if let Some(err) = r.error {
                        return Err(err);
                    }
                    ResolveState::Resolved {
                        is_seq: true,
                        value: r.value,
                        rest: Some(ChannelSequence::from_slot(self.0.rx_slot.clone())),
                    }
                }
                Err(_) => ResolveState::Resolved { is_seq: false, value: Value::Nil, rest: None },
            };
        }
        match &*guard {
            ResolveState::Resolved { is_seq, value, rest } => {
                Ok((*is_seq, value.clone(), rest.clone()))
            }
            ResolveState::Pending => unreachable!("resolved above"),
        }
    }

    pub fn split(&self) -> AleResult<(Value, ChannelSequence, bool)> {
        let (is_seq, value, rest) = self.resolve()?;
        if is_seq {
            Ok((value, rest.expect("a non-terminal node always has a rest"), true))
        } else {
            Ok((Value::Nil, self.clone(), false))
        }
    }

    pub fn first(&self) -> AleResult<Value> {
        Ok(self.split()?.0)
    }

    pub fn rest(&self) -> AleResult<ChannelSequence> {
        Ok(self.split()?.1)
    }
}

/// A value-model handle onto either end of a channel. Represented as a
/// single `Value::Channel` tag per the data model, carrying whichever
/// end this particular handle is.
#[derive(Clone)]
pub enum ChannelEnd {
    Emitter(Emitter),
    Sequence(ChannelSequence),
}

/// Produces an `(emitter, sequence)` pair, matching `NewChannel` in the
/// reference implementation.
pub fn new_channel() -> (Emitter, ChannelSequence) {
    let shared = Arc::new(ChannelShared { status: AtomicU8::new(READY) });
    let (tx, rx) = sync_channel(0);
    let emitter = Emitter(Arc::new(EmitterInner { shared: shared.clone(), tx: Mutex::new(Some(tx)) }));
    let sequence = ChannelSequence::from_slot(Arc::new(RxSlot { shared, rx: Mutex::new(rx) }));
    (emitter, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn promise_delivers_once_and_rejects_a_different_value() {
        let p = Promise::new();
        assert_eq!(p.deliver(Value::int(99)).unwrap(), Value::int(99));
        assert_eq!(p.deliver(Value::int(99)).unwrap(), Value::int(99));
        assert!(p.deliver(Value::int(100)).is_err());
        assert_eq!(p.resolve().unwrap(), Value::int(99));
    }

    #[test]
    fn promise_resolve_blocks_until_delivered() {
        let p = Arc::new(Promise::new());
        let writer = p.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.deliver(Value::int(7)).unwrap();
        });
        assert_eq!(p.resolve().unwrap(), Value::int(7));
        handle.join().unwrap();
    }

    #[test]
    fn channel_write_is_observed_by_the_sequence() {
        let (emitter, seq) = new_channel();
        let handle = thread::spawn(move || {
            emitter.write(Value::int(1));
        });
        assert_eq!(seq.first().unwrap(), Value::int(1));
        handle.join().unwrap();
    }
}
