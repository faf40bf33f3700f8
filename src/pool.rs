//! Reusable hash engines and concatenation buffers.
//!
//! Both pools lend on demand and never block: an empty pool constructs a
//! new instance. A lease goes back to its pool when it is dropped or
//! explicitly [`released`](EngineLease::release), whichever comes first,
//! so every exit path (including `?` propagation) returns capacity.

use std::fmt;
use std::hash::Hasher;
use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

use crate::hash::{Algorithm, HashKind, BUFFER_LEN};

/// Engine and buffer pools shared by every worker of a tree.
#[derive(Debug)]
pub struct Pools {
    /// Reset, ready-to-write engines.
    pub engines: EnginePool,
    /// Two-digest concatenation buffers.
    pub buffers: BufferPool,
}

impl Pools {
    /// Creates empty pools for `kind`.
    pub fn new(kind: HashKind) -> Pools {
        Pools {
            engines: EnginePool::new(kind),
            buffers: BufferPool::new(),
        }
    }
}

/// Pool of fungible hash engines of a single algorithm.
pub struct EnginePool {
    kind: HashKind,
    idle: Mutex<Vec<Box<dyn Algorithm>>>,
}

impl EnginePool {
    /// Creates an empty pool.
    pub fn new(kind: HashKind) -> EnginePool {
        EnginePool {
            kind,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Lends an engine, constructing one when none is parked.
    pub fn lease(&self) -> EngineLease<'_> {
        let engine = self.idle.lock().pop().unwrap_or_else(|| self.kind.engine());
        EngineLease {
            engine: Some(engine),
            pool: Some(self),
        }
    }

    /// Number of parked engines.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    fn park(&self, mut engine: Box<dyn Algorithm>) {
        engine.reset();
        self.idle.lock().push(engine);
    }
}

impl fmt::Debug for EnginePool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EnginePool")
            .field("kind", &self.kind)
            .field("idle", &self.idle())
            .finish()
    }
}

/// Engine on loan. Dereferences to the engine itself.
pub struct EngineLease<'p> {
    // Only emptied by `give_back`, which runs at most once per lease.
    engine: Option<Box<dyn Algorithm>>,
    pool: Option<&'p EnginePool>,
}

impl<'p> EngineLease<'p> {
    /// Wraps an engine that belongs to no pool; releasing it drops it.
    pub fn detached(engine: Box<dyn Algorithm>) -> EngineLease<'p> {
        EngineLease {
            engine: Some(engine),
            pool: None,
        }
    }

    /// Returns the engine to its pool now instead of at end of scope.
    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if let (Some(engine), Some(pool)) = (self.engine.take(), self.pool) {
            pool.park(engine);
        }
    }
}

impl<'p> Deref for EngineLease<'p> {
    type Target = dyn Algorithm;

    fn deref(&self) -> &Self::Target {
        self.engine
            .as_deref()
            .unwrap_or_else(|| unreachable!("engine lease used after release"))
    }
}

impl<'p> DerefMut for EngineLease<'p> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.engine
            .as_deref_mut()
            .unwrap_or_else(|| unreachable!("engine lease used after release"))
    }
}

impl<'p> Drop for EngineLease<'p> {
    fn drop(&mut self) {
        self.give_back();
    }
}

impl<'p> fmt::Debug for EngineLease<'p> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EngineLease")
            .field("pooled", &self.pool.is_some())
            .field("state", &self.engine.as_ref().map(|e| e.finish()))
            .finish()
    }
}

/// Pool of fixed capacity concatenation buffers.
///
/// Buffers are not zeroed when parked: callers overwrite the region they
/// read.
#[derive(Default)]
pub struct BufferPool {
    idle: Mutex<Vec<Box<[u8; BUFFER_LEN]>>>,
}

impl BufferPool {
    /// Creates an empty pool.
    pub fn new() -> BufferPool {
        BufferPool::default()
    }

    /// Lends a buffer, allocating one when none is parked.
    pub fn lease(&self) -> BufferLease<'_> {
        let buf = self
            .idle
            .lock()
            .pop()
            .unwrap_or_else(|| Box::new([0u8; BUFFER_LEN]));
        BufferLease {
            buf: Some(buf),
            pool: Some(self),
        }
    }

    /// Number of parked buffers.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("idle", &self.idle())
            .finish()
    }
}

/// Buffer on loan. Dereferences to a `BUFFER_LEN` byte slice.
#[derive(Debug)]
pub struct BufferLease<'p> {
    buf: Option<Box<[u8; BUFFER_LEN]>>,
    pool: Option<&'p BufferPool>,
}

impl<'p> BufferLease<'p> {
    /// Freshly allocated buffer that belongs to no pool.
    pub fn detached() -> BufferLease<'p> {
        BufferLease {
            buf: Some(Box::new([0u8; BUFFER_LEN])),
            pool: None,
        }
    }

    /// Returns the buffer to its pool now instead of at end of scope.
    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if let (Some(buf), Some(pool)) = (self.buf.take(), self.pool) {
            pool.idle.lock().push(buf);
        }
    }
}

impl<'p> Deref for BufferLease<'p> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.buf {
            Some(buf) => &buf[..],
            None => &[],
        }
    }
}

impl<'p> DerefMut for BufferLease<'p> {
    fn deref_mut(&mut self) -> &mut [u8] {
        match &mut self.buf {
            Some(buf) => &mut buf[..],
            None => &mut [],
        }
    }
}

impl<'p> Drop for BufferLease<'p> {
    fn drop(&mut self) {
        self.give_back();
    }
}
