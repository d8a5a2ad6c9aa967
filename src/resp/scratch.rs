//! Growable scratch arena for raw bulk strings split across chunks.
//!
//! Reassembled values are copied into one large `BytesMut` and split off as
//! frozen `Bytes` views, so many values share a single allocation instead of
//! allocating one buffer each. A retired arena lives on for as long as any
//! view into it does.
//!
//! The arena grows fast (a multiple of the request) and shrinks slowly: after
//! a growth a 50 ms ticker trims it a tenth at a time until it is back under
//! [`SHRINK_FLOOR`], then stops.

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Arena size before any growth (32 KB).
pub const INITIAL_CAPACITY: usize = 32 * 1024;

/// Arenas at or under this size are left alone (50 KB).
pub const SHRINK_FLOOR: usize = 50 * 1024;

/// Period of the background shrink ticker.
pub const SHRINK_INTERVAL: Duration = Duration::from_millis(50);

/// Requests above this size grow the arena by 2x instead of 3x (75 MB).
const HUGE_REQUEST: usize = 75 * 1024 * 1024;

/// Carried-over write offset above this is clamped (111 MB)…
const CARRY_LIMIT: usize = 111 * 1024 * 1024;

/// …down to this (50 MB).
const CARRY_RESET: usize = 50 * 1024 * 1024;

/// Fraction of the arena released per shrinking tick.
const TRIM_DIVISOR: usize = 10;

/// Point-in-time view of the arena heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchStats {
    /// Size of the current allocation.
    pub capacity: usize,
    /// Bytes handed out from the current allocation.
    pub offset: usize,
    /// Growths not yet paid back by shrinking ticks.
    pub growth_debt: usize,
    /// Ticks that backed off instead of trimming.
    pub underuse: usize,
    /// Whether a shrink ticker should be (or is) running.
    pub ticking: bool,
}

/// New arena size for a request of `len` bytes with `offset` bytes already
/// handed out, and the offset carried into that computation.
fn grown_size(len: usize, offset: usize) -> (usize, usize) {
    let multiplier = if len > HUGE_REQUEST { 2 } else { 3 };
    let carried = if offset > CARRY_LIMIT { CARRY_RESET } else { offset };
    (len * multiplier + carried, carried)
}

/// The arena itself. Not synchronized; see [`SharedScratchPool`].
#[derive(Debug)]
pub struct ScratchPool {
    arena: BytesMut,
    capacity: usize,
    offset: usize,
    growth_debt: usize,
    underuse: usize,
    ticking: bool,
}

impl Default for ScratchPool {
    fn default() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }
}

impl ScratchPool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: BytesMut::with_capacity(capacity),
            capacity,
            offset: 0,
            growth_debt: 0,
            underuse: 0,
            ticking: false,
        }
    }

    pub fn stats(&self) -> ScratchStats {
        ScratchStats {
            capacity: self.capacity,
            offset: self.offset,
            growth_debt: self.growth_debt,
            underuse: self.underuse,
            ticking: self.ticking,
        }
    }

    /// Copy `fragments` (totalling `len` bytes) into the arena and return a
    /// view of exactly those bytes.
    ///
    /// The second value is true when this call grew the arena and no ticker
    /// was marked as running yet; the caller should start one.
    pub fn assemble(&mut self, fragments: &[&[u8]], len: usize) -> (Bytes, bool) {
        let start_ticker = self.reserve(len) && !self.ticking;
        if start_ticker {
            self.ticking = true;
        }

        for fragment in fragments {
            self.arena.extend_from_slice(fragment);
        }
        debug_assert_eq!(self.arena.len(), len);
        self.offset += len;
        (self.arena.split().freeze(), start_ticker)
    }

    /// Make room for `len` more bytes. Returns true if a new arena was allocated.
    fn reserve(&mut self, len: usize) -> bool {
        if self.capacity.saturating_sub(self.offset) >= len {
            return false;
        }

        let (size, carried) = grown_size(len, self.offset);
        self.offset = carried;
        debug!(
            requested = len,
            old_capacity = self.capacity,
            new_capacity = size,
            "growing scratch arena"
        );
        self.replace(size);
        self.growth_debt += 1;
        true
    }

    fn replace(&mut self, size: usize) {
        self.arena = BytesMut::with_capacity(size);
        self.capacity = size;
        self.offset = 0;
    }

    /// One shrink step. Returns false once the arena is at or under
    /// [`SHRINK_FLOOR`]; the ticker should stop then.
    pub fn tick(&mut self) -> bool {
        if self.capacity <= SHRINK_FLOOR {
            self.growth_debt = 0;
            self.underuse = 0;
            self.ticking = false;
            trace!(capacity = self.capacity, "scratch arena idle");
            return false;
        }

        if self.growth_debt == 1 || self.underuse > self.growth_debt * 2 {
            let trim = (self.capacity / TRIM_DIVISOR).max(self.offset);
            let size = self.capacity.saturating_sub(trim);
            debug!(
                old_capacity = self.capacity,
                new_capacity = size,
                "trimming scratch arena"
            );
            self.replace(size);
        } else {
            self.underuse += 1;
            self.growth_debt = self.growth_debt.saturating_sub(1);
        }
        true
    }
}

/// Cheaply clonable, thread-safe handle to one [`ScratchPool`].
///
/// Share one handle between every decoder of a server to have them all
/// reassemble into the same arena.
#[derive(Debug, Clone, Default)]
pub struct SharedScratchPool {
    inner: Arc<Mutex<ScratchPool>>,
}

impl SharedScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pool(pool: ScratchPool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pool)),
        }
    }

    pub fn stats(&self) -> ScratchStats {
        self.inner.lock().stats()
    }

    /// See [`ScratchPool::assemble`]. Starts the shrink ticker on the current
    /// tokio runtime when the arena grew.
    pub fn assemble(&self, fragments: &[&[u8]], len: usize) -> Bytes {
        let (bytes, start_ticker) = self.inner.lock().assemble(fragments, len);
        if start_ticker {
            self.spawn_shrinker();
        }
        bytes
    }

    /// Run one shrink step by hand; for callers without a tokio runtime.
    pub fn tick(&self) -> bool {
        self.inner.lock().tick()
    }

    fn spawn_shrinker(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // Nobody to drive the ticker; the owner has to call tick().
            trace!("no tokio runtime, scratch arena shrinks only on manual tick");
            return;
        };

        let pool: Weak<Mutex<ScratchPool>> = Arc::downgrade(&self.inner);
        handle.spawn(async move {
            let mut interval = tokio::time::interval(SHRINK_INTERVAL);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(pool) = pool.upgrade() else {
                    break;
                };
                if !pool.lock().tick() {
                    break;
                }
            }
            debug!("scratch shrink ticker stopped");
        });
    }
}

// ── Tests ──────────────────────────────────────────────────────────
