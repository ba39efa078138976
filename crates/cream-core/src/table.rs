//! The concurrent bounded hash table: open addressing, tombstones, TTL
//! expiration, and force-eviction on overflow.
//!
//! Grounded on the bucket state machine in a concurrent hash map from the
//! example pack (`Bucket::{Empty, Full, Removed}` there, `SlotState::{Empty,
//! Live, Tombstone}` here) and on the probe/insert/delete/TTL semantics of
//! `examples/original_source/src/extracredit.c`. The two fixes called for
//! by that source's Open Questions are applied here: TTL expiry always
//! reclaims a slot to `Empty` (never leaves a dangling entry), and delete's
//! successor probe checks the *current* probed index rather than the
//! natural index.

use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::error::CreamError;

/// The state of one slot in the backing array.
#[derive(Clone)]
enum SlotState {
    Empty,
    Tombstone,
    Live {
        key: Vec<u8>,
        val: Vec<u8>,
        inserted_at: Instant,
    },
}

struct TableInner {
    slots: Vec<SlotState>,
    size: usize,
    invalid: bool,
}

/// A fixed-capacity, thread-safe open-addressed map.
///
/// Capacity is fixed at construction. `put`/`evict`/`clear`/`invalidate`
/// are writers; `get` takes a fast read-only path when nothing on the
/// probed chain has expired, falling back to the writer path only when a
/// TTL reclamation is needed along the way.
pub struct Table {
    inner: RwLock<TableInner>,
    capacity: usize,
    ttl: Duration,
    hash_fn: Box<dyn Fn(&[u8]) -> u32 + Send + Sync>,
}

/// Outcome of a `put`.
#[derive(Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// The entry was stored (whether fresh, replacing a match, reusing a
    /// tombstone, or force-displacing the natural-index entry).
    Stored,
}

enum ProbeResult {
    /// Index of a Live slot whose key matches.
    Found(usize),
    /// Index of the first Empty slot seen before a full lap (probe stops
    /// here; an Empty slot always terminates a lookup).
    Empty(usize),
    /// The probe completed a full lap without finding a match or an Empty
    /// slot. Carries the first Tombstone seen, if any, for reuse.
    Exhausted(Option<usize>),
}

enum FastProbe {
    Found(Vec<u8>),
    NotFound,
    /// An expired Live slot was observed; caller must retry under the
    /// write lock to reclaim it.
    NeedsReclaim,
}

impl Table {
    /// Allocate a table with `capacity` slots, hashed by `hash_fn` and
    /// expiring entries after `ttl`. Fails if `capacity == 0`.
    pub fn new(
        capacity: usize,
        ttl: Duration,
        hash_fn: impl Fn(&[u8]) -> u32 + Send + Sync + 'static,
    ) -> Result<Self, CreamError> {
        if capacity == 0 {
            return Err(CreamError::InvalidArgument(
                "table capacity must be nonzero".to_string(),
            ));
        }
        Ok(Self {
            inner: RwLock::new(TableInner {
                slots: vec![SlotState::Empty; capacity],
                size: 0,
                invalid: false,
            }),
            capacity,
            ttl,
            hash_fn: Box::new(hash_fn),
        })
    }

    /// Allocate a table using the Jenkins one-at-a-time hash, matching
    /// the server's default configuration.
    pub fn with_default_hash(capacity: usize, ttl: Duration) -> Result<Self, CreamError> {
        Self::new(capacity, ttl, jenkins_one_at_a_time)
    }

    /// Fixed capacity of this table.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of Live entries.
    pub fn len(&self) -> usize {
        self.inner.read().size
    }

    /// `true` if there are no Live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn natural_index(&self, key: &[u8]) -> usize {
        (self.hash_fn)(key) as usize % self.capacity
    }

    fn validate_key(&self, key: &[u8]) -> Result<(), CreamError> {
        if key.is_empty() {
            return Err(CreamError::InvalidArgument(
                "key must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Store `key` → `val`. Matching Live entries are replaced in place.
    ///
    /// On a full table with no matching key: if `force` is `true`, the
    /// entry at the natural index is forcibly displaced (never fails);
    /// if `false`, fails with [`CreamError::OutOfMemory`] and the table
    /// is left unchanged.
    pub fn put(&self, key: &[u8], val: Vec<u8>, force: bool) -> Result<PutOutcome, CreamError> {
        self.validate_key(key)?;
        let h = self.natural_index(key);
        let now = Instant::now();

        let mut inner = self.inner.write();
        if inner.invalid {
            return Err(CreamError::InvalidArgument("table invalidated".to_string()));
        }

        match probe(&mut inner, key, h, self.capacity, self.ttl, now) {
            ProbeResult::Found(idx) => {
                inner.slots[idx] = SlotState::Live {
                    key: key.to_vec(),
                    val,
                    inserted_at: now,
                };
                Ok(PutOutcome::Stored)
            }
            ProbeResult::Empty(idx) => {
                inner.slots[idx] = SlotState::Live {
                    key: key.to_vec(),
                    val,
                    inserted_at: now,
                };
                inner.size += 1;
                Ok(PutOutcome::Stored)
            }
            ProbeResult::Exhausted(Some(candidate)) => {
                inner.slots[candidate] = SlotState::Live {
                    key: key.to_vec(),
                    val,
                    inserted_at: now,
                };
                inner.size += 1;
                Ok(PutOutcome::Stored)
            }
            ProbeResult::Exhausted(None) => {
                if force {
                    inner.slots[h] = SlotState::Live {
                        key: key.to_vec(),
                        val,
                        inserted_at: now,
                    };
                    // size unchanged: the natural-index slot was Live
                    // (the table is full of Live slots in this branch).
                    Ok(PutOutcome::Stored)
                } else {
                    Err(CreamError::OutOfMemory)
                }
            }
        }
    }

    /// Look up `key`. Returns `None` if absent, expired, or evicted.
    ///
    /// The returned bytes are copied out of the table while the lock
    /// (read or write, whichever path is taken) is still held, so the
    /// caller may use them after the guard is released without risk of
    /// a concurrent writer mutating them underneath.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CreamError> {
        self.validate_key(key)?;
        let h = self.natural_index(key);
        let now = Instant::now();

        {
            let inner = self.inner.read();
            if inner.invalid {
                return Err(CreamError::InvalidArgument("table invalidated".to_string()));
            }
            match fast_probe(&inner, key, h, self.capacity, self.ttl, now) {
                FastProbe::Found(v) => return Ok(Some(v)),
                FastProbe::NotFound => return Ok(None),
                FastProbe::NeedsReclaim => {}
            }
        }

        // Slow path: reclaim the expired slot(s) seen along the chain
        // under the write lock, then resolve the lookup in the same pass.
        let mut inner = self.inner.write();
        if inner.invalid {
            return Err(CreamError::InvalidArgument("table invalidated".to_string()));
        }
        match probe(&mut inner, key, h, self.capacity, self.ttl, now) {
            ProbeResult::Found(idx) => match &inner.slots[idx] {
                SlotState::Live { val, .. } => Ok(Some(val.clone())),
                _ => unreachable!("probe returned Found for a non-Live slot"),
            },
            ProbeResult::Empty(_) | ProbeResult::Exhausted(_) => Ok(None),
        }
    }

    /// Remove `key` if present. Returns whether a Live entry was removed.
    pub fn evict(&self, key: &[u8]) -> Result<bool, CreamError> {
        self.validate_key(key)?;
        let h = self.natural_index(key);
        let now = Instant::now();

        let mut inner = self.inner.write();
        if inner.invalid {
            return Err(CreamError::InvalidArgument("table invalidated".to_string()));
        }

        match probe(&mut inner, key, h, self.capacity, self.ttl, now) {
            ProbeResult::Found(idx) => {
                inner.slots[idx] = SlotState::Tombstone;
                inner.size -= 1;
                Ok(true)
            }
            ProbeResult::Empty(_) | ProbeResult::Exhausted(_) => Ok(false),
        }
    }

    /// Destroy all Live entries and reset the table to empty.
    pub fn clear(&self) -> Result<(), CreamError> {
        let mut inner = self.inner.write();
        if inner.invalid {
            return Err(CreamError::InvalidArgument("table invalidated".to_string()));
        }
        for slot in inner.slots.iter_mut() {
            *slot = SlotState::Empty;
        }
        inner.size = 0;
        Ok(())
    }

    /// Destroy all Live entries, free the backing array, and mark the
    /// table invalid. Subsequent calls to any operation fail.
    pub fn invalidate(&self) -> Result<(), CreamError> {
        let mut inner = self.inner.write();
        if inner.invalid {
            return Err(CreamError::InvalidArgument("table invalidated".to_string()));
        }
        inner.slots.clear();
        inner.slots.shrink_to_fit();
        inner.size = 0;
        inner.invalid = true;
        Ok(())
    }
}

/// Full probe: walks the chain starting at `h`, reclaiming any expired
/// Live slot it visits (mutating `inner`). Used by every operation that
/// already holds the write lock.
fn probe(
    inner: &mut TableInner,
    key: &[u8],
    h: usize,
    capacity: usize,
    ttl: Duration,
    now: Instant,
) -> ProbeResult {
    let mut candidate: Option<usize> = None;

    for step in 0..capacity {
        let idx = (h + step) % capacity;

        if let SlotState::Live { inserted_at, .. } = &inner.slots[idx] {
            if now.duration_since(*inserted_at) > ttl {
                inner.slots[idx] = SlotState::Empty;
                inner.size -= 1;
            }
        }

        match &inner.slots[idx] {
            SlotState::Empty => return ProbeResult::Empty(idx),
            SlotState::Tombstone => {
                if candidate.is_none() {
                    candidate = Some(idx);
                }
            }
            SlotState::Live { key: k, .. } => {
                if k.as_slice() == key {
                    return ProbeResult::Found(idx);
                }
            }
        }
    }

    ProbeResult::Exhausted(candidate)
}

/// Read-only probe for the `get` fast path. Identical walk to [`probe`]
/// but never mutates; reports `NeedsReclaim` instead of reclaiming so the
/// caller can retry under the write lock.
fn fast_probe(
    inner: &TableInner,
    key: &[u8],
    h: usize,
    capacity: usize,
    ttl: Duration,
    now: Instant,
) -> FastProbe {
    for step in 0..capacity {
        let idx = (h + step) % capacity;
        match &inner.slots[idx] {
            SlotState::Empty => return FastProbe::NotFound,
            SlotState::Tombstone => continue,
            SlotState::Live { key: k, val, inserted_at } => {
                if now.duration_since(*inserted_at) > ttl {
                    return FastProbe::NeedsReclaim;
                }
                if k.as_slice() == key {
                    return FastProbe::Found(val.clone());
                }
            }
        }
    }
    FastProbe::NotFound
}

/// Jenkins one-at-a-time hash, matching the source implementation's
/// default hash function.
pub fn jenkins_one_at_a_time(key: &[u8]) -> u32 {
    let mut hash: u32 = 0;
    for &byte in key {
        hash = hash.wrapping_add(byte as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);
    hash
}
