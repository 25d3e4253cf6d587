//! Shared transposition table.
//!
//! Every slot is two `AtomicU64` words. Readers and writers never lock; a
//! slot half-written by another thread is caught by a check word and reported
//! as a miss.
//!
//! ```text
//! data word:
//!   63..32  key         upper 32 bits of the position hash
//!   31..26  generation  6 bits, wraps at 64
//!   25..24  bound       0 = empty, 1 = exact, 2 = lower, 3 = upper
//!   23..16  depth
//!   15..0   move        from | to << 6 | promotion << 12
//!
//! check word:
//!   63..32  key ^ (data word & 0xFFFF_FFFF)
//!   15..0   score       i16, mate scores stored relative to the node
//! ```

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use cozy_chess::{Move, Piece, Square};

use super::MATE_THRESHOLD;

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() {
        assert_send_sync::<TranspositionTable>();
    }
    let _ = check;
};

const GENERATION_MASK: u8 = 0x3F;

/// a1a1 is never legal, so its encoding marks a slot without a move.
const NO_MOVE: u64 = 0;

/// Kind of score stored in an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// The score is exact.
    Exact = 1,
    /// The search failed high; the true score is at least this.
    Lower = 2,
    /// No move raised alpha; the true score is at most this.
    Upper = 3,
}

impl Bound {
    const fn from_bits(bits: u64) -> Option<Self> {
        match bits & 0x03 {
            1 => Some(Bound::Exact),
            2 => Some(Bound::Lower),
            3 => Some(Bound::Upper),
            _ => None,
        }
    }
}

/// A verified hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtEntry {
    pub best_move: Option<Move>,
    pub depth: u8,
    pub bound: Bound,
    /// Score relative to the probing ply.
    pub score: i32,
}

/// Converts a ply-relative mate score into a node-relative one for storage.
pub fn score_to_tt(score: i32, ply: usize) -> i16 {
    let ply = ply as i32;
    let adjusted = if score >= MATE_THRESHOLD {
        score + ply
    } else if score <= -MATE_THRESHOLD {
        score - ply
    } else {
        score
    };
    adjusted as i16
}

/// Inverse of [`score_to_tt`].
pub fn score_from_tt(score: i16, ply: usize) -> i32 {
    let score = i32::from(score);
    let ply = ply as i32;
    if score >= MATE_THRESHOLD {
        score - ply
    } else if score <= -MATE_THRESHOLD {
        score + ply
    } else {
        score
    }
}

fn encode_move(mv: Option<Move>) -> u64 {
    let Some(mv) = mv else {
        return NO_MOVE;
    };
    let promotion = mv.promotion.map_or(0, |piece| piece as u64 + 1);
    mv.from as u64 | (mv.to as u64) << 6 | promotion << 12
}

fn decode_move(bits: u64) -> Option<Move> {
    if bits == NO_MOVE {
        return None;
    }
    let from = Square::index((bits & 0x3F) as usize);
    let to = Square::index(((bits >> 6) & 0x3F) as usize);
    let promotion = match (bits >> 12) & 0x07 {
        0 => None,
        code => Some(Piece::index(code as usize - 1)),
    };
    Some(Move {
        from,
        to,
        promotion,
    })
}

struct Slot {
    data: AtomicU64,
    check: AtomicU64,
}

impl Slot {
    const fn empty() -> Self {
        Self {
            data: AtomicU64::new(0),
            check: AtomicU64::new(0),
        }
    }

    fn check_word(data: u64, score: i16) -> u64 {
        let key = data >> 32;
        let low = data & 0xFFFF_FFFF;
        (key ^ low) << 32 | u64::from(score as u16)
    }

    fn read(&self, hash: u64) -> Option<(u64, i16)> {
        let data = self.data.load(Ordering::Relaxed);
        let check = self.check.load(Ordering::Relaxed);

        if (data >> 32) ^ (data & 0xFFFF_FFFF) != check >> 32 {
            return None;
        }
        if data >> 32 != hash >> 32 {
            return None;
        }
        Some((data, (check & 0xFFFF) as u16 as i16))
    }

    fn write(&self, data: u64, score: i16) {
        self.data.store(data, Ordering::Relaxed);
        self.check
            .store(Self::check_word(data, score), Ordering::Relaxed);
    }
}

/// Lockless hash table shared by every search thread.
pub struct TranspositionTable {
    slots: Box<[Slot]>,
    mask: u64,
    generation: AtomicU8,
}

impl TranspositionTable {
    /// Allocates roughly `mb` megabytes, rounded down to a power-of-two slot count.
    pub fn new(mb: usize) -> Self {
        let bytes = mb.max(1) * 1024 * 1024;
        let count = (bytes / std::mem::size_of::<Slot>()).next_power_of_two() >> 1;
        let count = count.max(1);

        Self {
            slots: (0..count).map(|_| Slot::empty()).collect(),
            mask: (count - 1) as u64,
            generation: AtomicU8::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.data.store(0, Ordering::Relaxed);
            slot.check.store(0, Ordering::Relaxed);
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Starts a new search age. Older entries become preferred victims.
    pub fn new_generation(&self) {
        let next = self.generation.load(Ordering::Relaxed).wrapping_add(1) & GENERATION_MASK;
        self.generation.store(next, Ordering::Relaxed);
    }

    fn slot(&self, hash: u64) -> &Slot {
        &self.slots[(hash & self.mask) as usize]
    }

    pub fn probe(&self, hash: u64, ply: usize) -> Option<TtEntry> {
        let (data, score) = self.slot(hash).read(hash)?;
        let bound = Bound::from_bits(data >> 24)?;

        Some(TtEntry {
            best_move: decode_move(data & 0xFFFF),
            depth: ((data >> 16) & 0xFF) as u8,
            bound,
            score: score_from_tt(score, ply),
        })
    }

    /// Stores a search result.
    ///
    /// An existing entry survives only if it belongs to the current
    /// generation, was searched deeper, and the new bound is not exact.
    pub fn store(
        &self,
        hash: u64,
        depth: u8,
        score: i32,
        best_move: Option<Move>,
        bound: Bound,
        ply: usize,
    ) {
        let slot = self.slot(hash);
        let generation = self.generation.load(Ordering::Relaxed);

        let existing = slot.data.load(Ordering::Relaxed);
        let existing_generation = ((existing >> 26) as u8) & GENERATION_MASK;
        let existing_depth = ((existing >> 16) & 0xFF) as u8;
        let replace = Bound::from_bits(existing >> 24).is_none()
            || existing_generation != generation
            || depth >= existing_depth
            || bound == Bound::Exact;
        if !replace {
            return;
        }

        let data = (hash >> 32) << 32
            | u64::from(generation) << 26
            | (bound as u64) << 24
            | u64::from(depth) << 16
            | encode_move(best_move);
        slot.write(data, score_to_tt(score, ply));
    }

    /// Approximate fill rate in permille, sampled from the first thousand slots.
    pub fn hashfull(&self) -> usize {
        let generation = self.generation.load(Ordering::Relaxed);
        let sample = self.slots.len().min(1000);
        let used = self.slots[..sample]
            .iter()
            .filter(|slot| {
                let data = slot.data.load(Ordering::Relaxed);
                Bound::from_bits(data >> 24).is_some()
                    && ((data >> 26) as u8) & GENERATION_MASK == generation
            })
            .count();
        used * 1000 / sample.max(1)
    }
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("slots", &self.slots.len())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}
