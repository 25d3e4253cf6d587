//! Per-thread search state: the hashes of the current line, killer moves,
//! and the butterfly history table.

use cozy_chess::{Color, Move};

use super::MAX_PLY;

/// History scores never leave `-HISTORY_MAX..=HISTORY_MAX`.
pub const HISTORY_MAX: i32 = 32_768;

/// Two quiet moves per ply that recently caused a beta cutoff.
pub struct KillerTable {
    slots: [[Option<Move>; 2]; MAX_PLY],
}

impl KillerTable {
    pub fn new() -> Self {
        Self {
            slots: [[None; 2]; MAX_PLY],
        }
    }

    /// Records a cutoff move, pushing the previous first killer into the second slot.
    pub fn store(&mut self, ply: usize, mv: Move) {
        let Some(slots) = self.slots.get_mut(ply) else {
            return;
        };
        if slots[0] != Some(mv) {
            slots[1] = slots[0];
            slots[0] = Some(mv);
        }
    }

    /// Which slot holds `mv` at this ply, if any.
    pub fn slot(&self, ply: usize, mv: Move) -> Option<usize> {
        self.slots
            .get(ply)?
            .iter()
            .position(|&killer| killer == Some(mv))
    }

    pub fn clear(&mut self) {
        self.slots = [[None; 2]; MAX_PLY];
    }
}

impl Default for KillerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Butterfly history indexed by `[side][from][to]`.
pub struct HistoryTable {
    table: Box<[[[i32; 64]; 64]; 2]>,
}

impl HistoryTable {
    pub fn new() -> Self {
        Self {
            table: Box::new([[[0; 64]; 64]; 2]),
        }
    }

    pub fn get(&self, side: Color, mv: Move) -> i32 {
        self.table[side as usize][mv.from as usize][mv.to as usize]
    }

    fn add(&mut self, side: Color, mv: Move, delta: i32) {
        let entry = &mut self.table[side as usize][mv.from as usize][mv.to as usize];
        *entry = (*entry + delta).clamp(-HISTORY_MAX, HISTORY_MAX);
    }

    /// Rewards a quiet move that caused a beta cutoff.
    pub fn reward(&mut self, side: Color, mv: Move, depth: i32) {
        self.add(side, mv, bonus(depth));
    }

    /// Penalises a quiet move searched before the cutoff move.
    pub fn penalize(&mut self, side: Color, mv: Move, depth: i32) {
        self.add(side, mv, -bonus(depth));
    }

    /// Halves every entry so older statistics fade between iterations.
    pub fn age(&mut self) {
        for entry in self.table.iter_mut().flatten().flatten() {
            *entry /= 2;
        }
    }

    pub fn clear(&mut self) {
        for entry in self.table.iter_mut().flatten().flatten() {
            *entry = 0;
        }
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new()
    }
}

fn bonus(depth: i32) -> i32 {
    let depth = depth.clamp(0, MAX_PLY as i32);
    (depth * depth).min(HISTORY_MAX)
}

/// State one search thread threads through the tree.
///
/// `line()` always holds exactly `ply()` hashes: the root's hash first, then
/// one per move made along the current path, the hash of the position the
/// move was played from.
pub struct SearchData {
    ply: usize,
    line: Vec<u64>,
    pub killers: KillerTable,
    pub history: HistoryTable,
}

impl SearchData {
    pub fn new() -> Self {
        Self {
            ply: 0,
            line: Vec::with_capacity(MAX_PLY),
            killers: KillerTable::new(),
            history: HistoryTable::new(),
        }
    }

    pub fn ply(&self) -> usize {
        self.ply
    }

    /// Hashes of the positions between the root and the current node, root first.
    pub fn line(&self) -> &[u64] {
        &self.line
    }

    /// Descends one ply; `hash` is the position the move is played from.
    pub fn push(&mut self, hash: u64) {
        self.line.push(hash);
        self.ply += 1;
    }

    /// Returns to the parent node.
    pub fn pop(&mut self) {
        debug_assert!(self.ply > 0, "pop at the root");
        self.line.pop();
        self.ply -= 1;
    }

    /// Forgets everything learned, ready for a fresh search.
    pub fn reset(&mut self) {
        self.ply = 0;
        self.line.clear();
        self.killers.clear();
        self.history.clear();
    }
}

impl Default for SearchData {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use cozy_chess::Square;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn mv(from: Square, to: Square) -> Move {
        Move {
            from,
            to,
            promotion: None,
        }
    }

    #[test]
    fn killer_store_shifts_previous_into_second_slot() {
        let mut killers = KillerTable::new();
        let e4 = mv(Square::E2, Square::E4);
        let d4 = mv(Square::D2, Square::D4);

        killers.store(5, e4);
        assert_eq!(killers.slot(5, e4), Some(0));
        assert_eq!(killers.slot(5, d4), None);

        killers.store(5, d4);
        assert_eq!(killers.slot(5, d4), Some(0));
        assert_eq!(killers.slot(5, e4), Some(1));
    }

    #[test]
    fn storing_first_killer_again_keeps_second() {
        let mut killers = KillerTable::new();
        let e4 = mv(Square::E2, Square::E4);
        let d4 = mv(Square::D2, Square::D4);

        killers.store(0, e4);
        killers.store(0, d4);
        killers.store(0, d4);
        assert_eq!(killers.slot(0, e4), Some(1));
        assert_eq!(killers.slot(0, d4), Some(0));
    }

    #[test]
    fn killers_are_per_ply() {
        let mut killers = KillerTable::new();
        let e4 = mv(Square::E2, Square::E4);
        killers.store(3, e4);
        assert_eq!(killers.slot(4, e4), None);
        killers.store(MAX_PLY, e4);
        assert_eq!(killers.slot(MAX_PLY, e4), None);
    }

    #[test]
    fn history_reward_and_penalty_are_depth_squared() {
        let mut history = HistoryTable::new();
        let nf3 = mv(Square::G1, Square::F3);

        history.reward(Color::White, nf3, 4);
        assert_eq!(history.get(Color::White, nf3), 16);
        assert_eq!(history.get(Color::Black, nf3), 0);

        history.penalize(Color::White, nf3, 3);
        assert_eq!(history.get(Color::White, nf3), 7);
    }

    #[test]
    fn history_stays_clamped() {
        let mut history = HistoryTable::new();
        let nf3 = mv(Square::G1, Square::F3);

        for _ in 0..1_000 {
            history.reward(Color::White, nf3, 90);
        }
        assert_eq!(history.get(Color::White, nf3), HISTORY_MAX);

        for _ in 0..1_000 {
            history.penalize(Color::White, nf3, 90);
        }
        assert_eq!(history.get(Color::White, nf3), -HISTORY_MAX);
    }

    #[test]
    fn aging_halves_history() {
        let mut history = HistoryTable::new();
        let nf3 = mv(Square::G1, Square::F3);
        history.reward(Color::Black, nf3, 10);
        history.age();
        assert_eq!(history.get(Color::Black, nf3), 50);
    }

    #[test]
    fn line_length_tracks_ply_through_random_walks() {
        let mut rng = StdRng::seed_from_u64(0x00C0_FFEE);
        let mut data = SearchData::new();
        data.push(1);

        for _ in 0..10_000 {
            let descend = data.ply() == 1 || (data.ply() < MAX_PLY && rng.gen_bool(0.5));
            if descend {
                data.push(rng.gen_range(0..u64::MAX));
            } else {
                data.pop();
            }
            assert_eq!(data.line().len(), data.ply());
            assert_eq!(data.line()[0], 1);
        }
    }

    #[test]
    fn reset_returns_to_root() {
        let mut data = SearchData::new();
        data.push(7);
        data.push(8);
        data.killers.store(1, mv(Square::E2, Square::E4));
        data.reset();
        assert_eq!(data.ply(), 0);
        assert!(data.line().is_empty());
        assert_eq!(data.killers.slot(1, mv(Square::E2, Square::E4)), None);
    }
}
