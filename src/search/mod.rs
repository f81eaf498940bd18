//! Iterative-deepening negamax search with fail-soft alpha-beta,
//! quiescence over captures, and principal-variation tracking.

pub mod eval;
pub mod movegen;
pub mod time;
pub mod ttab;

use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::board::Board;
use crate::board::mov::Move;
use crate::egdb::EndgameDb;
use eval::Weights;
use time::ThinkLimits;
use ttab::{NodeKind, TransTable, TT_POW};


/// Scores live in `(-VALUE_INF, VALUE_INF)`; mates are `±(VALUE_INF - ply)`.
pub const VALUE_INF: i32 = 10000;
pub const MIN_ALPHA: i32 = -VALUE_INF;
pub const MAX_BETA: i32 = VALUE_INF;

/// Root scores below this announce an unavoidable loss.
const FORCED_LOSS: i32 = -9988;

/// Capacity of the shared move stack across all plies.
pub(crate) const MOVE_STACK: usize = 256;
/// Maximum search ply.
pub(crate) const HIST_STACK: usize = 64;


/// Evaluation information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SearchEval {
    /// Score of the position for the side to move.
    Normal(i32),
    /// Distance to mate in plies; positive is winning, negative losing.
    Mate(i32),
}

impl SearchEval {
    pub fn from_score(score: i32) -> Self {
        if score > ttab::MATE_THRESHOLD {
            SearchEval::Mate(VALUE_INF - score)
        } else if score < -ttab::MATE_THRESHOLD {
            SearchEval::Mate(-(score + VALUE_INF))
        } else {
            SearchEval::Normal(score)
        }
    }
}

impl Ord for SearchEval {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering::{Greater, Less};
        match *self {
            SearchEval::Normal(self_score) => match other {
                SearchEval::Normal(other_score) => self_score.cmp(other_score),
                SearchEval::Mate(other_mate) => if *other_mate >= 0 { Less } else { Greater },
            }
            SearchEval::Mate(self_mate) => match other {
                SearchEval::Normal(_) => if self_mate >= 0 { Greater } else { Less },
                SearchEval::Mate(other_mate) => {
                    let is_self_pos = self_mate >= 0;
                    let is_other_pos = *other_mate >= 0;
                    if is_self_pos && !is_other_pos {
                        Greater
                    } else if !is_self_pos && is_other_pos {
                        Less
                    } else {
                        other_mate.cmp(&self_mate)
                    }
                }
            },
        }
    }
}
impl PartialOrd for SearchEval {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Reported per-iteration search information.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchInfo {
    /// Completed search depth.
    pub depth: i32,
    pub eval: SearchEval,
    /// Principal variation, best move first.
    pub pv: Vec<Move>,
    pub elapsed: Duration,
}

/// Progress sink and cancellation for a running think. Both the channel
/// send and the kill check happen between depth iterations only; a depth in
/// flight always runs to completion.
#[derive(Debug, Clone)]
pub struct SearchMonitor {
    pub progress: Option<Sender<SearchInfo>>,
    pub kill_switch: Arc<AtomicBool>,
}

impl SearchMonitor {
    /// A monitor that reports nowhere and never cancels.
    pub fn silent() -> Self {
        SearchMonitor { progress: None, kill_switch: Arc::new(AtomicBool::new(false)) }
    }

    fn report(&self, info: SearchInfo) {
        if let Some(sndr) = &self.progress {
            let _ = sndr.send(info);
        }
    }

    fn killed(&self) -> bool {
        self.kill_switch.load(SeqCst)
    }
}

/// Outcome of a completed think.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkOutcome {
    pub best: Move,
    pub score: i32,
    pub depth: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkVerdict {
    Best(ThinkOutcome),
    /// A decisive losing score at the target depth: the game is over, there
    /// is no move worth playing.
    ForcedLoss,
}


/// All search state for one game: the board, the per-ply move and history
/// stacks, the principal-variation store, the history-heuristic table, and
/// the transposition table. Single-threaded by design; every buffer is
/// reused in place across calls.
pub struct Engine {
    pub board: Board,
    pub level: u8,
    pub deterministic: bool,

    pub(crate) ply: usize,
    pub max_ply: usize,

    pub(crate) gen_dat: [Move; MOVE_STACK],
    pub(crate) gen_score: [i32; MOVE_STACK],
    pub(crate) gen_begin: [usize; HIST_STACK + 1],
    pub(crate) gen_end: [usize; HIST_STACK + 1],
    pub(crate) hist: [Move; HIST_STACK],

    pv: [[Move; HIST_STACK]; HIST_STACK],
    pv_len: [usize; HIST_STACK],
    follow_pv: bool,

    /// History heuristic, indexed `(to << 6) + from`.
    pub(crate) mov_val: Box<[i32]>,

    pub weights: Weights,
    pub tt: TransTable,
    pub egdb: Arc<EndgameDb>,

    /// The last move played at game level; seeds capture-continuation
    /// detection at the search root.
    pub last_move: Move,
    /// Landing square of the last non-skip move at game level.
    pub last_move_cap: usize,
}

impl Engine {
    pub fn new(egdb: Arc<EndgameDb>, level: u8, deterministic: bool) -> Engine {
        Engine {
            board: Board::default(),
            level,
            deterministic,
            ply: 0,
            max_ply: 0,
            gen_dat: [Move::NONE; MOVE_STACK],
            gen_score: [0; MOVE_STACK],
            gen_begin: [0; HIST_STACK + 1],
            gen_end: [0; HIST_STACK + 1],
            hist: [Move::NONE; HIST_STACK],
            pv: [[Move::NONE; HIST_STACK]; HIST_STACK],
            pv_len: [0; HIST_STACK],
            follow_pv: false,
            mov_val: vec![0; 64 * 64].into_boxed_slice(),
            weights: Weights::default(),
            tt: TransTable::new(TT_POW),
            egdb,
            last_move: Move::NONE,
            last_move_cap: 0,
        }
    }

    /// Reset every piece of shared state for a fresh game. Stale counters,
    /// stacks, or table entries must never leak between games.
    pub fn new_game(&mut self) {
        self.board.reset();
        self.ply = 0;
        self.max_ply = 0;
        self.gen_begin = [0; HIST_STACK + 1];
        self.gen_end = [0; HIST_STACK + 1];
        self.hist = [Move::NONE; HIST_STACK];
        self.pv = [[Move::NONE; HIST_STACK]; HIST_STACK];
        self.pv_len = [0; HIST_STACK];
        self.follow_pv = false;
        self.mov_val.fill(0);
        self.weights = Weights::default();
        self.last_move = Move::NONE;
        self.last_move_cap = 0;
        self.tt.clear();
    }

    /// Generate the legal moves for the current position at the root.
    pub fn root_gen(&mut self) {
        self.ply = 0;
        self.gen_begin[0] = 0;
        self.gen(true);
    }

    /// The root move list produced by the last [`root_gen`](Self::root_gen).
    pub fn root_moves(&self) -> &[Move] {
        &self.gen_dat[self.gen_begin[0]..self.gen_end[0]]
    }

    #[inline]
    pub(crate) fn make(&mut self, mv: Move) {
        debug_assert!(self.ply < HIST_STACK);
        self.hist[self.ply] = mv;
        self.board.make(mv);
        self.ply += 1;
        if self.ply > self.max_ply {
            self.max_ply = self.ply;
        }
    }

    #[inline]
    pub(crate) fn unmake(&mut self) {
        self.ply -= 1;
        self.board.unmake(self.hist[self.ply]);
    }

    /// Boost the PV move of the previous iteration so it sorts first, while
    /// the search is still walking down the old principal variation.
    fn sort_pv(&mut self) {
        self.follow_pv = false;
        let target = self.pv[0][self.ply];
        for i in self.gen_begin[self.ply]..self.gen_end[self.ply] {
            if self.gen_dat[i] == target {
                self.follow_pv = true;
                self.gen_score[i] += MAX_BETA;
                return;
            }
        }
    }

    /// Lazy selection sort: swap the best-scored unsearched move into
    /// position `from`. Moves past a cutoff never get sorted at all.
    fn sort(&mut self, from: usize) {
        let end = self.gen_end[self.ply];
        let mut best_i = from;
        let mut best_s = self.gen_score[from];
        for i in (from + 1)..end {
            if self.gen_score[i] > best_s {
                best_s = self.gen_score[i];
                best_i = i;
            }
        }
        self.gen_dat.swap(from, best_i);
        self.gen_score.swap(from, best_i);
    }

    /// Extend this ply's principal variation with the child's continuation.
    fn update_pv(&mut self, i: usize) {
        let ply = self.ply;
        let len = self.pv_len[ply + 1];
        self.pv[ply][ply] = self.gen_dat[i];
        for e in (ply + 1)..len {
            let mv = self.pv[ply + 1][e];
            self.pv[ply][e] = mv;
        }
        self.pv_len[ply] = len;
    }

    fn pv_line(&self) -> Vec<Move> {
        let mut line = Vec::new();
        for i in 0..self.pv_len[0].max(1) {
            let mv = self.pv[0][i];
            if mv.is_none() {
                break;
            }
            line.push(mv);
        }
        line
    }

    fn search(&mut self, mut alpha: i32, beta: i32, mut depth: i32) -> i32 {
        if depth == 0 {
            return self.quiesce(alpha, beta);
        }
        if self.ply >= HIST_STACK - 1 {
            return self.evaluate();
        }

        let key = self.board.search_hash();
        let probe = self.tt.probe(key, depth, alpha, beta, self.ply);
        if !probe.best.is_none() && self.ply == 0 {
            self.pv[0][0] = probe.best;
        }
        if let Some(score) = probe.hit {
            return score;
        }

        self.pv_len[self.ply] = self.ply;
        self.gen(true);

        let begin = self.gen_begin[self.ply];
        let end = self.gen_end[self.ply];
        if end == begin {
            // no moves: the side to move has lost
            let score = -VALUE_INF + self.ply as i32;
            self.tt.store(key, depth, NodeKind::Exact, score, Move::NONE, self.ply);
            return score;
        }

        // single-reply extension: a forced move costs no depth
        if end - begin == 1 && self.board.light_pawns > 1 && self.board.dark_pawns > 1 {
            depth += 1;
        }

        if self.follow_pv {
            self.sort_pv();
        }

        let alpha_orig = alpha;
        let mut best_move = Move::NONE;
        let mut best_score = -VALUE_INF;

        for i in begin..end {
            self.sort(i);
            let mv = self.gen_dat[i];
            self.make(mv);
            let score = -self.search(-beta, -alpha, depth - 1);
            self.unmake();

            if score > best_score {
                best_score = score;
                best_move = mv;
            }
            if score >= beta {
                self.tt.store(key, depth, NodeKind::Beta, score, mv, self.ply);
                return score; // fail-soft
            }
            if score > alpha {
                alpha = score;
                self.mov_val[(mv.to() << 6) + mv.from()] += depth;
                self.update_pv(i);
            }
        }

        let kind = if best_score > alpha_orig { NodeKind::Exact } else { NodeKind::Alpha };
        self.tt.store(key, depth, kind, best_score, best_move, self.ply);
        best_score
    }

    /// Capture-only search at the horizon. Never consults the
    /// transposition table.
    fn quiesce(&mut self, mut alpha: i32, beta: i32) -> i32 {
        if self.ply >= HIST_STACK - 1 {
            return self.evaluate();
        }
        self.pv_len[self.ply] = self.ply;

        let stand = self.evaluate();
        if stand >= beta {
            return stand;
        }
        if stand > alpha {
            alpha = stand;
        }

        self.gen(false);
        let begin = self.gen_begin[self.ply];
        let end = self.gen_end[self.ply];
        if end == begin {
            return stand; // quiet position
        }

        if self.follow_pv {
            self.sort_pv();
        }

        for i in begin..end {
            self.sort(i);
            let mv = self.gen_dat[i];
            self.make(mv);
            let score = -self.quiesce(-beta, -alpha);
            self.unmake();

            if score >= beta {
                return score;
            }
            if score > alpha {
                alpha = score;
                self.update_pv(i);
            }
        }

        alpha
    }

    /// Iterative deepening from depth 1. Each completed iteration reports
    /// through `monitor`; the kill switch and the time budgets are the only
    /// cancellation points.
    pub fn think(&mut self, limits: &ThinkLimits, monitor: &SearchMonitor) -> ThinkVerdict {
        let t0 = Instant::now();
        self.ply = 0;
        self.max_ply = 0;
        self.mov_val.fill(0);
        self.pv[0][0] = Move::NONE;
        self.pv_len[0] = 0;

        let extra = time::extra_depth(self.board.piece_count);
        let mut depth = 1;
        let mut score;

        loop {
            self.follow_pv = true;
            score = self.search(MIN_ALPHA, MAX_BETA, depth);
            let elapsed = t0.elapsed();

            monitor.report(SearchInfo {
                depth,
                eval: SearchEval::from_score(score),
                pv: self.pv_line(),
                elapsed,
            });

            if monitor.killed() {
                break;
            }
            if elapsed >= limits.max_time {
                break;
            }
            if depth >= limits.target_depth && score < FORCED_LOSS {
                self.log_think(depth, score);
                return ThinkVerdict::ForcedLoss;
            }
            if depth >= limits.target_depth
                && elapsed >= limits.min_time
                && (score <= -time::DECISIVE_SCORE
                    || score >= time::DECISIVE_SCORE
                    || depth >= limits.target_depth + extra)
            {
                break;
            }
            if self.deterministic && depth >= limits.target_depth {
                break;
            }
            depth += 1;
        }

        self.log_think(depth, score);
        ThinkVerdict::Best(ThinkOutcome { best: self.pv[0][0], score, depth })
    }

    fn log_think(&mut self, depth: i32, score: i32) {
        tracing::debug!(
            depth,
            score,
            max_ply = self.max_ply,
            tt_probes = self.tt.probes,
            tt_hits = self.tt.hits,
            tt_stores = self.tt.stores,
            tt_collisions = self.tt.collisions,
            eg_probes = self.egdb.probe_count(),
            eg_hits = self.egdb.hit_count(),
            "think complete"
        );
        self.tt.reset_stats();
        self.egdb.reset_stats();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Cell, Side, PLAYABLE};

    fn engine() -> Engine {
        Engine::new(Arc::new(EndgameDb::default()), 1, true)
    }

    fn clear_board(e: &mut Engine) {
        for &sq in PLAYABLE.iter() {
            e.board.cells[sq] = Cell::Empty;
        }
    }

    #[test]
    fn test_search_eval_cmp() {
        use std::cmp::Ordering;

        let s1 = SearchEval::Normal(34);
        let s2 = SearchEval::Normal(-40);
        let s3 = SearchEval::Mate(4);
        let s4 = SearchEval::Mate(8);
        let s5 = SearchEval::Mate(-2);

        assert_eq!(s1.cmp(&s1), Ordering::Equal);
        assert_eq!(s1.cmp(&s2), Ordering::Greater);
        assert_eq!(s1.cmp(&s3), Ordering::Less);
        assert_eq!(s1.cmp(&s5), Ordering::Greater);

        assert_eq!(s2.cmp(&s1), Ordering::Less);
        assert_eq!(s2.cmp(&s3), Ordering::Less);
        assert_eq!(s2.cmp(&s5), Ordering::Greater);

        assert_eq!(s3.cmp(&s2), Ordering::Greater);
        assert_eq!(s3.cmp(&s4), Ordering::Greater);
        assert_eq!(s3.cmp(&s5), Ordering::Greater);

        assert_eq!(s5.cmp(&s2), Ordering::Less);
        assert_eq!(s5.cmp(&s4), Ordering::Less);
        assert_eq!(s5.cmp(&s5), Ordering::Equal);
    }

    #[test]
    fn test_search_eval_from_score() {
        assert_eq!(SearchEval::from_score(120), SearchEval::Normal(120));
        assert_eq!(SearchEval::from_score(VALUE_INF - 3), SearchEval::Mate(3));
        assert_eq!(SearchEval::from_score(-VALUE_INF + 5), SearchEval::Mate(-5));
    }

    // straight negamax without pruning, for cross-checking alpha-beta;
    // mirrors the single-reply extension so both searches share a horizon
    fn reference(e: &mut Engine, mut depth: i32) -> i32 {
        if depth == 0 {
            return reference_quiesce(e);
        }
        e.gen(true);
        let moves: Vec<Move> = e.gen_dat[e.gen_begin[e.ply]..e.gen_end[e.ply]].to_vec();
        if moves.is_empty() {
            return -VALUE_INF + e.ply as i32;
        }
        if moves.len() == 1 && e.board.light_pawns > 1 && e.board.dark_pawns > 1 {
            depth += 1;
        }
        let mut best = -VALUE_INF;
        for mv in moves {
            e.make(mv);
            let score = -reference(e, depth - 1);
            e.unmake();
            if score > best {
                best = score;
            }
        }
        best
    }

    fn reference_quiesce(e: &mut Engine) -> i32 {
        let stand = e.evaluate();
        e.gen(false);
        let moves: Vec<Move> = e.gen_dat[e.gen_begin[e.ply]..e.gen_end[e.ply]].to_vec();
        let mut best = stand;
        for mv in moves {
            e.make(mv);
            let score = -reference_quiesce(e);
            e.unmake();
            if score > best {
                best = score;
            }
        }
        best
    }

    #[test]
    fn test_alpha_beta_matches_minimax() {
        let mut e = engine();
        clear_board(&mut e);
        e.board.cells[33] = Cell::DarkPawn;
        e.board.cells[12] = Cell::DarkPawn;
        e.board.cells[19] = Cell::DarkKing;
        e.board.cells[42] = Cell::LightPawn;
        e.board.cells[53] = Cell::LightPawn;
        e.board.cells[44] = Cell::LightKing;
        e.board.move_count = 40;
        e.board.recount();

        let mut brute = engine();
        brute.board = e.board;

        for depth in 1..=3 {
            e.tt.clear();
            e.follow_pv = false;
            e.ply = 0;
            brute.ply = 0;
            let ab = e.search(MIN_ALPHA, MAX_BETA, depth);
            let mm = reference(&mut brute, depth);
            assert_eq!(ab, mm, "depth {depth}");
        }
    }

    #[test]
    fn test_think_finds_the_capture() {
        let mut e = engine();
        clear_board(&mut e);
        // dark to move: the pawn on 12 can jump the light pawn on 21
        e.board.cells[12] = Cell::DarkPawn;
        e.board.cells[21] = Cell::LightPawn;
        e.board.cells[14] = Cell::DarkPawn;
        e.board.cells[58] = Cell::LightPawn;
        e.board.cells[56] = Cell::LightPawn;
        e.board.side = Side::Dark;
        e.board.move_count = 40;
        e.board.recount();

        let limits = ThinkLimits { target_depth: 3, ..Default::default() };
        match e.think(&limits, &SearchMonitor::silent()) {
            ThinkVerdict::Best(outcome) => {
                assert!(outcome.best.is_capture());
                let coords = (outcome.best.from(), outcome.best.to());
                assert!(coords == (12, 30) || coords == (14, 28));
                assert_eq!(outcome.depth, 3);
            }
            ThinkVerdict::ForcedLoss => panic!("not a lost position"),
        }
    }

    #[test]
    fn test_forced_loss_detected() {
        let mut e = engine();
        clear_board(&mut e);
        // dark's lone pawn must step into a king's capture either way
        e.board.cells[19] = Cell::DarkPawn;
        e.board.cells[44] = Cell::LightKing;
        e.board.cells[46] = Cell::LightKing;
        e.board.side = Side::Dark;
        e.board.move_count = 40;
        e.board.recount();

        let limits = ThinkLimits { target_depth: 1, ..Default::default() };
        assert_eq!(e.think(&limits, &SearchMonitor::silent()), ThinkVerdict::ForcedLoss);
    }

    #[test]
    fn test_monitor_receives_iterations() {
        let mut e = engine();
        let (sndr, rcvr) = crossbeam_channel::unbounded();
        let monitor = SearchMonitor {
            progress: Some(sndr),
            kill_switch: Arc::new(AtomicBool::new(false)),
        };
        let limits = ThinkLimits { target_depth: 3, ..Default::default() };
        e.board.move_count = 1;
        let verdict = e.think(&limits, &monitor);
        drop(monitor);

        let infos: Vec<SearchInfo> = rcvr.iter().collect();
        assert_eq!(infos.len(), 3);
        assert!(infos.windows(2).all(|w| w[0].depth < w[1].depth));
        assert!(matches!(verdict, ThinkVerdict::Best(_)));
    }

    #[test]
    fn test_stack_bounds_hold_through_deep_search() {
        let mut e = engine();
        e.board.move_count = 1;
        let limits = ThinkLimits { target_depth: 5, ..Default::default() };
        e.think(&limits, &SearchMonitor::silent());
        assert!(e.max_ply < HIST_STACK);
        for ply in 0..e.max_ply {
            assert!(e.gen_end[ply] <= MOVE_STACK);
        }
        e.board.validate().unwrap();
    }

    #[test]
    fn test_make_unmake_restores_through_search() {
        let mut e = engine();
        e.board.move_count = 1;
        let before = e.board;
        let hash = e.board.search_hash();
        let limits = ThinkLimits { target_depth: 4, ..Default::default() };
        e.think(&limits, &SearchMonitor::silent());
        assert_eq!(e.board, before);
        assert_eq!(e.board.search_hash(), hash);
    }
}
