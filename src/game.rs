//! Game driver: turn orchestration, forced openings, book consultation,
//! draw accounting, and terminal detection. The engine always owns the
//! dark pieces; the light side is driven by the caller.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;

use crate::board::{Cell, Side};
use crate::board::mov::{Move, MoveCoords};
use crate::book::OpeningBook;
use crate::egdb::EndgameDb;
use crate::search::time::ThinkLimits;
use crate::search::{Engine, SearchInfo, SearchMonitor, ThinkVerdict};


/// Quiet-king half-moves below this never count as a draw.
pub const DRAW_MIN: u32 = 6;
/// Quiet-king half-moves beyond this always draw.
pub const DRAW_MAX: u32 = 25;
/// Probability of consulting the opening book when it applies.
const BOOK_CHANCE: f64 = 0.8;
/// Top difficulty level.
pub const MAX_LEVEL: u8 = 2;


#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GameConfig {
    /// Difficulty level, 0..=2. Feeds the evaluator's draw bias and the
    /// search target depth.
    pub level: u8,
    /// Disable all randomness (weight perturbation, book draws, forced
    /// openings) for reproducible play.
    pub deterministic: bool,
    /// The engine opens the game with its fixed first move.
    pub comp_first: bool,
    /// Seed for the game's random picks; fresh entropy when absent.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig { level: 1, deterministic: false, comp_first: false, seed: None }
    }
}

/// Result for the human (light) side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Outcome {
    PlayerWin,
    PlayerLoss,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OverReason {
    /// The losing side had no legal move.
    NoMoves,
    /// The search proved the engine's position lost.
    ForcedLoss,
    /// The no-progress counter ran out.
    DrawCounter,
    /// One king each, with the long-diagonal corner open.
    KingsCornerDraw,
    /// King-shuffling with one king and one pawn each.
    KingShuffle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GameOver {
    pub outcome: Outcome,
    pub reason: OverReason,
}

/// Where an engine move came from.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub enum MoveOrigin {
    /// The only legal move; played unsearched.
    OnlyMove,
    /// The fixed opening table.
    Opening,
    /// The opening book.
    Book,
    Search { depth: i32, score: i32 },
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct PlayedMove {
    pub mv: Move,
    pub coords: MoveCoords,
    pub origin: MoveOrigin,
}

/// Everything that happened during one engine turn: the engine's move, any
/// forced passes and capture continuations, and a terminal result if the
/// game ended.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TurnReport {
    pub played: Vec<PlayedMove>,
    pub over: Option<GameOver>,
}

/// Session-level difficulty ladder: two straight wins move the player up a
/// level, two straight losses move them down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LevelLadder {
    pub level: u8,
    win_streak: u8,
    lose_streak: u8,
}

impl LevelLadder {
    pub fn new(level: u8) -> Self {
        LevelLadder { level: level.min(MAX_LEVEL), win_streak: 0, lose_streak: 0 }
    }

    pub fn update(&mut self, outcome: Outcome) {
        let prev = self.level;
        match outcome {
            Outcome::PlayerWin => {
                self.win_streak += 1;
                self.lose_streak = 0;
            }
            Outcome::PlayerLoss => {
                self.win_streak = 0;
                self.lose_streak += 1;
            }
            Outcome::Draw => {
                self.win_streak = 0;
                self.lose_streak = 0;
            }
        }
        if outcome == Outcome::PlayerWin && prev == 0 {
            self.level = 1;
            self.win_streak = 0;
            self.lose_streak = 0;
        } else {
            if self.win_streak == 2 {
                self.level += 1;
                self.win_streak = 0;
            }
            if self.lose_streak == 2 {
                self.level = self.level.saturating_sub(1);
                self.lose_streak = 0;
            }
        }
        self.level = self.level.min(MAX_LEVEL);
    }

    /// Think limits for the current level.
    pub fn limits(&self) -> ThinkLimits {
        ThinkLimits::for_level(self.level)
    }
}


pub struct Game {
    pub engine: Engine,
    pub book: Arc<OpeningBook>,
    pub config: GameConfig,

    /// Consecutive no-progress (quiet king) half-moves.
    pub draw_count: u32,
    /// Game log in move notation, e.g. `"22-18 11x18 . 18x25 "`.
    pub history: String,
    pub over: Option<GameOver>,

    rng: fastrand::Rng,
}

impl Game {
    pub fn new(config: GameConfig, book: Arc<OpeningBook>, egdb: Arc<EndgameDb>) -> Game {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        let mut engine = Engine::new(egdb, config.level, config.deterministic);
        engine.new_game();
        if !config.deterministic {
            engine.weights.randomize(&rng);
        }

        // when the engine opens, its fixed first move is placed directly;
        // move counting starts with the reply
        if config.comp_first {
            engine.board.cells[21] = engine.board.cells[14];
            engine.board.cells[14] = Cell::Empty;
            engine.board.recount();
        }
        engine.root_gen();

        Game {
            engine,
            book,
            config,
            draw_count: 0,
            history: String::new(),
            over: None,
            rng,
        }
    }

    /// The player's legal moves for the current position.
    pub fn legal_moves(&self) -> &[Move] {
        self.engine.root_moves()
    }

    /// Look up a legal move by its source and target cell. `None` when the
    /// pair is not playable this turn; the caller decides how to re-prompt.
    pub fn find_move(&self, from: usize, to: usize) -> Option<Move> {
        self.legal_moves()
            .iter()
            .copied()
            .find(|m| !m.is_skip() && m.from() == from && m.to() == to)
    }

    /// Play the player's move. Rejects anything not in the legal list.
    pub fn play(&mut self, mv: Move) -> Result<(), ()> {
        if self.over.is_some() || self.engine.board.side != Side::Light {
            return Err(());
        }
        if !self.legal_moves().contains(&mv) {
            return Err(());
        }

        self.engine.board.make(mv);
        self.engine.last_move = mv;
        self.engine.last_move_cap = mv.to();
        self.history.push_str(&mv.to_notation());

        if mv.flags().is_empty() && self.engine.board.cells[mv.to()] == Cell::LightKing {
            self.draw_count += 1;
        } else {
            self.draw_count = 0;
        }
        Ok(())
    }

    /// Run the engine's whole turn: pick a move (only move, forced opening,
    /// book, or search), play it, continue through any forced passes, and
    /// leave the board on the player's move (or finished).
    pub fn engine_turn(&mut self, limits: &ThinkLimits, monitor: &SearchMonitor) -> TurnReport {
        let mut report = TurnReport { played: Vec::new(), over: self.over };
        if self.over.is_some() {
            return report;
        }
        debug_assert!(self.engine.board.side == Side::Dark);

        loop {
            // the engine's half-move
            self.engine.board.move_count += 1;
            self.engine.root_gen();
            let count = self.engine.root_moves().len();
            if count == 0 {
                self.finish(Outcome::PlayerWin, OverReason::NoMoves, &mut report);
                return report;
            }

            let mut chosen = None;
            if count == 1 {
                chosen = Some((self.engine.root_moves()[0], MoveOrigin::OnlyMove));
            }
            if chosen.is_none() && self.engine.board.move_count < 4 {
                if let Some(mv) = self.forced_opening() {
                    chosen = Some((mv, MoveOrigin::Opening));
                }
            }
            if chosen.is_none()
                && self.engine.board.move_count > 6
                && !self.book.is_empty()
                && self.rng.f64() < BOOK_CHANCE
            {
                if let Some(mv) = self.book_move() {
                    chosen = Some((mv, MoveOrigin::Book));
                }
            }

            let (mv, origin) = match chosen {
                Some(pick) => pick,
                None => match self.engine.think(limits, monitor) {
                    ThinkVerdict::ForcedLoss => {
                        self.finish(Outcome::PlayerWin, OverReason::ForcedLoss, &mut report);
                        return report;
                    }
                    ThinkVerdict::Best(outcome) => (
                        outcome.best,
                        MoveOrigin::Search { depth: outcome.depth, score: outcome.score },
                    ),
                },
            };

            self.engine.board.make(mv);
            self.engine.last_move = mv;
            if !mv.is_skip() {
                self.engine.last_move_cap = mv.to();
            }
            self.history.push_str(&mv.to_notation());
            report.played.push(PlayedMove { mv, coords: mv.coords(), origin });

            if mv.flags().is_empty() && self.engine.board.cells[mv.to()] == Cell::DarkKing {
                self.draw_count += 1;
                if let Some(reason) = self.check_draw() {
                    self.finish(Outcome::Draw, reason, &mut report);
                    return report;
                }
            } else {
                self.draw_count = 0;
            }

            // advance to the player's half-move
            self.engine.board.move_count += 1;
            self.engine.root_gen();
            let moves = self.engine.root_moves();
            if moves.first().map_or(false, |m| m.is_skip()) {
                // the player passes while the engine's capture sequence
                // runs on; not part of the logged notation
                let skip = moves[0];
                self.engine.board.make(skip);
                self.engine.last_move = skip;
                report.played.push(PlayedMove {
                    mv: skip,
                    coords: skip.coords(),
                    origin: MoveOrigin::OnlyMove,
                });
                continue;
            }
            if moves.is_empty() {
                self.finish(Outcome::PlayerLoss, OverReason::NoMoves, &mut report);
                return report;
            }
            return report;
        }
    }

    /// Run the engine turn on a worker thread, leaving the host responsive.
    pub fn engine_turn_background(mut self, limits: ThinkLimits) -> TurnHandle {
        let (sndr, rcvr) = crossbeam_channel::unbounded();
        let kill_switch = Arc::new(AtomicBool::new(false));
        let monitor = SearchMonitor { progress: Some(sndr), kill_switch: kill_switch.clone() };

        let handle = std::thread::spawn(move || {
            let report = self.engine_turn(&limits, &monitor);
            (self, report)
        });

        TurnHandle { progress: rcvr, kill_switch, handle }
    }

    /// The fixed opening moves the engine plays for its first two turns.
    fn forced_opening(&self) -> Option<Move> {
        if self.config.deterministic {
            return None;
        }
        let (from, to) = if self.config.comp_first {
            match self.engine.board.move_count {
                1 => (21, 28),
                3 => (7, 14),
                _ => return None,
            }
        } else {
            match self.engine.board.move_count {
                1 => (14, 21),
                3 => (7, 14),
                _ => return None,
            }
        };
        self.find_root_move(from, to)
    }

    /// A book move, resolved against the generated list so it carries the
    /// right capture and promotion flags (book records store none).
    fn book_move(&mut self) -> Option<Move> {
        let pick = self.book.probe(&self.engine.board, &self.rng)?;
        self.find_root_move(pick.from(), pick.to())
    }

    fn find_root_move(&self, from: usize, to: usize) -> Option<Move> {
        self.engine
            .root_moves()
            .iter()
            .copied()
            .find(|m| !m.is_skip() && m.from() == from && m.to() == to)
    }

    /// No-progress draw detection. One king each draws outright once the
    /// long-diagonal corner opens; otherwise the quiet-king counter rules,
    /// with king-and-pawn shuffles drawing early.
    pub fn check_draw(&self) -> Option<OverReason> {
        let code = self.engine.board.piece_code();
        let cells = &self.engine.board.cells;
        if code == 1010 && (cells[7] == Cell::Empty || cells[48] == Cell::Empty) {
            return Some(OverReason::KingsCornerDraw);
        }
        if self.draw_count < DRAW_MIN {
            return None;
        }
        if self.draw_count > DRAW_MAX {
            return Some(OverReason::DrawCounter);
        }
        if code == 1111 {
            return Some(OverReason::KingShuffle);
        }
        None
    }

    fn finish(&mut self, outcome: Outcome, reason: OverReason, report: &mut TurnReport) {
        let over = GameOver { outcome, reason };
        tracing::info!(?outcome, ?reason, history = %self.history.trim_end(), "game over");
        self.over = Some(over);
        report.over = Some(over);
    }
}

/// Handle to an engine turn running on its own thread. Per-depth search
/// info streams through `progress`; setting `kill_switch` stops the search
/// at the next iteration boundary.
pub struct TurnHandle {
    pub progress: Receiver<SearchInfo>,
    pub kill_switch: Arc<AtomicBool>,
    pub handle: JoinHandle<(Game, TurnReport)>,
}
