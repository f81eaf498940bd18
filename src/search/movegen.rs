//! Move generation over the mailbox board, with the forced-capture rules.
//!
//! Captures are compulsory: when any piece of the side to move can capture,
//! quiet moves are not generated at all. A multi-jump sequence is forced to
//! continue: while the piece that just captured can capture again, the
//! opponent's only "move" is a synthetic skip that hands the turn straight
//! back.

use crate::board::{file, Board, Cell, Side, MAILBOX, MAILBOX64, OFFSETS, PLAYABLE};
use crate::board::mov::{Move, MoveFlags};

use super::{Engine, MOVE_STACK};


#[inline]
fn capture_flags(victim: Cell) -> MoveFlags {
    if victim.is_king() {
        MoveFlags::CAPTURE | MoveFlags::CAPTURE_KING
    } else {
        MoveFlags::CAPTURE
    }
}

/// Step one mailbox offset from a 64-cell index; -1 off the board.
#[inline]
fn step(sq: i32, dir: usize) -> i32 {
    MAILBOX[(MAILBOX64[sq as usize] + OFFSETS[dir]) as usize]
}

impl Board {
    /// Whether the piece on `sq` has any capture available. Used to decide
    /// if a capture sequence must continue from its landing square.
    pub fn can_capture_from(&self, sq: usize) -> bool {
        let pc = &self.cells;
        match pc[sq] {
            Cell::LightPawn => {
                if sq <= 15 {
                    return false;
                }
                let f = file(sq);
                if f > 1 && pc[sq - 9].side() == Some(Side::Dark) && pc[sq - 18] == Cell::Empty {
                    return true;
                }
                if f < 6 && pc[sq - 7].side() == Some(Side::Dark) && pc[sq - 14] == Cell::Empty {
                    return true;
                }
                false
            }
            Cell::DarkPawn => {
                if sq >= 48 {
                    return false;
                }
                let f = file(sq);
                if f < 6 && pc[sq + 9].side() == Some(Side::Light) && pc[sq + 18] == Cell::Empty {
                    return true;
                }
                if f > 1 && pc[sq + 7].side() == Some(Side::Light) && pc[sq + 14] == Cell::Empty {
                    return true;
                }
                false
            }
            Cell::LightKing | Cell::DarkKing => {
                let xside = !self.side;
                for dir in 0..4 {
                    let mut n = sq as i32;
                    loop {
                        n = step(n, dir);
                        if n == -1 {
                            break;
                        }
                        if self.cells[n as usize] != Cell::Empty {
                            if self.cells[n as usize].side() == Some(xside) {
                                let m = step(n, dir);
                                if m != -1 && self.cells[m as usize] == Cell::Empty {
                                    return true;
                                }
                            }
                            break;
                        }
                    }
                }
                false
            }
            _ => false,
        }
    }
}

impl Engine {
    /// Generate the move list for the current ply into the shared stacks.
    /// `all` selects full generation; captures-only is used by quiescence.
    pub(crate) fn gen(&mut self, all: bool) {
        let ply = self.ply;
        let prev = if ply > 0 { self.hist[ply - 1] } else { self.last_move };
        self.gen_end[ply] = self.gen_begin[ply];

        // mid multi-capture: if the piece that just captured (without
        // promoting) can capture again, the mover may only pass
        if prev.is_capture() && !prev.is_promote() {
            let landing = if ply > 0 { self.hist[ply - 1].to() } else { self.last_move_cap };
            self.board.side = !self.board.side;
            let continues = self.board.can_capture_from(landing);
            self.board.side = !self.board.side;
            if continues {
                self.push(0, 0, MoveFlags::SKIP);
                self.gen_begin[ply + 1] = self.gen_end[ply];
                return;
            }
        }

        let mut capture = false;
        if prev.is_skip() {
            // the opponent passed: captures continue from the landing square
            let landing = if ply > 1 { self.hist[ply - 2].to() } else { self.last_move_cap };
            self.gen_captures_from(landing);
            capture = true;
        } else {
            for &sq in PLAYABLE.iter() {
                if self.board.cells[sq].side() != Some(self.board.side) {
                    continue;
                }
                if self.gen_captures_from(sq) {
                    capture = true;
                }
            }
        }

        // mandatory capture: quiet moves only exist when no capture does
        if !capture && all {
            for &sq in PLAYABLE.iter() {
                let p = self.board.cells[sq];
                if p.side() != Some(self.board.side) {
                    continue;
                }
                match p {
                    // pawns on their promotion row cannot exist; the row
                    // guards keep the offsets on the board regardless
                    Cell::LightPawn if sq > 7 => {
                        let f = file(sq);
                        if f != 0 && self.board.cells[sq - 9] == Cell::Empty {
                            self.push(sq, sq - 9, MoveFlags::empty());
                        }
                        if f != 7 && self.board.cells[sq - 7] == Cell::Empty {
                            self.push(sq, sq - 7, MoveFlags::empty());
                        }
                    }
                    Cell::DarkPawn if sq < 56 => {
                        let f = file(sq);
                        if f != 7 && self.board.cells[sq + 9] == Cell::Empty {
                            self.push(sq, sq + 9, MoveFlags::empty());
                        }
                        if f != 0 && self.board.cells[sq + 7] == Cell::Empty {
                            self.push(sq, sq + 7, MoveFlags::empty());
                        }
                    }
                    Cell::LightKing | Cell::DarkKing => {
                        for dir in 0..4 {
                            let mut n = sq as i32;
                            loop {
                                n = step(n, dir);
                                if n == -1 || self.board.cells[n as usize] != Cell::Empty {
                                    break;
                                }
                                self.push(sq, n as usize, MoveFlags::empty());
                            }
                        }
                    }
                    _ => (),
                }
            }
        }

        self.gen_begin[ply + 1] = self.gen_end[ply];
    }

    /// Push every capture available to the piece on `sq`.
    fn gen_captures_from(&mut self, sq: usize) -> bool {
        let mut capture = false;
        match self.board.cells[sq] {
            Cell::LightPawn => {
                if sq > 15 {
                    let f = file(sq);
                    let victim = self.board.cells[sq - 9];
                    if f > 1 && victim.side() == Some(Side::Dark) && self.board.cells[sq - 18] == Cell::Empty {
                        self.push(sq, sq - 18, capture_flags(victim));
                        capture = true;
                    }
                    let victim = self.board.cells[sq - 7];
                    if f < 6 && victim.side() == Some(Side::Dark) && self.board.cells[sq - 14] == Cell::Empty {
                        self.push(sq, sq - 14, capture_flags(victim));
                        capture = true;
                    }
                }
            }
            Cell::DarkPawn => {
                if sq < 48 {
                    let f = file(sq);
                    let victim = self.board.cells[sq + 9];
                    if f < 6 && victim.side() == Some(Side::Light) && self.board.cells[sq + 18] == Cell::Empty {
                        self.push(sq, sq + 18, capture_flags(victim));
                        capture = true;
                    }
                    let victim = self.board.cells[sq + 7];
                    if f > 1 && victim.side() == Some(Side::Light) && self.board.cells[sq + 14] == Cell::Empty {
                        self.push(sq, sq + 14, capture_flags(victim));
                        capture = true;
                    }
                }
            }
            Cell::LightKing | Cell::DarkKing => {
                let xside = !self.board.side;
                for dir in 0..4 {
                    let mut n = sq as i32;
                    loop {
                        n = step(n, dir);
                        if n == -1 {
                            break;
                        }
                        let blocker = self.board.cells[n as usize];
                        if blocker != Cell::Empty {
                            // one victim per ray, landing exactly one past it
                            if blocker.side() == Some(xside) {
                                let m = step(n, dir);
                                if m != -1 && self.board.cells[m as usize] == Cell::Empty {
                                    self.push(sq, m as usize, capture_flags(blocker));
                                    capture = true;
                                }
                            }
                            break;
                        }
                    }
                }
            }
            _ => (),
        }
        capture
    }

    /// Append a move, flagging promotion and seeding its ordering score from
    /// the history table plus capture and promotion bonuses.
    fn push(&mut self, from: usize, to: usize, mut flags: MoveFlags) {
        let idx = self.gen_end[self.ply];
        debug_assert!(idx < MOVE_STACK);

        match self.board.cells[from] {
            Cell::LightPawn if to <= 7 => flags |= MoveFlags::PROMOTE,
            Cell::DarkPawn if to >= 56 => flags |= MoveFlags::PROMOTE,
            _ => (),
        }

        let mv = Move::new(from, to, flags);
        let mut score = self.mov_val[(to << 6) + from];
        if mv.is_capture() {
            score += self.weights.pawn_val + self.weights.king_val;
        }
        if mv.is_promote() {
            score += self.weights.king_val;
        }

        self.gen_dat[idx] = mv;
        self.gen_score[idx] = score;
        self.gen_end[self.ply] += 1;
    }
}
