//! Opening book: a multimap from compact board encodings to the moves
//! played there, with weighted random selection (duplicates accumulate as
//! popularity) and side-mirrored canonical lookup.

use std::collections::HashMap;

use crate::board::{Board, Cell, Side, PLAYABLE};
use crate::board::mov::{Move, MoveFlags};
use crate::ParseError;


/// 3-bit piece codes for the compact encoding, indexed by cell code, in the
/// light-to-move canonical order.
const ENC_LIGHT: [u64; 4] = [4, 5, 6, 7];
/// The same codes with colours swapped, for the dark-to-move traversal.
const ENC_DARK: [u64; 4] = [5, 4, 7, 6];

/// Encode the position as one 64-bit key: each playable square contributes
/// a 1-bit empty marker or a 3-bit piece code, accumulated most-significant
/// first. Dark-to-move positions traverse the squares in reverse with the
/// colour-swapped codes, so both sides share light's canonical key space.
pub fn encode_board(board: &Board) -> u64 {
    let mut key = 0u64;
    if board.side == Side::Light {
        for &sq in PLAYABLE.iter() {
            key = pack_cell(key, board.cells[sq], &ENC_LIGHT);
        }
    } else {
        for &sq in PLAYABLE.iter().rev() {
            key = pack_cell(key, board.cells[sq], &ENC_DARK);
        }
    }
    key
}

#[inline]
fn pack_cell(key: u64, cell: Cell, enc: &[u64; 4]) -> u64 {
    if cell.is_piece() {
        key << 3 | enc[cell as usize]
    } else {
        key << 1
    }
}


#[derive(Debug, Default)]
pub struct OpeningBook {
    map: HashMap<u64, Vec<Move>>,
    /// Total records held, duplicates included.
    pub records: usize,
}

impl OpeningBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Record a move for a canonical position key. Repeated moves stack up
    /// and weight the random draw accordingly.
    pub fn insert(&mut self, key: u64, mv: Move) {
        self.map.entry(key).or_default().push(mv);
        self.records += 1;
    }

    /// Candidate moves recorded for the canonical key of `board`.
    pub fn candidates(&self, board: &Board) -> Option<&[Move]> {
        self.map.get(&encode_board(board)).map(Vec::as_slice)
    }

    /// Draw uniformly among the recorded moves for this position, then
    /// un-mirror the move when dark is to move (stored moves are from the
    /// light-to-move perspective).
    pub fn probe(&self, board: &Board, rng: &fastrand::Rng) -> Option<Move> {
        let list = self.map.get(&encode_board(board))?;
        let mv = list[rng.usize(0..list.len())];
        if board.side == Side::Dark {
            Some(Move::new(63 - mv.from(), 63 - mv.to(), mv.flags()))
        } else {
            Some(mv)
        }
    }

    /// Bulk-load precomputed records, one per line: 16 hex digits of board
    /// key followed by 5 hex digits of packed move. Short or malformed
    /// lines are dropped.
    pub fn load_records(&mut self, text: &str) -> usize {
        let mut loaded = 0;
        for line in text.lines() {
            let line = line.trim();
            if line.len() < 21 || !line.is_ascii() {
                continue;
            }
            let key = match u64::from_str_radix(&line[..16], 16) {
                Ok(key) => key,
                Err(_) => continue,
            };
            let mv = match u32::from_str_radix(&line[16..21], 16) {
                Ok(mv) => mv,
                Err(_) => continue,
            };
            self.insert(key, Move(mv));
            loaded += 1;
        }
        tracing::debug!(loaded, total = self.records, "opening book records loaded");
        loaded
    }

    /// Import one human-readable game line (e.g. `"22-17 11x18 ..."`,
    /// cells numbered 1..=32), replaying it over a fresh board and
    /// recording each position's played move along the way. Multi-jump
    /// tokens split into their hops with a pass between (`25x18x11`
    /// becomes `25x18 . 18x11`).
    pub fn import_move_line(&mut self, line: &str) -> Result<usize, ParseError> {
        let mut board = Board::default();
        let mut added = 0;
        for token in normalize_jumps(line) {
            if token == "." {
                board.side = !board.side;
                continue;
            }
            let key = encode_board(&board);
            let mv = pack_token(&board, &token)?;
            self.insert(key, mv);
            added += 1;
            apply_token(&mut board, &token)?;
        }
        Ok(added)
    }

    /// Import a whole supplemental book: one game line per row, `#`
    /// comments and blanks skipped. Bad lines are counted and dropped.
    pub fn load_move_lines(&mut self, text: &str) -> LoadStats {
        let mut stats = LoadStats::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match self.import_move_line(line) {
                Ok(added) => stats.inserted += added,
                Err(_) => stats.rejected += 1,
            }
        }
        tracing::debug!(
            inserted = stats.inserted,
            rejected = stats.rejected,
            "supplemental book lines loaded"
        );
        stats
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub inserted: usize,
    pub rejected: usize,
}

fn normalize_jumps(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    for token in line.split_whitespace() {
        let hops: Vec<&str> = token.split('x').collect();
        if hops.len() > 2 {
            for (i, pair) in hops.windows(2).enumerate() {
                if i > 0 {
                    out.push(".".to_owned());
                }
                out.push(format!("{}x{}", pair[0], pair[1]));
            }
        } else {
            out.push(token.to_owned());
        }
    }
    out
}

/// Split a `"25-18"` / `"25x18"` token into its two cell numbers.
fn split_token(token: &str) -> Result<(usize, usize, bool), ParseError> {
    let capture = token.contains('x');
    let mut parts = token.split(if capture { 'x' } else { '-' });
    let from = parts
        .next()
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or(ParseError::BadMoveNotation("missing source cell"))?;
    let to = parts
        .next()
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or(ParseError::BadMoveNotation("missing target cell"))?;
    if !(1..=32).contains(&from) || !(1..=32).contains(&to) {
        return Err(ParseError::BadMoveNotation("cell number out of range"));
    }
    Ok((from, to, capture))
}

/// Pack a replayed token as a canonical (light-perspective) book move.
fn pack_token(board: &Board, token: &str) -> Result<Move, ParseError> {
    let (mut from, mut to, _) = split_token(token)?;
    if board.side != Side::Light {
        from = 33 - from;
        to = 33 - to;
    }
    Ok(Move::new(PLAYABLE[from - 1], PLAYABLE[to - 1], MoveFlags::empty()))
}

/// Apply a replayed token to the scratch board and pass the turn.
fn apply_token(board: &mut Board, token: &str) -> Result<(), ParseError> {
    let (from, to, capture) = split_token(token)?;
    let from = PLAYABLE[from - 1];
    let to = PLAYABLE[to - 1];

    let piece = board.cells[from];
    if piece != Cell::Empty {
        board.cells[to] = piece;
        board.cells[from] = Cell::Empty;
        if piece == Cell::LightPawn && to < 8 {
            board.cells[to] = Cell::LightKing;
        }
        if piece == Cell::DarkPawn && to >= 56 {
            board.cells[to] = Cell::DarkKing;
        }
        if capture {
            let victim = Board::capture_cell(Move::new(from, to, MoveFlags::CAPTURE));
            if board.cells[victim] != Cell::Empty {
                board.cells[victim] = Cell::Empty;
            }
        }
    }
    board.side = !board.side;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_start_position_both_sides() {
        let mut board = Board::default();
        let light_key = encode_board(&board);
        board.side = Side::Dark;
        let dark_key = encode_board(&board);
        // the starting position is symmetric: both sides canonicalize to
        // the same key
        assert_eq!(light_key, dark_key);

        // 16 pieces and 16 empties pack to exactly 64 bits; dark pawns
        // (code 5) lead the traversal
        assert_eq!(light_key >> 61, 0b101);
    }

    #[test]
    fn test_encode_distinguishes_positions() {
        let board = Board::default();
        let mut other = board;
        other.make(Move::new(42, 33, MoveFlags::empty()));
        other.side = Side::Light;
        assert_ne!(encode_board(&board), encode_board(&other));
    }

    #[test]
    fn test_probe_mirrors_for_dark() {
        let mut book = OpeningBook::new();
        let mut board = Board::default();
        board.side = Side::Dark;

        // record light's canonical reply 42->33 under dark's key
        book.insert(encode_board(&board), Move::new(42, 33, MoveFlags::empty()));

        let rng = fastrand::Rng::with_seed(7);
        let mv = book.probe(&board, &rng).unwrap();
        assert_eq!((mv.from(), mv.to()), (63 - 42, 63 - 33));

        board.side = Side::Light;
        let mv = book.probe(&board, &rng).unwrap();
        assert_eq!((mv.from(), mv.to()), (42, 33));
    }

    #[test]
    fn test_load_records() {
        let mut book = OpeningBook::new();
        let board = Board::default();
        let key = encode_board(&board);
        let mv = Move::new(42, 33, MoveFlags::empty());
        let text = format!("{:016x}{:05x}\nshort\n", key, mv.0);
        assert_eq!(book.load_records(&text), 1);

        let rng = fastrand::Rng::with_seed(1);
        assert_eq!(book.probe(&board, &rng), Some(mv));
    }

    #[test]
    fn test_import_move_line_records_both_sides() {
        let mut book = OpeningBook::new();
        // absolute cell numbers: light opens 22-17, dark answers 7-11
        let added = book.import_move_line("22-17 7-11").unwrap();
        assert_eq!(added, 2);

        let board = Board::default();
        let rng = fastrand::Rng::with_seed(3);
        let mv = book.probe(&board, &rng).unwrap();
        assert_eq!((mv.from(), mv.to()), (PLAYABLE[21], PLAYABLE[16]));
    }

    #[test]
    fn test_multi_jump_normalization() {
        let tokens = normalize_jumps("25x18x11 9-13");
        assert_eq!(tokens, vec!["25x18", ".", "18x11", "9-13"]);
    }

    #[test]
    fn test_import_rejects_garbage() {
        let mut book = OpeningBook::new();
        assert!(book.import_move_line("40-50").is_err());
        assert!(book.import_move_line("nonsense").is_err());
        let stats = book.load_move_lines("22-17\nbogus\n# note\n");
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.rejected, 1);
    }
}
