//! Packed move representation and its text forms.

use crate::board::CELL_NUM;


bitflags::bitflags! {
    /// Flag bits of a packed move.
    pub struct MoveFlags: u32 {
        /// The move captures a piece.
        const CAPTURE = 0x0002_0000;
        /// The captured piece is a king. Only meaningful with `CAPTURE`.
        const CAPTURE_KING = 0x0001_0000;
        /// A pawn reaches its far row and becomes a king.
        const PROMOTE = 0x0004_0000;
        /// No movement: the turn passes back while a capture sequence
        /// continues.
        const SKIP = 0x0008_0000;
    }
}

const FROM_MASK: u32 = 0x0000_00ff;
const TO_SHIFT: u32 = 8;
const TO_MASK: u32 = 0x0000_ff00;
const FLAG_MASK: u32 = 0x00ff_0000;

/// A move packed into one integer: from-square in the low byte, to-square in
/// the second byte, flag bits above. Skip moves carry `from = to = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Move(pub u32);

impl Move {
    /// The synthetic pass played by the side whose opponent continues a
    /// multi-jump capture.
    pub const SKIP: Move = Move(MoveFlags::SKIP.bits);

    /// A zero move; used as the empty slot in tables and principal
    /// variations.
    pub const NONE: Move = Move(0);

    #[inline]
    pub fn new(from: usize, to: usize, flags: MoveFlags) -> Self {
        debug_assert!(from < 64 && to < 64);
        Move(from as u32 | (to as u32) << TO_SHIFT | flags.bits)
    }

    #[inline]
    pub fn from(self) -> usize {
        (self.0 & FROM_MASK) as usize
    }

    #[inline]
    pub fn to(self) -> usize {
        ((self.0 & TO_MASK) >> TO_SHIFT) as usize
    }

    #[inline]
    pub fn flags(self) -> MoveFlags {
        MoveFlags::from_bits_truncate(self.0 & FLAG_MASK)
    }

    #[inline]
    pub fn is_capture(self) -> bool {
        self.0 & MoveFlags::CAPTURE.bits != 0
    }

    #[inline]
    pub fn is_promote(self) -> bool {
        self.0 & MoveFlags::PROMOTE.bits != 0
    }

    #[inline]
    pub fn is_skip(self) -> bool {
        self.0 & MoveFlags::SKIP.bits != 0
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The move as the front end consumes it: 1-based playable-cell numbers
    /// plus the capture and promotion markers. Skips carry zero cells.
    pub fn coords(self) -> MoveCoords {
        if self.is_skip() {
            return MoveCoords { from: 0, to: 0, capture: false, promote: false };
        }
        MoveCoords {
            from: CELL_NUM[self.from()] as u8,
            to: CELL_NUM[self.to()] as u8,
            capture: self.is_capture(),
            promote: self.is_promote(),
        }
    }

    /// Render in game-log notation: `"25-18 "` for a quiet move,
    /// `"25x18 "` for a capture, `". "` for a skip.
    pub fn to_notation(self) -> String {
        if self.is_skip() {
            return ". ".to_owned();
        }
        let sym = if self.is_capture() { 'x' } else { '-' };
        format!("{}{}{} ", CELL_NUM[self.from()], sym, CELL_NUM[self.to()])
    }
}

/// A chosen move expressed in playable-cell numbers (1..=32), as produced
/// for the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MoveCoords {
    pub from: u8,
    pub to: u8,
    pub capture: bool,
    pub promote: bool,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_accessors() {
        let mv = Move::new(42, 33, MoveFlags::CAPTURE | MoveFlags::CAPTURE_KING);
        assert_eq!(mv.from(), 42);
        assert_eq!(mv.to(), 33);
        assert!(mv.is_capture());
        assert!(!mv.is_promote());
        assert!(!mv.is_skip());
        assert_eq!(mv.flags(), MoveFlags::CAPTURE | MoveFlags::CAPTURE_KING);
    }

    #[test]
    fn test_skip_shape() {
        assert_eq!(Move::SKIP.from(), 0);
        assert_eq!(Move::SKIP.to(), 0);
        assert!(Move::SKIP.is_skip());
        assert!(!Move::SKIP.is_capture());
    }

    #[test]
    fn test_notation() {
        // cell 56 prints as 29, cell 42 as 22 (1-based playable numbering)
        assert_eq!(Move::new(56, 42, MoveFlags::empty()).to_notation(), "29-22 ");
        assert_eq!(Move::new(56, 42, MoveFlags::CAPTURE).to_notation(), "29x22 ");
        assert_eq!(Move::SKIP.to_notation(), ". ");
    }

    #[test]
    fn test_coords() {
        let c = Move::new(49, 40, MoveFlags::PROMOTE).coords();
        assert_eq!((c.from, c.to), (25, 21));
        assert!(c.promote && !c.capture);
    }
}
