pub mod board;
pub mod book;
pub mod egdb;
pub mod game;
pub mod search;

pub use board::{Board, Cell, Side};
pub use board::mov::{Move, MoveFlags, MoveCoords};
pub use book::OpeningBook;
pub use egdb::{EndgameDb, Verdict};
pub use game::{Game, GameConfig, GameOver, OverReason, Outcome};
pub use search::{Engine, SearchEval, SearchInfo, SearchMonitor, ThinkVerdict};
pub use search::time::ThinkLimits;


/// Evaluates a boolean expression:
/// * Where `true` returns `Ok(())`
/// * Where `false` returns `Err(&'static str)` describing the failure.
///
/// In practice, it's useful as a recoverable `assert!` alternative.
#[macro_export]
macro_rules! as_result {
    ($cond:expr) => {
        bool::then_some($cond, ()).ok_or(
            concat!(
                "assertion failed: `",
                stringify!($cond),
                "`"
            )
        )
    };
}


/// Errors raised by the text loaders (board codes, book records, endgame
/// records, move notation). Probe misses are not errors; they are sentinel
/// returns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("bad board code: {0}")]
    BadBoardCode(&'static str),
    #[error("bad book record: {0}")]
    BadBookRecord(&'static str),
    #[error("bad endgame record: {0}")]
    BadEndgameRecord(&'static str),
    #[error("bad move notation: {0}")]
    BadMoveNotation(&'static str),
}
