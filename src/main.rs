use std::sync::Arc;
use std::time::Duration;

use makhos::{
    Board, EndgameDb, Game, GameConfig, GameOver, OpeningBook, SearchMonitor, ThinkLimits,
};

/// A couple of stock opening lines so the supplemental book loader has
/// something to chew on.
const DEMO_BOOK: &str = "\
25-21 8-11 26-22 6-9
25-22 8-12 27-23 5-9
";

#[derive(serde::Serialize)]
struct Summary<'a> {
    over: Option<GameOver>,
    half_moves: u32,
    history: &'a str,
    board: &'a Board,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut book = OpeningBook::new();
    book.load_move_lines(DEMO_BOOK);

    let config = GameConfig { seed: Some(0x4d41_4b48_4f53), ..Default::default() };
    let mut game = Game::new(config, Arc::new(book), Arc::new(EndgameDb::default()));

    // shallow and quick: this is a smoke-test game, not a serious one
    let limits = ThinkLimits {
        min_time: Duration::from_millis(0),
        max_time: Duration::from_millis(750),
        target_depth: 5,
    };

    for _ in 0..40 {
        if game.over.is_some() {
            break;
        }
        // the stand-in player always grabs the first legal move
        let mv = match game.legal_moves().first().copied() {
            Some(mv) => mv,
            None => break,
        };
        if game.play(mv).is_err() {
            break;
        }
        let report = game.engine_turn(&limits, &SearchMonitor::silent());
        if report.over.is_some() {
            break;
        }
    }

    println!("{}", game.engine.board);
    println!("moves: {}", game.history.trim_end());

    let summary = Summary {
        over: game.over,
        half_moves: game.engine.board.move_count,
        history: game.history.trim_end(),
        board: &game.engine.board,
    };
    println!("{}", serde_json::to_string(&summary).unwrap());
}
