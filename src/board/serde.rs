//! Serde support for [`Board`], coded as a single string so that positions
//! travel compactly to the rendering front end and survive in JSON logs.
//!
//! The form is `"<32-cell code> <L|D> <move count>"`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde::de::Error as _;

use crate::board::{Board, Side};


impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let side = match self.side {
            Side::Light => 'L',
            Side::Dark => 'D',
        };
        serializer.serialize_str(&format!("{} {} {}", self.code(), side, self.move_count))
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let mut parts = text.split_ascii_whitespace();

        let code = parts.next().ok_or_else(|| D::Error::custom("missing board code"))?;
        let side = match parts.next() {
            Some("L") => Side::Light,
            Some("D") => Side::Dark,
            _ => return Err(D::Error::custom("missing side")),
        };
        let move_count = parts
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| D::Error::custom("missing move count"))?;

        let mut board = Board::from_code(code, side).map_err(D::Error::custom)?;
        board.move_count = move_count;
        Ok(board)
    }
}
