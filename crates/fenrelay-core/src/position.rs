//! Board positions in FEN form and the normalizer that completes partial
//! reports to the canonical six-field layout.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ACTIVE_COLOR: &str = "w";
/// Unknown castling rights are reported as all-available so the engine
/// still considers castling moves.
pub const DEFAULT_CASTLING: &str = "KQkq";
pub const DEFAULT_EN_PASSANT: &str = "-";
pub const DEFAULT_HALFMOVE_CLOCK: &str = "0";
pub const DEFAULT_FULLMOVE_NUMBER: &str = "1";

const FIELD_COUNT: usize = 6;

/// Trailing-field defaults, indexed by field position.
const DEFAULTS: [&str; FIELD_COUNT] = [
    "",
    DEFAULT_ACTIVE_COLOR,
    DEFAULT_CASTLING,
    DEFAULT_EN_PASSANT,
    DEFAULT_HALFMOVE_CLOCK,
    DEFAULT_FULLMOVE_NUMBER,
];

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("position has no placement field")]
    MissingPlacement,
}

/// A canonical six-field position.
///
/// Only [`normalize`] constructs one, so every `Position` has all six
/// fields. The text form of a report that already carried six fields is
/// kept exactly as the source produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Position {
    fen: String,
    fields: [String; FIELD_COUNT],
}

impl Position {
    pub fn placement(&self) -> &str {
        &self.fields[0]
    }

    pub fn active_color(&self) -> &str {
        &self.fields[1]
    }

    pub fn castling_rights(&self) -> &str {
        &self.fields[2]
    }

    pub fn en_passant(&self) -> &str {
        &self.fields[3]
    }

    /// Parsed halfmove clock; `None` when the source sent a non-numeric token.
    pub fn halfmove_clock(&self) -> Option<u32> {
        self.fields[4].parse().ok()
    }

    /// Parsed fullmove number; `None` when the source sent a non-numeric token.
    pub fn fullmove_number(&self) -> Option<u32> {
        self.fields[5].parse().ok()
    }

    pub fn as_fen(&self) -> &str {
        &self.fen
    }

    /// The signature that decides whether a position is new: placement
    /// plus side to move. Castling, en passant and clocks are ignored.
    pub fn key(&self) -> PositionKey {
        PositionKey(format!("{}|{}", self.placement(), self.active_color()))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fen)
    }
}

impl TryFrom<String> for Position {
    type Error = NormalizeError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        normalize(&raw)
    }
}

impl From<Position> for String {
    fn from(position: Position) -> Self {
        position.fen
    }
}

/// `placement|activeColor`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PositionKey(String);

impl PositionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Complete a raw report to six fields.
///
/// Six-token input is trusted and returned unchanged. Shorter input is
/// padded in field order with the documented defaults. Tokens beyond the
/// sixth are discarded and the canonical text is rebuilt.
pub fn normalize(raw: &str) -> Result<Position, NormalizeError> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(NormalizeError::MissingPlacement);
    }

    let fields: [String; FIELD_COUNT] = std::array::from_fn(|i| {
        tokens.get(i).copied().unwrap_or(DEFAULTS[i]).to_owned()
    });

    let fen = if tokens.len() == FIELD_COUNT {
        raw.to_owned()
    } else {
        fields.join(" ")
    };

    Ok(Position { fen, fields })
}
