//! Messages exchanged with the analysis engine.

use serde::{Deserialize, Serialize};

use crate::errors::RelayError;
use crate::ids::{RequestId, SessionId};
use crate::position::Position;

pub const DEFAULT_SEARCH_DEPTH: u32 = 16;
pub const MIN_SEARCH_DEPTH: u32 = 1;
pub const MAX_SEARCH_DEPTH: u32 = 30;

/// Engine-bound frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EngineRequest {
    Analyze { position: String, depth: u32 },
}

/// A request waiting to be (or being) transmitted. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundRequest {
    id: RequestId,
    session_id: SessionId,
    position: Position,
    search_depth: u32,
}

impl OutboundRequest {
    /// The depth is clamped to the range the engine accepts.
    pub fn new(session_id: SessionId, position: Position, search_depth: u32) -> Self {
        Self {
            id: RequestId::new(),
            session_id,
            position,
            search_depth: search_depth.clamp(MIN_SEARCH_DEPTH, MAX_SEARCH_DEPTH),
        }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn search_depth(&self) -> u32 {
        self.search_depth
    }

    pub fn to_wire(&self) -> EngineRequest {
        EngineRequest::Analyze {
            position: self.position.as_fen().to_owned(),
            depth: self.search_depth,
        }
    }

    /// Serialized frame text.
    pub fn encode(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(&self.to_wire())?)
    }
}

/// Engine evaluation. Serializes as `{"centipawns": n}` or `{"mateInN": n}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Score {
    Centipawns(i32),
    MateInN(i32),
}

/// A structurally valid engine reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_move: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pv: Vec<String>,
    /// Position the engine analysed, when it echoes it back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EngineReply {
    /// Parse an inbound frame. Accepts both the current field names and the
    /// older `bestmove` / `fen` / `{cp, mate}` spelling.
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        let raw: RawReply = serde_json::from_str(text)?;
        if raw.success.is_none()
            && raw.best_move.is_none()
            && raw.score.is_none()
            && raw.error.is_none()
        {
            return Err(RelayError::MalformedInput(
                "reply carries no result fields".into(),
            ));
        }

        let success = raw
            .success
            .unwrap_or(raw.best_move.is_some() && raw.error.is_none());

        Ok(Self {
            success,
            best_move: raw.best_move,
            score: raw.score.and_then(RawScore::into_score),
            pv: raw.pv.unwrap_or_default(),
            position: raw.position,
            error: raw.error,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReply {
    success: Option<bool>,
    #[serde(alias = "bestmove")]
    best_move: Option<String>,
    score: Option<RawScore>,
    pv: Option<Vec<String>>,
    #[serde(alias = "fen")]
    position: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScore {
    #[serde(alias = "cp")]
    centipawns: Option<i32>,
    #[serde(alias = "mate")]
    mate_in_n: Option<i32>,
}

impl RawScore {
    fn into_score(self) -> Option<Score> {
        match (self.mate_in_n, self.centipawns) {
            (Some(n), _) => Some(Score::MateInN(n)),
            (None, Some(cp)) => Some(Score::Centipawns(cp)),
            (None, None) => None,
        }
    }
}
