//! Error types shared by the geometry engine and the input decoder.

/// Malformed ring topology found while clipping or splitting a polygon.
///
/// Always recoverable: callers retry with a different start vertex or drop
/// the offending polygon.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolygonError {
    #[error("ring {ring} does not close into a cycle")]
    BrokenRing { ring: char },
    #[error("wedge classification gave an impossible pair ({a:?}, {b:?}) at {at}")]
    ImpossibleWedge {
        a: crate::polygon::Wedge,
        b: crate::polygon::Wedge,
        at: crate::geometry::Point,
    },
    #[error("topology walk did not return to its start after {steps} steps")]
    WalkDidNotClose { steps: usize },
    #[error("topology walk reached a vertex with no onward link on ring {ring}")]
    DeadEnd { ring: char },
    #[error("clipped fragment is not clockwise")]
    NotClockwise,
    #[error("self-intersection split did not converge after {pieces} pieces")]
    SplitDidNotConverge { pieces: usize },
    #[error("polygon has {points} points, at least 3 are needed")]
    Degenerate { points: usize },
}

/// A single input polygon could not be decoded. The polygon is skipped and
/// loading continues.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("entry {index}: missing field '{field}'")]
    MissingField { index: usize, field: &'static str },
    #[error("entry {index} ({label}): malformed coordinate at position {position}")]
    BadCoordinate {
        index: usize,
        label: String,
        position: usize,
    },
    #[error("entry {index} ({label}): coordinate ({lat}, {lng}) is out of range")]
    OutOfRange {
        index: usize,
        label: String,
        lat: f64,
        lng: f64,
    },
    #[error("entry {index} ({label}): only {points} distinct points")]
    TooFewPoints {
        index: usize,
        label: String,
        points: usize,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An exported tree that does not describe a well-formed compact tree.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("procedure {procedure} ends in the middle of a node")]
    Truncated { procedure: usize },
    #[error("procedure {procedure} has {extra} nodes after its tree")]
    Trailing { procedure: usize, extra: usize },
    #[error("procedure {procedure} refers to missing {what} {index}")]
    BadReference {
        procedure: usize,
        what: &'static str,
        index: usize,
    },
    #[error("export holds no procedures")]
    Empty,
}
