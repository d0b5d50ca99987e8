use std::fmt;

use crate::detection::domain::embedding::Embedding;

/// Stable identifier of a registered source face. Never reused within a
/// registry, even after removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceFaceId(u64);

impl SourceFaceId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceFaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Small RGB preview of the source face for the control surface.
#[derive(Clone, Debug, PartialEq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// A registered identity: built completely before it is published, then
/// never mutated.
#[derive(Clone, Debug)]
pub struct SourceFace {
    pub id: SourceFaceId,
    pub name: String,
    pub thumbnail: Thumbnail,
    pub embedding: Embedding,
}
