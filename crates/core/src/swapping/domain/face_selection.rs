use std::fmt;
use std::str::FromStr;

use crate::detection::domain::detected_face::DetectedFace;

/// Which detected faces receive the source identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FaceSelection {
    /// Only the most confident face; ties go to the first reported.
    #[default]
    HighestConfidence,
    /// Every detected face, in detector order.
    All,
}

impl FaceSelection {
    pub fn select<'a>(&self, faces: &'a [DetectedFace]) -> Vec<&'a DetectedFace> {
        match self {
            FaceSelection::HighestConfidence => DetectedFace::most_confident(faces)
                .map(|i| vec![&faces[i]])
                .unwrap_or_default(),
            FaceSelection::All => faces.iter().collect(),
        }
    }
}

impl fmt::Display for FaceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaceSelection::HighestConfidence => "best",
            FaceSelection::All => "all",
        })
    }
}

impl FromStr for FaceSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best" | "highest-confidence" => Ok(FaceSelection::HighestConfidence),
            "all" => Ok(FaceSelection::All),
            other => Err(format!("unknown face selection '{other}', expected 'best' or 'all'")),
        }
    }
}
