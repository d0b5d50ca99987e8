use std::fmt;

/// Lifecycle of the model set. Transitions only move forward:
/// `Unloaded -> Loading -> Ready | Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Ready,
    /// Terminal; loading is never retried automatically.
    Failed,
}

impl ModelStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, ModelStatus::Ready | ModelStatus::Failed)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            ModelStatus::Unloaded => 0,
            ModelStatus::Loading => 1,
            ModelStatus::Ready => 2,
            ModelStatus::Failed => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ModelStatus::Loading,
            2 => ModelStatus::Ready,
            3 => ModelStatus::Failed,
            _ => ModelStatus::Unloaded,
        }
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelStatus::Unloaded => "unloaded",
            ModelStatus::Loading => "loading",
            ModelStatus::Ready => "ready",
            ModelStatus::Failed => "failed",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_encoding_round_trips_every_state() {
        for status in [
            ModelStatus::Unloaded,
            ModelStatus::Loading,
            ModelStatus::Ready,
            ModelStatus::Failed,
        ] {
            assert_eq!(ModelStatus::from_u8(status.as_u8()), status);
        }
    }

    #[test]
    fn test_only_terminal_states_are_settled() {
        assert!(!ModelStatus::Unloaded.is_settled());
        assert!(!ModelStatus::Loading.is_settled());
        assert!(ModelStatus::Ready.is_settled());
        assert!(ModelStatus::Failed.is_settled());
    }
}
