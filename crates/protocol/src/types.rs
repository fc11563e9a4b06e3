use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Processing status reported by the backend for a single file.
///
/// The backend sends plain strings. Anything outside the known set is kept
/// verbatim in [`FileStatus::Other`] and treated as "still processing".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileStatus {
    Ready,
    Duplicate,
    Failed,
    Rejected,
    Quarantine,
    Waiting,
    Other(String),
}

/// Outcome of a single status poll, after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Stored and cleared.
    Ready,
    /// Stored, but the backend has seen the same content before.
    Duplicate,
    /// Terminal failure; the backend message is shown to the user.
    Failed,
    /// Still processing; poll again.
    InProgress,
}

impl FileStatus {
    /// Returns the wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ready => "READY",
            Self::Duplicate => "DUPLICATE",
            Self::Failed => "FAILED",
            Self::Rejected => "REJECTED",
            Self::Quarantine => "QUARANTINE",
            Self::Waiting => "WAITING",
            Self::Other(s) => s,
        }
    }

    /// Classifies the status into a closed verdict.
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::Ready => Verdict::Ready,
            Self::Duplicate => Verdict::Duplicate,
            Self::Failed | Self::Rejected | Self::Quarantine => Verdict::Failed,
            Self::Waiting | Self::Other(_) => Verdict::InProgress,
        }
    }

    /// Returns `true` for statuses that mean the file is stored.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Ready | Self::Duplicate)
    }
}

impl From<&str> for FileStatus {
    fn from(s: &str) -> Self {
        match s {
            "READY" => Self::Ready,
            "DUPLICATE" => Self::Duplicate,
            "FAILED" => Self::Failed,
            "REJECTED" => Self::Rejected,
            "QUARANTINE" => Self::Quarantine,
            "WAITING" => Self::Waiting,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FileStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FileStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_parse() {
        for (raw, expected) in [
            ("READY", FileStatus::Ready),
            ("DUPLICATE", FileStatus::Duplicate),
            ("FAILED", FileStatus::Failed),
            ("REJECTED", FileStatus::Rejected),
            ("QUARANTINE", FileStatus::Quarantine),
            ("WAITING", FileStatus::Waiting),
        ] {
            let parsed: FileStatus = serde_json::from_str(&format!("\"{raw}\"")).unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(parsed.as_str(), raw);
        }
    }

    #[test]
    fn unknown_status_is_kept_verbatim() {
        let parsed: FileStatus = serde_json::from_str("\"SCANNING\"").unwrap();
        assert_eq!(parsed, FileStatus::Other("SCANNING".into()));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"SCANNING\"");
    }

    #[test]
    fn statuses_are_case_sensitive() {
        assert_eq!(
            FileStatus::from("ready"),
            FileStatus::Other("ready".into())
        );
    }

    #[test]
    fn verdicts() {
        assert_eq!(FileStatus::Ready.verdict(), Verdict::Ready);
        assert_eq!(FileStatus::Duplicate.verdict(), Verdict::Duplicate);
        assert_eq!(FileStatus::Failed.verdict(), Verdict::Failed);
        assert_eq!(FileStatus::Rejected.verdict(), Verdict::Failed);
        assert_eq!(FileStatus::Quarantine.verdict(), Verdict::Failed);
        assert_eq!(FileStatus::Waiting.verdict(), Verdict::InProgress);
        assert_eq!(
            FileStatus::Other(String::new()).verdict(),
            Verdict::InProgress
        );
    }

    #[test]
    fn settled_statuses() {
        assert!(FileStatus::Ready.is_settled());
        assert!(FileStatus::Duplicate.is_settled());
        assert!(!FileStatus::Waiting.is_settled());
        assert!(!FileStatus::Failed.is_settled());
    }
}
