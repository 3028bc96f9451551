//! Meeting store record types.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a meeting record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    InProgress,
    Completed,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A workspace groups folders of meetings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

/// A folder groups the meetings of one project or topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: i64,
    pub workspace_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

/// A meeting record. Recording mutates only `status` and `ended_at`;
/// `duration_seconds` is derived by the store when the meeting completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: i64,
    pub folder_id: i64,
    pub title: String,
    pub status: String,
    pub summary: Option<String>,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_seconds: Option<i64>,
    pub created_at: String,
}

/// One transcript segment of a meeting, ordered by creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: i64,
    pub meeting_id: i64,
    pub speaker: Option<String>,
    pub text: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meeting_status_as_str() {
        assert_eq!(MeetingStatus::InProgress.as_str(), "in_progress");
        assert_eq!(MeetingStatus::Completed.as_str(), "completed");
    }

    #[test]
    fn test_meeting_status_parse() {
        assert_eq!(
            MeetingStatus::parse("in_progress"),
            Some(MeetingStatus::InProgress)
        );
        assert_eq!(
            MeetingStatus::parse("completed"),
            Some(MeetingStatus::Completed)
        );
        assert_eq!(MeetingStatus::parse("recording"), None);
    }

    #[test]
    fn test_meeting_status_serialization() {
        let json = serde_json::to_string(&MeetingStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let parsed: MeetingStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, MeetingStatus::Completed);
    }
}
