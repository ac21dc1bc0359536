use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Booking {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignee {
    pub name: String,
}

/// One task as delivered by the task source. Every field except the booking
/// id may be missing; the grid substitutes defaults when rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskState {
    pub booking: Booking,
    pub category: Option<String>,
    pub assigned_to: Option<Assignee>,
    pub unix_millis_start_time: Option<i64>,
    pub unix_millis_finish_time: Option<i64>,
    // Kept as the raw string so statuses we do not know yet survive verbatim.
    pub status: Option<String>,
}

impl TaskState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            booking: Booking { id: id.into() },
            ..Default::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.booking.id
    }

    pub fn known_status(&self) -> Option<TaskStatus> {
        self.status.as_deref().and_then(TaskStatus::from_wire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Uninitialized,
    Blocked,
    Error,
    Failed,
    Queued,
    Standby,
    Underway,
    Delayed,
    Skipped,
    Canceled,
    Killed,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 12] = [
        TaskStatus::Uninitialized,
        TaskStatus::Blocked,
        TaskStatus::Error,
        TaskStatus::Failed,
        TaskStatus::Queued,
        TaskStatus::Standby,
        TaskStatus::Underway,
        TaskStatus::Delayed,
        TaskStatus::Skipped,
        TaskStatus::Canceled,
        TaskStatus::Killed,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Uninitialized => "uninitialized",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Error => "error",
            TaskStatus::Failed => "failed",
            TaskStatus::Queued => "queued",
            TaskStatus::Standby => "standby",
            TaskStatus::Underway => "underway",
            TaskStatus::Delayed => "delayed",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Canceled => "canceled",
            TaskStatus::Killed => "killed",
            TaskStatus::Completed => "completed",
        }
    }

    /// Exact match on the lowercase wire name, as stored in task records.
    /// User input goes through the lenient [`FromStr`] instead.
    pub fn from_wire(s: &str) -> Option<TaskStatus> {
        TaskStatus::ALL.iter().find(|status| status.as_str() == s).copied()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnknownStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_wire_names_case_insensitive() {
        assert_eq!("underway".parse::<TaskStatus>(), Ok(TaskStatus::Underway));
        assert_eq!("Completed".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert_eq!(" queued ".parse::<TaskStatus>(), Ok(TaskStatus::Queued));
        assert!("SomeFutureStatus".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn status_display_matches_parse() {
        for status in TaskStatus::ALL {
            assert_eq!(status.to_string().parse::<TaskStatus>(), Ok(status));
        }
    }

    #[test]
    fn known_status_ignores_unknown_values() {
        let mut task = TaskState::new("t1");
        assert_eq!(task.known_status(), None);
        task.status = Some("failed".into());
        assert_eq!(task.known_status(), Some(TaskStatus::Failed));
        task.status = Some("rebooting".into());
        assert_eq!(task.known_status(), None);
        task.status = Some("Failed".into());
        assert_eq!(task.known_status(), None);
    }

    #[test]
    fn wire_names_match_exactly() {
        assert_eq!(TaskStatus::from_wire("underway"), Some(TaskStatus::Underway));
        assert_eq!(TaskStatus::from_wire("Underway"), None);
        assert_eq!(TaskStatus::from_wire(" underway "), None);
    }
}
