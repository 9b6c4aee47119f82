//! Executor contract: the user-visible effect of a firing action.

use async_trait::async_trait;
use serde::Serialize;

use crate::action::{Payload, ScheduledAction};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Bring the opened resource to the front.
    Foreground,
    /// Open without stealing focus.
    Background,
}

impl OpenMode {
    pub fn from_background_flag(background: bool) -> Self {
        if background {
            Self::Background
        } else {
            Self::Foreground
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Notification {
    pub fn action_fired(action: &ScheduledAction) -> Self {
        let kind = if action.is_recurring {
            "recurring"
        } else {
            "scheduled"
        };
        Self {
            title: "Action due".to_string(),
            message: format!(
                "Your {kind} action \"{}\" is now open.",
                action.payload.display_title()
            ),
            icon: action.payload.favicon.clone(),
        }
    }

    pub fn sweep_summary(executed: usize) -> Self {
        let noun = if executed == 1 { "action" } else { "actions" };
        Self {
            title: "Missed actions opened".to_string(),
            message: format!("{executed} {noun} came due while the scheduler was not running."),
            icon: None,
        }
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Produce the effect for `payload` (open its URL).
    async fn perform(&self, payload: &Payload, mode: OpenMode) -> Result<()>;

    /// Best-effort, must not block.
    fn notify(&self, notification: &Notification);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionId;

    #[test]
    fn fired_notification_names_the_action() {
        let mut payload = Payload::for_url("https://example.com");
        payload.title = Some("Example".into());
        payload.favicon = Some("icon.png".into());
        let action = ScheduledAction::one_shot(ActionId(1), payload, 0, 0);

        let n = Notification::action_fired(&action);
        assert_eq!(n.message, "Your scheduled action \"Example\" is now open.");
        assert_eq!(n.icon.as_deref(), Some("icon.png"));
    }

    #[test]
    fn sweep_summary_pluralizes() {
        assert!(Notification::sweep_summary(1).message.starts_with("1 action "));
        assert!(Notification::sweep_summary(3).message.starts_with("3 actions "));
    }

    #[test]
    fn open_mode_follows_flag() {
        assert_eq!(OpenMode::from_background_flag(true), OpenMode::Background);
        assert_eq!(OpenMode::from_background_flag(false), OpenMode::Foreground);
    }
}
