//! Executors: how a due action becomes visible to the user.

use async_trait::async_trait;
use snooze_core::action::Payload;
use snooze_core::executor::{Executor, Notification, OpenMode};
use snooze_core::{Result, SnoozeError};

fn target(payload: &Payload) -> Result<String> {
    payload
        .target()
        .map(str::to_string)
        .ok_or_else(|| SnoozeError::Executor("action has no URL to open".into()))
}

fn print_notification(n: &Notification) {
    eprintln!("[{}] {}", n.title, n.message);
}

// ---------------------------------------------------------------------------
// DesktopExecutor
// ---------------------------------------------------------------------------

/// Opens URLs with the system handler or a configured launcher.
#[derive(Debug, Clone, Default)]
pub struct DesktopExecutor {
    launcher: Option<String>,
}

impl DesktopExecutor {
    pub fn new(launcher: Option<String>) -> Self {
        Self {
            launcher: launcher.filter(|l| !l.trim().is_empty()),
        }
    }

    fn open_blocking(&self, url: &str, mode: OpenMode) -> std::io::Result<()> {
        if let Some(launcher) = &self.launcher {
            return open::with_detached(url, launcher);
        }
        // `open -g` keeps the current app focused on macOS.
        if cfg!(target_os = "macos") && mode == OpenMode::Background {
            std::process::Command::new("open")
                .args(["-g", url])
                .spawn()
                .map(|_| ())
        } else {
            open::that_detached(url)
        }
    }
}

#[async_trait]
impl Executor for DesktopExecutor {
    async fn perform(&self, payload: &Payload, mode: OpenMode) -> Result<()> {
        let url = target(payload)?;
        let this = self.clone();
        let opened = url.clone();
        tokio::task::spawn_blocking(move || this.open_blocking(&opened, mode))
            .await
            .map_err(|e| SnoozeError::Executor(format!("task join error: {e}")))?
            .map_err(|e| SnoozeError::Executor(format!("cannot open {url}: {e}")))?;
        tracing::info!(url = %url, ?mode, "opened");
        Ok(())
    }

    fn notify(&self, notification: &Notification) {
        print_notification(notification);
    }
}

// ---------------------------------------------------------------------------
// LogExecutor
// ---------------------------------------------------------------------------

/// Records what would have been opened without touching the desktop.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogExecutor;

#[async_trait]
impl Executor for LogExecutor {
    async fn perform(&self, payload: &Payload, mode: OpenMode) -> Result<()> {
        let url = target(payload)?;
        tracing::info!(url = %url, ?mode, title = payload.display_title(), "action due");
        eprintln!("open {url}");
        Ok(())
    }

    fn notify(&self, notification: &Notification) {
        tracing::info!(title = %notification.title, message = %notification.message, "notification");
        print_notification(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_executor_accepts_urls() {
        let payload = Payload::for_url("https://example.com");
        assert!(LogExecutor.perform(&payload, OpenMode::Foreground).await.is_ok());
    }

    #[tokio::test]
    async fn missing_url_is_an_executor_error() {
        let err = LogExecutor
            .perform(&Payload::default(), OpenMode::Background)
            .await
            .unwrap_err();
        assert!(matches!(err, SnoozeError::Executor(_)));

        let err = DesktopExecutor::new(None)
            .perform(&Payload::for_url("  "), OpenMode::Foreground)
            .await
            .unwrap_err();
        assert!(matches!(err, SnoozeError::Executor(_)));
    }

    #[test]
    fn blank_launcher_means_system_default() {
        assert!(DesktopExecutor::new(Some("  ".into())).launcher.is_none());
        assert_eq!(
            DesktopExecutor::new(Some("firefox".into())).launcher.as_deref(),
            Some("firefox")
        );
    }
}
