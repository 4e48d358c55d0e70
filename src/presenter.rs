//! Presentation — the orchestrator talks to a trait, not a toolkit.

use notify_rust::{Notification, Timeout};

/// Where the result popup should appear. A hint; presenters that cannot
/// position themselves (notifications) ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupPosition {
    Cursor,
    Fixed { x: i32, y: i32 },
}

impl PopupPosition {
    /// Parse the config string: "cursor" or "fixed:x,y".
    pub fn parse(value: &str) -> PopupPosition {
        let value = value.trim();
        if let Some(coords) = value.strip_prefix("fixed:") {
            let mut parts = coords.splitn(2, ',');
            let x = parts.next().and_then(|v| v.trim().parse().ok());
            let y = parts.next().and_then(|v| v.trim().parse().ok());
            if let (Some(x), Some(y)) = (x, y) {
                return PopupPosition::Fixed { x, y };
            }
            log::warn!("Invalid popup position {value:?}, using cursor");
        } else if value != "cursor" {
            log::warn!("Unknown popup position {value:?}, using cursor");
        }
        PopupPosition::Cursor
    }
}

/// What the user should see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Results(String),
    History(String),
    Status(String),
    Error(String),
}

pub trait Presenter: Send + Sync {
    fn present(&self, view: View);
}

/// Desktop-notification presenter.
pub struct NotificationPresenter {
    #[allow(dead_code)]
    position: PopupPosition,
}

impl NotificationPresenter {
    pub fn new(position: PopupPosition) -> Self {
        Self { position }
    }
}

impl Presenter for NotificationPresenter {
    fn present(&self, view: View) {
        let (summary, body, timeout_ms) = match view {
            View::Results(text) => ("Results", text, 15_000),
            View::History(text) => ("Answer history", text, 15_000),
            View::Status(text) => ("snapquiz", text, 5_000),
            View::Error(text) => ("snapquiz error", text, 8_000),
        };
        let shown = Notification::new()
            .summary(summary)
            .body(&body)
            .timeout(Timeout::Milliseconds(timeout_ms))
            .show();
        if let Err(e) = shown {
            log::warn!("Failed to show notification: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cursor_position() {
        assert_eq!(PopupPosition::parse("cursor"), PopupPosition::Cursor);
    }

    #[test]
    fn parse_fixed_position() {
        assert_eq!(
            PopupPosition::parse("fixed:100,250"),
            PopupPosition::Fixed { x: 100, y: 250 }
        );
        assert_eq!(
            PopupPosition::parse("fixed: -10 , 40"),
            PopupPosition::Fixed { x: -10, y: 40 }
        );
    }

    #[test]
    fn invalid_positions_fall_back_to_cursor() {
        assert_eq!(PopupPosition::parse("fixed:abc"), PopupPosition::Cursor);
        assert_eq!(PopupPosition::parse("fixed:1"), PopupPosition::Cursor);
        assert_eq!(PopupPosition::parse("bottom-left"), PopupPosition::Cursor);
    }
}
