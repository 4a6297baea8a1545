use std::{fmt, str::FromStr};

use mergebot_common::{MediaKind, SourceRef, UserId};

/// Inline buttons attached to the status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    MergeNow,
    Cancel,
}

impl Button {
    pub const fn callback_data(self) -> &'static str {
        match self {
            Self::MergeNow => "merge_now",
            Self::Cancel => "cancel_process",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::MergeNow => "Merge Now",
            Self::Cancel => "Cancel",
        }
    }

    /// Build the event a press of this button stands for.
    pub fn pressed_by(self, user: UserId, display_name: impl Into<String>) -> InboundEvent {
        let display_name = display_name.into();
        match self {
            Self::MergeNow => InboundEvent::RequestMerge { user, display_name },
            Self::Cancel => InboundEvent::Cancel { user, display_name },
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Button {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "merge_now" => Ok(Self::MergeNow),
            "cancel_process" => Ok(Self::Cancel),
            other => Err(format!("unknown callback: {other}")),
        }
    }
}

/// Everything the router reacts to. Transports translate their own updates
/// into one of these and drop the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    SubmitMedia {
        user: UserId,
        display_name: String,
        /// `None` when the transport reported no name for the attachment.
        file_name: Option<String>,
        source_ref: SourceRef,
        kind: MediaKind,
    },
    RequestMerge {
        user: UserId,
        display_name: String,
    },
    Cancel {
        user: UserId,
        display_name: String,
    },
    Start {
        user: UserId,
        display_name: String,
    },
    Help {
        user: UserId,
    },
}

impl InboundEvent {
    pub fn user(&self) -> UserId {
        match self {
            Self::SubmitMedia { user, .. }
            | Self::RequestMerge { user, .. }
            | Self::Cancel { user, .. }
            | Self::Start { user, .. }
            | Self::Help { user } => *user,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SubmitMedia { .. } => "submit_media",
            Self::RequestMerge { .. } => "request_merge",
            Self::Cancel { .. } => "cancel",
            Self::Start { .. } => "start",
            Self::Help { .. } => "help",
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("merge_now", Button::MergeNow)]
    #[case("cancel_process", Button::Cancel)]
    #[case(" merge_now ", Button::MergeNow)]
    fn parses_callback_data(#[case] data: &str, #[case] expected: Button) {
        assert_eq!(data.parse::<Button>().unwrap(), expected);
        assert_eq!(expected.callback_data(), data.trim());
    }

    #[test]
    fn rejects_unknown_callback() {
        assert!("merge_later".parse::<Button>().is_err());
    }

    #[test]
    fn button_press_maps_to_event() {
        let event = Button::Cancel.pressed_by(UserId(7), "Ann");
        assert_eq!(event.user(), UserId(7));
        assert_eq!(event.kind(), "cancel");
        assert!(matches!(
            Button::MergeNow.pressed_by(UserId(7), "Ann"),
            InboundEvent::RequestMerge { .. }
        ));
    }
}
