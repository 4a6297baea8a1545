use mergebot_common::{MediaKind, SourceRef, UserId, media::declared_extension};

use crate::RejectReason;

/// One accepted attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub owner: UserId,
    pub source_ref: SourceRef,
    /// Name the user uploaded the file under.
    pub file_name: String,
    /// Lower-cased, never empty.
    pub declared_extension: String,
    pub kind: MediaKind,
}

impl MediaItem {
    /// Build an item from what the transport reported. Attachments without a
    /// usable file name never enter the model.
    pub fn new(
        owner: UserId,
        source_ref: SourceRef,
        file_name: Option<&str>,
        kind: MediaKind,
    ) -> Result<Self, RejectReason> {
        let file_name = file_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(RejectReason::MissingFileName)?;
        let declared_extension =
            declared_extension(file_name).ok_or(RejectReason::MissingFileName)?;
        Ok(Self {
            owner,
            source_ref,
            file_name: file_name.to_string(),
            declared_extension,
            kind,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_derived_and_lowercased() {
        let item = MediaItem::new(
            UserId(5),
            SourceRef::new("f1"),
            Some("Trip.MP4"),
            MediaKind::Video,
        )
        .unwrap();
        assert_eq!(item.declared_extension, "mp4");
        assert_eq!(item.file_name, "Trip.MP4");
    }

    #[test]
    fn missing_name_is_rejected() {
        let err = MediaItem::new(UserId(5), SourceRef::new("f1"), None, MediaKind::Video)
            .unwrap_err();
        assert_eq!(err, RejectReason::MissingFileName);
    }

    #[test]
    fn blank_or_dot_terminated_name_is_rejected() {
        for name in ["   ", "video."] {
            let err = MediaItem::new(
                UserId(5),
                SourceRef::new("f1"),
                Some(name),
                MediaKind::Document,
            )
            .unwrap_err();
            assert_eq!(err, RejectReason::MissingFileName, "{name:?}");
        }
    }
}
