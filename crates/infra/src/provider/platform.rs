//! Meeting platform detection from links and event text.

/// Known platforms and the URL fragments that identify them
const PLATFORM_MARKERS: &[(&str, &[&str])] = &[
    ("zoom", &["zoom.us"]),
    ("google_meet", &["meet.google.com"]),
    ("teams", &["teams.microsoft.com", "teams.live.com"]),
    ("webex", &["webex.com"]),
];

/// Derive a meeting platform label from the meeting link or body text.
pub fn detect_meeting_platform(
    meeting_link: Option<&str>,
    description: Option<&str>,
) -> Option<String> {
    let haystacks = [meeting_link, description];
    for text in haystacks.into_iter().flatten() {
        let lower = text.to_lowercase();
        for (platform, markers) in PLATFORM_MARKERS {
            if markers.iter().any(|marker| lower.contains(marker)) {
                return Some((*platform).to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_from_link() {
        assert_eq!(
            detect_meeting_platform(Some("https://acme.zoom.us/j/123"), None),
            Some("zoom".to_string())
        );
        assert_eq!(
            detect_meeting_platform(Some("https://meet.google.com/abc-defg"), None),
            Some("google_meet".to_string())
        );
    }

    #[test]
    fn detects_from_description() {
        assert_eq!(
            detect_meeting_platform(None, Some("Join: https://teams.microsoft.com/l/xyz")),
            Some("teams".to_string())
        );
    }

    #[test]
    fn no_marker_means_none() {
        assert_eq!(detect_meeting_platform(Some("https://example.com"), Some("Lunch")), None);
    }
}
