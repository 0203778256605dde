//! Platform-appropriate reply formatting.
//!
//! Handlers compose replies in a light Discord-flavored markdown with two
//! markers: `<url/>`-style suppressed links and a `/>` escape. Discord
//! renders markdown, so its formatting only unescapes the marker;
//! Twitch-family surfaces (Twitch chat and the Petal relay) are
//! single-line and render no markdown, so styling is stripped, suppressed
//! links are rewritten back to bare URLs, and lines are collapsed into one
//! `" | "`-joined line.

use trellis_types::Platform;

/// Format a reply for the given platform.
pub fn format_reply(platform: Platform, content: &str) -> String {
    match platform {
        Platform::Discord => format_discord_reply(content),
        Platform::Twitch | Platform::Petal => format_twitch_reply(content),
    }
}

/// Discord replies pass through unchanged except the `/>` escape marker,
/// which becomes a literal `>` (closing a suppressed `<link/>`).
pub fn format_discord_reply(content: &str) -> String {
    content.replace("/>", ">")
}

/// Twitch-family replies: strip bold and code markers, rewrite suppressed
/// `<http...` links back to bare URLs, drop the `/>` marker, then join
/// non-empty lines with `" | "`.
pub fn format_twitch_reply(content: &str) -> String {
    content
        .replace("***", "")
        .replace("**", "")
        .replace('`', "")
        .replace("<http", "http")
        .replace("/>", "")
        .split('\n')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discord_unescapes_suppression_marker() {
        assert_eq!(
            format_discord_reply("Join here: <https://example.com/>"),
            "Join here: <https://example.com>"
        );
        assert_eq!(format_discord_reply("plain text"), "plain text");
    }

    #[test]
    fn twitch_strips_markdown_styling() {
        assert_eq!(
            format_twitch_reply("**Online**\n**Title:** `cool stream`"),
            "Online | Title: cool stream"
        );
    }

    #[test]
    fn twitch_rewrites_suppressed_links_to_bare_urls() {
        assert_eq!(
            format_twitch_reply("Stream: <https://twitch.tv/somestreamer/>"),
            "Stream: https://twitch.tv/somestreamer"
        );
    }

    #[test]
    fn twitch_drops_empty_segments() {
        assert_eq!(format_twitch_reply("a\n\n\nb"), "a | b");
        assert_eq!(format_twitch_reply("\n\n"), "");
    }

    #[test]
    fn twitch_single_line_passes_through() {
        assert_eq!(format_twitch_reply("You have 20🌿"), "You have 20🌿");
    }

    #[test]
    fn petal_uses_twitch_family_formatting() {
        assert_eq!(
            format_reply(Platform::Petal, "**bold**\ntext"),
            "bold | text"
        );
        assert_eq!(
            format_reply(Platform::Discord, "**bold**\ntext"),
            "**bold**\ntext"
        );
    }
}
