//! Turning a resolved message into chat-ready markdown.

use ghlines_core::MessageResult;

use crate::config::LimitsConfig;

/// What the caller should post in reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// No link resolved; stay quiet.
    Nothing,
    /// Fenced snippets, one per resolved link.
    Snippets(String),
    /// The result breaks a display limit; post this notice instead.
    Refused(String),
}

/// Apply the display limits and render code fences.
///
/// A result the resolver cut short at its link cap is refused like one over
/// the line limit, since its `total_lines` is only a lower bound.
pub fn render(result: &MessageResult, limits: &LimitsConfig) -> Reply {
    if result.truncated || result.total_lines > limits.max_lines {
        return Reply::Refused(format!(
            "Sorry, but to prevent spam, we limit the number of lines displayed at {}",
            limits.max_lines
        ));
    }

    let body = result
        .msg_list
        .iter()
        .map(|entry| {
            // A language tag on a blank snippet makes clients print the tag.
            let language = if entry.to_display.trim().is_empty() {
                " "
            } else {
                entry.extension.as_str()
            };
            format!("```{language}\n{}\n```", entry.to_display)
        })
        .collect::<Vec<_>>()
        .join("\n");

    if body.is_empty() {
        return Reply::Nothing;
    }
    // Chat clients count UTF-16 code units.
    if body.encode_utf16().count() >= limits.max_chars {
        return Reply::Refused(format!(
            "Sorry but there is a {} character limit, so we were unable to display the desired snippet",
            limits.max_chars
        ));
    }
    Reply::Snippets(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghlines_core::DisplayEntry;

    fn entry(extension: &str, text: &str) -> DisplayEntry {
        DisplayEntry {
            extension: extension.into(),
            to_display: text.into(),
        }
    }

    #[test]
    fn test_empty_result_is_nothing() {
        assert_eq!(render(&MessageResult::default(), &LimitsConfig::default()), Reply::Nothing);
    }

    #[test]
    fn test_fences_per_entry() {
        let result = MessageResult {
            msg_list: vec![entry("rs", "fn a() {}"), entry("", "plain")],
            total_lines: 2,
            ..MessageResult::default()
        };
        assert_eq!(
            render(&result, &LimitsConfig::default()),
            Reply::Snippets("```rs\nfn a() {}\n```\n```\nplain\n```".into())
        );
    }

    #[test]
    fn test_blank_snippet_gets_space_language() {
        let result = MessageResult {
            msg_list: vec![entry("py", "   ")],
            total_lines: 1,
            ..MessageResult::default()
        };
        assert_eq!(
            render(&result, &LimitsConfig::default()),
            Reply::Snippets("``` \n   \n```".into())
        );
    }

    #[test]
    fn test_line_limit() {
        let result = MessageResult {
            msg_list: vec![entry("rs", "x")],
            total_lines: 51,
            ..MessageResult::default()
        };
        let reply = render(&result, &LimitsConfig::default());
        assert!(matches!(reply, Reply::Refused(msg) if msg.contains("at 50")));
    }

    #[test]
    fn test_char_limit() {
        let result = MessageResult {
            msg_list: vec![entry("txt", &"x".repeat(1990))],
            total_lines: 1,
            ..MessageResult::default()
        };
        let reply = render(&result, &LimitsConfig::default());
        assert!(matches!(reply, Reply::Refused(msg) if msg.contains("2000 character")));
    }

    #[test]
    fn test_capped_message_is_refused() {
        let result = MessageResult {
            msg_list: (1..=50).map(|i| entry("rs", &format!("line {i}"))).collect(),
            total_lines: 50,
            truncated: true,
        };
        let reply = render(&result, &LimitsConfig::default());
        assert!(matches!(reply, Reply::Refused(msg) if msg.contains("at 50")));
    }

    #[test]
    fn test_char_limit_counts_utf16_units() {
        // 995 emoji are 1990 UTF-16 units but only 995 chars.
        let result = MessageResult {
            msg_list: vec![entry("txt", &"\u{1F600}".repeat(995))],
            total_lines: 1,
            ..MessageResult::default()
        };
        let reply = render(&result, &LimitsConfig::default());
        assert!(matches!(reply, Reply::Refused(msg) if msg.contains("2000 character")));
    }
}
