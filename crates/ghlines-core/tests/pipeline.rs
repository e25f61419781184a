//! End-to-end message resolution against a canned fetcher.

mod common;

use common::{github_raw, numbered_lines, resolver, resolver_with, FakeFetcher};
use ghlines_core::{DisplayEntry, LinkError, ResolverConfig};
use std::sync::Arc;
use std::time::Duration;

fn link(path: &str, anchor: &str) -> String {
    format!("https://github.com/o/r/blob/main/{path}#{anchor}")
}

#[tokio::test]
async fn message_without_links_is_empty() {
    let fetcher = Arc::new(FakeFetcher::new());
    let resolver = resolver(&fetcher);

    for text in [
        "",
        "hello world",
        "https://example.com/o/r/blob/main/a.rs#L1",
        "https://github.com/o/r and https://github.com/o/r/issues/4",
        "https://github.com/o/r/blob/main/a.rs without an anchor",
    ] {
        let result = resolver.handle_message(text).await;
        assert!(result.msg_list.is_empty(), "{text:?} should produce nothing");
        assert_eq!(result.total_lines, 0);
    }
    assert_eq!(fetcher.total_calls(), 0);
}

#[tokio::test]
async fn single_line_link() {
    let fetcher = Arc::new(
        FakeFetcher::new().file(github_raw("o", "r", "main", "src/lib.rs"), numbered_lines(20)),
    );
    let result = resolver(&fetcher)
        .handle_message(&format!("look at {}", link("src/lib.rs", "L7")))
        .await;

    assert_eq!(result.total_lines, 1);
    assert_eq!(
        result.msg_list,
        vec![DisplayEntry {
            extension: "rs".into(),
            to_display: "line 7".into(),
        }]
    );
}

#[tokio::test]
async fn range_link_sixteen_lines() {
    let fetcher = Arc::new(
        FakeFetcher::new().file(github_raw("o", "r", "main", "a.py"), numbered_lines(30)),
    );
    let result = resolver(&fetcher)
        .handle_message(&link("a.py", "L10-L25"))
        .await;

    assert_eq!(result.total_lines, 16);
    let shown = &result.msg_list[0].to_display;
    assert_eq!(shown.split('\n').count(), 16);
    assert!(shown.starts_with("line 10\n"));
    assert!(shown.ends_with("line 25"));
}

#[tokio::test]
async fn end_past_file_is_clamped() {
    let fetcher = Arc::new(
        FakeFetcher::new().file(github_raw("o", "r", "main", "a.py"), numbered_lines(12)),
    );
    let result = resolver(&fetcher)
        .handle_message(&link("a.py", "L10-L25"))
        .await;

    assert_eq!(result.total_lines, 3);
    assert_eq!(result.msg_list[0].to_display, "line 10\nline 11\nline 12");
}

#[tokio::test]
async fn start_past_file_is_omitted() {
    let fetcher = Arc::new(
        FakeFetcher::new().file(github_raw("o", "r", "main", "a.py"), numbered_lines(12)),
    );
    let text = format!("{} {}", link("a.py", "L13-L20"), link("a.py", "L1"));
    let result = resolver(&fetcher).handle_message(&text).await;

    assert_eq!(result.total_lines, 1);
    assert_eq!(result.msg_list.len(), 1);
    assert_eq!(result.msg_list[0].to_display, "line 1");
}

#[tokio::test]
async fn middle_failure_keeps_order_of_the_rest() {
    let fetcher = Arc::new(
        FakeFetcher::new()
            .file(github_raw("o", "r", "main", "one.rs"), "fn one() {}\n")
            .failing(
                github_raw("o", "r", "main", "two.rs"),
                LinkError::NetworkFailure("connection reset".into()),
            )
            .file(github_raw("o", "r", "main", "three.go"), "a\nb\nc\n"),
    );
    let text = format!(
        "{}\n{}\n{}",
        link("one.rs", "L1"),
        link("two.rs", "L1-L4"),
        link("three.go", "L2-L3")
    );
    let result = resolver(&fetcher).handle_message(&text).await;

    assert_eq!(
        result.msg_list,
        vec![
            DisplayEntry {
                extension: "rs".into(),
                to_display: "fn one() {}".into(),
            },
            DisplayEntry {
                extension: "go".into(),
                to_display: "b\nc".into(),
            },
        ]
    );
    assert_eq!(result.total_lines, 3);
}

#[tokio::test(start_paused = true)]
async fn output_order_ignores_completion_order() {
    let fetcher = Arc::new(
        FakeFetcher::new()
            .file_delayed(github_raw("o", "r", "main", "slow.rs"), "slow\n", Duration::from_millis(900))
            .file_delayed(github_raw("o", "r", "main", "mid.rs"), "mid\n", Duration::from_millis(400))
            .file(github_raw("o", "r", "main", "fast.rs"), "fast\n"),
    );
    let text = format!(
        "{} {} {}",
        link("slow.rs", "L1"),
        link("mid.rs", "L1"),
        link("fast.rs", "L1")
    );
    let result = resolver(&fetcher).handle_message(&text).await;

    let shown: Vec<_> = result.msg_list.iter().map(|e| e.to_display.as_str()).collect();
    assert_eq!(shown, vec!["slow", "mid", "fast"]);
    assert_eq!(result.total_lines, 3);
}

#[tokio::test]
async fn same_file_twice_fetches_once_and_shows_twice() {
    let url = github_raw("o", "r", "main", "a.rs");
    let fetcher = Arc::new(FakeFetcher::new().file(url.clone(), numbered_lines(10)));
    let text = format!("{} and {}", link("a.rs", "L1-L2"), link("a.rs", "L1-L2"));
    let result = resolver(&fetcher).handle_message(&text).await;

    assert_eq!(fetcher.calls(&url), 1);
    assert_eq!(result.msg_list.len(), 2);
    assert_eq!(result.msg_list[0], result.msg_list[1]);
    assert_eq!(result.total_lines, 4);
}

#[tokio::test]
async fn cache_is_reused_across_messages() {
    let url = github_raw("o", "r", "main", "a.rs");
    let fetcher = Arc::new(FakeFetcher::new().file(url.clone(), numbered_lines(10)));
    let resolver = resolver(&fetcher);

    resolver.handle_message(&link("a.rs", "L1")).await;
    let second = resolver.handle_message(&link("a.rs", "L5-L6")).await;

    assert_eq!(fetcher.calls(&url), 1);
    assert_eq!(second.msg_list[0].to_display, "line 5\nline 6");
}

#[tokio::test]
async fn gitlab_and_gist_links() {
    let gist = r##"{"files": {"notes.md": {
        "filename": "notes.md",
        "raw_url": "https://gist.githubusercontent.com/u/abc123/raw/notes.md",
        "content": "# Title\n\nbody\n",
        "truncated": false
    }}}"##;
    let fetcher = Arc::new(
        FakeFetcher::new()
            .file("https://gitlab.com/grp/proj/-/raw/v2/lib/x.rb", "a\nb\nc\nd\n")
            .file("https://api.github.com/gists/abc123", gist),
    );
    let text = "https://gitlab.com/grp/proj/-/blob/v2/lib/x.rb#L2-3 \
                https://gist.github.com/u/abc123#file-notes-md-L1";
    let result = resolver(&fetcher).handle_message(text).await;

    assert_eq!(
        result.msg_list,
        vec![
            DisplayEntry {
                extension: "rb".into(),
                to_display: "b\nc".into(),
            },
            DisplayEntry {
                extension: "md".into(),
                to_display: "# Title".into(),
            },
        ]
    );
    assert_eq!(result.total_lines, 3);
}

#[tokio::test]
async fn binary_and_oversized_files_are_omitted() {
    let config = ResolverConfig {
        max_file_bytes: 64,
        ..ResolverConfig::default()
    };
    let fetcher = Arc::new(
        FakeFetcher::new()
            .bytes(github_raw("o", "r", "main", "logo.png"), b"\x89PNG\0\0\0\0".to_vec())
            .file(github_raw("o", "r", "main", "big.txt"), "x".repeat(65))
            .file(github_raw("o", "r", "main", "ok.txt"), "fine\n"),
    );
    let text = format!(
        "{} {} {}",
        link("logo.png", "L1"),
        link("big.txt", "L1"),
        link("ok.txt", "L1")
    );
    let result = resolver_with(&fetcher, config).handle_message(&text).await;

    assert_eq!(result.msg_list.len(), 1);
    assert_eq!(result.msg_list[0].to_display, "fine");
}

#[tokio::test]
async fn missing_files_are_omitted() {
    let fetcher = Arc::new(FakeFetcher::new());
    let result = resolver(&fetcher)
        .handle_message(&link("gone.rs", "L1"))
        .await;
    assert!(result.is_empty());
}

#[tokio::test]
async fn adversarial_message_is_bounded() {
    let fetcher = Arc::new(
        FakeFetcher::new().file(github_raw("o", "r", "main", "a.rs"), numbered_lines(3)),
    );
    let config = ResolverConfig {
        max_links: 5,
        ..ResolverConfig::default()
    };
    let mut text = "https://github.com/x/y#L1 ".repeat(2_000);
    text.push_str(&format!("{} ", link("a.rs", "L1")).repeat(20));

    let result = resolver_with(&fetcher, config).handle_message(&text).await;

    assert_eq!(result.msg_list.len(), 5);
    assert!(result.truncated);
    assert_eq!(fetcher.total_calls(), 1);
}

#[tokio::test]
async fn links_past_the_cap_mark_the_result_truncated() {
    let fetcher = Arc::new(
        FakeFetcher::new().file(github_raw("o", "r", "main", "a.rs"), numbered_lines(60)),
    );
    let text = (1..=60)
        .map(|i| link("a.rs", &format!("L{i}")))
        .collect::<Vec<_>>()
        .join(" ");

    let result = resolver(&fetcher).handle_message(&text).await;

    assert_eq!(result.msg_list.len(), 50);
    assert_eq!(result.msg_list[49].to_display, "line 50");
    assert!(result.truncated);

    let under_cap = resolver(&fetcher)
        .handle_message(&link("a.rs", "L1-L3"))
        .await;
    assert!(!under_cap.truncated);
}

#[tokio::test]
async fn dedent_option() {
    let fetcher = Arc::new(FakeFetcher::new().file(
        github_raw("o", "r", "main", "a.rs"),
        "mod m {\n    fn f() {\n        g();\n    }\n}\n",
    ));
    let config = ResolverConfig {
        dedent: true,
        ..ResolverConfig::default()
    };
    let result = resolver_with(&fetcher, config)
        .handle_message(&link("a.rs", "L2-L4"))
        .await;
    assert_eq!(result.msg_list[0].to_display, "fn f() {\n    g();\n}");
}

#[tokio::test(start_paused = true)]
async fn abandoned_message_leaves_resolver_usable() {
    let url = github_raw("o", "r", "main", "a.rs");
    let fetcher = Arc::new(FakeFetcher::new().file_delayed(
        url.clone(),
        numbered_lines(5),
        Duration::from_millis(500),
    ));
    let resolver = resolver(&fetcher);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        resolver.handle_message(&link("a.rs", "L1")),
    )
    .await;
    assert!(abandoned.is_err());

    let result = resolver.handle_message(&link("a.rs", "L2")).await;
    assert_eq!(result.msg_list[0].to_display, "line 2");
    assert_eq!(result.total_lines, 1);
}
