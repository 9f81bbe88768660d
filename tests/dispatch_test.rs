use std::rc::Rc;

use pagebridge::bridge::message::{CommandKind, EncodedPayload};
use pagebridge::bridge::{BridgeSession, DispatchOutcome, MemoryChannel};
use pagebridge::config::{BridgeConfig, PlainTextFallback};
use pagebridge::dom::document;
use serde_json::json;

const PAGE: &str = "<!DOCTYPE html><html><head></head><body>\
    <header id=\"header\"></header>\
    <div id=\"main\"><div id=\"target\">old</div></div>\
    <table><tbody id=\"rows\"></tbody></table>\
    <aside id=\"aside\"></aside>\
    <div id=\"status\"><div id=\"status-content\"></div></div>\
    <div id=\"spinner-container\"></div>\
    <div id=\"theme-styles\"></div>\
    <footer id=\"footer\" class=\"hidden\"></footer>\
    </body></html>";

fn session_with(config: BridgeConfig) -> (BridgeSession, MemoryChannel) {
    let channel = MemoryChannel::new();
    let session = BridgeSession::new(PAGE, Rc::new(channel.clone()), &config).expect("session");
    session.connect().expect("connect");
    (session, channel)
}

fn session() -> (BridgeSession, MemoryChannel) {
    session_with(BridgeConfig::default())
}

fn status_lines(session: &BridgeSession) -> Vec<String> {
    let log = session.document().element_by_id("status-content").expect("status log");
    log.children()
        .filter(|node| node.as_element().is_some())
        .map(|node| node.text_contents())
        .collect()
}

#[tokio::test]
async fn content_replaces_target_html() {
    let (session, _channel) = session();
    let raw = json!({
        "type": "content",
        "targetId": "target",
        "html": EncodedPayload::encode("<b>hi</b>"),
    })
    .to_string();

    assert_eq!(session.dispatch(&raw), DispatchOutcome::Applied(CommandKind::Content));
    let target = session.document().element_by_id("target").unwrap();
    assert_eq!(session.document().inner_html(&target), "<b>hi</b>");
}

#[tokio::test]
async fn table_rows_land_in_a_tbody_target() {
    let (session, _channel) = session();
    let raw = json!({
        "type": "content",
        "targetId": "rows",
        "html": EncodedPayload::encode("<tr><td>1</td></tr>"),
    })
    .to_string();

    assert_eq!(session.dispatch(&raw), DispatchOutcome::Applied(CommandKind::Content));
    let rows = session.document().element_by_id("rows").unwrap();
    assert_eq!(session.document().inner_html(&rows), "<tr><td>1</td></tr>");
}

#[tokio::test]
async fn empty_html_leaves_target_untouched() {
    let (session, _channel) = session();
    let raw = json!({
        "type": "content",
        "targetId": "target",
        "html": "",
        "styling": "",
    })
    .to_string();

    assert_eq!(session.dispatch(&raw), DispatchOutcome::Applied(CommandKind::Content));
    let target = session.document().element_by_id("target").unwrap();
    assert_eq!(session.document().inner_html(&target), "old");
    assert_eq!(document::style(&target), "");
}

#[tokio::test]
async fn stylesheet_text_is_not_parsed_as_markup() {
    let (session, _channel) = session();
    let css = "a::after { content: \"</style><b id='injected'>x</b>\"; }";
    let raw = json!({"type": "styling", "styling": EncodedPayload::encode(css)}).to_string();

    assert_eq!(session.dispatch(&raw), DispatchOutcome::Applied(CommandKind::Styling));
    assert!(session.document().element_by_id("injected").is_none());
    let head = session.document().head().unwrap();
    assert_eq!(head.text_contents(), css);
}

#[tokio::test]
async fn repeated_styling_accumulates() {
    let (session, _channel) = session();
    let raw = json!({
        "type": "content",
        "targetId": "target",
        "styling": EncodedPayload::encode("color: red;"),
    })
    .to_string();

    session.dispatch(&raw);
    session.dispatch(&raw);
    let target = session.document().element_by_id("target").unwrap();
    assert_eq!(document::style(&target), "color: red;color: red;");
    assert_eq!(target.text_contents(), "old");
}

#[tokio::test]
async fn content_for_missing_target_is_skipped() {
    let (session, _channel) = session();
    let before = session.document_html();
    let raw = json!({
        "type": "content",
        "targetId": "nowhere",
        "html": EncodedPayload::encode("<p>x</p>"),
    })
    .to_string();

    assert!(matches!(
        session.dispatch(&raw),
        DispatchOutcome::Skipped { kind: CommandKind::Content, .. }
    ));
    assert_eq!(session.document_html(), before);

    // later messages still apply
    session.dispatch(r#"{"type":"spinning-start"}"#);
    let spinner = session.document().element_by_id("spinner-container").unwrap();
    assert!(document::has_class(&spinner, "spinning"));
}

#[tokio::test]
async fn sections_toggle_only_named_regions() {
    let (session, _channel) = session();
    session.dispatch(r#"{"type":"sections","header":false,"footer":true}"#);

    let doc = session.document();
    assert!(document::has_class(&doc.element_by_id("header").unwrap(), "hidden"));
    assert!(!document::has_class(&doc.element_by_id("footer").unwrap(), "hidden"));
    assert!(!document::has_class(&doc.element_by_id("aside").unwrap(), "hidden"));
    assert!(!document::has_class(&doc.element_by_id("status").unwrap(), "hidden"));

    session.dispatch(r#"{"type":"sections","asideOpen":true}"#);
    assert!(document::has_class(&doc.element_by_id("aside").unwrap(), "open"));
}

#[tokio::test]
async fn stylesheet_and_theme_are_decoded_once_applied() {
    let (session, _channel) = session();
    let styling = json!({"type": "styling", "styling": EncodedPayload::encode("p { margin: 0; }")});
    let theme = json!({"type": "theme", "styling": EncodedPayload::encode("--accent: teal;")});
    session.dispatch(&styling.to_string());
    session.dispatch(&theme.to_string());

    let head = session.document().head().unwrap();
    assert_eq!(session.document().inner_html(&head), "<style>p { margin: 0; }</style>");
    let theme = session.document().element_by_id("theme-styles").unwrap();
    assert_eq!(document::style(&theme), "--accent: teal;");
}

#[tokio::test]
async fn bad_base64_skips_the_command() {
    let (session, _channel) = session();
    let before = session.document_html();
    let outcome = session.dispatch(r#"{"type":"styling","styling":"%%%"}"#);
    assert!(matches!(outcome, DispatchOutcome::Skipped { kind: CommandKind::Styling, .. }));
    assert_eq!(session.document_html(), before);
}

#[tokio::test]
async fn unknown_type_leaves_document_untouched() {
    let (session, _channel) = session();
    let before = session.document_html();
    assert_eq!(
        session.dispatch(r#"{"type":"teleport","targetId":"target"}"#),
        DispatchOutcome::Unknown(Some("teleport".into()))
    );
    assert_eq!(session.document_html(), before);
}

#[tokio::test]
async fn received_is_only_acknowledged() {
    let (session, _channel) = session();
    let before = session.document_html();
    assert_eq!(session.dispatch(r#"{"type":"received"}"#), DispatchOutcome::Acknowledged);
    assert_eq!(session.document_html(), before);
}

#[tokio::test]
async fn status_and_error_append_levelled_lines() {
    let (session, _channel) = session();
    session.dispatch(r#"{"type":"status","content":"loaded","level":"success"}"#);
    session.dispatch(r#"{"type":"status","content":"plain"}"#);
    session.dispatch(r#"{"type":"error","content":"disk full"}"#);

    let lines = status_lines(&session);
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("] loaded"));
    assert!(lines[2].ends_with("] Error: disk full"));

    let log = session.document().element_by_id("status-content").unwrap();
    let levels: Vec<bool> = log
        .children()
        .filter(|node| node.as_element().is_some())
        .zip(["success", "info", "error"])
        .map(|(node, level)| document::has_class(&node, level))
        .collect();
    assert_eq!(levels, vec![true, true, true]);
}

#[tokio::test]
async fn plain_text_goes_to_status_log_by_default() {
    let (session, _channel) = session();
    assert_eq!(session.dispatch("RECEIVED"), DispatchOutcome::PlainText);
    let lines = status_lines(&session);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("] RECEIVED"));
}

#[tokio::test]
async fn plain_text_can_be_ignored() {
    let config = BridgeConfig {
        plain_text_fallback: PlainTextFallback::Ignore,
        ..BridgeConfig::default()
    };
    let (session, _channel) = session_with(config);
    let before = session.document_html();
    assert_eq!(session.dispatch("{not json"), DispatchOutcome::PlainText);
    assert_eq!(session.document_html(), before);
}

#[tokio::test]
async fn snackbar_does_not_touch_status_log_by_default() {
    let (session, _channel) = session();
    session.dispatch(r#"{"type":"snackbar","content":"saved","duration":3,"level":"success"}"#);
    assert!(session.appliers().notifier().current().is_some());
    assert!(status_lines(&session).is_empty());
}

#[tokio::test]
async fn snackbar_can_mirror_to_status_log() {
    let config = BridgeConfig {
        snackbar_mirrors_status: true,
        ..BridgeConfig::default()
    };
    let (session, _channel) = session_with(config);
    session.dispatch(r#"{"type":"snackbar","content":"saved","level":"success"}"#);
    let lines = status_lines(&session);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("] saved"));
}

#[tokio::test]
async fn inbound_messages_apply_in_delivery_order() {
    let (session, channel) = session();
    for raw in [
        r#"{"type":"spinning-start"}"#,
        r#"{"type":"status","content":"first"}"#,
        r#"{"type":"spinning-stop"}"#,
        r#"{"type":"status","content":"second"}"#,
    ] {
        assert!(channel.deliver(raw));
    }

    let spinner = session.document().element_by_id("spinner-container").unwrap();
    assert!(!document::has_class(&spinner, "spinning"));
    let lines = status_lines(&session);
    assert!(lines[0].ends_with("] first"));
    assert!(lines[1].ends_with("] second"));
}
