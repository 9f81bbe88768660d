use std::rc::Rc;

use futures_util::FutureExt;
use pagebridge::bridge::{BackendMethod, BridgeError, BridgeSession, ConnectionState, MemoryChannel};
use pagebridge::config::BridgeConfig;
use serde_json::{json, Value};

const PAGE: &str = "<!DOCTYPE html><html><head></head><body>\
    <div id=\"main\"><button id=\"save\" class=\"primary\">Save</button></div>\
    <div id=\"status-content\"></div>\
    </body></html>";

fn session(channel: &MemoryChannel) -> BridgeSession {
    BridgeSession::new(PAGE, Rc::new(channel.clone()), &BridgeConfig::default()).expect("session")
}

#[tokio::test]
async fn call_resolves_with_backend_reply() {
    let channel = MemoryChannel::new();
    let session = session(&channel);
    session.connect().expect("connect");

    let request = session.call("hello");
    let sent = channel.last_sent().expect("sent");
    assert_eq!(sent.method, BackendMethod::ProcessData);
    assert_eq!(sent.payload, "hello");

    assert!(channel.reply(sent.id, json!("HELLO")));
    assert_eq!(request.await.expect("reply"), json!("HELLO"));
}

#[tokio::test]
async fn call_without_reply_stays_pending() {
    let channel = MemoryChannel::new();
    let session = session(&channel);
    session.connect().expect("connect");

    let mut request = session.call(json!({"n": 1}));
    assert!((&mut request).now_or_never().is_none());
    assert_eq!(channel.awaiting_reply(), 1);

    let sent = channel.last_sent().unwrap();
    assert_eq!(sent.payload, r#"{"n":1}"#);
    channel.reply(sent.id, json!(2));
    assert_eq!(request.now_or_never().unwrap().unwrap(), json!(2));
}

#[tokio::test]
async fn call_before_connect_rejects_immediately() {
    let channel = MemoryChannel::new();
    let session = session(&channel);
    assert_eq!(session.connection_state(), ConnectionState::Uninitialized);

    let result = session.call("early").now_or_never().expect("ready at once");
    assert!(matches!(result, Err(BridgeError::NotConnected)));
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn abandoned_reply_rejects() {
    let channel = MemoryChannel::new();
    let session = session(&channel);
    session.connect().expect("connect");

    let request = session.send_message("bye");
    let sent = channel.last_sent().unwrap();
    assert_eq!(sent.method, BackendMethod::ReceiveFromFrontEnd);
    assert!(channel.abandon(sent.id));
    assert!(matches!(request.await, Err(BridgeError::ReplyDropped)));
}

#[tokio::test]
async fn replies_may_arrive_out_of_order() {
    let channel = MemoryChannel::new();
    let session = session(&channel);
    session.connect().expect("connect");

    let first = session.call("a");
    let second = session.call("b");
    let sent = channel.sent();
    channel.reply(sent[1].id, json!("B"));
    channel.reply(sent[0].id, json!("A"));

    assert_eq!(second.await.unwrap(), json!("B"));
    assert_eq!(first.await.unwrap(), json!("A"));
}

#[tokio::test]
async fn send_data_records_the_result() {
    let channel = MemoryChannel::new();
    let session = session(&channel);
    session.connect().expect("connect");

    let pending = session.send_data("abc");
    let sent = channel.last_sent().unwrap();
    channel.reply(sent.id, json!("ABC"));
    assert_eq!(pending.await.unwrap(), json!("ABC"));

    let log = session.document().element_by_id("status-content").unwrap();
    assert!(log.text_contents().ends_with("] Processed result: ABC"));
}

#[tokio::test]
async fn clicks_are_reported_as_json() {
    let channel = MemoryChannel::new();
    let session = session(&channel);
    session.connect().expect("connect");

    let button = session.document().element_by_id("save").unwrap();
    assert!(session.click(&button));
    let sent = channel.last_sent().unwrap();
    assert_eq!(sent.method, BackendMethod::ReceiveFromFrontEnd);
    let value: Value = serde_json::from_str(&sent.payload).unwrap();
    assert_eq!(
        value,
        json!({"type": "click", "tagName": "button", "id": "save", "className": "primary"})
    );

    assert!(session.button_click("save"));
    assert_eq!(channel.last_sent().unwrap().payload, "save clicked");
}

#[tokio::test]
async fn click_before_connect_is_logged_not_raised() {
    let channel = MemoryChannel::new();
    let session = session(&channel);
    let button = session.document().element_by_id("save").unwrap();
    assert!(!session.click(&button));
    assert!(channel.sent().is_empty());
}
