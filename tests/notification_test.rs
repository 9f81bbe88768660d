use std::rc::Rc;

use pagebridge::bridge::{BridgeSession, MemoryChannel};
use pagebridge::config::BridgeConfig;
use pagebridge::dom::document;
use tokio::time::{sleep, Duration};

const PAGE: &str = "<!DOCTYPE html><html><head></head><body>\
    <div id=\"main\"></div><div id=\"status-content\"></div>\
    </body></html>";

fn session() -> (BridgeSession, MemoryChannel) {
    let channel = MemoryChannel::new();
    let session =
        BridgeSession::new(PAGE, Rc::new(channel.clone()), &BridgeConfig::default()).expect("session");
    session.connect().expect("connect");
    (session, channel)
}

fn snackbar_count(session: &BridgeSession) -> usize {
    session
        .document()
        .root()
        .descendants()
        .filter(|node| document::has_class(node, "snackbar"))
        .count()
}

#[tokio::test(start_paused = true)]
async fn snackbar_shows_then_dismisses_itself() {
    let (session, _channel) = session();
    session.dispatch(r#"{"type":"snackbar","content":"saved","duration":1,"level":"success"}"#);

    let snackbar = session.appliers().notifier().current().expect("snackbar");
    assert!(document::has_class(&snackbar, "success"));
    assert!(!document::has_class(&snackbar, "show"));
    assert!(snackbar.text_contents().starts_with("saved"));

    sleep(Duration::from_millis(150)).await;
    session.poll_timers();
    assert!(document::has_class(&snackbar, "show"));

    sleep(Duration::from_millis(900)).await;
    session.poll_timers();
    assert!(!document::has_class(&snackbar, "show"));
    assert!(document::is_attached(&snackbar));

    sleep(Duration::from_millis(350)).await;
    session.poll_timers();
    assert!(!document::is_attached(&snackbar));
    assert_eq!(session.pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn zero_duration_stays_until_closed() {
    let (session, _channel) = session();
    session.dispatch(r#"{"type":"snackbar","content":"sticky"}"#);
    let snackbar = session.appliers().notifier().current().expect("snackbar");

    sleep(Duration::from_secs(10)).await;
    session.poll_timers();
    assert!(document::is_attached(&snackbar));
    assert!(document::has_class(&snackbar, "info"));

    let close = session
        .document()
        .root()
        .descendants()
        .find(|node| document::has_class(node, "snackbar-close"))
        .expect("close button");
    session.click(&close);
    assert!(!document::has_class(&snackbar, "show"));

    sleep(Duration::from_millis(350)).await;
    session.poll_timers();
    assert!(!document::is_attached(&snackbar));
}

#[tokio::test(start_paused = true)]
async fn new_snackbar_replaces_the_visible_one() {
    let (session, _channel) = session();
    session.dispatch(r#"{"type":"snackbar","content":"first","duration":5}"#);
    let first = session.appliers().notifier().current().unwrap();
    session.dispatch(r#"{"type":"snackbar","content":"second","duration":5}"#);

    assert_eq!(snackbar_count(&session), 1);
    assert!(!document::is_attached(&first));

    // the first snackbar's timers find it detached and leave the second alone
    sleep(Duration::from_secs(6)).await;
    session.poll_timers();
    assert_eq!(snackbar_count(&session), 1);
    sleep(Duration::from_millis(350)).await;
    session.poll_timers();
    assert_eq!(snackbar_count(&session), 0);
}

#[tokio::test(start_paused = true)]
async fn snackbar_text_is_escaped() {
    let (session, _channel) = session();
    session.dispatch(r#"{"type":"snackbar","content":"<img src=x>"}"#);
    let snackbar = session.appliers().notifier().current().unwrap();
    assert!(snackbar.text_contents().starts_with("<img src=x>"));
    assert!(session.document().select_first("img").is_none());
}
