//! End-to-end scheduler scenarios against in-memory peers.

mod support;

use std::time::Duration;

use mxmail::{DeliveryEvent, Mailer, MailerConfig};
use support::{MockConnector, MockLookup, Script};
use tokio::sync::watch;

fn config() -> MailerConfig {
    MailerConfig::new("relay.example.com")
}

fn mailer(lookup: MockLookup, connector: MockConnector) -> Mailer<MockLookup, MockConnector> {
    Mailer::with_parts(config(), lookup, connector).unwrap()
}

#[tokio::test]
async fn test_successful_delivery_removes_entry() {
    let connector = MockConnector::new(Script::Accept);
    let mailer = mailer(MockLookup::answering("y.com"), connector.clone());

    let id = mailer.send_mail("a@x.com", "b@y.com", Some("Hi"), Some("Hello"));
    let event = mailer.tick().await.unwrap();

    assert_eq!(
        event,
        DeliveryEvent::Delivered {
            id,
            host: "y.com".to_string(),
            secured: false,
        }
    );
    assert!(mailer.queue().is_empty());
    assert_eq!(connector.hosts(), vec!["y.com"]);
    assert!(mailer.tick().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_greeting_timeout_keeps_entry_until_retry_interval() {
    let connector = MockConnector::new(Script::Silent);
    let mailer = mailer(MockLookup::answering("y.com"), connector.clone());

    let id = mailer.send_mail("a@x.com", "b@y.com", Some("Hi"), Some("Hello"));
    let event = mailer.tick().await.unwrap();
    assert!(matches!(event, DeliveryEvent::AttemptFailed { attempt: 1, .. }));

    let entry = mailer.queue().get(id).unwrap();
    assert_eq!(entry.attempts, 1);
    assert!(entry.last_attempt_at.is_some());
    assert!(!entry.sent);

    // not eligible before the retry interval has passed
    assert!(mailer.tick().await.is_none());
    tokio::time::advance(Duration::from_secs(200)).await;
    assert!(mailer.tick().await.is_none());
    assert_eq!(connector.hosts().len(), 1);

    tokio::time::advance(Duration::from_secs(40)).await;
    assert!(mailer.tick().await.is_some());
    assert_eq!(mailer.queue().get(id).unwrap().attempts, 2);
}

#[tokio::test]
async fn test_starttls_delivery_uses_two_ehlos() {
    let connector = MockConnector::new(Script::AcceptWithStartTls);
    let mailer = mailer(MockLookup::answering("mx.y.com."), connector.clone());

    mailer.send_mail("a@x.com", "b@y.com", Some("Hi"), Some("Hello"));
    let event = mailer.tick().await.unwrap();

    assert!(matches!(
        event,
        DeliveryEvent::Delivered { secured: true, ref host, .. } if host == "mx.y.com"
    ));
    assert_eq!(connector.ehlo_count(), 2);
    assert!(mailer.queue().is_empty());
}

#[tokio::test]
async fn test_failed_lookup_connects_to_domain() {
    let lookup = MockLookup::failing();
    let connector = MockConnector::new(Script::Accept);
    let mailer = mailer(lookup.clone(), connector.clone());

    mailer.send_mail("a@x.com", "b@Y.com", None, None);
    let event = mailer.tick().await.unwrap();

    assert!(matches!(event, DeliveryEvent::Delivered { .. }));
    assert_eq!(lookup.queries(), vec!["y.com"]);
    assert_eq!(connector.hosts(), vec!["y.com"]);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_entry_is_never_selected_again() {
    let connector = MockConnector::new(Script::Silent);
    let config = MailerConfig::builder("relay.example.com")
        .retry_interval_ms(1000)
        .build();
    let mailer = Mailer::with_parts(config, MockLookup::answering("y.com"), connector.clone())
        .unwrap();
    let mut events = mailer.subscribe();

    let id = mailer.send_mail("a@x.com", "b@y.com", None, None);
    for attempt in 1..=4 {
        let event = mailer.tick().await.unwrap();
        if attempt < 4 {
            assert!(matches!(event, DeliveryEvent::AttemptFailed { .. }));
        } else {
            assert!(matches!(event, DeliveryEvent::Exhausted { attempts: 4, .. }));
        }
        assert_eq!(events.recv().await.unwrap(), event);
        tokio::time::advance(Duration::from_secs(1)).await;
    }

    for _ in 0..5 {
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(mailer.tick().await.is_none());
    }

    assert_eq!(connector.hosts().len(), 4);
    assert_eq!(mailer.queue().len(), 1);
    let exhausted = mailer.queue().exhausted(mailer.retry_policy());
    assert_eq!(exhausted.len(), 1);
    assert_eq!(exhausted[0].id, id);
}

#[tokio::test]
async fn test_malformed_recipient_consumes_an_attempt() {
    let connector = MockConnector::new(Script::Accept);
    let mailer = mailer(MockLookup::answering("y.com"), connector.clone());

    let id = mailer.send_mail("a@x.com", "not-an-address", None, None);
    let event = mailer.tick().await.unwrap();

    assert!(matches!(event, DeliveryEvent::AttemptFailed { attempt: 1, .. }));
    assert_eq!(mailer.queue().get(id).unwrap().attempts, 1);
    assert!(connector.hosts().is_empty());
}

#[tokio::test]
async fn test_one_entry_per_tick_in_submission_order() {
    let connector = MockConnector::new(Script::Accept);
    let mailer = mailer(MockLookup::answering("y.com"), connector.clone());

    let first = mailer.send_mail("a@x.com", "b@y.com", None, None);
    let second = mailer.send_mail("a@x.com", "c@y.com", None, None);

    assert_eq!(mailer.tick().await.unwrap().id(), first);
    assert_eq!(mailer.queue().len(), 1);
    assert_eq!(mailer.tick().await.unwrap().id(), second);
    assert!(mailer.queue().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_delivers_until_shutdown() {
    let connector = MockConnector::new(Script::Accept);
    let mailer = mailer(MockLookup::answering("y.com"), connector.clone());
    let mut events = mailer.subscribe();
    let (stop, shutdown) = watch::channel(false);

    let id = mailer.send_mail("a@x.com", "b@y.com", Some("Hi"), Some("Hello"));
    let waiter = async {
        let event = events.recv().await.unwrap();
        stop.send(true).unwrap();
        event
    };
    let ((), event) = tokio::join!(mailer.run(shutdown), waiter);

    assert_eq!(event.id(), id);
    assert!(event.is_final());
    assert!(mailer.queue().is_empty());
}

#[test]
fn test_missing_hostname_is_rejected() {
    let result = Mailer::with_parts(
        MailerConfig::default(),
        MockLookup::answering("y.com"),
        MockConnector::new(Script::Accept),
    );
    assert!(matches!(result, Err(mxmail::Error::Config(_))));
}
