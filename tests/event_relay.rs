// tests/event_relay.rs

use std::sync::Arc;

use scriptrun::relay::{ChannelSink, EventBus, NullSink, Relay};
use scriptrun::{EventSink, KeyedEvent, ScriptEvent};
use scriptrun_test_utils::recording::RecordingSink;
use tokio::sync::broadcast::error::TryRecvError;

fn output(data: &str) -> ScriptEvent {
    ScriptEvent::Output { data: data.to_string() }
}

#[test]
fn events_serialize_as_tagged_objects() {
    let json = |e: &ScriptEvent| serde_json::to_value(e).unwrap();

    assert_eq!(
        json(&ScriptEvent::CommandStart { command: "npm ci".into() }),
        serde_json::json!({"type": "command-start", "command": "npm ci"})
    );
    assert_eq!(
        json(&output("hi\n")),
        serde_json::json!({"type": "output", "data": "hi\n"})
    );
    assert_eq!(
        json(&ScriptEvent::Error { command: Some("exit 1".into()), exit_code: Some(1) }),
        serde_json::json!({"type": "error", "command": "exit 1", "exitCode": 1})
    );
    assert_eq!(
        json(&ScriptEvent::Error { command: None, exit_code: None }),
        serde_json::json!({"type": "error"})
    );
    assert_eq!(json(&ScriptEvent::Done), serde_json::json!({"type": "done"}));
}

#[test]
fn keyed_event_flattens_the_event() {
    let keyed = KeyedEvent {
        key: "checkout-a".into(),
        event: ScriptEvent::Done,
    };
    assert_eq!(
        serde_json::to_value(&keyed).unwrap(),
        serde_json::json!({"key": "checkout-a", "type": "done"})
    );
}

#[test]
fn only_done_and_error_are_terminal() {
    assert!(ScriptEvent::Done.is_terminal());
    assert!(ScriptEvent::Error { command: None, exit_code: Some(2) }.is_terminal());
    assert!(!output("x").is_terminal());
    assert!(!ScriptEvent::CommandStart { command: "x".into() }.is_terminal());
}

#[tokio::test]
async fn bus_delivers_per_key_in_order() {
    let bus = EventBus::new(16);
    let mut a = bus.subscribe("a");
    let mut b = bus.subscribe("b");

    bus.publish("a", &output("1"));
    bus.publish("b", &output("other"));
    bus.publish("a", &output("2"));
    bus.publish("a", &ScriptEvent::Done);

    assert_eq!(a.recv().await.unwrap(), output("1"));
    assert_eq!(a.recv().await.unwrap(), output("2"));
    assert_eq!(a.recv().await.unwrap(), ScriptEvent::Done);
    assert_eq!(b.recv().await.unwrap(), output("other"));
    assert!(matches!(b.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn bus_supports_several_subscribers_per_key() {
    let bus = EventBus::default();
    let mut first = bus.subscribe("k");
    let mut second = bus.subscribe("k");
    assert_eq!(bus.topic_count(), 1);

    bus.publish("k", &ScriptEvent::Done);

    assert_eq!(first.try_recv().unwrap(), ScriptEvent::Done);
    assert_eq!(second.try_recv().unwrap(), ScriptEvent::Done);
}

#[test]
fn bus_ignores_unsubscribed_keys_and_drops_dead_topics() {
    let bus = EventBus::new(4);
    bus.publish("nobody", &ScriptEvent::Done);
    assert_eq!(bus.topic_count(), 0);

    let rx = bus.subscribe("gone");
    drop(rx);
    bus.publish("gone", &ScriptEvent::Done);
    assert_eq!(bus.topic_count(), 0);
}

#[test]
fn slow_bus_subscriber_lags_instead_of_blocking() {
    let bus = EventBus::new(2);
    let mut rx = bus.subscribe("k");

    for i in 0..5 {
        bus.publish("k", &output(&i.to_string()));
    }

    assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(3))));
    assert_eq!(rx.try_recv().unwrap(), output("3"));
}

#[test]
fn channel_sink_tags_events_with_their_key() {
    let (sink, mut rx) = ChannelSink::new();

    sink.publish("k1", &ScriptEvent::CommandStart { command: "ls".into() });
    sink.publish("k2", &ScriptEvent::Done);

    assert_eq!(
        rx.try_recv().unwrap(),
        KeyedEvent {
            key: "k1".into(),
            event: ScriptEvent::CommandStart { command: "ls".into() },
        }
    );
    assert_eq!(rx.try_recv().unwrap().key, "k2");
}

#[test]
fn channel_sink_survives_a_torn_down_receiver() {
    let (sink, rx) = ChannelSink::new();
    drop(rx);

    assert!(sink.is_closed());
    sink.publish("k", &ScriptEvent::Done);
}

#[test]
fn relay_fans_out_to_every_sink() {
    let recorded = RecordingSink::new();
    let bus = Arc::new(EventBus::new(8));
    let mut rx = bus.subscribe("k");
    let (channel, mut channel_rx) = ChannelSink::new();

    let relay = Relay::new()
        .with_sink(recorded.clone())
        .with_sink(bus.clone())
        .with_sink(Arc::new(channel))
        .with_sink(Arc::new(NullSink));
    assert_eq!(relay.len(), 4);

    relay.publish("k", &output("x"));

    assert_eq!(recorded.events_for("k"), vec![output("x")]);
    assert_eq!(rx.try_recv().unwrap(), output("x"));
    assert_eq!(channel_rx.try_recv().unwrap().event, output("x"));
}

#[test]
fn empty_relay_is_a_no_op() {
    let relay = Relay::new();
    assert!(relay.is_empty());
    relay.publish("k", &ScriptEvent::Done);
}
