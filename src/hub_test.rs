use super::*;
use crate::message::ChatMessage;
use tokio::time::{Duration, timeout};

fn message_event(content: &str) -> ChatEvent {
    ChatEvent::Message(ChatMessage::new(content, Uuid::new_v4(), "tester"))
}

async fn assert_receives(rx: &mut mpsc::Receiver<ChatEvent>, content: &str) {
    let event = timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("event receive timed out")
        .expect("channel closed");
    let ChatEvent::Message(msg) = event;
    assert_eq!(msg.content, content);
}

async fn assert_empty(rx: &mut mpsc::Receiver<ChatEvent>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected channel to remain empty"
    );
}

#[test]
fn channel_name_is_symmetric_and_deterministic() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    assert_eq!(channel_name(a, b), channel_name(b, a));
    assert_eq!(channel_name(a, b), channel_name(a, b));
    assert_ne!(channel_name(a, b), channel_name(a, Uuid::new_v4()));
}

#[test]
fn channel_name_joins_sorted_ids() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let name = channel_name(a, b);

    let (left, right) = name.split_once('_').expect("name should contain separator");
    assert!(left <= right);
    assert!([a.to_string(), b.to_string()].contains(&left.to_string()));
}

#[tokio::test]
async fn publish_reaches_all_subscribers_except_excluded() {
    let hub = ChannelHub::default();

    let (sub_a, mut rx_a) = hub.subscribe("room");
    let (_sub_b, mut rx_b) = hub.subscribe("room");
    let (_sub_c, mut rx_c) = hub.subscribe("room");

    let delivered = hub.publish("room", &message_event("hi"), Some(sub_a));
    assert_eq!(delivered, 2);

    assert_receives(&mut rx_b, "hi").await;
    assert_receives(&mut rx_c, "hi").await;
    assert_empty(&mut rx_a).await;
}

#[tokio::test]
async fn publish_does_not_cross_channels() {
    let hub = ChannelHub::default();
    let (_sub_a, mut rx_a) = hub.subscribe("room-one");
    let (_sub_b, mut rx_b) = hub.subscribe("room-two");

    hub.publish("room-one", &message_event("hello"), None);

    assert_receives(&mut rx_a, "hello").await;
    assert_empty(&mut rx_b).await;
}

#[tokio::test]
async fn publish_to_unknown_channel_delivers_nothing() {
    let hub = ChannelHub::default();
    assert_eq!(hub.publish("nobody-home", &message_event("hi"), None), 0);
}

#[tokio::test]
async fn full_subscriber_queue_is_skipped_not_blocked() {
    let hub = ChannelHub::new(1);
    let (_sub, mut rx) = hub.subscribe("room");

    assert_eq!(hub.publish("room", &message_event("first"), None), 1);
    // Queue of one is now full; the second publish must skip, not block.
    assert_eq!(hub.publish("room", &message_event("second"), None), 0);

    assert_receives(&mut rx, "first").await;
    assert_empty(&mut rx).await;
}

#[tokio::test]
async fn unsubscribe_stops_delivery_and_evicts_empty_channel() {
    let hub = ChannelHub::default();
    let (sub, mut rx) = hub.subscribe("room");
    assert_eq!(hub.subscriber_count("room"), 1);

    hub.unsubscribe("room", sub);
    assert_eq!(hub.subscriber_count("room"), 0);
    assert_eq!(hub.publish("room", &message_event("hi"), None), 0);
    assert_empty(&mut rx).await;
}

#[tokio::test]
async fn binding_connects_through_acknowledged_states() {
    let hub = Arc::new(ChannelHub::default());
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    let mut binding = ChannelBinding::new(hub.clone(), a, b);
    assert_eq!(binding.state(), ChannelState::Disconnected);
    assert!(!binding.is_connected());

    let _rx = binding.connect();
    assert_eq!(binding.state(), ChannelState::Connected);
    assert_eq!(hub.subscriber_count(binding.channel()), 1);

    binding.close();
    assert_eq!(binding.state(), ChannelState::Disconnected);
    assert_eq!(hub.subscriber_count(&channel_name(a, b)), 0);
}

#[tokio::test]
async fn send_while_disconnected_is_a_silent_drop() {
    let hub = Arc::new(ChannelHub::default());
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    // Peer is listening on the pair channel the whole time.
    let (_peer, mut peer_rx) = hub.subscribe(&channel_name(a, b));

    let binding = ChannelBinding::new(hub.clone(), a, b);
    assert!(!binding.send(&message_event("lost")));
    assert_empty(&mut peer_rx).await;

    let mut binding = binding;
    let _rx = binding.connect();
    assert!(binding.send(&message_event("delivered")));
    assert_receives(&mut peer_rx, "delivered").await;
}

#[tokio::test]
async fn sender_does_not_receive_its_own_publish() {
    let hub = Arc::new(ChannelHub::default());
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    let mut binding_a = ChannelBinding::new(hub.clone(), a, b);
    let mut binding_b = ChannelBinding::new(hub.clone(), b, a);
    let mut rx_a = binding_a.connect();
    let mut rx_b = binding_b.connect();

    assert!(binding_a.send(&message_event("hi")));

    assert_receives(&mut rx_b, "hi").await;
    assert_empty(&mut rx_a).await;
}

#[tokio::test]
async fn dropping_a_binding_releases_its_subscription() {
    let hub = Arc::new(ChannelHub::default());
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let name = channel_name(a, b);

    {
        let mut binding = ChannelBinding::new(hub.clone(), a, b);
        let _rx = binding.connect();
        assert_eq!(hub.subscriber_count(&name), 1);
    }

    assert_eq!(hub.subscriber_count(&name), 0);
}

#[tokio::test]
async fn reconnect_replaces_the_previous_subscription() {
    let hub = Arc::new(ChannelHub::default());
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    let mut binding = ChannelBinding::new(hub.clone(), a, b);
    let _old_rx = binding.connect();
    let mut new_rx = binding.connect();
    assert_eq!(hub.subscriber_count(binding.channel()), 1);

    hub.publish(binding.channel(), &message_event("after-reconnect"), None);
    assert_receives(&mut new_rx, "after-reconnect").await;
}
