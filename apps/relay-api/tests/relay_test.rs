//! End-to-end runs: the real relay served over TCP, driven by the
//! banter-client controller instead of a raw socket.

mod common;

use std::time::Duration;

use tokio::time;

use banter_client::{ChatClient, LinkStatus};

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn binding_to_the_relay_connects_and_registers_presence() {
    let (state, _sink) = common::test_state();
    let addr = common::start_server(state).await;

    let client = ChatClient::new(format!("ws://{addr}/gateway"));
    client.bind(Some("alice")).await.expect("connect");

    assert_eq!(client.status(), LinkStatus::Connected);
    wait_until(|| client.online_users() == ["alice"]).await;
}

#[tokio::test]
async fn two_clients_exchange_messages() {
    let (state, _sink) = common::test_state();
    let addr = common::start_server(state).await;

    let alice = ChatClient::new(format!("ws://{addr}/gateway"));
    alice.bind(Some("alice")).await.expect("connect alice");
    let bob = ChatClient::new(format!("ws://{addr}/gateway"));
    bob.bind(Some("bob")).await.expect("connect bob");

    wait_until(|| alice.online_users() == ["alice", "bob"]).await;

    alice.send_message("bob", "hello bob");

    wait_until(|| bob.messages().len() == 1).await;
    assert_eq!(bob.messages()[0].text, "hello bob");
    assert_eq!(bob.messages()[0].sender_id, "alice");

    // The sender's mirror gets the broadcast too.
    wait_until(|| alice.messages().len() == 1).await;
}

#[tokio::test]
async fn a_late_joiner_catches_up_through_get_messages() {
    let (state, _sink) = common::test_state();
    let addr = common::start_server(state).await;

    let alice = ChatClient::new(format!("ws://{addr}/gateway"));
    alice.bind(Some("alice")).await.expect("connect alice");
    wait_until(|| alice.online_users() == ["alice"]).await;

    // Bob is offline while these are sent.
    alice.send_message("bob", "first");
    wait_until(|| alice.messages().len() == 1).await;
    alice.send_message("bob", "second");
    wait_until(|| alice.messages().len() == 2).await;

    let bob = ChatClient::new(format!("ws://{addr}/gateway"));
    bob.bind(Some("bob")).await.expect("connect bob");
    wait_until(|| bob.online_users() == ["alice", "bob"]).await;
    assert!(bob.messages().is_empty());

    bob.get_messages("alice");
    wait_until(|| bob.messages().len() == 2).await;

    let texts: Vec<String> = bob.messages().iter().map(|m| m.text.clone()).collect();
    assert_eq!(texts, vec!["first", "second"]);
}

#[tokio::test]
async fn clearing_a_chat_empties_the_requesting_mirror() {
    let (state, _sink) = common::test_state();
    let addr = common::start_server(state).await;

    let alice = ChatClient::new(format!("ws://{addr}/gateway"));
    alice.bind(Some("alice")).await.expect("connect alice");
    let bob = ChatClient::new(format!("ws://{addr}/gateway"));
    bob.bind(Some("bob")).await.expect("connect bob");
    wait_until(|| alice.online_users() == ["alice", "bob"]).await;

    alice.send_message("bob", "regrettable");
    wait_until(|| alice.messages().len() == 1).await;
    wait_until(|| bob.messages().len() == 1).await;

    alice.clear_chat("bob");
    wait_until(|| alice.messages().is_empty()).await;

    // Bob's mirror is untouched until he asks again; the history itself
    // no longer has the cleared direction.
    assert_eq!(bob.messages().len(), 1);
    bob.get_messages("alice");
    wait_until(|| bob.messages().is_empty()).await;
}

#[tokio::test]
async fn rebinding_swaps_the_presence_identity() {
    let (state, _sink) = common::test_state();
    let addr = common::start_server(state).await;

    let observer = ChatClient::new(format!("ws://{addr}/gateway"));
    observer.bind(Some("watcher")).await.expect("connect");

    let client = ChatClient::new(format!("ws://{addr}/gateway"));
    client.bind(Some("alice")).await.expect("connect");
    wait_until(|| observer.online_users() == ["alice", "watcher"]).await;

    client.bind(Some("alicia")).await.expect("rebind");

    wait_until(|| observer.online_users() == ["alicia", "watcher"]).await;
    assert_eq!(client.identity().as_deref(), Some("alicia"));
}

#[tokio::test]
async fn unbinding_goes_idle_and_offline() {
    let (state, _sink) = common::test_state();
    let addr = common::start_server(state).await;

    let alice = ChatClient::new(format!("ws://{addr}/gateway"));
    alice.bind(Some("alice")).await.expect("connect alice");
    let bob = ChatClient::new(format!("ws://{addr}/gateway"));
    bob.bind(Some("bob")).await.expect("connect bob");
    wait_until(|| bob.online_users() == ["alice", "bob"]).await;

    alice.bind(None).await.expect("unbind");

    assert_eq!(alice.status(), LinkStatus::Idle);
    wait_until(|| bob.online_users() == ["bob"]).await;
}
