//! Integration tests for responder / initiator bootstrap over loopback

mod common;

use std::net::SocketAddr;

use ::common::chat::{event_channel, EventReceiver, SessionEvent};
use ::common::identity::Identity;
use ::common::peer::{
    dial, BootstrapError, Chat, ChatContext, Node, PeerDirectory, RemotePeer, Role,
};
use tokio::sync::{broadcast, watch};

use self::common::wait_for;

struct TestNode {
    node: Node,
    context: ChatContext,
    input: broadcast::Sender<String>,
    events: EventReceiver,
    shutdown: watch::Sender<()>,
}

async fn test_node(name: &str) -> anyhow::Result<TestNode> {
    let loopback: SocketAddr = "127.0.0.1:0".parse()?;
    let node = Node::builder()
        .identity(Identity::generate()?)
        .listen_addrs([loopback])
        .local_only(true)
        .build()
        .await?;

    let (input, input_rx) = broadcast::channel(16);
    let (events_tx, events) = event_channel();
    let (shutdown, shutdown_rx) = watch::channel(());
    let context = ChatContext::new(name, "/peerchat/1.0.0", input_rx, events_tx, shutdown_rx);

    Ok(TestNode {
        node,
        context,
        input,
        events,
        shutdown,
    })
}

#[tokio::test]
async fn test_unresolvable_peer_is_unknown() -> anyhow::Result<()> {
    let alice = test_node("alice").await?;
    let ghost = RemotePeer::new("ghost", vec!["not-an-address".to_string()]);

    let result = dial(&alice.node, &ghost, &alice.context).await;
    assert!(matches!(result, Err(BootstrapError::UnknownPeer(name)) if name == "ghost"));
    alice.node.close().await;
    Ok(())
}

#[tokio::test]
async fn test_initiator_skips_bad_peers_and_chats_with_the_rest() -> anyhow::Result<()> {
    let mut bob = test_node("bob").await?;
    let bob_dial = bob.node.dial_addrs();
    let bob_chat = Chat::start(bob.node.clone(), &PeerDirectory::default(), bob.context.clone()).await;
    assert_eq!(bob_chat.role(), Role::Responder);
    wait_for(&mut bob.events, |e| matches!(e, SessionEvent::Welcome { .. })).await;

    let mut alice = test_node("alice").await?;
    let directory = PeerDirectory::new(vec![
        RemotePeer::new("ghost", vec!["garbage".to_string()]),
        RemotePeer::new("bob", bob_dial),
    ]);
    let alice_chat = Chat::start(alice.node.clone(), &directory, alice.context.clone()).await;
    assert_eq!(alice_chat.role(), Role::Initiator);
    assert_eq!(alice_chat.active_sessions(), 1);

    let started = wait_for(&mut alice.events, |e| matches!(e, SessionEvent::Started { .. })).await;
    assert_eq!(
        started,
        SessionEvent::Started {
            peer: "bob".to_string()
        }
    );
    // the welcome banner comes after every peer was attempted
    wait_for(&mut alice.events, |e| matches!(e, SessionEvent::Welcome { .. })).await;

    // bob sees the session once alice's opening frame arrives
    wait_for(&mut bob.events, |e| matches!(e, SessionEvent::Started { .. })).await;

    alice.input.send("hello bob\n".to_string())?;
    let received = wait_for(&mut bob.events, |e| matches!(e, SessionEvent::Received { .. })).await;
    assert_eq!(
        received,
        SessionEvent::Received {
            sender: "alice".to_string(),
            text: "hello bob\n".to_string()
        }
    );

    bob.input.send("hi alice\n".to_string())?;
    let received = wait_for(&mut alice.events, |e| matches!(e, SessionEvent::Received { .. })).await;
    assert_eq!(
        received,
        SessionEvent::Received {
            sender: "bob".to_string(),
            text: "hi alice\n".to_string()
        }
    );

    alice.shutdown.send(())?;
    bob.shutdown.send(())?;
    alice_chat.shutdown().await;
    bob_chat.shutdown().await;
    Ok(())
}
