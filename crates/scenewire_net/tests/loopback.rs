//! Node and client talking over real sockets and in-memory pipes.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use scenewire_net::asset_channel::serve_assets;
use scenewire_net::{
    fetch, fetch_from, probe, probe_over, AssetSource, Client, ClientOptions, MemoryAssetSource,
    NetError, Node, NodeConfig, PrimaryChannel,
};
use scenewire_protocol::catalog::components::component_type;
use scenewire_protocol::catalog::Component;
use scenewire_protocol::{
    ComponentRegistry, ContentMessage, IntroductionReply, LargeAssetProtocol, MemoryScene,
    Message, Role, TransferTable,
};
use scenewire_shared::PROTOCOL_VERSION;
use tokio::io::duplex;
use tokio::net::TcpListener;

fn lab_config() -> NodeConfig {
    NodeConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        session_name: "lab".into(),
        large_asset_protocol: "ws".into(),
        large_asset_ports: vec![50001],
        ..NodeConfig::default()
    }
}

async fn spawn_node() -> (std::net::SocketAddr, Arc<Mutex<MemoryScene>>) {
    let store = Arc::new(Mutex::new(MemoryScene::default()));
    let node = Arc::new(
        Node::new(lab_config(), Arc::clone(&store))
            .unwrap()
            .with_icon(vec![0x89, b'P', b'N', b'G']),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(node.serve(listener));
    (addr, store)
}

#[tokio::test]
async fn client_session_over_tcp() {
    let (addr, store) = spawn_node().await;
    let options = ClientOptions {
        name: "viewer".into(),
        ..ClientOptions::default()
    };
    let mut client = Client::connect(addr, &options).await.unwrap();
    assert!(client.session().is_established());

    let intro = client.introduction_reply();
    assert_eq!(intro.protocol_version, PROTOCOL_VERSION);
    assert_eq!(intro.session_name, "lab");
    assert_eq!(intro.large_asset_protocol, LargeAssetProtocol::Ws);
    assert_eq!(
        client.large_asset_addresses().unwrap(),
        vec!["127.0.0.1:50001".parse::<std::net::SocketAddr>().unwrap()]
    );

    let name = Component::Name("Cube".into()).modify(&[1]).unwrap();
    let accepted = client
        .named_transaction(vec![ContentMessage::CreateEntities(vec![1]), name])
        .await
        .unwrap();
    assert!(accepted.code.is_accept());

    // Re-creating the entity breaks the default reject policy.
    let rejected = client
        .named_transaction(vec![ContentMessage::CreateEntities(vec![1])])
        .await
        .unwrap();
    assert!(!rejected.code.is_accept());
    assert_eq!(client.pending_replies(), 0);

    // An unnamed transaction followed by a named one: ordering guarantees the
    // first was applied by the time the reply arrives.
    client
        .send_transaction(vec![ContentMessage::CreateEntities(vec![2])])
        .await
        .unwrap();
    let last = client
        .named_transaction(vec![ContentMessage::DeleteEntities(vec![1])])
        .await
        .unwrap();
    assert!(last.code.is_accept());
    client.close().await.unwrap();

    let scene = store.lock();
    assert!(!scene.contains_entity(1));
    assert!(scene.contains_entity(2));
    assert_eq!(scene.component(1, component_type::NAME), None);
}

#[tokio::test]
async fn probe_over_tcp() {
    let (addr, _) = spawn_node().await;
    let reply = probe(addr).await.unwrap();
    assert_eq!(reply.session_name, "lab");
    assert_eq!(reply.icon(), Some(&[0x89, b'P', b'N', b'G'][..]));
}

#[tokio::test]
async fn probe_against_silent_peer() {
    let (a, b) = duplex(64);
    drop(b);
    assert!(probe_over(a, 1024).await.is_err());
}

#[tokio::test]
async fn missing_reply_times_out() {
    let (a, b) = duplex(1024);

    // A responder that completes the handshake and then ignores everything.
    let responder = tokio::spawn(async move {
        let mut channel =
            PrimaryChannel::new(b, Role::Responder, Arc::new(ComponentRegistry::default()), 1024);
        let Some(Message::Introduction(_)) = channel.recv().await.unwrap() else {
            panic!("expected an introduction");
        };
        channel
            .send(&Message::IntroductionReply(IntroductionReply {
                protocol_version: PROTOCOL_VERSION,
                session_name: "mute".into(),
                large_asset_protocol: LargeAssetProtocol::None,
                large_asset_ports: Vec::new(),
            }))
            .await
            .unwrap();
        while channel.recv().await.unwrap().is_some() {}
    });

    let options = ClientOptions {
        reply_timeout: Duration::from_millis(50),
        ..ClientOptions::default()
    };
    let mut client = Client::handshake(a, &options).await.unwrap();
    let err = client
        .named_transaction(vec![ContentMessage::CreateEntities(vec![1])])
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::ReplyTimeout { .. }));
    assert_eq!(client.pending_replies(), 0);

    client.close().await.unwrap();
    responder.await.unwrap();
}

#[tokio::test]
async fn incompatible_client_is_turned_away() {
    let (addr, _) = spawn_node().await;
    let options = ClientOptions {
        protocol_version: PROTOCOL_VERSION + 1,
        ..ClientOptions::default()
    };
    let err = Client::connect(addr, &options).await.unwrap_err();
    assert!(matches!(err, NetError::HandshakeRejected), "got {err:?}");
}

#[tokio::test]
async fn concurrent_large_asset_fetches() {
    let source = Arc::new(MemoryAssetSource::new());
    let big: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    source.insert(1, "terrain.bin", big.clone());
    source.insert(2, "sky.png", vec![7u8; 10]);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let dyn_source: Arc<dyn AssetSource> = source;
    tokio::spawn(serve_assets(listener, dyn_source, 4096, 1 << 16));

    let transfers = TransferTable::new();
    let (first, second, missing) = tokio::join!(
        fetch_from(addr, 1, &transfers, 1 << 16),
        fetch_from(addr, 2, &transfers, 1 << 16),
        fetch_from(addr, 3, &transfers, 1 << 16),
    );
    assert_eq!(first.unwrap(), big);
    assert_eq!(second.unwrap(), vec![7u8; 10]);
    assert!(matches!(missing, Err(NetError::TransferFailed { id: 3, .. })));
    assert!(transfers.is_empty());
}

#[tokio::test]
async fn over_delivering_server_is_caught() {
    use scenewire_net::LargeAssetChannel;
    use scenewire_protocol::{LargeAssetMessage, LargeAssetReply, ProtocolError, TransferFault};

    let (client, server) = duplex(256);
    let rogue = tokio::spawn(async move {
        let mut channel = LargeAssetChannel::new(server, 1024);
        let Some(LargeAssetMessage::Request { id }) = channel.recv().await.unwrap() else {
            panic!("expected a request");
        };
        channel
            .send(&LargeAssetMessage::Reply(LargeAssetReply {
                id,
                asset_size: 4,
                name: "short".into(),
            }))
            .await
            .unwrap();
        // The client may hang up as soon as it sees the oversized chunk.
        let _ = channel.send(&LargeAssetMessage::Chunk(vec![0; 8])).await;
    });

    let transfers = TransferTable::new();
    let err = fetch(client, 5, &transfers, 1024).await.unwrap_err();
    assert!(matches!(
        err,
        NetError::Protocol(ProtocolError::TransferViolation {
            id: 5,
            fault: TransferFault::OverDelivery { .. }
        })
    ));
    assert!(transfers.is_empty());
    rogue.await.unwrap();
}
