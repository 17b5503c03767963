//! End-to-end session tests against a local CometD-speaking WebSocket server

use futures_util::{SinkExt, StreamExt};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};

use dxfeed_streamer::{
    EventType, MarketEvent, StaticTokenProvider, Streamer, StreamerConfig, StreamerError,
    TransportState,
};

const WAIT: Duration = Duration::from_secs(5);

struct MockServer {
    url: String,
    /// Every message the client sent, in order
    received: mpsc::UnboundedReceiver<Value>,
    /// Frames to push to the client
    outgoing: mpsc::UnboundedSender<Message>,
}

impl MockServer {
    async fn start(accept_handshake: bool) -> Self {
        Self::start_with(accept_handshake, Vec::new()).await
    }

    /// Like `start`, batching `alongside_connect` with the first connect reply
    async fn start_with(accept_handshake: bool, alongside_connect: Vec<Value>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (received_tx, received) = mpsc::unbounded_channel();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            let (mut sink, mut source) = ws.split();
            let mut connects = 0;
            let handshake_error = if accept_handshake {
                Value::Null
            } else {
                json!("403::token rejected")
            };

            loop {
                tokio::select! {
                    Some(incoming) = source.next() => {
                        let text = match incoming {
                            Ok(Message::Text(text)) => text,
                            Ok(Message::Close(_)) | Err(_) => break,
                            Ok(_) => continue,
                        };
                        let batch: Vec<Value> = serde_json::from_str(&text).unwrap();
                        for message in batch {
                            let reply = match message["channel"].as_str() {
                                Some("/meta/handshake") => Some(json!([{
                                    "channel": "/meta/handshake",
                                    "id": message["id"],
                                    "successful": accept_handshake,
                                    "clientId": "client-1",
                                    "version": "1.0",
                                    "error": handshake_error.clone(),
                                }])),
                                // later connects are held open, as a long poll would be
                                Some("/meta/connect") if connects == 0 => {
                                    connects += 1;
                                    let mut batch = vec![json!({
                                        "channel": "/meta/connect",
                                        "id": message["id"],
                                        "successful": true,
                                    })];
                                    batch.extend(alongside_connect.iter().cloned());
                                    Some(Value::Array(batch))
                                }
                                _ => None,
                            };
                            let _ = received_tx.send(message);
                            if let Some(reply) = reply {
                                sink.send(Message::Text(reply.to_string())).await.unwrap();
                            }
                        }
                    }
                    Some(frame) = outgoing_rx.recv() => {
                        sink.send(frame).await.unwrap();
                    }
                    else => break,
                }
            }
        });

        Self {
            url,
            received,
            outgoing,
        }
    }

    fn config(&self) -> StreamerConfig {
        StreamerConfig {
            url: self.url.clone(),
            token: "secret".to_string(),
            handshake_timeout: Duration::from_secs(2),
            event_queue_capacity: 16,
            ..StreamerConfig::default()
        }
    }

    fn tokens(&self) -> StaticTokenProvider {
        StaticTokenProvider::new("secret", &self.url)
    }

    /// Next client message on `channel`, skipping others
    async fn expect(&mut self, channel: &str) -> Value {
        timeout(WAIT, async {
            loop {
                let message = self.received.recv().await.expect("server stopped");
                if message["channel"] == channel {
                    return message;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no {channel} message from the client"))
    }

    fn push(&self, messages: Value) {
        self.outgoing
            .send(Message::Text(messages.to_string()))
            .unwrap();
    }
}

fn quote_values(symbol: &str) -> Vec<Value> {
    vec![
        json!(symbol),
        json!(0),
        json!(0),
        json!(0),
        json!(0),
        json!("Q"),
        json!(0),
        json!("Q"),
        json!(189.5),
        json!("NaN"),
        json!(100),
        json!("Infinity"),
    ]
}

#[tokio::test]
async fn test_handshake_carries_token_and_advice() {
    let mut server = MockServer::start(true).await;
    let streamer = Streamer::open(&server.config(), &server.tokens())
        .await
        .unwrap();

    let handshake = server.expect("/meta/handshake").await;
    assert_eq!(handshake["ext"]["com.devexperts.auth.AuthToken"], "secret");
    assert_eq!(handshake["advice"], json!({"interval": 0, "timeout": 60000}));
    assert_eq!(handshake["supportedConnectionTypes"], json!(["websocket"]));
    assert!(handshake.get("clientId").is_none());

    let connect = server.expect("/meta/connect").await;
    assert_eq!(connect["clientId"], "client-1");
    assert_eq!(connect["connectionType"], "websocket");
    assert!(connect.get("ext").is_none());

    // a fresh session starts from a clean slate
    let reset = server.expect("/service/sub").await;
    assert_eq!(reset["data"], json!({"reset": true}));
    assert_eq!(streamer.state(), TransportState::Connected);

    streamer.close().await.unwrap();
}

#[tokio::test]
async fn test_subscribe_sends_add_command() {
    let mut server = MockServer::start(true).await;
    let mut streamer = Streamer::open(&server.config(), &server.tokens())
        .await
        .unwrap();
    server.expect("/service/sub").await;

    streamer
        .subscribe(EventType::Quote, &["AAPL".to_string(), "MSFT".to_string()])
        .await
        .unwrap();

    let add = server.expect("/service/sub").await;
    assert_eq!(add["data"], json!({"add": {"Quote": ["AAPL", "MSFT"]}}));
    assert_eq!(add["clientId"], "client-1");
    assert!(add.get("ext").is_none());
    assert_eq!(streamer.state(), TransportState::Subscribed);
    assert!(streamer.registry().is_subscribed(EventType::Quote, "MSFT"));

    streamer.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_replies_are_answered() {
    let mut server = MockServer::start(true).await;
    let streamer = Streamer::open(&server.config(), &server.tokens())
        .await
        .unwrap();
    server.expect("/meta/connect").await;

    server.push(json!([{"channel": "/meta/connect", "successful": true}]));
    let heartbeat = server.expect("/meta/connect").await;
    assert_eq!(heartbeat["clientId"], "client-1");

    streamer.close().await.unwrap();
}

#[tokio::test]
async fn test_data_frames_reach_listen() {
    let server = MockServer::start(true).await;
    let mut streamer = Streamer::open(&server.config(), &server.tokens())
        .await
        .unwrap();

    server.push(json!([
        {"channel": "/service/sub", "successful": true},
        {"channel": "/service/data", "data": [["Quote", ["eventSymbol"]], quote_values("AAPL")]},
    ]));
    server.push(json!([
        {"channel": "/service/data", "data": ["Quote", quote_values("MSFT")]},
    ]));

    let first = timeout(WAIT, streamer.listen().next_event())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let quote = match first {
        MarketEvent::Quote(quote) => quote,
        other => panic!("expected a quote, got {other:?}"),
    };
    assert_eq!(quote.event_symbol, "AAPL");
    assert_eq!(quote.bid_price, Some(dec!(189.5)));
    assert_eq!(quote.ask_price, None);
    assert_eq!(quote.bid_size, Some(100));
    assert_eq!(quote.ask_size, None);

    let second = timeout(WAIT, streamer.listen().next_event())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(second.symbol(), "MSFT");

    streamer.close().await.unwrap();
}

#[tokio::test]
async fn test_rejected_handshake_fails_open() {
    let server = MockServer::start(false).await;
    let result = Streamer::open(&server.config(), &server.tokens()).await;

    match result {
        Err(StreamerError::HandshakeFailure(reason)) => assert!(reason.contains("403")),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("handshake should have been rejected"),
    }
}

#[tokio::test]
async fn test_unreachable_endpoint_fails_open() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = StreamerConfig {
        url: url.clone(),
        ..StreamerConfig::default()
    };
    let result = Streamer::open(&config, &StaticTokenProvider::new("secret", url)).await;
    assert!(matches!(result, Err(StreamerError::HandshakeFailure(_))));
}

#[tokio::test]
async fn test_close_sends_disconnect() {
    let mut server = MockServer::start(true).await;
    let streamer = Streamer::open(&server.config(), &server.tokens())
        .await
        .unwrap();

    streamer.close().await.unwrap();
    let disconnect = server.expect("/meta/disconnect").await;
    assert_eq!(disconnect["clientId"], "client-1");
}

#[tokio::test]
async fn test_cancellation_ends_listen() {
    let server = MockServer::start(true).await;
    let mut streamer = Streamer::open(&server.config(), &server.tokens())
        .await
        .unwrap();

    let cancel = streamer.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let next = timeout(WAIT, streamer.listen().next_event()).await.unwrap();
    assert!(next.is_none());
    assert!(streamer.listen().is_closed());
}

#[tokio::test]
async fn test_server_close_is_terminal() {
    let server = MockServer::start(true).await;
    let mut streamer = Streamer::open(&server.config(), &server.tokens())
        .await
        .unwrap();

    server.outgoing.send(Message::Close(None)).unwrap();

    let next = timeout(WAIT, streamer.listen().next_event()).await.unwrap();
    assert!(matches!(next, Some(Err(StreamerError::Disconnected(_)))));
    assert!(streamer.listen().next_event().await.is_none());

    // the reader marks the transport down as it exits
    timeout(WAIT, async {
        while streamer.state() != TransportState::Disconnected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let err = streamer
        .subscribe(EventType::Trade, &["SPY".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, StreamerError::NotConnected { .. }));

    timeout(WAIT, streamer.close()).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_close_after_cancel_sends_disconnect() {
    let mut server = MockServer::start(true).await;
    let mut streamer = Streamer::open(&server.config(), &server.tokens())
        .await
        .unwrap();
    server.expect("/service/sub").await;

    streamer.cancellation_token().cancel();
    let next = timeout(WAIT, streamer.listen().next_event()).await.unwrap();
    assert!(next.is_none());

    timeout(WAIT, streamer.close()).await.unwrap().unwrap();
    let disconnect = server.expect("/meta/disconnect").await;
    assert_eq!(disconnect["clientId"], "client-1");
}

#[tokio::test]
async fn test_close_returns_when_queue_is_full_at_server_close() {
    let server = MockServer::start(true).await;
    let config = StreamerConfig {
        event_queue_capacity: 1,
        ..server.config()
    };
    let streamer = Streamer::open(&config, &server.tokens()).await.unwrap();

    // fills the queue; nothing is listening
    server.push(json!([
        {"channel": "/service/data", "data": [["Quote", ["eventSymbol"]], quote_values("AAPL")]},
    ]));
    server.outgoing.send(Message::Close(None)).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let closed = timeout(Duration::from_secs(3), streamer.close()).await;
    assert!(matches!(closed, Ok(Ok(()))));
}

#[tokio::test]
async fn test_messages_batched_with_connect_reply_reach_listen() {
    let server = MockServer::start_with(
        true,
        vec![json!({
            "channel": "/service/data",
            "data": [["Quote", ["eventSymbol"]], quote_values("AAPL")],
        })],
    )
    .await;
    let mut streamer = Streamer::open(&server.config(), &server.tokens())
        .await
        .unwrap();

    let first = timeout(WAIT, streamer.listen().next_event())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(first.symbol(), "AAPL");

    streamer.close().await.unwrap();
}
