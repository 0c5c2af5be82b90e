//! Per-connection protocol handling.

use crate::broadcast::SyncBroadcaster;
use crate::error::ServerResult;
use crate::events::{ActivityEvent, ActivityPublisher};
use crate::registry::{ConnectionId, DeviceConnectionRegistry};
use crate::sink::ConnectionSink;
use driftsync_protocol::{now_millis, ClientAction, ClientEnvelope, ServerFrame};
use std::sync::Arc;

/// Identity of an open connection, returned by [`ConnectionHandler::open`].
#[derive(Clone)]
pub struct ConnectionSession {
    id: ConnectionId,
    user_id: String,
    device_id: String,
    sink: Arc<dyn ConnectionSink>,
}

impl ConnectionSession {
    /// The connection's registry id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Owning account.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Device behind this connection.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

/// Decodes inbound connection messages into actions and drives the
/// broadcaster.
///
/// Messages on one connection are processed in arrival order by whatever
/// task owns the transport; the handler itself is stateless across calls and
/// safe to share.
pub struct ConnectionHandler {
    registry: Arc<DeviceConnectionRegistry>,
    broadcaster: Arc<SyncBroadcaster>,
    events: ActivityPublisher,
}

impl ConnectionHandler {
    /// Creates a handler over the given registry and broadcaster.
    pub fn new(
        registry: Arc<DeviceConnectionRegistry>,
        broadcaster: Arc<SyncBroadcaster>,
        events: ActivityPublisher,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            events,
        }
    }

    /// Accepts a connection.
    ///
    /// Identity is validated before any message exchange: a missing
    /// `user_id` or `device_id` is refused and the transport adapter closes
    /// with a policy-violation code. On success the `sync:connected`
    /// greeting is sent before the caller feeds any message in.
    pub fn open(
        &self,
        user_id: &str,
        device_id: &str,
        sink: Arc<dyn ConnectionSink>,
    ) -> ServerResult<ConnectionSession> {
        let now = now_millis();
        let id = self.registry.add(user_id, device_id, Arc::clone(&sink), now)?;

        let greeting = ServerFrame::Connected {
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            timestamp: now,
        };
        if let Err(e) = sink.send(&greeting) {
            self.registry.remove(id);
            return Err(e);
        }

        self.events.publish(ActivityEvent::ConnectionOpened {
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
        });

        Ok(ConnectionSession {
            id,
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            sink,
        })
    }

    /// Processes one inbound message.
    ///
    /// Parse failures and unknown actions are answered on the same channel
    /// and never close the connection. A failed reply tears down this
    /// connection only; nothing escalates past the registry removal.
    pub fn handle_frame(&self, session: &ConnectionSession, raw: &str) {
        let now = now_millis();
        match ClientEnvelope::decode(raw) {
            Err(_) => self.reply(session, &ServerFrame::error("Invalid message format")),
            Ok(envelope) => match envelope.action {
                ClientAction::Ping => {
                    self.registry.touch(session.id, now);
                    self.reply(session, &ServerFrame::Pong { timestamp: now });
                }
                ClientAction::Broadcast => {
                    self.registry.touch(session.id, now);
                    let delivered = self.broadcaster.relay(
                        &session.user_id,
                        session.id,
                        &ServerFrame::Data(envelope.payload),
                    );
                    self.events.publish(ActivityEvent::BroadcastRelayed {
                        user_id: session.user_id.clone(),
                        delivered,
                    });
                }
                ClientAction::Unknown(_) => {
                    self.reply(session, &ServerFrame::error("Unknown action"));
                }
            },
        }
    }

    /// Deregisters the connection on client close or transport failure.
    ///
    /// Closing twice is a no-op; fan-out in flight to this connection is
    /// dropped silently by the broadcaster.
    pub fn close(&self, session: &ConnectionSession) {
        if self.registry.remove(session.id) {
            self.events.publish(ActivityEvent::ConnectionClosed {
                user_id: session.user_id.clone(),
                device_id: session.device_id.clone(),
            });
        }
    }

    fn reply(&self, session: &ConnectionSession, frame: &ServerFrame) {
        if let Err(e) = session.sink.send(frame) {
            tracing::warn!("reply to connection {} failed: {}", session.id, e);
            self.registry.remove(session.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use serde_json::json;

    struct Setup {
        registry: Arc<DeviceConnectionRegistry>,
        handler: ConnectionHandler,
    }

    impl Setup {
        fn new() -> Self {
            let registry = Arc::new(DeviceConnectionRegistry::new());
            let broadcaster = Arc::new(SyncBroadcaster::new(Arc::clone(&registry)));
            let handler = ConnectionHandler::new(
                Arc::clone(&registry),
                broadcaster,
                ActivityPublisher::disabled(),
            );
            Self { registry, handler }
        }

        fn connect(&self, user: &str, device: &str) -> (ConnectionSession, Arc<RecordingSink>) {
            let sink = Arc::new(RecordingSink::new());
            let session = self
                .handler
                .open(user, device, Arc::clone(&sink) as Arc<dyn ConnectionSink>)
                .unwrap();
            (session, sink)
        }
    }

    #[test]
    fn open_sends_greeting_first() {
        let setup = Setup::new();
        let (session, sink) = setup.connect("u1", "d1");

        let frames = sink.frames();
        assert_eq!(frames.len(), 1);
        let value = frames[0].to_value();
        assert_eq!(value["type"], "sync:connected");
        assert_eq!(value["payload"]["userId"], "u1");
        assert_eq!(value["payload"]["deviceId"], "d1");
        assert_eq!(session.user_id(), "u1");
    }

    #[test]
    fn open_refuses_empty_identity() {
        let setup = Setup::new();
        let sink = Arc::new(RecordingSink::new()) as Arc<dyn ConnectionSink>;

        assert!(setup.handler.open("", "d1", Arc::clone(&sink)).is_err());
        assert!(setup.handler.open("u1", "", sink).is_err());
        assert!(setup.registry.is_empty());
    }

    #[test]
    fn open_rolls_back_when_greeting_fails() {
        let setup = Setup::new();
        let sink = Arc::new(RecordingSink::new());
        sink.set_failing(true);

        let result = setup
            .handler
            .open("u1", "d1", sink as Arc<dyn ConnectionSink>);
        assert!(result.is_err());
        assert!(setup.registry.is_empty());
    }

    #[test]
    fn ping_gets_pong() {
        let setup = Setup::new();
        let (session, sink) = setup.connect("u1", "d1");

        setup
            .handler
            .handle_frame(&session, r#"{"action":"ping"}"#);

        let frames = sink.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].to_value()["type"], "pong");
    }

    #[test]
    fn broadcast_relays_to_others_only() {
        let setup = Setup::new();
        let (sender, sender_sink) = setup.connect("u1", "d1");
        let (_peer, peer_sink) = setup.connect("u1", "d2");

        setup.handler.handle_frame(
            &sender,
            r#"{"action":"broadcast","payload":{"kind":"note-changed","id":"r1"}}"#,
        );

        // Sender has only its greeting; the peer got greeting + data
        assert_eq!(sender_sink.frame_count(), 1);
        let frames = peer_sink.frames();
        assert_eq!(frames.len(), 2);
        let value = frames[1].to_value();
        assert_eq!(value["type"], "sync:data");
        assert_eq!(value["payload"]["id"], "r1");
    }

    #[test]
    fn unknown_action_keeps_connection_open() {
        let setup = Setup::new();
        let (session, sink) = setup.connect("u1", "d1");

        setup
            .handler
            .handle_frame(&session, r#"{"action":"subscribe"}"#);

        let frames = sink.frames();
        assert_eq!(frames[1], ServerFrame::Error("Unknown action".into()));
        assert_eq!(setup.registry.len(), 1);
    }

    #[test]
    fn malformed_message_keeps_connection_open() {
        let setup = Setup::new();
        let (session, sink) = setup.connect("u1", "d1");

        setup.handler.handle_frame(&session, "not json at all");

        let frames = sink.frames();
        assert_eq!(
            frames[1],
            ServerFrame::Error("Invalid message format".into())
        );
        assert_eq!(setup.registry.len(), 1);

        // The connection is still usable afterwards
        setup
            .handler
            .handle_frame(&session, r#"{"action":"ping"}"#);
        assert_eq!(sink.frame_count(), 3);
    }

    #[test]
    fn failed_reply_tears_down_connection() {
        let setup = Setup::new();
        let (session, sink) = setup.connect("u1", "d1");
        sink.set_failing(true);

        setup
            .handler
            .handle_frame(&session, r#"{"action":"ping"}"#);

        assert!(setup.registry.is_empty());
    }

    #[test]
    fn ping_refreshes_activity() {
        let setup = Setup::new();
        let (session, _sink) = setup.connect("u1", "d1");
        let before = setup.registry.connections_for("u1")[0].last_activity();

        setup
            .handler
            .handle_frame(&session, r#"{"action":"ping"}"#);

        let after = setup.registry.connections_for("u1")[0].last_activity();
        assert!(after >= before);
    }

    #[test]
    fn close_is_idempotent() {
        let setup = Setup::new();
        let (session, _sink) = setup.connect("u1", "d1");

        setup.handler.close(&session);
        assert!(setup.registry.is_empty());
        setup.handler.close(&session);
        assert!(setup.registry.is_empty());
    }

    #[test]
    fn json_payload_roundtrip_through_broadcast() {
        let setup = Setup::new();
        let (sender, _) = setup.connect("u1", "d1");
        let (_peer, peer_sink) = setup.connect("u1", "d2");

        let envelope = ClientEnvelope {
            action: ClientAction::Broadcast,
            payload: json!({"nested": {"a": [1, 2, 3]}}),
        };
        setup.handler.handle_frame(&sender, &envelope.encode());

        let frames = peer_sink.frames();
        assert_eq!(
            frames[1],
            ServerFrame::Data(json!({"nested": {"a": [1, 2, 3]}}))
        );
    }
}
