use anyhow::Result;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::domain::{AuthRequest, ImFrame, SubscribeRequest, SubscribeScope, UserProfile};
use crate::error::ImError;
use crate::server::VMarketIMServer;
use crate::service::notifier::Topic;

fn topic_of(req: &SubscribeRequest) -> Topic {
    match req.scope {
        SubscribeScope::Thread => Topic::Thread(req.id.clone()),
        SubscribeScope::Inbox => Topic::Inbox(req.id.clone()),
    }
}

impl VMarketIMServer {
    /// 处理客户端帧（auth/subscribe/unsubscribe/ping）
    /// Handle client frames (auth/subscribe/unsubscribe/ping)
    pub async fn handle_incoming_message(&self, message: Message, client_id: &str) -> Result<()> {
        let text = match message {
            Message::Text(text) => text,
            Message::Ping(_) | Message::Pong(_) => {
                self.update_heartbeat(client_id).await;
                return Ok(());
            }
            _ => return Ok(()),
        };
        debug!("📨 Received text from {}: {}", client_id, text);
        let frame = match serde_json::from_str::<ImFrame>(&text) {
            Ok(frame) => frame,
            Err(_) => {
                return self
                    .send_frame(client_id, &ImFrame::error("invalid_json", "invalid json"))
                    .await;
            }
        };

        match frame.frame_type.as_str() {
            "ping" => {
                debug!("🏓 Ping from {}", client_id);
                self.update_heartbeat(client_id).await;
                let pong = ImFrame::new(
                    "pong",
                    serde_json::json!({"timestamp": chrono::Utc::now().timestamp_millis(), "client_id": client_id}),
                );
                self.send_frame(client_id, &pong).await
            }
            "auth" => self.handle_auth(client_id, frame.data).await,
            "subscribe" => self.handle_subscribe(client_id, frame.data).await,
            "unsubscribe" => self.handle_unsubscribe(client_id, frame.data).await,
            other => {
                self.send_frame(
                    client_id,
                    &ImFrame::error("unknown_type", format!("unknown frame type: {}", other)),
                )
                .await
            }
        }
    }

    async fn handle_auth(&self, client_id: &str, data: serde_json::Value) -> Result<()> {
        let token = serde_json::from_value::<AuthRequest>(data)
            .map(|r| r.token)
            .unwrap_or_default();
        match self.identity.resolve(&token).await {
            Ok(user) => {
                info!("🔐 Client {} authenticated as {} ({})", client_id, user.id, user.role);
                let ok = ImFrame::new("auth_ok", serde_json::to_value(&user)?);
                self.bind_user(client_id, user);
                self.update_heartbeat(client_id).await;
                self.send_frame(client_id, &ok).await
            }
            Err(e) => {
                warn!("🔒 Client {} failed auth: {}", client_id, e);
                self.send_frame(client_id, &ImFrame::error(e.code(), e.to_string()))
                    .await?;
                self.send_close_message(client_id, "Authentication failed").await
            }
        }
    }

    async fn handle_subscribe(&self, client_id: &str, data: serde_json::Value) -> Result<()> {
        let user = match self.current_user(client_id) {
            Some(user) => user,
            None => return self.reply_error(client_id, &ImError::Unauthenticated).await,
        };
        let req = match serde_json::from_value::<SubscribeRequest>(data) {
            Ok(req) => req,
            Err(e) => {
                return self
                    .send_frame(client_id, &ImFrame::error("invalid_request", e.to_string()))
                    .await
            }
        };
        let sub = match self.service.subscribe(&user, req.scope, &req.id).await {
            Ok(sub) => sub,
            Err(e) => return self.reply_error(client_id, &e).await,
        };
        let key = sub.topic().to_string();
        let ack = ImFrame::new("subscribed", serde_json::json!({ "scope": req.scope, "id": req.id }));
        self.send_frame(client_id, &ack).await?;

        let handle = crate::ws::forwarder::spawn_forwarder(
            self.clone(),
            client_id.to_string(),
            user,
            sub,
        );
        match self.connections.get(client_id) {
            Some(conn) => {
                if let Some(previous) = conn.subscriptions.insert(key, handle) {
                    previous.abort();
                }
            }
            None => handle.abort(),
        }
        Ok(())
    }

    async fn handle_unsubscribe(&self, client_id: &str, data: serde_json::Value) -> Result<()> {
        let req = match serde_json::from_value::<SubscribeRequest>(data) {
            Ok(req) => req,
            Err(e) => {
                return self
                    .send_frame(client_id, &ImFrame::error("invalid_request", e.to_string()))
                    .await
            }
        };
        let key = topic_of(&req).to_string();
        if let Some(conn) = self.connections.get(client_id) {
            if let Some((_, handle)) = conn.subscriptions.remove(&key) {
                handle.abort();
            }
        }
        let ack = ImFrame::new("unsubscribed", serde_json::json!({ "scope": req.scope, "id": req.id }));
        self.send_frame(client_id, &ack).await
    }

    fn current_user(&self, client_id: &str) -> Option<UserProfile> {
        self.connections.get(client_id).and_then(|c| c.user.clone())
    }

    async fn reply_error(&self, client_id: &str, e: &ImError) -> Result<()> {
        self.send_frame(client_id, &ImFrame::error(e.code(), e.to_string()))
            .await
    }
}
