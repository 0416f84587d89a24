use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

use crate::domain::ImFrame;
use crate::server::{Connection, VMarketIMServer};

/// 处理新连接 / Handle new connection
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    server: VMarketIMServer,
) -> Result<()> {
    tracing::info!("📨 New connection from: {}", peer_addr);

    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let client_id = Uuid::new_v4().to_string();

    let client_id_clone = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let is_close = matches!(&msg, Message::Close(_));
            if let Err(e) = ws_sender.send(msg).await {
                tracing::error!("Failed to send message to {}: {}", client_id_clone, e);
                break;
            }
            if is_close {
                let _ = ws_sender.close().await;
                break;
            }
        }
    });

    server
        .connections
        .insert(client_id.clone(), Connection::new(client_id.clone(), tx));
    tracing::info!("✅ Client {} connected from {}", client_id, peer_addr);

    let welcome = ImFrame::new(
        "connected",
        serde_json::json!({ "client_id": client_id, "message": "Welcome to v-market-im" }),
    );
    server.send_frame(&client_id, &welcome).await?;

    // 未在期限内认证的连接被关闭 / Close connections that do not authenticate in time
    {
        let deadline = Duration::from_millis(server.config.auth.deadline_ms);
        let watchdog_client = client_id.clone();
        let watchdog_server = server.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let unauthenticated = watchdog_server
                .connections
                .get(&watchdog_client)
                .map(|c| c.user.is_none())
                .unwrap_or(false);
            if unauthenticated {
                let _ = watchdog_server
                    .send_close_message(&watchdog_client, "Authentication timeout")
                    .await;
                watchdog_server.remove_connection(&watchdog_client);
                tracing::warn!("disconnecting unauthenticated client_id={}", watchdog_client);
            }
        });
    }

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(message) => {
                if let Err(e) = server.handle_incoming_message(message, &client_id).await {
                    tracing::error!("Error handling message from {}: {}", client_id, e);
                }
            }
            Err(e) => {
                tracing::error!("WebSocket error from {}: {}", client_id, e);
                break;
            }
        }
    }

    let removed = server.remove_connection(&client_id);
    send_task.abort();
    tracing::info!("👋 Client {} disconnected", client_id);
    if let Some(conn) = removed {
        tracing::debug!(
            "connection {} closed uid={:?} idle_ms={}",
            conn.client_id,
            conn.uid(),
            conn.last_heartbeat.lock().elapsed().as_millis()
        );
    }
    Ok(())
}
