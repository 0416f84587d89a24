use anyhow::Result;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::domain::ImFrame;
use crate::server::VMarketIMServer;

impl VMarketIMServer {
    /// 向指定客户端发送帧 / Send a frame to a specific client
    pub async fn send_frame(&self, client_id: &str, frame: &ImFrame) -> Result<()> {
        if let Some(connection) = self.connections.get(client_id) {
            connection
                .sender
                .send(Message::Text(frame.to_text()))
                .map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;
            debug!("📤 Sent {} to client {}", frame.frame_type, client_id);
            Ok(())
        } else {
            warn!("⚠️  Client {} not found for message delivery", client_id);
            Err(anyhow::anyhow!("Client {} not found", client_id))
        }
    }

    /// 发送关闭消息 / Send close message
    pub async fn send_close_message(&self, client_id: &str, reason: &'static str) -> Result<()> {
        if let Some(connection) = self.connections.get(client_id) {
            connection
                .sender
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: std::borrow::Cow::Borrowed(reason),
                })))
                .map_err(|e| anyhow::anyhow!("Failed to send close message: {}", e))?;
            debug!("🔒 Sent close message to client {}", client_id);
            Ok(())
        } else {
            Err(anyhow::anyhow!("Client {} not found for close message", client_id))
        }
    }
}
