//! Opening and authenticating hub connections.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use hamirror_app::ports::transport::{HubTransport, TransportError};

use crate::config::WebsocketConfig;
use crate::connection::{Reader, WsConnection};
use crate::error::WsError;
use crate::protocol::{Inbound, Outbound};

/// [`HubTransport`] over the hub's websocket API.
#[derive(Debug, Clone)]
pub struct WsTransport {
    config: WebsocketConfig,
}

impl WsTransport {
    #[must_use]
    pub fn new(config: WebsocketConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &WebsocketConfig {
        &self.config
    }

    async fn handshake(&self) -> Result<WsConnection, WsError> {
        let url = self.config.websocket_url();
        tracing::debug!(%url, "opening websocket");
        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (mut writer, mut reader) = socket.split();

        match next_inbound(&mut reader).await? {
            Inbound::AuthRequired { ha_version } => {
                tracing::debug!(?ha_version, "hub requested authentication");
            }
            other => return Err(unexpected("auth_required", &other)),
        }

        let auth = Outbound::Auth {
            access_token: &self.config.access_token,
        };
        writer
            .send(Message::Text(auth.to_text().map_err(WsError::Json)?))
            .await?;

        match next_inbound(&mut reader).await? {
            Inbound::AuthOk { ha_version } => tracing::info!(
                ha_version = ha_version.as_deref().unwrap_or("unknown"),
                "authenticated with hub"
            ),
            Inbound::AuthInvalid { message } => {
                return Err(WsError::AuthInvalid(message.unwrap_or_default()));
            }
            other => return Err(unexpected("auth_ok", &other)),
        }

        Ok(WsConnection::spawn(writer, reader, &self.config))
    }
}

fn unexpected(expected: &'static str, got: &Inbound) -> WsError {
    WsError::Unexpected {
        expected,
        got: got.kind().to_string(),
    }
}

/// The next text message, skipping control frames.
async fn next_inbound(reader: &mut Reader) -> Result<Inbound, WsError> {
    while let Some(message) = reader.next().await {
        match message? {
            Message::Text(text) => return Inbound::parse(&text).map_err(WsError::Json),
            Message::Close(_) => return Err(WsError::Closed),
            _ => {}
        }
    }
    Err(WsError::Closed)
}

impl HubTransport for WsTransport {
    type Connection = WsConnection;

    async fn connect(&self) -> Result<WsConnection, TransportError> {
        Ok(self.handshake().await?)
    }
}
