//! HTTP message transport between nodes

use crate::wire::WireMessage;
use async_trait::async_trait;
use benor_core::{BenorError, BenorResult, ClusterConfig, NodeId, ProtocolMessage, Transport};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Best-effort broadcast over HTTP: one POST per peer, failures logged
/// and ignored. The quorum thresholds absorb lost messages; there are no
/// retries at this layer.
pub struct HttpTransport {
    origin: NodeId,
    cluster: ClusterConfig,
    client: Client,
}

impl HttpTransport {
    pub fn new(origin: NodeId, cluster: ClusterConfig) -> BenorResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| BenorError::Transport(e.to_string()))?;

        Ok(Self {
            origin,
            cluster,
            client,
        })
    }

    fn peer_url(&self, peer: NodeId) -> String {
        format!("http://127.0.0.1:{}/message", self.cluster.port_of(peer))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn broadcast(&self, message: ProtocolMessage) -> BenorResult<()> {
        let body = WireMessage::from_message(&message);

        for i in 0..self.cluster.nodes {
            let peer = NodeId::new(i as u32);
            if peer == self.origin {
                continue;
            }
            match self.client.post(self.peer_url(peer)).json(&body).send().await {
                Ok(response) if !response.status().is_success() => {
                    debug!(origin = %self.origin, %peer, status = %response.status(), "peer rejected message");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(origin = %self.origin, %peer, error = %e, "failed to send message");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_urls_follow_port_layout() {
        let transport =
            HttpTransport::new(NodeId::new(0), ClusterConfig::default()).unwrap();
        assert_eq!(
            transport.peer_url(NodeId::new(2)),
            "http://127.0.0.1:3003/message"
        );
    }
}
