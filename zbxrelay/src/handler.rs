/**
 * CONNECTION HANDLER - Cycle de vie d'une connexion agent
 *
 * Une requête, une réponse, puis fermeture :
 * en-tête -> longueur -> payload -> dispatch -> réponse -> fermeture
 *
 * - Délai de lecture de 2 minutes depuis l'acceptation
 * - En-tête invalide ou trame tronquée : fermeture sans réponse
 * - Requête inconnue ou JSON invalide : "Invalid request"
 */

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use crate::frame::{decode_frame, encode_frame, FrameError};
use crate::ingest::{handle_monitor_data, to_json_or};
use crate::protocol::{AgentRequest, INVALID_REQUEST};
use crate::state::RelayState;

pub const READ_DEADLINE: Duration = Duration::from_secs(120);

pub async fn handle_connection<S>(mut stream: S, peer: SocketAddr, state: RelayState)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let deadline = Instant::now() + READ_DEADLINE;

    let payload = match tokio::time::timeout_at(deadline, decode_frame(&mut stream)).await {
        Ok(Ok(payload)) => payload,
        Ok(Err(FrameError::InvalidHeader(header))) => {
            tracing::warn!(%peer, ?header, "invalid header, ignored");
            return;
        }
        Ok(Err(e)) => {
            tracing::error!(%peer, "read error: {e}");
            return;
        }
        Err(_) => {
            tracing::warn!(%peer, "read deadline exceeded");
            return;
        }
    };
    tracing::debug!(%peer, request = %String::from_utf8_lossy(&payload), "agent request");

    let response = dispatch(&payload, &state).await;
    tracing::debug!(%peer, response = %String::from_utf8_lossy(&response), "relay response");

    if let Err(e) = stream.write_all(&response).await {
        tracing::error!(%peer, "write error: {e}");
        return;
    }
    let _ = stream.shutdown().await;
}

/// Produit les octets de réponse pour un payload agent
pub async fn dispatch(payload: &[u8], state: &RelayState) -> Vec<u8> {
    // photos prises une fois : un reload concurrent n'affecte pas la requête
    let settings = state.settings.load();
    let catalog = state.catalog.load();

    match AgentRequest::parse(payload) {
        Ok(AgentRequest::ActiveChecks) => {
            let listing = catalog.active_checks();
            encode_frame(&to_json_or(&listing, r#"{"response":"success","data":[]}"#))
        }
        Ok(AgentRequest::Submit(items)) => handle_monitor_data(&catalog, &settings, &items).await,
        Err(e) => {
            tracing::warn!("rejected request: {e}");
            if settings.frame_invalid_request {
                encode_frame(INVALID_REQUEST.as_bytes())
            } else {
                INVALID_REQUEST.as_bytes().to_vec()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ActiveChecksResponse, MonitorCatalog};
    use crate::config::Settings;
    use tokio::io::AsyncReadExt;

    fn state() -> RelayState {
        let catalog = MonitorCatalog::from_json(
            r#"{"cpu.util": {"attr_id": 9, "delay": 60, "base": 1.0},
                "mem.free": {"attr_id": 10, "delay": 30, "lastlogsize": 7, "base": 0.5}}"#,
        )
        .unwrap();
        RelayState::new(catalog, Settings::default())
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    async fn exchange(input: Vec<u8>, state: RelayState) -> Vec<u8> {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(handle_connection(server, peer(), state));
        client.write_all(&input).await.unwrap();
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        task.await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_active_checks() {
        let out = exchange(encode_frame(br#"{"request":"active checks","host":"web-1"}"#), state()).await;
        let mut reader = &out[..];
        let payload = decode_frame(&mut reader).await.unwrap();
        let listing: ActiveChecksResponse = serde_json::from_slice(&payload).unwrap();
        assert_eq!(listing.response, "success");
        assert_eq!(listing.data.len(), 2);
        let mem = listing.data.iter().find(|c| c.key == "mem.free").unwrap();
        assert_eq!((mem.delay, mem.lastlogsize), (30, 7));
    }

    #[tokio::test]
    async fn test_bad_header_gets_no_response() {
        let mut input = encode_frame(br#"{"request":"active checks"}"#);
        input[..5].copy_from_slice(b"HTTP/");
        let out = exchange(input, state()).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_payload_gets_no_response() {
        let mut input = encode_frame(br#"{"request":"active checks"}"#);
        input.truncate(input.len() - 3);
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(handle_connection(server, peer(), state()));
        client.write_all(&input).await.unwrap();
        client.shutdown().await.unwrap();
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        task.await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_framing() {
        let st = state();
        let framed = dispatch(br#"{"request":"proxy config"}"#, &st).await;
        assert_eq!(framed, encode_frame(b"Invalid request"));

        st.settings.store(Settings { frame_invalid_request: false, ..Settings::default() });
        let raw = dispatch(b"{not json", &st).await;
        assert_eq!(raw, b"Invalid request");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_deadline() {
        let (_client, server) = tokio::io::duplex(1024);
        // le client ne dit rien : le handler abandonne après 2 minutes
        let task = tokio::spawn(handle_connection(server, peer(), state()));
        tokio::time::advance(READ_DEADLINE + Duration::from_secs(1)).await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_catalog_swap_seen_by_next_request() {
        let st = state();
        st.catalog.store(MonitorCatalog::new());
        let out = dispatch(br#"{"request":"active checks"}"#, &st).await;
        let mut reader = &out[..];
        let payload = decode_frame(&mut reader).await.unwrap();
        let listing: ActiveChecksResponse = serde_json::from_slice(&payload).unwrap();
        assert!(listing.data.is_empty());
    }
}
