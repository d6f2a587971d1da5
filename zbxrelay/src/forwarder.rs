/**
 * COLLECTOR FORWARDER - Envoi des paquets vers le collecteur
 *
 * RÔLE : Une connexion TCP neuve par envoi, connexion bornée à 5s,
 * écriture du paquet complet, lecture de la réponse jusqu'à fermeture.
 *
 * GARANTIES :
 * - Une seule tentative, jamais de retry
 * - Timeout de connexion : le futur de connexion est abandonné, le socket
 *   éventuellement ouvert en retard est fermé avec lui
 * - La connexion est fermée sur tous les chemins de sortie (drop du stream)
 */

use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("connection to {addr} timed out after {timeout:?}")]
    ConnectionTimeout { addr: String, timeout: Duration },
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("error while sending the data: {0}")]
    Send(#[source] io::Error),
    #[error("error while receiving the data: {0}")]
    Receive(#[source] io::Error),
}

/// Envoie `packet` à `addr` et retourne la réponse brute du collecteur
pub async fn forward(addr: &str, packet: &[u8]) -> Result<Vec<u8>, ForwardError> {
    forward_with_timeout(addr, packet, CONNECT_TIMEOUT).await
}

pub async fn forward_with_timeout(
    addr: &str,
    packet: &[u8],
    connect_timeout: Duration,
) -> Result<Vec<u8>, ForwardError> {
    forward_via(addr, packet, connect_timeout, TcpStream::connect(addr)).await
}

/// Même échange, mais sur le flux produit par `connect`
///
/// `addr` ne sert qu'aux messages d'erreur et aux logs.
pub async fn forward_via<S, F>(
    addr: &str,
    packet: &[u8],
    connect_timeout: Duration,
    connect: F,
) -> Result<Vec<u8>, ForwardError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Future<Output = io::Result<S>>,
{
    let mut stream = match tokio::time::timeout(connect_timeout, connect).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(ForwardError::Connect { addr: addr.to_string(), source });
        }
        Err(_) => {
            return Err(ForwardError::ConnectionTimeout {
                addr: addr.to_string(),
                timeout: connect_timeout,
            });
        }
    };
    tracing::debug!(%addr, bytes = packet.len(), "connected to collector");

    stream.write_all(packet).await.map_err(ForwardError::Send)?;
    stream.flush().await.map_err(ForwardError::Send)?;

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .map_err(ForwardError::Receive)?;
    Ok(response)
}
