use std::future::Future;
use tokio::net::{TcpListener, ToSocketAddrs};

use crate::handler::handle_connection;
use crate::state::RelayState;

pub async fn bind<A: ToSocketAddrs>(addr: A) -> std::io::Result<TcpListener> {
    TcpListener::bind(addr).await
}

/// Boucle d'acceptation : une tâche par connexion, jusqu'au signal d'arrêt.
/// Les connexions en cours terminent seules.
pub async fn serve<F>(listener: TcpListener, state: RelayState, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "agent connected");
                    tokio::spawn(handle_connection(stream, peer, state.clone()));
                }
                Err(e) => tracing::error!("accept error: {e}"),
            },
            _ = &mut shutdown => {
                tracing::info!("shutdown requested, no longer accepting connections");
                break;
            }
        }
    }
}
