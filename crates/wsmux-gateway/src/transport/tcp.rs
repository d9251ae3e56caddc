use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::Instrument;

use wsmux_core::error::Result;
use wsmux_core::scope::ConnectionId;

use crate::app_state::AppState;
use crate::classifier::{Action, Classification};

/// Accept loop. Returns once `shutdown` flips to `true` (or its sender drops).
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut next_id: ConnectionId = 1;

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let conn_id = next_id;
                next_id += 1;

                let st = state.clone();
                let span = tracing::info_span!("conn", conn_id, %peer);
                tokio::spawn(
                    async move {
                        if let Err(e) = run_connection(st, conn_id, peer, stream).await {
                            tracing::debug!(error = %e, code = e.code().as_str(), "connection ended with error");
                        }
                    }
                    .instrument(span),
                );
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("listener stopped accepting");
                    break;
                }
            }
        }
    }

    Ok(())
}

async fn run_connection(
    state: AppState,
    conn_id: ConnectionId,
    peer: SocketAddr,
    mut stream: TcpStream,
) -> Result<()> {
    state.metrics().connections_accepted.inc(&[]);
    state.metrics().connections_active.inc(&[]);
    tracing::debug!(%peer, "accepted");

    let result = pump(&state, conn_id, &mut stream).await;

    if let Some(snap) = state.router().close(conn_id) {
        tracing::debug!(kind = snap.classification.as_str(), path = %snap.path, "torn down");
    }
    state.upstream().closed(conn_id).await;
    state.metrics().connections_active.dec(&[]);
    result
}

async fn pump(state: &AppState, conn_id: ConnectionId, stream: &mut TcpStream) -> Result<()> {
    let mut buf = BytesMut::with_capacity(state.cfg().gateway.read_buffer_bytes);

    loop {
        buf.clear();
        let n = stream.read_buf(&mut buf).await?;
        if n == 0 {
            tracing::debug!("peer closed");
            return Ok(());
        }

        let mut next = Some(state.router().on_bytes(conn_id, &buf[..n]));
        while let Some(action) = next.take() {
            match action {
                Action::Forward(payload) => {
                    let kind = state
                        .router()
                        .classification(conn_id)
                        .unwrap_or(Classification::Native);
                    state.upstream().deliver(conn_id, kind, payload).await?;
                }
                Action::HandshakeComplete { response, then } => {
                    stream.write_all(&response).await?;
                    next = then.map(|a| *a);
                }
                Action::AwaitMore => {}
                Action::CloseConnection { farewell } => {
                    if let Some(bytes) = farewell {
                        stream.write_all(&bytes).await?;
                    }
                    stream.shutdown().await?;
                    return Ok(());
                }
            }
        }
    }
}
