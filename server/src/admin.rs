//! TCP admin endpoint serving scoreboard queries.
//!
//! Runs on the tokio runtime and only touches the scoreboard, never a board.

use log::{info, warn};
use shared::admin::{decode_payload, encode_frame, frame_len, AdminRequest, AdminResponse};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::context::ServerContext;

pub async fn serve(listener: TcpListener, ctx: Arc<ServerContext>) -> io::Result<()> {
    info!("admin endpoint listening on {}", listener.local_addr()?);
    loop {
        let (stream, peer) = listener.accept().await?;
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &ctx).await {
                warn!("admin connection {} failed: {}", peer, e);
            }
        });
    }
}

/// Answers requests on one connection until the peer closes it.
pub async fn handle_connection<S>(mut stream: S, ctx: &ServerContext) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let mut prefix = [0u8; 4];
        match stream.read_exact(&mut prefix).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }
        let mut payload = vec![0u8; frame_len(prefix)?];
        stream.read_exact(&mut payload).await?;

        let response = match decode_payload::<AdminRequest>(&payload) {
            Ok(request) => respond(request, ctx).await,
            Err(e) => AdminResponse::Error {
                reason: format!("malformed request: {}", e),
            },
        };
        stream.write_all(&encode_frame(&response)?).await?;
        stream.flush().await?;
    }
}

pub async fn respond(request: AdminRequest, ctx: &ServerContext) -> AdminResponse {
    match request {
        AdminRequest::TopScores { limit } => AdminResponse::Scores {
            entries: ctx
                .scoreboard
                .top(limit as usize)
                .into_iter()
                .map(Into::into)
                .collect(),
        },
        AdminRequest::DumpScores => {
            let path = &ctx.config.score_log;
            let report = ctx.scoreboard.report(ctx.config.report_top);
            match tokio::fs::write(path, report).await {
                Ok(()) => {
                    info!("scoreboard written to {}", path.display());
                    AdminResponse::Dumped {
                        path: path.display().to_string(),
                    }
                }
                Err(e) => AdminResponse::Error {
                    reason: format!("failed to write {}: {}", path.display(), e),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use shared::admin::ScoreLine;

    fn context(dir: &std::path::Path) -> ServerContext {
        let mut config = ServerConfig::new(dir, 1);
        config.score_log = dir.join("scores.txt");
        ServerContext::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_top_scores_request() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let slot = ctx.scoreboard.register().unwrap();
        ctx.scoreboard.update(slot, 12);

        let request = encode_frame(&AdminRequest::TopScores { limit: 5 }).unwrap();
        let response = encode_frame(&AdminResponse::Scores {
            entries: vec![ScoreLine {
                client_id: 1,
                score: 12,
                active: true,
            }],
        })
        .unwrap();

        let stream = tokio_test::io::Builder::new()
            .read(&request)
            .write(&response)
            .build();
        handle_connection(stream, &ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_request_gets_error_response() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let garbage = [0xFF, 0xFF, 0xFF, 0xFF];
        let mut request = 4u32.to_be_bytes().to_vec();
        request.extend_from_slice(&garbage);
        let reason = decode_payload::<AdminRequest>(&garbage).unwrap_err();
        let response = encode_frame(&AdminResponse::Error {
            reason: format!("malformed request: {}", reason),
        })
        .unwrap();

        let stream = tokio_test::io::Builder::new()
            .read(&request)
            .write(&response)
            .build();
        handle_connection(stream, &ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_dump_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let slot = ctx.scoreboard.register().unwrap();
        ctx.scoreboard.finish(slot, 30);

        let response = respond(AdminRequest::DumpScores, &ctx).await;
        let path = dir.path().join("scores.txt");
        assert_eq!(
            response,
            AdminResponse::Dumped {
                path: path.display().to_string()
            }
        );
        let report = std::fs::read_to_string(path).unwrap();
        assert!(report.starts_with("=== TOP 5 SCORES ==="));
        assert!(report.contains("1. Client 1: 30 points"));
    }

    #[tokio::test]
    async fn test_serve_over_tcp() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Arc::new(context(dir.path()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::clone(&ctx)));

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = encode_frame(&AdminRequest::TopScores { limit: 3 }).unwrap();
        client.write_all(&request).await.unwrap();

        let mut prefix = [0u8; 4];
        client.read_exact(&mut prefix).await.unwrap();
        let mut payload = vec![0u8; frame_len(prefix).unwrap()];
        client.read_exact(&mut payload).await.unwrap();
        let response: AdminResponse = decode_payload(&payload).unwrap();

        assert_eq!(response, AdminResponse::Scores { entries: vec![] });
    }
}
