//! Ways of connecting the server to an editor: stdio, accepting TCP connections,
//! or dialing out to a client that listens.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tower_lsp::{LspService, Server};

use crate::backend::Backend;

/// Run one language server session over the given byte streams
pub async fn serve<I, O>(input: I, output: O)
where
    I: AsyncRead + Unpin,
    O: AsyncWrite,
{
    let (service, socket) = LspService::new(Backend::new);
    Server::new(input, output, socket).serve(service).await;
}

/// Serve the client attached to stdin/stdout
pub async fn serve_stdio() {
    tracing::info!("openjml-lsp started in local mode");
    serve(tokio::io::stdin(), tokio::io::stdout()).await;
}

/// Accept connections on `port`, running an independent session for each
pub async fn listen(port: u16) -> io::Result<()> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await?;
    tracing::info!(
        port,
        "openjml-lsp started in server mode and awaits connections"
    );
    accept_loop(listener).await
}

/// Serve sessions for every connection accepted by `listener`
pub async fn accept_loop(listener: TcpListener) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::info!(%peer, "client connected");
        tokio::spawn(async move {
            serve_tcp(stream).await;
            tracing::info!(%peer, "client disconnected");
        });
    }
}

/// Connect to a client listening on `localhost:port` and serve it
pub async fn connect(port: u16) -> io::Result<()> {
    tracing::info!(
        port,
        "openjml-lsp started in client mode, connecting to the editor"
    );
    let stream = TcpStream::connect(("localhost", port)).await?;
    serve_tcp(stream).await;
    Ok(())
}

async fn serve_tcp(stream: TcpStream) {
    if let Err(err) = stream.set_nodelay(true) {
        tracing::debug!(%err, "cannot disable Nagle's algorithm");
    }
    let (read, write) = stream.into_split();
    serve(read, write).await;
}
