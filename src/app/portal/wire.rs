use core::{cmp::min, fmt::Write as _};

use embassy_net::tcp::TcpSocket;
use embedded_io_async::Write;
use heapless::String;
use log::error;

pub(super) const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub(super) const TEXT_HTML: &str = "text/html; charset=utf-8";

const STATUS_HEAD_MAX: usize = 160;

/// Reads and drops `remaining` body bytes so the client sees its request
/// consumed before the reply.
pub(super) async fn discard_body(
    socket: &mut TcpSocket<'_>,
    mut remaining: usize,
) -> Result<(), &'static str> {
    let mut sink = [0u8; 256];
    while remaining > 0 {
        let want = min(remaining, sink.len());
        match socket.read(&mut sink[..want]).await {
            Ok(0) => return Err("body ended early"),
            Ok(n) => remaining -= n,
            Err(_) => return Err("body read failed"),
        }
    }
    Ok(())
}

/// Sends a complete HTTP/1.0 response; the connection closes afterwards.
pub(super) async fn respond(
    socket: &mut TcpSocket<'_>,
    status: u16,
    reason: &str,
    content_type: &str,
    body: &[u8],
) {
    let mut head: String<STATUS_HEAD_MAX> = String::new();
    let written = write!(
        head,
        "HTTP/1.0 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    if written.is_err() {
        error!("portal: response head for {} does not fit", status);
        return;
    }
    if socket.write_all(head.as_bytes()).await.is_ok() {
        let _ = socket.write_all(body).await;
    }
}
