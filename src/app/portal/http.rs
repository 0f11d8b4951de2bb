use core::cmp::min;

use embassy_net::{tcp::TcpSocket, IpListenEndpoint, Stack};
use embassy_time::{Duration, Timer};
use embedded_io_async::Write;
use esp_storage::FlashStorage;
use gateway_bootloader::{
    config::{PROVISION_CHUNK_MAX, PROVISION_PAYLOAD_MAX, PROVISION_RESTART_DELAY_MS},
    platform::Restart,
    provisioning::{head_len, ProvisioningSession, RequestError, RequestHead, Route, SessionStep},
    store::ConfigStore,
};
use log::{error, info, warn};

use super::{
    super::{
        config::{AP_ADDRESS, HTTP_HEADER_MAX, HTTP_PORT, HTTP_RW_BUF, HTTP_SOCKET_TIMEOUT_SECS},
        platform::SoftwareReset,
    },
    page::{self, Page},
    wire::{discard_body, respond, TEXT_HTML, TEXT_PLAIN},
};

type FlashConfigStore = ConfigStore<FlashStorage<'static>>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Served {
    Done,
    Restart,
}

#[embassy_executor::task]
pub(super) async fn http_server_task(stack: Stack<'static>, mut store: FlashConfigStore) {
    stack.wait_config_up().await;
    info!("portal: open http://{}:{}/ to configure", AP_ADDRESS, HTTP_PORT);

    let page = match page::render() {
        Ok(page) => page,
        Err(_) => {
            error!("portal: setup page does not fit its buffer");
            Page::new()
        }
    };
    let mut session = ProvisioningSession::new();

    let mut rx_buffer = [0u8; HTTP_RW_BUF];
    let mut tx_buffer = [0u8; HTTP_RW_BUF];
    let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
    socket.set_timeout(Some(Duration::from_secs(HTTP_SOCKET_TIMEOUT_SECS)));

    loop {
        let accepted = socket
            .accept(IpListenEndpoint {
                addr: None,
                port: HTTP_PORT,
            })
            .await;
        if let Err(err) = accepted {
            warn!("portal: accept failed: {:?}", err);
            continue;
        }

        let served = handle_connection(&mut socket, &page, &mut session, &mut store).await;

        let _ = socket.flush().await;
        Timer::after(Duration::from_millis(20)).await;
        socket.close();
        Timer::after(Duration::from_millis(20)).await;
        socket.abort();

        match served {
            Ok(Served::Done) => {}
            Ok(Served::Restart) => {
                info!("portal: restarting in {} ms", PROVISION_RESTART_DELAY_MS);
                Timer::after(Duration::from_millis(PROVISION_RESTART_DELAY_MS as u64)).await;
                SoftwareReset.restart();
            }
            Err(err) => warn!("portal: request failed: {}", err),
        }
    }
}

async fn handle_connection(
    socket: &mut TcpSocket<'_>,
    page: &Page,
    session: &mut ProvisioningSession,
    store: &mut FlashConfigStore,
) -> Result<Served, &'static str> {
    let mut head_buf = [0u8; HTTP_HEADER_MAX];
    let mut filled = 0usize;
    while head_len(&head_buf[..filled]).is_none() {
        if filled == head_buf.len() {
            respond(socket, 413, "Payload Too Large", TEXT_PLAIN, b"header too large").await;
            return Err("header too large");
        }
        let n = socket
            .read(&mut head_buf[filled..])
            .await
            .map_err(|_| "read")?;
        if n == 0 {
            return Err("eof");
        }
        filled += n;
    }

    let head = match RequestHead::parse(&head_buf[..filled]) {
        Ok(head) => head,
        Err(err) => return reject(socket, err).await,
    };
    let buffered = &head_buf[head.body_start..filled];

    match head.route() {
        Route::Page => {
            respond(socket, 200, "OK", TEXT_HTML, page.as_bytes()).await;
            Ok(Served::Done)
        }
        Route::Save => match head.body_len() {
            Ok(content_length) => handle_save(socket, content_length, buffered, session, store).await,
            Err(err) => reject(socket, err).await,
        },
        Route::Unknown => {
            let declared = head.content_length.unwrap_or(0);
            discard_body(socket, declared.saturating_sub(buffered.len())).await?;
            respond(socket, 404, "Not Found", TEXT_PLAIN, b"not found").await;
            Ok(Served::Done)
        }
    }
}

async fn reject(socket: &mut TcpSocket<'_>, err: RequestError) -> Result<Served, &'static str> {
    let (status, reason) = err.status();
    respond(socket, status, reason, TEXT_PLAIN, err.as_str().as_bytes()).await;
    Err(err.as_str())
}

/// Streams the request body into the provisioning session as ordered chunks.
async fn handle_save(
    socket: &mut TcpSocket<'_>,
    content_length: usize,
    buffered: &[u8],
    session: &mut ProvisioningSession,
    store: &mut FlashConfigStore,
) -> Result<Served, &'static str> {
    if content_length > PROVISION_PAYLOAD_MAX {
        // The session refuses the size before reading any of the body.
        let reply = session.submit_chunk(store, 0, content_length, &[]).reply();
        respond(socket, reply.status, reply.reason, TEXT_PLAIN, reply.body.as_bytes()).await;
        return Err("body too large");
    }

    let initial = &buffered[..min(buffered.len(), content_length)];
    let mut received = initial.len();
    let mut step = session.submit_chunk(store, 0, content_length, initial);

    let mut chunk = [0u8; PROVISION_CHUNK_MAX];
    while step == SessionStep::NeedMore {
        let want = min(chunk.len(), content_length - received);
        let n = match socket.read(&mut chunk[..want]).await {
            Ok(n) if n > 0 => n,
            _ => {
                session.abandon_input();
                respond(socket, 400, "Bad Request", TEXT_PLAIN, b"incomplete body").await;
                return Err("incomplete body");
            }
        };
        step = session.submit_chunk(store, received, content_length, &chunk[..n]);
        received += n;
    }

    let reply = step.reply();
    respond(socket, reply.status, reply.reason, TEXT_PLAIN, reply.body.as_bytes()).await;
    match step {
        SessionStep::Restart => Ok(Served::Restart),
        SessionStep::Rejected(err) => {
            warn!("portal: submission rejected: {}", err);
            Ok(Served::Done)
        }
        _ => Ok(Served::Done),
    }
}
