use core::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use edge_dhcp::{
    io::{self, DEFAULT_SERVER_PORT},
    server::{Server, ServerOptions},
};
use edge_nal::UdpBind;
use edge_nal_embassy::{Udp, UdpBuffers};
use embassy_net::Stack;
use embassy_time::{Duration, Timer};
use gateway_bootloader::network::PORTAL_NETWORK;
use log::{error, info, warn};

use super::super::config::{DHCP_LEASE_MAX, DHCP_RESTART_MS};

/// Hands out leases in the AP subnet with the portal as router.
#[embassy_executor::task]
pub(super) async fn dhcp_server_task(stack: Stack<'static>) {
    let server_ip = PORTAL_NETWORK.router();
    let buffers = UdpBuffers::<2, 1024, 1024, 4>::new();
    let udp = Udp::new(stack, &buffers);
    let mut socket = match udp
        .bind(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::UNSPECIFIED,
            DEFAULT_SERVER_PORT,
        )))
        .await
    {
        Ok(socket) => socket,
        Err(err) => {
            error!("portal: dhcp bind failed: {:?}", err);
            return;
        }
    };
    info!("portal: dhcp serving leases from {}", server_ip);

    let mut packet = [0u8; 1500];
    let mut gateways = PORTAL_NETWORK.dhcp_gateways();
    let mut server = Server::<_, DHCP_LEASE_MAX>::new_with_et(server_ip);
    loop {
        let options = ServerOptions::new(server_ip, Some(&mut gateways));
        if let Err(err) = io::server::run(&mut server, &options, &mut socket, &mut packet).await {
            warn!("portal: dhcp server err={:?}", err);
        }
        Timer::after(Duration::from_millis(DHCP_RESTART_MS)).await;
    }
}
