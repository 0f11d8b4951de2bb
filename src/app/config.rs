use embassy_net::{Ipv4Address, Ipv4Cidr};
use gateway_bootloader::network::PORTAL_NETWORK;

pub(crate) const UART_BAUD: u32 = 115_200;

pub(crate) const AP_SSID: &str = match option_env!("GATEWAY_BOOT_AP_SSID") {
    Some(ssid) => ssid,
    None => "MG-Config",
};
pub(crate) const AP_PASSWORD: &str = match option_env!("GATEWAY_BOOT_AP_PASSWORD") {
    Some(password) => password,
    None => "meshtastic",
};
pub(crate) const AP_CHANNEL: u8 = 1;
pub(crate) const AP_ADDRESS: Ipv4Address = PORTAL_NETWORK.address;

pub(crate) const fn ap_cidr() -> Ipv4Cidr {
    Ipv4Cidr::new(AP_ADDRESS, PORTAL_NETWORK.prefix_len)
}

pub(crate) const DHCP_LEASE_MAX: usize = 8;
pub(crate) const DHCP_RESTART_MS: u64 = 500;

pub(crate) const HEAP_BYTES: usize = 72 * 1024;

pub(crate) const HTTP_PORT: u16 = 80;
pub(crate) const HTTP_HEADER_MAX: usize = 1024;
pub(crate) const HTTP_RW_BUF: usize = 1536;
pub(crate) const HTTP_SOCKET_TIMEOUT_SECS: u64 = 20;

pub(crate) const WIFI_RX_QUEUE_SIZE: usize = 3;
pub(crate) const WIFI_TX_QUEUE_SIZE: usize = 2;
pub(crate) const WIFI_STATIC_RX_BUF_NUM: u8 = 4;
pub(crate) const WIFI_DYNAMIC_RX_BUF_NUM: u16 = 8;
pub(crate) const WIFI_DYNAMIC_TX_BUF_NUM: u16 = 8;
pub(crate) const WIFI_RX_BA_WIN: u8 = 3;
pub(crate) const WIFI_RETRY_SECS: u64 = 3;
