//! Access-point setup portal: soft AP on a static IPv4 stack, a DHCP
//! server for clients, and a single-connection HTTP server feeding the
//! provisioning session.

mod dhcp;
mod http;
mod page;
mod wire;

use embassy_net::{Runner, Stack, StackResources, StaticConfigV4};
use embassy_time::{Duration, Timer};
use esp_hal::{
    peripherals::{TIMG0, WIFI},
    rng::Rng,
    timer::timg::TimerGroup,
};
use esp_radio::wifi::{
    AccessPointConfig, AuthMethod, Config as WifiRuntimeConfig, ModeConfig, WifiController,
    WifiDevice,
};
use esp_rtos::embassy::Executor;
use esp_storage::FlashStorage;
use gateway_bootloader::{
    config::PROVISION_RESTART_DELAY_MS,
    network::PORTAL_NETWORK,
    platform::{DelayOps, Restart},
    store::ConfigStore,
};
use log::{error, info, warn};
use static_cell::StaticCell;

use super::{
    config::{
        ap_cidr, AP_ADDRESS, AP_CHANNEL, AP_PASSWORD, AP_SSID, HEAP_BYTES, WIFI_DYNAMIC_RX_BUF_NUM,
        WIFI_DYNAMIC_TX_BUF_NUM, WIFI_RETRY_SECS, WIFI_RX_BA_WIN, WIFI_RX_QUEUE_SIZE,
        WIFI_STATIC_RX_BUF_NUM, WIFI_TX_QUEUE_SIZE,
    },
    platform::{BusyDelay, SoftwareReset},
};

const AP_WATCH_SECS: u64 = 5;
// HTTP listener and DHCP server, plus spares.
const NET_SOCKETS: usize = 4;

struct PortalRuntime {
    wifi_controller: WifiController<'static>,
    net_runner: Runner<'static, WifiDevice<'static>>,
    stack: Stack<'static>,
}

/// Serves the setup portal until a submission is saved, then restarts.
pub(super) fn run(
    wifi: WIFI<'static>,
    timg0: TIMG0<'static>,
    store: ConfigStore<FlashStorage<'static>>,
) -> ! {
    esp_alloc::heap_allocator!(size: HEAP_BYTES);
    let timg0 = TimerGroup::new(timg0);
    esp_rtos::start(timg0.timer0);

    let runtime = match setup(wifi) {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("portal: {}", err);
            BusyDelay::new().delay_ms(PROVISION_RESTART_DELAY_MS);
            SoftwareReset.restart();
        }
    };

    info!("========================================");
    info!("  CONFIGURATION MODE");
    info!("  connect to WiFi '{}' (password '{}')", AP_SSID, AP_PASSWORD);
    info!("  then browse to http://{}/", AP_ADDRESS);
    info!("========================================");

    static EXECUTOR: StaticCell<Executor> = StaticCell::new();
    let executor = EXECUTOR.init(Executor::new());
    executor.run(move |spawner| {
        spawner.must_spawn(access_point_task(runtime.wifi_controller));
        spawner.must_spawn(net_task(runtime.net_runner));
        spawner.must_spawn(dhcp::dhcp_server_task(runtime.stack));
        spawner.must_spawn(http::http_server_task(runtime.stack, store));
    })
}

fn setup(wifi: WIFI<'static>) -> Result<PortalRuntime, &'static str> {
    static RADIO_CTRL: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    static STACK_RESOURCES: StaticCell<StackResources<NET_SOCKETS>> = StaticCell::new();

    let radio_ctrl = esp_radio::init().map_err(|_| "esp_radio::init failed")?;
    let radio_ctrl = RADIO_CTRL.init(radio_ctrl);
    let (wifi_controller, ifaces) = esp_radio::wifi::new(radio_ctrl, wifi, wifi_runtime_config())
        .map_err(|_| "wifi init failed")?;

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let net_config = embassy_net::Config::ipv4_static(StaticConfigV4 {
        address: ap_cidr(),
        gateway: Some(PORTAL_NETWORK.router()),
        dns_servers: Default::default(),
    });
    let (stack, net_runner) = embassy_net::new(
        ifaces.ap,
        net_config,
        STACK_RESOURCES.init(StackResources::<NET_SOCKETS>::new()),
        seed,
    );

    Ok(PortalRuntime {
        wifi_controller,
        net_runner,
        stack,
    })
}

#[embassy_executor::task]
async fn access_point_task(mut controller: WifiController<'static>) {
    let mode = ModeConfig::AccessPoint(
        AccessPointConfig::default()
            .with_ssid(AP_SSID.into())
            .with_password(AP_PASSWORD.into())
            .with_channel(AP_CHANNEL)
            .with_auth_method(AuthMethod::Wpa2Personal),
    );

    loop {
        match controller.is_started() {
            Ok(true) => {
                Timer::after(Duration::from_secs(AP_WATCH_SECS)).await;
                continue;
            }
            Ok(false) => {}
            Err(err) => {
                warn!("portal: wifi status err={:?}", err);
                Timer::after(Duration::from_secs(WIFI_RETRY_SECS)).await;
                continue;
            }
        }

        if let Err(err) = controller.set_config(&mode) {
            error!("portal: access point config err={:?}", err);
            Timer::after(Duration::from_secs(WIFI_RETRY_SECS)).await;
            continue;
        }
        match controller.start_async().await {
            Ok(()) => info!("portal: access point '{}' up on channel {}", AP_SSID, AP_CHANNEL),
            Err(err) => {
                warn!("portal: access point start err={:?}", err);
                Timer::after(Duration::from_secs(WIFI_RETRY_SECS)).await;
            }
        }
    }
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

fn wifi_runtime_config() -> WifiRuntimeConfig {
    WifiRuntimeConfig::default()
        .with_rx_queue_size(WIFI_RX_QUEUE_SIZE)
        .with_tx_queue_size(WIFI_TX_QUEUE_SIZE)
        .with_static_rx_buf_num(WIFI_STATIC_RX_BUF_NUM)
        .with_dynamic_rx_buf_num(WIFI_DYNAMIC_RX_BUF_NUM)
        .with_dynamic_tx_buf_num(WIFI_DYNAMIC_TX_BUF_NUM)
        .with_ampdu_rx_enable(false)
        .with_ampdu_tx_enable(false)
        .with_rx_ba_win(WIFI_RX_BA_WIN)
}
