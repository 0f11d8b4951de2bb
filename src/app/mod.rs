pub(crate) mod config;
mod platform;
mod portal;

use esp_hal::{
    clock::CpuClock,
    gpio::{Input, InputConfig, Pull},
};
use esp_storage::FlashStorage;
use gateway_bootloader::{
    boot::{conclude, run_boot_cycle, Banner, BootOutcome, BootPolicy, PartitionMap},
    config::CONFIG_NAMESPACE,
    provisioning::KEY_WIFI_SSID,
    store::{config_region, ConfigStore},
};
use log::{error, info, warn, LevelFilter};

use self::{
    config::UART_BAUD,
    platform::{load_partition_map, BusyDelay, HalClock, OtaBootSelector, SoftwareReset},
};

pub(crate) fn run() -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));
    esp_println::logger::init_logger(LevelFilter::Info);
    info!("{}", Banner::new(UART_BAUD));

    let mut button = Input::new(peripherals.GPIO0, InputConfig::default().with_pull(Pull::Up));
    let delay = BusyDelay::new();
    let clock = HalClock;
    let policy = BootPolicy::default();

    let mut flash = FlashStorage::new(peripherals.FLASH).multicore_auto_park();
    let partitions = load_partition_map(&mut flash);
    info!("partitions: {} entries", partitions.len());

    let outcome = {
        let mut selector = OtaBootSelector::new(&mut flash);
        run_boot_cycle(
            &mut button,
            &clock,
            &delay,
            &partitions,
            &mut selector,
            &policy,
        )
    };

    if outcome == BootOutcome::Provision {
        match open_config_store(flash, &partitions) {
            Some(store) => portal::run(peripherals.WIFI, peripherals.TIMG0, store),
            None => error!("config: no usable storage region for the gateway settings"),
        }
    }

    conclude(outcome, &delay, &mut SoftwareReset, &policy)
}

/// Opens the `nvs` partition the gateway firmware reads its settings from.
fn open_config_store(
    flash: FlashStorage<'static>,
    partitions: &PartitionMap,
) -> Option<ConfigStore<FlashStorage<'static>>> {
    let region = match config_region(partitions) {
        Ok(region) => region,
        Err(err) => {
            error!("config: {}", err);
            return None;
        }
    };

    let mut store = match ConfigStore::new(flash, region.address, region.size) {
        Ok(store) => store,
        Err(err) => {
            error!("config: nvs at 0x{:X} unusable: {}", region.address, err);
            return None;
        }
    };
    info!(
        "config: nvs at 0x{:X}, {} pages",
        store.offset(),
        store.page_count()
    );
    match store.load(CONFIG_NAMESPACE) {
        Ok(existing) => match existing.get_str(KEY_WIFI_SSID) {
            Some(ssid) => info!("config: saved settings for ssid '{}' will be replaced", ssid),
            None => info!("config: no saved settings yet"),
        },
        Err(err) => warn!("config: could not read saved settings: {}", err),
    }
    Some(store)
}
