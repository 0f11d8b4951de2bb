use esp_bootloader_esp_idf::{
    ota::Ota,
    partitions::{
        self, AppPartitionSubType, DataPartitionSubType, PartitionType, PARTITION_TABLE_MAX_LEN,
    },
};
use esp_hal::time::{Duration, Instant};
use esp_storage::FlashStorage;
use gateway_bootloader::{
    boot::{
        partition::{APP_SUBTYPE_OTA_1, PARTITION_TYPE_APP, PARTITION_TYPE_DATA},
        BootCommitError, BootSelector, PartitionHandle, PartitionMap,
    },
    platform::{DelayOps, MonotonicClock, Restart},
};
use log::{error, info, warn};

const OTA_APP_SLOTS: usize = 2;

#[derive(Clone, Copy, Default)]
pub(crate) struct BusyDelay;

impl BusyDelay {
    pub(crate) const fn new() -> Self {
        Self
    }

    fn delay_duration(&self, duration: Duration) {
        let start = Instant::now();
        while start.elapsed() < duration {}
    }
}

impl DelayOps for BusyDelay {
    fn delay_us(&self, micros: u32) {
        self.delay_duration(Duration::from_micros(micros as u64));
    }

    fn delay_ms(&self, millis: u32) {
        self.delay_duration(Duration::from_millis(millis as u64));
    }
}

#[derive(Clone, Copy, Default)]
pub(crate) struct HalClock;

impl MonotonicClock for HalClock {
    fn now_ms(&self) -> u64 {
        Instant::now().duration_since_epoch().as_millis()
    }
}

pub(crate) struct SoftwareReset;

impl Restart for SoftwareReset {
    fn restart(&mut self) -> ! {
        esp_hal::system::software_reset()
    }
}

/// Snapshots the flash partition table. Entries that fail to parse are
/// skipped; an unreadable table yields an empty map.
pub(crate) fn load_partition_map(flash: &mut FlashStorage<'_>) -> PartitionMap {
    let mut map = PartitionMap::new();
    let mut buffer = [0u8; PARTITION_TABLE_MAX_LEN];
    let table = match partitions::read_partition_table(flash, &mut buffer) {
        Ok(table) => table,
        Err(err) => {
            error!("partitions: table unreadable: {:?}", err);
            return map;
        }
    };

    for index in 0..table.len() {
        let Ok(entry) = table.get_partition(index) else {
            warn!("partitions: entry {} unreadable", index);
            continue;
        };
        let (type_tag, subtype_tag) = match entry.partition_type() {
            PartitionType::App(subtype) => (PARTITION_TYPE_APP, subtype as u8),
            PartitionType::Data(subtype) => (PARTITION_TYPE_DATA, subtype as u8),
            _ => continue,
        };
        let handle = PartitionHandle::new(type_tag, subtype_tag, entry.offset(), entry.len());
        info!("partitions: {:<8} {}", entry.label_as_str(), handle);
        if map.push(handle).is_err() {
            warn!("partitions: map full, ignoring the rest of the table");
            break;
        }
    }
    map
}

/// Writes `otadata` so the ROM bootloader starts the target slot next.
pub(crate) struct OtaBootSelector<'a, 'd> {
    flash: &'a mut FlashStorage<'d>,
}

impl<'a, 'd> OtaBootSelector<'a, 'd> {
    pub(crate) fn new(flash: &'a mut FlashStorage<'d>) -> Self {
        Self { flash }
    }
}

impl BootSelector for OtaBootSelector<'_, '_> {
    fn set_next_boot(&mut self, target: &PartitionHandle) -> Result<(), BootCommitError> {
        if target.subtype_tag != APP_SUBTYPE_OTA_1 {
            return Err(BootCommitError::UnsupportedSlot);
        }

        let mut buffer = [0u8; PARTITION_TABLE_MAX_LEN];
        let table = partitions::read_partition_table(&mut *self.flash, &mut buffer)
            .map_err(|_| BootCommitError::PartitionTable)?;
        let otadata = table
            .find_partition(PartitionType::Data(DataPartitionSubType::Ota))
            .map_err(|_| BootCommitError::PartitionTable)?
            .ok_or(BootCommitError::OtaDataMissing)?;

        let mut region = otadata.as_embedded_storage(&mut *self.flash);
        let mut ota = Ota::new(&mut region, OTA_APP_SLOTS).map_err(|_| BootCommitError::OtaData)?;
        ota.set_current_app_partition(AppPartitionSubType::Ota1)
            .map_err(|_| BootCommitError::Flash)
    }
}
