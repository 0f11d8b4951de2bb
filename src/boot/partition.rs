use core::fmt;

use heapless::Vec;

pub const PARTITION_TYPE_APP: u8 = 0x00;
pub const PARTITION_TYPE_DATA: u8 = 0x01;

pub const APP_SUBTYPE_FACTORY: u8 = 0x00;
pub const APP_SUBTYPE_OTA_0: u8 = 0x10;
pub const APP_SUBTYPE_OTA_1: u8 = 0x11;

pub const DATA_SUBTYPE_OTA: u8 = 0x00;
pub const DATA_SUBTYPE_NVS: u8 = 0x02;

pub const PARTITION_MAP_MAX: usize = 16;

/// The two application slots this bootloader knows about. The bootloader
/// itself runs from `ota_0`; the gateway firmware lives in `ota_1`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BootSlot {
    Running,
    Alternate,
}

impl BootSlot {
    pub const fn subtype(self) -> u8 {
        match self {
            Self::Running => APP_SUBTYPE_OTA_0,
            Self::Alternate => APP_SUBTYPE_OTA_1,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "ota_0",
            Self::Alternate => "ota_1",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PartitionHandle {
    pub type_tag: u8,
    pub subtype_tag: u8,
    pub address: u32,
    pub size: u32,
}

impl PartitionHandle {
    pub const fn new(type_tag: u8, subtype_tag: u8, address: u32, size: u32) -> Self {
        Self {
            type_tag,
            subtype_tag,
            address,
            size,
        }
    }

    pub const fn app(subtype_tag: u8, address: u32, size: u32) -> Self {
        Self::new(PARTITION_TYPE_APP, subtype_tag, address, size)
    }

    pub const fn end(&self) -> u64 {
        self.address as u64 + self.size as u64
    }

    pub const fn overlaps(&self, other: &Self) -> bool {
        (self.address as u64) < other.end() && (other.address as u64) < self.end()
    }

    pub const fn is_app(&self) -> bool {
        self.type_tag == PARTITION_TYPE_APP
    }
}

impl fmt::Display for PartitionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kib = self.size / 1024;
        write!(
            f,
            "type=0x{:02X} subtype=0x{:02X} address=0x{:X} size={} bytes ({}.{:02} MiB)",
            self.type_tag,
            self.subtype_tag,
            self.address,
            self.size,
            kib / 1024,
            (kib % 1024) * 100 / 1024
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SizeCheck {
    Valid,
    TooSmall,
}

pub const fn validate(handle: &PartitionHandle, min_size_bytes: u32) -> SizeCheck {
    if handle.size < min_size_bytes {
        SizeCheck::TooSmall
    } else {
        SizeCheck::Valid
    }
}

pub trait PartitionTable {
    fn lookup(&self, type_tag: u8, subtype_tag: u8) -> Option<PartitionHandle>;
}

pub fn find_partition<T>(table: &T, type_tag: u8, subtype_tag: u8) -> Option<PartitionHandle>
where
    T: PartitionTable + ?Sized,
{
    table.lookup(type_tag, subtype_tag)
}

pub fn find_slot<T>(table: &T, slot: BootSlot) -> Option<PartitionHandle>
where
    T: PartitionTable + ?Sized,
{
    find_partition(table, PARTITION_TYPE_APP, slot.subtype())
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PartitionMapError {
    Full,
}

impl PartitionMapError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "partition map full",
        }
    }
}

impl fmt::Display for PartitionMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory snapshot of the flash partition table, taken once per boot.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct PartitionMap {
    entries: Vec<PartitionHandle, PARTITION_MAP_MAX>,
}

impl PartitionMap {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn from_slice(entries: &[PartitionHandle]) -> Result<Self, PartitionMapError> {
        let mut map = Self::new();
        for entry in entries {
            map.push(*entry)?;
        }
        Ok(map)
    }

    pub fn push(&mut self, handle: PartitionHandle) -> Result<(), PartitionMapError> {
        self.entries
            .push(handle)
            .map_err(|_| PartitionMapError::Full)
    }

    pub fn entries(&self) -> &[PartitionHandle] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartitionTable for PartitionMap {
    fn lookup(&self, type_tag: u8, subtype_tag: u8) -> Option<PartitionHandle> {
        self.entries
            .iter()
            .find(|entry| entry.type_tag == type_tag && entry.subtype_tag == subtype_tag)
            .copied()
    }
}
