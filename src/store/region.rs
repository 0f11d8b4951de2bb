use core::fmt;

use log::warn;

use crate::boot::partition::{
    find_partition, PartitionHandle, PartitionMap, DATA_SUBTYPE_NVS, PARTITION_TYPE_DATA,
};
use crate::config::CONFIG_STORE_PAGES_MIN;

use super::nvs::PAGE_SIZE;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RegionError {
    Missing,
    Misaligned,
    TooSmall,
    Overlaps(PartitionHandle),
}

impl RegionError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "no nvs partition",
            Self::Misaligned => "nvs partition not page aligned",
            Self::TooSmall => "nvs partition too small",
            Self::Overlaps(_) => "nvs partition overlaps another partition",
        }
    }
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlaps(other) => write!(f, "{} ({})", self.as_str(), other),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// The `nvs` data partition the gateway reads its settings from. There is
/// no fallback location: a table without a usable `nvs` entry, or one whose
/// `nvs` entry overlaps another partition, has nowhere safe to write.
pub fn config_region(map: &PartitionMap) -> Result<PartitionHandle, RegionError> {
    let region =
        find_partition(map, PARTITION_TYPE_DATA, DATA_SUBTYPE_NVS).ok_or(RegionError::Missing)?;
    let page_size = PAGE_SIZE as u32;
    if region.address % page_size != 0 || region.size % page_size != 0 {
        return Err(RegionError::Misaligned);
    }
    if ((region.size / page_size) as usize) < CONFIG_STORE_PAGES_MIN {
        return Err(RegionError::TooSmall);
    }
    if let Some(other) = map
        .entries()
        .iter()
        .find(|other| **other != region && other.overlaps(&region))
    {
        warn!("store: nvs {} overlaps {}", region, other);
        return Err(RegionError::Overlaps(*other));
    }
    Ok(region)
}
