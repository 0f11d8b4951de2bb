//! ESP-IDF NVS page and entry layout (format version 2).
//!
//! A page is 4 KiB: a 32-byte header, a 32-byte entry state bitmap and 126
//! entries of 32 bytes. An item is one header entry followed by `span - 1`
//! data entries. Only the item kinds the gateway uses are encoded here:
//! namespace definitions, `i32` values and strings.

use heapless::{String, Vec};

use crate::config::{CONFIG_KEY_MAX, CONFIG_VALUE_MAX};

use super::error::StoreError;
use super::set::StoreValue;

pub(super) const PAGE_SIZE: usize = 4_096;
pub(super) const ENTRY_SIZE: usize = 32;
pub(super) const ENTRIES_PER_PAGE: usize = 126;

const BITMAP_OFFSET: usize = 32;
const FIRST_ENTRY_OFFSET: usize = 64;
const FORMAT_VERSION: u8 = 0xFE;
const KEY_FIELD_LEN: usize = 16;
const NO_CHUNK: u8 = 0xFF;

pub(super) const NAMESPACE_NS: u8 = 0;
pub(super) const KIND_U8: u8 = 0x01;
pub(super) const KIND_I32: u8 = 0x14;
pub(super) const KIND_STR: u8 = 0x21;

/// Header entry plus enough data entries for the longest string value.
pub(super) const ITEM_SPAN_MAX: usize = 1 + (CONFIG_VALUE_MAX + 1).div_ceil(ENTRY_SIZE);

pub(super) type Item = Vec<[u8; ENTRY_SIZE], ITEM_SPAN_MAX>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum PageState {
    Empty,
    Active,
    Full,
    Freeing,
    Corrupt,
}

impl PageState {
    const fn raw(self) -> u32 {
        match self {
            Self::Empty => 0xFFFF_FFFF,
            Self::Active => 0xFFFF_FFFE,
            Self::Full => 0xFFFF_FFFC,
            Self::Freeing => 0xFFFF_FFF8,
            Self::Corrupt => 0xFFFF_FFF0,
        }
    }

    /// Pages whose entries are live data.
    pub(super) const fn is_readable(self) -> bool {
        matches!(self, Self::Active | Self::Full | Self::Freeing)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum EntryState {
    Empty,
    Written,
    Erased,
}

impl EntryState {
    const fn bits(self) -> u8 {
        match self {
            Self::Empty => 0b11,
            Self::Written => 0b10,
            Self::Erased => 0b00,
        }
    }
}

pub(super) fn crc32(parts: &[&[u8]]) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(u32::MAX);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize()
}

/// In-memory image of one flash page.
pub(super) struct Page {
    bytes: [u8; PAGE_SIZE],
}

impl Page {
    pub(super) const fn erased() -> Self {
        Self {
            bytes: [0xFF; PAGE_SIZE],
        }
    }

    /// A fresh active page with sequence number `seq`.
    pub(super) fn active(seq: u32) -> Self {
        let mut page = Self::erased();
        page.bytes[0..4].copy_from_slice(&PageState::Active.raw().to_le_bytes());
        page.bytes[4..8].copy_from_slice(&seq.to_le_bytes());
        page.bytes[8] = FORMAT_VERSION;
        let crc = crc32(&[&page.bytes[4..28]]);
        page.bytes[28..32].copy_from_slice(&crc.to_le_bytes());
        page
    }

    pub(super) fn bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.bytes
    }

    pub(super) fn bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.bytes
    }

    pub(super) fn state(&self) -> PageState {
        let state = match read_u32(&self.bytes[0..4]) {
            0xFFFF_FFFF => return PageState::Empty,
            0xFFFF_FFFE => PageState::Active,
            0xFFFF_FFFC => PageState::Full,
            0xFFFF_FFF8 => PageState::Freeing,
            _ => return PageState::Corrupt,
        };
        if crc32(&[&self.bytes[4..28]]) != read_u32(&self.bytes[28..32]) {
            return PageState::Corrupt;
        }
        state
    }

    pub(super) fn set_state(&mut self, state: PageState) {
        self.bytes[0..4].copy_from_slice(&state.raw().to_le_bytes());
    }

    pub(super) fn seq(&self) -> u32 {
        read_u32(&self.bytes[4..8])
    }

    pub(super) fn entry_state(&self, index: usize) -> EntryState {
        let byte = self.bytes[BITMAP_OFFSET + index / 4];
        match (byte >> ((index % 4) * 2)) & 0b11 {
            0b11 => EntryState::Empty,
            0b10 => EntryState::Written,
            _ => EntryState::Erased,
        }
    }

    pub(super) fn set_entry_state(&mut self, index: usize, state: EntryState) {
        let shift = (index % 4) * 2;
        let byte = &mut self.bytes[BITMAP_OFFSET + index / 4];
        *byte = (*byte & !(0b11 << shift)) | (state.bits() << shift);
    }

    pub(super) fn count(&self, state: EntryState) -> usize {
        (0..ENTRIES_PER_PAGE)
            .filter(|&index| self.entry_state(index) == state)
            .count()
    }

    /// Index after the last used entry.
    pub(super) fn next_free(&self) -> usize {
        (0..ENTRIES_PER_PAGE)
            .rev()
            .find(|&index| self.entry_state(index) != EntryState::Empty)
            .map_or(0, |index| index + 1)
    }

    pub(super) fn entry(&self, index: usize) -> &[u8] {
        let start = FIRST_ENTRY_OFFSET + index * ENTRY_SIZE;
        &self.bytes[start..start + ENTRY_SIZE]
    }

    pub(super) fn put_entry(&mut self, index: usize, entry: &[u8; ENTRY_SIZE]) {
        let start = FIRST_ENTRY_OFFSET + index * ENTRY_SIZE;
        self.bytes[start..start + ENTRY_SIZE].copy_from_slice(entry);
        self.set_entry_state(index, EntryState::Written);
    }

    /// Header of the item starting at `index`, if its CRC holds.
    pub(super) fn item(&self, index: usize) -> Option<ItemHeader<'_>> {
        let raw = self.entry(index);
        let stored = read_u32(&raw[4..8]);
        if crc32(&[&raw[0..4], &raw[8..32]]) != stored {
            return None;
        }
        let key_field = &raw[8..8 + KEY_FIELD_LEN];
        let key_len = key_field
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(KEY_FIELD_LEN);
        Some(ItemHeader {
            ns: raw[0],
            kind: raw[1],
            span: raw[2].max(1),
            key: core::str::from_utf8(&key_field[..key_len]).ok()?,
            data: &raw[24..32],
        })
    }

    /// Decodes the value of an `i32` or string item at `index`.
    pub(super) fn value(&self, index: usize, header: &ItemHeader<'_>) -> Option<StoreValue> {
        match header.kind {
            KIND_I32 => Some(StoreValue::Int(read_u32(&header.data[0..4]) as i32)),
            KIND_STR => {
                let size = u16::from_le_bytes([header.data[0], header.data[1]]) as usize;
                let start = FIRST_ENTRY_OFFSET + (index + 1) * ENTRY_SIZE;
                let capacity = (header.span as usize - 1) * ENTRY_SIZE;
                if size == 0 || size > capacity || index + header.span as usize > ENTRIES_PER_PAGE
                {
                    return None;
                }
                let payload = &self.bytes[start..start + size];
                if crc32(&[payload]) != read_u32(&header.data[4..8]) {
                    return None;
                }
                let text = core::str::from_utf8(&payload[..size - 1]).ok()?;
                String::try_from(text).ok().map(StoreValue::Str)
            }
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(super) struct ItemHeader<'a> {
    pub(super) ns: u8,
    pub(super) kind: u8,
    pub(super) span: u8,
    pub(super) key: &'a str,
    data: &'a [u8],
}

impl ItemHeader<'_> {
    /// Namespace index carried by a namespace definition.
    pub(super) fn namespace_index(&self) -> Option<u8> {
        (self.ns == NAMESPACE_NS && self.kind == KIND_U8).then_some(self.data[0])
    }
}

pub(super) fn namespace_item(name: &str, index: u8) -> Result<Item, StoreError> {
    let mut data = [0xFF; 8];
    data[0] = index;
    single(header(NAMESPACE_NS, KIND_U8, 1, name, data).map_err(|_| StoreError::NamespaceTooLong)?)
}

pub(super) fn value_item(ns: u8, key: &str, value: &StoreValue) -> Result<Item, StoreError> {
    match value {
        StoreValue::Int(value) => {
            let mut data = [0xFF; 8];
            data[0..4].copy_from_slice(&value.to_le_bytes());
            single(header(ns, KIND_I32, 1, key, data)?)
        }
        StoreValue::Str(value) => string_item(ns, key, value),
    }
}

fn string_item(ns: u8, key: &str, value: &str) -> Result<Item, StoreError> {
    let mut payload: Vec<u8, { CONFIG_VALUE_MAX + 1 }> = Vec::new();
    payload
        .extend_from_slice(value.as_bytes())
        .map_err(|_| StoreError::ValueTooLong)?;
    payload.push(0).map_err(|_| StoreError::ValueTooLong)?;
    let data_entries = payload.len().div_ceil(ENTRY_SIZE);

    let mut data = [0xFF; 8];
    data[0..2].copy_from_slice(&(payload.len() as u16).to_le_bytes());
    data[4..8].copy_from_slice(&crc32(&[&payload]).to_le_bytes());

    let mut item = single(header(ns, KIND_STR, 1 + data_entries as u8, key, data)?)?;
    for chunk in payload.chunks(ENTRY_SIZE) {
        let mut entry = [0xFF; ENTRY_SIZE];
        entry[..chunk.len()].copy_from_slice(chunk);
        item.push(entry).map_err(|_| StoreError::ValueTooLong)?;
    }
    Ok(item)
}

fn header(
    ns: u8,
    kind: u8,
    span: u8,
    key: &str,
    data: [u8; 8],
) -> Result<[u8; ENTRY_SIZE], StoreError> {
    if key.is_empty() || key.len() > CONFIG_KEY_MAX || key.as_bytes().contains(&0) {
        return Err(StoreError::KeyTooLong);
    }
    let mut entry = [0xFF; ENTRY_SIZE];
    entry[0] = ns;
    entry[1] = kind;
    entry[2] = span;
    entry[3] = NO_CHUNK;
    entry[8..8 + KEY_FIELD_LEN].fill(0);
    entry[8..8 + key.len()].copy_from_slice(key.as_bytes());
    entry[24..32].copy_from_slice(&data);
    let crc = crc32(&[&entry[0..4], &entry[8..32]]);
    entry[4..8].copy_from_slice(&crc.to_le_bytes());
    Ok(entry)
}

fn single(entry: [u8; ENTRY_SIZE]) -> Result<Item, StoreError> {
    let mut item = Item::new();
    item.push(entry).map_err(|_| StoreError::ValueTooLong)?;
    Ok(item)
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
