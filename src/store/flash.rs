use core::ops::ControlFlow;

use embedded_storage::{ReadStorage, Storage};
use heapless::Vec;
use log::{info, warn};

use crate::config::{CONFIG_STORE_PAGES_MAX, CONFIG_STORE_PAGES_MIN};

use super::error::StoreError;
use super::nvs::{self, EntryState, ItemHeader, Page, PageState, ENTRIES_PER_PAGE, PAGE_SIZE};
use super::set::EntrySet;

/// Save contract used by provisioning. A batch of fields is only written
/// once every put has been accepted.
pub trait ConfigStorage {
    fn save(
        &mut self,
        namespace: &str,
        strings: &[(&str, &str)],
        ints: &[(&str, i32)],
    ) -> Result<(), StoreError>;
}

impl<C: ConfigStorage + ?Sized> ConfigStorage for &mut C {
    fn save(
        &mut self,
        namespace: &str,
        strings: &[(&str, &str)],
        ints: &[(&str, i32)],
    ) -> Result<(), StoreError> {
        (**self).save(namespace, strings, ints)
    }
}

/// Where an item sits inside the region.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Slot {
    page: usize,
    entry: usize,
    span: usize,
}

/// ESP-IDF NVS partition on a flash device. The gateway firmware reads the
/// same namespace back through its `Preferences` API.
pub struct ConfigStore<S> {
    storage: S,
    offset: u32,
    pages: usize,
    page: Page,
}

impl<S: ReadStorage> ConfigStore<S> {
    pub fn new(storage: S, offset: u32, len: u32) -> Result<Self, StoreError> {
        let page_size = PAGE_SIZE as u32;
        if offset % page_size != 0 || len % page_size != 0 {
            return Err(StoreError::RegionMisaligned);
        }
        let pages = (len / page_size) as usize;
        if pages < CONFIG_STORE_PAGES_MIN || offset as usize + len as usize > storage.capacity() {
            return Err(StoreError::RegionTooSmall);
        }
        if pages > CONFIG_STORE_PAGES_MAX {
            return Err(StoreError::RegionTooLarge);
        }
        Ok(Self {
            storage,
            offset,
            pages,
            page: Page::erased(),
        })
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Reads the fields of `namespace`. Damaged entries are skipped, and a
    /// namespace that was never written reads as an empty set.
    pub fn load(&mut self, namespace: &str) -> Result<EntrySet, StoreError> {
        let mut set = EntrySet::new(namespace)?;
        let Some(ns) = self.namespace_index(namespace)? else {
            return Ok(set);
        };
        self.visit(|page, slot, header| {
            if header.ns != ns {
                return ControlFlow::Continue(());
            }
            match page.value(slot.entry, header) {
                Some(value) => {
                    if let Err(err) = set.put(header.key, value) {
                        warn!("store: skipped '{}': {}", header.key, err);
                    }
                }
                None => warn!("store: unreadable value for '{}'", header.key),
            }
            ControlFlow::Continue(())
        })?;
        Ok(set)
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    fn page_address(&self, index: usize) -> u32 {
        self.offset + (index * PAGE_SIZE) as u32
    }

    fn read_page(&mut self, index: usize) -> Result<(), StoreError> {
        let address = self.page_address(index);
        self.storage
            .read(address, self.page.bytes_mut())
            .map_err(|_| StoreError::Read)
    }

    /// Readable pages, oldest sequence number first.
    fn page_order(&mut self) -> Result<Vec<usize, CONFIG_STORE_PAGES_MAX>, StoreError> {
        let mut order: Vec<(u32, usize), CONFIG_STORE_PAGES_MAX> = Vec::new();
        for index in 0..self.pages {
            self.read_page(index)?;
            if self.page.state().is_readable() {
                let _ = order.push((self.page.seq(), index));
            }
        }
        order.sort_unstable();
        Ok(order.iter().map(|&(_, index)| index).collect())
    }

    /// Walks every intact item in page order until the visitor breaks.
    fn visit<F>(&mut self, mut visitor: F) -> Result<(), StoreError>
    where
        F: FnMut(&Page, Slot, &ItemHeader<'_>) -> ControlFlow<()>,
    {
        for index in self.page_order()? {
            self.read_page(index)?;
            let page = &self.page;
            let mut entry = 0;
            while entry < ENTRIES_PER_PAGE {
                if page.entry_state(entry) != EntryState::Written {
                    entry += 1;
                    continue;
                }
                let Some(header) = page.item(entry) else {
                    entry += 1;
                    continue;
                };
                let slot = Slot {
                    page: index,
                    entry,
                    span: header.span as usize,
                };
                if visitor(page, slot, &header).is_break() {
                    return Ok(());
                }
                entry += slot.span;
            }
        }
        Ok(())
    }

    fn namespace_index(&mut self, namespace: &str) -> Result<Option<u8>, StoreError> {
        let mut found = None;
        self.visit(|_, _, header| match header.namespace_index() {
            Some(index) if header.key == namespace => {
                found = Some(index);
                ControlFlow::Break(())
            }
            _ => ControlFlow::Continue(()),
        })?;
        Ok(found)
    }
}

impl<S: Storage> ConfigStore<S> {
    /// Opens a write session on `namespace`, starting from what is stored.
    pub fn open(&mut self, namespace: &str) -> Result<StoreSession<'_, S>, StoreError> {
        let entries = self.load(namespace)?;
        let changes = EntrySet::new(namespace)?;
        info!("store: opened namespace '{}'", namespace);
        Ok(StoreSession {
            store: self,
            entries,
            changes,
            committed: false,
        })
    }

    fn flush_page(&mut self, index: usize) -> Result<(), StoreError> {
        let address = self.page_address(index);
        self.storage
            .write(address, self.page.bytes())
            .map_err(|_| StoreError::Write)
    }

    fn write_page(&mut self, index: usize, page: &Page) -> Result<(), StoreError> {
        let address = self.page_address(index);
        self.storage
            .write(address, page.bytes())
            .map_err(|_| StoreError::Write)
    }

    fn commit_changes(&mut self, changes: &EntrySet) -> Result<(), StoreError> {
        let namespace = changes.namespace();
        let ns = match self.namespace_index(namespace)? {
            Some(ns) => ns,
            None => {
                let ns = self.next_namespace_index()?;
                self.append(&nvs::namespace_item(namespace, ns)?)?;
                info!("store: created namespace '{}' as index {}", namespace, ns);
                ns
            }
        };
        for entry in changes.entries() {
            let item = nvs::value_item(ns, &entry.key, &entry.value)?;
            let written = self.append(&item)?;
            self.erase_stale(ns, &entry.key, written)?;
        }
        Ok(())
    }

    fn next_namespace_index(&mut self) -> Result<u8, StoreError> {
        let mut highest = 0u8;
        self.visit(|_, _, header| {
            if let Some(index) = header.namespace_index() {
                highest = highest.max(index);
            }
            ControlFlow::Continue(())
        })?;
        match highest {
            0xFE..=0xFF => Err(StoreError::NamespacesExhausted),
            _ => Ok(highest + 1),
        }
    }

    fn append(&mut self, item: &nvs::Item) -> Result<Slot, StoreError> {
        let span = item.len();
        for _ in 0..=self.pages {
            if let Some(index) = self.active_page()? {
                let free = self.page.next_free();
                if free + span <= ENTRIES_PER_PAGE {
                    for (offset, entry) in item.iter().enumerate() {
                        self.page.put_entry(free + offset, entry);
                    }
                    self.flush_page(index)?;
                    return Ok(Slot {
                        page: index,
                        entry: free,
                        span,
                    });
                }
                self.page.set_state(PageState::Full);
                self.flush_page(index)?;
            }
            self.open_page()?;
        }
        Err(StoreError::NoSpace)
    }

    /// Finds the newest active page and leaves it in the page buffer.
    fn active_page(&mut self) -> Result<Option<usize>, StoreError> {
        let mut active: Option<(u32, usize)> = None;
        for index in 0..self.pages {
            self.read_page(index)?;
            if self.page.state() == PageState::Active {
                let seq = self.page.seq();
                if active.map_or(true, |(newest, _)| seq > newest) {
                    active = Some((seq, index));
                }
            }
        }
        match active {
            Some((_, index)) => {
                self.read_page(index)?;
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    /// Starts a new active page. The last empty page is held back and only
    /// taken to compact the full page with the most erased entries.
    fn open_page(&mut self) -> Result<(), StoreError> {
        let mut empty: Vec<usize, CONFIG_STORE_PAGES_MAX> = Vec::new();
        let mut victim: Option<(usize, usize)> = None;
        let mut next_seq = 0u32;
        for index in 0..self.pages {
            self.read_page(index)?;
            let state = self.page.state();
            match state {
                PageState::Empty => {
                    let _ = empty.push(index);
                }
                PageState::Full => {
                    let erased = self.page.count(EntryState::Erased);
                    if erased > 0 && victim.map_or(true, |(most, _)| erased > most) {
                        victim = Some((erased, index));
                    }
                }
                _ => {}
            }
            if state.is_readable() {
                next_seq = next_seq.max(self.page.seq().wrapping_add(1));
            }
        }
        match (empty.as_slice(), victim) {
            ([first, _, ..], _) => self.write_page(*first, &Page::active(next_seq)),
            ([reserve], Some((_, victim))) => self.compact(victim, *reserve, next_seq),
            _ => Err(StoreError::NoSpace),
        }
    }

    fn compact(&mut self, victim: usize, reserve: usize, seq: u32) -> Result<(), StoreError> {
        self.read_page(victim)?;
        self.page.set_state(PageState::Freeing);
        self.flush_page(victim)?;

        let mut fresh = Page::active(seq);
        let mut next = 0;
        for index in 0..ENTRIES_PER_PAGE {
            if self.page.entry_state(index) != EntryState::Written {
                continue;
            }
            let mut entry = [0u8; nvs::ENTRY_SIZE];
            entry.copy_from_slice(self.page.entry(index));
            fresh.put_entry(next, &entry);
            next += 1;
        }
        self.write_page(reserve, &fresh)?;
        self.write_page(victim, &Page::erased())?;
        info!(
            "store: compacted page {} into page {} ({} entries kept)",
            victim, reserve, next
        );
        Ok(())
    }

    /// Marks older copies of `key` as erased once `keep` holds the new value.
    fn erase_stale(&mut self, ns: u8, key: &str, keep: Slot) -> Result<(), StoreError> {
        let mut stale: Vec<Slot, 4> = Vec::new();
        self.visit(|_, slot, header| {
            if header.ns == ns && header.key == key && slot != keep && stale.push(slot).is_err() {
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        })?;
        for slot in stale {
            self.read_page(slot.page)?;
            let end = (slot.entry + slot.span).min(ENTRIES_PER_PAGE);
            for entry in slot.entry..end {
                self.page.set_entry_state(entry, EntryState::Erased);
            }
            self.flush_page(slot.page)?;
        }
        Ok(())
    }
}

impl<S: Storage> ConfigStorage for ConfigStore<S> {
    fn save(
        &mut self,
        namespace: &str,
        strings: &[(&str, &str)],
        ints: &[(&str, i32)],
    ) -> Result<(), StoreError> {
        let mut session = self.open(namespace)?;
        for (key, value) in strings {
            session.put_str(key, value)?;
        }
        for (key, value) in ints {
            session.put_int(key, *value)?;
        }
        session.commit()
    }
}

/// Pending writes to one namespace. Nothing reaches flash until
/// [`commit`](Self::commit); dropping the session discards the puts.
pub struct StoreSession<'a, S: Storage> {
    store: &'a mut ConfigStore<S>,
    entries: EntrySet,
    changes: EntrySet,
    committed: bool,
}

impl<S: Storage> StoreSession<'_, S> {
    pub fn put_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.entries.get_str(key) == Some(value) {
            return Ok(());
        }
        self.entries.put_str(key, value)?;
        self.changes.put_str(key, value)
    }

    pub fn put_int(&mut self, key: &str, value: i32) -> Result<(), StoreError> {
        if self.entries.get_int(key) == Some(value) {
            return Ok(());
        }
        self.entries.put_int(key, value)?;
        self.changes.put_int(key, value)
    }

    pub fn entries(&self) -> &EntrySet {
        &self.entries
    }

    /// Writes only the entries whose value differs from flash.
    pub fn commit(mut self) -> Result<(), StoreError> {
        if !self.changes.is_empty() {
            self.store.commit_changes(&self.changes)?;
        }
        self.committed = true;
        Ok(())
    }
}

impl<S: Storage> Drop for StoreSession<'_, S> {
    fn drop(&mut self) {
        if !self.changes.is_empty() && !self.committed {
            warn!(
                "store: closed namespace '{}' with uncommitted changes",
                self.entries.namespace()
            );
        } else {
            info!("store: closed namespace '{}'", self.entries.namespace());
        }
    }
}
