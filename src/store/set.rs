use heapless::{String, Vec};

use crate::config::{CONFIG_ENTRY_MAX, CONFIG_KEY_MAX, CONFIG_NAMESPACE_MAX, CONFIG_VALUE_MAX};

use super::error::StoreError;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum StoreValue {
    Str(String<CONFIG_VALUE_MAX>),
    Int(i32),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StoreEntry {
    pub key: String<CONFIG_KEY_MAX>,
    pub value: StoreValue,
}

/// All fields of one namespace, in insertion order. Putting an existing key
/// replaces its value in place.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EntrySet {
    namespace: String<CONFIG_NAMESPACE_MAX>,
    entries: Vec<StoreEntry, CONFIG_ENTRY_MAX>,
}

impl EntrySet {
    pub fn new(namespace: &str) -> Result<Self, StoreError> {
        Ok(Self {
            namespace: String::try_from(namespace).map_err(|_| StoreError::NamespaceTooLong)?,
            entries: Vec::new(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn entries(&self) -> &[StoreEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn put_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let value = String::try_from(value).map_err(|_| StoreError::ValueTooLong)?;
        self.put(key, StoreValue::Str(value))
    }

    pub fn put_int(&mut self, key: &str, value: i32) -> Result<(), StoreError> {
        self.put(key, StoreValue::Int(value))
    }

    pub fn get(&self, key: &str) -> Option<&StoreValue> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            StoreValue::Str(value) => Some(value.as_str()),
            StoreValue::Int(_) => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.get(key)? {
            StoreValue::Int(value) => Some(*value),
            StoreValue::Str(_) => None,
        }
    }

    pub(super) fn put(&mut self, key: &str, value: StoreValue) -> Result<(), StoreError> {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.key == key) {
            entry.value = value;
            return Ok(());
        }
        let key = String::try_from(key).map_err(|_| StoreError::KeyTooLong)?;
        self.entries
            .push(StoreEntry { key, value })
            .map_err(|_| StoreError::TooManyEntries)
    }
}
