use heapless::Vec;

use crate::config::PROVISION_CHUNK_MAX;
use crate::store::StoreError;

/// One slice of an inbound body, positioned within the whole.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PayloadChunk {
    pub offset: usize,
    pub total: usize,
    pub bytes: Vec<u8, PROVISION_CHUNK_MAX>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) enum SessionEvent {
    Chunk(PayloadChunk),
    Validate,
    PersistSucceeded,
    PersistFailed(StoreError),
    Discard,
}
