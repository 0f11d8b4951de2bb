use core::fmt;

use super::partition::{BootSlot, PartitionHandle};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BootCommitError {
    TargetIsRunning,
    UnsupportedSlot,
    PartitionTable,
    OtaDataMissing,
    OtaData,
    Flash,
}

impl BootCommitError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TargetIsRunning => "target is the running partition",
            Self::UnsupportedSlot => "target is not an ota app slot",
            Self::PartitionTable => "partition table unreadable",
            Self::OtaDataMissing => "otadata partition missing",
            Self::OtaData => "otadata invalid",
            Self::Flash => "otadata write failed",
        }
    }
}

impl fmt::Display for BootCommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform primitive that marks a partition as the image to run after the
/// next restart.
pub trait BootSelector {
    fn set_next_boot(&mut self, target: &PartitionHandle) -> Result<(), BootCommitError>;
}

impl<B: BootSelector + ?Sized> BootSelector for &mut B {
    fn set_next_boot(&mut self, target: &PartitionHandle) -> Result<(), BootCommitError> {
        (**self).set_next_boot(target)
    }
}

/// Commits `target` as the next-boot image. Refuses anything that would
/// point the device back at the bootloader's own slot.
pub fn commit_boot_target<B>(
    selector: &mut B,
    target: &PartitionHandle,
    running: Option<&PartitionHandle>,
) -> Result<(), BootCommitError>
where
    B: BootSelector + ?Sized,
{
    if target.subtype_tag == BootSlot::Running.subtype()
        || running.is_some_and(|running| running.overlaps(target))
    {
        return Err(BootCommitError::TargetIsRunning);
    }
    selector.set_next_boot(target)
}
