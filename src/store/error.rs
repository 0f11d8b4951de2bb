use core::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StoreError {
    NamespaceTooLong,
    KeyTooLong,
    ValueTooLong,
    TooManyEntries,
    NamespacesExhausted,
    NoSpace,
    RegionMisaligned,
    RegionTooSmall,
    RegionTooLarge,
    Read,
    Write,
}

impl StoreError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NamespaceTooLong => "namespace too long",
            Self::KeyTooLong => "key too long",
            Self::ValueTooLong => "value too long",
            Self::TooManyEntries => "too many entries",
            Self::NamespacesExhausted => "no namespace index left",
            Self::NoSpace => "nvs partition full",
            Self::RegionMisaligned => "nvs region not page aligned",
            Self::RegionTooSmall => "storage region too small",
            Self::RegionTooLarge => "nvs region has too many pages",
            Self::Read => "flash read failed",
            Self::Write => "flash write failed",
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
