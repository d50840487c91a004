/// Incremental CRC-32C (Castagnoli) accumulator, matching the
/// `crc32cInit`/`crc32cComp`/`crc32cFinish` sequence records are validated
/// and re-signed with: main data, then each backup block in order, then the
/// record header up to (not including) `xl_crc` itself.
#[derive(Debug, Clone, Copy)]
pub struct Crc32c(u32);

impl Crc32c {
    pub fn init() -> Self {
        Crc32c(0)
    }

    #[must_use]
    pub fn update(self, data: &[u8]) -> Self {
        Crc32c(crc32c::crc32c_append(self.0, data))
    }

    pub fn finish(self) -> u32 {
        self.0
    }
}

impl Default for Crc32c {
    fn default() -> Self {
        Self::init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_one_shot_crc32c() {
        let data = b"resource manager data goes here";
        let incremental = Crc32c::init().update(&data[..10]).update(&data[10..]).finish();
        let one_shot = crc32c::crc32c(data);
        assert_eq!(incremental, one_shot);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(Crc32c::init().finish(), 0);
    }
}
