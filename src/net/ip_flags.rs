use bitflags::bitflags;

bitflags! {
    /// The three control bits of the IPv4 flags/fragment-offset word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IpFlags: u16 {
        /// Reserved, zero on the wire.
        const RF = 0x8000;
        /// Don't Fragment.
        const DF = 0x4000;
        /// More Fragments.
        const MF = 0x2000;
    }
}

/// The low 13 bits of the word carry the fragment offset.
const FRAG_OFFSET_MASK: u16 = 0x1fff;

impl IpFlags {
    /// Combine with a 13-bit fragment offset into the single u16 the header
    /// carries at bytes 6..8.
    pub fn pack(self, frag_offset: u16) -> u16 {
        self.bits() | (frag_offset & FRAG_OFFSET_MASK)
    }

    /// Split that combined word back into flag bits and fragment offset.
    pub fn unpack(word: u16) -> (Self, u16) {
        (Self::from_bits_truncate(word), word & FRAG_OFFSET_MASK)
    }
}

// -- Unit tests --
