use rand::random;
use std::ops::Add;

/// A 32-bit sequence number on the wire, relative to an initial sequence
/// number and wrapping modulo 2^32.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Wrap32 {
    value: u32,
}

impl Wrap32 {
    pub fn new(value: u32) -> Self {
        Wrap32 { value }
    }

    /// A randomly chosen value, suitable for an initial sequence number.
    pub fn random() -> Self {
        Wrap32::new(random::<u32>())
    }

    /// Wrap an absolute `seq_no` given an `initial seq_no`
    pub fn wrap(n: u64, isn: Wrap32) -> Self {
        Wrap32::new((n.wrapping_add(isn.value as u64) & 0xFFFF_FFFF) as u32)
    }

    /// Unwrap against the given `initial seq_no` to the absolute `seq_no`
    /// closest to `checkpoint`. A tie between two equally close candidates
    /// resolves to the smaller one; candidates below zero are unavailable,
    /// so small checkpoints clamp into the first era.
    pub fn unwrap(&self, isn: Wrap32, checkpoint: u64) -> u64 {
        const WRAP_SIZE: u64 = 1 << 32;
        const HALF_WRAP: u64 = WRAP_SIZE / 2;

        // Offset of this value from the ISN within one era
        let offset = self.value.wrapping_sub(isn.value) as u64;

        // Number of whole eras that puts `offset` nearest the checkpoint
        let k = (checkpoint + HALF_WRAP - 1).saturating_sub(offset) / WRAP_SIZE;

        offset + k * WRAP_SIZE
    }
}

impl Add<u32> for Wrap32 {
    type Output = Wrap32;

    fn add(self, n: u32) -> Wrap32 {
        Wrap32::new(self.value.wrapping_add(n))
    }
}

// -- Unit tests --

#[cfg(test)]
mod tests {
    use super::*;

    // -- Test wrapping --

    #[test]
    fn test_wrap_adds_to_isn() {
        let isn = Wrap32::new(0xdead_beef);
        assert_eq!(Wrap32::wrap(0, isn), isn);
        // 0x2152_4110 lands exactly on the top of the 32-bit range...
        assert_eq!(Wrap32::wrap(0x2152_4110, isn), Wrap32::new(u32::MAX));
        // ...and one more wraps through zero
        assert_eq!(Wrap32::wrap(0x2152_4111, isn), Wrap32::new(0));
        assert_eq!(Wrap32::wrap(0x2152_4112, isn), Wrap32::new(1));
    }

    #[test]
    fn test_wrap_exactly_one_era() {
        assert_eq!(Wrap32::wrap(1u64 << 32, Wrap32::new(0)), Wrap32::new(0));
    }

    #[test]
    fn test_wrap_ignores_whole_eras() {
        let isn = Wrap32::new(1000);
        assert_eq!(Wrap32::wrap(5 * (1u64 << 32) + 7, isn), Wrap32::new(1007));
        assert_eq!(Wrap32::wrap(9 * (1u64 << 32), isn), isn);
    }

    // -- Test unwrapping --

    #[test]
    fn test_unwrap_zero_at_zero_checkpoint() {
        let unwrapped = Wrap32::new(0).unwrap(Wrap32::new(0), 0);
        assert_eq!(unwrapped, 0u64);
    }

    #[test]
    fn test_unwrap_small_values_near_zero_checkpoint() {
        let isn = Wrap32::new(500);
        assert_eq!(Wrap32::new(500).unwrap(isn, 0), 0);
        assert_eq!(Wrap32::new(503).unwrap(isn, 0), 3);
    }

    #[test]
    fn test_unwrap_value_just_below_isn() {
        // 497 reads as three below the ISN, i.e. near the top of era zero
        let isn = Wrap32::new(500);
        assert_eq!(Wrap32::new(497).unwrap(isn, 0), (1u64 << 32) - 3);
    }

    #[test]
    fn test_unwrap_follows_checkpoint_across_eras() {
        let isn = Wrap32::new(77);
        let wire = Wrap32::new(87);
        for era in 0..5u64 {
            assert_eq!(wire.unwrap(isn, era << 32), (era << 32) + 10);
        }
    }

    #[test]
    fn test_unwrap_near_second_wraparound_checkpoint() {
        let unwrapped = Wrap32::new(1).unwrap(Wrap32::new(0), 1u64 << 33);
        assert_eq!(unwrapped, (1u64 << 33) + 1)
    }

    #[test]
    fn test_unwrap_resolves_to_nearest_side_of_checkpoint() {
        let isn = Wrap32::new(0);
        let checkpoint = (1u64 << 32) - 50;
        // A small wire value sits just past this checkpoint, in the era above
        assert_eq!(Wrap32::new(20).unwrap(isn, checkpoint), (1u64 << 32) + 20);
        // A large one sits just before it, in the era below
        let high = Wrap32::new(u32::MAX - 20);
        assert_eq!(high.unwrap(isn, checkpoint), (1u64 << 32) - 21);
    }

    #[test]
    fn test_unwrap_clamps_to_era_zero() {
        // The nearest candidate would be negative; era zero is the floor
        let isn = Wrap32::new(10);
        assert_eq!(Wrap32::new(5).unwrap(isn, 0), (1u64 << 32) - 5);
    }

    #[test]
    fn test_unwrap_tie_prefers_smaller_candidate() {
        // 0 and 2^32 are both exactly 2^31 away from the checkpoint
        let unwrapped = Wrap32::new(0).unwrap(Wrap32::new(0), 1u64 << 31);
        assert_eq!(unwrapped, 0);
    }

    #[test]
    fn test_wrap_unwrap_round_trip() {
        for &n in &[0u64, 1, 90210, u32::MAX as u64, (1u64 << 32) + 5, (1u64 << 45) - 1] {
            for &isn in &[Wrap32::new(0), Wrap32::new(17), Wrap32::new(u32::MAX)] {
                assert_eq!(Wrap32::wrap(n, isn).unwrap(isn, n), n);
            }
        }
    }

    // -- Test `+` operator overload --

    #[test]
    fn test_add_wraps_modulo_2_32() {
        assert_eq!(Wrap32::new(90210) + 5, Wrap32::new(90215));
        assert_eq!(Wrap32::new(u32::MAX - 1) + 3, Wrap32::new(1));
    }
}
