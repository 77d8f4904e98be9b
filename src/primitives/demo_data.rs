//! A small linear-congruential generator used only to stuff plausible bytes
//! into the demonstration client's upload payloads. The session core never
//! inspects the content it produces; see [`crate::session::classify`].

pub struct DemoRng(u64);

impl DemoRng {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    pub fn next_u8(&mut self) -> u8 {
        (self.next_u64() >> 33) as u8
    }

    pub fn fill(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.next_u8()).collect()
    }
}

/// 12 bytes: a stand-in for per-lane vehicle counts and occupancy, opaque
/// past the framing layer.
pub fn realtime_payload(rng: &mut DemoRng) -> Vec<u8> {
    rng.fill(12)
}

/// 16 bytes: a stand-in for a rolling window of classified counts.
pub fn statistics_payload(rng: &mut DemoRng) -> Vec<u8> {
    rng.fill(16)
}

/// 4 bytes: a stand-in for a device health/fault bitmask.
pub fn detector_status_payload(rng: &mut DemoRng) -> Vec<u8> {
    rng.fill(4)
}
