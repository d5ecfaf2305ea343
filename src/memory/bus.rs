use crate::memory::OPEN_BUS;
use log::trace;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A raw address together with its offset from the start of the mapping that claimed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusAddress {
    pub address: u16,
    pub offset: u16,
}

/// Anything that can be mapped into the address space.
///
/// Regions should index by `offset` so the same implementation works at any mapping.
/// Only controllers that decode registers from the address itself (cartridge MBCs,
/// I/O blocks) look at the raw `address`.
pub trait Addressable: Send {
    fn get(&self, addr: BusAddress) -> u8;
    fn set(&mut self, addr: BusAddress, value: u8);

    /// Contiguous storage starting at `addr`, if the region has any.
    fn block(&self, _addr: BusAddress) -> Option<&[u8]> {
        None
    }

    fn enabled(&self) -> bool {
        true
    }
}

pub type Region = Arc<Mutex<dyn Addressable>>;

/// Locks a shared component, recovering the data if a previous holder panicked.
pub fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct AddressSpace {
    start: u16,
    end: u16,
    region: Region,
}

impl AddressSpace {
    #[inline]
    fn contains(&self, addr: u16) -> bool {
        addr >= self.start && addr <= self.end
    }
}

#[derive(Default)]
pub struct Bus {
    address_spaces: Vec<AddressSpace>,
}

impl Bus {
    pub fn new() -> Bus {
        Bus::default()
    }

    /// Maps `region` over `start..=end`. Earlier registrations win on overlap.
    pub fn register<R>(&mut self, start: u16, end: u16, region: Arc<Mutex<R>>)
    where
        R: Addressable + 'static,
    {
        trace!("Bus: mapping ${:04x}-${:04x}", start, end);
        let region: Region = region;
        self.address_spaces.push(AddressSpace { start, end, region });
    }

    pub fn get(&self, addr: u16) -> u8 {
        for space in self.address_spaces.iter().filter(|s| s.contains(addr)) {
            let region = lock(&space.region);
            if region.enabled() {
                return region.get(BusAddress {
                    address: addr,
                    offset: addr - space.start,
                });
            }
        }

        OPEN_BUS
    }

    pub fn set(&self, addr: u16, value: u8) {
        for space in self.address_spaces.iter().filter(|s| s.contains(addr)) {
            let mut region = lock(&space.region);
            if region.enabled() {
                region.set(
                    BusAddress {
                        address: addr,
                        offset: addr - space.start,
                    },
                    value,
                );
                return;
            }
        }
    }

    /// Runs `f` over the raw storage behind `addr`. The slice cannot escape the call,
    /// so it never outlives the lock on its region.
    ///
    /// Returns `None` when nothing is mapped or the region refuses block access.
    pub fn with_block<T>(&self, addr: u16, f: impl FnOnce(&[u8]) -> T) -> Option<T> {
        let space = self.address_spaces.iter().find(|s| s.contains(addr) && lock(&s.region).enabled())?;
        let region = lock(&space.region);
        let block = region.block(BusAddress {
            address: addr,
            offset: addr - space.start,
        })?;
        Some(f(block))
    }

    pub fn read16(&self, addr: u16) -> u16 {
        let lo = self.get(addr) as u16;
        let hi = self.get(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    pub fn write16(&self, addr: u16, data: u16) {
        let [lo, hi] = data.to_le_bytes();
        self.set(addr, lo);
        self.set(addr.wrapping_add(1), hi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ram::Ram;

    struct Fixed(u8);

    impl Addressable for Fixed {
        fn get(&self, _addr: BusAddress) -> u8 {
            self.0
        }

        fn set(&mut self, _addr: BusAddress, value: u8) {
            self.0 = value;
        }
    }

    struct Switchable {
        value: u8,
        enabled: bool,
    }

    impl Addressable for Switchable {
        fn get(&self, _addr: BusAddress) -> u8 {
            self.value
        }

        fn set(&mut self, _addr: BusAddress, _value: u8) {}

        fn enabled(&self) -> bool {
            self.enabled
        }
    }

    #[test]
    fn unmapped_reads_float_and_writes_vanish() {
        let bus = Bus::new();
        bus.set(0x1234, 0x42);
        assert_eq!(bus.get(0x1234), OPEN_BUS);
        assert!(bus.with_block(0x1234, |b| b.len()).is_none());
    }

    #[test]
    fn first_registered_mapping_wins() {
        let mut bus = Bus::new();
        bus.register(0x0000, 0x00ff, Arc::new(Mutex::new(Fixed(0x11))));
        bus.register(0x0000, 0x7fff, Arc::new(Mutex::new(Fixed(0x22))));

        assert_eq!(bus.get(0x0010), 0x11);
        assert_eq!(bus.get(0x0100), 0x22);
    }

    #[test]
    fn disabled_region_falls_through() {
        let gate = Arc::new(Mutex::new(Switchable {
            value: 0x11,
            enabled: true,
        }));

        let mut bus = Bus::new();
        bus.register(0x0000, 0x00ff, gate.clone());
        bus.register(0x0000, 0x003f, Arc::new(Mutex::new(Fixed(0x22))));

        assert_eq!(bus.get(0x0020), 0x11);
        lock(&gate).enabled = false;
        assert_eq!(bus.get(0x0020), 0x22);
        assert_eq!(bus.get(0x0080), OPEN_BUS);
    }

    #[test]
    fn regions_see_offsets_not_addresses() {
        let ram = Arc::new(Mutex::new(Ram::new(0x10)));
        let mut bus = Bus::new();
        bus.register(0xc000, 0xc00f, ram.clone());
        bus.register(0xe000, 0xe00f, ram);

        bus.set(0xc003, 0x99);
        assert_eq!(bus.get(0xe003), 0x99);
        assert_eq!(bus.with_block(0xc002, |b| (b.len(), b[1])), Some((0x0e, 0x99)));
    }

    #[test]
    fn word_access_is_little_endian() {
        let mut bus = Bus::new();
        bus.register(0xc000, 0xc0ff, Arc::new(Mutex::new(Ram::new(0x100))));

        bus.write16(0xc010, 0xbeef);
        assert_eq!(bus.get(0xc010), 0xef);
        assert_eq!(bus.get(0xc011), 0xbe);
        assert_eq!(bus.read16(0xc010), 0xbeef);
    }
}
