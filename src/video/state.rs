#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    HBlank,
    VBlank,
    OamSearch,
    DataTransfer,
}

impl State {
    /// The mode number reported in STAT bits 0-1.
    pub fn as_u8(self) -> u8 {
        match self {
            State::HBlank => 0,
            State::VBlank => 1,
            State::OamSearch => 2,
            State::DataTransfer => 3,
        }
    }
}
