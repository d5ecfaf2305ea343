use crate::memory::bus::{lock, Addressable, BusAddress};
use crate::memory::interrupts::InterruptController;
use crate::memory::registers::InterruptFlags;
use log::warn;
use std::fmt;
use std::sync::{Arc, Mutex};

const SELECT_DIRECTIONS: u8 = 0b0001_0000;
const SELECT_BUTTONS: u8 = 0b0010_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    fn is_direction(&self) -> bool {
        matches!(self, Button::Right | Button::Left | Button::Up | Button::Down)
    }

    /// Bit in the low nibble of P1 for this button's group.
    fn mask(&self) -> u8 {
        match self {
            Button::Right | Button::A => 0b0000_0001,
            Button::Left | Button::B => 0b0000_0010,
            Button::Up | Button::Select => 0b0000_0100,
            Button::Down | Button::Start => 0b0000_1000,
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// P1 at $FF00. Pressed buttons read as 0 in whichever group is selected.
pub struct Joypad {
    select: u8,
    directions: u8,
    buttons: u8,
    interrupts: Arc<Mutex<InterruptController>>,
}

impl Joypad {
    pub fn new(interrupts: Arc<Mutex<InterruptController>>) -> Joypad {
        Joypad {
            select: SELECT_DIRECTIONS | SELECT_BUTTONS,
            directions: 0,
            buttons: 0,
            interrupts,
        }
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        let group = if button.is_direction() {
            &mut self.directions
        } else {
            &mut self.buttons
        };

        let was_pressed = *group & button.mask() != 0;
        if pressed {
            *group |= button.mask();
        } else {
            *group &= !button.mask();
        }

        if pressed && !was_pressed {
            lock(&self.interrupts).request(InterruptFlags::JOYPAD);
        }
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        let group = if button.is_direction() { self.directions } else { self.buttons };
        group & button.mask() != 0
    }
}

impl Addressable for Joypad {
    fn get(&self, _addr: BusAddress) -> u8 {
        let mut pressed = 0;
        if self.select & SELECT_DIRECTIONS == 0 {
            pressed |= self.directions;
        }
        if self.select & SELECT_BUTTONS == 0 {
            pressed |= self.buttons;
        }

        0b1100_0000 | self.select | (!pressed & 0b0000_1111)
    }

    fn set(&mut self, _addr: BusAddress, value: u8) {
        self.select = value & (SELECT_DIRECTIONS | SELECT_BUTTONS);
        if self.select == 0 {
            warn!("Joypad has buttons and d-pad mode selected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> BusAddress {
        BusAddress {
            address: 0xff00,
            offset: 0,
        }
    }

    fn joypad() -> (Joypad, Arc<Mutex<InterruptController>>) {
        let interrupts = Arc::new(Mutex::new(InterruptController::new()));
        (Joypad::new(interrupts.clone()), interrupts)
    }

    #[test]
    fn reads_selected_group_active_low() {
        let (mut joypad, _) = joypad();
        joypad.set_button(Button::Start, true);
        joypad.set_button(Button::Left, true);

        joypad.set(at(), SELECT_DIRECTIONS);
        assert_eq!(joypad.get(at()), 0b1101_0111);

        joypad.set(at(), SELECT_BUTTONS);
        assert_eq!(joypad.get(at()), 0b1110_1101);

        joypad.set(at(), SELECT_DIRECTIONS | SELECT_BUTTONS);
        assert_eq!(joypad.get(at()), 0xff);
    }

    #[test]
    fn interrupt_only_on_press_edge() {
        let (mut joypad, interrupts) = joypad();
        joypad.set_button(Button::A, true);
        assert_eq!(lock(&interrupts).flags(), InterruptFlags::JOYPAD);

        *lock(&interrupts) = InterruptController::new();
        joypad.set_button(Button::A, true);
        joypad.set_button(Button::A, false);
        assert!(lock(&interrupts).flags().is_empty());
        assert!(!joypad.is_pressed(Button::A));
    }
}
