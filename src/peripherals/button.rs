//! button.rs — key descriptors, key events and pin sampling

use core::cell::RefCell;
use core::fmt;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal::digital::InputPin;

/// Bit set in a [`KeyEvent`] when the key was released.
pub const RELEASED_BIT: u8 = 0x80;
/// Mask selecting the key code out of a [`KeyEvent`] byte.
pub const CODE_MASK: u8 = 0x7f;

/// Identity of one physical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyDescriptor {
    /// Interrupt source the key's edges arrive on.
    pub irq: u32,
    /// GPIO pin sampled to read the key's level.
    pub pin: u32,
    /// Stable key code, 1..=0x7f.
    pub code: u8,
    /// Display name, e.g. "S1".
    pub name: &'static str,
}

impl KeyDescriptor {
    pub const fn new(irq: u32, pin: u32, code: u8, name: &'static str) -> Self {
        Self {
            irq,
            pin,
            code,
            name,
        }
    }

    /// The eight push buttons of the S5PV210 reference board.
    ///
    /// S1..S8 sit on external interrupts EINT0..EINT7 and GPH0 pins 0..7,
    /// with key codes 0x01..0x08.
    pub fn s5pv210_buttons() -> &'static [KeyDescriptor; 8] {
        const GPH0: u32 = 0x60;
        const BUTTONS: [KeyDescriptor; 8] = [
            KeyDescriptor::new(0, GPH0, 0x01, "S1"),
            KeyDescriptor::new(1, GPH0 + 1, 0x02, "S2"),
            KeyDescriptor::new(2, GPH0 + 2, 0x03, "S3"),
            KeyDescriptor::new(3, GPH0 + 3, 0x04, "S4"),
            KeyDescriptor::new(4, GPH0 + 4, 0x05, "S5"),
            KeyDescriptor::new(5, GPH0 + 5, 0x06, "S6"),
            KeyDescriptor::new(6, GPH0 + 6, 0x07, "S7"),
            KeyDescriptor::new(7, GPH0 + 7, 0x08, "S8"),
        ];

        &BUTTONS
    }
}

/// Logical level of a sampled pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    High,
    Low,
}

/// One key transition as seen on the wire: the key code, with
/// [`RELEASED_BIT`] set when the key was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent(u8);

impl KeyEvent {
    pub const fn pressed(code: u8) -> Self {
        Self(code & CODE_MASK)
    }

    pub const fn released(code: u8) -> Self {
        Self(RELEASED_BIT | (code & CODE_MASK))
    }

    /// Apply the polarity rule: buttons are wired active-low, so a high
    /// level means released and a low level means pressed.
    pub const fn from_level(key: &KeyDescriptor, level: Level) -> Self {
        match level {
            Level::High => Self::released(key.code),
            Level::Low => Self::pressed(key.code),
        }
    }

    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    pub const fn code(self) -> u8 {
        self.0 & CODE_MASK
    }

    pub const fn is_released(self) -> bool {
        self.0 & RELEASED_BIT != 0
    }

    pub const fn is_pressed(self) -> bool {
        !self.is_released()
    }

    /// The byte a size-1 read hands to the caller.
    pub const fn as_byte(self) -> u8 {
        self.0
    }
}

impl From<KeyEvent> for u8 {
    fn from(event: KeyEvent) -> Self {
        event.0
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_released() {
            "released"
        } else {
            "pressed"
        };
        write!(f, "key {:#04x} {}", self.code(), state)
    }
}

/// GPIO sampling service.
pub trait PinSampler {
    /// Read the current logical level of `pin`.
    fn read_level(&self, pin: u32) -> Level;
}

impl<S: PinSampler + ?Sized> PinSampler for &S {
    fn read_level(&self, pin: u32) -> Level {
        (**self).read_level(pin)
    }
}

/// [`PinSampler`] over a bank of `embedded-hal` input pins.
///
/// Pins are looked up by the id given at construction. Caller must configure
/// each pin as a pull-up input before handing it over. An unknown pin or a
/// failed read samples as [`Level::High`], i.e. as a released key.
pub struct InputPinSampler<P, const N: usize> {
    pins: Mutex<CriticalSectionRawMutex, RefCell<[(u32, P); N]>>,
}

impl<P, const N: usize> InputPinSampler<P, N>
where
    P: InputPin,
{
    pub fn new(pins: [(u32, P); N]) -> Self {
        Self {
            pins: Mutex::new(RefCell::new(pins)),
        }
    }
}

impl<P, const N: usize> PinSampler for InputPinSampler<P, N>
where
    P: InputPin,
{
    fn read_level(&self, pin: u32) -> Level {
        self.pins.lock(|pins| {
            let mut pins = pins.borrow_mut();
            let Some((_, input)) = pins.iter_mut().find(|(id, _)| *id == pin) else {
                warn!("no input bound to pin {}", pin);
                return Level::High;
            };
            // Active low - pressed = low logic level
            if input.is_low().unwrap_or(false) {
                Level::Low
            } else {
                Level::High
            }
        })
    }
}
