//! HyperPixel 2.1 Round capacitive touch controller device driver
//!
//! This crate provides a device driver for the capacitive touch controller
//! fitted to the Pimoroni HyperPixel 2.1 Round display.
//!
//! The controller connects to the target via I2C (address 0x15) and a single
//! active-low interrupt line. The [`embedded_hal`](https://docs.rs/embedded-hal)
//! `blocking::i2c` and `digital::v2` interfaces are used, so the driver should
//! work with any target that provides these. On the HyperPixel itself the
//! interrupt line is wired to BCM pin 27; configure it as an input with an
//! internal pull-up and falling-edge detection.
//!
//! # Examples
//!
//! A decoder is created from an I2C bus and handed a touch handler:
//!
//! ```ignore
//!     let touch = hyperpixel2r_touch::Touch::new(i2c, hyperpixel2r_touch::DEFAULT_I2C_ADDR)
//!         .on_touch(|contact: Contact| {
//!             info!("{}: {},{} {}", contact.id, contact.x, contact.y, contact.pressed);
//!         });
//! ```
//!
//! Wrapping the decoder in an [`InterruptBridge`] ties it to the interrupt
//! line. The bridge's `handle_interrupt()` should be called from the falling
//! edge interrupt handler (or a task scheduled from it) with a millisecond
//! timestamp from the platform's monotonic timer; edges arriving inside the
//! debounce window are coalesced:
//!
//! ```ignore
//!     let mut bridge = InterruptBridge::new(touch, int_pin, DEFAULT_DEBOUNCE_MS)?;
//!
//!     // in the interrupt handler:
//!     bridge.clear_irq(|pin| platform_clear_edge_latch(pin));
//!     bridge.handle_interrupt(timer.millis());
//! ```
//!
//! The handler fires once per observable contact state change. The controller
//! reports two contact slots; a slot whose decoded state matches the last
//! state dispatched for that contact id is suppressed, so a finger held still
//! does not flood the handler.

#![cfg_attr(not(test), no_std)]

use paste;

pub mod registers;

/// Errors produced by the touch controller
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An I2C transaction failed (bus error, NACK or timeout)
    Transport,
    /// A contact record did not decode to a valid contact
    Decode,
    /// The interrupt line could not be acquired or read
    Resource,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Default I2C device address for the HyperPixel 2.1 Round touch controller
pub const DEFAULT_I2C_ADDR: u8 = 0x15;

/// Number of contact slots in the controller's report
pub const CONTACT_SLOTS: usize = 2;

/// Default minimum interval between accepted interrupt edges, in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 1;

/// Bytes per contact slot record
const RECORD_LEN: usize = 6;

/// Contact touched down
const EVENT_PRESS: u8 = 1 << 7;
/// Contact lifted
const EVENT_RELEASE: u8 = 1 << 6;

/// Product and version information of the touch controller
pub struct DeviceInfo {
    /// Contents of the Chip ID register
    pub chip_id: u8,
    /// Contents of the Firmware version register
    pub firmware_version: u8,
    /// Contents of the Vendor ID register
    pub vendor_id: u8,
}

/// State of one physical touch point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Contact {
    /// Contact id reported by the controller, 0 or 1
    pub id: u8,
    /// Screen-space X coordinate
    pub x: u16,
    /// Screen-space Y coordinate
    pub y: u16,
    /// `true` while the contact is down
    pub pressed: bool,
}

impl Contact {
    /// Decode one 6-byte contact slot record
    ///
    /// Byte 0 carries the event flags in its high nibble and the top of the
    /// X coordinate in its low nibble; byte 2 carries the contact id and the
    /// top of the Y coordinate the same way. Bytes 4 and 5 are pressure and
    /// area, which this driver does not use.
    ///
    /// Returns `Err(Error::Decode)` for a record of the wrong length or a
    /// contact id outside the controller's two slots.
    pub fn from_record(record: &[u8]) -> Result<Contact> {
        if record.len() != RECORD_LEN {
            return Err(Error::Decode);
        }
        let event = record[0] & 0xf0;
        let id = (record[2] & 0xf0) >> 4;
        if id as usize >= CONTACT_SLOTS {
            return Err(Error::Decode);
        }
        let x = u16::from_be_bytes([record[0] & 0x0f, record[1]]);
        let y = u16::from_be_bytes([record[2] & 0x0f, record[3]]);
        // Press is checked before release, so a record carrying both flags
        // (or neither) reads as released.
        let mut pressed = false;
        if event & EVENT_PRESS != 0 {
            pressed = true;
        }
        if event & EVENT_RELEASE != 0 {
            pressed = false;
        }
        Ok(Contact { id, x, y, pressed })
    }
}

/// Receives contact state changes from [`Touch::read_and_dispatch`]
///
/// Implemented for any `FnMut(Contact)` closure; implement it directly on a
/// state struct when a closure capture is inconvenient (e.g. in a `static`).
pub trait TouchHandler {
    fn on_touch(&mut self, contact: Contact);
}

impl<F: FnMut(Contact)> TouchHandler for F {
    fn on_touch(&mut self, contact: Contact) {
        self(contact)
    }
}

/// Placeholder handler installed until [`Touch::on_touch`] replaces it
///
/// Reports are still read and the contact table still updates; the state
/// changes are simply not delivered anywhere.
pub struct NoHandler;

impl TouchHandler for NoHandler {
    fn on_touch(&mut self, _contact: Contact) {}
}

/// HyperPixel 2.1 Round touch decoder
///
/// Owns the I2C transaction that fetches the contact report and the table of
/// last-dispatched contact states used for duplicate suppression.
pub struct Touch<I2C, H = NoHandler> {
    i2c: I2C,
    addr: u8,
    contacts: [Option<Contact>; CONTACT_SLOTS],
    handler: H,
}

impl<I2C> Touch<I2C> {
    /// Create a new touch decoder with no handler installed
    ///
    /// `i2c` is the I2C device, `addr` the controller's device address
    /// (normally [`DEFAULT_I2C_ADDR`]).
    pub fn new(i2c: I2C, addr: u8) -> Self {
        Touch {
            i2c,
            addr,
            contacts: [None; CONTACT_SLOTS],
            handler: NoHandler,
        }
    }
}

impl<I2C, H> Touch<I2C, H> {
    /// Install the handler that receives contact state changes
    ///
    /// Exactly one handler is active at a time; installing a new one replaces
    /// the previous handler. The contact table carries over, so replacement
    /// does not re-deliver states that were already dispatched.
    pub fn on_touch<H2: TouchHandler>(self, handler: H2) -> Touch<I2C, H2> {
        Touch {
            i2c: self.i2c,
            addr: self.addr,
            contacts: self.contacts,
            handler,
        }
    }

    /// Last dispatched state for a contact id, if any report mentioned it yet
    pub fn contact(&self, id: u8) -> Option<Contact> {
        self.contacts.get(id as usize).copied().flatten()
    }

    /// Release the underlying I2C device
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C, H> Touch<I2C, H>
where
    I2C: embedded_hal::blocking::i2c::WriteRead,
{
    /// Read a `u8` register
    pub fn read_reg_u8(&mut self, reg_num: u8) -> Result<u8> {
        let mut rd_buf = [0u8; 1];
        self.i2c
            .write_read(self.addr, &[reg_num], &mut rd_buf)
            .map_err(|_| Error::Transport)?;
        Ok(rd_buf[0])
    }

    /// Read the device identification registers
    pub fn get_info(&mut self) -> Result<DeviceInfo> {
        Ok(DeviceInfo {
            chip_id: self.read_reg_u8(registers::CHIP_ID)?,
            firmware_version: self.read_reg_u8(registers::FIRMWARE_VERSION)?,
            vendor_id: self.read_reg_u8(registers::VENDOR_ID)?,
        })
    }
}

impl<I2C, H> Touch<I2C, H>
where
    I2C: embedded_hal::blocking::i2c::Write,
{
    /// Write to a `u8` register
    pub fn write_reg_u8(&mut self, reg_num: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.addr, &[reg_num, value])
            .map_err(|_| Error::Transport)
    }
}

impl<I2C, H> Touch<I2C, H>
where
    I2C: embedded_hal::blocking::i2c::WriteRead,
    H: TouchHandler,
{
    /// Fetch the contact report and dispatch state changes to the handler
    ///
    /// Called once per interrupt edge. Reads the touch count register, then
    /// both contact slot records, and invokes the handler for every contact
    /// whose decoded state differs from the last state dispatched for its id,
    /// slot 0 first.
    ///
    /// On `Err` nothing was dispatched and the contact table is unchanged.
    pub fn read_and_dispatch(&mut self) -> Result<()> {
        let _count = self.read_reg_u8(registers::TOUCH_COUNT)?;
        // The count register under-reports while a contact lifts, so both
        // slots are read unconditionally; stale slots are suppressed by the
        // contact table comparison below.
        let mut rd_buf = [0u8; CONTACT_SLOTS * RECORD_LEN];
        self.i2c
            .write_read(self.addr, &[registers::CONTACT_DATA], &mut rd_buf)
            .map_err(|_| Error::Transport)?;

        // Decode both slots before touching the table so a malformed record
        // leaves no partial update behind.
        let first = Contact::from_record(&rd_buf[..RECORD_LEN])?;
        let second = Contact::from_record(&rd_buf[RECORD_LEN..])?;
        for contact in [first, second] {
            self.dispatch(contact);
        }
        Ok(())
    }

    fn dispatch(&mut self, contact: Contact) {
        let slot = &mut self.contacts[contact.id as usize];
        if *slot != Some(contact) {
            *slot = Some(contact);
            self.handler.on_touch(contact);
        }
    }
}

macro_rules! register_read {
    ($name:ident) => {
        $crate::paste::paste! {
            impl<I2C, H> Touch<I2C, H>
            where
                I2C: embedded_hal::blocking::i2c::WriteRead,
            {
                #[doc="Read the " [<$name:upper>] " register"]
                pub fn [<read_ $name:lower>](&mut self) -> Result<u8> {
                    self.read_reg_u8(registers::[<$name:upper>])
                }
            }
        }
    };
}

macro_rules! register_write {
    ($name:ident) => {
        $crate::paste::paste! {
            impl<I2C, H> Touch<I2C, H>
            where
                I2C: embedded_hal::blocking::i2c::Write,
            {
                #[doc="Write the " [<$name:upper>] " register"]
                pub fn [<write_ $name:lower>](&mut self, v: u8) -> Result<()> {
                    self.write_reg_u8(registers::[<$name:upper>], v)
                }
            }
        }
    };
}

macro_rules! register_acc {
    ($name:ident, ro) => {
        register_read!($name);
    };
    ($name:ident, rw) => {
        register_read!($name);
        register_write!($name);
    };
}

register_acc!(THRESHOLD, rw);
register_acc!(CHIP_ID, ro);
register_acc!(FIRMWARE_VERSION, ro);
register_acc!(VENDOR_ID, ro);

/// Binds a [`Touch`] decoder to the controller's interrupt line
///
/// The bridge owns both the decoder and the interrupt input pin for its whole
/// lifetime; [`InterruptBridge::release`] hands them back. The platform is
/// responsible for configuring the pin (input, pull-up, falling-edge
/// detection) before construction and for routing its edge interrupt to
/// [`InterruptBridge::handle_interrupt`].
pub struct InterruptBridge<I2C, H, PIN> {
    touch: Touch<I2C, H>,
    int_pin: PIN,
    debounce_ms: u64,
    last_edge_ms: Option<u64>,
}

impl<I2C, H, PIN> InterruptBridge<I2C, H, PIN>
where
    PIN: embedded_hal::digital::v2::InputPin,
{
    /// Create a bridge from a decoder and a configured interrupt input pin
    ///
    /// `debounce_ms` is the minimum interval between accepted edges
    /// (normally [`DEFAULT_DEBOUNCE_MS`]). The pin is probed once; a pin
    /// that cannot be read fails construction with `Error::Resource`, and
    /// the moved-in resources are dropped rather than left half-configured.
    pub fn new(touch: Touch<I2C, H>, int_pin: PIN, debounce_ms: u64) -> Result<Self> {
        int_pin.is_low().map_err(|_| Error::Resource)?;
        Ok(InterruptBridge {
            touch,
            int_pin,
            debounce_ms,
            last_edge_ms: None,
        })
    }
}

impl<I2C, H, PIN> InterruptBridge<I2C, H, PIN> {
    /// Access the decoder, e.g. for register reads between edges
    pub fn touch(&mut self) -> &mut Touch<I2C, H> {
        &mut self.touch
    }

    /// Call a platform specific function to clear the edge latch on the
    /// interrupt pin
    ///
    /// This wrapper is needed as the bridge owns the pin, so the platform
    /// can't maintain a mutable reference to it.
    pub fn clear_irq<F: FnMut(&mut PIN)>(&mut self, mut f: F) {
        f(&mut self.int_pin)
    }

    /// Tear the bridge down, returning the decoder and the interrupt pin
    ///
    /// Taking `self` by value means no edge can be handled once release
    /// begins and no dispatch can still be in flight when it returns.
    pub fn release(self) -> (Touch<I2C, H>, PIN) {
        (self.touch, self.int_pin)
    }
}

impl<I2C, H, PIN> InterruptBridge<I2C, H, PIN>
where
    I2C: embedded_hal::blocking::i2c::WriteRead,
    H: TouchHandler,
{
    /// Handle one falling edge of the interrupt line
    ///
    /// `now_ms` is a millisecond timestamp from the platform's monotonic
    /// timer. An edge closer than the debounce window to the last accepted
    /// edge is coalesced without touching the bus. Read or decode failures
    /// are swallowed here: the interrupt is dropped and the bridge stays
    /// ready for the next edge, since the interrupt context has no caller
    /// to observe an error.
    pub fn handle_interrupt(&mut self, now_ms: u64) {
        if let Some(last) = self.last_edge_ms {
            if now_ms.wrapping_sub(last) < self.debounce_ms {
                return;
            }
        }
        self.last_edge_ms = Some(now_ms);
        match self.touch.read_and_dispatch() {
            Ok(()) => {}
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("touch report dropped: {}", _e);
            }
        }
    }
}


// End of file
