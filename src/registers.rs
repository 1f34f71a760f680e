//! Register IDs for the HyperPixel 2.1 Round touch controller
//!
//! The controller speaks the FT6x06-style single-byte register protocol:
//! the live contact report sits at the bottom of the map, identification
//! and tuning registers at the top.

macro_rules! register_id {
    ($name:ident, $addr:literal) => {
        $crate::paste::paste! {
            pub const [<$name:upper>]: u8 = $addr;
        }
    };
}

register_id!(TOUCH_COUNT, 0x02);
register_id!(CONTACT_DATA, 0x03);
register_id!(THRESHOLD, 0x80);
register_id!(CHIP_ID, 0xA3);
register_id!(FIRMWARE_VERSION, 0xA6);
register_id!(VENDOR_ID, 0xA8);
