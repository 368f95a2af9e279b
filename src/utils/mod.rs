pub(crate) mod cursor;

pub(crate) use cursor::ByteCursor;

/// Decodes a 28 bit "synchsafe" integer: four bytes carrying 7 bits each.
#[inline]
pub(crate) fn synchsafe_u32(bytes: [u8; 4]) -> u32 {
    (u32::from(bytes[0] & 0x7f) << 21)
        | (u32::from(bytes[1] & 0x7f) << 14)
        | (u32::from(bytes[2] & 0x7f) << 7)
        | u32::from(bytes[3] & 0x7f)
}
