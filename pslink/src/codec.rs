//! Little-endian packing of the fixed-width integers used on the wire.
//!
//! Every integer field the firmware understands is an unsigned little-endian
//! value of 1, 2, or 4 bytes:
//!
//! ```text
//! width 1:  [b0]
//! width 2:  [lo, hi]
//! width 4:  [b0, b1, b2, b3]   (b0 least significant)
//! ```

use {
    crate::error::{Error, Result},
    byteorder::{ByteOrder, LittleEndian, WriteBytesExt},
};

/// Width of an integer field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Width {
    /// One byte.
    Byte = 1,
    /// Two bytes.
    Short = 2,
    /// Four bytes.
    Word = 4,
}

impl Width {
    /// Number of bytes occupied by this width.
    pub fn bytes(self) -> usize {
        self as usize
    }

    /// Largest value representable in this width.
    pub fn max_value(self) -> u32 {
        match self {
            Self::Byte => u32::from(u8::MAX),
            Self::Short => u32::from(u16::MAX),
            Self::Word => u32::MAX,
        }
    }

    /// Smallest width that can hold `value`.
    ///
    /// The firmware depends on this exact choice when a caller sends a bare
    /// integer: values above 0xFF take two bytes, values above 0xFFFF four.
    pub fn for_value(value: u32) -> Self {
        if value > 0xFFFF {
            Self::Word
        } else if value > 0xFF {
            Self::Short
        } else {
            Self::Byte
        }
    }
}

impl TryFrom<usize> for Width {
    type Error = Error;

    fn try_from(width: usize) -> Result<Self> {
        match width {
            1 => Ok(Self::Byte),
            2 => Ok(Self::Short),
            4 => Ok(Self::Word),
            other => Err(Error::InvalidWidth(other)),
        }
    }
}

/// Pack `value` into exactly `width` little-endian bytes.
pub fn pack(value: u32, width: usize) -> Result<Vec<u8>> {
    pack_width(value, Width::try_from(width)?)
}

/// Pack `value` into a [`Width`].
#[allow(clippy::cast_possible_truncation)]
pub fn pack_width(value: u32, width: Width) -> Result<Vec<u8>> {
    if value > width.max_value() {
        return Err(Error::ValueTooLarge {
            value,
            width: width.bytes(),
        });
    }

    let mut buf = Vec::with_capacity(width.bytes());
    // Range checked above, truncating casts are exact.
    match width {
        Width::Byte => buf.write_u8(value as u8)?,
        Width::Short => buf.write_u16::<LittleEndian>(value as u16)?,
        Width::Word => buf.write_u32::<LittleEndian>(value)?,
    }
    Ok(buf)
}

/// Pack `value` using the smallest width that holds it.
pub fn pack_auto(value: u32) -> Result<Vec<u8>> {
    pack_width(value, Width::for_value(value))
}

/// Unpack a `width`-byte little-endian integer.
///
/// `bytes` must be exactly `width` long.
pub fn unpack(bytes: &[u8], width: usize) -> Result<u32> {
    let width = Width::try_from(width)?;
    if bytes.len() != width.bytes() {
        return Err(Error::LengthMismatch {
            expected: width.bytes(),
            actual: bytes.len(),
        });
    }

    Ok(match width {
        Width::Byte => u32::from(bytes[0]),
        Width::Short => u32::from(LittleEndian::read_u16(bytes)),
        Width::Word => LittleEndian::read_u32(bytes),
    })
}

/// Unpack an unsigned little-endian integer of any length up to 16 bytes.
///
/// An empty slice decodes to 0.
pub fn unpack_le(bytes: &[u8]) -> Result<u128> {
    match bytes.len() {
        0 => Ok(0),
        len @ 1..=16 => Ok(LittleEndian::read_uint128(bytes, len)),
        len => Err(Error::InvalidWidth(len)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack_boundaries() {
        for (width, values) in [
            (1, vec![0, 1, 0x7F, 0xFF]),
            (2, vec![0, 0x100, 0x1234, 0xFFFF]),
            (4, vec![0, 0x1_0000, 0xDEAD_BEEF, u32::MAX]),
        ] {
            for value in values {
                let packed = pack(value, width).unwrap();
                assert_eq!(packed.len(), width);
                assert_eq!(unpack(&packed, width).unwrap(), value);
            }
        }
    }

    #[test]
    fn test_pack_is_little_endian() {
        assert_eq!(pack(0x1234, 2).unwrap(), vec![0x34, 0x12]);
        assert_eq!(pack(0x0102_0304, 4).unwrap(), vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_invalid_width() {
        assert!(matches!(pack(1, 3), Err(Error::InvalidWidth(3))));
        assert!(matches!(pack(1, 0), Err(Error::InvalidWidth(0))));
        assert!(matches!(unpack(&[0; 8], 8), Err(Error::InvalidWidth(8))));
    }

    #[test]
    fn test_value_too_large() {
        assert!(matches!(
            pack(300, 1),
            Err(Error::ValueTooLarge { value: 300, width: 1 })
        ));
        assert!(matches!(pack(0x1_0000, 2), Err(Error::ValueTooLarge { .. })));
    }

    #[test]
    fn test_unpack_length_mismatch() {
        assert!(matches!(
            unpack(&[1, 2, 3], 4),
            Err(Error::LengthMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_auto_width() {
        assert_eq!(Width::for_value(5), Width::Byte);
        assert_eq!(Width::for_value(0xFF), Width::Byte);
        assert_eq!(Width::for_value(300), Width::Short);
        assert_eq!(Width::for_value(0xFFFF), Width::Short);
        assert_eq!(Width::for_value(70000), Width::Word);

        assert_eq!(pack_auto(5).unwrap(), vec![5]);
        assert_eq!(pack_auto(300).unwrap(), vec![0x2C, 0x01]);
        assert_eq!(pack_auto(70000).unwrap(), vec![0x70, 0x11, 0x01, 0x00]);
        assert_eq!(pack_auto(u32::MAX).unwrap(), vec![0xFF; 4]);
    }

    #[test]
    fn test_unpack_le_odd_lengths() {
        assert_eq!(unpack_le(&[0x01, 0x02, 0x03]).unwrap(), 0x030201);
        assert_eq!(unpack_le(&[0xFF; 8]).unwrap(), u128::from(u64::MAX));
        assert_eq!(unpack_le(&[0xFF; 16]).unwrap(), u128::MAX);
        assert_eq!(unpack_le(&[]).unwrap(), 0);
        assert!(matches!(unpack_le(&[0; 17]), Err(Error::InvalidWidth(17))));
    }
}
