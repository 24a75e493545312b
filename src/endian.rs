use core::fmt::Debug;
use core::mem::size_of;

/// Little-endian field of an on-disk record
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct Little<T: Copy + Default + Debug + PartialEq + Eq + Sized>(T);

macro_rules! define {
    ($type:ty) => {
        impl Little<$type> {
            #[inline]
            pub fn get(self) -> $type {
                <$type>::from_le(self.0)
            }
        }

        impl From<$type> for Little<$type> {
            #[inline]
            fn from(t: $type) -> Self {
                Self(<$type>::to_le(t))
            }
        }
    };
}

define!(u16);
define!(u32);

/// On-disk record that may be viewed as raw bytes and rebuilt from them.
///
/// # Safety
///
/// Implementors must be `#[repr(C, packed(1))]` and consist only of integers,
/// byte arrays and `Little` fields, so that every bit pattern is valid.
pub(crate) unsafe trait Plain: Copy + Sized {
    fn as_bytes(&self) -> &[u8] {
        let ptr = self as *const Self as *const u8;
        unsafe { core::slice::from_raw_parts(ptr, size_of::<Self>()) }
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        assert!(bytes.len() >= size_of::<Self>());
        unsafe { core::ptr::read_unaligned(bytes.as_ptr() as *const Self) }
    }

    /// Write the record at the start of `buf`
    fn encode(&self, buf: &mut [u8]) {
        buf[..size_of::<Self>()].copy_from_slice(self.as_bytes())
    }
}
