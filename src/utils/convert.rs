use crate::Result;
use crate::StorageError;

/// Converts a `u64` to an 8-byte array in big-endian byte order.
///
/// Big-endian keys keep sled's lexicographic order equal to numeric order.
///
/// # Examples
/// ```
/// use dstore::convert::safe_kv;
///
/// let bytes = safe_kv(0x1234_5678_9ABC_DEF0);
/// assert_eq!(bytes, [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0]);
/// ```
pub const fn safe_kv(num: u64) -> [u8; 8] {
    num.to_be_bytes()
}

pub fn safe_vk<K: AsRef<[u8]>>(bytes: K) -> Result<u64> {
    let bytes = bytes.as_ref();
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::CorruptedKey(bytes.to_vec()))?;
    Ok(u64::from_be_bytes(array))
}
