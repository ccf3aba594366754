//! Fixed-width vector encoding: `dim` little-endian IEEE-754 f32 values.

use byteorder::{ByteOrder, LittleEndian};

use semdex_core::error::{Error, Result};

pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut out = vec![0u8; vector.len() * 4];
    LittleEndian::write_f32_into(vector, &mut out);
    out
}

pub fn decode_vector(id: &str, bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::CorruptEntry {
            id: id.to_string(),
            reason: format!("embedding blob of {} bytes is not a whole number of f32 values", bytes.len()),
        });
    }
    let mut out = vec![0f32; bytes.len() / 4];
    LittleEndian::read_f32_into(bytes, &mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_little_endian() {
        assert_eq!(encode_vector(&[1.0]), vec![0x00, 0x00, 0x80, 0x3f]);
        assert_eq!(decode_vector("x", &[0x00, 0x00, 0x80, 0xbf]).unwrap(), vec![-1.0]);
    }

    #[test]
    fn truncated_blob_is_corrupt() {
        let err = decode_vector("doc", &[0, 0, 0]).unwrap_err();
        assert!(matches!(err, Error::CorruptEntry { ref id, .. } if id == "doc"));
    }
}
