use crate::{slice_array, ChunkType, Error, Result};

/// An owned `N x M` array of one element type, encoded little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub kind: ChunkType,
    pub n: u64,
    pub m: u32,
    pub data: Vec<u8>,
}

// Each arm generates an encoder from a flat slice with `m` columns, and a decoder back into a flat
// vector.
macro_rules! chunk_conversions {
    ($($ty:ty => $kind:ident, $from:ident, $to:ident;)*) => {
        impl Chunk {
            $(
                /// With `m == 0` the chunk has no rows, and writing it fails as empty.
                pub fn $from(values: &[$ty], m: u32) -> Self {
                    let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
                    Self {
                        kind: ChunkType::$kind,
                        n: values.len().checked_div(m as usize).unwrap_or(0) as u64,
                        m,
                        data,
                    }
                }

                pub fn $to(&self) -> Result<Vec<$ty>> {
                    self.expect_kind(&[ChunkType::$kind])?;
                    Ok(self
                        .data
                        .chunks_exact(std::mem::size_of::<$ty>())
                        .map(|bytes| <$ty>::from_le_bytes(slice_array(bytes)))
                        .collect())
                }
            )*
        }
    };
}

chunk_conversions! {
    u8 => U8, from_u8s, to_u8s;
    u32 => U32, from_u32s, to_u32s;
    u64 => U64, from_u64s, to_u64s;
    i32 => I32, from_i32s, to_i32s;
    f32 => F32, from_f32s, to_f32s;
}

impl Chunk {
    /// Number of bytes the shape and type of this chunk call for, or `None` if that overflows.
    pub fn expected_nbytes(&self) -> Option<usize> {
        usize::try_from(self.n)
            .ok()?
            .checked_mul(self.m as usize)?
            .checked_mul(self.kind.size())
    }

    /// Encode a list of names as a NUL-padded `i8` table, one row per name.
    ///
    /// The row width is the longest name plus one, so every row is terminated.
    pub fn from_strings<S: AsRef<str>>(names: &[S]) -> Self {
        let width = names
            .iter()
            .map(|name| name.as_ref().len())
            .max()
            .unwrap_or_default()
            + 1;
        let mut data = vec![0; names.len() * width];
        for (row, name) in data.chunks_exact_mut(width).zip(names) {
            let name = name.as_ref().as_bytes();
            row[..name.len()].copy_from_slice(name);
        }
        Self {
            kind: ChunkType::I8,
            n: names.len() as u64,
            m: width as u32,
            data,
        }
    }

    pub fn to_strings(&self) -> Result<Vec<String>> {
        self.expect_kind(&[ChunkType::I8, ChunkType::U8, ChunkType::Character])?;
        if self.m == 0 {
            return Ok(Vec::new());
        }
        self.data
            .chunks_exact(self.m as usize)
            .map(|row| {
                let end = row.iter().position(|&b| b == 0).unwrap_or(row.len());
                String::from_utf8(row[..end].to_vec()).map_err(|_| Error::InvalidUtf8Name)
            })
            .collect()
    }

    fn expect_kind(&self, allowed: &[ChunkType]) -> Result<()> {
        if allowed.contains(&self.kind) {
            Ok(())
        } else {
            Err(Error::WrongChunkType {
                expected: allowed[0],
                found: self.kind,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_padded_to_longest() {
        let chunk = Chunk::from_strings(&["typea", "b"]);
        assert_eq!(chunk.kind, ChunkType::I8);
        assert_eq!((chunk.n, chunk.m), (2, 6));
        assert_eq!(&chunk.data[..6], b"typea\0");
        assert_eq!(&chunk.data[6..], b"b\0\0\0\0\0");
        assert_eq!(chunk.to_strings().unwrap(), ["typea", "b"]);
    }

    #[test]
    fn shape_follows_columns() {
        let chunk = Chunk::from_f32s(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3);
        assert_eq!((chunk.n, chunk.m), (2, 3));
        assert_eq!(chunk.expected_nbytes(), Some(chunk.data.len()));
        assert_eq!(chunk.to_f32s().unwrap(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn zero_columns_has_no_rows() {
        let chunk = Chunk::from_f32s(&[1.0, 2.0], 0);
        assert_eq!((chunk.n, chunk.m), (0, 0));
        assert_eq!(chunk.expected_nbytes(), Some(0));
    }

    #[test]
    fn decoding_checks_the_type() {
        let chunk = Chunk::from_u32s(&[1, 2], 1);
        assert!(matches!(
            chunk.to_f32s(),
            Err(Error::WrongChunkType {
                expected: ChunkType::F32,
                found: ChunkType::U32
            })
        ));
    }
}
