use crate::jvm::Error;
use byteorder::{BigEndian, ByteOrder};

/// Cursor over a borrowed slice of class file bytes
///
/// Every read is bounds checked; running off the end means the file was truncated. Multi-byte
/// values are big-endian throughout the format.
pub struct ClassReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ClassReader<'a> {
    pub fn new(bytes: &'a [u8]) -> ClassReader<'a> {
        ClassReader { bytes, position: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left in the input
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], Error> {
        match self.bytes.get(self.position..self.position + count) {
            Some(bytes) => {
                self.position += count;
                Ok(bytes)
            }
            None => Err(Error::MalformedClassFile(format!(
                "input truncated: needed {} more bytes at offset {}",
                count, self.position
            ))),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    pub fn read_i64(&mut self) -> Result<i64, Error> {
        Ok(BigEndian::read_i64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(BigEndian::read_f32(self.take(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(BigEndian::read_f64(self.take(8)?))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, Error> {
        Ok(self.take(count)?.to_vec())
    }

    /// Reader restricted to the next `count` bytes (used for attribute bodies)
    pub fn sub_reader(&mut self, count: usize) -> Result<ClassReader<'a>, Error> {
        Ok(ClassReader::new(self.take(count)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_are_big_endian() {
        let mut reader = ClassReader::new(&[0xca, 0xfe, 0xba, 0xbe, 0x00, 0x10]);
        assert_eq!(reader.read_u32().unwrap(), 0xcafebabe);
        assert_eq!(reader.read_u16().unwrap(), 16);
        assert!(reader.is_done());
    }

    #[test]
    fn truncated_input_is_an_error() {
        let mut reader = ClassReader::new(&[0x00, 0x01, 0x02]);
        assert_eq!(reader.read_u16().unwrap(), 1);
        assert!(reader.read_u16().is_err());
        // Position is not advanced past a failed read
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.read_u8().unwrap(), 2);
    }

    #[test]
    fn sub_reader_consumes_exactly_its_window() {
        let mut reader = ClassReader::new(&[1, 2, 3, 4, 5]);
        let mut sub = reader.sub_reader(3).unwrap();
        assert_eq!(sub.read_u16().unwrap(), 0x0102);
        assert_eq!(sub.remaining(), 1);
        assert_eq!(reader.read_u16().unwrap(), 0x0405);
    }
}
