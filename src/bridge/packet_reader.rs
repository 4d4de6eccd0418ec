//! Reads [`Packet`]s off a blocking stream. Grounded on
//! `adb/tcpusb/packetreader.py`, adapted from its chunk-buffering state
//! machine (needed there to cooperate with non-blocking I/O) to direct
//! blocking reads, since this crate has no event loop to cooperate with.

use std::io::Read;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{AdbError, AdbResult};

use super::packet::Packet;

pub struct PacketReader<R> {
    reader: R,
}

impl<R: Read> PacketReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read the next packet. Returns `Ok(None)` on a clean EOF between
    /// packets (the stream closed with no partial header pending).
    pub fn read_packet(&mut self) -> AdbResult<Option<Packet>> {
        let mut first = [0u8; 1];
        let n = self.reader.read(&mut first)?;
        if n == 0 {
            return Ok(None);
        }
        let mut header = [0u8; 24];
        header[0] = first[0];
        self.reader.read_exact(&mut header[1..])?;

        let command = LittleEndian::read_u32(&header[0..4]);
        let arg0 = LittleEndian::read_u32(&header[4..8]);
        let arg1 = LittleEndian::read_u32(&header[8..12]);
        let length = LittleEndian::read_u32(&header[12..16]);
        let check = LittleEndian::read_u32(&header[16..20]);
        let magic = LittleEndian::read_u32(&header[20..24]);

        let mut packet = Packet {
            command,
            arg0,
            arg1,
            length,
            check,
            magic,
            data: Vec::new(),
        };
        if !packet.verify_magic() {
            return Err(AdbError::MagicError);
        }
        if length > 0 {
            let mut data = vec![0u8; length as usize];
            self.reader.read_exact(&mut data)?;
            packet.data = data;
            if !packet.verify_checksum() {
                return Err(AdbError::ChecksumError);
            }
        }
        Ok(Some(packet))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bridge::packet::A_WRTE;
    use std::io::Cursor;

    #[test]
    fn reads_one_packet_with_data() {
        let wire = Packet::assemble(A_WRTE, 1, 2, b"hi");
        let mut reader = PacketReader::new(Cursor::new(wire));
        let packet = reader.read_packet().unwrap().unwrap();
        assert_eq!(packet.command, A_WRTE);
        assert_eq!(packet.data, b"hi");
    }

    #[test]
    fn returns_none_on_clean_eof() {
        let mut reader = PacketReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(reader.read_packet().unwrap().is_none());
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut wire = Packet::assemble(A_WRTE, 1, 2, b"hi");
        wire[16] ^= 0xff;
        let mut reader = PacketReader::new(Cursor::new(wire));
        let err = reader.read_packet().unwrap_err();
        assert!(matches!(err, AdbError::ChecksumError));
    }
}
