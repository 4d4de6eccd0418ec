//! The 24-byte TCP/USB bridge packet header and its checksum/magic
//! invariants. Grounded on `adb/tcpusb/packet.py`.

use byteorder::{ByteOrder, LittleEndian};

pub const A_SYNC: u32 = 0x434e5953;
pub const A_CNXN: u32 = 0x4e584e43;
pub const A_OPEN: u32 = 0x4e45504f;
pub const A_OKAY: u32 = 0x59414b4f;
pub const A_CLSE: u32 = 0x45534c43;
pub const A_WRTE: u32 = 0x45545257;
pub const A_AUTH: u32 = 0x48545541;

pub const AUTH_TOKEN: u32 = 1;
pub const AUTH_SIGNATURE: u32 = 2;
pub const AUTH_RSAPUBLICKEY: u32 = 3;
pub const TOKEN_LENGTH: usize = 20;

/// One bridge protocol frame: a 24-byte header plus `length` bytes of data.
#[derive(Debug, Clone)]
pub struct Packet {
    pub command: u32,
    pub arg0: u32,
    pub arg1: u32,
    pub length: u32,
    pub check: u32,
    pub magic: u32,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn checksum(data: &[u8]) -> u32 {
        data.iter().map(|&b| b as u32).sum()
    }

    pub fn magic_for(command: u32) -> u32 {
        command ^ 0xffff_ffff
    }

    /// Build the wire bytes for a packet, computing checksum/magic.
    pub fn assemble(command: u32, arg0: u32, arg1: u32, data: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; 24 + data.len()];
        LittleEndian::write_u32(&mut buf[0..4], command);
        LittleEndian::write_u32(&mut buf[4..8], arg0);
        LittleEndian::write_u32(&mut buf[8..12], arg1);
        LittleEndian::write_u32(&mut buf[12..16], data.len() as u32);
        LittleEndian::write_u32(&mut buf[16..20], Self::checksum(data));
        LittleEndian::write_u32(&mut buf[20..24], Self::magic_for(command));
        buf[24..].copy_from_slice(data);
        buf
    }

    pub fn verify_checksum(&self) -> bool {
        self.check == Self::checksum(&self.data)
    }

    pub fn verify_magic(&self) -> bool {
        self.magic == Self::magic_for(self.command)
    }

    pub fn name(&self) -> Option<&'static str> {
        match self.command {
            A_SYNC => Some("SYNC"),
            A_CNXN => Some("CNXN"),
            A_OPEN => Some("OPEN"),
            A_OKAY => Some("OKAY"),
            A_CLSE => Some("CLSE"),
            A_WRTE => Some("WRTE"),
            A_AUTH => Some("AUTH"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn assemble_round_trips_through_parse() {
        let data = b"hello";
        let wire = Packet::assemble(A_WRTE, 1, 2, data);
        assert_eq!(wire.len(), 24 + data.len());
        assert_eq!(LittleEndian::read_u32(&wire[12..16]), 5);
        let check = LittleEndian::read_u32(&wire[16..20]);
        assert_eq!(check, Packet::checksum(data));
        let magic = LittleEndian::read_u32(&wire[20..24]);
        assert_eq!(magic, A_WRTE ^ 0xffff_ffff);
    }

    #[test]
    fn checksum_of_empty_data_is_zero() {
        assert_eq!(Packet::checksum(&[]), 0);
    }
}
