use super::Volume;
use crate::endian::{Little as LE, Plain};

#[derive(Copy, Clone, Debug, Default)]
#[repr(C, packed(1))]
pub(crate) struct PartitionEntry {
    pub status: u8,
    pub chs_first: [u8; 3],
    pub partition_type: u8,
    pub chs_last: [u8; 3],
    pub lba_first: LE<u32>,
    pub sector_count: LE<u32>,
}

#[derive(Copy, Clone)]
#[repr(C, packed(1))]
pub(crate) struct MasterBootRecord {
    pub bootcode: [u8; 440],
    pub disk_signature: LE<u32>,
    _reserved: LE<u16>,
    pub partitions: [PartitionEntry; 4],
    pub signature: [u8; 2],
}

unsafe impl Plain for MasterBootRecord {}

const BOOTABLE: u8 = 0x80;

/// Produce the MBR sector, padding sectors behind it are all zero
pub(crate) fn read_sector(volume: &Volume, buf: &mut [u8]) {
    buf.fill(0);
    let geometry = volume.geometry;
    let mut partitions = [PartitionEntry::default(); 4];
    partitions[0] = PartitionEntry {
        status: BOOTABLE,
        chs_first: [0; 3],
        partition_type: geometry.fat_type.partition_type(),
        chs_last: [0; 3],
        lba_first: geometry.mbr_sectors.into(),
        sector_count: geometry.sectors.into(),
    };
    let mbr = MasterBootRecord {
        bootcode: [0; 440],
        disk_signature: volume.serial.into(),
        _reserved: 0u16.into(),
        partitions,
        signature: hex!("55 AA"),
    };
    mbr.encode(buf)
}
