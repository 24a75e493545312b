// Reserved region

use super::Volume;
use crate::endian::{Little as LE, Plain};
use crate::geometry::{FatType, Geometry};
use crate::tree::shortname::label_bytes;
use crate::tree::ROOT;

pub(crate) const FSINFO_SECTOR: u32 = 1;
pub(crate) const BACKUP_BOOT_SECTOR: u32 = 6;
const BOOT_SIGNATURE: [u8; 2] = hex!("55 AA");
const MEDIA_FIXED: u8 = 0xF8;

/// BIOS parameter block shared by all FAT types
#[derive(Copy, Clone, Debug)]
#[repr(C, packed(1))]
pub(crate) struct BiosParameterBlock {
    pub jump_boot: [u8; 3],
    pub oem_name: [u8; 8],
    pub bytes_per_sector: LE<u16>,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: LE<u16>,
    pub number_of_fats: u8,
    pub root_entries: LE<u16>,
    pub total_sectors_16: LE<u16>,
    pub media: u8,
    pub sectors_per_fat_16: LE<u16>,
    pub sectors_per_track: LE<u16>,
    pub number_of_heads: LE<u16>,
    pub hidden_sectors: LE<u32>,
    pub total_sectors_32: LE<u32>,
}

#[derive(Copy, Clone, Debug)]
#[repr(C, packed(1))]
pub(crate) struct ExtendedBootRecord {
    pub drive_number: u8,
    _reserved: u8,
    pub boot_signature: u8,
    pub volume_serial: LE<u32>,
    pub volume_label: [u8; 11],
    pub filesystem_type: [u8; 8],
}

#[derive(Copy, Clone, Debug)]
#[repr(C, packed(1))]
pub(crate) struct Fat32Extension {
    pub sectors_per_fat_32: LE<u32>,
    pub extended_flags: LE<u16>,
    pub filesystem_version: LE<u16>,
    pub root_cluster: LE<u32>,
    pub fsinfo_sector: LE<u16>,
    pub backup_boot_sector: LE<u16>,
    _reserved: [u8; 12],
}

#[derive(Copy, Clone)]
#[repr(C, packed(1))]
pub(crate) struct BootSector16 {
    pub bpb: BiosParameterBlock,
    pub ebr: ExtendedBootRecord,
    pub bootcode: [u8; 448],
    pub signature: [u8; 2],
}

#[derive(Copy, Clone)]
#[repr(C, packed(1))]
pub(crate) struct BootSector32 {
    pub bpb: BiosParameterBlock,
    pub fat32: Fat32Extension,
    pub ebr: ExtendedBootRecord,
    pub bootcode: [u8; 420],
    pub signature: [u8; 2],
}

#[derive(Copy, Clone)]
#[repr(C, packed(1))]
pub(crate) struct FsInfo {
    pub lead_signature: LE<u32>,
    _reserved1: [u8; 480],
    pub struct_signature: LE<u32>,
    pub free_count: LE<u32>,
    pub next_free: LE<u32>,
    _reserved2: [u8; 12],
    pub trail_signature: LE<u32>,
}

unsafe impl Plain for BootSector16 {}
unsafe impl Plain for BootSector32 {}
unsafe impl Plain for FsInfo {}

impl BiosParameterBlock {
    fn new(geometry: &Geometry) -> Self {
        let fat32 = geometry.fat_type == FatType::FAT32;
        let (total_16, total_32) = match geometry.sectors {
            sectors if sectors < 0x10000 && !fat32 => (sectors as u16, 0),
            sectors => (0, sectors),
        };
        let (root_entries, sectors_per_fat_16) = match fat32 {
            true => (0, 0),
            false => (geometry.root_entries as u16, geometry.fat_sectors as u16),
        };
        Self {
            jump_boot: match fat32 {
                true => hex!("EB 58 90"),
                false => hex!("EB 3C 90"),
            },
            oem_name: *b"MSWIN4.1",
            bytes_per_sector: (geometry.sector_size as u16).into(),
            sectors_per_cluster: geometry.sectors_per_cluster as u8,
            reserved_sectors: (geometry.fat1_start as u16).into(),
            number_of_fats: 2,
            root_entries: root_entries.into(),
            total_sectors_16: total_16.into(),
            media: MEDIA_FIXED,
            sectors_per_fat_16: sectors_per_fat_16.into(),
            sectors_per_track: 1u16.into(),
            number_of_heads: 1u16.into(),
            hidden_sectors: geometry.mbr_sectors.into(),
            total_sectors_32: total_32.into(),
        }
    }
}

impl ExtendedBootRecord {
    fn new(volume: &Volume) -> Self {
        Self {
            drive_number: 0x80,
            _reserved: 0,
            boot_signature: 0x29,
            volume_serial: volume.serial.into(),
            volume_label: label_bytes(volume.label),
            filesystem_type: *volume.geometry.fat_type.filesystem_name(),
        }
    }
}

fn encode_boot_sector(volume: &Volume, buf: &mut [u8]) {
    let geometry = volume.geometry;
    let bpb = BiosParameterBlock::new(geometry);
    let ebr = ExtendedBootRecord::new(volume);
    match geometry.fat_type {
        FatType::FAT32 => {
            let root = volume.tree.node(ROOT);
            let fat32 = Fat32Extension {
                sectors_per_fat_32: geometry.fat_sectors.into(),
                extended_flags: 0u16.into(),
                filesystem_version: 0u16.into(),
                root_cluster: u32::from(root.start_cluster()).into(),
                fsinfo_sector: (FSINFO_SECTOR as u16).into(),
                backup_boot_sector: (BACKUP_BOOT_SECTOR as u16).into(),
                _reserved: [0; 12],
            };
            let sector = BootSector32 { bpb, fat32, ebr, bootcode: [0; 420], signature: BOOT_SIGNATURE };
            sector.encode(buf)
        }
        _ => {
            let sector = BootSector16 { bpb, ebr, bootcode: [0; 448], signature: BOOT_SIGNATURE };
            sector.encode(buf)
        }
    }
}

fn encode_fsinfo(volume: &Volume, buf: &mut [u8]) {
    let allocation = volume.allocation;
    let fsinfo = FsInfo {
        lead_signature: 0x41615252u32.into(),
        _reserved1: [0; 480],
        struct_signature: 0x61417272u32.into(),
        free_count: (volume.geometry.clusters - allocation.used_clusters()).into(),
        next_free: u32::from(allocation.next_cluster).into(),
        _reserved2: [0; 12],
        trail_signature: 0xAA550000u32.into(),
    };
    fsinfo.encode(buf)
}

/// Produce a sector of the reserved region, `sector` relative to the partition start
pub(crate) fn read_sector(volume: &Volume, sector: u32, buf: &mut [u8]) {
    buf.fill(0);
    let fat32 = volume.geometry.fat_type == FatType::FAT32;
    match sector {
        0 => encode_boot_sector(volume, buf),
        BACKUP_BOOT_SECTOR if fat32 => encode_boot_sector(volume, buf),
        FSINFO_SECTOR if fat32 => encode_fsinfo(volume, buf),
        s if fat32 && s == BACKUP_BOOT_SECTOR + FSINFO_SECTOR => encode_fsinfo(volume, buf),
        _ => (),
    }
}
