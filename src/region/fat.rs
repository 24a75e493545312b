use super::Volume;
use crate::geometry::FatType;
use crate::range::RangeIndex;
use crate::types::ClusterID;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Entry {
    Free,
    Next(ClusterID),
    Last,
    /// Entry 0, media descriptor in the low byte
    Media,
}

impl Entry {
    pub fn raw(self, fat_type: FatType) -> u32 {
        match self {
            Self::Free => 0,
            Self::Next(cluster) => cluster.into(),
            Self::Last => fat_type.end_of_chain(),
            Self::Media => fat_type.media_entry(),
        }
    }
}

/// Resolves FAT entries in ascending order against the range index
struct Entries<'a> {
    index: &'a RangeIndex,
    position: usize,
}

impl<'a> Entries<'a> {
    fn new(index: &'a RangeIndex, first: ClusterID) -> Self {
        Self { index, position: index.position_by_cluster(first) }
    }

    fn entry(&mut self, cluster: u32) -> Entry {
        match cluster {
            0 => return Entry::Media,
            1 => return Entry::Last,
            _ => (),
        }
        let cluster = ClusterID::from(cluster);
        while let Some(range) = self.index.get(self.position) {
            if range.cluster_end > cluster {
                break;
            }
            self.position += 1;
        }
        match self.index.get(self.position) {
            Some(range) if range.cluster_start <= cluster && cluster < range.chain_end => {
                match cluster + 1u32 {
                    next if next < range.chain_end => Entry::Next(next),
                    _ => Entry::Last,
                }
            }
            _ => Entry::Free,
        }
    }
}

fn write_entry(fat_type: FatType, buf: &mut [u8], base: u64, entry: u64, value: u32) {
    match fat_type {
        FatType::FAT12 => {
            let end = base + buf.len() as u64;
            let mut put = |position: u64, byte: u8, mask: u8| {
                if (base..end).contains(&position) {
                    let target = &mut buf[(position - base) as usize];
                    *target = (*target & !mask) | (byte & mask);
                }
            };
            // Two entries share 3 bytes, odd entries start at the high nibble
            let position = entry * 3 / 2;
            if entry & 1 == 0 {
                put(position, value as u8, 0xFF);
                put(position + 1, (value >> 8) as u8, 0x0F);
            } else {
                put(position, (value << 4) as u8, 0xF0);
                put(position + 1, (value >> 4) as u8, 0xFF);
            }
        }
        FatType::FAT16 => {
            let offset = (entry * 2 - base) as usize;
            buf[offset..offset + 2].copy_from_slice(&(value as u16).to_le_bytes());
        }
        FatType::FAT32 => {
            let offset = (entry * 4 - base) as usize;
            buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }
    }
}

/// Produce one sector of a FAT copy, `sector` relative to the start of that copy
pub(crate) fn read_sector(volume: &Volume, sector: u32, buf: &mut [u8]) {
    buf.fill(0);
    let fat_type = volume.geometry.fat_type;
    let start = sector as u64 * buf.len() as u64;
    let end = start + buf.len() as u64;
    let (first, last) = match fat_type {
        FatType::FAT12 => ((start * 2 / 3).saturating_sub(1), end * 2 / 3 + 1),
        FatType::FAT16 => (start / 2, end / 2),
        FatType::FAT32 => (start / 4, end / 4),
    };
    // Everything from the first unallocated cluster on is free
    let last = core::cmp::min(last, u32::from(volume.allocation.next_cluster) as u64);
    let mut entries = Entries::new(&volume.allocation.index, ClusterID::from(first as u32));
    for entry in first..last {
        let value = entries.entry(entry as u32).raw(fat_type);
        write_entry(fat_type, buf, start, entry, value);
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use super::{write_entry, Entry};
    use crate::geometry::{FatType, Options, Parameters};
    use crate::types::ClusterID;
    use crate::Drive;

    fn zeros(_: crate::Operation, _: &crate::Node, _: u32, buf: &mut [u8]) -> io::Result<usize> {
        buf.fill(0);
        Ok(buf.len())
    }

    /// Pack a whole FAT in one go
    fn reference(fat_type: FatType, entries: &[u32], bytes: usize) -> Vec<u8> {
        let mut fat = vec![0u8; bytes];
        for (index, &value) in entries.iter().enumerate() {
            write_entry(fat_type, &mut fat, 0, index as u64, value);
        }
        fat
    }

    #[test]
    fn test_entry_raw() {
        assert_eq!(Entry::Media.raw(FatType::FAT12), 0xFF8);
        assert_eq!(Entry::Last.raw(FatType::FAT16), 0xFFFF);
        assert_eq!(Entry::Last.raw(FatType::FAT32), 0x0FFFFFFF);
        assert_eq!(Entry::Next(ClusterID::from(7)).raw(FatType::FAT32), 7);
        assert_eq!(Entry::Free.raw(FatType::FAT12), 0);
    }

    #[test]
    fn test_fat12_packing() {
        let mut fat = [0u8; 6];
        write_entry(FatType::FAT12, &mut fat, 0, 0, 0xFF8);
        write_entry(FatType::FAT12, &mut fat, 0, 1, 0xFFF);
        write_entry(FatType::FAT12, &mut fat, 0, 2, 0x003);
        write_entry(FatType::FAT12, &mut fat, 0, 3, 0xFFF);
        assert_eq!(fat, hex!("F8 FF FF 03 F0 FF"));
    }

    #[test]
    fn test_fat12_straddle() {
        let params = Parameters { sectors_per_cluster: Some(1), ..Default::default() };
        let mut drive = Drive::with_parameters(1 << 20, Options::default(), params).unwrap();
        assert_eq!(drive.fat_type(), FatType::FAT12);
        let root = drive.root();
        drive.add_virtual_file(root, "A.BIN", 400 * 512, zeros).unwrap();
        drive.add_virtual_file(root, "EMPTY.BIN", 0, zeros).unwrap();
        drive.add_virtual_file(root, "B.BIN", 1, zeros).unwrap();
        drive.add_virtual_file(root, "C.BIN", 3 * 512 + 1, zeros).unwrap();
        drive.lock().unwrap();

        // A: clusters 2..=401, B: 402, C: 403..=406
        let mut entries = vec![0xFF8, 0xFFF];
        entries.extend((2..401).map(|cluster| cluster + 1));
        entries.extend([0xFFF, 0xFFF, 404, 405, 406, 0xFFF]);
        let geometry = *drive.geometry();
        let bytes = (geometry.fat_sectors * geometry.sector_size) as usize;
        let expected = reference(FatType::FAT12, &entries, bytes);
        assert_eq!(expected[510..513], hex!("55 61 15"));

        let mut fat = vec![0u8; bytes];
        drive.read_sectors(geometry.fat1_start as u64, &mut fat).unwrap();
        assert_eq!(fat, expected);
        // Mirror, read sector by sector
        for (index, chunk) in fat.chunks_mut(512).enumerate() {
            let sector = (geometry.fat2_start as usize + index) as u64;
            drive.read_sectors(sector, chunk).unwrap();
        }
        assert_eq!(fat, expected);
    }

    #[test]
    fn test_fat_size_ends_chain() {
        fn pattern(_: crate::Operation, _: &crate::Node, _: u32, buf: &mut [u8]) -> io::Result<usize> {
            buf.fill(0xAB);
            Ok(buf.len())
        }

        let params = Parameters { sectors_per_cluster: Some(1), ..Default::default() };
        let mut drive = Drive::with_parameters(1 << 20, Options::default(), params).unwrap();
        let root = drive.root();
        let a = drive.add_virtual_file(root, "A.BIN", 4 * 512, pattern).unwrap();
        drive.add_virtual_file(root, "B.BIN", 1, zeros).unwrap();
        let c = drive.add_virtual_file(root, "C.BIN", 2 * 512, zeros).unwrap();
        drive.set_fat_size(a, Some(512 + 1)).unwrap();
        drive.set_fat_size(c, Some(0)).unwrap();
        drive.lock().unwrap();

        // A: clusters 2..=5 chained up to 3, B: 6, C: 7..=8 chained up to 7
        let entries = [0xFF8, 0xFFF, 3, 0xFFF, 0, 0, 0xFFF, 0xFFF, 0];
        let expected = reference(FatType::FAT12, &entries, 512);
        let geometry = *drive.geometry();
        let mut sector = [0u8; 512];
        drive.read_sectors(geometry.fat1_start as u64, &mut sector).unwrap();
        assert_eq!(sector, expected[..]);

        // Content past the chain is still served
        let sectors = drive.file(a).unwrap().sectors();
        assert_eq!(sectors.len(), 4);
        drive.read_sectors(sectors.end as u64 - 1, &mut sector).unwrap();
        assert!(sector.iter().all(|&byte| byte == 0xAB));
    }

    #[test]
    fn test_fat32_sector() {
        let mut drive = Drive::new(300 << 20, Options::default()).unwrap();
        assert_eq!(drive.fat_type(), FatType::FAT32);
        let root = drive.root();
        let dir = drive.add_dir(root, "DIR").unwrap();
        drive.add_virtual_file(dir, "FILE", 129 * 4096, zeros).unwrap();
        drive.lock().unwrap();

        let geometry = *drive.geometry();
        let entry = |sector: &[u8], index: usize| {
            u32::from_le_bytes(sector[index * 4..index * 4 + 4].try_into().unwrap())
        };
        let mut sector = [0u8; 512];
        drive.read_sectors(geometry.fat1_start as u64, &mut sector).unwrap();
        assert_eq!(entry(&sector, 0), 0x0FFFFFF8);
        assert_eq!(entry(&sector, 1), 0x0FFFFFFF);
        assert_eq!(entry(&sector, 2), 0x0FFFFFFF, "root directory");
        assert_eq!(entry(&sector, 3), 0x0FFFFFFF, "DIR");
        assert_eq!(entry(&sector, 4), 5);
        assert_eq!(entry(&sector, 127), 128);
        drive.read_sectors(geometry.fat1_start as u64 + 1, &mut sector).unwrap();
        assert_eq!(entry(&sector, 0), 129);
        assert_eq!(entry(&sector, 4), 0x0FFFFFFF);
        assert_eq!(entry(&sector, 5), 0);
    }
}
