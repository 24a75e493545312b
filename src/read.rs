use crate::error::Error;
use crate::geometry::Geometry;
use crate::region::{self, Volume};
use crate::source;
use crate::tree::ROOT;
use crate::types::SectorID;
use crate::Drive;

const MAX_SECTOR_SIZE: usize = 4096;

/// Where an absolute sector lives, numbers relative to the region start
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Region {
    Mbr(u32),
    Boot(u32),
    Fat(u32),
    Root(u32),
    /// Relative to the partition start, like the range index
    Data(u32),
    Beyond,
}

fn locate(geometry: &Geometry, sector: SectorID) -> Region {
    let sector = u64::from(sector);
    let mbr_sectors = geometry.mbr_sectors as u64;
    if sector < mbr_sectors {
        return Region::Mbr(sector as u32);
    }
    let sector = match sector - mbr_sectors {
        sector if sector >= geometry.sectors as u64 => return Region::Beyond,
        sector => sector as u32,
    };
    match sector {
        s if s < geometry.fat1_start => Region::Boot(s),
        s if s < geometry.fat2_start => Region::Fat(s - geometry.fat1_start),
        s if s < geometry.root_start => Region::Fat(s - geometry.fat2_start),
        s if s < geometry.data_start => Region::Root(s - geometry.root_start),
        s => Region::Data(s),
    }
}

fn read_sector(volume: &Volume, region: Region, buf: &mut [u8]) {
    match region {
        Region::Mbr(0) => region::mbr::read_sector(volume, buf),
        Region::Boot(sector) => region::boot::read_sector(volume, sector, buf),
        Region::Fat(sector) => region::fat::read_sector(volume, sector, buf),
        Region::Root(sector) => region::data::read_sector(volume, ROOT, sector, buf),
        Region::Data(sector) => match volume.allocation.index.find_sector(sector) {
            Some(range) => region::data::read_sector(volume, range.file, sector - range.sector_start, buf),
            None => buf.fill(0),
        },
        Region::Mbr(_) | Region::Beyond => buf.fill(0),
    }
}

/// Fill `buf` with consecutive sectors from `sector` on.
///
/// Sectors belonging to one file are requested from its source at once.
fn read_run(volume: &Volume, sector: u64, buf: &mut [u8]) -> Result<(), Error> {
    let sector_size = volume.geometry.sector_size as usize;
    let mut sector = sector;
    let mut done = 0;
    while done < buf.len() {
        let region = locate(volume.geometry, SectorID::from(sector));
        trace!("Read sector {} in {:?}", sector, region);
        let remaining = ((buf.len() - done) / sector_size) as u64;
        let file = match region {
            Region::Beyond => {
                buf[done..].fill(0);
                return Ok(());
            }
            Region::Data(relative) => volume.allocation.index.find_sector(relative).and_then(|range| {
                let node = volume.tree.node(range.file);
                (!node.is_directory()).then_some((relative, range, node))
            }),
            _ => None,
        };
        let count = match file {
            Some((relative, range, node)) => {
                let count = core::cmp::min((range.sector_end - relative) as u64, remaining);
                let size = count as usize * sector_size;
                let offset = (relative - range.sector_start) as u64 * sector_size as u64;
                source::read(node, offset, &mut buf[done..done + size])?;
                count
            }
            None => {
                read_sector(volume, region, &mut buf[done..done + sector_size]);
                1
            }
        };
        done += count as usize * sector_size;
        sector += count;
    }
    Ok(())
}

impl Drive {
    /// Read whole sectors starting at absolute sector `sector`
    pub fn read_sectors(&self, sector: u64, buf: &mut [u8]) -> Result<(), Error> {
        let volume = self.volume()?;
        if buf.len() % volume.geometry.sector_size as usize != 0 {
            return Err(Error::InvalidArgument("buffer is not a whole number of sectors"));
        }
        read_run(&volume, sector, buf)
    }

    /// Read exactly `buf.len()` bytes at byte `offset`, zeros past the end of the drive
    pub fn read_bytes(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        let volume = self.volume()?;
        let end = volume.geometry.bytes();
        let sector_size = volume.geometry.sector_size as usize;
        let mut scratch = [0u8; MAX_SECTOR_SIZE];
        let scratch = &mut scratch[..sector_size];
        let mut position = offset;
        let mut done = 0;
        while done < buf.len() {
            if position >= end {
                buf[done..].fill(0);
                break;
            }
            let sector = position / sector_size as u64;
            let within = (position % sector_size as u64) as usize;
            let remaining = buf.len() - done;
            let size = match within == 0 && remaining >= sector_size {
                true => {
                    let size = remaining / sector_size * sector_size;
                    read_run(&volume, sector, &mut buf[done..done + size])?;
                    size
                }
                false => {
                    read_run(&volume, sector, scratch)?;
                    let size = core::cmp::min(sector_size - within, remaining);
                    buf[done..done + size].copy_from_slice(&scratch[within..within + size]);
                    size
                }
            };
            done += size;
            position += size as u64;
        }
        Ok(())
    }

    /// Writes are acknowledged and dropped, returns the number of bytes accepted
    pub fn write_bytes(&self, offset: u64, data: &[u8]) -> Result<usize, Error> {
        trace!("Ignored write of {} bytes at {}", data.len(), offset);
        Ok(data.len())
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::{locate, Region};
    use crate::error::Error;
    use crate::geometry::{FatSelect, FatType, Mbr, Options, Parameters};
    use crate::region::data::long_name;
    use crate::tree::{FileID, Match};
    use crate::types::{ClusterID, SectorID};
    use crate::{parse_directory, Drive, Listing, Node, Operation};

    fn pattern(name: &str, offset: usize) -> u8 {
        (offset as u8).wrapping_mul(7).wrapping_add(name.len() as u8)
    }

    fn generate(_: Operation, node: &Node, offset: u32, buf: &mut [u8]) -> io::Result<usize> {
        let base = offset as usize;
        buf.iter_mut().enumerate().for_each(|(i, b)| *b = pattern(node.name(), base + i));
        Ok(buf.len())
    }

    fn sector(drive: &Drive, sector: u64) -> Vec<u8> {
        let mut buf = vec![0u8; drive.sector_size() as usize];
        drive.read_sectors(sector, &mut buf).unwrap();
        buf
    }

    fn fat16_20mib(options: Options) -> Drive {
        let options = Options { fat: FatSelect::Fixed(FatType::FAT16), ..options };
        Drive::new(20 << 20, options).unwrap()
    }

    #[test]
    fn test_locate() {
        let options = Options { mbr: Some(Mbr::Padded), ..Default::default() };
        let drive = fat16_20mib(options);
        let geometry = drive.geometry();
        let at = |sector: u64| locate(geometry, SectorID::from(sector));
        assert_eq!(at(0), Region::Mbr(0));
        assert_eq!(at(3), Region::Mbr(3));
        assert_eq!(at(4), Region::Boot(0));
        assert_eq!(at(5), Region::Fat(0));
        assert_eq!(at(45), Region::Fat(0));
        assert_eq!(at(84), Region::Fat(39));
        assert_eq!(at(85), Region::Root(0));
        assert_eq!(at(117), Region::Data(113));
        assert_eq!(at(40963), Region::Data(40959));
        assert_eq!(at(40964), Region::Beyond);
    }

    #[test]
    fn test_big_file() {
        let mut drive = fat16_20mib(Options::default());
        let geometry = *drive.geometry();
        assert_eq!(geometry.clusters, 10211);
        let size = (geometry.clusters - 11) * geometry.cluster_size();
        let root = drive.root();
        let id = drive.add_virtual_file(root, "BIG.FIL", size, generate).unwrap();
        drive.recalc().unwrap();

        let node = drive.file(id).unwrap();
        let (start, end) = (u32::from(node.start_cluster()), u32::from(node.end_cluster()));
        assert_eq!((start, end), (2, 10202));
        let fat_entry = |cluster: u32| {
            let mut entry = [0u8; 2];
            let offset = geometry.fat1_start as u64 * 512 + cluster as u64 * 2;
            drive.read_bytes(offset, &mut entry).unwrap();
            u16::from_le_bytes(entry)
        };
        assert_eq!(fat_entry(start), 3);
        assert_eq!(fat_entry(end - 1), 0xFFFF);
        assert_eq!(fat_entry(end), 0);

        let root_sector = sector(&drive, geometry.root_start as u64);
        assert_eq!(&root_sector[..11], b"BIG     FIL");
        assert_eq!(root_sector[26..28], hex!("02 00"));
        assert_eq!(root_sector[28..32], size.to_le_bytes());
        assert_eq!(root_sector[32], 0);

        let last = geometry.data_start as u64 + (end as u64 - 2) * 4 - 1;
        let data = sector(&drive, last);
        let offset = size as usize - 512;
        assert!(data.iter().enumerate().all(|(i, &b)| b == pattern("BIG.FIL", offset + i)));
        assert!(sector(&drive, last + 1).iter().all(|&b| b == 0));
    }

    #[test]
    fn test_long_name_entries() {
        let mut drive = fat16_20mib(Options { long_names: true, ..Default::default() });
        let root = drive.root();
        let id = drive.add_dir(root, "subdirectory_withlongname").unwrap();
        drive.lock().unwrap();
        assert_eq!(drive.file(id).unwrap().entry_position(), (2, 2));

        let root_sector = sector(&drive, drive.geometry().root_start as u64);
        let checksum = long_name::checksum(drive.file(id).unwrap().short_name());
        assert_eq!(root_sector[0], 0x42);
        assert_eq!(root_sector[32], 0x01);
        assert_eq!((root_sector[11], root_sector[32 + 11]), (0x0F, 0x0F));
        assert_eq!((root_sector[13], root_sector[32 + 13]), (checksum, checksum));
        assert_eq!(&root_sector[64..75], b"SUBDIR~1   ");
        assert_eq!(root_sector[64 + 11], 0x30);

        let listings = parse_directory(&root_sector);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].name, "subdirectory_withlongname");

        // Without VFAT support only the 8.3 entry is emitted
        let mut drive = fat16_20mib(Options::default());
        drive.add_dir(root, "subdirectory_withlongname").unwrap();
        drive.lock().unwrap();
        let root_sector = sector(&drive, drive.geometry().root_start as u64);
        assert_eq!(&root_sector[..11], b"SUBDIR~1   ");
        assert_eq!(root_sector[32], 0);
    }

    #[test]
    fn test_straddling_read() {
        let options = Options { mbr: Some(Mbr::Padded), ..Default::default() };
        let mut drive = fat16_20mib(options);
        let root = drive.root();
        drive.add_virtual_file(root, "A.BIN", 5000, generate).unwrap();
        drive.lock().unwrap();
        let geometry = *drive.geometry();
        assert_eq!(geometry.mbr_sectors, 4);

        let expected: Vec<u8> = (0..6).flat_map(|index| sector(&drive, index)).collect();
        let mut buf = vec![0u8; 5 * 512 + 100 - 300];
        drive.read_bytes(300, &mut buf).unwrap();
        assert_eq!(buf, expected[300..5 * 512 + 100]);
        assert_eq!(buf[510 - 300..512 - 300], hex!("55 AA"));
        assert_eq!(buf[4 * 512 - 300..4 * 512 + 3 - 300], hex!("EB 3C 90"));
        assert_eq!(buf[5 * 512 - 300..5 * 512 + 4 - 300], hex!("F8 FF FF FF"));

        // Last FAT2 sector into the root directory
        let root_start = (geometry.mbr_sectors + geometry.root_start) as u64;
        let mut buf = [0u8; 48];
        drive.read_bytes(root_start * 512 - 16, &mut buf).unwrap();
        assert_eq!(buf[..16], sector(&drive, root_start - 1)[496..]);
        assert_eq!(buf[16..], sector(&drive, root_start)[..32]);
        assert_eq!(&buf[16..27], b"A       BIN");

        // Unaligned head, whole sectors, unaligned tail
        let data = (geometry.mbr_sectors + geometry.data_start) as u64 * 512;
        let mut buf = vec![0u8; 4000];
        drive.read_bytes(data + 10, &mut buf).unwrap();
        assert!(buf.iter().enumerate().all(|(i, &b)| b == pattern("A.BIN", 10 + i)));
    }

    #[test]
    fn test_boundaries() {
        let mut drive = fat16_20mib(Options::default());
        let root = drive.root();
        drive.add_virtual_file(root, "A.BIN", 100, generate).unwrap();
        drive.lock().unwrap();
        let bytes = drive.bytes();
        assert_eq!(bytes, 20 << 20);

        drive.read_bytes(0, &mut []).unwrap();
        drive.read_bytes(bytes + 7, &mut []).unwrap();
        let mut buf = vec![0xAAu8; 1000];
        drive.read_bytes(bytes, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
        let mut buf = vec![0xAAu8; 1000];
        drive.read_bytes(u64::MAX / 2, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
        let mut buf = [0xAAu8; 16];
        drive.read_bytes(u64::MAX - 5, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
        let mut buf = vec![0xAAu8; 1024];
        drive.read_bytes(bytes - 24, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
        let mut buf = vec![0xAAu8; 1024];
        drive.read_sectors(drive.total_sectors() - 1, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
        let mut buf = vec![0xAAu8; 1024];
        drive.read_sectors(u64::MAX, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));

        let mut odd = [0u8; 100];
        assert!(matches!(drive.read_sectors(0, &mut odd), Err(Error::InvalidArgument(_))));
        assert_eq!(drive.write_bytes(0, &[1, 2, 3]).unwrap(), 3);
        assert_eq!(sector(&drive, 0)[..3], hex!("EB 3C 90"));
    }

    #[test]
    fn test_boot_sector_fat16() {
        let mut drive = fat16_20mib(Options::default());
        drive.lock().unwrap();
        let boot = sector(&drive, 0);
        assert_eq!(boot[..3], hex!("EB 3C 90"));
        assert_eq!(&boot[3..11], b"MSWIN4.1");
        assert_eq!(boot[11..13], hex!("00 02"));
        assert_eq!(boot[13], 4);
        assert_eq!(boot[14..16], hex!("01 00"));
        assert_eq!(boot[16], 2);
        assert_eq!(boot[17..19], hex!("00 02"));
        assert_eq!(boot[19..21], hex!("00 A0"));
        assert_eq!(boot[21], 0xF8);
        assert_eq!(boot[22..24], hex!("28 00"));
        assert_eq!(boot[28..36], [0u8; 8]);
        assert_eq!(boot[36], 0x80);
        assert_eq!(boot[38], 0x29);
        assert_eq!(boot[39..43], hex!("78 56 34 12"));
        assert_eq!(&boot[43..54], b"NO NAME    ");
        assert_eq!(&boot[54..62], b"FAT16   ");
        assert_eq!(boot[510..], hex!("55 AA"));
        assert!(sector(&drive, 1)[..4] != hex!("52 52 61 41"));
    }

    #[test]
    fn test_boot_sector_fat32() {
        let mut drive = Drive::new(300 << 20, Options::default()).unwrap();
        drive.set_label(Some("virtual disk")).unwrap();
        drive.set_serial(0xCAFEBABE).unwrap();
        let root = drive.root();
        drive.add_virtual_file(root, "A.BIN", 3 * 4096, generate).unwrap();
        drive.lock().unwrap();
        let geometry = *drive.geometry();
        assert_eq!(geometry.fat_type, FatType::FAT32);

        let boot = sector(&drive, 0);
        assert_eq!(boot[..3], hex!("EB 58 90"));
        assert_eq!(boot[13], 8);
        assert_eq!(boot[14..16], 32u16.to_le_bytes());
        assert_eq!(boot[17..19], [0, 0]);
        assert_eq!(boot[19..21], [0, 0]);
        assert_eq!(boot[22..24], [0, 0]);
        assert_eq!(boot[32..36], geometry.sectors.to_le_bytes());
        assert_eq!(boot[36..40], geometry.fat_sectors.to_le_bytes());
        assert_eq!(boot[44..48], 2u32.to_le_bytes());
        assert_eq!(boot[48..50], hex!("01 00"));
        assert_eq!(boot[50..52], hex!("06 00"));
        assert_eq!(boot[66], 0x29);
        assert_eq!(boot[67..71], hex!("BE BA FE CA"));
        assert_eq!(&boot[71..82], b"VIRTUALDISK");
        assert_eq!(&boot[82..90], b"FAT32   ");
        assert_eq!(boot[510..], hex!("55 AA"));
        assert_eq!(sector(&drive, 6), boot);

        let fsinfo = sector(&drive, 1);
        assert_eq!(fsinfo[..4], hex!("52 52 61 41"));
        assert_eq!(fsinfo[484..488], hex!("72 72 41 61"));
        assert_eq!(fsinfo[488..492], (geometry.clusters - 4).to_le_bytes());
        assert_eq!(fsinfo[492..496], 6u32.to_le_bytes());
        assert_eq!(fsinfo[508..], hex!("00 00 55 AA"));
        assert_eq!(sector(&drive, 7), fsinfo);
        assert!(sector(&drive, 2).iter().all(|&b| b == 0));

        // Root directory in cluster 2, starting with the label
        let root_sector = sector(&drive, geometry.data_start as u64);
        assert_eq!(&root_sector[..11], b"VIRTUALDISK");
        assert_eq!(root_sector[11], 0x08);
        assert_eq!(&root_sector[32..43], b"A       BIN");
        assert_eq!(root_sector[32 + 26..32 + 28], hex!("03 00"));
    }

    #[test]
    fn test_mbr() {
        let options = Options { mbr: Some(Mbr::Single), ..Default::default() };
        let mut drive = fat16_20mib(options);
        drive.lock().unwrap();
        let geometry = *drive.geometry();
        let mut raw = [0u8; 512];
        drive.read_sectors(0, &mut raw).unwrap();
        use mbr_nostd::PartitionTable;

        let mbr = mbr_nostd::MasterBootRecord::from_bytes(&raw).unwrap();
        let entries = mbr.partition_table_entries();
        assert_eq!(entries[0].logical_block_address, 1);
        assert_eq!(entries[0].sector_count, geometry.sectors);
        assert_eq!(raw[446], 0x80);
        assert_eq!(raw[450], 0x0E);
        assert_eq!(raw[440..444], hex!("78 56 34 12"));
        assert_eq!(sector(&drive, 1)[..3], hex!("EB 3C 90"));
        assert_eq!(sector(&drive, 1)[28..32], hex!("01 00 00 00"));
        assert_eq!(drive.total_sectors(), geometry.sectors as u64 + 1);
    }

    /// Follow FAT chains and directory tables the way a FAT driver would
    struct Walker<'a> {
        drive: &'a Drive,
    }

    impl<'a> Walker<'a> {
        fn fat_entry(&self, cluster: u32) -> u32 {
            let geometry = self.drive.geometry();
            let base = (geometry.mbr_sectors + geometry.fat1_start) as u64 * geometry.sector_size as u64;
            let mut bytes = [0u8; 4];
            match geometry.fat_type {
                FatType::FAT12 => {
                    self.drive.read_bytes(base + cluster as u64 * 3 / 2, &mut bytes[..2]).unwrap();
                    let value = u16::from_le_bytes([bytes[0], bytes[1]]) as u32;
                    if cluster & 1 == 1 { value >> 4 } else { value & 0xFFF }
                }
                FatType::FAT16 => {
                    self.drive.read_bytes(base + cluster as u64 * 2, &mut bytes[..2]).unwrap();
                    u16::from_le_bytes([bytes[0], bytes[1]]) as u32
                }
                FatType::FAT32 => {
                    self.drive.read_bytes(base + cluster as u64 * 4, &mut bytes).unwrap();
                    u32::from_le_bytes(bytes) & 0x0FFFFFFF
                }
            }
        }

        fn chain(&self, first: ClusterID) -> Vec<u8> {
            let geometry = self.drive.geometry();
            let end_of_chain = match geometry.fat_type {
                FatType::FAT12 => 0xFF8,
                FatType::FAT16 => 0xFFF8,
                FatType::FAT32 => 0x0FFFFFF8,
            };
            let mut data = Vec::new();
            let mut cluster = u32::from(first);
            loop {
                let mut buf = vec![0u8; geometry.cluster_size() as usize];
                let sector = geometry.mbr_sectors + geometry.cluster_sector(ClusterID::from(cluster));
                self.drive.read_sectors(sector as u64, &mut buf).unwrap();
                data.extend_from_slice(&buf);
                match self.fat_entry(cluster) {
                    next if next >= end_of_chain => return data,
                    next => {
                        assert!(next >= 2 && next < geometry.clusters + 2);
                        cluster = next;
                    }
                }
            }
        }

        fn directory(&self, cluster: ClusterID) -> Vec<Listing> {
            let geometry = self.drive.geometry();
            let table = match cluster.valid() {
                true => self.chain(cluster),
                false => {
                    let mut table = vec![0u8; (geometry.root_sectors * geometry.sector_size) as usize];
                    let start = geometry.mbr_sectors + geometry.root_start;
                    self.drive.read_sectors(start as u64, &mut table).unwrap();
                    table
                }
            };
            parse_directory(&table)
        }

        /// Compare directory `id` found at `cluster` against the tree, returns the files visited
        fn verify(&self, id: FileID, cluster: ClusterID) -> usize {
            let mut visited = 0;
            let listings = self.directory(cluster);
            let mut listings = listings.iter().filter(|listing| !listing.attributes.volume_label());
            let children = self.drive.children(id).unwrap();
            if !self.drive.file(id).unwrap().is_root() {
                assert_eq!(listings.next().unwrap().name, ".");
                assert_eq!(listings.next().unwrap().name, "..");
            }
            for (&child, listing) in children.iter().zip(listings.by_ref()) {
                let node = self.drive.file(child).unwrap();
                let how = if self.drive.options().long_names { Match::Long } else { Match::Short };
                assert_eq!(self.drive.find(id, &listing.name, how).unwrap(), child);
                assert_eq!(listing.short_name, *node.short_name());
                assert_eq!(listing.cluster, node.start_cluster());
                assert_eq!(listing.attributes, node.attributes());
                visited += 1;
                if node.is_directory() {
                    assert_eq!(listing.size, 0);
                    visited += self.verify(child, listing.cluster);
                    continue;
                }
                assert_eq!(listing.size, node.size());
                if node.size() == 0 {
                    assert_eq!(listing.cluster, ClusterID::FREE);
                    continue;
                }
                let content = self.chain(listing.cluster);
                let name = node.name();
                let content = &content[..node.size() as usize];
                assert!(content.iter().enumerate().all(|(i, &b)| b == pattern(name, i)), "{}", name);
            }
            assert!(listings.next().is_none());
            visited
        }
    }

    fn populate(drive: &mut Drive) -> usize {
        let root = drive.root();
        let docs = drive.add_dir(root, "Documents").unwrap();
        drive.add_virtual_file(docs, "report for the year.pdf", 10000, generate).unwrap();
        drive.add_virtual_file(docs, "EMPTY.TXT", 0, generate).unwrap();
        let nested = drive.add_dir(docs, "nested directory").unwrap();
        for index in 0..40 {
            let name = format!("image number {}.jpeg", index);
            drive.add_virtual_file(nested, &name, 700 + index * 61, generate).unwrap();
        }
        drive.add_virtual_file(root, "KERNEL.IMG", 70000, generate).unwrap();
        drive.add_dir(root, "EMPTYDIR").unwrap();
        drive.set_label(Some("ROUNDTRIP")).unwrap();
        46
    }

    fn round_trip(mut drive: Drive) {
        let files = populate(&mut drive);
        drive.lock().unwrap();
        let walker = Walker { drive: &drive };
        let root = drive.file(drive.root()).unwrap().start_cluster();
        assert_eq!(walker.verify(drive.root(), root), files);
    }

    #[test]
    fn test_round_trip_fat12() {
        let options = Options { long_names: true, ..Default::default() };
        let drive = Drive::new(2 << 20, options).unwrap();
        assert_eq!(drive.fat_type(), FatType::FAT12);
        round_trip(drive);
    }

    #[test]
    fn test_round_trip_fat16_short_names() {
        round_trip(fat16_20mib(Options { mbr: Some(Mbr::Single), ..Default::default() }));
    }

    #[test]
    fn test_round_trip_fat32() {
        let options = Options { long_names: true, fat: FatSelect::Fixed(FatType::FAT32), ..Default::default() };
        let params = Parameters { sectors_per_cluster: Some(1), ..Default::default() };
        let drive = Drive::with_parameters(40 << 20, options, params).unwrap();
        round_trip(drive);
    }

    #[test]
    fn test_recalc_idempotent() {
        let mut drive = fat16_20mib(Options { long_names: true, ..Default::default() });
        populate(&mut drive);
        drive.recalc().unwrap();
        let first = drive.allocation.clone().unwrap();
        let image: Vec<u8> = (0..200).flat_map(|index| sector(&drive, index)).collect();
        drive.recalc().unwrap();
        assert_eq!(drive.allocation.clone().unwrap(), first);
        let again: Vec<u8> = (0..200).flat_map(|index| sector(&drive, index)).collect();
        assert_eq!(image, again);
    }

    #[test]
    fn test_short_name_uniqueness() {
        let mut drive = fat16_20mib(Options { long_names: true, ..Default::default() });
        let root = drive.root();
        let dir = drive.add_dir(root, "dir").unwrap();
        for index in 0..30 {
            drive.add_virtual_file(dir, &format!("longfilename {}.text", index), 1, generate).unwrap();
        }
        drive.lock().unwrap();
        let walker = Walker { drive: &drive };
        let listings = walker.directory(drive.file(dir).unwrap().start_cluster());
        let mut names: Vec<String> = listings[2..].iter().map(|listing| listing.short_name.to_string()).collect();
        assert_eq!(names.len(), 30);
        assert_eq!(names[0], "LONGFI~1.TEX");
        assert_eq!(names[9], "LONGF~10.TEX");
        for name in names.iter() {
            let (base, extension) = name.split_once('.').unwrap();
            let (stem, tail) = base.split_once('~').unwrap();
            assert!(tail.parse::<u32>().unwrap() >= 1);
            assert!(base.len() <= 8 && "LONGFILE".starts_with(stem));
            assert_eq!(extension, "TEX");
        }
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 30);
    }

    #[test]
    fn test_backing_file() {
        let path = std::env::temp_dir().join(format!("virtfat-read-{}.bin", std::process::id()));
        let content: Vec<u8> = (0..5000).map(|i| pattern("backing", i)).collect();
        std::fs::File::create(&path).unwrap().write_all(&content).unwrap();

        let mut drive = fat16_20mib(Options::default());
        let root = drive.root();
        let id = drive.add_backing_file(root, Some("BACKING.BIN"), &path).unwrap();
        drive.lock().unwrap();
        let node = drive.file(id).unwrap();
        let start = (drive.geometry().mbr_sectors + node.sectors().start) as u64;
        let mut buf = vec![0xAAu8; 3 * 2048];
        drive.read_sectors(start, &mut buf).unwrap();
        assert_eq!(buf[..5000], content[..]);
        assert!(buf[5000..].iter().all(|&b| b == 0));

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(drive.read_sectors(start, &mut buf), Err(Error::IO(_))));
        // Other sectors are unaffected
        drive.read_sectors(0, &mut buf).unwrap();
    }

    #[test]
    fn test_file_read_in_one_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let counted = move |op: Operation, node: &Node, offset: u32, buf: &mut [u8]| {
            counter.fetch_add(1, Ordering::Relaxed);
            generate(op, node, offset, buf)
        };
        let mut drive = fat16_20mib(Options::default());
        let root = drive.root();
        let id = drive.add_virtual_file(root, "RUN.BIN", 5 * 2048 + 100, counted).unwrap();
        drive.add_virtual_file(root, "NEXT.BIN", 3000, generate).unwrap();
        drive.lock().unwrap();

        let node = drive.file(id).unwrap();
        let start = (drive.geometry().mbr_sectors + node.sectors().start) as u64;
        assert_eq!(node.sectors().len(), 24);
        // The whole file and the first sectors of the next one
        let mut buf = vec![0u8; 28 * 512];
        drive.read_sectors(start, &mut buf).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        let size = 5 * 2048 + 100;
        assert!(buf[..size].iter().enumerate().all(|(i, &b)| b == pattern("RUN.BIN", i)));
        assert!(buf[size..24 * 512].iter().all(|&b| b == 0));
        assert!(buf[24 * 512..].iter().enumerate().all(|(i, &b)| b == pattern("NEXT.BIN", i)));

        // Unaligned reads split into head, body and tail
        let mut buf = vec![0u8; 3000];
        drive.read_bytes(start * 512 + 700, &mut buf).unwrap();
        assert!(buf.iter().enumerate().all(|(i, &b)| b == pattern("RUN.BIN", 700 + i)));
        assert_eq!(calls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_failing_callback() {
        let mut drive = fat16_20mib(Options::default());
        let root = drive.root();
        let short = |_: Operation, _: &Node, _: u32, buf: &mut [u8]| -> io::Result<usize> {
            buf[..10].fill(0xFF);
            Ok(10)
        };
        let broken = |_: Operation, _: &Node, _: u32, _: &mut [u8]| -> io::Result<usize> {
            Err(io::Error::other("broken"))
        };
        let id = drive.add_virtual_file(root, "SHORT", 100, short).unwrap();
        let failing = drive.add_virtual_file(root, "BROKEN", 100, broken).unwrap();
        drive.lock().unwrap();
        let first = |id| drive.geometry().mbr_sectors as u64 + drive.file(id).unwrap().sectors().start as u64;
        let data = sector(&drive, first(id));
        assert!(data[..10].iter().all(|&b| b == 0xFF));
        assert!(data[10..].iter().all(|&b| b == 0));
        let mut buf = [0u8; 512];
        assert!(matches!(drive.read_sectors(first(failing), &mut buf), Err(Error::IO(_))));
    }

    #[test]
    fn test_concurrent_reads() {
        let mut drive = fat16_20mib(Options { long_names: true, ..Default::default() });
        populate(&mut drive);
        drive.lock().unwrap();
        let sectors = 600;
        let mut expected = vec![0u8; sectors * 512];
        drive.read_sectors(0, &mut expected).unwrap();

        let drive = &drive;
        let chunks: Vec<Vec<u8>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|thread| {
                    scope.spawn(move || {
                        let mut buf = vec![0u8; sectors / 4 * 512];
                        drive.read_bytes((thread * buf.len()) as u64, &mut buf).unwrap();
                        buf
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });
        assert_eq!(chunks.concat(), expected);
    }
}
