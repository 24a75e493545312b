use derive_more::Display;

use crate::error::Error;
use crate::types::ClusterID;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;
const TIB: u64 = 1024 * GIB;

pub const DEFAULT_SECTOR_SIZE: u32 = 512;
pub const DEFAULT_ROOT_ENTRIES: u32 = 512;
pub const MAX_SECTORS_PER_CLUSTER: u32 = 128;

const MIN_FAT16_CLUSTERS: u32 = 4085;
const MIN_FAT32_CLUSTERS: u32 = 65525;
const MAX_FAT32_CLUSTERS: u32 = 0x0FFF_FFED;

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash)]
pub enum FatType {
    FAT12,
    FAT16,
    FAT32,
}

/// (upper bound of volume size, cluster size), the last entry catches the rest
type Breakpoints = &'static [(u64, u64)];

const FAT12_CLUSTER_SIZES: Breakpoints = &[(15 * MIB, 8 * KIB), (u64::MAX, 4 * KIB)];

const FAT16_CLUSTER_SIZES: Breakpoints = &[
    (16 * MIB, 4 * KIB),
    (128 * MIB, 2 * KIB),
    (256 * MIB, 4 * KIB),
    (512 * MIB, 8 * KIB),
    (GIB, 16 * KIB),
    (2 * GIB, 32 * KIB),
    (4 * GIB, 64 * KIB),
    (8 * GIB, 128 * KIB),
    (u64::MAX, 256 * KIB),
];

const FAT32_CLUSTER_SIZES: Breakpoints = &[
    (260 * MIB, 512),
    (8 * GIB, 4 * KIB),
    (16 * GIB, 8 * KIB),
    (32 * GIB, 16 * KIB),
    (u64::MAX, 32 * KIB),
];

impl FatType {
    pub(crate) fn cluster_sizes(self) -> Breakpoints {
        match self {
            Self::FAT12 => FAT12_CLUSTER_SIZES,
            Self::FAT16 => FAT16_CLUSTER_SIZES,
            Self::FAT32 => FAT32_CLUSTER_SIZES,
        }
    }

    /// Bytes occupied by `entries` FAT entries
    pub(crate) fn fat_bytes(self, entries: u64) -> u64 {
        match self {
            Self::FAT12 => (entries * 3 + 1) / 2,
            Self::FAT16 => entries * 2,
            Self::FAT32 => entries * 4,
        }
    }

    /// Value of FAT entry 0
    pub(crate) fn media_entry(self) -> u32 {
        match self {
            Self::FAT12 => 0xFF8,
            Self::FAT16 => 0xFFF8,
            Self::FAT32 => 0x0FFF_FFF8,
        }
    }

    pub(crate) fn end_of_chain(self) -> u32 {
        match self {
            Self::FAT12 => 0xFFF,
            Self::FAT16 => 0xFFFF,
            Self::FAT32 => 0x0FFF_FFFF,
        }
    }

    /// Filesystem type string of the extended boot record
    pub fn filesystem_name(self) -> &'static [u8; 8] {
        match self {
            Self::FAT12 => b"FAT12   ",
            Self::FAT16 => b"FAT16   ",
            Self::FAT32 => b"FAT32   ",
        }
    }

    pub(crate) fn partition_type(self) -> u8 {
        match self {
            Self::FAT12 => 0x01,
            Self::FAT16 => 0x0E,
            Self::FAT32 => 0x0C,
        }
    }

    fn by_clusters(clusters: u64, allow_fat32: bool) -> Self {
        match clusters {
            c if c < MIN_FAT16_CLUSTERS as u64 => Self::FAT12,
            c if c < MIN_FAT32_CLUSTERS as u64 || !allow_fat32 => Self::FAT16,
            _ => Self::FAT32,
        }
    }

    fn by_size(size: u64, allow_fat32: bool) -> Result<Self, Error> {
        match size {
            s if s < 16 * MIB => Ok(Self::FAT12),
            s if (260 * MIB..2 * TIB).contains(&s) && allow_fat32 => Ok(Self::FAT32),
            s if s < 16 * GIB => Ok(Self::FAT16),
            _ => Err(Error::InvalidArgument("capacity too large")),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FatSelect {
    #[default]
    Auto,
    /// Automatic selection never resulting in FAT32
    AutoNo32,
    /// Keep the FAT type of the drive being re-created
    Same,
    Fixed(FatType),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mbr {
    /// A single MBR sector in front of the partition
    Single,
    /// MBR padded to a whole cluster, keeping the partition cluster aligned
    Padded,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
    pub fat: FatSelect,
    /// Emit VFAT long name entries
    pub long_names: bool,
    pub mbr: Option<Mbr>,
    /// Align FAT and root directory regions to cluster boundaries
    pub align_cluster: bool,
    /// Reject cluster counts close to a FAT type boundary
    pub strict: bool,
}

/// Explicit layout parameters, `None` means automatic
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Parameters {
    pub sector_size: Option<u32>,
    pub sectors_per_cluster: Option<u32>,
    pub root_entries: Option<u32>,
}

/// Solved layout of a FAT volume, sector numbers relative to the partition start
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub fat_type: FatType,
    pub sector_size: u32,
    pub sectors_per_cluster: u32,
    /// Sectors of the partition, MBR excluded
    pub sectors: u32,
    /// Number of clusters in the data region
    pub clusters: u32,
    /// Root directory capacity, meaningless for FAT32
    pub root_entries: u32,
    pub fat_sectors: u32,
    pub fat1_start: u32,
    pub fat2_start: u32,
    pub root_start: u32,
    pub root_sectors: u32,
    pub data_start: u32,
    /// Sectors in front of the partition
    pub mbr_sectors: u32,
}

fn cluster_size(breakpoints: Breakpoints, size: u64) -> u64 {
    let found = breakpoints.iter().find(|(max, _)| size < *max);
    found.or(breakpoints.last()).map(|(_, cluster_size)| *cluster_size).unwrap_or(512)
}

fn div_ceil(value: u64, divisor: u64) -> u64 {
    (value + divisor - 1) / divisor
}

impl Geometry {
    pub fn solve(capacity: u64, options: &Options, params: &Parameters) -> Result<Self, Error> {
        let sector_size = match params.sector_size {
            None => DEFAULT_SECTOR_SIZE,
            Some(size @ (512 | 1024 | 2048 | 4096)) => size,
            Some(_) => return Err(Error::InvalidArgument("sector size")),
        };
        let root_entries = params.root_entries.unwrap_or(DEFAULT_ROOT_ENTRIES);
        if !(1..=u16::MAX as u32).contains(&root_entries) {
            return Err(Error::InvalidArgument("root directory entries"));
        }
        let bps = sector_size as u64;
        let size = capacity.checked_add(bps - 1).ok_or(Error::InvalidArgument("capacity too large"))?;
        let size = size / bps * bps;
        let sectors = u32::try_from(size / bps);
        let sectors = sectors.map_err(|_| Error::InvalidArgument("capacity too large"))?;

        let allow_fat32 = options.fat != FatSelect::AutoNo32;
        let (fat_type, sectors_per_cluster) = match params.sectors_per_cluster {
            None => {
                let fat_type = match options.fat {
                    FatSelect::Auto | FatSelect::AutoNo32 => FatType::by_size(size, allow_fat32)?,
                    FatSelect::Fixed(fat_type) => fat_type,
                    FatSelect::Same => return Err(Error::InvalidArgument("no FAT type to keep")),
                };
                let cluster_size = cluster_size(fat_type.cluster_sizes(), size);
                (fat_type, core::cmp::max(1, cluster_size / bps) as u32)
            }
            Some(spc) => {
                if !spc.is_power_of_two() || spc > MAX_SECTORS_PER_CLUSTER {
                    return Err(Error::InvalidArgument("sectors per cluster"));
                }
                let clusters = size / (bps * spc as u64);
                let fat_type = match options.fat {
                    FatSelect::Auto | FatSelect::AutoNo32 => {
                        FatType::by_clusters(clusters, allow_fat32)
                    }
                    FatSelect::Fixed(fat_type) => fat_type,
                    FatSelect::Same => return Err(Error::InvalidArgument("no FAT type to keep")),
                };
                (fat_type, spc)
            }
        };
        if sectors_per_cluster > MAX_SECTORS_PER_CLUSTER {
            return Err(Error::InvalidArgument("cluster size too large for sector size"));
        }
        let spc = sectors_per_cluster as u64;
        let align = |sectors: u64| match options.align_cluster {
            true => sectors.next_multiple_of(spc),
            false => sectors,
        };

        let (reserved, root_sectors) = match fat_type {
            FatType::FAT32 => (align(32), 0),
            _ => (align(1), align(div_ceil(root_entries as u64 * 32, bps))),
        };
        let too_small = Error::InvalidArgument("capacity too small");
        let first_data = reserved + root_sectors;
        let provisional = (sectors as u64).checked_sub(first_data).ok_or(too_small)? / spc;
        let fat_sectors = align(div_ceil(fat_type.fat_bytes(provisional + 2), bps));
        let data_start = first_data + 2 * fat_sectors;
        let too_small = Error::InvalidArgument("capacity too small");
        let clusters = (sectors as u64).checked_sub(data_start).ok_or(too_small)? / spc;
        let clusters = clusters as u32;

        let (min, max) = match fat_type {
            FatType::FAT12 => (1, MIN_FAT16_CLUSTERS - 1),
            FatType::FAT16 => (MIN_FAT16_CLUSTERS, MIN_FAT32_CLUSTERS - 1),
            FatType::FAT32 => (MIN_FAT32_CLUSTERS, MAX_FAT32_CLUSTERS),
        };
        if clusters < min {
            return Err(Error::InvalidArgument("too few clusters for FAT type"));
        }
        if clusters > max {
            return Err(Error::InvalidArgument("too many clusters for FAT type"));
        }
        // Drivers disagree on whether exactly 65525 clusters is FAT16 or FAT32
        if options.strict && fat_type == FatType::FAT32 && clusters <= MIN_FAT32_CLUSTERS {
            return Err(Error::InvalidArgument("cluster count ambiguous for FAT32"));
        }

        let fat_sectors = fat_sectors as u32;
        let fat1_start = reserved as u32;
        let fat2_start = fat1_start + fat_sectors;
        let root_start = fat2_start + fat_sectors;
        let mbr_sectors = match options.mbr {
            None => 0,
            Some(Mbr::Single) => 1,
            Some(Mbr::Padded) => sectors_per_cluster,
        };
        let geometry = Self {
            fat_type,
            sector_size,
            sectors_per_cluster,
            sectors,
            clusters,
            root_entries,
            fat_sectors,
            fat1_start,
            fat2_start,
            root_start,
            root_sectors: root_sectors as u32,
            data_start: data_start as u32,
            mbr_sectors,
        };
        debug!("Solved geometry {:?}", geometry);
        Ok(geometry)
    }

    pub fn cluster_size(&self) -> u32 {
        self.sector_size * self.sectors_per_cluster
    }

    /// Sectors of the whole drive, MBR included
    pub fn total_sectors(&self) -> u64 {
        self.sectors as u64 + self.mbr_sectors as u64
    }

    /// Bytes of the whole drive, MBR included
    pub fn bytes(&self) -> u64 {
        self.total_sectors() * self.sector_size as u64
    }

    pub fn entries_per_sector(&self) -> u32 {
        self.sector_size / 32
    }

    /// Number of clusters needed to hold `size` bytes
    pub fn clusters_of(&self, size: u64) -> u32 {
        div_ceil(size, self.cluster_size() as u64) as u32
    }

    /// First sector of `cluster`, relative to the partition start
    pub fn cluster_sector(&self, cluster: ClusterID) -> u32 {
        self.data_start + cluster.offset() * self.sectors_per_cluster
    }

    /// Explicit parameters reproducing this layout
    pub fn parameters(&self) -> Parameters {
        Parameters {
            sector_size: Some(self.sector_size),
            sectors_per_cluster: Some(self.sectors_per_cluster),
            root_entries: Some(self.root_entries),
        }
    }
}
