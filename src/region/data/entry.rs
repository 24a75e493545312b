use bitfield::bitfield;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use derive_more::{From, Into};

use crate::endian::{Little as LE, Plain};
use crate::tree::shortname::ShortName;
use crate::types::ClusterID;

bitfield! {
    #[derive(Copy, Clone, Default, Debug, PartialEq, Eq, From, Into)]
    pub struct Attributes(u8);
    pub read_only, set_read_only: 0;
    pub hidden, set_hidden: 1;
    pub system, set_system: 2;
    pub volume_label, set_volume_label: 3;
    pub directory, set_directory: 4;
    pub archive, set_archive: 5;
}

impl Attributes {
    pub const READ_ONLY: Self = Self(0x01);
    pub const HIDDEN: Self = Self(0x02);
    pub const SYSTEM: Self = Self(0x04);
    pub const VOLUME_LABEL: Self = Self(0x08);
    pub const DIRECTORY: Self = Self(0x10);
    pub const ARCHIVE: Self = Self(0x20);
    /// Marks a VFAT long name entry
    pub(crate) const LONG_NAME: Self = Self(0x0F);
    /// Attributes a user is allowed to change
    pub const USER: Self = Self(0x27);

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl core::ops::BitOr for Attributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitAnd for Attributes {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl core::ops::Not for Attributes {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

bitfield! {
    /// DOS date in the high half, DOS time in the low half
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Into)]
    pub struct Timestamp(u32);
    year_offset, set_year_offset: 31, 25;
    pub month, set_month: 24, 21;
    pub day, set_day: 20, 16;
    pub hour, set_hour: 15, 11;
    pub minute, set_minute: 10, 5;
    pub double_second, set_double_second: 4, 0;
}

impl Timestamp {
    pub fn new(date: u16, time: u16) -> Self {
        Self((date as u32) << 16 | time as u32)
    }

    pub fn year(&self) -> u32 {
        self.year_offset() + 1980
    }

    /// Years outside 1980..=2107 are clamped
    pub fn set_year(&mut self, year: i32) {
        self.set_year_offset(year.clamp(1980, 2107) as u32 - 1980)
    }

    pub fn second(&self) -> u32 {
        self.double_second() * 2
    }

    pub fn set_second(&mut self, second: u32) {
        self.set_double_second(second / 2)
    }

    pub fn date(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn time(&self) -> u16 {
        self.0 as u16
    }
}

impl From<Timestamp> for NaiveDateTime {
    fn from(timestamp: Timestamp) -> Self {
        let date = NaiveDate::from_ymd_opt(timestamp.year() as i32, timestamp.month(), timestamp.day());
        let time = NaiveTime::from_hms_opt(timestamp.hour(), timestamp.minute(), timestamp.second());
        NaiveDateTime::new(date.unwrap_or_default(), time.unwrap_or_default())
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(datetime: NaiveDateTime) -> Self {
        let mut timestamp = Self::default();
        timestamp.set_year(datetime.year());
        timestamp.set_month(datetime.month());
        timestamp.set_day(datetime.day());
        timestamp.set_hour(datetime.hour());
        timestamp.set_minute(datetime.minute());
        timestamp.set_second(datetime.second());
        timestamp
    }
}

#[derive(Copy, Clone, Debug, Default)]
#[repr(C, packed(1))]
pub(crate) struct ShortEntry {
    pub name: [u8; 11],
    pub attributes: u8,
    _reserved: u8,
    /// 10 ms units, 0..=199
    pub create_time_tenth: u8,
    pub create_time: LE<u16>,
    pub create_date: LE<u16>,
    pub access_date: LE<u16>,
    pub cluster_high: LE<u16>,
    pub modify_time: LE<u16>,
    pub modify_date: LE<u16>,
    pub cluster_low: LE<u16>,
    pub size: LE<u32>,
}

unsafe impl Plain for ShortEntry {}

impl ShortEntry {
    /// FAT32 mirrors modification time into creation and access fields
    pub fn new(
        name: &ShortName,
        attributes: Attributes,
        date: NaiveDateTime,
        cluster: ClusterID,
        size: u32,
        fat32: bool,
    ) -> Self {
        let timestamp = Timestamp::from(date);
        let cluster: u32 = cluster.into();
        let mut entry = Self {
            name: name.bytes(),
            attributes: attributes.into(),
            cluster_low: (cluster as u16).into(),
            modify_time: timestamp.time().into(),
            modify_date: timestamp.date().into(),
            size: size.into(),
            ..Default::default()
        };
        if fat32 {
            entry.cluster_high = ((cluster >> 16) as u16).into();
            entry.create_time_tenth = (date.second() % 2 * 100) as u8;
            entry.create_time = timestamp.time().into();
            entry.create_date = timestamp.date().into();
            entry.access_date = timestamp.date().into();
        }
        entry
    }

    pub fn cluster(&self) -> ClusterID {
        let (high, low) = (self.cluster_high.get() as u32, self.cluster_low.get() as u32);
        ClusterID::from(high << 16 | low)
    }

    pub fn modified(&self) -> Timestamp {
        Timestamp::new(self.modify_date.get(), self.modify_time.get())
    }
}
