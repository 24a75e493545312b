use virtfat::Drive;

use crate::Error;

pub fn sector(drive: &Drive, sector: u64) -> Result<(), Error> {
    if sector >= drive.total_sectors() {
        return Err(Error::String("Sector out of range"));
    }
    let mut buf = vec![0u8; drive.sector_size() as usize];
    drive.read_sectors(sector, &mut buf)?;
    println!("{}", pretty_hex::pretty_hex(&buf));
    Ok(())
}
