use std::path::Path;

use virtfat::Drive;

use crate::Error;

pub fn dump(drive: &mut Drive, image: &Path) -> Result<(), Error> {
    drive.dump(image)?;
    Ok(())
}
