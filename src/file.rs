use std::io;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::error::Error;
use crate::geometry::FatType;
use crate::region::data::entry::Attributes;
use crate::source::{self, Operation};
use crate::tree::shortname::{self, ShortName};
use crate::tree::{Content, FileID, Match, Node, ROOT};
use crate::Drive;

/// Longest accepted name in UTF-16 units
pub const MAX_FILENAME_SIZE: usize = 255;

const INVALID_CHARS: &[char] = &['/', '\\', ':', '?', '*', '"', '<', '>', '|'];

fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidArgument("name"));
    }
    if name.chars().any(|c| c.is_control() || INVALID_CHARS.contains(&c)) {
        return Err(Error::InvalidArgument("invalid character in name"));
    }
    if name.encode_utf16().count() > MAX_FILENAME_SIZE {
        return Err(Error::InvalidArgument("name too long"));
    }
    Ok(())
}

fn default_attributes(directory: bool) -> Attributes {
    match directory {
        true => Attributes::ARCHIVE | Attributes::DIRECTORY,
        false => Attributes::ARCHIVE,
    }
}

impl Drive {
    fn ensure_directory(&self, dir: FileID) -> Result<(), Error> {
        match self.tree.get(dir)?.is_directory() {
            true => Ok(()),
            false => Err(Error::InvalidArgument("not a directory")),
        }
    }

    /// Non FAT32 root directories have a fixed number of slots
    fn ensure_root_capacity(&self, dir: FileID) -> Result<(), Error> {
        if dir != ROOT || self.geometry.fat_type == FatType::FAT32 {
            return Ok(());
        }
        let used = self.tree.children(ROOT)?.len() + self.label.is_some() as usize;
        if used >= self.geometry.root_entries as usize {
            return Err(Error::OutOfSpace("root directory"));
        }
        Ok(())
    }

    /// Short name of `name` inside `dir`, `id` being the file to be renamed or moved if any
    fn short_name_in(&self, dir: FileID, name: &str, id: Option<FileID>) -> Result<(ShortName, bool), Error> {
        if self.tree.find(dir, name, Match::Any, id).is_some() {
            return Err(Error::AlreadyExists);
        }
        shortname::synthesize(name, |candidate| self.tree.short_name_taken(dir, candidate, id))
    }

    fn add_node(&mut self, parent: FileID, mut node: Node) -> Result<FileID, Error> {
        self.ensure_unlocked()?;
        validate_name(&node.name)?;
        self.ensure_directory(parent)?;
        self.ensure_root_capacity(parent)?;
        let (short_name, long_named) = self.short_name_in(parent, &node.name, None)?;
        node.short_name = short_name;
        node.long_named = long_named;
        let name = node.name.clone();
        let id = self.tree.insert(parent, node)?;
        debug!("Added {} {} as {} in {}", id, name, short_name, parent);
        self.set_dirty();
        Ok(id)
    }

    pub fn add_dir(&mut self, parent: FileID, name: &str) -> Result<FileID, Error> {
        let date = chrono::Utc::now().naive_utc();
        let content = Content::Directory(Vec::new());
        self.add_node(parent, Node::new(name, default_attributes(true), date, content))
    }

    /// Add a file whose content is produced by `callback` on every read
    pub fn add_virtual_file<F>(&mut self, parent: FileID, name: &str, size: u32, callback: F) -> Result<FileID, Error>
    where
        F: Fn(Operation, &Node, u32, &mut [u8]) -> io::Result<usize> + Send + Sync + 'static,
    {
        let date = chrono::Utc::now().naive_utc();
        let content = Content::Virtual(Box::new(callback));
        let mut node = Node::new(name, default_attributes(false), date, content);
        node.size = size;
        self.add_node(parent, node)
    }

    /// Add a file backed by a host file, named after it unless `name` is given.
    ///
    /// Size and modification time are taken at this point, the file is reopened on every read.
    pub fn add_backing_file<P: AsRef<Path>>(
        &mut self,
        parent: FileID,
        name: Option<&str>,
        path: P,
    ) -> Result<FileID, Error> {
        let path = path.as_ref();
        let name = match name {
            Some(name) => name,
            None => path.file_name().and_then(|name| name.to_str()).ok_or(Error::InvalidArgument("path"))?,
        };
        let stat = source::stat(path)?;
        let content = Content::Backing(path.to_path_buf());
        let mut node = Node::new(name, default_attributes(false), stat.modified, content);
        node.size = stat.size;
        self.add_node(parent, node)
    }

    /// Delete a file, or a directory with everything below it
    pub fn delete(&mut self, id: FileID) -> Result<(), Error> {
        self.ensure_unlocked()?;
        self.tree.remove(id)?;
        debug!("Deleted {}", id);
        self.set_dirty();
        Ok(())
    }

    /// Move `id` to the end of directory `parent`
    pub fn move_to(&mut self, id: FileID, parent: FileID) -> Result<(), Error> {
        self.ensure_unlocked()?;
        if self.tree.get(id)?.is_root() {
            return Err(Error::InvalidArgument("root directory"));
        }
        self.ensure_directory(parent)?;
        if self.tree.is_ancestor(id, parent) {
            return Err(Error::InvalidArgument("move into itself"));
        }
        if self.tree.node(id).parent == Some(parent) {
            return Ok(());
        }
        self.ensure_root_capacity(parent)?;
        let name = self.tree.node(id).name.clone();
        let (short_name, long_named) = self.short_name_in(parent, &name, Some(id))?;
        self.tree.detach(id)?;
        self.tree.attach(id, parent)?;
        let node = self.tree.node_mut(id);
        node.short_name = short_name;
        node.long_named = long_named;
        debug!("Moved {} into {}", id, parent);
        self.set_dirty();
        Ok(())
    }

    pub fn rename(&mut self, id: FileID, name: &str) -> Result<(), Error> {
        self.ensure_unlocked()?;
        validate_name(name)?;
        let parent = self.tree.get(id)?.parent.ok_or(Error::InvalidArgument("root directory"))?;
        let (short_name, long_named) = self.short_name_in(parent, name, Some(id))?;
        let node = self.tree.node_mut(id);
        node.name = name.into();
        node.short_name = short_name;
        node.long_named = long_named;
        self.set_dirty();
        Ok(())
    }

    /// Override the generated 8.3 name
    pub fn set_short_name(&mut self, id: FileID, name: &str) -> Result<(), Error> {
        self.ensure_unlocked()?;
        let short_name = ShortName::parse(name)?;
        let parent = self.tree.get(id)?.parent.ok_or(Error::InvalidArgument("root directory"))?;
        let clash = self.tree.find(parent, name, Match::Any, Some(id));
        if clash.is_some() || self.tree.short_name_taken(parent, &short_name, Some(id)) {
            return Err(Error::AlreadyExists);
        }
        let node = self.tree.node_mut(id);
        node.long_named = short_name.as_string().as_str() != node.name;
        node.short_name = short_name;
        self.set_dirty();
        Ok(())
    }

    /// Resize a virtual file
    pub fn set_size(&mut self, id: FileID, size: u32) -> Result<(), Error> {
        self.ensure_unlocked()?;
        let node = self.tree.get_mut(id)?;
        if !matches!(node.content, Content::Virtual(_)) {
            return Err(Error::InvalidArgument("not a virtual file"));
        }
        node.size = size;
        self.set_dirty();
        Ok(())
    }

    /// End the FAT chain of a virtual file after `size` bytes, `None` chains all of it.
    ///
    /// Clusters past the shortened chain stay reserved and readable, the FAT marks them free.
    pub fn set_fat_size(&mut self, id: FileID, size: Option<u32>) -> Result<(), Error> {
        self.ensure_unlocked()?;
        let node = self.tree.get_mut(id)?;
        if !matches!(node.content, Content::Virtual(_)) {
            return Err(Error::InvalidArgument("not a virtual file"));
        }
        if size.is_some_and(|size| size > node.size) {
            return Err(Error::InvalidArgument("FAT size beyond file size"));
        }
        debug!("FAT size of {} set to {:?}", id, size);
        node.fat_size = size;
        self.set_dirty();
        Ok(())
    }

    /// Replace attributes selected by `mask`, returns the resulting attributes.
    ///
    /// Bits outside [`Attributes::USER`] are left untouched.
    pub fn set_attributes(&mut self, id: FileID, attributes: Attributes, mask: Attributes) -> Result<Attributes, Error> {
        self.ensure_unlocked()?;
        let node = self.tree.get_mut(id)?;
        let mask = mask & Attributes::USER;
        node.attributes = (node.attributes & !mask) | (attributes & mask);
        let attributes = node.attributes;
        self.set_dirty();
        Ok(attributes)
    }

    pub fn set_date(&mut self, id: FileID, date: NaiveDateTime) -> Result<(), Error> {
        self.ensure_unlocked()?;
        self.tree.get_mut(id)?.date = date;
        self.set_dirty();
        Ok(())
    }

    pub fn find(&self, dir: FileID, name: &str, how: Match) -> Result<FileID, Error> {
        self.ensure_directory(dir)?;
        self.tree.find(dir, name, how, None).ok_or(Error::NotFound)
    }

    /// Resolve a `/` or `\` separated path relative to `dir`
    pub fn find_path(&self, dir: FileID, path: &str, how: Match) -> Result<FileID, Error> {
        self.tree.find_path(dir, path, how)
    }

    pub fn children(&self, dir: FileID) -> Result<&[FileID], Error> {
        self.tree.children(dir)
    }

    pub fn child(&self, dir: FileID, index: usize) -> Result<FileID, Error> {
        self.tree.children(dir)?.get(index).copied().ok_or(Error::OutOfRange)
    }

    fn siblings(&self, id: FileID) -> Result<(&[FileID], usize), Error> {
        let parent = self.tree.get(id)?.parent.ok_or(Error::InvalidArgument("root directory"))?;
        let siblings = self.tree.children(parent)?;
        let index = siblings.iter().position(|&sibling| sibling == id).ok_or(Error::NotFound)?;
        Ok((siblings, index))
    }

    /// Position of `id` among its siblings
    pub fn index_of(&self, id: FileID) -> Result<usize, Error> {
        self.siblings(id).map(|(_, index)| index)
    }

    pub fn previous(&self, id: FileID) -> Result<Option<FileID>, Error> {
        let (siblings, index) = self.siblings(id)?;
        Ok(index.checked_sub(1).map(|index| siblings[index]))
    }

    pub fn next(&self, id: FileID) -> Result<Option<FileID>, Error> {
        let (siblings, index) = self.siblings(id)?;
        Ok(siblings.get(index + 1).copied())
    }

    /// Swap `id` with its previous sibling
    pub fn move_up(&mut self, id: FileID) -> Result<(), Error> {
        self.ensure_unlocked()?;
        let index = self.index_of(id)?;
        let index = index.checked_sub(1).ok_or(Error::OutOfRange)?;
        self.swap_with_sibling(id, index)
    }

    /// Swap `id` with its next sibling
    pub fn move_down(&mut self, id: FileID) -> Result<(), Error> {
        self.ensure_unlocked()?;
        let (siblings, index) = self.siblings(id)?;
        if index + 1 >= siblings.len() {
            return Err(Error::OutOfRange);
        }
        self.swap_with_sibling(id, index + 1)
    }

    fn swap_with_sibling(&mut self, id: FileID, other: usize) -> Result<(), Error> {
        let index = self.index_of(id)?;
        let parent = self.tree.node(id).parent.ok_or(Error::InvalidArgument("root directory"))?;
        self.tree.swap_children(parent, index, other)?;
        self.set_dirty();
        Ok(())
    }
}
