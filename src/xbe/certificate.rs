//! The title certificate referenced by the image header.
//!
//! The certificate identifies the title (id, name, regions, ratings) and carries the keys the
//! console uses for saved games and system link play. Its contents are never validated here;
//! the record is only decoded so that it can be written back unchanged at its new position.
//!
//! Like [`crate::xbe::ImageHeader`], the record declares its own size. Older images stop at
//! [`Certificate::MIN_SIZE`]; fields past the declared size read as zero.

use widestring::U16Str;

use crate::{
    file::{parser::Parser, writer::Writer},
    Error, Result,
};

/// The title certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Size of this record as present in the file
    pub size: u32,
    /// Certificate creation timestamp
    pub creation_timestamp: u32,
    /// Publisher and title number
    pub title_id: u32,
    /// NUL-padded UTF-16 title name
    pub title_name: [u16; 40],
    /// Title ids allowed to access this title's saved data
    pub alternate_title_ids: [u32; 16],
    /// Media the title may be run from
    pub media_flags: u32,
    /// Regions the title may be run in
    pub game_region: u32,
    /// Content rating
    pub game_ratings: u32,
    /// Disk number for multi-disk titles
    pub disk_number: u32,
    /// Certificate version
    pub version: u32,
    /// System link key
    pub lan_key: [u8; 16],
    /// Saved game signature key
    pub signature_key: [u8; 16],
    /// Signature keys for the alternate title ids
    pub alternate_signature_keys: [[u8; 16]; 16],
    /// Size of the original, unpatched image
    pub original_size: u32,
    /// Online service identifier
    pub online_service_name: u32,
    /// Runtime security flags
    pub runtime_security_flags: u32,
    /// Unidentified trailing key
    pub unknown_key: [u8; 16],
    /// Bytes past the known record when `size` exceeds [`Certificate::SIZE`]
    pub extension: Vec<u8>,
}

impl Certificate {
    /// Size of the largest known record layout.
    pub const SIZE: usize = 0x1EC;

    /// Smallest `size` accepted.
    pub const MIN_SIZE: u32 = 0x1D0;

    /// Read the certificate located at `offset` within `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::CertificateTooSmall`] if the declared size is below
    /// [`Certificate::MIN_SIZE`], or [`crate::Error::OutOfBounds`] if the data is truncated.
    pub fn read(data: &[u8], offset: usize) -> Result<Certificate> {
        let mut parser = Parser::at(data, offset)?;

        let size = parser.peek_le::<u32>()?;
        if size < Self::MIN_SIZE {
            return Err(Error::CertificateTooSmall { size });
        }

        let present = (size as usize).min(Self::SIZE);
        let mut record = [0u8; Self::SIZE];
        record[..present].copy_from_slice(parser.read_bytes(present)?);

        let extension = match (size as usize).checked_sub(Self::SIZE) {
            Some(extra) if extra > 0 => parser.read_bytes(extra)?.to_vec(),
            _ => Vec::new(),
        };

        let mut parser = Parser::new(&record);

        let size = parser.read_le::<u32>()?;
        let creation_timestamp = parser.read_le::<u32>()?;
        let title_id = parser.read_le::<u32>()?;
        let title_name = parser.read_u16_array::<40>()?;
        let alternate_title_ids = parser.read_u32_array::<16>()?;
        let media_flags = parser.read_le::<u32>()?;
        let game_region = parser.read_le::<u32>()?;
        let game_ratings = parser.read_le::<u32>()?;
        let disk_number = parser.read_le::<u32>()?;
        let version = parser.read_le::<u32>()?;
        let lan_key = parser.read_array::<16>()?;
        let signature_key = parser.read_array::<16>()?;

        let mut alternate_signature_keys = [[0u8; 16]; 16];
        for key in &mut alternate_signature_keys {
            *key = parser.read_array::<16>()?;
        }

        Ok(Certificate {
            size,
            creation_timestamp,
            title_id,
            title_name,
            alternate_title_ids,
            media_flags,
            game_region,
            game_ratings,
            disk_number,
            version,
            lan_key,
            signature_key,
            alternate_signature_keys,
            original_size: parser.read_le::<u32>()?,
            online_service_name: parser.read_le::<u32>()?,
            runtime_security_flags: parser.read_le::<u32>()?,
            unknown_key: parser.read_array::<16>()?,
            extension,
        })
    }

    /// Write the record at the writer's position, emitting exactly `size` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the record does not fit the writer.
    pub fn write(&self, writer: &mut Writer) -> Result<()> {
        let mut record = [0u8; Self::SIZE];
        let mut cursor = Writer::new(&mut record);

        cursor.write_le(self.size)?;
        cursor.write_le(self.creation_timestamp)?;
        cursor.write_le(self.title_id)?;
        cursor.write_u16_slice(&self.title_name)?;
        cursor.write_u32_slice(&self.alternate_title_ids)?;
        cursor.write_u32_slice(&[
            self.media_flags,
            self.game_region,
            self.game_ratings,
            self.disk_number,
            self.version,
        ])?;
        cursor.write_bytes(&self.lan_key)?;
        cursor.write_bytes(&self.signature_key)?;
        for key in &self.alternate_signature_keys {
            cursor.write_bytes(key)?;
        }
        cursor.write_le(self.original_size)?;
        cursor.write_le(self.online_service_name)?;
        cursor.write_le(self.runtime_security_flags)?;
        cursor.write_bytes(&self.unknown_key)?;

        let present = (self.size as usize).min(Self::SIZE);
        writer.write_bytes(&record[..present])?;
        writer.write_bytes(&self.extension)
    }

    /// The title name up to its first NUL, with invalid UTF-16 replaced.
    #[must_use]
    pub fn title(&self) -> String {
        let end = self
            .title_name
            .iter()
            .position(|&unit| unit == 0)
            .unwrap_or(self.title_name.len());
        U16Str::from_slice(&self.title_name[..end]).to_string_lossy()
    }
}
