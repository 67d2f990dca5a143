//! Shared helpers for the integration tests.
//!
//! Images are assembled from the public model and packed with [`HeaderSerializer`], then
//! padded with section data so that they look like complete files on disk.

#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use xbexploder::{
    write::HeaderSerializer,
    xbe::{
        Certificate, DebugNames, ImageHeader, ImportDirectory, LibraryVersion, LibraryVersionRefs,
        SecondaryHeader, Section, SectionFlags, SectionHeader, ENTRY_POINT_KEY_RETAIL,
        KERNEL_THUNK_KEY_RETAIL, XBE_MAGIC,
    },
    XbeImage,
};

pub const BASE_ADDRESS: u32 = 0x0001_0000;
pub const SIZE_OF_HEADERS: u32 = 0x1000;

/// Byte every section's raw data is filled with.
pub const SECTION_FILL: u8 = 0xCC;

pub fn section(name: &str, virtual_address: u32, size: u32, raw_address: u32) -> Section {
    Section {
        header: SectionHeader {
            flags: SectionFlags::PRELOAD | SectionFlags::EXECUTABLE,
            virtual_address,
            virtual_size: size,
            raw_address,
            raw_size: size,
            section_name_address: 0,
            section_name_reference_count: 1,
            head_shared_page_reference_address: 0,
            tail_shared_page_reference_address: 0,
            digest: [0x5D; 20],
        },
        name: name.into(),
    }
}

fn library(name: &str, build_version: u16) -> LibraryVersion {
    let mut padded = [0u8; 8];
    padded[..name.len()].copy_from_slice(name.as_bytes());
    LibraryVersion {
        name: padded,
        major_version: 1,
        minor_version: 0,
        build_version,
        flags: 0x4001,
    }
}

fn certificate() -> Certificate {
    let mut title_name = [0u16; 40];
    for (slot, unit) in title_name.iter_mut().zip("Integration".encode_utf16()) {
        *slot = unit;
    }

    Certificate {
        size: Certificate::SIZE as u32,
        creation_timestamp: 0x3C00_0000,
        title_id: 0x4D53_0004,
        title_name,
        alternate_title_ids: [0; 16],
        media_flags: 0x0000_0002,
        game_region: 0x0000_0007,
        game_ratings: 0xFFFF_FFFF,
        disk_number: 0,
        version: 1,
        lan_key: [0x11; 16],
        signature_key: [0x22; 16],
        alternate_signature_keys: [[0x33; 16]; 16],
        original_size: 0,
        online_service_name: 0,
        runtime_security_flags: 0,
        unknown_key: [0; 16],
        extension: Vec::new(),
    }
}

/// A retail image with a `.text` and a `.data` section.
///
/// Address fields are left zero; the serializer derives them.
pub fn image() -> XbeImage {
    let sections = vec![
        section(".text", 0x0001_1000, 0x1000, 0x1000),
        section(".data", 0x0001_2000, 0x1000, 0x2000),
    ];

    let header = ImageHeader {
        magic: XBE_MAGIC,
        signature: [0xA5; 256],
        base_address: BASE_ADDRESS,
        size_of_headers: SIZE_OF_HEADERS,
        size_of_image: 0x3000,
        size_of_image_header: ImageHeader::SIZE as u32,
        creation_timestamp: 0x3C00_0000,
        certificate_address: 0,
        number_of_sections: sections.len() as u32,
        section_headers_address: 0,
        image_flags: 0,
        entry_point: 0x0001_1000 ^ ENTRY_POINT_KEY_RETAIL,
        tls_address: 0,
        pe_stack_commit: 0x10000,
        pe_heap_reserve: 0x100000,
        pe_heap_commit: 0x1000,
        pe_base_address: 0,
        pe_size_of_image: 0x3000,
        pe_checksum: 0,
        pe_timestamp: 0x3C00_0000,
        full_file_name_address: 0,
        file_name_address: 0,
        unicode_file_name_address: 0,
        kernel_image_thunk_address: 0x0001_2000 ^ KERNEL_THUNK_KEY_RETAIL,
        import_table_address: 0,
        number_of_library_versions: 0,
        library_versions_address: 0,
        kernel_library_version_address: 0,
        xapi_library_version_address: 0,
        logo_bitmap_address: 0,
        logo_bitmap_size: 0,
        library_features_address: 0,
        number_of_library_features: 0,
        code_view_debug_info_address: 0,
        extension: Vec::new(),
    };

    XbeImage {
        header,
        certificate: certificate(),
        sections,
        imports: ImportDirectory::new(),
        library_versions: vec![library("XBOXKRNL", 5849), library("XAPILIB", 5849)],
        library_version_refs: LibraryVersionRefs {
            kernel: Some(0),
            xapi: Some(LibraryVersion::SIZE as u32),
        },
        library_features: vec![library("XGRAPHC", 5849)],
        debug_names: DebugNames {
            full_path: Some(r"D:\titles\integration\default.exe".into()),
            file_name_offset: Some(22),
            unicode_path: Some(r"D:\titles\integration\default.exe".to_string()),
        },
        logo_bitmap: vec![0x4C; 0x2A],
        secondary_header: None,
    }
}

/// An embedded PE header of `len` bytes at `offset`.
pub fn pe_header(offset: u32, len: usize) -> SecondaryHeader {
    let mut bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    bytes[..2].copy_from_slice(b"MZ");
    SecondaryHeader { offset, bytes }
}

/// Pack `image` into a complete file: header region followed by section data.
pub fn file_bytes(image: &XbeImage) -> Vec<u8> {
    let header = HeaderSerializer::new(image)
        .serialize()
        .expect("test image must serialize");

    let end = image
        .sections
        .iter()
        .map(|section| (section.header.raw_address + section.header.raw_size) as usize)
        .max()
        .unwrap_or(0)
        .max(header.len());

    let mut data = header.into_bytes();
    data.resize(end, SECTION_FILL);
    data
}

/// Write `image` as `default.xbe` into `dir`.
pub fn write_xbe(dir: &Path, image: &XbeImage) -> PathBuf {
    let path = dir.join("default.xbe");
    fs::write(&path, file_bytes(image)).expect("failed to write test image");
    path
}

/// Read a little-endian `u32` at `offset`.
pub fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
