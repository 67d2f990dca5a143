//! Hand-assembled XBE images for unit tests.
//!
//! [`XbeBuilder`] lays out the header region byte by byte, without going through the
//! serializer, so parser and serializer tests check against an independent source. By default
//! the packing order matches what the serializer produces, which lets round-trip tests compare
//! whole files. [`XbeBuilder::scattered`] and [`XbeBuilder::logo_at`] produce layouts other
//! linkers emit: regions in a different order, separated by filler.

const BASE: u32 = 0x0001_0000;

/// Filler between regions of a scattered layout.
const GAP: usize = 0x40;
const GAP_FILL: u8 = 0xEE;

struct SectionSpec {
    name: Vec<u8>,
    virtual_address: u32,
    virtual_size: u32,
    raw_address: u32,
    raw_size: u32,
}

struct LibrarySpec {
    name: String,
    build: u16,
}

/// Builder for a complete XBE file image.
///
/// The default image has base address `0x00010000`, a `0x1000` byte header region and one
/// `.text` section `{va: 0x00011000, vsize: 0x2000, raw: 0x1000, raw_size: 0x2000}`.
pub struct XbeBuilder {
    size_of_image_header: u32,
    size_of_headers: u32,
    entry_point: u32,
    kernel_thunk: u32,
    sections: Vec<SectionSpec>,
    imports: Vec<(u32, String)>,
    libraries: Vec<LibrarySpec>,
    features: Vec<LibrarySpec>,
    debug_path: Option<(Vec<u8>, u32)>,
    unicode_path: Option<String>,
    logo: Vec<u8>,
    code_view: u32,
    pe_header: usize,
    scattered: bool,
    logo_offset: Option<usize>,
}

fn put_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_libraries(data: &mut [u8], libraries: &[LibrarySpec], position: &mut usize) -> usize {
    let start = align4(*position);
    for (i, library) in libraries.iter().enumerate() {
        let record = start + i * 16;
        data[record..record + library.name.len()].copy_from_slice(library.name.as_bytes());
        put_u16(data, record + 8, 1);
        put_u16(data, record + 10, 0);
        put_u16(data, record + 12, library.build);
        put_u16(data, record + 14, 0x4001);
    }
    *position = start + libraries.len() * 16;
    start
}

fn align4(value: usize) -> usize {
    (value + 3) & !3
}

fn address(offset: usize) -> u32 {
    BASE + offset as u32
}

impl XbeBuilder {
    pub fn new() -> Self {
        XbeBuilder {
            size_of_image_header: 0x184,
            size_of_headers: 0x1000,
            entry_point: 0x0001_1000 ^ 0xA8FC_57AB,
            kernel_thunk: 0x0001_1100 ^ 0x5B6D_40B6,
            sections: vec![SectionSpec {
                name: b".text".to_vec(),
                virtual_address: 0x0001_1000,
                virtual_size: 0x2000,
                raw_address: 0x1000,
                raw_size: 0x2000,
            }],
            imports: Vec::new(),
            libraries: Vec::new(),
            features: Vec::new(),
            debug_path: None,
            unicode_path: None,
            logo: Vec::new(),
            code_view: 0,
            pe_header: 0,
            scattered: false,
            logo_offset: None,
        }
    }

    pub fn size_of_image_header(mut self, size: u32) -> Self {
        self.size_of_image_header = size;
        self
    }

    pub fn size_of_headers(mut self, size: u32) -> Self {
        self.size_of_headers = size;
        self
    }

    pub fn entry_point(mut self, entry_point: u32) -> Self {
        self.entry_point = entry_point;
        self
    }

    pub fn kernel_thunk(mut self, kernel_thunk: u32) -> Self {
        self.kernel_thunk = kernel_thunk;
        self
    }

    pub fn no_sections(mut self) -> Self {
        self.sections.clear();
        self
    }

    pub fn section(
        mut self,
        name: impl AsRef<[u8]>,
        virtual_address: u32,
        virtual_size: u32,
        raw_address: u32,
        raw_size: u32,
    ) -> Self {
        self.sections.push(SectionSpec {
            name: name.as_ref().to_vec(),
            virtual_address,
            virtual_size,
            raw_address,
            raw_size,
        });
        self
    }

    pub fn import(mut self, thunk: u32, module: &str) -> Self {
        self.imports.push((thunk, module.to_string()));
        self
    }

    pub fn library(mut self, name: &str, build: u16) -> Self {
        self.libraries.push(LibrarySpec {
            name: name.to_string(),
            build,
        });
        self
    }

    pub fn feature(mut self, name: &str, build: u16) -> Self {
        self.features.push(LibrarySpec {
            name: name.to_string(),
            build,
        });
        self
    }

    /// Narrow debug path, stored verbatim.
    pub fn debug_path(mut self, path: impl AsRef<[u8]>, file_name_offset: u32) -> Self {
        self.debug_path = Some((path.as_ref().to_vec(), file_name_offset));
        self
    }

    pub fn unicode_path(mut self, path: &str) -> Self {
        self.unicode_path = Some(path.to_string());
        self
    }

    pub fn logo(mut self, logo: &[u8]) -> Self {
        self.logo = logo.to_vec();
        self
    }

    pub fn code_view(mut self, address: u32) -> Self {
        self.code_view = address;
        self
    }

    /// Write section names in reverse, libraries before imports and the narrow debug path
    /// before the wide one, with filler before each region.
    pub fn scattered(mut self) -> Self {
        self.scattered = true;
        self
    }

    /// Store the logo at header offset `offset` instead of after the debug names.
    pub fn logo_at(mut self, offset: usize) -> Self {
        self.logo_offset = Some(offset);
        self
    }

    /// Place a fake PE header of `len` bytes at the end of the header region.
    pub fn pe_header(mut self, len: usize) -> Self {
        self.pe_header = len;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let size_of_headers = self.size_of_headers as usize;
        let file_len = self
            .sections
            .iter()
            .map(|s| (s.raw_address + s.raw_size) as usize)
            .max()
            .unwrap_or(0)
            .max(size_of_headers);

        let mut data = vec![0u8; file_len];
        for section in &self.sections {
            let start = section.raw_address as usize;
            data[start..start + section.raw_size as usize].fill(0xCC);
        }
        data[..size_of_headers].fill(0);

        // Image header
        let h = &mut data;
        h[..4].copy_from_slice(b"XBEH");
        h[0x004..0x104].fill(0x5A);
        put_u32(h, 0x104, BASE);
        put_u32(h, 0x108, self.size_of_headers);
        put_u32(h, 0x10C, 0x3000 + 0x1000 * (self.sections.len() as u32).saturating_sub(1));
        put_u32(h, 0x110, self.size_of_image_header);
        put_u32(h, 0x114, 0x3C00_0000);
        put_u32(h, 0x11C, self.sections.len() as u32);
        put_u32(h, 0x124, 0x0000_0005);
        put_u32(h, 0x128, self.entry_point);
        put_u32(h, 0x12C, 0x0001_1F00);
        put_u32(h, 0x130, 0x1000);
        put_u32(h, 0x134, 0x0010_0000);
        put_u32(h, 0x138, 0x1000);
        put_u32(h, 0x140, 0x0004_0000);
        put_u32(h, 0x148, 0x3C00_0001);
        put_u32(h, 0x158, self.kernel_thunk);

        // Certificate
        let cert = align4(self.size_of_image_header as usize);
        put_u32(h, 0x118, address(cert));
        put_u32(h, cert, 0x1EC);
        put_u32(h, cert + 0x08, 0x5445_0001);
        for (i, unit) in "Test Title".encode_utf16().enumerate() {
            put_u16(h, cert + 0x0C + i * 2, unit);
        }
        put_u32(h, cert + 0xA0, 0x0000_0001);
        h[cert + 0xB0..cert + 0xC0].fill(0x11);
        h[cert + 0xC0..cert + 0xD0].fill(0x22);
        let mut position = cert + 0x1EC;

        // Section headers, shared page table and names
        let section_headers = align4(position);
        put_u32(h, 0x120, address(section_headers));
        let shared_pages = align4(section_headers + self.sections.len() * 0x38);
        position = align4(shared_pages + (self.sections.len() + 1) * 2);
        position = self.skip(h, position);

        let mut order: Vec<usize> = (0..self.sections.len()).collect();
        if self.scattered {
            order.reverse();
        }
        let mut names = vec![0; self.sections.len()];
        for index in order {
            let name = &self.sections[index].name;
            names[index] = position;
            h[position..position + name.len()].copy_from_slice(name);
            position += name.len() + 1;
        }

        for (i, section) in self.sections.iter().enumerate() {
            let record = section_headers + i * 0x38;
            put_u32(h, record, 0x0000_0007);
            put_u32(h, record + 0x04, section.virtual_address);
            put_u32(h, record + 0x08, section.virtual_size);
            put_u32(h, record + 0x0C, section.raw_address);
            put_u32(h, record + 0x10, section.raw_size);
            put_u32(h, record + 0x14, address(names[i]));
            put_u32(h, record + 0x18, 1);
            put_u32(h, record + 0x1C, address(shared_pages + i * 2));
            put_u32(h, record + 0x20, address(shared_pages + (i + 1) * 2));
            h[record + 0x24..record + 0x38].fill(0xD0 + i as u8);
        }

        if self.scattered {
            self.put_libraries(h, &mut position);
            self.put_imports(h, &mut position);
            self.put_debug_path(h, &mut position);
            self.put_unicode_path(h, &mut position);
        } else {
            self.put_imports(h, &mut position);
            self.put_libraries(h, &mut position);
            self.put_unicode_path(h, &mut position);
            self.put_debug_path(h, &mut position);
        }

        // Logo bitmap
        if !self.logo.is_empty() {
            let start = match self.logo_offset {
                Some(offset) => offset,
                None => align4(self.skip(h, position)),
            };
            put_u32(h, 0x170, address(start));
            put_u32(h, 0x174, self.logo.len() as u32);
            h[start..start + self.logo.len()].copy_from_slice(&self.logo);
            position = position.max(start + self.logo.len());
        }

        if self.code_view != 0 && self.size_of_image_header >= 0x184 {
            put_u32(h, 0x180, self.code_view);
        }

        if self.pe_header != 0 {
            let start = size_of_headers - self.pe_header;
            assert!(start >= position, "PE header overlaps the packed header");
            put_u32(h, 0x13C, address(start));
            for (i, byte) in h[start..size_of_headers].iter_mut().enumerate() {
                *byte = i as u8 ^ 0x5C;
            }
            h[start..start + 2].copy_from_slice(b"MZ");
        }

        assert!(position <= size_of_headers, "header region overflow");

        data
    }
}

impl XbeBuilder {
    /// Leave filler at `position` in a scattered layout.
    fn skip(&self, data: &mut [u8], position: usize) -> usize {
        if !self.scattered {
            return position;
        }
        data[position..position + GAP].fill(GAP_FILL);
        position + GAP
    }

    /// Import descriptors followed by their wide module names.
    fn put_imports(&self, data: &mut [u8], position: &mut usize) {
        if self.imports.is_empty() {
            return;
        }

        let descriptors = align4(self.skip(data, *position));
        put_u32(data, 0x15C, address(descriptors));
        let mut module = descriptors + (self.imports.len() + 1) * 8;
        for (i, (thunk, name)) in self.imports.iter().enumerate() {
            put_u32(data, descriptors + i * 8, *thunk);
            put_u32(data, descriptors + i * 8 + 4, address(module));
            for unit in name.encode_utf16() {
                put_u16(data, module, unit);
                module += 2;
            }
            module += 2;
        }
        *position = module;
    }

    /// Library versions and features.
    fn put_libraries(&self, data: &mut [u8], position: &mut usize) {
        if !self.libraries.is_empty() {
            *position = self.skip(data, *position);
            let libraries = write_libraries(data, &self.libraries, position);
            put_u32(data, 0x160, self.libraries.len() as u32);
            put_u32(data, 0x164, address(libraries));
            for (i, library) in self.libraries.iter().enumerate() {
                match library.name.as_str() {
                    "XBOXKRNL" => put_u32(data, 0x168, address(libraries + i * 16)),
                    "XAPILIB" => put_u32(data, 0x16C, address(libraries + i * 16)),
                    _ => {}
                }
            }
        }
        if !self.features.is_empty() && self.size_of_image_header >= 0x180 {
            *position = self.skip(data, *position);
            let features = write_libraries(data, &self.features, position);
            put_u32(data, 0x178, address(features));
            put_u32(data, 0x17C, self.features.len() as u32);
        }
    }

    fn put_unicode_path(&self, data: &mut [u8], position: &mut usize) {
        let Some(path) = &self.unicode_path else {
            return;
        };

        let start = align4(self.skip(data, *position));
        put_u32(data, 0x154, address(start));
        let mut cursor = start;
        for unit in path.encode_utf16() {
            put_u16(data, cursor, unit);
            cursor += 2;
        }
        *position = cursor + 2;
    }

    fn put_debug_path(&self, data: &mut [u8], position: &mut usize) {
        let Some((path, file_name_offset)) = &self.debug_path else {
            return;
        };

        let start = align4(self.skip(data, *position));
        put_u32(data, 0x14C, address(start));
        put_u32(data, 0x150, address(start) + file_name_offset);
        data[start..start + path.len()].copy_from_slice(path);
        *position = start + path.len() + 1;
    }
}

impl Default for XbeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
