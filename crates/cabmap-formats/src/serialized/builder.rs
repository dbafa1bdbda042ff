//! Builders for serialized files and object payloads

use binrw::Endian;

use super::error::{Result, SerializedError};
use super::file::PLATFORM_NO_TARGET;
use super::header::{HEADER_SIZE, LARGE_FILES_VERSION, LARGE_HEADER_SIZE};
use super::object::{AssetInfo, PPtr};
use super::stream::StreamWriter;
use crate::bundle::header::parse_engine_version;
use crate::class_id::ClassId;

/// Oldest format version the builder writes
const MIN_BUILD_VERSION: u32 = 13;

/// Newest format version the builder writes
const MAX_BUILD_VERSION: u32 = 22;

/// Builder for serialized files
///
/// Writes type trees only on request; objects are laid out in insertion order.
///
/// # Example
///
/// ```rust
/// use cabmap_formats::class_id::ClassId;
/// use cabmap_formats::serialized::{SerializedFile, SerializedFileBuilder};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let builder = SerializedFileBuilder::new();
/// let texture = builder.object_writer().named("hero_diffuse");
/// let data = builder
///     .add_object(1, ClassId::Texture2D, texture)
///     .add_external("archive:/CAB-shared/CAB-shared")
///     .build()?;
///
/// let file = SerializedFile::parse("CAB-hero", data)?;
/// assert_eq!(file.dependencies(), vec!["CAB-shared"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SerializedFileBuilder {
    version: u32,
    unity_version: String,
    platform: i32,
    endian: Endian,
    type_tree: bool,
    objects: Vec<(i64, ClassId, Vec<u8>)>,
    externals: Vec<String>,
}

impl Default for SerializedFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializedFileBuilder {
    /// Create a builder for a little-endian version 22 file
    pub fn new() -> Self {
        Self {
            version: LARGE_FILES_VERSION,
            unity_version: "2019.4.40f1".to_string(),
            platform: 19,
            endian: Endian::Little,
            type_tree: false,
            objects: Vec::new(),
            externals: Vec::new(),
        }
    }

    /// Set the format version (13 to 22)
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Set the engine version string
    pub fn with_unity_version(mut self, version: impl Into<String>) -> Self {
        self.unity_version = version.into();
        self
    }

    /// Set the build target
    pub fn with_platform(mut self, platform: i32) -> Self {
        self.platform = platform;
        self
    }

    /// Target the editor, which prefixes every object with editor-only fields
    pub fn for_editor(self) -> Self {
        self.with_platform(PLATFORM_NO_TARGET)
    }

    /// Write metadata and objects big-endian
    pub fn with_big_endian(mut self) -> Self {
        self.endian = Endian::Big;
        self
    }

    /// Embed a minimal type tree for every type
    pub fn with_type_tree(mut self) -> Self {
        self.type_tree = true;
        self
    }

    /// Writer for object payloads matching this file's layout
    pub fn object_writer(&self) -> ObjectWriter {
        ObjectWriter::new(
            self.endian,
            self.version,
            parse_engine_version(&self.unity_version),
            self.platform,
        )
    }

    /// Append an object
    pub fn add_object(mut self, path_id: i64, class_id: ClassId, data: Vec<u8>) -> Self {
        self.objects.push((path_id, class_id, data));
        self
    }

    /// Append an external reference; pointers address it as `file_id = index + 1`
    pub fn add_external(mut self, path_name: impl Into<String>) -> Self {
        self.externals.push(path_name.into());
        self
    }

    /// Serialize the file
    pub fn build(self) -> Result<Vec<u8>> {
        let version = self.version;
        if !(MIN_BUILD_VERSION..=MAX_BUILD_VERSION).contains(&version) {
            return Err(SerializedError::UnsupportedVersion(version));
        }

        let header_size = if version >= LARGE_FILES_VERSION {
            LARGE_HEADER_SIZE as usize
        } else {
            HEADER_SIZE as usize
        };

        // Type table in order of first use
        let mut types: Vec<i32> = Vec::new();
        for (_, class_id, _) in &self.objects {
            if !types.contains(&class_id.id()) {
                types.push(class_id.id());
            }
        }

        // Object data, each object 8-byte aligned relative to the data offset
        let mut data = Vec::new();
        let mut placements = Vec::with_capacity(self.objects.len());
        for (_, _, bytes) in &self.objects {
            let rem = data.len() % 8;
            if rem != 0 {
                data.resize(data.len() + 8 - rem, 0);
            }
            placements.push((data.len(), bytes.len()));
            data.extend_from_slice(bytes);
        }

        // Metadata is written at its final absolute offset so alignment matches
        let mut meta = StreamWriter::new(self.endian);
        meta.bytes(&vec![0; header_size]);
        meta.cstring(&self.unity_version);
        meta.i32(self.platform);
        meta.u8(u8::from(self.type_tree));

        meta.i32(types.len() as i32);
        for &class_id in &types {
            meta.i32(class_id);
            if version >= 16 {
                meta.u8(0);
            }
            if version >= 17 {
                meta.i16(-1);
            }
            if (version < 16 && class_id < 0) || (version >= 16 && class_id == 114) {
                meta.bytes(&[0; 16]);
            }
            meta.bytes(&[0; 16]);

            if self.type_tree {
                write_type_tree(&mut meta, version);
            }
        }

        if version < 14 {
            meta.i32(0); // big ids disabled
        }

        meta.i32(self.objects.len() as i32);
        for ((path_id, class_id, _), (offset, size)) in self.objects.iter().zip(&placements) {
            if version < 14 {
                meta.i32(*path_id as i32);
            } else {
                meta.align(4);
                meta.i64(*path_id);
            }
            if version >= LARGE_FILES_VERSION {
                meta.i64(*offset as i64);
            } else {
                meta.u32(*offset as u32);
            }
            meta.u32(*size as u32);

            let slot = types.iter().position(|c| *c == class_id.id()).unwrap_or(0);
            if version < 16 {
                meta.i32(class_id.id());
                meta.u16(class_id.id() as u16);
            } else {
                meta.i32(slot as i32);
            }
            if version < 17 {
                meta.i16(-1);
            }
            if version == 15 || version == 16 {
                meta.u8(0);
            }
        }

        meta.i32(0); // script types

        meta.i32(self.externals.len() as i32);
        for path in &self.externals {
            meta.cstring("");
            meta.bytes(&[0; 16]);
            meta.i32(0);
            meta.cstring(path);
        }

        if version >= 20 {
            meta.i32(0); // ref types
        }
        meta.cstring(""); // user information

        let metadata_end = meta.len();
        let metadata_size = (metadata_end - header_size) as u32;
        meta.align(16);
        let data_offset = meta.len();
        let mut out = meta.into_inner();
        out.extend_from_slice(&data);
        let file_size = out.len();

        let mut header = StreamWriter::new(Endian::Big);
        if version >= LARGE_FILES_VERSION {
            header.u32(0);
            header.u32(0);
            header.u32(version);
            header.u32(0);
        } else {
            header.u32(metadata_size);
            header.u32(file_size as u32);
            header.u32(version);
            header.u32(data_offset as u32);
        }
        header.u8(u8::from(self.endian == Endian::Big));
        header.bytes(&[0; 3]);
        if version >= LARGE_FILES_VERSION {
            header.u32(metadata_size);
            header.i64(file_size as i64);
            header.i64(data_offset as i64);
            header.i64(0);
        }
        let header = header.into_inner();
        out[..header.len()].copy_from_slice(&header);

        Ok(out)
    }
}

/// A single root node and its name strings
fn write_type_tree(meta: &mut StreamWriter, version: u32) {
    let node_size = if version >= 19 { 32 } else { 24 };
    let strings = b"Base\0m_Name\0";
    meta.i32(1);
    meta.i32(strings.len() as i32);
    meta.bytes(&vec![0; node_size]);
    meta.bytes(strings);
    if version >= 21 {
        meta.i32(0); // dependencies
    }
}

/// Writer for object payloads, the counterpart of
/// [`super::object::ObjectReader`]
#[derive(Debug, Clone)]
pub struct ObjectWriter {
    stream: StreamWriter,
    format_version: u32,
    engine_version: [u32; 3],
}

impl ObjectWriter {
    /// Create a writer, emitting the editor-only prefix when `platform` is the editor
    pub fn new(endian: Endian, format_version: u32, engine_version: [u32; 3], platform: i32) -> Self {
        let mut writer = Self {
            stream: StreamWriter::new(endian),
            format_version,
            engine_version,
        };
        if platform == PLATFORM_NO_TARGET {
            writer.stream.u32(0);
            writer = writer.pptr(PPtr::default()).pptr(PPtr::default());
        }
        writer
    }

    /// Append an `i32`
    pub fn i32(mut self, v: i32) -> Self {
        self.stream.i32(v);
        self
    }

    /// Append an aligned string
    pub fn aligned_string(mut self, v: &str) -> Self {
        self.stream.aligned_string(v);
        self
    }

    /// Append a pointer
    pub fn pptr(mut self, p: PPtr) -> Self {
        self.stream.i32(p.file_id);
        if self.format_version < 14 {
            self.stream.i32(p.path_id as i32);
        } else {
            self.stream.i64(p.path_id);
        }
        self
    }

    /// Finish and return the payload
    pub fn finish(self) -> Vec<u8> {
        self.stream.into_inner()
    }

    /// Payload of an object whose first field is `m_Name`
    pub fn named(self, name: &str) -> Vec<u8> {
        self.aligned_string(name).finish()
    }

    /// Payload of a scene-graph node
    pub fn game_object(self, name: &str, components: &[PPtr]) -> Vec<u8> {
        let [major, minor, _] = self.engine_version;
        let paired = major < 5 || (major == 5 && minor < 5);
        let mut writer = self.i32(components.len() as i32);
        for component in components {
            if paired {
                writer = writer.i32(0);
            }
            writer = writer.pptr(*component);
        }
        writer.i32(0).aligned_string(name).finish()
    }

    /// Payload of a component owned by `owner`, e.g. an Animator
    pub fn component(self, owner: PPtr) -> Vec<u8> {
        self.pptr(owner).finish()
    }

    /// Payload of a bundle manifest
    pub fn asset_bundle(self, name: &str, preload: &[PPtr], container: &[(&str, AssetInfo)]) -> Vec<u8> {
        let mut writer = self.aligned_string(name).i32(preload.len() as i32);
        for p in preload {
            writer = writer.pptr(*p);
        }
        writer = writer.i32(container.len() as i32);
        for (path, info) in container {
            writer = writer
                .aligned_string(path)
                .i32(info.preload_index)
                .i32(info.preload_size)
                .pptr(info.asset);
        }
        writer.finish()
    }
}
