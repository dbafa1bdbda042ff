//! Serialized file metadata: type table, object table and externals

use binrw::Endian;
use tracing::trace;

use super::error::{Result, SerializedError};
use super::header::SerializedHeader;
use super::object::ObjectReader;
use super::stream::StreamReader;
use crate::bundle::header::parse_engine_version;
use crate::class_id::ClassId;

/// Target platform value used by editor builds
pub const PLATFORM_NO_TARGET: i32 = -2;

/// Class id whose type entries carry a script id on newer formats
const MONO_BEHAVIOUR_ID: i32 = 114;

// Smallest encoding of one table record across supported versions
const MIN_TYPE_RECORD: u64 = 4;
const MIN_OBJECT_RECORD: u64 = 16;
const MIN_SCRIPT_RECORD: u64 = 8;
const MIN_EXTERNAL_RECORD: u64 = 22;

/// One entry of the type table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedType {
    /// Numeric class id
    pub class_id: i32,
    /// Whether the type was stripped at build time
    pub is_stripped: bool,
    /// Index into the script type table, -1 for none
    pub script_type_index: i16,
    /// Script hash for MonoBehaviour types
    pub script_id: Option<[u8; 16]>,
    /// Type tree hash
    pub old_type_hash: [u8; 16],
    /// Number of type tree nodes skipped while parsing
    pub type_tree_nodes: usize,
    /// Type dependencies, version 21 and later
    pub type_dependencies: Vec<i32>,
}

/// One entry of the object table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    /// File-local object id
    pub path_id: i64,
    /// Absolute offset of the object data
    pub byte_start: u64,
    /// Size of the object data
    pub byte_size: u32,
    /// Type table slot, or the class id itself on old formats
    pub type_id: i32,
    /// Object class
    pub class_id: ClassId,
}

/// An external file this file's pointers may refer to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentifier {
    /// Asset GUID
    pub guid: [u8; 16],
    /// Reference type
    pub kind: i32,
    /// Path as stored, e.g. `archive:/CAB-0123/CAB-0123`
    pub path_name: String,
}

impl FileIdentifier {
    /// Final path component, which matches the identifier of the loaded file
    pub fn file_name(&self) -> &str {
        self.path_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.path_name)
    }
}

/// A parsed serialized file
///
/// Owns its bytes so objects can be read on demand.
#[derive(Debug, Clone)]
pub struct SerializedFile {
    /// File name inside its bundle, e.g. `CAB-0123`
    pub identifier: String,
    /// Header
    pub header: SerializedHeader,
    /// Engine version string, e.g. `2019.4.40f1`
    pub unity_version: String,
    /// Build target
    pub target_platform: i32,
    /// Whether type trees are embedded
    pub enable_type_tree: bool,
    /// Type table
    pub types: Vec<SerializedType>,
    /// Objects in declaration order
    pub objects: Vec<ObjectInfo>,
    /// External file references, addressed by pointer `file_id - 1`
    pub externals: Vec<FileIdentifier>,
    data: Vec<u8>,
}

impl SerializedFile {
    /// Parse the header and metadata of a serialized file
    pub fn parse(identifier: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        let identifier = identifier.into();
        let mut reader = StreamReader::new(&data, Endian::Big);
        let header = SerializedHeader::read(&mut reader)?;
        if !header.matches_length(data.len()) {
            return Err(SerializedError::NotSerializedFile(format!(
                "{identifier}: declared size {} but {} bytes present",
                header.file_size,
                data.len()
            )));
        }

        let version = header.version;
        reader.set_endian(header.endian());

        let unity_version = reader.cstring()?;
        let target_platform = reader.i32()?;
        let enable_type_tree = if version >= 13 { reader.bool()? } else { true };

        let type_count = reader.table_count("type", MIN_TYPE_RECORD)?;
        let mut types = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            types.push(read_type(&mut reader, version, enable_type_tree)?);
        }

        let big_id_enabled = if (7..14).contains(&version) {
            reader.i32()? != 0
        } else {
            false
        };

        let object_count = reader.table_count("object", MIN_OBJECT_RECORD)?;
        let mut objects = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            objects.push(read_object_info(
                &mut reader,
                &header,
                &types,
                big_id_enabled,
            )?);
        }

        if version >= 11 {
            let script_count = reader.table_count("script type", MIN_SCRIPT_RECORD)?;
            for _ in 0..script_count {
                reader.i32()?;
                if version < 14 {
                    reader.i32()?;
                } else {
                    reader.align(4);
                    reader.i64()?;
                }
            }
        }

        let external_count = reader.table_count("external", MIN_EXTERNAL_RECORD)?;
        let mut externals = Vec::with_capacity(external_count);
        for _ in 0..external_count {
            reader.cstring()?; // empty on every supported version
            let guid = reader.bytes::<16>()?;
            let kind = reader.i32()?;
            let path_name = reader.cstring()?;
            externals.push(FileIdentifier {
                guid,
                kind,
                path_name,
            });
        }

        trace!(
            "Parsed {identifier}: version {version}, {} types, {} objects, {} externals",
            types.len(),
            objects.len(),
            externals.len()
        );

        Ok(Self {
            identifier,
            header,
            unity_version,
            target_platform,
            enable_type_tree,
            types,
            objects,
            externals,
            data,
        })
    }

    /// File names of the external dependencies, in table order
    pub fn dependencies(&self) -> Vec<&str> {
        self.externals.iter().map(FileIdentifier::file_name).collect()
    }

    /// Engine version as `[major, minor, patch]`
    pub fn engine_version(&self) -> [u32; 3] {
        parse_engine_version(&self.unity_version)
    }

    /// Look up an object by path id
    pub fn object(&self, path_id: i64) -> Option<&ObjectInfo> {
        self.objects.iter().find(|o| o.path_id == path_id)
    }

    /// Open a reader over one object's data
    pub fn object_reader(&self, info: &ObjectInfo) -> Result<ObjectReader<'_>> {
        let out_of_range = || SerializedError::ObjectOutOfRange {
            path_id: info.path_id,
            start: info.byte_start,
            size: info.byte_size,
        };
        let start = usize::try_from(info.byte_start).map_err(|_| out_of_range())?;
        let end = start
            .checked_add(info.byte_size as usize)
            .ok_or_else(out_of_range)?;
        let bytes = self.data.get(start..end).ok_or_else(out_of_range)?;

        Ok(ObjectReader::new(
            bytes,
            *info,
            self.header.endian(),
            self.header.version,
            self.engine_version(),
            self.target_platform,
        ))
    }
}

fn read_type(
    reader: &mut StreamReader<'_>,
    version: u32,
    enable_type_tree: bool,
) -> Result<SerializedType> {
    let class_id = reader.i32()?;
    let is_stripped = if version >= 16 { reader.bool()? } else { false };
    let script_type_index = if version >= 17 { reader.i16()? } else { -1 };

    let mut script_id = None;
    let mut old_type_hash = [0; 16];
    if version >= 13 {
        if (version < 16 && class_id < 0) || (version >= 16 && class_id == MONO_BEHAVIOUR_ID) {
            script_id = Some(reader.bytes::<16>()?);
        }
        old_type_hash = reader.bytes::<16>()?;
    }

    let mut type_tree_nodes = 0;
    let mut type_dependencies = Vec::new();
    if enable_type_tree {
        type_tree_nodes = if version >= 12 || version == 10 {
            skip_type_tree_blob(reader, version)?
        } else {
            skip_type_tree_legacy(reader)?
        };
        if version >= 21 {
            let count = reader.table_count("type dependency", 4)?;
            for _ in 0..count {
                type_dependencies.push(reader.i32()?);
            }
        }
    }

    Ok(SerializedType {
        class_id,
        is_stripped,
        script_type_index,
        script_id,
        old_type_hash,
        type_tree_nodes,
        type_dependencies,
    })
}

/// Skip a flat type tree: node array followed by a string buffer
fn skip_type_tree_blob(reader: &mut StreamReader<'_>, version: u32) -> Result<usize> {
    let node_count = reader.count("type tree node")?;
    let string_buffer_size = reader.count("type tree string")?;
    let node_size: i64 = if version >= 19 { 32 } else { 24 };
    reader.skip(node_size * node_count as i64 + string_buffer_size as i64)?;
    Ok(node_count)
}

/// Skip a recursive type tree as written by old formats
fn skip_type_tree_legacy(reader: &mut StreamReader<'_>) -> Result<usize> {
    let mut pending = 1usize;
    let mut visited = 0usize;
    while pending > 0 {
        pending -= 1;
        visited += 1;
        reader.cstring()?; // type
        reader.cstring()?; // name
        reader.i32()?; // byte size
        reader.i32()?; // index
        reader.i32()?; // type flags
        reader.i32()?; // version
        reader.i32()?; // meta flags
        pending += reader.count("type tree child")?;
    }
    Ok(visited)
}

fn read_object_info(
    reader: &mut StreamReader<'_>,
    header: &SerializedHeader,
    types: &[SerializedType],
    big_id_enabled: bool,
) -> Result<ObjectInfo> {
    let version = header.version;

    let path_id = if big_id_enabled {
        reader.i64()?
    } else if version < 14 {
        i64::from(reader.i32()?)
    } else {
        reader.align(4);
        reader.i64()?
    };

    let byte_start = if version >= 22 {
        reader.i64()?
    } else {
        i64::from(reader.u32()?)
    };
    let byte_size = reader.u32()?;
    let byte_start = byte_start
        .checked_add(header.data_offset)
        .and_then(|start| u64::try_from(start).ok())
        .ok_or(SerializedError::ObjectOutOfRange {
            path_id,
            start: byte_start as u64,
            size: byte_size,
        })?;
    let type_id = reader.i32()?;

    let class_id = if version < 16 {
        i32::from(reader.u16()?)
    } else {
        usize::try_from(type_id)
            .ok()
            .and_then(|slot| types.get(slot))
            .map(|t| t.class_id)
            .ok_or(SerializedError::InvalidTypeIndex {
                path_id,
                type_index: type_id,
            })?
    };

    if version < 11 {
        reader.u16()?; // is destroyed
    }
    if (11..17).contains(&version) {
        reader.i16()?; // script type index
    }
    if version == 15 || version == 16 {
        reader.u8()?; // stripped
    }

    Ok(ObjectInfo {
        path_id,
        byte_start,
        byte_size,
        type_id,
        class_id: ClassId::from_id(class_id),
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::serialized::builder::SerializedFileBuilder;
    use crate::serialized::header::is_serialized_file;
    use crate::serialized::stream::StreamWriter;
    use pretty_assertions::assert_eq;

    fn sample(builder: SerializedFileBuilder) -> Vec<u8> {
        let writer = builder.object_writer();
        builder
            .add_object(1, ClassId::Texture2D, writer.clone().named("diffuse"))
            .add_object(-7, ClassId::Mesh, writer.clone().named("body"))
            .add_object(9, ClassId::Texture2D, writer.named("normal"))
            .add_external("archive:/CAB-shared/CAB-shared")
            .add_external("library/unity default resources")
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_across_versions() {
        for version in [13, 14, 15, 16, 17, 19, 20, 21, 22] {
            for type_tree in [false, true] {
                let mut builder = SerializedFileBuilder::new().with_version(version);
                if type_tree {
                    builder = builder.with_type_tree();
                }
                let data = sample(builder);
                assert!(is_serialized_file(&data), "version {version}");

                let file = SerializedFile::parse("CAB-test", data).unwrap();
                assert_eq!(file.header.version, version);
                assert_eq!(file.enable_type_tree, type_tree);
                assert_eq!(file.unity_version, "2019.4.40f1");
                assert_eq!(file.types.len(), 2);

                let ids: Vec<i64> = file.objects.iter().map(|o| o.path_id).collect();
                assert_eq!(ids, vec![1, -7, 9], "version {version}");
                assert_eq!(file.objects[1].class_id, ClassId::Mesh);
                assert_eq!(
                    file.dependencies(),
                    vec!["CAB-shared", "unity default resources"]
                );
            }
        }
    }

    #[test]
    fn test_big_endian_metadata() {
        let data = sample(SerializedFileBuilder::new().with_big_endian());
        let file = SerializedFile::parse("CAB-be", data).unwrap();
        assert!(file.header.big_endian);

        let info = *file.object(9).unwrap();
        assert_eq!(file.object_reader(&info).unwrap().read_name().unwrap(), "normal");
    }

    #[test]
    fn test_object_offsets_point_at_payloads() {
        let data = sample(SerializedFileBuilder::new().with_version(17));
        let file = SerializedFile::parse("CAB-17", data).unwrap();

        let names: Vec<String> = file
            .objects
            .iter()
            .map(|info| file.object_reader(info).unwrap().read_name().unwrap())
            .collect();
        assert_eq!(names, vec!["diffuse", "body", "normal"]);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let mut data = sample(SerializedFileBuilder::new());
        data.push(0);
        assert!(matches!(
            SerializedFile::parse("CAB-long", data),
            Err(SerializedError::NotSerializedFile(_))
        ));
    }

    #[test]
    fn test_object_out_of_range() {
        let file = SerializedFile::parse("CAB-x", sample(SerializedFileBuilder::new())).unwrap();
        let mut info = file.objects[0];
        info.byte_size = u32::MAX;
        assert!(matches!(
            file.object_reader(&info),
            Err(SerializedError::ObjectOutOfRange { .. })
        ));
    }

    /// Little-endian metadata after a hand-written header, sizes patched in
    fn raw_file(version: u32, metadata: impl FnOnce(&mut StreamWriter)) -> Vec<u8> {
        let mut writer = StreamWriter::new(Endian::Big);
        let header_size = if version >= 22 { 48 } else { 20 };
        writer.bytes(&vec![0; header_size]);
        writer.set_endian(Endian::Little);
        metadata(&mut writer);
        let mut data = writer.into_inner();

        let len = data.len();
        let mut header = StreamWriter::new(Endian::Big);
        header.u32(0);
        header.u32(len as u32);
        header.u32(version);
        header.u32(len as u32);
        header.bytes(&[0; 4]);
        if version >= 22 {
            header.u32(0);
            header.i64(len as i64);
            header.i64(len as i64);
            header.i64(0);
        }
        let header = header.into_inner();
        data[..header.len()].copy_from_slice(&header);
        data
    }

    #[test]
    fn test_oversized_object_count_is_an_error() {
        let data = raw_file(17, |w| {
            w.cstring("");
            w.i32(0);
            w.u8(0);
            w.i32(0); // types
            w.i32(i32::MAX); // objects, none present
        });
        assert!(matches!(
            SerializedFile::parse("CAB-corrupt", data),
            Err(SerializedError::InvalidCount { what: "object", .. })
        ));
    }

    #[test]
    fn test_oversized_type_and_external_counts_are_errors() {
        let types = raw_file(17, |w| {
            w.cstring("");
            w.i32(0);
            w.u8(0);
            w.i32(0x4000_0000);
        });
        assert!(matches!(
            SerializedFile::parse("CAB-types", types),
            Err(SerializedError::InvalidCount { what: "type", .. })
        ));

        let externals = raw_file(17, |w| {
            w.cstring("");
            w.i32(0);
            w.u8(0);
            w.i32(0); // types
            w.i32(0); // objects
            w.i32(0); // script types
            w.i32(1000); // externals
            w.bytes(&[0; 21]);
        });
        assert!(matches!(
            SerializedFile::parse("CAB-externals", externals),
            Err(SerializedError::InvalidCount { what: "external", .. })
        ));
    }

    #[test]
    fn test_object_offset_overflow_is_an_error() {
        let data = raw_file(22, |w| {
            w.cstring("");
            w.i32(0);
            w.u8(0);
            w.i32(1); // types
            w.i32(ClassId::Texture2D.id());
            w.u8(0); // stripped
            w.i16(-1); // script type index
            w.bytes(&[0; 16]); // type hash
            w.i32(1); // objects
            w.align(4);
            w.i64(1); // path id
            w.i64(i64::MAX); // byte start
            w.u32(4);
            w.i32(0);
        });
        assert!(matches!(
            SerializedFile::parse("CAB-overflow", data),
            Err(SerializedError::ObjectOutOfRange { path_id: 1, .. })
        ));
    }

    #[test]
    fn test_builder_rejects_unsupported_version() {
        assert!(matches!(
            SerializedFileBuilder::new().with_version(9).build(),
            Err(SerializedError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_external_file_name() {
        let external = FileIdentifier {
            guid: [0; 16],
            kind: 0,
            path_name: "archive:/CAB-abc/CAB-abc".to_string(),
        };
        assert_eq!(external.file_name(), "CAB-abc");

        let bare = FileIdentifier {
            path_name: "CAB-bare".to_string(),
            ..external
        };
        assert_eq!(bare.file_name(), "CAB-bare");
    }
}
