//! Field reader over a single object's data

use binrw::Endian;

use super::error::Result;
use super::file::{ObjectInfo, PLATFORM_NO_TARGET};
use super::stream::StreamReader;
use crate::class_id::ClassId;

/// First format version with 64-bit path ids in pointers
const WIDE_PATH_ID_VERSION: u32 = 14;

/// Pointer to an object in this file (`file_id == 0`) or an external
/// (`externals[file_id - 1]`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PPtr {
    /// 0 for the same file, otherwise one past the external index
    pub file_id: i32,
    /// Path id inside the target file
    pub path_id: i64,
}

impl PPtr {
    /// Create a pointer
    pub fn new(file_id: i32, path_id: i64) -> Self {
        Self { file_id, path_id }
    }

    /// Check if the pointer refers to nothing
    pub fn is_null(&self) -> bool {
        self.path_id == 0
    }
}

/// A container entry of a bundle manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetInfo {
    /// First preload table slot belonging to this container
    pub preload_index: i32,
    /// Number of preload table slots
    pub preload_size: i32,
    /// Main asset
    pub asset: PPtr,
}

/// Fields of a bundle manifest object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetBundleData {
    /// Declared bundle name
    pub name: String,
    /// Every object the bundle references
    pub preload_table: Vec<PPtr>,
    /// Container paths and the preload slices they own, in file order
    pub container: Vec<(String, AssetInfo)>,
}

/// Fields of a scene-graph node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameObjectData {
    /// Attached components
    pub components: Vec<PPtr>,
    /// Layer index
    pub layer: i32,
    /// Node name
    pub name: String,
}

/// Reads fields of one object
///
/// Typed readers rewind to the start of the object, so they can be called in
/// any order.
#[derive(Debug, Clone)]
pub struct ObjectReader<'a> {
    reader: StreamReader<'a>,
    info: ObjectInfo,
    format_version: u32,
    engine_version: [u32; 3],
    platform: i32,
}

impl<'a> ObjectReader<'a> {
    /// Create a reader over `data`, the bytes of the object described by `info`
    pub fn new(
        data: &'a [u8],
        info: ObjectInfo,
        endian: Endian,
        format_version: u32,
        engine_version: [u32; 3],
        platform: i32,
    ) -> Self {
        Self {
            reader: StreamReader::new(data, endian),
            info,
            format_version,
            engine_version,
            platform,
        }
    }

    /// Object table entry
    pub fn info(&self) -> &ObjectInfo {
        &self.info
    }

    /// Object class
    pub fn class_id(&self) -> ClassId {
        self.info.class_id
    }

    /// File-local object id
    pub fn path_id(&self) -> i64 {
        self.info.path_id
    }

    /// Serialized file format version
    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// Engine version as `[major, minor, patch]`
    pub fn engine_version(&self) -> [u32; 3] {
        self.engine_version
    }

    /// Underlying primitive reader, positioned wherever the last read stopped
    pub fn stream(&mut self) -> &mut StreamReader<'a> {
        &mut self.reader
    }

    /// Rewind to the first field after the editor-only header
    pub fn reset(&mut self) -> Result<()> {
        self.reader.set_position(0);
        if self.platform == PLATFORM_NO_TARGET {
            self.reader.u32()?; // hide flags
            self.read_pptr()?; // prefab parent
            self.read_pptr()?; // prefab internal
        }
        Ok(())
    }

    /// Read an `i32` at the current position
    pub fn read_i32(&mut self) -> Result<i32> {
        self.reader.i32()
    }

    /// Read an aligned string at the current position
    pub fn read_aligned_string(&mut self) -> Result<String> {
        self.reader.aligned_string()
    }

    /// Read a pointer at the current position
    pub fn read_pptr(&mut self) -> Result<PPtr> {
        let file_id = self.reader.i32()?;
        let path_id = if self.format_version < WIDE_PATH_ID_VERSION {
            i64::from(self.reader.i32()?)
        } else {
            self.reader.i64()?
        };
        Ok(PPtr { file_id, path_id })
    }

    fn read_pptr_array(&mut self) -> Result<Vec<PPtr>> {
        let count = self.reader.count("pointer")?;
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            out.push(self.read_pptr()?);
        }
        Ok(out)
    }

    /// Read the leading `m_Name` shared by every named object
    pub fn read_name(&mut self) -> Result<String> {
        self.reset()?;
        self.read_aligned_string()
    }

    /// Read a scene-graph node
    pub fn read_game_object(&mut self) -> Result<GameObjectData> {
        self.reset()?;
        let count = self.reader.count("component")?;
        let mut components = Vec::with_capacity(count.min(4096));
        let [major, minor, _] = self.engine_version;
        let paired = major < 5 || (major == 5 && minor < 5);
        for _ in 0..count {
            if paired {
                self.reader.i32()?; // class id
            }
            components.push(self.read_pptr()?);
        }
        let layer = self.reader.i32()?;
        let name = self.read_aligned_string()?;
        Ok(GameObjectData {
            components,
            layer,
            name,
        })
    }

    /// Read the owning scene-graph node of a component such as an Animator
    pub fn read_component_owner(&mut self) -> Result<PPtr> {
        self.reset()?;
        self.read_pptr()
    }

    /// Read a bundle manifest
    pub fn read_asset_bundle(&mut self) -> Result<AssetBundleData> {
        let name = self.read_name()?;
        let preload_table = self.read_pptr_array()?;

        let count = self.reader.count("container")?;
        let mut container = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let path = self.read_aligned_string()?;
            let preload_index = self.reader.i32()?;
            let preload_size = self.reader.i32()?;
            let asset = self.read_pptr()?;
            container.push((
                path,
                AssetInfo {
                    preload_index,
                    preload_size,
                    asset,
                },
            ));
        }

        Ok(AssetBundleData {
            name,
            preload_table,
            container,
        })
    }
}
