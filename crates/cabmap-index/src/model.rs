//! Hooks into the full object model

use cabmap_formats::serialized::ObjectReader;

/// Typed object parsing beyond the fields the resolver reads itself
///
/// The resolver only understands names, scene-graph nodes, component owners
/// and bundle manifests. Anything deeper is delegated here.
pub trait ObjectModel {
    /// Name stored in a shader's parsed form, used when `m_Name` is empty
    ///
    /// The reader is positioned right after the empty `m_Name`.
    fn parsed_shader_name(&self, _reader: &mut ObjectReader<'_>) -> Option<String> {
        None
    }
}

impl<T: ObjectModel + ?Sized> ObjectModel for &T {
    fn parsed_shader_name(&self, reader: &mut ObjectReader<'_>) -> Option<String> {
        (**self).parsed_shader_name(reader)
    }
}

/// Model without any typed parsers; shaders with an empty `m_Name` stay unnamed
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinObjectModel;

impl ObjectModel for BuiltinObjectModel {}
