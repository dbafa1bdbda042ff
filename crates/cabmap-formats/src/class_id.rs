//! Unity class ids
//!
//! Only the ids the asset map cares about get a named variant, everything else
//! is carried as [`ClassId::Unknown`].

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Numeric Unity class id with a symbolic name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClassId {
    /// Scene-graph node
    GameObject,
    /// Transform component
    Transform,
    /// Material
    Material,
    /// Texture2D
    Texture2D,
    /// Mesh
    Mesh,
    /// Shader
    Shader,
    /// TextAsset
    TextAsset,
    /// AnimationClip
    AnimationClip,
    /// AudioClip
    AudioClip,
    /// Animator component
    Animator,
    /// MonoBehaviour
    MonoBehaviour,
    /// MonoScript
    MonoScript,
    /// Font
    Font,
    /// Bundle manifest
    AssetBundle,
    /// MovieTexture
    MovieTexture,
    /// RectTransform component
    RectTransform,
    /// Sprite
    Sprite,
    /// VideoClip
    VideoClip,
    /// Any id without a named variant
    Unknown(i32),
}

/// Named variants and their numeric ids
const NAMED: &[(ClassId, i32, &str)] = &[
    (ClassId::GameObject, 1, "GameObject"),
    (ClassId::Transform, 4, "Transform"),
    (ClassId::Material, 21, "Material"),
    (ClassId::Texture2D, 28, "Texture2D"),
    (ClassId::Mesh, 43, "Mesh"),
    (ClassId::Shader, 48, "Shader"),
    (ClassId::TextAsset, 49, "TextAsset"),
    (ClassId::AnimationClip, 74, "AnimationClip"),
    (ClassId::AudioClip, 83, "AudioClip"),
    (ClassId::Animator, 95, "Animator"),
    (ClassId::MonoBehaviour, 114, "MonoBehaviour"),
    (ClassId::MonoScript, 115, "MonoScript"),
    (ClassId::Font, 128, "Font"),
    (ClassId::AssetBundle, 142, "AssetBundle"),
    (ClassId::MovieTexture, 152, "MovieTexture"),
    (ClassId::RectTransform, 224, "RectTransform"),
    (ClassId::Sprite, 213, "Sprite"),
    (ClassId::VideoClip, 329, "VideoClip"),
];

/// Types the asset map will consider at all
pub const EXPORTABLE: &[ClassId] = &[
    ClassId::GameObject,
    ClassId::Material,
    ClassId::Texture2D,
    ClassId::Mesh,
    ClassId::Shader,
    ClassId::TextAsset,
    ClassId::AnimationClip,
    ClassId::AudioClip,
    ClassId::Animator,
    ClassId::Font,
    ClassId::AssetBundle,
    ClassId::MovieTexture,
    ClassId::Sprite,
    ClassId::VideoClip,
];

impl ClassId {
    /// Map a numeric id
    pub fn from_id(id: i32) -> Self {
        NAMED
            .iter()
            .find(|(_, n, _)| *n == id)
            .map_or(Self::Unknown(id), |(class, _, _)| *class)
    }

    /// Numeric id
    pub fn id(self) -> i32 {
        match self {
            Self::Unknown(id) => id,
            named => NAMED
                .iter()
                .find(|(class, _, _)| *class == named)
                .map_or(-1, |(_, id, _)| *id),
        }
    }

    /// Symbolic name, `None` for unknown ids
    pub fn name(self) -> Option<&'static str> {
        NAMED
            .iter()
            .find(|(class, _, _)| *class == self)
            .map(|(_, _, name)| *name)
    }

    /// Check the exportable allowlist
    pub fn is_exportable(self) -> bool {
        EXPORTABLE.contains(&self)
    }
}

impl From<i32> for ClassId {
    fn from(id: i32) -> Self {
        Self::from_id(id)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.id()),
        }
    }
}

/// Error returned when a type name is not recognized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown class type: {0}")]
pub struct UnknownClassName(pub String);

impl FromStr for ClassId {
    type Err = UnknownClassName;

    /// Accepts symbolic names in any case, or a numeric id
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i32>() {
            return Ok(Self::from_id(id));
        }
        NAMED
            .iter()
            .find(|(_, _, name)| name.eq_ignore_ascii_case(s))
            .map(|(class, _, _)| *class)
            .ok_or_else(|| UnknownClassName(s.to_string()))
    }
}

impl Serialize for ClassId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        for (class, id, _) in NAMED {
            assert_eq!(ClassId::from_id(*id), *class);
            assert_eq!(class.id(), *id);
        }
        assert_eq!(ClassId::from_id(9999), ClassId::Unknown(9999));
        assert_eq!(ClassId::Unknown(9999).id(), 9999);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("shader".parse::<ClassId>().unwrap(), ClassId::Shader);
        assert_eq!("TEXTURE2D".parse::<ClassId>().unwrap(), ClassId::Texture2D);
        assert_eq!("95".parse::<ClassId>().unwrap(), ClassId::Animator);
        assert!("Nonsense".parse::<ClassId>().is_err());
    }

    #[test]
    fn test_exportable_allowlist() {
        assert!(ClassId::Animator.is_exportable());
        assert!(ClassId::AssetBundle.is_exportable());
        assert!(!ClassId::MonoBehaviour.is_exportable());
        assert!(!ClassId::Transform.is_exportable());
        assert!(!ClassId::Unknown(7).is_exportable());
    }

    #[test]
    fn test_display() {
        assert_eq!(ClassId::Sprite.to_string(), "Sprite");
        assert_eq!(ClassId::Unknown(7).to_string(), "7");
    }
}
