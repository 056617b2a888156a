//! Surface materials and the world background.

use usdio_math::Vec3;

/// Index of a material inside its scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub(crate) usize);

/// Texture files driving material inputs. Paths are kept as authored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextureSlots {
    pub diffuse: Option<String>,
    pub roughness: Option<String>,
    pub metallic: Option<String>,
    pub normal: Option<String>,
    pub emissive: Option<String>,
}

impl TextureSlots {
    pub fn is_empty(&self) -> bool {
        [&self.diffuse, &self.roughness, &self.metallic, &self.normal, &self.emissive]
            .iter()
            .all(|slot| slot.is_none())
    }
}

/// A surface material with `UsdPreviewSurface` semantics.
///
/// Materials are shared between meshes by name; meshes refer to them by
/// [`MaterialId`].
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGB.
    pub diffuse_color: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive_color: Vec3,
    pub opacity: f32,
    pub ior: f32,
    pub textures: TextureSlots,
    /// Display with alpha blending; set when opacity is below one.
    pub blend_alpha: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse_color: Vec3::splat(0.18),
            metallic: 0.0,
            roughness: 0.5,
            emissive_color: Vec3::ZERO,
            opacity: 1.0,
            ior: 1.5,
            textures: TextureSlots::default(),
            blend_alpha: false,
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>, diffuse_color: Vec3) -> Self {
        Self {
            name: name.into(),
            diffuse_color,
            ..Default::default()
        }
    }

    pub fn has_textures(&self) -> bool {
        !self.textures.is_empty()
    }

    pub fn is_emissive(&self) -> bool {
        self.emissive_color != Vec3::ZERO || self.textures.emissive.is_some()
    }
}

/// The scene's world background.
#[derive(Clone, Debug, PartialEq)]
pub struct World {
    pub color: Vec3,
    pub strength: f32,
    /// Environment texture (latitude-longitude), if any.
    pub texture: Option<String>,
}

impl Default for World {
    fn default() -> Self {
        Self {
            color: Vec3::splat(0.05),
            strength: 1.0,
            texture: None,
        }
    }
}
