//! Game objects and their materials

use super::assets::{ModelHandle, TextureHandle};
use super::transform::TransformComponent;
use crate::foundation::math::Vec3;
use crate::render::MaterialUbo;

/// Unique object identifier
pub type ObjectId = u32;

/// Monotonic source of [`ObjectId`]s
///
/// Owned by whoever owns the objects, usually a [`Scene`](super::Scene).
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: ObjectId,
}

impl IdGenerator {
    /// Start at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id
    pub fn next_id(&mut self) -> ObjectId {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }

    /// Create a fresh object with the next id
    pub fn create(&mut self) -> GameObject {
        GameObject::with_id(self.next_id())
    }
}

/// Physically based material parameters and optional texture maps
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Base color
    pub albedo: Vec3,
    /// Metalness in `0..=1`
    pub metallic: f32,
    /// Roughness in `0..=1`
    pub roughness: f32,
    /// Ambient occlusion in `0..=1`
    pub ao: f32,
    /// Overrides `albedo` when set
    pub albedo_map: Option<TextureHandle>,
    /// Overrides `metallic` when set
    pub metallic_map: Option<TextureHandle>,
    /// Overrides `roughness` when set
    pub roughness_map: Option<TextureHandle>,
    /// Overrides `ao` when set
    pub ao_map: Option<TextureHandle>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::new(1.0, 1.0, 1.0),
            metallic: 1.0,
            roughness: 1.0,
            ao: 1.0,
            albedo_map: None,
            metallic_map: None,
            roughness_map: None,
            ao_map: None,
        }
    }
}

impl Material {
    /// Uniform block for the material descriptor set
    pub fn to_ubo(&self) -> MaterialUbo {
        MaterialUbo {
            albedo: self.albedo.into(),
            metallic: self.metallic,
            roughness: self.roughness,
            ao: self.ao,
            ..MaterialUbo::default()
        }
    }

    /// Texture maps that are set, in binding order
    pub fn texture_maps(&self) -> impl Iterator<Item = TextureHandle> + '_ {
        [
            self.albedo_map,
            self.metallic_map,
            self.roughness_map,
            self.ao_map,
        ]
        .into_iter()
        .flatten()
    }
}

/// A drawable object
///
/// Objects are move-only; only an [`IdGenerator`] creates them, so ids never
/// repeat within one generator.
#[derive(Debug)]
pub struct GameObject {
    id: ObjectId,
    /// Mesh to draw, if any
    pub model: Option<ModelHandle>,
    /// Flat color used when no material texture is bound
    pub color: Vec3,
    /// Placement in the world
    pub transform: TransformComponent,
    /// Diffuse texture
    pub texture: Option<TextureHandle>,
    /// Shading parameters
    pub material: Material,
}

impl GameObject {
    fn with_id(id: ObjectId) -> Self {
        Self {
            id,
            model: None,
            color: Vec3::zeros(),
            transform: TransformComponent::default(),
            texture: None,
            material: Material::default(),
        }
    }

    /// This object's id
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::assets::AssetArena;

    #[test]
    fn test_ids_are_monotonic() {
        let mut ids = IdGenerator::new();
        let a = ids.create();
        let b = ids.create();
        assert_eq!(a.id(), 0);
        assert_eq!(b.id(), 1);
        assert_eq!(ids.next_id(), 2);
    }

    #[test]
    fn test_material_ubo_matches_fields() {
        let material = Material {
            albedo: Vec3::new(0.2, 0.4, 0.6),
            metallic: 0.1,
            roughness: 0.7,
            ao: 0.9,
            ..Material::default()
        };
        let ubo = material.to_ubo();
        assert_eq!(ubo.albedo, [0.2, 0.4, 0.6]);
        assert_eq!(ubo.metallic, 0.1);
        assert_eq!(ubo.roughness, 0.7);
        assert_eq!(ubo.ao, 0.9);
        assert_eq!(Material::default().to_ubo(), MaterialUbo::default());
    }

    #[test]
    fn test_texture_maps_skips_unset() {
        let mut textures: AssetArena<TextureHandle, ()> = AssetArena::new();
        let albedo = textures.insert(());
        let ao = textures.insert(());
        let material = Material {
            albedo_map: Some(albedo),
            ao_map: Some(ao),
            ..Material::default()
        };
        assert_eq!(material.texture_maps().collect::<Vec<_>>(), vec![albedo, ao]);
    }
}
