//! Scene state consumed by render systems
//!
//! Objects, their transforms and materials, the camera and its controllers.
//! Meshes and textures live in [`AssetArena`]s and are referenced by handle.

pub mod assets;
pub mod camera;
pub mod controller;
pub mod game_object;
pub mod transform;

use std::collections::BTreeMap;

pub use assets::{AssetArena, ModelHandle, TextureHandle};
pub use camera::Camera;
pub use controller::{ArcballController, CameraController, KeyboardController, MouseController};
pub use game_object::{GameObject, IdGenerator, Material, ObjectId};
pub use transform::TransformComponent;

/// All objects of one scene, keyed and ordered by id
#[derive(Debug, Default)]
pub struct Scene {
    ids: IdGenerator,
    objects: BTreeMap<ObjectId, GameObject>,
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object and return it for setup
    pub fn spawn(&mut self) -> &mut GameObject {
        let object = self.ids.create();
        self.objects.entry(object.id()).or_insert(object)
    }

    /// Look up an object
    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    /// Look up an object mutably
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    /// Take an object out of the scene
    pub fn remove(&mut self, id: ObjectId) -> Option<GameObject> {
        self.objects.remove(&id)
    }

    /// Objects in id order
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.values()
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the scene is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
