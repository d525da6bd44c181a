//! Handle-keyed asset storage
//!
//! Game objects refer to models and textures through generational handles.
//! A stale handle simply resolves to `None`; the arena owns every asset and
//! releases them all on [`AssetArena::clear`] or drop.

use slotmap::{Key, SlotMap};

slotmap::new_key_type! {
    /// Handle to a loaded model
    pub struct ModelHandle;
    /// Handle to a loaded texture
    pub struct TextureHandle;
}

/// Arena of assets of one kind
pub struct AssetArena<K: Key, T> {
    assets: SlotMap<K, T>,
}

impl<K: Key, T> AssetArena<K, T> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self {
            assets: SlotMap::with_key(),
        }
    }

    /// Take ownership of an asset
    pub fn insert(&mut self, asset: T) -> K {
        self.assets.insert(asset)
    }

    /// Look up a live asset
    pub fn get(&self, handle: K) -> Option<&T> {
        self.assets.get(handle)
    }

    /// Look up a live asset mutably
    pub fn get_mut(&mut self, handle: K) -> Option<&mut T> {
        self.assets.get_mut(handle)
    }

    /// Release one asset, returning it if the handle was live
    pub fn remove(&mut self, handle: K) -> Option<T> {
        self.assets.remove(handle)
    }

    /// Whether `handle` still refers to a live asset
    pub fn contains(&self, handle: K) -> bool {
        self.assets.contains_key(handle)
    }

    /// Release every asset
    pub fn clear(&mut self) {
        let released = self.assets.len();
        self.assets.clear();
        if released > 0 {
            log::debug!("Released {released} assets");
        }
    }

    /// Number of live assets
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether the arena holds nothing
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Iterate live assets with their handles
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.assets.iter()
    }
}

impl<K: Key, T> Default for AssetArena<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
