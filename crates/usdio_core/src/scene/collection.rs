use super::ObjectId;

/// Index of a collection inside its scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(pub(crate) usize);

/// A named group of objects; collections nest.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Collection {
    pub name: String,
    pub objects: Vec<ObjectId>,
    pub children: Vec<CollectionId>,
    pub parent: Option<CollectionId>,
    /// Hidden collections exclude their objects and children from view.
    pub hidden: bool,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn contains(&self, object: ObjectId) -> bool {
        self.objects.contains(&object)
    }
}
