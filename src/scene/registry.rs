use std::collections::HashMap;

use crate::types::ClassId;

use super::error::SceneError;
use super::replica::Replica;

type Factory = Box<dyn Fn() -> Box<dyn Replica> + Send + Sync>;

/// Maps numeric class ids to entity constructors.
///
/// An explicit context object handed to the apply paths — not a global — so
/// tests can substitute fakes. Materializing an unknown id is a typed error,
/// never a crash.
#[derive(Default)]
pub struct ClassRegistry {
    factories: HashMap<ClassId, Factory>,
    names: HashMap<String, ClassId>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        class_id: ClassId,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn Replica> + Send + Sync + 'static,
    ) {
        self.factories.insert(class_id, Box::new(factory));
        self.names.insert(name.into(), class_id);
    }

    /// Constructs a fresh entity of the given class.
    pub fn create(&self, class_id: ClassId) -> Result<Box<dyn Replica>, SceneError> {
        match self.factories.get(&class_id) {
            Some(factory) => Ok(factory()),
            None => Err(SceneError::UnknownClass { class_id }),
        }
    }

    /// Resolves a class name back to its numeric id.
    pub fn id_of(&self, name: &str) -> Option<ClassId> {
        self.names.get(name).copied()
    }

    pub fn contains(&self, class_id: ClassId) -> bool {
        self.factories.contains_key(&class_id)
    }
}
