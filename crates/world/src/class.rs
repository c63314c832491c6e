use crate::entity::PropertyBag;
use std::collections::BTreeMap;
use zonesave_common::ClassRef;

/// Declared sub-object of a class: every instance gets one under this name.
///
/// Names are deterministic per class so a respawned runtime entity resolves
/// the same sub-object identities its saved record was keyed by.
#[derive(Debug, Clone)]
pub struct SubObjectSpec {
    pub name: String,
    pub persistable: bool,
    pub props: PropertyBag,
}

/// Constructed defaults for one entity class.
#[derive(Debug, Clone)]
pub struct ClassSpec {
    pub class: ClassRef,
    pub persistable: bool,
    /// Whether instances carry the runtime-save tracking component.
    pub runtime_tracked: bool,
    pub props: PropertyBag,
    pub sub_objects: Vec<SubObjectSpec>,
}

impl ClassSpec {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: ClassRef::new(class),
            persistable: true,
            runtime_tracked: false,
            props: PropertyBag::new(),
            sub_objects: Vec::new(),
        }
    }

    pub fn runtime_tracked(mut self) -> Self {
        self.runtime_tracked = true;
        self
    }

    pub fn not_persistable(mut self) -> Self {
        self.persistable = false;
        self
    }

    pub fn with_props(mut self, props: PropertyBag) -> Self {
        self.props = props;
        self
    }

    pub fn with_sub_object(mut self, name: impl Into<String>, props: PropertyBag) -> Self {
        self.sub_objects.push(SubObjectSpec {
            name: name.into(),
            persistable: true,
            props,
        });
        self
    }

    /// Short class name used to mint locally-unique runtime names.
    pub fn short_name(&self) -> &str {
        self.class
            .as_str()
            .rsplit(['/', '.'])
            .next()
            .unwrap_or(self.class.as_str())
    }
}

/// Registry of spawnable entity classes.
///
/// Class references in saved records resolve lazily against this registry;
/// an unregistered class simply fails to respawn.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<ClassRef, ClassSpec>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ClassSpec) {
        self.classes.insert(spec.class.clone(), spec);
    }

    pub fn get(&self, class: &ClassRef) -> Option<&ClassSpec> {
        self.classes.get(class)
    }
}
