use std::cell::Cell;
use std::rc::Rc;

use crate::object_model::VersionedDict;
use crate::value::Value;

/// Cache entry for `module.attr`-style lookups. Revalidated against the
/// module dictionary's monotonic version tag rather than a type-identity
/// check, since a module has no subtype hierarchy to worry about.
pub struct ModuleAttrEntry {
    name: Rc<str>,
    version: Cell<u64>,
    cached: Cell<Value>,
}

impl ModuleAttrEntry {
    #[must_use]
    pub fn new(name: Rc<str>) -> Self {
        Self {
            name,
            version: Cell::new(0),
            cached: Cell::new(Value::NULL),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate against `module` and return the cached value on a hit,
    /// re-filling the entry on a miss. A `None` result means the name is
    /// genuinely absent from the module (the caller should raise the
    /// equivalent of an `AttributeError` through `ErrorSink`).
    pub fn get(&self, module: &dyn VersionedDict) -> Option<Value> {
        if self.version.get() == module.version() && !self.cached.get().is_null() {
            return Some(self.cached.get());
        }
        let value = module.get(&self.name)?;
        self.cached.set(value);
        self.version.set(module.version());
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeModule {
        version: Cell<u64>,
        values: RefCell<HashMap<String, Value>>,
    }

    impl VersionedDict for FakeModule {
        fn version(&self) -> u64 {
            self.version.get()
        }
        fn get(&self, name: &str) -> Option<Value> {
            self.values.borrow().get(name).copied()
        }
    }

    #[test]
    fn rebind_bumps_version_and_invalidates() {
        let module = FakeModule {
            version: Cell::new(1),
            values: RefCell::new(HashMap::from([("f".to_string(), Value::from_int(1))])),
        };
        let entry = ModuleAttrEntry::new(Rc::from("f"));

        assert_eq!(entry.get(&module), Some(Value::from_int(1)));
        assert_eq!(entry.get(&module), Some(Value::from_int(1)));

        module.values.borrow_mut().insert("f".to_string(), Value::from_int(2));
        module.version.set(2);

        assert_eq!(entry.get(&module), Some(Value::from_int(2)));
    }
}
