use std::cell::Cell;
use std::rc::Rc;

use crate::object_model::VersionedDict;
use crate::value::Value;

/// Cache entry for a global-name-load site. Valid iff its stored version
/// equals `max(globals.version(), builtins.version())` at the moment of
/// use — merging the two dictionaries' versions into one number means the
/// hit path is a single equality check instead of two.
pub struct GlobalsCacheEntry {
    name: Rc<str>,
    version: Cell<u64>,
    cached: Cell<Value>,
}

impl GlobalsCacheEntry {
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

    /// Resolve against `globals` then `builtins`, revalidating the merged
    /// version. `None` means the name is bound in neither dictionary.
    pub fn get(&self, globals: &dyn VersionedDict, builtins: &dyn VersionedDict) -> Option<Value> {
        let merged = globals.version().max(builtins.version());
        if self.version.get() == merged && !self.cached.get().is_null() {
            return Some(self.cached.get());
        }
        let value = globals.get(&self.name).or_else(|| builtins.get(&self.name))?;
        self.cached.set(value);
        self.version.set(merged);
        Some(value)
    }
}
