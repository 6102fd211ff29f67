use fxhash::FxHashMap;
use tracing::trace;

use crate::value::{Object, ObjectId, ObjectKind, Property, Value};

/// Clone a value graph.
///
/// The result is structurally equal to `value` and shares no object with it,
/// with two exceptions: functions and host handles are returned by reference,
/// and prototypes are shared rather than copied. Cycles and shared subgraphs
/// are reproduced with the same shape.
///
/// ```
/// use graph::{deep_clone, Object, Value};
///
/// let a = Object::plain();
/// a.set("self", a.clone());
///
/// let b = deep_clone(&Value::from(a.clone()));
/// let b = b.as_object().unwrap();
/// assert!(!b.ptr_eq(&a));
/// assert_eq!(b.get("self"), Value::from(b.clone()));
/// ```
pub fn deep_clone(value: &Value) -> Value {
    Cloner::default().clone_value(value)
}

/// Visited map for one top-level clone. Each source object is registered
/// before its contents are copied so back-references resolve to the
/// in-progress clone.
#[derive(Default)]
struct Cloner {
    seen: FxHashMap<ObjectId, Object>,
}

impl Cloner {
    fn clone_value(&mut self, value: &Value) -> Value {
        match value {
            Value::Object(obj) => Value::Object(self.clone_object(obj)),
            // Functions, host handles and primitives are shared as-is.
            other => other.clone(),
        }
    }

    fn clone_object(&mut self, source: &Object) -> Object {
        if let Some(existing) = self.seen.get(&source.id()) {
            return existing.clone();
        }

        let (shell_kind, prototype, extensible) = {
            let data = source.borrow();
            let kind = match &data.kind {
                ObjectKind::Plain => ObjectKind::Plain,
                ObjectKind::Array => ObjectKind::Array,
                ObjectKind::Map(_) => ObjectKind::Map(Vec::new()),
                ObjectKind::Set(_) => ObjectKind::Set(Vec::new()),
                ObjectKind::Date(ms) => ObjectKind::Date(*ms),
                ObjectKind::RegExp { source, flags, .. } => ObjectKind::RegExp {
                    source: source.clone(),
                    flags: flags.clone(),
                    last_index: 0,
                },
            };
            (kind, data.prototype.clone(), data.extensible)
        };

        let target = Object::with_prototype(shell_kind, prototype);
        self.seen.insert(source.id(), target.clone());
        trace!(kind = target.kind_name(), id = source.id(), "cloning object");

        // Snapshot the source so getters or nested clones never observe a
        // live borrow.
        let (entries, members, properties) = {
            let data = source.borrow();
            let entries = match &data.kind {
                ObjectKind::Map(entries) => entries.clone(),
                _ => Vec::new(),
            };
            let members = match &data.kind {
                ObjectKind::Set(values) => values.clone(),
                _ => Vec::new(),
            };
            (entries, members, data.properties.clone())
        };

        for (key, value) in &entries {
            let key = self.clone_value(key);
            let value = self.clone_value(value);
            if let ObjectKind::Map(out) = &mut target.borrow_mut().kind {
                out.push((key, value));
            }
        }
        for value in &members {
            let value = self.clone_value(value);
            if let ObjectKind::Set(out) = &mut target.borrow_mut().kind {
                out.push(value);
            }
        }

        for (key, property) in properties {
            let property = match property {
                Property::Data {
                    value,
                    writable,
                    enumerable,
                    configurable,
                } => Property::Data {
                    value: self.clone_value(&value),
                    writable,
                    enumerable,
                    configurable,
                },
                accessor @ Property::Accessor { .. } => accessor,
            };
            target.borrow_mut().properties.push((key, property));
        }

        target.borrow_mut().extensible = extensible;
        target
    }
}
