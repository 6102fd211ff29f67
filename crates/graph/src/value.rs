//! Dynamic values and shared, mutable objects.
//!
//! Objects are reference-counted cells compared by identity. Their own
//! properties keep full descriptors (data or accessor, plus the writable,
//! enumerable and configurable flags) and may be keyed by strings or symbols.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A dynamic value.
///
/// `PartialEq` is strict equality: numbers by `==` (so `NaN != NaN`), strings
/// by content, everything else by identity. Use
/// [`deep_equal`](crate::deep_equal) for structural comparison.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Symbol),
    Object(Object),
    Function(Function),
    /// Opaque handle owned by the embedding environment.
    Host(HostHandle),
}

impl Value {
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, Value::Object(_) | Value::Function(_) | Value::Host(_))
    }

    /// SameValue: like strict equality, but `NaN` equals itself and `-0`
    /// differs from `+0`.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan())
                    || (a == b && a.is_sign_negative() == b.is_sign_negative())
            }
            _ => self == other,
        }
    }

    /// SameValueZero: strict equality except that `NaN` equals `NaN`.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Host(a), Value::Host(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Symbol(sym) => sym.fmt(f),
            Value::Object(obj) => obj.fmt(f),
            Value::Function(func) => func.fmt(f),
            Value::Host(host) => host.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<Symbol> for Value {
    fn from(value: Symbol) -> Self {
        Value::Symbol(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value::Function(value)
    }
}

impl From<HostHandle> for Value {
    fn from(value: HostHandle) -> Self {
        Value::Host(value)
    }
}

/// A unique symbol; two symbols are equal only if they are the same symbol.
#[derive(Clone)]
pub struct Symbol(Rc<Option<String>>);

impl Symbol {
    pub fn new(description: impl Into<String>) -> Self {
        Symbol(Rc::new(Some(description.into())))
    }

    pub fn anonymous() -> Self {
        Symbol(Rc::new(None))
    }

    pub fn description(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description().unwrap_or(""))
    }
}

type NativeFn = dyn Fn(&Value, &[Value]) -> Value;

/// A callable value. Functions are never cloned structurally.
#[derive(Clone)]
pub struct Function(Rc<FunctionInner>);

struct FunctionInner {
    name: String,
    body: Box<NativeFn>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&Value, &[Value]) -> Value + 'static,
    ) -> Self {
        Function(Rc::new(FunctionInner {
            name: name.into(),
            body: Box::new(body),
        }))
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Value {
        (self.0.body)(this, args)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function {}]", self.0.name)
    }
}

/// Opaque resource owned by the host (socket, DOM node, ...).
#[derive(Clone)]
pub struct HostHandle(Rc<dyn Any>);

impl HostHandle {
    pub fn new<T: Any>(value: T) -> Self {
        HostHandle(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn ptr_eq(&self, other: &HostHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Host {:p}]", Rc::as_ptr(&self.0))
    }
}

/// Own-property key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(Rc<str>),
    Symbol(Symbol),
}

impl PropertyKey {
    /// Canonical array index, if this key is one ("0", "1", ... but not "01").
    pub fn array_index(&self) -> Option<u32> {
        let PropertyKey::String(s) = self else {
            return None;
        };
        let index: u32 = s.parse().ok()?;
        (index != u32::MAX && index.to_string() == **s).then_some(index)
    }
}

impl From<&str> for PropertyKey {
    fn from(value: &str) -> Self {
        PropertyKey::String(Rc::from(value))
    }
}

impl From<String> for PropertyKey {
    fn from(value: String) -> Self {
        PropertyKey::String(Rc::from(value))
    }
}

impl From<Symbol> for PropertyKey {
    fn from(value: Symbol) -> Self {
        PropertyKey::Symbol(value)
    }
}

impl From<&Symbol> for PropertyKey {
    fn from(value: &Symbol) -> Self {
        PropertyKey::Symbol(value.clone())
    }
}

/// A property descriptor.
#[derive(Clone, Debug)]
pub enum Property {
    Data {
        value: Value,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<Function>,
        set: Option<Function>,
        enumerable: bool,
        configurable: bool,
    },
}

impl Property {
    /// Writable, enumerable, configurable data property.
    pub fn data(value: impl Into<Value>) -> Self {
        Property::Data {
            value: value.into(),
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    pub fn enumerable(&self) -> bool {
        match self {
            Property::Data { enumerable, .. } | Property::Accessor { enumerable, .. } => {
                *enumerable
            }
        }
    }

    pub fn configurable(&self) -> bool {
        match self {
            Property::Data { configurable, .. } | Property::Accessor { configurable, .. } => {
                *configurable
            }
        }
    }
}

/// What kind of object this is, with any internal slots it carries.
#[derive(Clone, Debug)]
pub enum ObjectKind {
    Plain,
    Array,
    /// Insertion-ordered entries; keys compare with SameValueZero.
    Map(Vec<(Value, Value)>),
    /// Insertion-ordered unique values (SameValueZero).
    Set(Vec<Value>),
    /// Milliseconds since the Unix epoch; `NaN` is an invalid date.
    Date(f64),
    RegExp {
        source: String,
        flags: String,
        last_index: usize,
    },
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Plain => "Object",
            ObjectKind::Array => "Array",
            ObjectKind::Map(_) => "Map",
            ObjectKind::Set(_) => "Set",
            ObjectKind::Date(_) => "Date",
            ObjectKind::RegExp { .. } => "RegExp",
        }
    }
}

/// The contents of an [`Object`].
#[derive(Debug)]
pub struct ObjectData {
    pub kind: ObjectKind,
    pub prototype: Option<Object>,
    /// Own properties in creation order.
    pub properties: Vec<(PropertyKey, Property)>,
    pub extensible: bool,
}

/// Identity of an object, stable while the object is alive.
pub type ObjectId = usize;

/// Shared handle to a mutable object. Clones are the same object.
#[derive(Clone)]
pub struct Object(Rc<RefCell<ObjectData>>);

impl Object {
    pub fn with_prototype(kind: ObjectKind, prototype: Option<Object>) -> Self {
        Object(Rc::new(RefCell::new(ObjectData {
            kind,
            prototype,
            properties: Vec::new(),
            extensible: true,
        })))
    }

    pub fn new(kind: ObjectKind) -> Self {
        Self::with_prototype(kind, None)
    }

    pub fn plain() -> Self {
        Self::new(ObjectKind::Plain)
    }

    pub fn array(values: impl IntoIterator<Item = Value>) -> Self {
        let array = Self::new(ObjectKind::Array);
        array.define_property(
            "length",
            Property::Data {
                value: Value::Number(0.0),
                writable: true,
                enumerable: false,
                configurable: false,
            },
        );
        for value in values {
            array.push(value);
        }
        array
    }

    pub fn new_map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let map = Self::new(ObjectKind::Map(Vec::new()));
        for (key, value) in entries {
            map.map_set(key, value);
        }
        map
    }

    pub fn new_set(values: impl IntoIterator<Item = Value>) -> Self {
        let set = Self::new(ObjectKind::Set(Vec::new()));
        for value in values {
            set.set_add(value);
        }
        set
    }

    pub fn date(epoch_ms: f64) -> Self {
        Self::new(ObjectKind::Date(epoch_ms))
    }

    pub fn regexp(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self::new(ObjectKind::RegExp {
            source: source.into(),
            flags: flags.into(),
            last_index: 0,
        })
    }

    pub fn id(&self) -> ObjectId {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn borrow(&self) -> Ref<'_, ObjectData> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, ObjectData> {
        self.0.borrow_mut()
    }

    pub fn prototype(&self) -> Option<Object> {
        self.borrow().prototype.clone()
    }

    pub fn kind_name(&self) -> &'static str {
        self.borrow().kind.name()
    }

    pub fn is_extensible(&self) -> bool {
        self.borrow().extensible
    }

    pub fn prevent_extensions(&self) {
        self.borrow_mut().extensible = false;
    }

    pub fn own_property(&self, key: impl Into<PropertyKey>) -> Option<Property> {
        let key = key.into();
        self.borrow()
            .properties
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, p)| p.clone())
    }

    /// Create or replace an own property. Returns false when adding a new
    /// property to a non-extensible object or redefining a non-configurable one.
    pub fn define_property(&self, key: impl Into<PropertyKey>, property: Property) -> bool {
        let key = key.into();
        let mut data = self.borrow_mut();
        if let Some(slot) = data.properties.iter_mut().find(|(k, _)| *k == key) {
            if !slot.1.configurable() {
                // Non-configurable data properties may still change value if writable.
                return match (&mut slot.1, property) {
                    (
                        Property::Data {
                            value, writable: true, ..
                        },
                        Property::Data { value: new, .. },
                    ) => {
                        *value = new;
                        true
                    }
                    _ => false,
                };
            }
            slot.1 = property;
            return true;
        }
        if !data.extensible {
            return false;
        }
        data.properties.push((key, property));
        true
    }

    pub fn delete(&self, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        let mut data = self.borrow_mut();
        match data.properties.iter().position(|(k, _)| *k == key) {
            Some(pos) if data.properties[pos].1.configurable() => {
                data.properties.remove(pos);
                true
            }
            Some(_) => false,
            None => true,
        }
    }

    /// Property lookup along the prototype chain. Getters run with this
    /// object as receiver.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Value {
        let key = key.into();
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            match obj.own_property(key.clone()) {
                Some(Property::Data { value, .. }) => return value,
                Some(Property::Accessor { get, .. }) => {
                    return get.map_or(Value::Undefined, |getter| {
                        getter.call(&Value::Object(self.clone()), &[])
                    });
                }
                None => current = obj.prototype(),
            }
        }
        Value::Undefined
    }

    /// Assign an own property: writes a writable data property, calls a
    /// setter, or adds a new data property. Returns false if refused.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        match self.own_property(key.clone()) {
            Some(Property::Data { writable: false, .. }) => false,
            Some(Property::Data { .. }) => {
                let mut data = self.borrow_mut();
                if let Some((_, Property::Data { value: slot, .. })) =
                    data.properties.iter_mut().find(|(k, _)| *k == key)
                {
                    *slot = value;
                }
                true
            }
            Some(Property::Accessor { set: Some(setter), .. }) => {
                setter.call(&Value::Object(self.clone()), &[value]);
                true
            }
            Some(Property::Accessor { set: None, .. }) => false,
            None => self.define_property(key, Property::data(value)),
        }
    }

    /// Own keys in property order: array indices ascending, then other
    /// strings in creation order, then symbols in creation order.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let data = self.borrow();
        let mut indices: Vec<(u32, PropertyKey)> = Vec::new();
        let mut strings = Vec::new();
        let mut symbols = Vec::new();
        for (key, _) in &data.properties {
            match key {
                PropertyKey::Symbol(_) => symbols.push(key.clone()),
                PropertyKey::String(_) => match key.array_index() {
                    Some(i) => indices.push((i, key.clone())),
                    None => strings.push(key.clone()),
                },
            }
        }
        indices.sort_by_key(|(i, _)| *i);
        indices
            .into_iter()
            .map(|(_, k)| k)
            .chain(strings)
            .chain(symbols)
            .collect()
    }

    /// Array length; `None` for non-arrays.
    pub fn array_len(&self) -> Option<usize> {
        if !matches!(self.borrow().kind, ObjectKind::Array) {
            return None;
        }
        self.own_property("length").and_then(|p| match p {
            Property::Data {
                value: Value::Number(n),
                ..
            } => Some(n as usize),
            _ => None,
        })
    }

    /// Append to an array. No-op on other kinds.
    pub fn push(&self, value: impl Into<Value>) {
        let Some(len) = self.array_len() else {
            return;
        };
        self.define_property(len.to_string(), Property::data(value));
        self.define_property(
            "length",
            Property::Data {
                value: Value::Number((len + 1) as f64),
                writable: true,
                enumerable: false,
                configurable: false,
            },
        );
    }

    /// Insert or replace a Map entry. No-op on other kinds.
    pub fn map_set(&self, key: Value, value: Value) {
        if let ObjectKind::Map(entries) = &mut self.borrow_mut().kind {
            match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }
        }
    }

    pub fn map_get(&self, key: &Value) -> Option<Value> {
        match &self.borrow().kind {
            ObjectKind::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.same_value_zero(key))
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// Add a Set member unless already present. No-op on other kinds.
    pub fn set_add(&self, value: Value) {
        if let ObjectKind::Set(values) = &mut self.borrow_mut().kind {
            if !values.iter().any(|v| v.same_value_zero(&value)) {
                values.push(value);
            }
        }
    }

    pub fn set_has(&self, value: &Value) -> bool {
        match &self.borrow().kind {
            ObjectKind::Set(values) => values.iter().any(|v| v.same_value_zero(value)),
            _ => false,
        }
    }

    /// Entry count of a Map or Set.
    pub fn size(&self) -> Option<usize> {
        match &self.borrow().kind {
            ObjectKind::Map(entries) => Some(entries.len()),
            ObjectKind::Set(values) => Some(values.len()),
            _ => None,
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shallow on purpose: graphs may be cyclic.
        match self.0.try_borrow() {
            Ok(data) => write!(
                f,
                "[{} {:#x}; {} props]",
                data.kind.name(),
                self.id(),
                data.properties.len()
            ),
            Err(_) => write!(f, "[Object {:#x}; borrowed]", self.id()),
        }
    }
}
