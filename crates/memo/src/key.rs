//! Cache keys.
//!
//! A memoization key is a path of [`KeySegment`]s, one per argument. Scalars
//! and strings compare by value; `Arc`s compare by pointer identity, so two
//! equal-but-distinct shared values are distinct keys unless a resolver maps
//! them to the same segment.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One level of a memoization key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeySegment {
    Unit,
    Absent,
    Bool(bool),
    Int(i128),
    /// Normalized `f64` bits: every NaN is the same key and `-0.0 == 0.0`.
    Float(u64),
    Char(char),
    Str(Arc<str>),
    Seq(Arc<[KeySegment]>),
    Identity(Identity),
}

impl KeySegment {
    pub fn float(value: f64) -> Self {
        let bits = if value.is_nan() {
            f64::NAN.to_bits()
        } else if value == 0.0 {
            0
        } else {
            value.to_bits()
        };
        KeySegment::Float(bits)
    }

    /// Identity segment for a shared value. The segment keeps the value alive
    /// for as long as it sits in a cache, so the address cannot be reused.
    pub fn identity<T: Send + Sync + 'static>(value: &Arc<T>) -> Self {
        KeySegment::Identity(Identity {
            addr: Arc::as_ptr(value) as *const () as usize,
            _owner: Arc::clone(value) as Arc<dyn Any + Send + Sync>,
        })
    }
}

/// Pointer identity of a shared value.
#[derive(Clone)]
pub struct Identity {
    addr: usize,
    _owner: Arc<dyn Any + Send + Sync>,
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({:#x})", self.addr)
    }
}

/// Conversion of a single argument into a key segment.
pub trait ToKeySegment {
    fn to_segment(&self) -> KeySegment;
}

/// Conversion of a whole argument list into a key path.
///
/// Implemented for tuples up to arity 6 (one segment per element), for `()`
/// (empty path), and for every single-argument type that implements
/// [`ToKeySegment`] in this crate.
pub trait KeyTuple {
    fn key_path(&self) -> Vec<KeySegment>;
}

macro_rules! int_segment {
    ($($ty:ty),*) => {$(
        impl ToKeySegment for $ty {
            fn to_segment(&self) -> KeySegment {
                KeySegment::Int(*self as i128)
            }
        }
    )*};
}

int_segment!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize);

impl ToKeySegment for f64 {
    fn to_segment(&self) -> KeySegment {
        KeySegment::float(*self)
    }
}

impl ToKeySegment for f32 {
    fn to_segment(&self) -> KeySegment {
        KeySegment::float(f64::from(*self))
    }
}

impl ToKeySegment for bool {
    fn to_segment(&self) -> KeySegment {
        KeySegment::Bool(*self)
    }
}

impl ToKeySegment for char {
    fn to_segment(&self) -> KeySegment {
        KeySegment::Char(*self)
    }
}

impl ToKeySegment for () {
    fn to_segment(&self) -> KeySegment {
        KeySegment::Unit
    }
}

impl ToKeySegment for str {
    fn to_segment(&self) -> KeySegment {
        KeySegment::Str(Arc::from(self))
    }
}

impl ToKeySegment for String {
    fn to_segment(&self) -> KeySegment {
        self.as_str().to_segment()
    }
}

impl ToKeySegment for KeySegment {
    fn to_segment(&self) -> KeySegment {
        self.clone()
    }
}

impl<T: ToKeySegment + ?Sized> ToKeySegment for &T {
    fn to_segment(&self) -> KeySegment {
        (**self).to_segment()
    }
}

impl<T: ToKeySegment> ToKeySegment for Option<T> {
    fn to_segment(&self) -> KeySegment {
        match self {
            Some(value) => value.to_segment(),
            None => KeySegment::Absent,
        }
    }
}

impl<T: ToKeySegment> ToKeySegment for [T] {
    fn to_segment(&self) -> KeySegment {
        KeySegment::Seq(self.iter().map(ToKeySegment::to_segment).collect())
    }
}

impl<T: ToKeySegment> ToKeySegment for Vec<T> {
    fn to_segment(&self) -> KeySegment {
        self.as_slice().to_segment()
    }
}

impl<T: Send + Sync + 'static> ToKeySegment for Arc<T> {
    fn to_segment(&self) -> KeySegment {
        KeySegment::identity(self)
    }
}

macro_rules! single_key {
    ($($ty:ty),*) => {$(
        impl KeyTuple for $ty {
            fn key_path(&self) -> Vec<KeySegment> {
                vec![self.to_segment()]
            }
        }
    )*};
}

single_key!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize, f32, f64, bool, char, String,
    KeySegment
);

impl KeyTuple for &str {
    fn key_path(&self) -> Vec<KeySegment> {
        vec![self.to_segment()]
    }
}

impl<T: ToKeySegment> KeyTuple for Option<T> {
    fn key_path(&self) -> Vec<KeySegment> {
        vec![self.to_segment()]
    }
}

impl<T: ToKeySegment> KeyTuple for Vec<T> {
    fn key_path(&self) -> Vec<KeySegment> {
        vec![self.to_segment()]
    }
}

impl<T: Send + Sync + 'static> KeyTuple for Arc<T> {
    fn key_path(&self) -> Vec<KeySegment> {
        vec![self.to_segment()]
    }
}

impl KeyTuple for () {
    fn key_path(&self) -> Vec<KeySegment> {
        Vec::new()
    }
}

macro_rules! tuple_key {
    ($($name:ident),+) => {
        impl<$($name: ToKeySegment),+> KeyTuple for ($($name,)+) {
            #[allow(non_snake_case)]
            fn key_path(&self) -> Vec<KeySegment> {
                let ($($name,)+) = self;
                vec![$($name.to_segment()),+]
            }
        }
    };
}

tuple_key!(A);
tuple_key!(A, B);
tuple_key!(A, B, C);
tuple_key!(A, B, C, D);
tuple_key!(A, B, C, D, E);
tuple_key!(A, B, C, D, E, F);
