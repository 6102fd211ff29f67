use fxhash::FxHashSet;

use crate::value::{Function, Object, ObjectId, ObjectKind, Property, PropertyKey, Value};

/// Structural equality over value graphs.
///
/// Primitives compare with SameValueZero. Objects are equal when they have the
/// same kind and internal slots, share a prototype, agree on extensibility and
/// carry the same own properties (keys, order, descriptors) with structurally
/// equal values. Map and Set contents compare in iteration order. Functions
/// and host handles compare by identity.
///
/// Cycles are handled coinductively: a pair of objects already under
/// comparison is assumed equal.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    Comparer::default().values(a, b)
}

#[derive(Default)]
struct Comparer {
    assumed: FxHashSet<(ObjectId, ObjectId)>,
}

impl Comparer {
    fn values(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Object(x), Value::Object(y)) => self.objects(x, y),
            _ => a.same_value_zero(b),
        }
    }

    fn objects(&mut self, a: &Object, b: &Object) -> bool {
        if a.ptr_eq(b) || !self.assumed.insert((a.id(), b.id())) {
            return true;
        }

        let (a_data, b_data) = (a.borrow(), b.borrow());
        let same_proto = match (&a_data.prototype, &b_data.prototype) {
            (None, None) => true,
            (Some(x), Some(y)) => x.ptr_eq(y),
            _ => false,
        };
        if !same_proto
            || a_data.extensible != b_data.extensible
            || a_data.properties.len() != b_data.properties.len()
        {
            return false;
        }

        let (a_kind, b_kind) = (a_data.kind.clone(), b_data.kind.clone());
        let (a_props, b_props) = (a_data.properties.clone(), b_data.properties.clone());
        drop(a_data);
        drop(b_data);

        if !self.kinds(&a_kind, &b_kind) {
            return false;
        }

        let (a_keys, b_keys) = (a.own_keys(), b.own_keys());
        if a_keys != b_keys {
            return false;
        }
        a_keys.iter().all(|key| {
            let lookup = |props: &[(PropertyKey, Property)]| {
                props.iter().find(|(k, _)| k == key).map(|(_, p)| p.clone())
            };
            match (lookup(&a_props), lookup(&b_props)) {
                (Some(x), Some(y)) => self.properties(&x, &y),
                _ => false,
            }
        })
    }

    fn kinds(&mut self, a: &ObjectKind, b: &ObjectKind) -> bool {
        match (a, b) {
            (ObjectKind::Plain, ObjectKind::Plain) | (ObjectKind::Array, ObjectKind::Array) => true,
            (ObjectKind::Map(x), ObjectKind::Map(y)) => {
                x.len() == y.len()
                    && x
                        .iter()
                        .zip(y)
                        .all(|((xk, xv), (yk, yv))| self.values(xk, yk) && self.values(xv, yv))
            }
            (ObjectKind::Set(x), ObjectKind::Set(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(xv, yv)| self.values(xv, yv))
            }
            (ObjectKind::Date(x), ObjectKind::Date(y)) => {
                Value::Number(*x).same_value_zero(&Value::Number(*y))
            }
            (
                ObjectKind::RegExp {
                    source: xs,
                    flags: xf,
                    ..
                },
                ObjectKind::RegExp {
                    source: ys,
                    flags: yf,
                    ..
                },
            ) => xs == ys && xf == yf,
            _ => false,
        }
    }

    fn properties(&mut self, a: &Property, b: &Property) -> bool {
        match (a, b) {
            (
                Property::Data {
                    value: xv,
                    writable: xw,
                    enumerable: xe,
                    configurable: xc,
                },
                Property::Data {
                    value: yv,
                    writable: yw,
                    enumerable: ye,
                    configurable: yc,
                },
            ) => xw == yw && xe == ye && xc == yc && self.values(xv, yv),
            (
                Property::Accessor {
                    get: xg,
                    set: xs,
                    enumerable: xe,
                    configurable: xc,
                },
                Property::Accessor {
                    get: yg,
                    set: ys,
                    enumerable: ye,
                    configurable: yc,
                },
            ) => xe == ye && xc == yc && same_fn(xg, yg) && same_fn(xs, ys),
            _ => false,
        }
    }
}

fn same_fn(a: &Option<Function>, b: &Option<Function>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x.ptr_eq(y),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Symbol;

    fn point(x: i32, y: i32) -> Value {
        let obj = Object::plain();
        obj.set("x", x);
        obj.set("y", y);
        Value::from(obj)
    }

    #[test]
    fn primitives_use_same_value_zero() {
        assert!(deep_equal(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert!(deep_equal(&Value::from(0.0), &Value::from(-0.0)));
        assert!(!deep_equal(&Value::from(1), &Value::from("1")));
        assert!(!deep_equal(&Value::Null, &Value::Undefined));
    }

    #[test]
    fn structurally_equal_objects() {
        assert!(deep_equal(&point(1, 2), &point(1, 2)));
        assert!(!deep_equal(&point(1, 2), &point(2, 1)));
    }

    #[test]
    fn property_order_and_flags_matter() {
        let a = Object::plain();
        a.set("x", 1);
        a.set("y", 2);
        let b = Object::plain();
        b.set("y", 2);
        b.set("x", 1);
        assert!(!deep_equal(&Value::from(a.clone()), &Value::from(b)));

        let c = Object::plain();
        c.set("x", 1);
        c.define_property(
            "y",
            Property::Data {
                value: Value::from(2),
                writable: false,
                enumerable: true,
                configurable: true,
            },
        );
        assert!(!deep_equal(&Value::from(a), &Value::from(c)));
    }

    #[test]
    fn symbol_keys_compare_by_identity() {
        let tag = Symbol::new("tag");
        let a = Object::plain();
        a.set(tag.clone(), 1);
        let b = Object::plain();
        b.set(tag, 1);
        let c = Object::plain();
        c.set(Symbol::new("tag"), 1);

        assert!(deep_equal(&Value::from(a.clone()), &Value::from(b)));
        assert!(!deep_equal(&Value::from(a), &Value::from(c)));
    }

    #[test]
    fn cycles_terminate() {
        let a = Object::plain();
        a.set("self", a.clone());
        let b = Object::plain();
        b.set("self", b.clone());
        assert!(deep_equal(&Value::from(a.clone()), &Value::from(b)));

        let c = Object::plain();
        let d = Object::plain();
        c.set("self", d.clone());
        d.set("self", Value::from(1));
        assert!(!deep_equal(&Value::from(a), &Value::from(c)));
    }

    #[test]
    fn containers_compare_contents_in_order() {
        let a = || (Value::from("a"), point(0, 0));
        let b = || (Value::from("b"), Value::from(1));
        let m1 = Object::new_map([a(), b()]);
        let m2 = Object::new_map([a(), b()]);
        let m3 = Object::new_map([b(), a()]);
        assert!(deep_equal(&Value::from(m1.clone()), &Value::from(m2)));
        assert!(!deep_equal(&Value::from(m1), &Value::from(m3)));

        let s1 = Object::new_set([Value::from(1), Value::from(2)]);
        let s2 = Object::new_set([Value::from(1), Value::from(2)]);
        assert!(deep_equal(&Value::from(s1), &Value::from(s2)));

        assert!(!deep_equal(
            &Value::from(Object::array([])),
            &Value::from(Object::plain())
        ));
    }

    #[test]
    fn prototypes_must_match() {
        let proto = Object::plain();
        let a = Object::with_prototype(ObjectKind::Plain, Some(proto.clone()));
        let b = Object::with_prototype(ObjectKind::Plain, Some(proto));
        let c = Object::with_prototype(ObjectKind::Plain, Some(Object::plain()));
        assert!(deep_equal(&Value::from(a.clone()), &Value::from(b)));
        assert!(!deep_equal(&Value::from(a), &Value::from(c)));
    }
}
