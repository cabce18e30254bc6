// File: src/value/object.rs
//
// Persistent map (HAMT), ported from the reference implementation's
// data/object.go: a hashed array-mapped trie with 5-bit/32-way
// branching. Each node holds at most one direct pair plus up to 32
// child buckets, selected by successive 5-bit slices of the key's hash.
//
// The reference's HashCode had a bug (`h *= car * cdr`, which is zero
// for any non-empty object because the running accumulator starts at
// zero and is never added to). Per spec §9's Open Question resolution,
// this port instead XOR-combines a mix of each pair's hash — a
// commutative combination that satisfies the equality/hash invariant
// regardless of insertion order.

use super::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct Node {
    pair: Option<(Value, Value)>,
    children: [Option<Arc<Node>>; 32],
}

/// A persistent, immutable map from `Value` keys to `Value`s.
#[derive(Debug, Clone)]
pub struct Object(Arc<Node>);

impl Object {
    pub fn empty() -> Self {
        Object(Arc::new(Node::default()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.pair.is_none()
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        if self.0.pair.is_none() {
            return None;
        }
        let hash = key.hash_code();
        self.0.get(key, hash)
    }

    pub fn put(&self, key: Value, value: Value) -> Object {
        if self.0.pair.is_none() {
            return Object(Arc::new(Node { pair: Some((key, value)), children: Default::default() }));
        }
        let hash = key.hash_code();
        Object(Arc::new(self.0.put(key, value, hash)))
    }

    pub fn remove(&self, key: &Value) -> (Option<Value>, Object) {
        if self.0.pair.is_none() {
            return (None, self.clone());
        }
        let hash = key.hash_code();
        match self.0.remove(key, hash) {
            Some((v, Some(rest))) => (Some(v), Object(Arc::new(rest))),
            Some((v, None)) => (Some(v), Object::empty()),
            None => (None, self.clone()),
        }
    }

    pub fn count(&self) -> usize {
        self.pairs().len()
    }

    pub fn pairs(&self) -> Vec<(Value, Value)> {
        let mut out = Vec::new();
        self.0.collect(&mut out);
        out
    }

    /// Split returns the node's direct pair and the rest of the trie
    /// with that pair promoted out, matching the Sequence contract.
    pub fn split(&self) -> (Value, Object, bool) {
        match &self.0.pair {
            None => (Value::Nil, self.clone(), false),
            Some((k, v)) => {
                let pair = Value::cons(k.clone(), v.clone());
                let rest = self.0.promote().map(|n| Object(Arc::new(n))).unwrap_or_else(Object::empty);
                (pair, rest, true)
            }
        }
    }

    pub fn equal(&self, other: &Object) -> bool {
        let mut a = self.pairs();
        let mut b = other.pairs();
        if a.len() != b.len() {
            return false;
        }
        let key_str = |k: &Value| k.print();
        a.sort_by(|x, y| key_str(&x.0).cmp(&key_str(&y.0)));
        b.sort_by(|x, y| key_str(&x.0).cmp(&key_str(&y.0)));
        a.iter().zip(b.iter()).all(|(p, q)| p.0.equal(&q.0) && p.1.equal(&q.1))
    }

    pub fn hash_code(&self) -> u64 {
        let mut h: u64 = 0;
        for (k, v) in self.pairs() {
            h ^= mix(k.hash_code(), v.hash_code());
        }
        h
    }

    pub fn to_string(&self) -> String {
        let mut pairs = self.pairs();
        pairs.sort_by(|a, b| a.0.print().cmp(&b.0.print()));
        let parts: Vec<String> =
            pairs.iter().map(|(k, v)| format!("{} {}", k.print(), v.print())).collect();
        format!("{{{}}}", parts.join(" "))
    }
}

fn mix(a: u64, b: u64) -> u64 {
    (a ^ b.rotate_left(17)).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

impl Node {
    fn get(&self, key: &Value, hash: u64) -> Option<Value> {
        if let Some((k, v)) = &self.pair {
            if k.equal(key) {
                return Some(v.clone());
            }
        }
        let bucket = &self.children[(hash & 0x1f) as usize];
        bucket.as_ref().and_then(|b| b.get(key, hash >> 5))
    }

    fn put(&self, key: Value, value: Value, hash: u64) -> Node {
        if let Some((k, _)) = &self.pair {
            if k.equal(&key) {
                return Node { pair: Some((key, value)), children: self.children.clone() };
            }
        }
        let idx = (hash & 0x1f) as usize;
        let mut children = self.children.clone();
        children[idx] = Some(Arc::new(match &children[idx] {
            None => Node { pair: Some((key, value)), children: Default::default() },
            Some(bucket) => bucket.put(key, value, hash >> 5),
        }));
        Node { pair: self.pair.clone(), children }
    }

    fn remove(&self, key: &Value, hash: u64) -> Option<(Value, Option<Node>)> {
        if let Some((k, v)) = &self.pair {
            if k.equal(key) {
                return Some((v.clone(), self.promote()));
            }
        }
        let idx = (hash & 0x1f) as usize;
        let bucket = self.children[idx].as_ref()?;
        let (v, rest) = bucket.remove(key, hash >> 5)?;
        let mut children = self.children.clone();
        children[idx] = rest.map(Arc::new);
        Some((v, Some(Node { pair: self.pair.clone(), children })))
    }

    /// Pull a child's pair up into this node's slot, recursively
    /// promoting that child's own children. Returns `None` when there
    /// is nothing left to promote (the trie below is fully empty).
    fn promote(&self) -> Option<Node> {
        for (i, child) in self.children.iter().enumerate() {
            if let Some(c) = child {
                let mut children = self.children.clone();
                children[i] = c.promote().map(Arc::new);
                return Some(Node { pair: c.pair.clone(), children });
            }
        }
        None
    }

    fn collect(&self, out: &mut Vec<(Value, Value)>) {
        if let Some(p) = &self.pair {
            out.push(p.clone());
        }
        for child in self.children.iter().flatten() {
            child.collect(out);
        }
    }
}

impl Default for Object {
    fn default() -> Self {
        Object::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get_many_keys() {
        let mut o = Object::empty();
        for i in 0..200i64 {
            o = o.put(Value::Integer(i.into()), Value::Integer((i * 2).into()));
        }
        for i in 0..200i64 {
            assert_eq!(o.get(&Value::Integer(i.into())), Some(Value::Integer((i * 2).into())));
        }
        assert_eq!(o.count(), 200);
    }

    #[test]
    fn put_does_not_mutate_original() {
        let o1 = Object::empty().put(Value::Integer(1.into()), Value::Integer(10.into()));
        let o2 = o1.put(Value::Integer(1.into()), Value::Integer(99.into()));
        assert_eq!(o1.get(&Value::Integer(1.into())), Some(Value::Integer(10.into())));
        assert_eq!(o2.get(&Value::Integer(1.into())), Some(Value::Integer(99.into())));
    }

    #[test]
    fn remove_promotes_a_child() {
        let mut o = Object::empty();
        for i in 0..40i64 {
            o = o.put(Value::Integer(i.into()), Value::Integer(i.into()));
        }
        let (removed, o2) = o.remove(&Value::Integer(0.into()));
        assert_eq!(removed, Some(Value::Integer(0.into())));
        assert_eq!(o2.get(&Value::Integer(0.into())), None);
        assert_eq!(o2.count(), 39);
    }

    #[test]
    fn hash_is_nonzero_for_nonempty_object_and_agrees_with_equal() {
        let o1 = Object::empty()
            .put(Value::Integer(1.into()), Value::Integer(2.into()))
            .put(Value::Integer(3.into()), Value::Integer(4.into()));
        assert_ne!(o1.hash_code(), 0);

        let o2 = Object::empty()
            .put(Value::Integer(3.into()), Value::Integer(4.into()))
            .put(Value::Integer(1.into()), Value::Integer(2.into()));
        assert!(o1.equal(&o2));
        assert_eq!(o1.hash_code(), o2.hash_code());
    }
}
