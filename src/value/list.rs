// File: src/value/list.rs
//
// Persistent singly-linked list with O(1) prepend and head, grounded on
// the reference implementation's data/list.go (see data/list_test.go in
// the retrieved original source for the behavior this ports).

use super::Value;
use std::sync::Arc;

#[derive(Debug)]
enum Node {
    Empty,
    Cons(Value, List),
}

/// A persistent, immutable, singly-linked list. `EmptyList` (`List::empty()`)
/// is the canonical terminal of every list per the data-model invariant.
#[derive(Debug, Clone)]
pub struct List(Arc<Node>);

impl List {
    pub fn empty() -> Self {
        List(Arc::new(Node::Empty))
    }

    pub fn is_empty(&self) -> bool {
        matches!(*self.0, Node::Empty)
    }

    /// Prepend a value, returning a new list sharing the old tail.
    pub fn prepend(&self, v: Value) -> List {
        List(Arc::new(Node::Cons(v, self.clone())))
    }

    pub fn from_vec(values: Vec<Value>) -> List {
        let mut res = List::empty();
        for v in values.into_iter().rev() {
            res = res.prepend(v);
        }
        res
    }

    pub fn first(&self) -> Value {
        match &*self.0 {
            Node::Empty => Value::Nil,
            Node::Cons(v, _) => v.clone(),
        }
    }

    pub fn rest(&self) -> List {
        match &*self.0 {
            Node::Empty => self.clone(),
            Node::Cons(_, r) => r.clone(),
        }
    }

    /// Split returns (first, rest, more?) per the Sequence capability:
    /// `(Nil, self, false)` when empty, `(value, rest, true)` otherwise.
    pub fn split(&self) -> (Value, List, bool) {
        match &*self.0 {
            Node::Empty => (Value::Nil, self.clone(), false),
            Node::Cons(v, r) => (v.clone(), r.clone(), true),
        }
    }

    pub fn count(&self) -> usize {
        let mut n = 0;
        let mut cur = self.clone();
        loop {
            match &*cur.0 {
                Node::Empty => return n,
                Node::Cons(_, r) => {
                    n += 1;
                    cur = r.clone();
                }
            }
        }
    }

    pub fn iter(&self) -> ListIter {
        ListIter(self.clone())
    }

    pub fn element_at(&self, index: usize) -> Option<Value> {
        let mut cur = self.clone();
        let mut i = index;
        loop {
            let (v, r, more) = cur.split();
            if !more {
                return None;
            }
            if i == 0 {
                return Some(v);
            }
            i -= 1;
            cur = r;
        }
    }

    pub fn equal(&self, other: &List) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        loop {
            let (av, ar, amore) = a.split();
            let (bv, br, bmore) = b.split();
            if amore != bmore {
                return false;
            }
            if !amore {
                return true;
            }
            if !av.equal(&bv) {
                return false;
            }
            a = ar;
            b = br;
        }
    }

    pub fn hash_code(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for v in self.iter() {
            h ^= v.hash_code().wrapping_add(0x9e37_79b9_7f4a_7c15);
        }
        h
    }

    pub fn to_string(&self) -> String {
        let parts: Vec<String> = self.iter().map(|v| v.print()).collect();
        format!("({})", parts.join(" "))
    }
}

impl Default for List {
    fn default() -> Self {
        List::empty()
    }
}

pub struct ListIter(List);

impl Iterator for ListIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let (v, r, more) = self.0.split();
        if !more {
            return None;
        }
        self.0 = r;
        Some(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_is_terminal() {
        let l = List::empty();
        assert!(l.is_empty());
        assert!(l.rest().is_empty());
        assert_eq!(l.first(), Value::Nil);
    }

    #[test]
    fn prepend_shares_tail() {
        let l1 = List::empty().prepend(Value::Integer(12.into()));
        assert_eq!(l1.first(), Value::Integer(12.into()));
        assert!(l1.rest().is_empty());

        let l2 = l1.prepend(Value::Float(20.5));
        assert_eq!(l2.to_string(), "(20.5 12)");
        assert_eq!(l2.count(), 2);
        assert!(l2.rest().first().equal(&l1.first()));
    }

    #[test]
    fn element_at_out_of_range_is_none() {
        let l = List::from_vec(vec![Value::Integer(1.into()), Value::Integer(2.into())]);
        assert_eq!(l.element_at(1), Some(Value::Integer(2.into())));
        assert_eq!(List::empty().element_at(1), None);
    }

    #[test]
    fn repeated_rest_terminates() {
        let l = List::from_vec(vec![Value::Integer(1.into())]);
        let mut cur = l;
        let mut steps = 0;
        while !cur.is_empty() {
            cur = cur.rest();
            steps += 1;
            assert!(steps < 10, "rest() never reached the empty list");
        }
    }
}
