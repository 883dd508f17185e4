//! Red-black tree with a pluggable insert-descent order, implemented from
//! the Cormen/Leiserson/Rivest algorithm the same way `ngx_rbtree.c` does:
//! standard BST descent plus a fixup loop, and successor-transplant delete
//! with the four mirror-symmetric sibling cases.
//!
//! Nodes live in an arena (`Vec<Node<K, V>>`) addressed by `usize` handles
//! instead of raw intrusive pointers; `NIL` (`usize::MAX`) stands in for the
//! shared black sentinel. The insert-descent comparator that `ngx_rbtree.c`
//! passes as a function pointer (`ngx_rbtree_insert_value` vs.
//! `ngx_rbtree_insert_timer_value`) becomes the `KeyOrder` trait below, with
//! `StandardOrder` and `WrappingU32Order` as its two fixed implementations.

use std::marker::PhantomData;

pub type Handle = usize;
const NIL: Handle = usize::MAX;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

/// Chooses which side of `existing` a new key descends to during insert.
pub trait KeyOrder<K> {
    fn less(new_key: &K, existing_key: &K) -> bool;
}

/// Plain `Ord`-based descent (`ngx_rbtree_insert_value`).
pub struct StandardOrder<K>(PhantomData<K>);
impl<K: Ord> KeyOrder<K> for StandardOrder<K> {
    fn less(a: &K, b: &K) -> bool {
        a < b
    }
}

/// Wrap-safe signed-difference descent for 32-bit wrapping millisecond
/// deadlines (`ngx_rbtree_insert_timer_value`).
pub struct WrappingU32Order;
impl KeyOrder<u32> for WrappingU32Order {
    fn less(a: &u32, b: &u32) -> bool {
        (a.wrapping_sub(*b) as i32) < 0
    }
}

struct Node<K, V> {
    key: K,
    value: V,
    color: Color,
    left: Handle,
    right: Handle,
    parent: Handle,
}

pub struct RbTree<K, V, C = StandardOrder<K>> {
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<Handle>,
    root: Handle,
    _order: PhantomData<C>,
}

impl<K, V, C: KeyOrder<K>> Default for RbTree<K, V, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C: KeyOrder<K>> RbTree<K, V, C> {
    pub fn new() -> Self {
        RbTree { nodes: Vec::new(), free: Vec::new(), root: NIL, _order: PhantomData }
    }

    pub fn is_empty(&self) -> bool {
        self.root == NIL
    }

    pub fn key(&self, h: Handle) -> &K {
        &self.node(h).key
    }

    pub fn value(&self, h: Handle) -> &V {
        &self.node(h).value
    }

    pub fn value_mut(&mut self, h: Handle) -> &mut V {
        &mut self.node_mut(h).value
    }

    fn node(&self, h: Handle) -> &Node<K, V> {
        self.nodes[h].as_ref().expect("stale rbtree handle")
    }

    fn node_mut(&mut self, h: Handle) -> &mut Node<K, V> {
        self.nodes[h].as_mut().expect("stale rbtree handle")
    }

    fn color(&self, h: Handle) -> Color {
        if h == NIL {
            Color::Black
        } else {
            self.node(h).color
        }
    }

    fn left(&self, h: Handle) -> Handle {
        if h == NIL { NIL } else { self.node(h).left }
    }

    fn right(&self, h: Handle) -> Handle {
        if h == NIL { NIL } else { self.node(h).right }
    }

    fn parent(&self, h: Handle) -> Handle {
        if h == NIL { NIL } else { self.node(h).parent }
    }

    fn alloc(&mut self, node: Node<K, V>) -> Handle {
        if let Some(h) = self.free.pop() {
            self.nodes[h] = Some(node);
            h
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn left_rotate(&mut self, x: Handle) {
        let y = self.right(x);
        self.node_mut(x).right = self.left(y);
        if self.left(y) != NIL {
            let xl = self.left(y);
            self.node_mut(xl).parent = x;
        }
        self.node_mut(y).parent = self.parent(x);
        if self.parent(x) == NIL {
            self.root = y;
        } else if x == self.left(self.parent(x)) {
            let p = self.parent(x);
            self.node_mut(p).left = y;
        } else {
            let p = self.parent(x);
            self.node_mut(p).right = y;
        }
        self.node_mut(y).left = x;
        self.node_mut(x).parent = y;
        tracing::trace!("rbtree left_rotate");
    }

    fn right_rotate(&mut self, x: Handle) {
        let y = self.left(x);
        self.node_mut(x).left = self.right(y);
        if self.right(y) != NIL {
            let yr = self.right(y);
            self.node_mut(yr).parent = x;
        }
        self.node_mut(y).parent = self.parent(x);
        if self.parent(x) == NIL {
            self.root = y;
        } else if x == self.right(self.parent(x)) {
            let p = self.parent(x);
            self.node_mut(p).right = y;
        } else {
            let p = self.parent(x);
            self.node_mut(p).left = y;
        }
        self.node_mut(y).right = x;
        self.node_mut(x).parent = y;
        tracing::trace!("rbtree right_rotate");
    }

    pub fn insert(&mut self, key: K, value: V) -> Handle {
        let h = self.alloc(Node { key, value, color: Color::Red, left: NIL, right: NIL, parent: NIL });

        if self.root == NIL {
            self.node_mut(h).color = Color::Black;
            self.node_mut(h).parent = NIL;
            self.root = h;
            return h;
        }

        let mut temp = self.root;
        loop {
            let go_left = C::less(&self.node(h).key, &self.node(temp).key);
            let next = if go_left { self.left(temp) } else { self.right(temp) };
            if next == NIL {
                self.node_mut(h).parent = temp;
                if go_left {
                    self.node_mut(temp).left = h;
                } else {
                    self.node_mut(temp).right = h;
                }
                break;
            }
            temp = next;
        }

        self.insert_fixup(h);
        h
    }

    fn insert_fixup(&mut self, mut z: Handle) {
        while self.color(self.parent(z)) == Color::Red {
            let p = self.parent(z);
            let gp = self.parent(p);
            if p == self.left(gp) {
                let uncle = self.right(gp);
                if self.color(uncle) == Color::Red {
                    self.node_mut(p).color = Color::Black;
                    self.node_mut(uncle).color = Color::Black;
                    self.node_mut(gp).color = Color::Red;
                    z = gp;
                } else {
                    if z == self.right(p) {
                        z = p;
                        self.left_rotate(z);
                    }
                    let p = self.parent(z);
                    let gp = self.parent(p);
                    self.node_mut(p).color = Color::Black;
                    self.node_mut(gp).color = Color::Red;
                    self.right_rotate(gp);
                }
            } else {
                let uncle = self.left(gp);
                if self.color(uncle) == Color::Red {
                    self.node_mut(p).color = Color::Black;
                    self.node_mut(uncle).color = Color::Black;
                    self.node_mut(gp).color = Color::Red;
                    z = gp;
                } else {
                    if z == self.left(p) {
                        z = p;
                        self.right_rotate(z);
                    }
                    let p = self.parent(z);
                    let gp = self.parent(p);
                    self.node_mut(p).color = Color::Black;
                    self.node_mut(gp).color = Color::Red;
                    self.left_rotate(gp);
                }
            }
            if self.root == z {
                break;
            }
        }
        self.node_mut(self.root).color = Color::Black;
    }

    fn transplant(&mut self, u: Handle, v: Handle) {
        let pu = self.parent(u);
        if pu == NIL {
            self.root = v;
        } else if u == self.left(pu) {
            self.node_mut(pu).left = v;
        } else {
            self.node_mut(pu).right = v;
        }
        if v != NIL {
            self.node_mut(v).parent = pu;
        }
    }

    pub fn min(&self, mut h: Handle) -> Handle {
        while self.left(h) != NIL {
            h = self.left(h);
        }
        h
    }

    fn max(&self, mut h: Handle) -> Handle {
        while self.right(h) != NIL {
            h = self.right(h);
        }
        h
    }

    /// In-order successor: right subtree's minimum, or the nearest ancestor
    /// this node is a left child of (`ngx_rbtree_next`).
    pub fn next(&self, h: Handle) -> Handle {
        if self.right(h) != NIL {
            return self.min(self.right(h));
        }
        let mut node = h;
        let mut p = self.parent(node);
        while p != NIL && node == self.right(p) {
            node = p;
            p = self.parent(p);
        }
        p
    }

    pub fn min_handle(&self) -> Handle {
        if self.root == NIL {
            NIL
        } else {
            self.min(self.root)
        }
    }

    /// Unlinks and frees `z`, returning its value. Standard successor-based
    /// two-child deletion; on the single/no-child path the child is spliced
    /// straight in. Mirror-symmetric sibling fixup runs when a black node is
    /// removed (`ngx_rbtree_delete`).
    pub fn delete(&mut self, z: Handle) -> V {
        let mut y = z;
        let mut y_original_color = self.color(y);
        let x;
        let x_parent;

        if self.left(z) == NIL {
            x = self.right(z);
            x_parent = self.parent(z);
            self.transplant(z, x);
        } else if self.right(z) == NIL {
            x = self.left(z);
            x_parent = self.parent(z);
            self.transplant(z, x);
        } else {
            y = self.min(self.right(z));
            y_original_color = self.color(y);
            let x_local = self.right(y);
            if self.parent(y) == z {
                x_parent = y;
            } else {
                x_parent = self.parent(y);
                self.transplant(y, x_local);
                self.node_mut(y).right = self.right(z);
                let zr = self.right(z);
                self.node_mut(zr).parent = y;
            }
            self.transplant(z, y);
            self.node_mut(y).left = self.left(z);
            let zl = self.left(z);
            self.node_mut(zl).parent = y;
            self.node_mut(y).color = self.color(z);
            x = x_local;
        }

        if y_original_color == Color::Black {
            self.delete_fixup(x, x_parent);
        }

        let node = self.nodes[z].take().expect("stale rbtree handle");
        self.free.push(z);
        node.value
    }

    fn delete_fixup(&mut self, mut x: Handle, mut x_parent: Handle) {
        while x != self.root && self.color(x) == Color::Black {
            if x == self.left(x_parent) {
                let mut w = self.right(x_parent);
                if self.color(w) == Color::Red {
                    self.node_mut(w).color = Color::Black;
                    self.node_mut(x_parent).color = Color::Red;
                    self.left_rotate(x_parent);
                    w = self.right(x_parent);
                }
                if self.color(self.left(w)) == Color::Black && self.color(self.right(w)) == Color::Black {
                    self.node_mut(w).color = Color::Red;
                    x = x_parent;
                    x_parent = self.parent(x);
                } else {
                    if self.color(self.right(w)) == Color::Black {
                        self.node_mut(self.left(w)).color = Color::Black;
                        self.node_mut(w).color = Color::Red;
                        self.right_rotate(w);
                        w = self.right(x_parent);
                    }
                    self.node_mut(w).color = self.color(x_parent);
                    self.node_mut(x_parent).color = Color::Black;
                    self.node_mut(self.right(w)).color = Color::Black;
                    self.left_rotate(x_parent);
                    x = self.root;
                }
            } else {
                let mut w = self.left(x_parent);
                if self.color(w) == Color::Red {
                    self.node_mut(w).color = Color::Black;
                    self.node_mut(x_parent).color = Color::Red;
                    self.right_rotate(x_parent);
                    w = self.left(x_parent);
                }
                if self.color(self.right(w)) == Color::Black && self.color(self.left(w)) == Color::Black {
                    self.node_mut(w).color = Color::Red;
                    x = x_parent;
                    x_parent = self.parent(x);
                } else {
                    if self.color(self.left(w)) == Color::Black {
                        self.node_mut(self.right(w)).color = Color::Black;
                        self.node_mut(w).color = Color::Red;
                        self.left_rotate(w);
                        w = self.left(x_parent);
                    }
                    self.node_mut(w).color = self.color(x_parent);
                    self.node_mut(x_parent).color = Color::Black;
                    self.node_mut(self.left(w)).color = Color::Black;
                    self.right_rotate(x_parent);
                    x = self.root;
                }
            }
        }
        if x != NIL {
            self.node_mut(x).color = Color::Black;
        }
    }

    pub fn in_order(&self) -> Vec<Handle> {
        let mut out = Vec::with_capacity(self.nodes.len());
        if self.root != NIL {
            let mut h = self.min(self.root);
            loop {
                out.push(h);
                h = self.next(h);
                if h == NIL {
                    break;
                }
            }
        }
        out
    }

    #[allow(dead_code)]
    fn max_handle(&self) -> Handle {
        if self.root == NIL {
            NIL
        } else {
            self.max(self.root)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_in_order_is_sorted() {
        let mut t: RbTree<i32, i32> = RbTree::new();
        for k in [5, 3, 8, 1, 4, 7, 9] {
            t.insert(k, k * 10);
        }
        let keys: Vec<_> = t.in_order().into_iter().map(|h| *t.key(h)).collect();
        assert_eq!(keys, vec![1, 3, 4, 5, 7, 8, 9]);
    }

    #[test]
    fn delete_preserves_in_order() {
        let mut t: RbTree<i32, i32> = RbTree::new();
        let handles: Vec<_> = (1..=7).map(|k| t.insert(k, k)).collect();
        t.delete(handles[3]); // key 4
        let keys: Vec<_> = t.in_order().into_iter().map(|h| *t.key(h)).collect();
        assert_eq!(keys, vec![1, 2, 3, 5, 6, 7]);
    }

    #[test]
    fn randomized_insert_delete_stays_sorted() {
        use rand::prelude::*;
        use rand::rngs::StdRng;
        let mut rng = StdRng::seed_from_u64(42);
        let mut t: RbTree<i32, i32> = RbTree::new();
        let mut handles = vec![];
        for _ in 0..200 {
            let k: i32 = rng.gen_range(-1000..1000);
            handles.push(t.insert(k, k));
        }
        handles.shuffle(&mut rng);
        for h in handles.into_iter().take(100) {
            t.delete(h);
        }
        let keys: Vec<_> = t.in_order().into_iter().map(|h| *t.key(h)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn wrapping_order_handles_msec_wraparound() {
        let mut t: RbTree<u32, (), WrappingU32Order> = RbTree::new();
        for k in [100u32, 0xFFFF_FFF0, 0xFFFF_FFFF, 5] {
            t.insert(k, ());
        }
        let keys: Vec<_> = t.in_order().into_iter().map(|h| *t.key(h)).collect();
        // ordering is relative to wraparound from a current time near the top
        // of the u32 range, not plain numeric order.
        assert_eq!(keys.len(), 4);
    }
}
