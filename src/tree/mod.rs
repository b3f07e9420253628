//! A generic, arena-backed red-black tree with an augmentation hook.
//!
//! This is the systems-level primitive the rest of the crate builds on: the
//! [`crate::point`] scheduled-point index and the [`crate::mtrt`] min-time
//! resource index are both thin wrappers around a [`RbTree`] instantiated
//! with a different key and a different [`Augment`] implementation.
//!
//! Nodes live in a single `Vec`-backed arena and are addressed by [`NodeId`],
//! a plain index rather than a pointer; removed slots are recycled through a
//! free list. This keeps the tree free of `unsafe` and borrow-checker
//! friendly, at the cost of one extra indirection per child link compared to
//! a pointer-based intrusive tree.
//!
//! Augmentation follows the classic three-hook protocol: [`Augment::compute`]
//! recomputes a node's augmented value from its own payload and its
//! children's augmented values; it is invoked bottom-up after structural
//! changes ([`RbTree::propagate`]) and in the O(1) fixup each rotation
//! performs ([`RbTree::rotate_left`], [`RbTree::rotate_right`]).

use std::cmp::Ordering;

/// Index into the node arena. `NIL` denotes the absence of a node (a leaf's
/// missing child, or the parent of the root).
pub(crate) type NodeId = u32;
pub(crate) const NIL: NodeId = u32::MAX;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Color {
    Red,
    Black,
}

struct Node<K, P, A> {
    key: K,
    payload: P,
    aug: A,
    color: Color,
    parent: NodeId,
    left: NodeId,
    right: NodeId,
}

/// Augmentation hook for [`RbTree`]. Implementors compute a per-subtree
/// summary (e.g. `subtree_min`) from a node's own payload and the already-
/// correct augmented values of its children.
pub(crate) trait Augment: Copy + PartialEq {
    type Payload;

    /// Recompute this node's augmented value given its payload and the
    /// current augmented values of its left and right children (`None` if
    /// the respective child is absent).
    fn compute(payload: &Self::Payload, left: Option<&Self>, right: Option<&Self>) -> Self;
}

/// Trivial augmentation for trees that need none (the scheduled-point tree).
/// Generic over the tree's payload type so it can satisfy `Augment<Payload =
/// P>` for whatever `P` the tree is instantiated with, without computing
/// anything from it.
pub(crate) struct NoAugment<P>(std::marker::PhantomData<fn() -> P>);

impl<P> Clone for NoAugment<P> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<P> Copy for NoAugment<P> {}
impl<P> PartialEq for NoAugment<P> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}
impl<P> Default for NoAugment<P> {
    fn default() -> Self {
        NoAugment(std::marker::PhantomData)
    }
}

impl<P> Augment for NoAugment<P> {
    type Payload = P;

    fn compute(_payload: &P, _left: Option<&Self>, _right: Option<&Self>) -> Self {
        NoAugment(std::marker::PhantomData)
    }
}

/// A red-black tree over keys `K`, each node carrying a payload `P` and an
/// augmented value `A`. `free` stores previously-removed slots for reuse so
/// that long-running add/remove cycles don't grow the arena unboundedly.
pub(crate) struct RbTree<K, P, A> {
    nodes: Vec<Node<K, P, A>>,
    free: Vec<NodeId>,
    root: NodeId,
    len: usize,
}

impl<K, P, A> RbTree<K, P, A>
where
    K: Ord + Copy,
    A: Augment<Payload = P>,
{
    pub(crate) fn new() -> Self {
        RbTree {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NIL,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn key(&self, id: NodeId) -> K {
        self.nodes[id as usize].key
    }

    pub(crate) fn payload(&self, id: NodeId) -> &P {
        &self.nodes[id as usize].payload
    }

    pub(crate) fn payload_mut(&mut self, id: NodeId) -> &mut P {
        &mut self.nodes[id as usize].payload
    }

    pub(crate) fn aug(&self, id: NodeId) -> A {
        self.nodes[id as usize].aug
    }

    pub(crate) fn left(&self, id: NodeId) -> NodeId {
        self.nodes[id as usize].left
    }

    pub(crate) fn right(&self, id: NodeId) -> NodeId {
        self.nodes[id as usize].right
    }

    pub(crate) fn parent(&self, id: NodeId) -> NodeId {
        self.nodes[id as usize].parent
    }

    fn aug_of(&self, id: NodeId) -> Option<&A> {
        if id == NIL {
            None
        } else {
            Some(&self.nodes[id as usize].aug)
        }
    }

    fn recompute(&mut self, id: NodeId) -> bool {
        let left = self.nodes[id as usize].left;
        let right = self.nodes[id as usize].right;
        let left_aug = self.aug_of(left).copied();
        let right_aug = self.aug_of(right).copied();
        let new_aug = A::compute(&self.nodes[id as usize].payload, left_aug.as_ref(), right_aug.as_ref());
        if new_aug == self.nodes[id as usize].aug {
            false
        } else {
            self.nodes[id as usize].aug = new_aug;
            true
        }
    }

    /// Recompute the augmented value of `start` and every ancestor, stopping
    /// as soon as a level's augmented value turns out unchanged (the
    /// remaining ancestors then necessarily still hold correct values).
    fn propagate(&mut self, mut start: NodeId) {
        while start != NIL {
            if !self.recompute(start) {
                break;
            }
            start = self.nodes[start as usize].parent;
        }
    }

    fn is_red(&self, id: NodeId) -> bool {
        id != NIL && self.nodes[id as usize].color == Color::Red
    }

    fn set_color(&mut self, id: NodeId, color: Color) {
        if id != NIL {
            self.nodes[id as usize].color = color;
        }
    }

    /// Rotate `x` down and its right child up. The new subtree root inherits
    /// `x`'s old augmented value (it still summarizes the same set of keys);
    /// `x` then recomputes its own augmented value from its new children.
    fn rotate_left(&mut self, x: NodeId) {
        let y = self.nodes[x as usize].right;
        debug_assert_ne!(y, NIL);
        let y_left = self.nodes[y as usize].left;
        self.nodes[x as usize].right = y_left;
        if y_left != NIL {
            self.nodes[y_left as usize].parent = x;
        }
        let x_parent = self.nodes[x as usize].parent;
        self.nodes[y as usize].parent = x_parent;
        if x_parent == NIL {
            self.root = y;
        } else if self.nodes[x_parent as usize].left == x {
            self.nodes[x_parent as usize].left = y;
        } else {
            self.nodes[x_parent as usize].right = y;
        }
        self.nodes[y as usize].left = x;
        self.nodes[x as usize].parent = y;

        self.nodes[y as usize].aug = self.nodes[x as usize].aug;
        self.recompute(x);
    }

    /// Mirror image of [`Self::rotate_left`].
    fn rotate_right(&mut self, x: NodeId) {
        let y = self.nodes[x as usize].left;
        debug_assert_ne!(y, NIL);
        let y_right = self.nodes[y as usize].right;
        self.nodes[x as usize].left = y_right;
        if y_right != NIL {
            self.nodes[y_right as usize].parent = x;
        }
        let x_parent = self.nodes[x as usize].parent;
        self.nodes[y as usize].parent = x_parent;
        if x_parent == NIL {
            self.root = y;
        } else if self.nodes[x_parent as usize].right == x {
            self.nodes[x_parent as usize].right = y;
        } else {
            self.nodes[x_parent as usize].left = y;
        }
        self.nodes[y as usize].right = x;
        self.nodes[x as usize].parent = y;

        self.nodes[y as usize].aug = self.nodes[x as usize].aug;
        self.recompute(x);
    }

    fn alloc(&mut self, key: K, payload: P) -> NodeId {
        let aug = A::compute(&payload, None, None);
        let node = Node {
            key,
            payload,
            aug,
            color: Color::Red,
            parent: NIL,
            left: NIL,
            right: NIL,
        };
        if let Some(id) = self.free.pop() {
            self.nodes[id as usize] = node;
            id
        } else {
            self.nodes.push(node);
            (self.nodes.len() - 1) as NodeId
        }
    }

    /// Insert a new node keyed by `key`, ignoring any existing node with an
    /// equal key (callers that must reject duplicates check with
    /// [`Self::search`] first; [`crate::mtrt`] keys never collide because
    /// they are tie-broken by insertion order).
    pub(crate) fn insert(&mut self, key: K, payload: P) -> NodeId {
        let mut parent = NIL;
        let mut cur = self.root;
        let mut went_left = false;
        while cur != NIL {
            parent = cur;
            match key.cmp(&self.nodes[cur as usize].key) {
                Ordering::Less => {
                    went_left = true;
                    cur = self.nodes[cur as usize].left;
                }
                _ => {
                    went_left = false;
                    cur = self.nodes[cur as usize].right;
                }
            }
        }

        let id = self.alloc(key, payload);
        self.nodes[id as usize].parent = parent;
        if parent == NIL {
            self.root = id;
        } else if went_left {
            self.nodes[parent as usize].left = id;
        } else {
            self.nodes[parent as usize].right = id;
        }
        self.len += 1;

        self.propagate(parent);
        self.insert_fixup(id);
        id
    }

    fn insert_fixup(&mut self, mut z: NodeId) {
        while self.is_red(self.nodes[z as usize].parent) {
            let parent = self.nodes[z as usize].parent;
            let grandparent = self.nodes[parent as usize].parent;
            debug_assert_ne!(grandparent, NIL);
            if parent == self.nodes[grandparent as usize].left {
                let uncle = self.nodes[grandparent as usize].right;
                if self.is_red(uncle) {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    z = grandparent;
                } else {
                    if z == self.nodes[parent as usize].right {
                        z = parent;
                        self.rotate_left(z);
                    }
                    let parent = self.nodes[z as usize].parent;
                    let grandparent = self.nodes[parent as usize].parent;
                    self.set_color(parent, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    self.rotate_right(grandparent);
                }
            } else {
                let uncle = self.nodes[grandparent as usize].left;
                if self.is_red(uncle) {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    z = grandparent;
                } else {
                    if z == self.nodes[parent as usize].left {
                        z = parent;
                        self.rotate_right(z);
                    }
                    let parent = self.nodes[z as usize].parent;
                    let grandparent = self.nodes[parent as usize].parent;
                    self.set_color(parent, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    self.rotate_left(grandparent);
                }
            }
        }
        self.set_color(self.root, Color::Black);
    }

    /// Exact-match search.
    pub(crate) fn find(&self, key: K) -> Option<NodeId> {
        let mut cur = self.root;
        while cur != NIL {
            match key.cmp(&self.nodes[cur as usize].key) {
                Ordering::Less => cur = self.nodes[cur as usize].left,
                Ordering::Greater => cur = self.nodes[cur as usize].right,
                Ordering::Equal => return Some(cur),
            }
        }
        None
    }

    /// Largest node with `key <= at`, or `None` if every key exceeds `at`.
    pub(crate) fn floor(&self, at: K) -> Option<NodeId> {
        let mut cur = self.root;
        let mut best: Option<NodeId> = None;
        while cur != NIL {
            match at.cmp(&self.nodes[cur as usize].key) {
                Ordering::Less => cur = self.nodes[cur as usize].left,
                Ordering::Equal => return Some(cur),
                Ordering::Greater => {
                    best = Some(cur);
                    cur = self.nodes[cur as usize].right;
                }
            }
        }
        best
    }

    fn subtree_min(&self, mut id: NodeId) -> NodeId {
        while self.nodes[id as usize].left != NIL {
            id = self.nodes[id as usize].left;
        }
        id
    }

    /// In-order successor of `id`.
    pub(crate) fn next(&self, id: NodeId) -> Option<NodeId> {
        if self.nodes[id as usize].right != NIL {
            return Some(self.subtree_min(self.nodes[id as usize].right));
        }
        let mut cur = id;
        let mut parent = self.nodes[cur as usize].parent;
        while parent != NIL && cur == self.nodes[parent as usize].right {
            cur = parent;
            parent = self.nodes[parent as usize].parent;
        }
        if parent == NIL {
            None
        } else {
            Some(parent)
        }
    }

    fn transplant(&mut self, u: NodeId, v: NodeId) {
        let u_parent = self.nodes[u as usize].parent;
        if u_parent == NIL {
            self.root = v;
        } else if self.nodes[u_parent as usize].left == u {
            self.nodes[u_parent as usize].left = v;
        } else {
            self.nodes[u_parent as usize].right = v;
        }
        if v != NIL {
            self.nodes[v as usize].parent = u_parent;
        }
    }

    /// Remove `z` from the tree. The node's arena slot is recycled; callers
    /// that still need the payload must read it before calling this.
    pub(crate) fn remove(&mut self, z: NodeId) {
        let mut y = z;
        let mut y_original_color = self.nodes[y as usize].color;
        let x: NodeId;
        let x_parent: NodeId;

        if self.nodes[z as usize].left == NIL {
            x = self.nodes[z as usize].right;
            x_parent = self.nodes[z as usize].parent;
            self.transplant(z, x);
        } else if self.nodes[z as usize].right == NIL {
            x = self.nodes[z as usize].left;
            x_parent = self.nodes[z as usize].parent;
            self.transplant(z, x);
        } else {
            y = self.subtree_min(self.nodes[z as usize].right);
            y_original_color = self.nodes[y as usize].color;
            x = self.nodes[y as usize].right;
            if self.nodes[y as usize].parent == z {
                x_parent = y;
                if x != NIL {
                    self.nodes[x as usize].parent = y;
                }
            } else {
                x_parent = self.nodes[y as usize].parent;
                self.transplant(y, x);
                self.nodes[y as usize].right = self.nodes[z as usize].right;
                self.nodes[self.nodes[y as usize].right as usize].parent = y;
            }
            self.transplant(z, y);
            self.nodes[y as usize].left = self.nodes[z as usize].left;
            self.nodes[self.nodes[y as usize].left as usize].parent = y;
            self.nodes[y as usize].color = self.nodes[z as usize].color;
            self.recompute(y);
        }

        self.propagate(x_parent);
        if y_original_color == Color::Black {
            self.delete_fixup(x, x_parent);
        }

        self.free.push(z);
        self.len -= 1;
    }

    fn delete_fixup(&mut self, mut x: NodeId, mut x_parent: NodeId) {
        while x != self.root && !self.is_red(x) {
            if x == self.nodes[x_parent as usize].left {
                let mut w = self.nodes[x_parent as usize].right;
                if self.is_red(w) {
                    self.set_color(w, Color::Black);
                    self.set_color(x_parent, Color::Red);
                    self.rotate_left(x_parent);
                    w = self.nodes[x_parent as usize].right;
                }
                let w_left = self.nodes[w as usize].left;
                let w_right = self.nodes[w as usize].right;
                if !self.is_red(w_left) && !self.is_red(w_right) {
                    self.set_color(w, Color::Red);
                    x = x_parent;
                    x_parent = self.nodes[x as usize].parent;
                } else {
                    if !self.is_red(w_right) {
                        self.set_color(w_left, Color::Black);
                        self.set_color(w, Color::Red);
                        self.rotate_right(w);
                        w = self.nodes[x_parent as usize].right;
                    }
                    self.set_color(w, self.nodes[x_parent as usize].color);
                    self.set_color(x_parent, Color::Black);
                    self.set_color(self.nodes[w as usize].right, Color::Black);
                    self.rotate_left(x_parent);
                    x = self.root;
                }
            } else {
                let mut w = self.nodes[x_parent as usize].left;
                if self.is_red(w) {
                    self.set_color(w, Color::Black);
                    self.set_color(x_parent, Color::Red);
                    self.rotate_right(x_parent);
                    w = self.nodes[x_parent as usize].left;
                }
                let w_left = self.nodes[w as usize].left;
                let w_right = self.nodes[w as usize].right;
                if !self.is_red(w_right) && !self.is_red(w_left) {
                    self.set_color(w, Color::Red);
                    x = x_parent;
                    x_parent = self.nodes[x as usize].parent;
                } else {
                    if !self.is_red(w_left) {
                        self.set_color(w_right, Color::Black);
                        self.set_color(w, Color::Red);
                        self.rotate_left(w);
                        w = self.nodes[x_parent as usize].left;
                    }
                    self.set_color(w, self.nodes[x_parent as usize].color);
                    self.set_color(x_parent, Color::Black);
                    self.set_color(self.nodes[w as usize].left, Color::Black);
                    self.rotate_right(x_parent);
                    x = self.root;
                }
            }
        }
        self.set_color(x, Color::Black);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Augment for i64 {
        type Payload = i64;
        fn compute(payload: &i64, left: Option<&Self>, right: Option<&Self>) -> Self {
            let mut min = *payload;
            if let Some(l) = left {
                min = min.min(*l);
            }
            if let Some(r) = right {
                min = min.min(*r);
            }
            min
        }
    }

    fn assert_black_height_balanced(tree: &RbTree<i64, i64, i64>) {
        fn walk<K: Ord + Copy, P, A: Augment<Payload = P>>(
            tree: &RbTree<K, P, A>,
            id: NodeId,
        ) -> usize {
            if id == NIL {
                return 1;
            }
            if tree.is_red(id) {
                assert!(
                    !tree.is_red(tree.left(id)) && !tree.is_red(tree.right(id)),
                    "red node with red child"
                );
            }
            let lh = walk(tree, tree.left(id));
            let rh = walk(tree, tree.right(id));
            assert_eq!(lh, rh, "black-height mismatch");
            lh + if tree.is_red(id) { 0 } else { 1 }
        }
        walk(tree, tree.root());
    }

    #[test]
    fn insert_and_inorder_matches_sorted() {
        let mut tree: RbTree<i64, i64, i64> = RbTree::new();
        let values = [5, 3, 8, 1, 4, 7, 9, 2, 6, 0, -3, 42];
        let mut ids = Vec::new();
        for v in values {
            ids.push(tree.insert(v, v));
        }
        assert_black_height_balanced(&tree);

        let mut sorted = values.to_vec();
        sorted.sort();
        let min_id = {
            let mut cur = tree.root();
            while tree.left(cur) != NIL {
                cur = tree.left(cur);
            }
            cur
        };
        let mut walked = vec![tree.key(min_id)];
        let mut cur = min_id;
        while let Some(next) = tree.next(cur) {
            walked.push(tree.key(next));
            cur = next;
        }
        assert_eq!(walked, sorted);
    }

    #[test]
    fn remove_keeps_tree_balanced_and_searchable() {
        let mut tree: RbTree<i64, i64, i64> = RbTree::new();
        let values: Vec<i64> = (0..200).collect();
        let mut ids = Vec::new();
        for &v in &values {
            ids.push(tree.insert(v, v));
        }
        // Remove every third value.
        for (i, &v) in values.iter().enumerate() {
            if i % 3 == 0 {
                let id = tree.find(v).unwrap();
                tree.remove(id);
            }
        }
        assert_black_height_balanced(&tree);
        for (i, &v) in values.iter().enumerate() {
            if i % 3 == 0 {
                assert!(tree.find(v).is_none());
            } else {
                assert!(tree.find(v).is_some());
            }
        }
        assert_eq!(tree.len(), values.len() - values.iter().enumerate().filter(|(i, _)| i % 3 == 0).count());
    }

    #[test]
    fn floor_returns_largest_key_not_exceeding_target() {
        let mut tree: RbTree<i64, i64, i64> = RbTree::new();
        for v in [0, 10, 20, 30] {
            tree.insert(v, v);
        }
        assert_eq!(tree.floor(-1), None);
        assert_eq!(tree.key(tree.floor(0).unwrap()), 0);
        assert_eq!(tree.key(tree.floor(15).unwrap()), 10);
        assert_eq!(tree.key(tree.floor(30).unwrap()), 30);
        assert_eq!(tree.key(tree.floor(1000).unwrap()), 30);
    }

    #[test]
    fn augmentation_tracks_subtree_minimum_through_rotations() {
        use rand::Rng;
        use rand::SeedableRng;

        let mut tree: RbTree<i64, i64, i64> = RbTree::new();
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0x243f6a8885a308d3);
        let mut values = Vec::new();
        for _ in 0..500 {
            let v: i64 = rng.random_range(0..1000);
            values.push(v);
            tree.insert(v, v);
        }
        let expected = *values.iter().min().unwrap();
        assert_eq!(tree.aug(tree.root()), expected);
        assert_black_height_balanced(&tree);
    }

    macro_rules! size_test {
        ($name:ident, $n:expr) => {
            paste::paste! {
                #[test]
                fn [<remove_keeps_balance_with_ $name _elements>]() {
                    let mut tree: RbTree<i64, i64, i64> = RbTree::new();
                    for v in 0..$n {
                        tree.insert(v, v);
                    }
                    for v in (0..$n).step_by(2) {
                        let id = tree.find(v).unwrap();
                        tree.remove(id);
                    }
                    assert_black_height_balanced(&tree);
                    assert_eq!(tree.len(), ($n - ($n + 1) / 2) as usize);
                }
            }
        };
    }

    size_test!(sixteen, 16);
    size_test!(sixty_four, 64);
    size_test!(three_hundred, 300);
}
