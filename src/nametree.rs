//! The balanced-tree structure used for large keyed maps: name trees
//! (string keys) and number trees (integer keys). Nodes carry either
//! `Kids` or a leaf array of `key value` pairs, bounded by `Limits`.

use std::collections::{HashSet, VecDeque};
use std::marker::PhantomData;

use crate::error::*;
use crate::primitive::{Dict, PlainRef, Primitive};
use crate::xref::XRef;

/// Corrupt files can nest arbitrarily; anything deeper is treated as
/// not-found rather than walked.
const MAX_DEPTH: usize = 10;

pub trait TreeKey: Ord + Clone + std::fmt::Debug + Sized {
    /// Dictionary key of the leaf array: `Names` or `Nums`.
    const LEAF: &'static str;
    fn from_primitive(p: &Primitive) -> Result<Self>;
}

impl TreeKey for Vec<u8> {
    const LEAF: &'static str = "Names";
    fn from_primitive(p: &Primitive) -> Result<Vec<u8>> {
        Ok(p.as_string()?.as_bytes().to_vec())
    }
}

impl TreeKey for i64 {
    const LEAF: &'static str = "Nums";
    fn from_primitive(p: &Primitive) -> Result<i64> {
        p.as_integer()
    }
}

pub struct NameOrNumberTree<'a, K> {
    xref: &'a XRef,
    root: Dict,
    _marker: PhantomData<K>,
}

pub type NameTree<'a> = NameOrNumberTree<'a, Vec<u8>>;
pub type NumberTree<'a> = NameOrNumberTree<'a, i64>;

impl<'a, K: TreeKey> NameOrNumberTree<'a, K> {
    pub fn new(xref: &'a XRef, root: Dict) -> Self {
        NameOrNumberTree { xref, root, _marker: PhantomData }
    }

    fn limits_of(&self, node: &Dict) -> Result<(K, K)> {
        let limits = t!(self.xref.dict_get(node, "Limits"));
        let limits = limits.as_array()?;
        if limits.len() != 2 {
            bail!("'Limits' is not of length 2");
        }
        let min = K::from_primitive(&self.xref.fetch_if_ref(&limits[0])?)?;
        let max = K::from_primitive(&self.xref.fetch_if_ref(&limits[1])?)?;
        Ok((min, max))
    }

    /// Single-key lookup. Descends by binary search over the kids'
    /// `Limits`, then binary-searches the leaf array; a linear scan picks
    /// up keys that are out of order in corrupt files. Absent keys read
    /// as `Null`.
    pub fn get(&self, key: &K) -> Result<Primitive> {
        let mut node = self.root.clone();
        let mut depth = 0;
        loop {
            let kids = self.xref.dict_get(&node, "Kids")?;
            if kids.is_null() {
                break;
            }
            depth += 1;
            if depth > MAX_DEPTH {
                warn!("name/number tree is deeper than {} levels", MAX_DEPTH);
                return Ok(Primitive::Null);
            }
            let kids = kids.into_array()?;
            let (mut l, mut r) = (0usize, kids.len());
            let mut next = None;
            while l < r {
                let m = (l + r) / 2;
                let kid = t!(self.xref.fetch_if_ref(&kids[m])).into_dictionary()?;
                let (min, max) = self.limits_of(&kid)?;
                if *key < min {
                    r = m;
                } else if *key > max {
                    l = m + 1;
                } else {
                    next = Some(kid);
                    break;
                }
            }
            match next {
                Some(kid) => node = kid,
                None => return Ok(Primitive::Null),
            }
        }

        let entries = self.xref.dict_get(&node, K::LEAF)?;
        if entries.is_null() {
            warn!("neither Kids nor {} present in tree node", K::LEAF);
            return Ok(Primitive::Null);
        }
        let entries = entries.into_array()?;
        let n = entries.len() / 2;
        let (mut l, mut r) = (0usize, n);
        while l < r {
            let m = (l + r) / 2;
            let k = K::from_primitive(&self.xref.fetch_if_ref(&entries[2 * m])?)?;
            match key.cmp(&k) {
                std::cmp::Ordering::Less => r = m,
                std::cmp::Ordering::Greater => l = m + 1,
                std::cmp::Ordering::Equal => return self.xref.fetch_if_ref(&entries[2 * m + 1]),
            }
        }
        // binary search missed; tolerate out-of-order keys
        for pair in entries.chunks_exact(2) {
            let k = match self.xref.fetch_if_ref(&pair[0]) {
                Ok(p) => match K::from_primitive(&p) {
                    Ok(k) => k,
                    Err(_) => continue,
                },
                Err(e) if e.is_missing_data() => return Err(e),
                Err(_) => continue,
            };
            if k == *key {
                warn!("found key {:?} by linear scan in an out-of-order tree leaf", key);
                return self.xref.fetch_if_ref(&pair[1]);
            }
        }
        Ok(Primitive::Null)
    }

    /// Full enumeration, breadth first. Values come back raw (references
    /// unresolved). A kid reference seen twice is a structural violation
    /// and aborts the walk.
    pub fn get_all(&self) -> Result<Vec<(K, Primitive)>> {
        let mut out = Vec::new();
        let mut seen: HashSet<PlainRef> = HashSet::new();
        let mut queue: VecDeque<Dict> = VecDeque::new();
        queue.push_back(self.root.clone());

        while let Some(node) = queue.pop_front() {
            if let Some(kids) = node.get("Kids") {
                let kids = t!(self.xref.fetch_if_ref(kids)).into_array()?;
                for kid in &kids {
                    if let Primitive::Reference(r) = *kid {
                        if !seen.insert(r) {
                            bail!("duplicate kid {} in name/number tree", r);
                        }
                    }
                    queue.push_back(t!(self.xref.fetch_if_ref(kid)).into_dictionary()?);
                }
                continue;
            }
            let entries = self.xref.dict_get(&node, K::LEAF)?;
            if entries.is_null() {
                warn!("neither Kids nor {} present in tree node", K::LEAF);
                continue;
            }
            let entries = entries.into_array()?;
            for pair in entries.chunks_exact(2) {
                match self
                    .xref
                    .fetch_if_ref(&pair[0])
                    .and_then(|p| K::from_primitive(&p))
                {
                    Ok(key) => out.push((key, pair[1].clone())),
                    Err(e) if e.is_missing_data() => return Err(e),
                    Err(e) => warn!("skipping unreadable tree key: {}", e),
                }
            }
        }
        Ok(out)
    }
}
