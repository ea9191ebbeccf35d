//! High-level views over the document's root dictionary: page tree
//! navigation, outline, destinations, labels, attachments, viewer
//! preferences and permissions. Every view is computed lazily and
//! memoized; format errors in optional views degrade to "absent" with a
//! log line, only `MissingData` propagates.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;

use crate::error::*;
use crate::nametree::{NameTree, NumberTree};
use crate::primitive::{Dict, Name, PlainRef, Primitive};
use crate::xref::XRef;

macro_rules! mods {
    ($($name:ident),*) => {
        $( mod $name; )*
        $( pub use $name::*; )*
    };
}

mods!(dest, filespec, outline, pagelabel, viewerprefs);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLayout {
    SinglePage,
    OneColumn,
    TwoColumnLeft,
    TwoColumnRight,
    TwoPageLeft,
    TwoPageRight,
}

impl PageLayout {
    fn from_name(name: &str) -> Option<PageLayout> {
        match name {
            "SinglePage" => Some(PageLayout::SinglePage),
            "OneColumn" => Some(PageLayout::OneColumn),
            "TwoColumnLeft" => Some(PageLayout::TwoColumnLeft),
            "TwoColumnRight" => Some(PageLayout::TwoColumnRight),
            "TwoPageLeft" => Some(PageLayout::TwoPageLeft),
            "TwoPageRight" => Some(PageLayout::TwoPageRight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageMode {
    #[default]
    UseNone,
    UseOutlines,
    UseThumbs,
    FullScreen,
    UseOC,
    UseAttachments,
}

impl PageMode {
    fn from_name(name: &str) -> Option<PageMode> {
        match name {
            "UseNone" => Some(PageMode::UseNone),
            "UseOutlines" => Some(PageMode::UseOutlines),
            "UseThumbs" => Some(PageMode::UseThumbs),
            "FullScreen" => Some(PageMode::FullScreen),
            "UseOC" => Some(PageMode::UseOC),
            "UseAttachments" => Some(PageMode::UseAttachments),
            _ => None,
        }
    }
}

/// Access permissions of an encrypted document, decoded from `/Encrypt /P`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PermissionFlag {
    Print = 0x04,
    Modify = 0x08,
    Copy = 0x10,
    ModifyAnnotations = 0x20,
    FillInteractiveForms = 0x100,
    CopyForAccessibility = 0x200,
    AssembleDocument = 0x400,
    PrintHighQuality = 0x800,
}

impl PermissionFlag {
    pub const ALL: [PermissionFlag; 8] = [
        PermissionFlag::Print,
        PermissionFlag::Modify,
        PermissionFlag::Copy,
        PermissionFlag::ModifyAnnotations,
        PermissionFlag::FillInteractiveForms,
        PermissionFlag::CopyForAccessibility,
        PermissionFlag::AssembleDocument,
        PermissionFlag::PrintHighQuality,
    ];
}

pub struct Catalog {
    xref: Rc<XRef>,
    root: Dict,
    doc_base_url: Option<String>,

    num_pages: OnceCell<u32>,
    metadata: OnceCell<Option<String>>,
    page_layout: OnceCell<Option<PageLayout>>,
    page_mode: OnceCell<PageMode>,
    viewer_preferences: OnceCell<Option<ViewerPreferences>>,
    open_action_destination: OnceCell<Option<Primitive>>,
    document_outline: OnceCell<Option<Vec<OutlineItem>>>,
    permissions: OnceCell<Option<Vec<PermissionFlag>>>,
    destinations: OnceCell<IndexMap<String, Primitive>>,
    page_labels: OnceCell<Option<Vec<String>>>,
    attachments: OnceCell<Option<IndexMap<String, Attachment>>>,
    java_script: OnceCell<Option<Vec<String>>>,

    page_kids_count_cache: RefCell<HashMap<PlainRef, i64>>,
    page_index_cache: RefCell<HashMap<PlainRef, u32>>,
}

impl Catalog {
    pub fn new(xref: Rc<XRef>, doc_base_url: Option<String>) -> Result<Catalog> {
        let root = xref.catalog_dict()?;
        Ok(Catalog {
            xref,
            root,
            doc_base_url,
            num_pages: OnceCell::new(),
            metadata: OnceCell::new(),
            page_layout: OnceCell::new(),
            page_mode: OnceCell::new(),
            viewer_preferences: OnceCell::new(),
            open_action_destination: OnceCell::new(),
            document_outline: OnceCell::new(),
            permissions: OnceCell::new(),
            destinations: OnceCell::new(),
            page_labels: OnceCell::new(),
            attachments: OnceCell::new(),
            java_script: OnceCell::new(),
            page_kids_count_cache: RefCell::new(HashMap::new()),
            page_index_cache: RefCell::new(HashMap::new()),
        })
    }

    pub fn root_dict(&self) -> &Dict {
        &self.root
    }
    pub fn xref(&self) -> &XRef {
        &self.xref
    }

    /// Optional views degrade to `None` on format errors; `MissingData`
    /// always propagates so the host can fetch and retry.
    fn view<T>(&self, what: &str, f: impl FnOnce() -> Result<Option<T>>) -> Result<Option<T>> {
        match f() {
            Ok(v) => Ok(v),
            Err(e) if e.is_missing_data() => Err(e),
            Err(e) => {
                warn!("unreadable {}: {}", what, e);
                Ok(None)
            }
        }
    }

    fn names_dict(&self) -> Result<Option<Dict>> {
        match self.xref.dict_get(&self.root, "Names")? {
            Primitive::Dictionary(d) => Ok(Some(d)),
            _ => Ok(None),
        }
    }

    /// `/Pages` of the root; the top of the page tree.
    pub fn toplevel_pages_dict(&self) -> Result<Dict> {
        match self.xref.dict_get(&self.root, "Pages")? {
            Primitive::Dictionary(d) => Ok(d),
            p => Err(PdfError::UnexpectedPrimitive {
                expected: "Dictionary",
                found: p.get_debug_name(),
            }),
        }
    }

    pub fn num_pages(&self) -> Result<u32> {
        self.num_pages
            .get_or_try_init(|| {
                let pages = self.toplevel_pages_dict()?;
                let count = self.xref.dict_get(&pages, "Count")?.as_integer()?;
                if count < 0 {
                    bail!("negative page count {}", count);
                }
                Ok(count as u32)
            })
            .copied()
    }

    /// The document metadata stream (`Type/Metadata`, `Subtype/XML`) as
    /// UTF-8 text. Fetched with encryption suppressed when the cipher
    /// leaves metadata in the clear.
    pub fn metadata(&self) -> Result<Option<String>> {
        self.metadata
            .get_or_try_init(|| {
                self.view("metadata", || {
                    let raw = match self.root.get("Metadata") {
                        Some(p) => p.clone(),
                        None => return Ok(None),
                    };
                    let suppress = match self.xref.cipher_factory() {
                        Some(f) => !f.encrypt_metadata(),
                        None => false,
                    };
                    let stream = match raw {
                        Primitive::Reference(r) => self.xref.fetch_with(r, suppress)?,
                        p => p,
                    };
                    let stream = match stream {
                        Primitive::Stream(s) => s,
                        p => {
                            return Err(PdfError::UnexpectedPrimitive {
                                expected: "Stream",
                                found: p.get_debug_name(),
                            })
                        }
                    };
                    let type_ok = matches!(self.xref.dict_get(&stream.dict, "Type")?,
                        Primitive::Name(ref n) if n.as_str() == "Metadata");
                    let subtype_ok = matches!(self.xref.dict_get(&stream.dict, "Subtype")?,
                        Primitive::Name(ref n) if n.as_str() == "XML");
                    if !type_ok || !subtype_ok {
                        bail!("stream at /Metadata is not XML metadata");
                    }
                    let data = self.xref.stream_data(&stream, suppress)?;
                    Ok(Some(std::str::from_utf8(&data)?.to_string()))
                })
            })
            .cloned()
    }

    /// `None` stands for an unspecified layout, which viewers are free to
    /// pick; it is not the same as `SinglePage`.
    pub fn page_layout(&self) -> Result<Option<PageLayout>> {
        self.page_layout
            .get_or_try_init(|| {
                self.view("page layout", || {
                    Ok(match self.xref.dict_get(&self.root, "PageLayout")? {
                        Primitive::Name(n) => PageLayout::from_name(n.as_str()),
                        _ => None,
                    })
                })
            })
            .cloned()
    }

    pub fn page_mode(&self) -> Result<PageMode> {
        self.page_mode
            .get_or_try_init(|| {
                let mode = self.view("page mode", || {
                    Ok(match self.xref.dict_get(&self.root, "PageMode")? {
                        Primitive::Name(n) => PageMode::from_name(n.as_str()),
                        _ => None,
                    })
                })?;
                Ok(mode.unwrap_or_default())
            })
            .copied()
    }

    pub fn viewer_preferences(&self) -> Result<Option<ViewerPreferences>> {
        self.viewer_preferences
            .get_or_try_init(|| {
                self.view("viewer preferences", || {
                    let dict = match self.xref.dict_get(&self.root, "ViewerPreferences")? {
                        Primitive::Dictionary(d) => d,
                        _ => return Ok(None),
                    };
                    let num_pages = match self.num_pages() {
                        Ok(n) => n,
                        Err(e) if e.is_missing_data() => return Err(e),
                        Err(_) => 0,
                    };
                    Ok(Some(ViewerPreferences::from_dict(&dict, &self.xref, num_pages)?))
                })
            })
            .cloned()
    }

    /// The destination of `/OpenAction`: either the action's target or a
    /// destination array given literally.
    pub fn open_action_destination(&self) -> Result<Option<Primitive>> {
        self.open_action_destination
            .get_or_try_init(|| {
                self.view("open action", || {
                    match self.xref.dict_get(&self.root, "OpenAction")? {
                        Primitive::Dictionary(action) => {
                            let mut wrapper = IndexMap::new();
                            wrapper.insert(Name::from("A"), Primitive::Dictionary(action));
                            let target = parse_dest_dictionary(
                                &Dict::from(wrapper),
                                &self.xref,
                                self.doc_base_url.as_deref(),
                            )?;
                            Ok(target.dest)
                        }
                        p @ Primitive::Array(_) => Ok(Some(p)),
                        _ => Ok(None),
                    }
                })
            })
            .cloned()
    }

    pub fn document_outline(&self) -> Result<Option<Vec<OutlineItem>>> {
        self.document_outline
            .get_or_try_init(|| {
                self.view("document outline", || {
                    read_document_outline(&self.root, &self.xref, self.doc_base_url.as_deref())
                })
            })
            .cloned()
    }

    /// `None` when the document is not encrypted or carries no numeric
    /// `/P`; otherwise the set bits among the defined permission flags.
    pub fn permissions(&self) -> Result<Option<Vec<PermissionFlag>>> {
        self.permissions
            .get_or_try_init(|| {
                self.view("permissions", || {
                    let encrypt = match self.xref.encrypt_dict() {
                        Some(d) => d,
                        None => return Ok(None),
                    };
                    let p = match self.xref.dict_get(&encrypt, "P")? {
                        Primitive::Integer(n) => n,
                        _ => return Ok(None),
                    };
                    // /P is a signed 32-bit value; wrap it into the
                    // unsigned bitfield
                    let flags = (p & 0xffff_ffff) as u32;
                    Ok(Some(
                        PermissionFlag::ALL
                            .iter()
                            .copied()
                            .filter(|&f| flags & f as u32 != 0)
                            .collect(),
                    ))
                })
            })
            .cloned()
    }

    fn fetch_destination(&self, p: Primitive) -> Result<Primitive> {
        Ok(match p {
            Primitive::Dictionary(d) => self.xref.dict_get(&d, "D")?,
            p => p,
        })
    }

    /// All named destinations: the `/Names/Dests` tree merged with the
    /// legacy `/Dests` dictionary.
    pub fn destinations(&self) -> Result<&IndexMap<String, Primitive>> {
        self.destinations.get_or_try_init(|| {
            let map = self.view("destinations", || {
                let mut dests = IndexMap::new();
                if let Some(names) = self.names_dict()? {
                    if let Primitive::Dictionary(tree_root) = self.xref.dict_get(&names, "Dests")? {
                        let tree = NameTree::new(&self.xref, tree_root);
                        for (key, raw) in tree.get_all()? {
                            let value = self.fetch_destination(self.xref.fetch_if_ref(&raw)?)?;
                            dests.insert(String::from_utf8_lossy(&key).into_owned(), value);
                        }
                    }
                }
                if let Primitive::Dictionary(legacy) = self.xref.dict_get(&self.root, "Dests")? {
                    for (name, raw) in legacy.iter() {
                        let value = self.fetch_destination(self.xref.fetch_if_ref(raw)?)?;
                        dests.insert(name.as_str().to_string(), value);
                    }
                }
                Ok(Some(dests))
            })?;
            Ok(map.unwrap_or_default())
        })
    }

    /// Single-destination lookup over the same two sources, with the same
    /// precedence as `destinations`: a legacy `/Dests` entry shadows the
    /// name tree.
    pub fn get_destination(&self, id: &str) -> Result<Option<Primitive>> {
        self.view("destination", || {
            if let Primitive::Dictionary(legacy) = self.xref.dict_get(&self.root, "Dests")? {
                if let Some(raw) = legacy.get(id) {
                    return Ok(Some(self.fetch_destination(self.xref.fetch_if_ref(raw)?)?));
                }
            }
            if let Some(names) = self.names_dict()? {
                if let Primitive::Dictionary(tree_root) = self.xref.dict_get(&names, "Dests")? {
                    let tree = NameTree::new(&self.xref, tree_root);
                    let hit = tree.get(&id.as_bytes().to_vec())?;
                    if !hit.is_null() {
                        return Ok(Some(self.fetch_destination(hit)?));
                    }
                }
            }
            Ok(None)
        })
    }

    /// One label per page, generated from the `/PageLabels` number tree.
    pub fn page_labels(&self) -> Result<Option<Vec<String>>> {
        self.page_labels
            .get_or_try_init(|| {
                self.view("page labels", || {
                    let tree_root = match self.xref.dict_get(&self.root, "PageLabels")? {
                        Primitive::Dictionary(d) => d,
                        _ => return Ok(None),
                    };
                    let tree = NumberTree::new(&self.xref, tree_root);
                    Ok(Some(read_page_labels(&tree, &self.xref, self.num_pages()?)?))
                })
            })
            .cloned()
    }

    /// Embedded files from `/Names/EmbeddedFiles`, keyed by filename.
    pub fn attachments(&self) -> Result<Option<IndexMap<String, Attachment>>> {
        self.attachments
            .get_or_try_init(|| {
                self.view("attachments", || {
                    let names = match self.names_dict()? {
                        Some(d) => d,
                        None => return Ok(None),
                    };
                    let tree_root = match self.xref.dict_get(&names, "EmbeddedFiles")? {
                        Primitive::Dictionary(d) => d,
                        _ => return Ok(None),
                    };
                    let tree = NameTree::new(&self.xref, tree_root);
                    let mut out = IndexMap::new();
                    for (_, raw) in tree.get_all()? {
                        let spec = match self.xref.fetch_if_ref(&raw)? {
                            Primitive::Dictionary(d) => d,
                            _ => continue,
                        };
                        match resolve_file_spec(&spec, &self.xref) {
                            Ok(att) => {
                                out.insert(att.filename.clone(), att);
                            }
                            Err(e) if e.is_missing_data() => return Err(e),
                            Err(e) => warn!("skipping unreadable file spec: {}", e),
                        }
                    }
                    Ok(if out.is_empty() { None } else { Some(out) })
                })
            })
            .cloned()
    }

    /// Document-level JavaScript: `/Names/JavaScript` entries with
    /// `S/JavaScript`, plus the synthesized `print({});` for a
    /// `Named/Print` open action.
    pub fn java_script(&self) -> Result<Option<Vec<String>>> {
        self.java_script
            .get_or_try_init(|| {
                self.view("JavaScript entries", || {
                    let mut out: Vec<String> = Vec::new();
                    if let Some(names) = self.names_dict()? {
                        if let Primitive::Dictionary(tree_root) =
                            self.xref.dict_get(&names, "JavaScript")?
                        {
                            let tree = NameTree::new(&self.xref, tree_root);
                            for (_, raw) in tree.get_all()? {
                                let dict = match self.xref.fetch_if_ref(&raw)? {
                                    Primitive::Dictionary(d) => d,
                                    _ => continue,
                                };
                                let is_js = matches!(self.xref.dict_get(&dict, "S")?,
                                    Primitive::Name(ref n) if n.as_str() == "JavaScript");
                                if !is_js {
                                    continue;
                                }
                                match self.xref.dict_get(&dict, "JS")? {
                                    Primitive::String(s) => out.push(s.to_string_lossy()),
                                    Primitive::Stream(s) => {
                                        let data = self.xref.stream_data(&s, false)?;
                                        out.push(String::from_utf8_lossy(&data).into_owned());
                                    }
                                    _ => {}
                                }
                            }
                        }
                    }
                    if let Primitive::Dictionary(action) = self.xref.dict_get(&self.root, "OpenAction")? {
                        let named = matches!(self.xref.dict_get(&action, "S")?,
                            Primitive::Name(ref n) if n.as_str() == "Named");
                        let print = matches!(self.xref.dict_get(&action, "N")?,
                            Primitive::Name(ref n) if n.as_str() == "Print");
                        if named && print {
                            out.push("print({});".to_string());
                        }
                    }
                    Ok(if out.is_empty() { None } else { Some(out) })
                })
            })
            .cloned()
    }

    ///////////////
    // Page tree //
    ///////////////

    /// Locates the page with the given index by walking the page tree,
    /// skipping subtrees whose cached leaf count ends before the target.
    /// Returns the page dictionary and its reference (absent for pages
    /// inlined directly into the tree).
    pub fn page_dict(&self, page_index: u32) -> Result<(Dict, Option<PlainRef>)> {
        let target = page_index as i64;
        let mut current: i64 = 0;
        let mut nodes: Vec<Primitive> =
            vec![self.root.get("Pages").cloned().unwrap_or(Primitive::Null)];
        let mut visited: HashSet<PlainRef> = HashSet::new();

        while let Some(node) = nodes.pop() {
            let (dict, node_ref) = match node {
                Primitive::Reference(r) => {
                    if let Some(&count) = self.page_kids_count_cache.borrow().get(&r) {
                        if count >= 0 && current + count <= target {
                            current += count;
                            continue;
                        }
                    }
                    if !visited.insert(r) {
                        bail!("cycle in the page tree at {}", r);
                    }
                    match self.xref.fetch(r)? {
                        Primitive::Dictionary(d) => (d, Some(r)),
                        p => bail!("page tree node {} is {}", r, p.get_debug_name()),
                    }
                }
                Primitive::Dictionary(d) => (d, None),
                p => bail!("page tree node is {}", p.get_debug_name()),
            };

            let typ = self.xref.dict_get(&dict, "Type")?;
            let is_leaf = matches!(typ, Primitive::Name(ref n) if n.as_str() == "Page")
                || (typ.is_null() && !dict.has("Kids") && dict.has("Contents"));
            if is_leaf {
                if let Some(r) = node_ref {
                    self.page_kids_count_cache.borrow_mut().insert(r, 1);
                }
                if current == target {
                    if let Some(r) = node_ref {
                        self.page_index_cache.borrow_mut().insert(r, page_index);
                    }
                    return Ok((dict, node_ref));
                }
                current += 1;
                continue;
            }

            // intermediate node: its leaf count bounds the subtree
            if let Ok(count) = self.xref.dict_get(&dict, "Count")?.as_integer() {
                if count >= 0 {
                    if let Some(r) = node_ref {
                        self.page_kids_count_cache.borrow_mut().insert(r, count);
                    }
                    if current + count <= target {
                        current += count;
                        continue;
                    }
                }
            }

            match self.xref.dict_get(&dict, "Kids")? {
                Primitive::Array(kids) => {
                    // push in reverse so the first kid is visited first
                    for kid in kids.iter().rev() {
                        nodes.push(kid.clone());
                    }
                }
                // broken writers inline a page dict where a tree node
                // belongs
                _ if dict.has("Contents") => {
                    if current == target {
                        return Ok((dict, node_ref));
                    }
                    current += 1;
                }
                p => bail!("/Kids of a page tree node is {}", p.get_debug_name()),
            }
        }
        Err(PdfError::PageOutOfBounds {
            page_nr: page_index,
            max: current.max(0) as u32,
        })
    }

    fn node_leaf_count(&self, dict: &Dict) -> Result<i64> {
        let typ = self.xref.dict_get(dict, "Type")?;
        let is_leaf = matches!(typ, Primitive::Name(ref n) if n.as_str() == "Page")
            || (typ.is_null() && !dict.has("Kids") && dict.has("Contents"));
        if is_leaf {
            Ok(1)
        } else {
            self.xref.dict_get(dict, "Count")?.as_integer()
        }
    }

    /// The inverse of `page_dict`: climbs `Parent` links, summing the leaf
    /// counts of all siblings before the node on each level.
    pub fn page_index(&self, page_ref: PlainRef) -> Result<u32> {
        if let Some(&i) = self.page_index_cache.borrow().get(&page_ref) {
            return Ok(i);
        }
        let mut total: i64 = 0;
        let mut current = page_ref;
        let mut visited: HashSet<PlainRef> = HashSet::new();
        visited.insert(current);

        loop {
            let node = t!(self.xref.fetch(current)).into_dictionary()?;
            let parent = match node.get("Parent") {
                Some(&Primitive::Reference(r)) => r,
                None => break,
                Some(p) => bail!("/Parent of a page tree node is {}", p.get_debug_name()),
            };
            if !visited.insert(parent) {
                bail!("cycle in the page tree parents at {}", parent);
            }
            let parent_dict = t!(self.xref.fetch(parent)).into_dictionary()?;
            let kids = self.xref.dict_get(&parent_dict, "Kids")?.into_array()?;
            let mut found = false;
            for kid in &kids {
                match *kid {
                    Primitive::Reference(r) if r == current => {
                        found = true;
                        break;
                    }
                    Primitive::Reference(r) => {
                        let kid_dict = t!(self.xref.fetch(r)).into_dictionary()?;
                        total += self.node_leaf_count(&kid_dict)?;
                    }
                    Primitive::Dictionary(ref d) => {
                        total += self.node_leaf_count(d)?;
                    }
                    ref p => bail!("page tree kid is {}", p.get_debug_name()),
                }
            }
            if !found {
                bail!("page {} is not among its parent's kids", current);
            }
            current = parent;
        }
        if total < 0 {
            bail!("negative page index {}", total);
        }
        self.page_index_cache.borrow_mut().insert(page_ref, total as u32);
        Ok(total as u32)
    }

    /// Purges the navigation caches. Purely a performance matter; every
    /// view recomputes to the same values.
    pub fn cleanup(&self) {
        self.page_kids_count_cache.borrow_mut().clear();
        self.page_index_cache.borrow_mut().clear();
        self.xref.clear_cache();
    }
}
