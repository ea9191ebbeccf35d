//! The document outline: a doubly linked sibling chain (`First`/`Next`)
//! per level, flattened into a tree of owned items. Corrupt files can
//! close the chains into cycles, so traversal is bounded by a visited set
//! and never relies on structural termination.

use std::collections::{HashSet, VecDeque};

use crate::catalog::dest::parse_dest_dictionary;
use crate::error::*;
use crate::primitive::{Dict, PlainRef, Primitive};
use crate::xref::XRef;

#[derive(Debug, Clone, PartialEq)]
pub struct OutlineItem {
    pub title: String,
    pub dest: Option<Primitive>,
    pub url: Option<String>,
    pub unsafe_url: Option<String>,
    pub new_window: Option<bool>,
    pub action: Option<String>,
    /// Label color, black unless a valid `/C` overrides it.
    pub rgb: [u8; 3],
    pub count: Option<i64>,
    pub bold: bool,
    pub italic: bool,
    pub items: Vec<OutlineItem>,
}

pub fn read_document_outline(
    root: &Dict,
    xref: &XRef,
    doc_base_url: Option<&str>,
) -> Result<Option<Vec<OutlineItem>>> {
    let outlines = match xref.dict_get(root, "Outlines")? {
        Primitive::Dictionary(d) => d,
        _ => return Ok(None),
    };
    let first = match outlines.get("First") {
        Some(&Primitive::Reference(r)) => r,
        _ => return Ok(None),
    };

    // Items land in an arena with parent links; children are always
    // discovered after their parent, so indices only point backwards.
    let mut arena: Vec<(OutlineItem, Option<usize>)> = Vec::new();
    let mut queue: VecDeque<(PlainRef, Option<usize>)> = VecDeque::new();
    let mut visited: HashSet<PlainRef> = HashSet::new();
    queue.push_back((first, None));

    while let Some((start, parent)) = queue.pop_front() {
        let mut current = Some(start);
        while let Some(r) = current {
            if !visited.insert(r) {
                break;
            }
            let dict = match xref.fetch(r)? {
                Primitive::Dictionary(d) => d,
                p => bail!("outline item {} is {}", r, p.get_debug_name()),
            };
            let title = match xref.dict_get(&dict, "Title")? {
                Primitive::String(s) => s.to_string_lossy(),
                _ => bail!("outline item {} has no /Title", r),
            };
            let target = parse_dest_dictionary(&dict, xref, doc_base_url)?;

            let rgb = match xref.dict_get(&dict, "C")? {
                Primitive::Array(ref c) if c.len() == 3 => {
                    let mut rgb = [0u8; 3];
                    let mut ok = true;
                    for (slot, p) in rgb.iter_mut().zip(c) {
                        match xref.fetch_if_ref(p)?.as_number() {
                            Ok(v) => *slot = (v.clamp(0.0, 1.0) * 255.0).round() as u8,
                            Err(_) => ok = false,
                        }
                    }
                    if ok { rgb } else { [0, 0, 0] }
                }
                _ => [0, 0, 0],
            };
            let flags = xref.dict_get(&dict, "F")?.as_integer().unwrap_or(0);
            let count = xref.dict_get(&dict, "Count")?.as_integer().ok();

            arena.push((
                OutlineItem {
                    title,
                    dest: target.dest,
                    url: target.url,
                    unsafe_url: target.unsafe_url,
                    new_window: target.new_window,
                    action: target.action,
                    rgb,
                    count,
                    bold: flags & 2 != 0,
                    italic: flags & 1 != 0,
                    items: Vec::new(),
                },
                parent,
            ));
            let index = arena.len() - 1;
            if let Some(&Primitive::Reference(child)) = dict.get("First") {
                queue.push_back((child, Some(index)));
            }
            current = match dict.get("Next") {
                Some(&Primitive::Reference(next)) => Some(next),
                _ => None,
            };
        }
    }

    // assemble bottom-up: every node's children were pushed after it
    let parents: Vec<Option<usize>> = arena.iter().map(|&(_, p)| p).collect();
    let mut slots: Vec<Option<OutlineItem>> = arena.into_iter().map(|(i, _)| Some(i)).collect();
    let mut roots = Vec::new();
    for i in (0..slots.len()).rev() {
        let mut item = slots[i].take().unwrap();
        // children arrived in reverse while unwinding
        item.items.reverse();
        match parents[i] {
            Some(p) => slots[p].as_mut().unwrap().items.push(item),
            None => roots.push(item),
        }
    }
    roots.reverse();
    Ok(if roots.is_empty() { None } else { Some(roots) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{parsed_xref, PdfBuilder};

    fn outline_doc() -> PdfBuilder {
        let mut b = PdfBuilder::new();
        b.add_object(
            1,
            "<< /Type /Catalog /Pages 2 0 R /Outlines 3 0 R >>",
        );
        b.add_object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
        b
    }

    #[test]
    fn reads_nested_outline() {
        let mut b = outline_doc();
        b.add_object(3, "<< /Type /Outlines /First 4 0 R /Last 5 0 R /Count 3 >>");
        b.add_object(
            4,
            "<< /Title (Chapter 1) /Next 5 0 R /First 6 0 R /Last 6 0 R /C [1 0 0] /F 2 /Count 1 >>",
        );
        b.add_object(5, "<< /Title (Chapter 2) /Prev 4 0 R /Dest /chap2 >>");
        b.add_object(6, "<< /Title (Section 1.1) /Parent 4 0 R /F 1 >>");
        let xref = parsed_xref(b);
        let root = xref.catalog_dict().unwrap();

        let outline = read_document_outline(&root, &xref, None).unwrap().unwrap();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].title, "Chapter 1");
        assert_eq!(outline[0].rgb, [255, 0, 0]);
        assert!(outline[0].bold);
        assert!(!outline[0].italic);
        assert_eq!(outline[0].count, Some(1));
        assert_eq!(outline[0].items.len(), 1);
        assert_eq!(outline[0].items[0].title, "Section 1.1");
        assert!(outline[0].items[0].italic);
        assert_eq!(outline[1].title, "Chapter 2");
        assert_eq!(outline[1].dest, Some(Primitive::Name("chap2".into())));
        assert!(outline[1].items.is_empty());
    }

    #[test]
    fn cyclic_sibling_chain_terminates() {
        let mut b = outline_doc();
        b.add_object(3, "<< /Type /Outlines /First 4 0 R >>");
        b.add_object(4, "<< /Title (A) /Next 5 0 R >>");
        // the chain loops back to the first item
        b.add_object(5, "<< /Title (B) /Next 4 0 R >>");
        let xref = parsed_xref(b);
        let root = xref.catalog_dict().unwrap();

        let outline = read_document_outline(&root, &xref, None).unwrap().unwrap();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].title, "A");
        assert_eq!(outline[1].title, "B");
    }

    #[test]
    fn missing_title_is_a_format_error() {
        let mut b = outline_doc();
        b.add_object(3, "<< /Type /Outlines /First 4 0 R >>");
        b.add_object(4, "<< /Dest /nowhere >>");
        let xref = parsed_xref(b);
        let root = xref.catalog_dict().unwrap();

        assert!(read_document_outline(&root, &xref, None).is_err());
    }

    #[test]
    fn absent_outline_reads_as_none() {
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();
        let xref = parsed_xref(b);
        let root = xref.catalog_dict().unwrap();
        assert_eq!(read_document_outline(&root, &xref, None).unwrap(), None);
    }
}
