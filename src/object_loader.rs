//! Preloading a subgraph of the object graph over a chunked byte source:
//! walk the graph, batch up every missing byte range, request them, and
//! revisit the nodes that suspended until the walk completes without I/O.

use std::collections::HashSet;
use std::ops::Range;

use crate::error::*;
use crate::primitive::{Dict, PlainRef, Primitive};
use crate::stream::BaseStream;
use crate::xref::XRef;

pub struct ObjectLoader<'a> {
    xref: &'a XRef,
}

impl<'a> ObjectLoader<'a> {
    pub fn new(xref: &'a XRef) -> ObjectLoader<'a> {
        ObjectLoader { xref }
    }

    /// Makes every byte reachable from `dict[keys]` resident, so the
    /// subgraph can afterwards be walked without raising `MissingData`.
    pub fn load(&self, dict: &Dict, keys: &[&str]) -> Result<()> {
        let stream = self.xref.stream();
        // a resident source has nothing to request
        if stream.is_range_loaded(stream.start(), stream.end()) {
            return Ok(());
        }

        let mut ref_set: HashSet<PlainRef> = HashSet::new();
        let mut stack: Vec<Primitive> =
            keys.iter().filter_map(|&k| dict.get(k).cloned()).collect();

        loop {
            let mut pending: Vec<Range<usize>> = Vec::new();
            let mut revisit: Vec<PlainRef> = Vec::new();

            while let Some(node) = stack.pop() {
                match node {
                    Primitive::Reference(r) => {
                        if !ref_set.insert(r) {
                            continue;
                        }
                        match self.xref.fetch(r) {
                            Ok(value) => stack.push(value),
                            Err(e) => match e.missing_range() {
                                Some((begin, end)) => {
                                    revisit.push(r);
                                    pending.push(begin..end);
                                }
                                None => return Err(e),
                            },
                        }
                    }
                    Primitive::Stream(ref s) => {
                        pending.extend(
                            stream.missing_ranges(s.file_range.start, s.file_range.end),
                        );
                        push_children_of_dict(&s.dict, &mut stack);
                    }
                    Primitive::Dictionary(ref d) => push_children_of_dict(d, &mut stack),
                    Primitive::Array(ref a) => {
                        for v in a {
                            if may_have_children(v) {
                                stack.push(v.clone());
                            }
                        }
                    }
                    _ => {}
                }
            }

            if pending.is_empty() {
                return Ok(());
            }
            stream.request_ranges(&pending)?;
            // the suspended references get another chance now that their
            // bytes arrived
            for r in &revisit {
                ref_set.remove(r);
            }
            stack.extend(revisit.into_iter().map(Primitive::Reference));
        }
    }
}

fn may_have_children(p: &Primitive) -> bool {
    matches!(
        p,
        Primitive::Reference(_) | Primitive::Dictionary(_) | Primitive::Array(_) | Primitive::Stream(_)
    )
}

fn push_children_of_dict(dict: &Dict, stack: &mut Vec<Primitive>) {
    for (_, v) in dict.iter() {
        if may_have_children(v) {
            stack.push(v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunked::{ChunkedStream, MemorySource};
    use crate::testutil::{parse_blocking, PdfBuilder};
    use crate::xref::XRef;

    #[test]
    fn preloads_a_subgraph() {
        let mut b = PdfBuilder::new();
        b.add_object(1, "<< /Type /Catalog /Pages 2 0 R >>");
        b.add_object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
        b.add_object(3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>");
        b.add_stream_object(4, "", b"page content bytes");
        let (data, xref_pos) = b.finish("/Root 1 0 R");

        let stream = ChunkedStream::with_chunk_size(Box::new(MemorySource::new(data)), 32);
        let xref = XRef::new(Box::new(stream), 0);
        xref.set_start_xref(xref_pos);
        parse_blocking(&xref, false).unwrap();

        let root = xref.catalog_dict().unwrap();
        ObjectLoader::new(&xref).load(&root, &["Pages"]).unwrap();

        // the whole page tree, including the content stream bytes, is
        // resident now: plain fetches cannot suspend
        let pages = xref.fetch(crate::primitive::PlainRef { id: 2, gen: 0 }).unwrap();
        let kids = pages.as_dict().unwrap().get("Kids").unwrap().as_array().unwrap().to_vec();
        let page = xref.fetch_if_ref(&kids[0]).unwrap();
        let contents = xref
            .fetch_if_ref(page.as_dict().unwrap().get("Contents").unwrap())
            .unwrap();
        let data = xref.stream_data(contents.as_stream().unwrap(), false).unwrap();
        assert_eq!(data, b"page content bytes");
    }

    #[test]
    fn resident_source_resolves_immediately() {
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();
        let xref = crate::testutil::parsed_xref(b);
        let root = xref.catalog_dict().unwrap();
        ObjectLoader::new(&xref).load(&root, &["Pages"]).unwrap();
    }
}
