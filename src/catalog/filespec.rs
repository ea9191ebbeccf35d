//! Embedded-file specifications. Only files embedded through `/EF` are
//! supported; related-file trees and external specs resolve to an empty
//! attachment so callers still see the name.

use crate::error::*;
use crate::primitive::{Dict, Primitive};
use crate::xref::XRef;

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content: Option<Vec<u8>>,
}

// platform keys in priority order
const NAME_KEYS: [&str; 5] = ["UF", "F", "Unix", "Mac", "DOS"];

pub fn resolve_file_spec(dict: &Dict, xref: &XRef) -> Result<Attachment> {
    let mut filename = None;
    for key in NAME_KEYS {
        if let Primitive::String(s) = xref.dict_get(dict, key)? {
            filename = Some(normalize_filename(&s.to_string_lossy()));
            break;
        }
    }
    let filename = filename.unwrap_or_else(|| {
        warn!("file specification without a usable name");
        "unnamed".into()
    });

    if dict.has("RF") {
        warn!("related file specifications are not supported");
        return Ok(Attachment { filename, content: None });
    }

    let content = match xref.dict_get(dict, "EF")? {
        Primitive::Dictionary(ef) => {
            let mut data = None;
            for key in NAME_KEYS {
                match xref.dict_get(&ef, key)? {
                    Primitive::Stream(s) => {
                        data = Some(xref.stream_data(&s, false)?);
                        break;
                    }
                    Primitive::Null => {}
                    p => warn!("/EF /{} is {}", key, p.get_debug_name()),
                }
            }
            if data.is_none() {
                warn!("embedded file stream is missing");
            }
            data
        }
        _ => {
            warn!("file specifications without /EF are not supported");
            None
        }
    };
    Ok(Attachment { filename, content })
}

fn normalize_filename(name: &str) -> String {
    name.replace("\\\\", "\\").replace("\\/", "/").replace('\\', "/")
}
