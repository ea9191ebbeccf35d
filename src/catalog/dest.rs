//! Normalization of destination and action dictionaries: GoTo, URI,
//! GoToR, Launch, Named and JavaScript actions all collapse into one
//! `DestTarget` record.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::*;
use crate::primitive::{Dict, Primitive};
use crate::xref::XRef;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestTarget {
    /// Absolute URL, only set when it validated against the document base.
    pub url: Option<String>,
    /// The raw URL text before validation.
    pub unsafe_url: Option<String>,
    /// In-document destination: a name, a string, or an explicit array.
    pub dest: Option<Primitive>,
    pub new_window: Option<bool>,
    /// Canonical name of a `Named` action.
    pub action: Option<String>,
}

// Matches the JavaScript snippets viewers generate for link annotations;
// everything else is not interpreted.
static JS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^\s*(app\.launchURL|window\.open)\(['"]([^'"]*)['"](?:,\s*(\w+)\))?"#)
        .unwrap()
});

static HAS_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").unwrap());

/// Interprets a dictionary holding an action (`/A`) or a destination
/// (`/Dest`), writing the normalized fields into a `DestTarget`.
pub fn parse_dest_dictionary(
    dict: &Dict,
    xref: &XRef,
    doc_base_url: Option<&str>,
) -> Result<DestTarget> {
    let mut target = DestTarget::default();
    let mut url_candidate: Option<String> = None;

    match xref.dict_get(dict, "A")? {
        Primitive::Dictionary(action) => {
            let action_type = match xref.dict_get(&action, "S")? {
                Primitive::Name(n) => n,
                p => {
                    warn!("action without a usable /S entry: {}", p.get_debug_name());
                    return Ok(target);
                }
            };
            match action_type.as_str() {
                "URI" => match xref.dict_get(&action, "URI")? {
                    Primitive::String(s) => {
                        let u = s.to_string_lossy();
                        url_candidate = Some(if u.starts_with("www.") {
                            format!("http://{}", u)
                        } else {
                            u
                        });
                    }
                    // some writers store the URI as a name
                    Primitive::Name(n) => url_candidate = Some(format!("/{}", n.as_str())),
                    _ => {}
                },
                "GoTo" => target.dest = valid_dest(xref.dict_get(&action, "D")?),
                "GoToR" | "Launch" => {
                    match xref.dict_get(&action, "F")? {
                        Primitive::Dictionary(f) => {
                            if let Primitive::String(s) = xref.dict_get(&f, "F")? {
                                url_candidate = Some(s.to_string_lossy());
                            }
                        }
                        Primitive::String(s) => url_candidate = Some(s.to_string_lossy()),
                        _ => {}
                    }
                    // the destination is relative to the remote document
                    // and rides along as a URL fragment
                    let fragment = match xref.dict_get(&action, "D")? {
                        Primitive::String(ref s) => Some(s.to_string_lossy()),
                        Primitive::Name(ref n) => Some(n.as_str().to_string()),
                        Primitive::Array(ref a) => Some(json_stringify_array(a)),
                        _ => None,
                    };
                    if let (Some(u), Some(fragment)) = (url_candidate.as_mut(), fragment) {
                        let base = u.split('#').next().unwrap_or("").to_string();
                        *u = format!("{}#{}", base, fragment);
                    }
                    if let Primitive::Boolean(b) = xref.dict_get(&action, "NewWindow")? {
                        target.new_window = Some(b);
                    }
                }
                "Named" => {
                    if let Primitive::Name(n) = xref.dict_get(&action, "N")? {
                        target.action = Some(n.as_str().to_string());
                    }
                }
                "JavaScript" => {
                    let js = match xref.dict_get(&action, "JS")? {
                        Primitive::String(s) => Some(s.to_string_lossy()),
                        Primitive::Stream(s) => {
                            Some(String::from_utf8_lossy(&xref.stream_data(&s, false)?).into_owned())
                        }
                        _ => None,
                    };
                    if let Some(caps) = js.as_deref().and_then(|js| JS_URL.captures(js)) {
                        url_candidate = Some(caps[2].to_string());
                        let is_launch = caps[1].eq_ignore_ascii_case("app.launchURL");
                        if is_launch && caps.get(3).map(|m| m.as_str()) == Some("true") {
                            target.new_window = Some(true);
                        }
                    }
                }
                other => warn!("unsupported action type {}", other),
            }
        }
        _ => target.dest = valid_dest(xref.dict_get(dict, "Dest")?),
    }

    if let Some(u) = url_candidate {
        if let Some(abs) = create_valid_absolute_url(&u, doc_base_url) {
            target.url = Some(abs);
        }
        target.unsafe_url = Some(u);
    }
    Ok(target)
}

fn valid_dest(p: Primitive) -> Option<Primitive> {
    match p {
        p @ (Primitive::Name(_) | Primitive::String(_) | Primitive::Array(_)) => Some(p),
        _ => None,
    }
}

/// Minimal scheme-aware join of a possibly relative URL against the
/// document base.
pub fn create_valid_absolute_url(url: &str, base: Option<&str>) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    if HAS_SCHEME.is_match(url) {
        return Some(url.to_string());
    }
    let base = base?;
    if !HAS_SCHEME.is_match(base) {
        return None;
    }
    let scheme_end = base.find(':').unwrap() + 1;
    let authority_start = if base[scheme_end..].starts_with("//") {
        scheme_end + 2
    } else {
        scheme_end
    };
    let path_start = base[authority_start..]
        .find('/')
        .map(|i| authority_start + i)
        .unwrap_or(base.len());
    if url.starts_with('/') {
        return Some(format!("{}{}", &base[..path_start], url));
    }
    let dir_end = base.rfind('/').map(|i| i + 1).unwrap_or(0);
    if dir_end <= path_start {
        Some(format!("{}/{}", &base[..path_start], url))
    } else {
        Some(format!("{}{}", &base[..dir_end], url))
    }
}

/// JSON rendering of an explicit destination array, the format remote
/// destinations use inside URL fragments.
fn json_stringify_array(arr: &[Primitive]) -> String {
    let mut out = String::from("[");
    for (i, p) in arr.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        json_stringify(p, &mut out);
    }
    out.push(']');
    out
}

fn json_stringify(p: &Primitive, out: &mut String) {
    match *p {
        Primitive::Null => out.push_str("null"),
        Primitive::Boolean(b) => out.push_str(if b { "true" } else { "false" }),
        Primitive::Integer(n) => out.push_str(&n.to_string()),
        Primitive::Number(f) => out.push_str(&f.to_string()),
        Primitive::Name(ref n) => {
            out.push('"');
            json_escape(n.as_str(), out);
            out.push('"');
        }
        Primitive::String(ref s) => {
            out.push('"');
            json_escape(&s.to_string_lossy(), out);
            out.push('"');
        }
        Primitive::Reference(r) => {
            out.push_str(&format!("{{\"num\":{},\"gen\":{}}}", r.id, r.gen));
        }
        Primitive::Array(ref a) => out.push_str(&json_stringify_array(a)),
        _ => out.push_str("null"),
    }
}

fn json_escape(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
}
