//! The decoding subset needed to read cross-reference streams and object
//! streams: FlateDecode with PNG predictors. Everything else is the business
//! of a full filter pipeline and is rejected here.

use inflate::{inflate_bytes, inflate_bytes_zlib};

use crate::error::*;
use crate::primitive::{Dict, Primitive};
use crate::xref::Resolve;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamFilter {
    Flate {
        predictor: usize,
        n_components: usize,
        bits_per_component: usize,
        columns: usize,
    },
}

/// Reads `/Filter` and `/DecodeParms` of a stream dictionary. Both may be
/// single values or arrays, and any element may be an indirect reference.
pub fn filters_of(dict: &Dict, resolve: &dyn Resolve) -> Result<Vec<StreamFilter>> {
    let filter = match dict.get("Filter") {
        None => return Ok(Vec::new()),
        Some(p) => resolve_prim(p, resolve)?,
    };
    let names: Vec<String> = match filter {
        Primitive::Null => Vec::new(),
        Primitive::Name(ref n) => vec![n.as_str().into()],
        Primitive::Array(ref arr) => {
            let mut names = Vec::with_capacity(arr.len());
            for p in arr {
                names.push(resolve_prim(p, resolve)?.as_name()?.into());
            }
            names
        }
        ref p => return Err(PdfError::UnexpectedPrimitive {
            expected: "Name or Array",
            found: p.get_debug_name()
        }),
    };

    let params = match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        None => Vec::new(),
        Some(p) => match resolve_prim(p, resolve)? {
            Primitive::Null => Vec::new(),
            Primitive::Dictionary(d) => vec![Some(d)],
            Primitive::Array(arr) => {
                let mut out = Vec::with_capacity(arr.len());
                for p in arr {
                    out.push(match resolve_prim(&p, resolve)? {
                        Primitive::Dictionary(d) => Some(d),
                        _ => None,
                    });
                }
                out
            }
            p => return Err(PdfError::UnexpectedPrimitive {
                expected: "Dictionary or Array",
                found: p.get_debug_name()
            }),
        },
    };

    let mut filters = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let params = params.get(i).and_then(|p| p.as_ref());
        match name.as_str() {
            "FlateDecode" | "Fl" => filters.push(StreamFilter::Flate {
                predictor: int_param(params, resolve, "Predictor", 1)?,
                n_components: int_param(params, resolve, "Colors", 1)?,
                bits_per_component: int_param(params, resolve, "BitsPerComponent", 8)?,
                columns: int_param(params, resolve, "Columns", 1)?,
            }),
            other => bail!("unsupported stream filter /{}", other),
        }
    }
    Ok(filters)
}

fn resolve_prim(p: &Primitive, resolve: &dyn Resolve) -> Result<Primitive> {
    match *p {
        Primitive::Reference(r) => resolve.resolve_ref(r),
        ref p => Ok(p.clone()),
    }
}

fn int_param(params: Option<&Dict>, resolve: &dyn Resolve, key: &str, default: usize) -> Result<usize> {
    match params.and_then(|d| d.get(key)) {
        None => Ok(default),
        Some(p) => resolve_prim(p, resolve)?.as_usize(),
    }
}

pub fn decode_all(data: Vec<u8>, filters: &[StreamFilter]) -> Result<Vec<u8>> {
    let mut data = data;
    for filter in filters {
        data = decode(&data, filter)?;
    }
    Ok(data)
}

pub fn decode(data: &[u8], filter: &StreamFilter) -> Result<Vec<u8>> {
    match *filter {
        StreamFilter::Flate { predictor, n_components, bits_per_component, columns } => {
            flate_decode(data, predictor, n_components, bits_per_component, columns)
        }
    }
}

fn flate_decode(
    data: &[u8],
    predictor: usize,
    n_components: usize,
    bits_per_component: usize,
    columns: usize,
) -> Result<Vec<u8>> {
    // First flate decode
    let decoded = match inflate_bytes_zlib(data) {
        Ok(data) => data,
        Err(_) => {
            info!("invalid zlib header. trying without");
            inflate_bytes(data)?
        }
    };
    // Then unfilter (PNG)
    match predictor {
        0 | 1 => Ok(decoded),
        2 => bail!("TIFF predictor is not supported"),
        10..=15 => png_unfilter(&decoded, n_components, bits_per_component, columns),
        p => bail!("unknown predictor {}", p),
    }
}

fn png_unfilter(inp: &[u8], n_components: usize, bits_per_component: usize, columns: usize) -> Result<Vec<u8>> {
    let bpp = (n_components * bits_per_component).div_ceil(8).max(1);
    let row_len = (columns * n_components * bits_per_component).div_ceil(8);
    if row_len == 0 || inp.len() % (row_len + 1) != 0 {
        bail!("predictor data is not a whole number of rows ({} bytes, {} per row)", inp.len(), row_len + 1);
    }
    let rows = inp.len() / (row_len + 1);
    let mut out = vec![0u8; rows * row_len];

    let mut prev_row = vec![0u8; row_len];
    for r in 0..rows {
        let tag = inp[r * (row_len + 1)];
        let row_in = &inp[r * (row_len + 1) + 1..(r + 1) * (row_len + 1)];
        let row_out = &mut out[r * row_len..(r + 1) * row_len];
        for i in 0..row_len {
            let raw = row_in[i];
            let left = if i >= bpp { row_out[i - bpp] } else { 0 };
            let up = prev_row[i];
            let up_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
            row_out[i] = match tag {
                0 => raw,
                1 => raw.wrapping_add(left),
                2 => raw.wrapping_add(up),
                3 => raw.wrapping_add((((left as u16) + (up as u16)) / 2) as u8),
                4 => raw.wrapping_add(paeth(left, up, up_left)),
                t => bail!("unknown PNG predictor row tag {}", t),
            };
        }
        prev_row.copy_from_slice(row_out);
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
