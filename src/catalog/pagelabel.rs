//! Page label generation from the `/PageLabels` number tree. Each tree
//! entry switches the active numbering style, prefix and counter; every
//! page emits `prefix + rendered counter`.

use std::collections::HashMap;

use crate::error::*;
use crate::nametree::NumberTree;
use crate::primitive::Primitive;
use crate::xref::XRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    Decimal,
    RomanUpper,
    RomanLower,
    AlphaUpper,
    AlphaLower,
}

impl LabelStyle {
    fn from_name(name: &str) -> Option<LabelStyle> {
        match name {
            "D" => Some(LabelStyle::Decimal),
            "R" => Some(LabelStyle::RomanUpper),
            "r" => Some(LabelStyle::RomanLower),
            "A" => Some(LabelStyle::AlphaUpper),
            "a" => Some(LabelStyle::AlphaLower),
            _ => None,
        }
    }
}

pub fn read_page_labels(tree: &NumberTree, xref: &XRef, num_pages: u32) -> Result<Vec<String>> {
    let entries: HashMap<i64, Primitive> = tree.get_all()?.into_iter().collect();

    let mut labels = Vec::with_capacity(num_pages as usize);
    let mut style: Option<LabelStyle> = None;
    let mut prefix = String::new();
    let mut current_index: i64 = 1;

    for i in 0..num_pages as i64 {
        if let Some(raw) = entries.get(&i) {
            let dict = t!(xref.fetch_if_ref(raw)).into_dictionary()?;
            style = match xref.dict_get(&dict, "S")? {
                Primitive::Name(n) => Some(
                    LabelStyle::from_name(n.as_str())
                        .ok_or_else(|| other!("invalid label style /{}", n.as_str()))?,
                ),
                Primitive::Null => None,
                p => bail!("label style is {}", p.get_debug_name()),
            };
            prefix = match xref.dict_get(&dict, "P")? {
                Primitive::String(s) => s.to_string_lossy(),
                Primitive::Null => String::new(),
                p => bail!("label prefix is {}", p.get_debug_name()),
            };
            current_index = match xref.dict_get(&dict, "St")? {
                Primitive::Integer(n) if n >= 1 => n,
                Primitive::Null => 1,
                p => bail!("invalid /St value {}", p),
            };
        }
        let counter = match style {
            Some(LabelStyle::Decimal) => current_index.to_string(),
            Some(LabelStyle::RomanUpper) => to_roman(current_index),
            Some(LabelStyle::RomanLower) => to_roman(current_index).to_lowercase(),
            Some(LabelStyle::AlphaUpper) => to_alpha(current_index, b'A'),
            Some(LabelStyle::AlphaLower) => to_alpha(current_index, b'a'),
            None => String::new(),
        };
        labels.push(format!("{}{}", prefix, counter));
        current_index += 1;
    }
    Ok(labels)
}

fn to_roman(mut n: i64) -> String {
    const TABLE: [(i64, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for &(value, digits) in TABLE.iter() {
        while n >= value {
            out.push_str(digits);
            n -= value;
        }
    }
    out
}

/// Base-26 letter repetition: A..Z, then AA..ZZ, and so on.
fn to_alpha(n: i64, base: u8) -> String {
    let letter = (base + ((n - 1) % 26) as u8) as char;
    let repeats = ((n - 1) / 26 + 1) as usize;
    std::iter::repeat(letter).take(repeats).collect()
}
