//! Validated subset of the `/ViewerPreferences` dictionary. Recognized
//! keys with the wrong type are logged and dropped; name-valued keys fall
//! back to their documented defaults; everything unrecognized is ignored.

use crate::error::*;
use crate::primitive::{Dict, Primitive};
use crate::xref::XRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonFullScreenPageMode {
    #[default]
    UseNone,
    UseOutlines,
    UseThumbs,
    UseOC,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    L2R,
    R2L,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageBoundary {
    MediaBox,
    #[default]
    CropBox,
    BleedBox,
    TrimBox,
    ArtBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintScaling {
    None,
    #[default]
    AppDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplex {
    Simplex,
    DuplexFlipShortEdge,
    DuplexFlipLongEdge,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerPreferences {
    pub hide_toolbar: Option<bool>,
    pub hide_menubar: Option<bool>,
    pub hide_window_ui: Option<bool>,
    pub fit_window: Option<bool>,
    pub center_window: Option<bool>,
    pub display_doc_title: Option<bool>,
    pub pick_tray_by_pdf_size: Option<bool>,
    pub non_full_screen_page_mode: NonFullScreenPageMode,
    pub direction: Direction,
    pub view_area: PageBoundary,
    pub view_clip: PageBoundary,
    pub print_area: PageBoundary,
    pub print_clip: PageBoundary,
    pub print_scaling: PrintScaling,
    pub duplex: Option<Duplex>,
    pub print_page_range: Option<Vec<u32>>,
    pub num_copies: Option<i64>,
}

fn bool_pref(xref: &XRef, dict: &Dict, key: &str) -> Result<Option<bool>> {
    match xref.dict_get(dict, key)? {
        Primitive::Boolean(b) => Ok(Some(b)),
        Primitive::Null => Ok(None),
        p => {
            warn!("/{} should be a boolean, found {}", key, p.get_debug_name());
            Ok(None)
        }
    }
}

fn name_pref<T>(
    xref: &XRef,
    dict: &Dict,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>> {
    match xref.dict_get(dict, key)? {
        Primitive::Name(n) => match parse(n.as_str()) {
            Some(v) => Ok(Some(v)),
            None => {
                warn!("/{} has the unknown value /{}", key, n.as_str());
                Ok(None)
            }
        },
        Primitive::Null => Ok(None),
        p => {
            warn!("/{} should be a name, found {}", key, p.get_debug_name());
            Ok(None)
        }
    }
}

fn boundary(name: &str) -> Option<PageBoundary> {
    match name {
        "MediaBox" => Some(PageBoundary::MediaBox),
        "CropBox" => Some(PageBoundary::CropBox),
        "BleedBox" => Some(PageBoundary::BleedBox),
        "TrimBox" => Some(PageBoundary::TrimBox),
        "ArtBox" => Some(PageBoundary::ArtBox),
        _ => None,
    }
}

impl ViewerPreferences {
    pub fn from_dict(dict: &Dict, xref: &XRef, num_pages: u32) -> Result<ViewerPreferences> {
        let mut prefs = ViewerPreferences {
            hide_toolbar: bool_pref(xref, dict, "HideToolbar")?,
            hide_menubar: bool_pref(xref, dict, "HideMenubar")?,
            hide_window_ui: bool_pref(xref, dict, "HideWindowUI")?,
            fit_window: bool_pref(xref, dict, "FitWindow")?,
            center_window: bool_pref(xref, dict, "CenterWindow")?,
            display_doc_title: bool_pref(xref, dict, "DisplayDocTitle")?,
            pick_tray_by_pdf_size: bool_pref(xref, dict, "PickTrayByPDFSize")?,
            ..ViewerPreferences::default()
        };
        prefs.non_full_screen_page_mode =
            name_pref(xref, dict, "NonFullScreenPageMode", |n| match n {
                "UseNone" => Some(NonFullScreenPageMode::UseNone),
                "UseOutlines" => Some(NonFullScreenPageMode::UseOutlines),
                "UseThumbs" => Some(NonFullScreenPageMode::UseThumbs),
                "UseOC" => Some(NonFullScreenPageMode::UseOC),
                _ => None,
            })?
            .unwrap_or_default();
        prefs.direction = name_pref(xref, dict, "Direction", |n| match n {
            "L2R" => Some(Direction::L2R),
            "R2L" => Some(Direction::R2L),
            _ => None,
        })?
        .unwrap_or_default();
        prefs.view_area = name_pref(xref, dict, "ViewArea", boundary)?.unwrap_or_default();
        prefs.view_clip = name_pref(xref, dict, "ViewClip", boundary)?.unwrap_or_default();
        prefs.print_area = name_pref(xref, dict, "PrintArea", boundary)?.unwrap_or_default();
        prefs.print_clip = name_pref(xref, dict, "PrintClip", boundary)?.unwrap_or_default();
        prefs.print_scaling = name_pref(xref, dict, "PrintScaling", |n| match n {
            "None" => Some(PrintScaling::None),
            "AppDefault" => Some(PrintScaling::AppDefault),
            _ => None,
        })?
        .unwrap_or_default();
        prefs.duplex = name_pref(xref, dict, "Duplex", |n| match n {
            "Simplex" => Some(Duplex::Simplex),
            "DuplexFlipShortEdge" => Some(Duplex::DuplexFlipShortEdge),
            "DuplexFlipLongEdge" => Some(Duplex::DuplexFlipLongEdge),
            _ => None,
        })?;

        match xref.dict_get(dict, "PrintPageRange")? {
            Primitive::Array(arr) => {
                let mut pages = Vec::with_capacity(arr.len());
                for p in &arr {
                    match xref.fetch_if_ref(p)?.as_integer() {
                        Ok(n) => pages.push(n),
                        Err(_) => {
                            pages.clear();
                            break;
                        }
                    }
                }
                // pairs of positive, non-decreasing page numbers within
                // the document
                let valid = pages.len() == arr.len()
                    && pages.len() % 2 == 0
                    && pages.iter().enumerate().all(|(i, &page)| {
                        page > 0
                            && (i == 0 || page >= pages[i - 1])
                            && page <= num_pages as i64
                    });
                if valid {
                    prefs.print_page_range = Some(pages.iter().map(|&p| p as u32).collect());
                } else {
                    warn!("/PrintPageRange holds an invalid page range");
                }
            }
            Primitive::Null => {}
            p => warn!("/PrintPageRange should be an array, found {}", p.get_debug_name()),
        }

        match xref.dict_get(dict, "NumCopies")? {
            Primitive::Integer(n) if n > 0 => prefs.num_copies = Some(n),
            Primitive::Integer(n) => warn!("/NumCopies must be positive, found {}", n),
            Primitive::Null => {}
            p => warn!("/NumCopies should be an integer, found {}", p.get_debug_name()),
        }

        Ok(prefs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::PlainRef;
    use crate::testutil::{parsed_xref, PdfBuilder};

    fn prefs_for(body: &str, num_pages: u32) -> ViewerPreferences {
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();
        b.add_object(3, body);
        let xref = parsed_xref(b);
        let dict = xref
            .fetch(PlainRef { id: 3, gen: 0 })
            .unwrap()
            .into_dictionary()
            .unwrap();
        ViewerPreferences::from_dict(&dict, &xref, num_pages).unwrap()
    }

    #[test]
    fn valid_preferences_pass_through() {
        let p = prefs_for(
            "<< /HideToolbar true /Direction /R2L /PrintScaling /None /Duplex /Simplex \
             /PrintPageRange [1 2 2 4] /NumCopies 3 /ViewArea /MediaBox >>",
            5,
        );
        assert_eq!(p.hide_toolbar, Some(true));
        assert_eq!(p.direction, Direction::R2L);
        assert_eq!(p.print_scaling, PrintScaling::None);
        assert_eq!(p.duplex, Some(Duplex::Simplex));
        assert_eq!(p.print_page_range, Some(vec![1, 2, 2, 4]));
        assert_eq!(p.num_copies, Some(3));
        assert_eq!(p.view_area, PageBoundary::MediaBox);
        // untouched keys keep their defaults
        assert_eq!(p.view_clip, PageBoundary::CropBox);
        assert_eq!(p.hide_menubar, None);
    }

    #[test]
    fn ill_typed_keys_are_dropped() {
        let p = prefs_for(
            "<< /HideToolbar (yes) /Direction 2 /NonFullScreenPageMode /Bogus >>",
            5,
        );
        assert_eq!(p.hide_toolbar, None);
        assert_eq!(p.direction, Direction::L2R);
        assert_eq!(p.non_full_screen_page_mode, NonFullScreenPageMode::UseNone);
    }

    #[test]
    fn invalid_page_ranges_are_dropped() {
        // odd length
        assert_eq!(prefs_for("<< /PrintPageRange [1 2 3] >>", 5).print_page_range, None);
        // decreasing
        assert_eq!(prefs_for("<< /PrintPageRange [3 1] >>", 5).print_page_range, None);
        // beyond the page count
        assert_eq!(prefs_for("<< /PrintPageRange [1 9] >>", 5).print_page_range, None);
        // zero page
        assert_eq!(prefs_for("<< /PrintPageRange [0 2] >>", 5).print_page_range, None);
    }

    #[test]
    fn non_positive_copies_are_dropped() {
        assert_eq!(prefs_for("<< /NumCopies 0 >>", 5).num_copies, None);
        assert_eq!(prefs_for("<< /NumCopies -2 >>", 5).num_copies, None);
    }
}
