//! Lazily resolved, fault tolerant access to the object graph of a PDF
//! file: cross-reference parsing with recovery, on-demand object fetching
//! over fully resident or progressively loaded bytes, and the catalog
//! views built on top (page tree, outline, destinations, labels,
//! attachments, viewer preferences, permissions).

#[macro_use]
extern crate snafu;
#[macro_use]
extern crate log;

#[macro_use]
pub mod error;
pub mod catalog;
pub mod chunked;
pub mod crypt;
pub mod document;
pub mod enc;
pub mod nametree;
pub mod object_loader;
pub mod parser;
pub mod primitive;
pub mod stream;
pub mod xref;

#[cfg(test)]
mod testutil;

pub use crate::document::Document;
pub use crate::error::PdfError;
