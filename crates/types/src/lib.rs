//! Shared data model for the Biotask task SDK: metainfo records and their
//! wire notation, external links, and the closed set of platform file kinds.

pub mod kinds;
pub mod links;
pub mod metainfo;
pub mod wire;

pub use kinds::{FileKind, KeyDecl, ValueKind};
pub use links::{ExternalLink, LinkError, ACCEPTED_SCHEMES};
pub use metainfo::{
    flags, keys, wire_list, FileReference, Metainfo, MetainfoValue, Organization, Person,
    PhysicalKind, Publication, ReferenceDirection,
};
pub use wire::WireError;
