//! The closed set of platform file kinds and their declared keys.
//!
//! Each kind carries a static table mapping the metainfo keys it owns to the
//! kind of value allowed there. Storage keys are written through PUT and
//! never through plain metainfo mutation; everything else is checked against
//! the declared value kind when a script writes it.

use crate::metainfo::{flags, MetainfoValue};
use serde::{Deserialize, Serialize};

/// What a declared key is allowed to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Physical data written via PUT; not client-writable as metainfo.
    Storage,
    Text,
    Boolean,
    Integer,
    ExternalLink,
    FileReference,
}

impl ValueKind {
    /// Whether a metainfo value written by a script satisfies this kind.
    /// Storage keys always refuse: their payload arrives through PUT.
    pub fn accepts(self, value: &MetainfoValue) -> bool {
        match self {
            ValueKind::Storage => false,
            ValueKind::Text => matches!(value, MetainfoValue::String(_)),
            ValueKind::Boolean => matches!(value, MetainfoValue::Boolean(_)),
            ValueKind::Integer => matches!(value, MetainfoValue::Integer(_)),
            ValueKind::ExternalLink => matches!(value, MetainfoValue::ExternalLink(_)),
            ValueKind::FileReference => matches!(value, MetainfoValue::FileReference(_)),
        }
    }
}

/// One declared key of a file kind.
#[derive(Debug, Clone, Copy)]
pub struct KeyDecl {
    pub key: &'static str,
    pub kind: ValueKind,
    pub flags: u32,
}

const fn required(key: &'static str, kind: ValueKind) -> KeyDecl {
    KeyDecl {
        key,
        kind,
        flags: flags::REQUIRED_FOR_COMPLETENESS,
    }
}

const fn optional(key: &'static str, kind: ValueKind) -> KeyDecl {
    KeyDecl {
        key,
        kind,
        flags: 0,
    }
}

/// Platform file kinds a task script can operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Folder,
    Dataset,
    Raw,
    Report,
    Index,
    Auxiliary,
    AlignedReads,
    UnalignedReads,
    ReferenceGenome,
    Variation,
    GenomeAnnotation,
    CodonTable,
}

impl FileKind {
    /// Backend interface name used on the bridge wire.
    pub fn interface_name(&self) -> &'static str {
        match self {
            FileKind::Folder => "com.biotask.api.files.IFolder",
            FileKind::Dataset => "com.biotask.api.files.IDataset",
            FileKind::Raw => "com.biotask.api.files.IRawFile",
            FileKind::Report => "com.biotask.api.files.IReportFile",
            FileKind::Index => "com.biotask.api.files.IIndexFile",
            FileKind::Auxiliary => "com.biotask.api.files.IAuxiliaryFile",
            FileKind::AlignedReads => "com.biotask.bio.files.IAlignedReads",
            FileKind::UnalignedReads => "com.biotask.bio.files.IUnalignedReads",
            FileKind::ReferenceGenome => "com.biotask.bio.files.IReferenceGenome",
            FileKind::Variation => "com.biotask.bio.files.IVariationFile",
            FileKind::GenomeAnnotation => "com.biotask.bio.files.IGenomeAnnotations",
            FileKind::CodonTable => "com.biotask.bio.files.ICodonTable",
        }
    }

    /// The declared key table for this kind. Containers declare nothing.
    pub fn declarations(&self) -> &'static [KeyDecl] {
        const RAW: &[KeyDecl] = &[required("biotask.location:data", ValueKind::Storage)];
        const REPORT: &[KeyDecl] = &[
            required("biotask.location:file", ValueKind::Storage),
            optional("biotask.data:descriptors", ValueKind::Text),
        ];
        const INDEX: &[KeyDecl] = &[
            required("biotask:master", ValueKind::FileReference),
            optional("biotask:index.schema", ValueKind::Text),
            optional("biotask:index.namespaces", ValueKind::Text),
        ];
        const AUXILIARY: &[KeyDecl] = &[
            required("biotask.location:data", ValueKind::Storage),
            optional("biotask:master", ValueKind::FileReference),
        ];
        const ALIGNED_READS: &[KeyDecl] = &[
            required("biotask.location:bamfile", ValueKind::Storage),
            required("biotask.location:baifile", ValueKind::Storage),
            optional("biotask.location:transcript-aligned-bamfile", ValueKind::Storage),
            optional("biotask.location:unmapped-reads", ValueKind::Storage),
            optional("biotask.location:features-annotation", ValueKind::Storage),
        ];
        const UNALIGNED_READS: &[KeyDecl] = &[
            required("biotask.location:reads", ValueKind::Storage),
            optional("biotask.bio:hasPairedReads", ValueKind::Boolean),
        ];
        const REFERENCE_GENOME: &[KeyDecl] = &[
            required("biotask.location:sequence", ValueKind::Storage),
            required("biotask.location:annotations", ValueKind::Storage),
            optional("biotask.location:index_fasta", ValueKind::Storage),
        ];
        const VARIATION: &[KeyDecl] = &[
            required("biotask.location:data", ValueKind::Storage),
            optional("biotask.location:index", ValueKind::Storage),
            optional("biotask.location:tabix", ValueKind::Storage),
            optional("biotask.bio:referenceGenome", ValueKind::FileReference),
        ];
        const GENOME_ANNOTATION: &[KeyDecl] = &[
            required("biotask.location:data", ValueKind::Storage),
            optional("biotask.location:gene_index", ValueKind::Storage),
        ];
        const CODON_TABLE: &[KeyDecl] = &[
            required("biotask.location:data", ValueKind::Storage),
            optional("biotask.location:table", ValueKind::Storage),
        ];

        match self {
            FileKind::Folder | FileKind::Dataset => &[],
            FileKind::Raw => RAW,
            FileKind::Report => REPORT,
            FileKind::Index => INDEX,
            FileKind::Auxiliary => AUXILIARY,
            FileKind::AlignedReads => ALIGNED_READS,
            FileKind::UnalignedReads => UNALIGNED_READS,
            FileKind::ReferenceGenome => REFERENCE_GENOME,
            FileKind::Variation => VARIATION,
            FileKind::GenomeAnnotation => GENOME_ANNOTATION,
            FileKind::CodonTable => CODON_TABLE,
        }
    }

    /// Declaration for a single key, if this kind declares it.
    pub fn declaration(&self, key: &str) -> Option<&'static KeyDecl> {
        self.declarations().iter().find(|decl| decl.key == key)
    }

    /// Storage keys this kind declares.
    pub fn storage_keys(&self) -> impl Iterator<Item = &'static str> {
        self.declarations()
            .iter()
            .filter(|decl| decl.kind == ValueKind::Storage)
            .map(|decl| decl.key)
    }

    /// Keys that must be populated before the file counts as complete.
    pub fn required_keys(&self) -> impl Iterator<Item = &'static str> {
        self.declarations()
            .iter()
            .filter(|decl| decl.flags & flags::REQUIRED_FOR_COMPLETENESS != 0)
            .map(|decl| decl.key)
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
