//! Metainfo: the key-value metadata record attached to every platform file.
//!
//! Values travel to and from the backend in the `[tag, payload]` wire
//! notation (see [`crate::wire`]). The value set is closed: anything the
//! backend may send decodes into exactly one [`MetainfoValue`] variant, and
//! an unknown tag is a hard decode error.

use crate::links::ExternalLink;
use crate::wire::{self, tagged, untag, WireError};
use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

/// Reserved metainfo keys.
pub mod keys {
    pub const NAME: &str = "biotask:name";
    pub const DESCRIPTION: &str = "biotask:description";
    pub const ACCESSION: &str = "biotask:accession";
    pub const CREATION_DATE: &str = "biotask:dateCreated";
    pub const LAST_UPDATE_DATE: &str = "biotask:file.last-update";
    pub const DATA_URL: &str = "biotask.url:data";
    pub const DATA_LOCATION: &str = "biotask.location:data";
    pub const EXTERNAL_LINKS: &str = "biotask:links";
    pub const RAW_LOCATION: &str = "biotask.rawFile:data";
    pub const ORGANIZATION: &str = "biotask:organization";
    pub const CONTACT_PERSON: &str = "biotask:contactPerson";
    pub const STORAGE_DATA_SIZE: &str = "biotask:storageDataSize";
    pub const INDEX_DATA_SIZE: &str = "biotask:indexDataSize";
    pub const PROGRESS_INFO: &str = "biotask:progressInfo";
    pub const INITIALIZATION_WARNING: &str = "biotask.initialization:warning";

    /// Version declarations live under `biotask:tool.version:<toolset>`.
    pub const TOOL_VERSION_PREFIX: &str = "biotask:tool.version:";
    /// Free-form argument string(s) forwarded to a tool invocation.
    pub const TOOL_ARGUMENTS: &str = "biotask:tool.arguments";

    /// Presence of this key marks a file for content-checksum recording.
    pub const CHECKSUM_MARKER: &str = "biotask.checksum:markedForTests";
    /// Recorded checksums land under `biotask.checksum.sha256:<storage key>`.
    pub const CHECKSUM_PREFIX: &str = "biotask.checksum.sha256:";

    /// Key for the declared tool version of a toolset.
    pub fn tool_version(toolset: &str) -> String {
        format!("{TOOL_VERSION_PREFIX}{toolset}")
    }
}

/// Metainfo key flags, combined as bit masks.
pub mod flags {
    pub const REQUIRED_FOR_INITIALIZATION: u32 = 1 << 0;
    pub const FROZEN_AFTER_INITIALIZATION: u32 = 1 << 1;
    pub const SET_BY_INITIALIZATION: u32 = 1 << 2;
    pub const USED_AS_DATA_SOURCE: u32 = 1 << 3;
    pub const FILE: u32 = 1 << 4;
    pub const REQUIRED_FOR_COMPLETENESS: u32 = 1 << 5;
    pub const SINGLE: u32 = 1 << 6;
    pub const MULTIPLE: u32 = 1 << 7;

    pub const INITIALIZATION_PARAMETER: u32 =
        REQUIRED_FOR_INITIALIZATION | FROZEN_AFTER_INITIALIZATION;
    pub const INITIALIZATION_PARAMETER_FILE: u32 = INITIALIZATION_PARAMETER | FILE;
    pub const SINGLE_INITIALIZATION_PARAMETER_FILE: u32 = INITIALIZATION_PARAMETER_FILE | SINGLE;
    pub const MULTIPLE_INITIALIZATION_PARAMETER_FILE: u32 =
        INITIALIZATION_PARAMETER_FILE | MULTIPLE;
}

mod tags {
    pub const LIST: &str = "com.biotask.api.metainfo.MetainfoListValue";
    pub const STRING: &str = "com.biotask.api.metainfo.StringValue";
    pub const BOOLEAN: &str = "com.biotask.api.metainfo.BooleanValue";
    pub const INTEGER: &str = "com.biotask.api.metainfo.IntegerValue";
    pub const DECIMAL: &str = "com.biotask.api.metainfo.DecimalValue";
    pub const MEMORY_SIZE: &str = "com.biotask.api.metainfo.MemorySizeValue";
    pub const DATE_TIME: &str = "com.biotask.api.metainfo.DateTimeValue";
    pub const EXTERNAL_LINK: &str = "com.biotask.api.metainfo.ExternalLink";
    pub const FILE_REFERENCE: &str = "com.biotask.api.metainfo.FileReference";
    pub const PERSON: &str = "com.biotask.api.metainfo.Person";
    pub const ORGANIZATION: &str = "com.biotask.api.metainfo.OrganizationValue";
    pub const PUBLICATION: &str = "com.biotask.api.metainfo.Publication";
    pub const TEMPERATURE: &str = "com.biotask.api.metainfo.TemperatureValue";
    pub const TIME: &str = "com.biotask.api.metainfo.TimeValue";
    pub const EMPTY: &str = "com.biotask.api.metainfo.EmptyValue";
}

/// Direction of a file-to-file reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceDirection {
    Source,
    Derived,
}

impl ReferenceDirection {
    fn as_str(self) -> &'static str {
        match self {
            ReferenceDirection::Source => "SOURCE",
            ReferenceDirection::Derived => "DERIVED",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SOURCE" => Some(ReferenceDirection::Source),
            "DERIVED" => Some(ReferenceDirection::Derived),
            _ => None,
        }
    }
}

/// Reference to another platform file by accession.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    pub accession: String,
    pub direction: ReferenceDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Person {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Organization {
    pub name: String,
    pub department: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Publication {
    pub journal_name: String,
    pub issue_date: Option<String>,
    pub issue_number: Option<String>,
    pub title: String,
    pub authors: Option<String>,
    pub pages: Option<String>,
}

/// Kind discriminant for physical quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalKind {
    Temperature,
    Time,
}

/// Encode values as one list value, the shape metainfo mutation calls send.
pub fn wire_list(values: &[MetainfoValue]) -> Value {
    tagged(
        tags::LIST,
        json!({ "list": values.iter().map(MetainfoValue::to_wire).collect::<Vec<_>>() }),
    )
}

/// One metainfo value. Multi-valued keys hold several of these in order.
#[derive(Debug, Clone, PartialEq)]
pub enum MetainfoValue {
    Empty,
    String(String),
    Boolean(bool),
    Integer(i64),
    /// Decimal values keep their textual payload to avoid float round-trips.
    Decimal(String),
    MemorySize(u64),
    DateTime(DateTime<Utc>),
    ExternalLink(ExternalLink),
    FileReference(FileReference),
    Person(Person),
    Organization(Organization),
    Publication(Publication),
    Physical {
        kind: PhysicalKind,
        value: f64,
        unit: String,
    },
}

impl MetainfoValue {
    pub fn string(value: impl Into<String>) -> Self {
        MetainfoValue::String(value.into())
    }

    /// The textual payload for string values, `None` for everything else.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetainfoValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_wire(&self) -> Value {
        match self {
            MetainfoValue::Empty => tagged(tags::EMPTY, json!({})),
            MetainfoValue::String(s) => tagged(tags::STRING, json!({ "value": s })),
            MetainfoValue::Boolean(b) => tagged(tags::BOOLEAN, json!({ "value": b })),
            MetainfoValue::Integer(i) => tagged(tags::INTEGER, json!({ "value": i })),
            MetainfoValue::Decimal(d) => tagged(tags::DECIMAL, json!({ "value": d })),
            MetainfoValue::MemorySize(m) => tagged(tags::MEMORY_SIZE, json!({ "value": m })),
            MetainfoValue::DateTime(ts) => {
                tagged(tags::DATE_TIME, json!({ "date": ts.timestamp_millis() }))
            }
            MetainfoValue::ExternalLink(link) => tagged(
                tags::EXTERNAL_LINK,
                json!({
                    "text": link.text(),
                    "url": link.url(),
                    "format": link.format(),
                }),
            ),
            MetainfoValue::FileReference(reference) => tagged(
                tags::FILE_REFERENCE,
                json!({
                    "accession": reference.accession,
                    "direction": reference.direction.as_str(),
                }),
            ),
            MetainfoValue::Person(person) => tagged(
                tags::PERSON,
                json!({
                    "name": person.name,
                    "email": person.email,
                    "phone": person.phone,
                }),
            ),
            MetainfoValue::Organization(org) => tagged(
                tags::ORGANIZATION,
                json!({
                    "name": org.name,
                    "department": org.department,
                    "street": org.street,
                    "city": org.city,
                    "state": org.state,
                    "postalCode": org.postal_code,
                    "country": org.country,
                    "email": org.email,
                    "phone": org.phone,
                    "url": org.url,
                }),
            ),
            MetainfoValue::Publication(publication) => tagged(
                tags::PUBLICATION,
                json!({
                    "journalName": publication.journal_name,
                    "issueDate": publication.issue_date,
                    "issueNumber": publication.issue_number,
                    "title": publication.title,
                    "authors": publication.authors,
                    "pages": publication.pages,
                }),
            ),
            MetainfoValue::Physical { kind, value, unit } => {
                let tag = match kind {
                    PhysicalKind::Temperature => tags::TEMPERATURE,
                    PhysicalKind::Time => tags::TIME,
                };
                tagged(tag, json!({ "value": value, "unit": unit }))
            }
        }
    }

    pub fn from_wire(value: &Value) -> Result<Self, WireError> {
        let (tag, payload) = untag(value)?;
        match tag {
            tags::EMPTY => Ok(MetainfoValue::Empty),
            tags::STRING => Ok(MetainfoValue::String(wire::payload_str(
                tag, payload, "value",
            )?)),
            tags::BOOLEAN => payload
                .get("value")
                .and_then(Value::as_bool)
                .map(MetainfoValue::Boolean)
                .ok_or_else(|| WireError::BadPayload {
                    tag: tag.to_string(),
                    reason: "missing boolean field \"value\"".to_string(),
                }),
            tags::INTEGER => Ok(MetainfoValue::Integer(wire::payload_i64(
                tag, payload, "value",
            )?)),
            tags::DECIMAL => Ok(MetainfoValue::Decimal(wire::payload_str(
                tag, payload, "value",
            )?)),
            tags::MEMORY_SIZE => payload
                .get("value")
                .and_then(Value::as_u64)
                .map(MetainfoValue::MemorySize)
                .ok_or_else(|| WireError::BadPayload {
                    tag: tag.to_string(),
                    reason: "missing unsigned field \"value\"".to_string(),
                }),
            tags::DATE_TIME => {
                let millis = wire::payload_i64(tag, payload, "date")?;
                let ts = Utc
                    .timestamp_millis_opt(millis)
                    .single()
                    .ok_or_else(|| WireError::BadPayload {
                        tag: tag.to_string(),
                        reason: format!("timestamp out of range: {millis}"),
                    })?;
                Ok(MetainfoValue::DateTime(ts))
            }
            tags::EXTERNAL_LINK => {
                let url = wire::payload_str(tag, payload, "url")?;
                let text = wire::payload_opt_str(payload, "text");
                let format = payload.get("format").and_then(Value::as_object).map(|map| {
                    map.iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect()
                });
                let link = ExternalLink::build(text, &url, format).map_err(|err| {
                    WireError::BadPayload {
                        tag: tag.to_string(),
                        reason: err.to_string(),
                    }
                })?;
                Ok(MetainfoValue::ExternalLink(link))
            }
            tags::FILE_REFERENCE => {
                let accession = wire::payload_str(tag, payload, "accession")?;
                let raw_direction = wire::payload_str(tag, payload, "direction")?;
                let direction = ReferenceDirection::parse(&raw_direction).ok_or_else(|| {
                    WireError::BadPayload {
                        tag: tag.to_string(),
                        reason: format!("unknown direction: {raw_direction}"),
                    }
                })?;
                Ok(MetainfoValue::FileReference(FileReference {
                    accession,
                    direction,
                }))
            }
            tags::PERSON => Ok(MetainfoValue::Person(Person {
                name: wire::payload_str(tag, payload, "name")?,
                email: wire::payload_opt_str(payload, "email"),
                phone: wire::payload_opt_str(payload, "phone"),
            })),
            tags::ORGANIZATION => Ok(MetainfoValue::Organization(Organization {
                name: wire::payload_str(tag, payload, "name")?,
                department: wire::payload_opt_str(payload, "department"),
                street: wire::payload_opt_str(payload, "street"),
                city: wire::payload_opt_str(payload, "city"),
                state: wire::payload_opt_str(payload, "state"),
                postal_code: wire::payload_opt_str(payload, "postalCode"),
                country: wire::payload_opt_str(payload, "country"),
                email: wire::payload_opt_str(payload, "email"),
                phone: wire::payload_opt_str(payload, "phone"),
                url: wire::payload_opt_str(payload, "url"),
            })),
            tags::PUBLICATION => Ok(MetainfoValue::Publication(Publication {
                journal_name: wire::payload_str(tag, payload, "journalName")?,
                issue_date: wire::payload_opt_str(payload, "issueDate"),
                issue_number: wire::payload_opt_str(payload, "issueNumber"),
                title: wire::payload_str(tag, payload, "title")?,
                authors: wire::payload_opt_str(payload, "authors"),
                pages: wire::payload_opt_str(payload, "pages"),
            })),
            tags::TEMPERATURE | tags::TIME => {
                let kind = if tag == tags::TEMPERATURE {
                    PhysicalKind::Temperature
                } else {
                    PhysicalKind::Time
                };
                let value = payload.get("value").and_then(Value::as_f64).ok_or_else(|| {
                    WireError::BadPayload {
                        tag: tag.to_string(),
                        reason: "missing numeric field \"value\"".to_string(),
                    }
                })?;
                let unit = wire::payload_str(tag, payload, "unit")?;
                Ok(MetainfoValue::Physical { kind, value, unit })
            }
            other => Err(WireError::UnknownTag(other.to_string())),
        }
    }
}

impl std::fmt::Display for MetainfoValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetainfoValue::Empty => Ok(()),
            MetainfoValue::String(s) => write!(f, "{s}"),
            MetainfoValue::Boolean(b) => write!(f, "{b}"),
            MetainfoValue::Integer(i) => write!(f, "{i}"),
            MetainfoValue::Decimal(d) => write!(f, "{d}"),
            MetainfoValue::MemorySize(m) => write!(f, "{m}"),
            MetainfoValue::DateTime(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            MetainfoValue::ExternalLink(link) => write!(f, "{}", link.url()),
            MetainfoValue::FileReference(reference) => write!(f, "{}", reference.accession),
            MetainfoValue::Person(person) => write!(f, "{}", person.name),
            MetainfoValue::Organization(org) => write!(f, "{}", org.name),
            MetainfoValue::Publication(publication) => write!(f, "{}", publication.title),
            MetainfoValue::Physical { value, unit, .. } => write!(f, "{value} {unit}"),
        }
    }
}

/// Ordered metainfo record: key -> values, plus per-key flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metainfo {
    entries: IndexMap<String, Vec<MetainfoValue>>,
    key_flags: IndexMap<String, u32>,
}

impl Metainfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// First value under the key, if any.
    pub fn get(&self, key: &str) -> Option<&MetainfoValue> {
        self.entries.get(key).and_then(|values| values.first())
    }

    /// All values under the key; a missing key yields an empty slice.
    pub fn get_all(&self, key: &str) -> &[MetainfoValue] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value if it is a string, `None` otherwise.
    pub fn get_first_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetainfoValue::as_str)
    }

    /// Declared version for a toolset, read from the reserved key namespace.
    pub fn tool_version(&self, toolset: &str) -> Option<&str> {
        self.get_first_string(&keys::tool_version(toolset))
    }

    /// Append a value under the key.
    pub fn add(&mut self, key: impl Into<String>, value: MetainfoValue) {
        self.entries.entry(key.into()).or_default().push(value);
    }

    /// Replace all values under the key with a single value.
    pub fn replace(&mut self, key: impl Into<String>, value: MetainfoValue) {
        self.entries.insert(key.into(), vec![value]);
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<MetainfoValue>> {
        self.entries.shift_remove(key)
    }

    /// Set the flag mask for a key. A mask of zero clears the entry.
    pub fn set_flags(&mut self, key: impl Into<String>, mask: u32) {
        let key = key.into();
        if mask == 0 {
            self.key_flags.shift_remove(&key);
        } else {
            self.key_flags.insert(key, mask);
        }
    }

    pub fn flags(&self, key: &str) -> u32 {
        self.key_flags.get(key).copied().unwrap_or(0)
    }

    /// Encode as the `{"data": ..., "flags": ...}` object the bridge sends.
    /// Multi-valued keys are wrapped in the list notation.
    pub fn to_wire(&self) -> Value {
        let mut data = Map::new();
        for (key, values) in &self.entries {
            let encoded = match values.as_slice() {
                [single] => single.to_wire(),
                many => tagged(
                    tags::LIST,
                    json!({ "list": many.iter().map(MetainfoValue::to_wire).collect::<Vec<_>>() }),
                ),
            };
            data.insert(key.clone(), encoded);
        }
        let mut flag_map = Map::new();
        for (key, mask) in &self.key_flags {
            flag_map.insert(key.clone(), json!(mask));
        }
        json!({ "data": Value::Object(data), "flags": Value::Object(flag_map) })
    }

    /// Decode the bridge's metainfo object. Accepts either a bare data map
    /// or the full `{"data": ..., "flags": ...}` envelope.
    pub fn from_wire(value: &Value) -> Result<Self, WireError> {
        let (data, flag_map) = match value.get("data") {
            Some(data) => (data, value.get("flags")),
            None => (value, None),
        };
        let data = data
            .as_object()
            .ok_or_else(|| WireError::NotTagged(value.clone()))?;

        let mut metainfo = Metainfo::new();
        for (key, encoded) in data {
            let (tag, payload) = untag(encoded)?;
            if tag == tags::LIST {
                let items = payload
                    .get("list")
                    .and_then(Value::as_array)
                    .ok_or_else(|| WireError::BadPayload {
                        tag: tag.to_string(),
                        reason: "missing array field \"list\"".to_string(),
                    })?;
                for item in items {
                    metainfo.add(key.clone(), MetainfoValue::from_wire(item)?);
                }
            } else {
                metainfo.add(key.clone(), MetainfoValue::from_wire(encoded)?);
            }
        }

        if let Some(flag_map) = flag_map.and_then(Value::as_object) {
            for (key, mask) in flag_map {
                if let Some(mask) = mask.as_u64() {
                    metainfo.set_flags(key.clone(), mask as u32);
                }
            }
        }
        Ok(metainfo)
    }
}
