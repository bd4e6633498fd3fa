//! Compiled resource table (ARSC) decoder and resource resolver.
//!
//! A table is a flat sequence of sibling chunks: a global value string pool,
//! a table header carrying the package count, and one package chunk per
//! package. Each package nests its own type-name and key-name pools followed
//! by type-spec and type sub-chunks; type chunks hold the per-configuration
//! entry tables the resolver reads.
//!
//! Resolution deliberately ignores device configurations: `string` lookups
//! take the first declaration-order variant holding the key, and
//! `drawable`/`mipmap` lookups collect the values of every variant. Full
//! platform config matching is out of scope.

use std::collections::{BTreeMap, HashMap};

use bitflags::bitflags;
use log::{debug, warn};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1, take_while_m_n};
use nom::character::complete::char;
use nom::combinator::{all_consuming, map, map_res, opt};
use nom::sequence::{preceded, separated_pair};
use nom::IResult;

use crate::chunk::{
    BinaryReader, ChunkHeader, NO_ENTRY, RES_STRING_POOL_TYPE, RES_TABLE_PACKAGE_TYPE,
    RES_TABLE_TYPE, RES_TABLE_TYPE_SPEC_TYPE, RES_TABLE_TYPE_TYPE,
};
use crate::string_pool::StringPool;
use crate::types::{AxmlError, AxmlResult};

bitflags! {
    /// Flags carried by each resource entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u16 {
        /// The entry is a map (style/attr-set); its inner name/value pairs
        /// are recognized but not decoded.
        const COMPLEX = 0x0001;
        /// The entry is declared public.
        const PUBLIC = 0x0002;
    }
}

/// A raw typed value: type tag plus 32-bit payload. Interpretation is the
/// attribute value interpreter's job; the resolver only dereferences `data`
/// into the global string pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedValue {
    pub size: u16,
    pub data_type: u8,
    pub data: u32,
}

impl TypedValue {
    fn parse(reader: &mut BinaryReader<'_>) -> AxmlResult<Self> {
        let size = reader.read_u16()?;
        let _res0 = reader.read_u8()?;
        let data_type = reader.read_u8()?;
        let data = reader.read_u32()?;
        Ok(TypedValue {
            size,
            data_type,
            data,
        })
    }
}

/// Entry payload: a simple value, or the header of an undecoded map entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPayload {
    Value(TypedValue),
    Map { parent: u32, count: u32 },
}

/// One resource entry in a type chunk's entry table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub size: u16,
    pub flags: EntryFlags,
    /// Index into the package's key-name pool.
    pub key: u32,
    pub payload: EntryPayload,
}

impl Entry {
    pub fn is_complex(&self) -> bool {
        self.flags.contains(EntryFlags::COMPLEX)
    }

    fn parse(reader: &mut BinaryReader<'_>, offset: usize) -> AxmlResult<Self> {
        reader.seek(offset)?;
        let size = reader.read_u16()?;
        let flags = EntryFlags::from_bits_retain(reader.read_u16()?);
        let key = reader.read_u32()?;
        let payload = if flags.contains(EntryFlags::COMPLEX) {
            let parent = reader.read_u32()?;
            let count = reader.read_u32()?;
            EntryPayload::Map { parent, count }
        } else {
            EntryPayload::Value(TypedValue::parse(reader)?)
        };
        Ok(Entry {
            size,
            flags,
            key,
            payload,
        })
    }
}

/// Device configuration descriptor attached to a type chunk. Decoded for
/// completeness; never consulted when resolving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub size: u32,
    pub imei: u32,
    pub locale_language: Option<String>,
    pub locale_country: Option<String>,
    pub screen_type: u32,
    pub input: u32,
    pub screen_input: u32,
    pub version: u32,
    pub screen_config: u32,
}

impl Config {
    fn parse(reader: &mut BinaryReader<'_>) -> AxmlResult<Self> {
        let start = reader.position();
        let size = reader.read_u32()?;
        if size < 28 {
            return Err(AxmlError::MalformedChunk {
                offset: start,
                detail: format!("configuration record declares size {size}"),
            });
        }
        let imei = reader.read_u32()?;
        let locale_language = locale_field(reader.read_bytes(2)?);
        let locale_country = locale_field(reader.read_bytes(2)?);
        let screen_type = reader.read_u32()?;
        let input = reader.read_u32()?;
        let screen_input = reader.read_u32()?;
        let version = reader.read_u32()?;
        let screen_config = reader.read_u32()?;
        Ok(Config {
            size,
            imei,
            locale_language,
            locale_country,
            screen_type,
            input,
            screen_input,
            version,
            screen_config,
        })
    }
}

fn locale_field(bytes: &[u8]) -> Option<String> {
    if bytes == [0, 0] {
        None
    } else {
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Per-type metadata from a type-spec chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    pub id: u8,
    pub entry_count: u32,
}

/// One configuration variant of a resource type: its sparse entry table and
/// a key-name index built while entries were read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableType {
    pub id: u8,
    pub entry_count: u32,
    pub entries_start: u32,
    pub config: Config,
    entries: Vec<Option<Entry>>,
    keys: HashMap<String, u16>,
}

impl TableType {
    /// Entry at a slot; `None` for empty slots and out-of-range indices.
    pub fn entry(&self, slot: u16) -> Option<&Entry> {
        self.entries.get(slot as usize).and_then(|e| e.as_ref())
    }

    /// Slot holding the entry with the given key name.
    pub fn key_slot(&self, key: &str) -> Option<u16> {
        self.keys.get(key).copied()
    }

    fn parse(reader: &mut BinaryReader<'_>, key_names: &StringPool) -> AxmlResult<(Self, usize)> {
        let header = ChunkHeader::read(reader)?;
        let id = reader.read_u8()?;
        let res0 = reader.read_u8()?;
        let res1 = reader.read_u16()?;
        if res0 != 0 || res1 != 0 {
            warn!(
                "type chunk at {:#x} has nonzero reserved fields ({res0}, {res1})",
                header.start
            );
        }
        let entry_count = reader.read_u32()?;
        let entries_start = reader.read_u32()?;
        let config_start = reader.position();
        let config = Config::parse(reader)?;
        reader.seek(config_start + config.size as usize)?;

        let mut offsets = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            offsets.push(reader.read_u32()?);
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut keys = HashMap::new();
        for (slot, offset) in offsets.into_iter().enumerate() {
            if offset == NO_ENTRY {
                entries.push(None);
                continue;
            }
            let entry = Entry::parse(reader, header.start + entries_start as usize + offset as usize)?;
            keys.insert(key_names.require(entry.key)?.to_string(), slot as u16);
            entries.push(Some(entry));
        }

        Ok((
            TableType {
                id,
                entry_count,
                entries_start,
                config,
                entries,
                keys,
            },
            header.end(),
        ))
    }
}

/// A decoded resource package: its two name pools and the type/spec chunks
/// keyed by type id. A type id may carry several `TableType` variants, one
/// per device configuration, kept in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub id: u32,
    pub name: String,
    type_names: StringPool,
    key_names: StringPool,
    types: BTreeMap<u8, Vec<TableType>>,
    specs: BTreeMap<u8, Vec<TypeSpec>>,
}

impl Package {
    /// Resource type name for a 1-based type id.
    pub fn type_name(&self, type_id: u8) -> Option<&str> {
        if type_id == 0 {
            return None;
        }
        self.type_names.get(type_id as u32 - 1)
    }

    /// 1-based type id for a resource type name.
    pub fn type_id(&self, name: &str) -> Option<u8> {
        self.type_names.position(name).map(|index| (index + 1) as u8)
    }

    pub fn type_variants(&self, type_id: u8) -> &[TableType] {
        self.types.get(&type_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn specs(&self, type_id: u8) -> &[TypeSpec] {
        self.specs.get(&type_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn first_type(&self, type_id: u8) -> Option<&TableType> {
        self.types.get(&type_id).and_then(|variants| variants.first())
    }

    /// Convert a readable id (`@type/key`, `type/key`) or a hex literal
    /// (`@0x7f010001`, `0x7f010001`) to its numeric form.
    pub fn id_from_readable(&self, readable: &str) -> AxmlResult<u32> {
        match parse_resource_id(readable)? {
            ParsedId::Hex(id) => Ok(id),
            ParsedId::Readable { type_name, key } => {
                let type_id = self
                    .type_id(type_name)
                    .ok_or_else(|| AxmlError::ResourceNotFound(format!("type {type_name}")))?;
                let first = self.first_type(type_id).ok_or_else(|| {
                    AxmlError::ResourceNotFound(format!("type {type_name} has no entries"))
                })?;
                let slot = first.key_slot(key).ok_or_else(|| {
                    AxmlError::ResourceNotFound(format!("key {key} in type {type_name}"))
                })?;
                Ok((self.id & 0xff) << 24 | (type_id as u32) << 16 | slot as u32)
            }
        }
    }

    /// Readable `@type/key` form of a numeric id, keyed through the first
    /// declaration-order type chunk for the id's type.
    pub fn readable_from_id(&self, id: u32) -> AxmlResult<String> {
        let (type_id, slot) = split_id(id);
        let type_name = self
            .type_name(type_id)
            .ok_or_else(|| AxmlError::ResourceNotFound(format!("type id {type_id:#x}")))?;
        let entry = self
            .first_type(type_id)
            .and_then(|first| first.entry(slot))
            .ok_or_else(|| AxmlError::ResourceNotFound(format!("@0x{id:08x}")))?;
        let key_name = self.key_names.require(entry.key)?;
        Ok(format!("@{type_name}/{key_name}"))
    }

    /// Resolve a readable or hex id to its stored value(s). See the module
    /// docs for the configuration-selection policy.
    pub fn find(&self, res_id: &str, global: &StringPool) -> AxmlResult<Resolution> {
        let id = self.id_from_readable(res_id)?;
        self.find_id(id, global)
    }

    pub fn find_id(&self, id: u32, global: &StringPool) -> AxmlResult<Resolution> {
        let (type_id, slot) = split_id(id);
        match self.type_name(type_id) {
            Some("string") => {
                for variant in self.type_variants(type_id) {
                    if let Some(EntryPayload::Value(value)) =
                        variant.entry(slot).map(|entry| &entry.payload)
                    {
                        return Ok(Resolution::Value(global.require(value.data)?.to_string()));
                    }
                }
                Err(AxmlError::ResourceNotFound(format!("@0x{id:08x}")))
            }
            Some("drawable") | Some("mipmap") => {
                let mut values = Vec::new();
                for variant in self.type_variants(type_id) {
                    if let Some(EntryPayload::Value(value)) =
                        variant.entry(slot).map(|entry| &entry.payload)
                    {
                        let text = global.require(value.data)?.to_string();
                        if !values.contains(&text) {
                            values.push(text);
                        }
                    }
                }
                Ok(Resolution::Values(values))
            }
            _ => Ok(Resolution::Unsupported),
        }
    }

    fn parse(reader: &mut BinaryReader<'_>) -> AxmlResult<(Self, usize)> {
        let header = ChunkHeader::read(reader)?;
        let id = reader.read_u32()?;
        let name = package_name(reader.read_bytes(256)?, header.start)?;
        let type_strings_offset = reader.read_u32()? as usize;
        let _last_public_type = reader.read_u32()?;
        let key_strings_offset = reader.read_u32()? as usize;
        let _last_public_key = reader.read_u32()?;

        let (type_names, _) = nested_pool(reader, header.start + type_strings_offset)?;
        let (key_names, key_pool_end) = nested_pool(reader, header.start + key_strings_offset)?;
        debug!(
            "package {name:?} (id {id:#04x}): {} types, {} keys",
            type_names.len(),
            key_names.len()
        );

        let mut types: BTreeMap<u8, Vec<TableType>> = BTreeMap::new();
        let mut specs: BTreeMap<u8, Vec<TypeSpec>> = BTreeMap::new();
        // Type-spec and type sub-chunks follow the key pool.
        let mut offset = key_pool_end;
        while offset < header.end() {
            reader.seek(offset)?;
            match reader.peek_u16()? {
                RES_TABLE_TYPE_TYPE => {
                    let (table_type, end) = TableType::parse(reader, &key_names)?;
                    types.entry(table_type.id).or_default().push(table_type);
                    offset = end;
                }
                RES_TABLE_TYPE_SPEC_TYPE => {
                    let chunk = ChunkHeader::read(reader)?;
                    let spec_id = reader.read_u8()?;
                    let _res0 = reader.read_u8()?;
                    let _res1 = reader.read_u16()?;
                    let entry_count = reader.read_u32()?;
                    specs.entry(spec_id).or_default().push(TypeSpec {
                        id: spec_id,
                        entry_count,
                    });
                    offset = chunk.end();
                }
                other => {
                    return Err(AxmlError::MalformedResourceTable {
                        offset,
                        type_tag: other,
                    })
                }
            }
        }

        Ok((
            Package {
                id,
                name,
                type_names,
                key_names,
                types,
                specs,
            },
            header.end(),
        ))
    }
}

fn nested_pool(reader: &mut BinaryReader<'_>, offset: usize) -> AxmlResult<(StringPool, usize)> {
    reader.seek(offset)?;
    let header = ChunkHeader::read(reader)?;
    if header.type_tag != RES_STRING_POOL_TYPE {
        return Err(AxmlError::MalformedResourceTable {
            offset: header.start,
            type_tag: header.type_tag,
        });
    }
    Ok((StringPool::parse(reader, &header)?, header.end()))
}

/// Package name: a fixed 256-byte UTF-16LE field, trimmed at the first NUL.
fn package_name(bytes: &[u8], offset: usize) -> AxmlResult<String> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0)
        .collect();
    String::from_utf16(&units).map_err(|err| AxmlError::MalformedChunk {
        offset,
        detail: format!("invalid package name: {err}"),
    })
}

fn split_id(id: u32) -> (u8, u16) {
    (((id >> 16) & 0xff) as u8, (id & 0xffff) as u16)
}

/// Result of a [`ResourceTable::find`] lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A single string value (the `string` resource kind).
    Value(String),
    /// De-duplicated values across configuration variants
    /// (`drawable`/`mipmap` kinds); may be empty.
    Values(Vec<String>),
    /// The id names a resource kind this resolver does not interpret.
    Unsupported,
}

/// A fully decoded resource table, usable as a resolver. Immutable once
/// built; lookups never invalidate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTable {
    packages: Vec<Package>,
    global_pool: StringPool,
    package_count: u32,
}

impl ResourceTable {
    /// Decode a complete `resources.arsc` buffer.
    pub fn from_bytes(data: &[u8]) -> AxmlResult<Self> {
        let mut reader = BinaryReader::new(data);
        let mut global_pool: Option<StringPool> = None;
        let mut packages = Vec::new();
        let mut package_count = 0u32;

        while reader.remaining() > 0 {
            match reader.peek_u16()? {
                RES_STRING_POOL_TYPE => {
                    let header = ChunkHeader::read(&mut reader)?;
                    global_pool = Some(StringPool::parse(&mut reader, &header)?);
                    reader.seek(header.end())?;
                }
                RES_TABLE_TYPE => {
                    // The packages follow as sibling chunks, not as payload:
                    // advance by the header size, not the chunk size.
                    let header = ChunkHeader::read(&mut reader)?;
                    package_count = reader.read_u32()?;
                    reader.seek(header.header_end())?;
                }
                RES_TABLE_PACKAGE_TYPE => {
                    let (package, end) = Package::parse(&mut reader)?;
                    packages.push(package);
                    reader.seek(end)?;
                }
                other => {
                    return Err(AxmlError::MalformedResourceTable {
                        offset: reader.position(),
                        type_tag: other,
                    })
                }
            }
        }

        let global_pool = global_pool.ok_or_else(|| AxmlError::MalformedChunk {
            offset: 0,
            detail: "resource table has no global string pool".to_string(),
        })?;
        Ok(ResourceTable {
            packages,
            global_pool,
            package_count,
        })
    }

    /// Package count as declared by the table header chunk.
    pub fn package_count(&self) -> u32 {
        self.package_count
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|pkg| pkg.name == name)
    }

    /// All strings of the global value pool, in declaration order.
    pub fn strings(&self) -> &[String] {
        self.global_pool.strings()
    }

    fn first_package(&self) -> AxmlResult<&Package> {
        self.packages.first().ok_or_else(|| {
            AxmlError::ResourceNotFound("resource table holds no packages".to_string())
        })
    }

    /// Resolve a readable or hex resource id against the first package.
    pub fn find(&self, res_id: &str) -> AxmlResult<Resolution> {
        self.first_package()?.find(res_id, &self.global_pool)
    }

    /// Resolve a numeric resource id against the first package.
    pub fn find_id(&self, id: u32) -> AxmlResult<Resolution> {
        self.first_package()?.find_id(id, &self.global_pool)
    }

    pub fn id_from_readable(&self, readable: &str) -> AxmlResult<u32> {
        self.first_package()?.id_from_readable(readable)
    }

    pub fn readable_from_id(&self, id: u32) -> AxmlResult<String> {
        self.first_package()?.readable_from_id(id)
    }
}

#[derive(Debug)]
enum ParsedId<'a> {
    Hex(u32),
    Readable { type_name: &'a str, key: &'a str },
}

fn word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

fn hex_id(input: &str) -> IResult<&str, ParsedId<'_>> {
    map_res(
        preceded(
            tag("0x"),
            take_while_m_n(8, 8, |c: char| c.is_ascii_hexdigit()),
        ),
        |digits| u32::from_str_radix(digits, 16).map(ParsedId::Hex),
    )(input)
}

fn readable_id(input: &str) -> IResult<&str, ParsedId<'_>> {
    map(
        separated_pair(word, char('/'), word),
        |(type_name, key)| ParsedId::Readable { type_name, key },
    )(input)
}

/// Accepted shapes: `@0xNNNNNNNN`, `0xNNNNNNNN` (exactly 8 hex digits),
/// `@type/key`, `type/key`. Anything else is `InvalidResourceId`.
fn parse_resource_id(input: &str) -> AxmlResult<ParsedId<'_>> {
    preceded(
        opt(char('@')),
        alt((all_consuming(hex_id), all_consuming(readable_id))),
    )(input)
    .map(|(_, parsed)| parsed)
    .map_err(|_| AxmlError::InvalidResourceId(input.to_string()))
}
