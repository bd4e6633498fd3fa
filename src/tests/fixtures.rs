//! Synthetic AXML/ARSC buffers for the integration cases.
//!
//! These builders emit just enough of each format to exercise the decoders:
//! a compiled manifest with a resource-id map and reference-typed attributes,
//! and a single-package resource table with multi-configuration drawable
//! variants. Layout mirrors what the platform toolchain produces.

use crate::chunk::NO_ENTRY;

pub(crate) const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

pub(crate) const LDPI_ICON: &str = "res/drawable-ldpi/ic_launcher.png";
pub(crate) const MDPI_ICON: &str = "res/drawable-mdpi/ic_launcher.png";
pub(crate) const HDPI_ICON: &str = "res/drawable-hdpi/ic_launcher.png";

pub(crate) fn u16le(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn u32le(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// UTF-16 string-pool chunk with no styles.
pub(crate) fn string_pool_chunk(strings: &[&str]) -> Vec<u8> {
    let mut string_data = Vec::new();
    let mut offsets = Vec::new();
    for s in strings {
        offsets.push(string_data.len() as u32);
        let units: Vec<u16> = s.encode_utf16().collect();
        u16le(&mut string_data, units.len() as u16);
        for unit in units {
            u16le(&mut string_data, unit);
        }
        u16le(&mut string_data, 0);
    }
    while string_data.len() % 4 != 0 {
        string_data.push(0);
    }

    let header_size = 28u16;
    let strings_start = header_size as u32 + strings.len() as u32 * 4;
    let total = strings_start + string_data.len() as u32;
    let mut chunk = Vec::new();
    u16le(&mut chunk, 0x0001);
    u16le(&mut chunk, header_size);
    u32le(&mut chunk, total);
    u32le(&mut chunk, strings.len() as u32);
    u32le(&mut chunk, 0); // style count
    u32le(&mut chunk, 0); // flags: UTF-16
    u32le(&mut chunk, strings_start);
    u32le(&mut chunk, 0); // styles start
    for offset in offsets {
        u32le(&mut chunk, offset);
    }
    chunk.extend_from_slice(&string_data);
    chunk
}

pub(crate) fn resource_map_chunk(ids: &[u32]) -> Vec<u8> {
    let mut chunk = Vec::new();
    u16le(&mut chunk, 0x0180);
    u16le(&mut chunk, 8);
    u32le(&mut chunk, 8 + ids.len() as u32 * 4);
    for id in ids {
        u32le(&mut chunk, *id);
    }
    chunk
}

pub(crate) fn namespace_chunk(type_tag: u16, prefix_idx: u32, uri_idx: u32) -> Vec<u8> {
    let mut chunk = Vec::new();
    u16le(&mut chunk, type_tag);
    u16le(&mut chunk, 16);
    u32le(&mut chunk, 24);
    u32le(&mut chunk, 1); // line number
    u32le(&mut chunk, NO_ENTRY); // comment
    u32le(&mut chunk, prefix_idx);
    u32le(&mut chunk, uri_idx);
    chunk
}

/// Attribute record fields: (ns_id, name_id, raw_value_id, flags, value).
pub(crate) type AttrRecord = (u32, u32, u32, u32, u32);

pub(crate) fn start_element_chunk(name_idx: u32, attrs: &[AttrRecord]) -> Vec<u8> {
    let mut chunk = Vec::new();
    u16le(&mut chunk, 0x0102);
    u16le(&mut chunk, 16);
    u32le(&mut chunk, 36 + attrs.len() as u32 * 20);
    u32le(&mut chunk, 1); // line number
    u32le(&mut chunk, NO_ENTRY); // comment
    u32le(&mut chunk, NO_ENTRY); // element namespace
    u32le(&mut chunk, name_idx);
    u16le(&mut chunk, 20); // attribute region start
    u16le(&mut chunk, 20); // attribute record size
    u16le(&mut chunk, attrs.len() as u16);
    u16le(&mut chunk, 0); // id attribute index
    u16le(&mut chunk, 0); // class attribute index
    u16le(&mut chunk, 0); // style attribute index
    for (ns_id, name_id, raw_value_id, flags, value) in attrs {
        u32le(&mut chunk, *ns_id);
        u32le(&mut chunk, *name_id);
        u32le(&mut chunk, *raw_value_id);
        u32le(&mut chunk, *flags);
        u32le(&mut chunk, *value);
    }
    chunk
}

pub(crate) fn end_element_chunk(name_idx: u32) -> Vec<u8> {
    let mut chunk = Vec::new();
    u16le(&mut chunk, 0x0103);
    u16le(&mut chunk, 16);
    u32le(&mut chunk, 24);
    u32le(&mut chunk, 1);
    u32le(&mut chunk, NO_ENTRY);
    u32le(&mut chunk, NO_ENTRY);
    u32le(&mut chunk, name_idx);
    chunk
}

pub(crate) fn cdata_chunk(text_idx: u32) -> Vec<u8> {
    let mut chunk = Vec::new();
    u16le(&mut chunk, 0x0104);
    u16le(&mut chunk, 16);
    u32le(&mut chunk, 28);
    u32le(&mut chunk, 1);
    u32le(&mut chunk, NO_ENTRY);
    u32le(&mut chunk, text_idx);
    // typed-value trailer, not interpreted by the decoder
    u16le(&mut chunk, 8);
    chunk.push(0);
    chunk.push(0x03);
    u32le(&mut chunk, text_idx);
    chunk
}

/// Wrap body chunks in a RES_XML document chunk with a patched total size.
pub(crate) fn xml_document(body: &[Vec<u8>]) -> Vec<u8> {
    let mut doc = Vec::new();
    u16le(&mut doc, 0x0003);
    u16le(&mut doc, 8);
    u32le(&mut doc, 0);
    for chunk in body {
        doc.extend_from_slice(chunk);
    }
    let total = doc.len() as u32;
    doc[4..8].copy_from_slice(&total.to_le_bytes());
    doc
}

// Manifest string pool layout. The first four entries line up with the
// resource-id map slots.
pub(crate) const STR_VERSION_CODE: u32 = 0;
pub(crate) const STR_VERSION_NAME: u32 = 1;
pub(crate) const STR_ICON: u32 = 2;
pub(crate) const STR_MIN_SDK: u32 = 3;
pub(crate) const STR_ANDROID: u32 = 4;
pub(crate) const STR_NS_URI: u32 = 5;
pub(crate) const STR_PACKAGE: u32 = 6;
pub(crate) const STR_PACKAGE_VALUE: u32 = 7;
pub(crate) const STR_VERSION_VALUE: u32 = 8;
pub(crate) const STR_MANIFEST: u32 = 9;
pub(crate) const STR_APPLICATION: u32 = 10;
pub(crate) const STR_USES_SDK: u32 = 11;

const TYPE_STRING_FLAGS: u32 = 0x0300_0008;
const TYPE_INT_DEC_FLAGS: u32 = 0x1000_0008;
const TYPE_REFERENCE_FLAGS: u32 = 0x0100_0008;

/// A compiled manifest for `example.app.sample` with versionCode 101,
/// versionName `1.0.1-malware2`, a uses-sdk element and an application icon
/// referencing `@0x7f020000`.
pub(crate) fn sample_manifest() -> Vec<u8> {
    let strings = [
        "versionCode",
        "versionName",
        "icon",
        "minSdkVersion",
        "android",
        ANDROID_NS,
        "package",
        "example.app.sample",
        "1.0.1-malware2",
        "manifest",
        "application",
        "uses-sdk",
    ];
    xml_document(&[
        string_pool_chunk(&strings),
        resource_map_chunk(&[0x0101_021b, 0x0101_021c, 0x0101_0002, 0x0101_020c]),
        namespace_chunk(0x0100, STR_ANDROID, STR_NS_URI),
        start_element_chunk(
            STR_MANIFEST,
            &[
                (
                    NO_ENTRY,
                    STR_PACKAGE,
                    STR_PACKAGE_VALUE,
                    TYPE_STRING_FLAGS,
                    STR_PACKAGE_VALUE,
                ),
                (STR_NS_URI, STR_VERSION_CODE, NO_ENTRY, TYPE_INT_DEC_FLAGS, 101),
                (
                    STR_NS_URI,
                    STR_VERSION_NAME,
                    STR_VERSION_VALUE,
                    TYPE_STRING_FLAGS,
                    STR_VERSION_VALUE,
                ),
            ],
        ),
        start_element_chunk(
            STR_USES_SDK,
            &[(STR_NS_URI, STR_MIN_SDK, NO_ENTRY, TYPE_INT_DEC_FLAGS, 19)],
        ),
        end_element_chunk(STR_USES_SDK),
        start_element_chunk(
            STR_APPLICATION,
            &[(
                STR_NS_URI,
                STR_ICON,
                NO_ENTRY,
                TYPE_REFERENCE_FLAGS,
                0x7f02_0000,
            )],
        ),
        end_element_chunk(STR_APPLICATION),
        end_element_chunk(STR_MANIFEST),
        namespace_chunk(0x0101, STR_ANDROID, STR_NS_URI),
    ])
}

/// One slot of a type chunk's entry table: `(key_index, complex, data)`.
pub(crate) type SlotSpec = Option<(u32, bool, u32)>;

pub(crate) fn type_chunk(id: u8, config_seed: u32, slots: &[SlotSpec]) -> Vec<u8> {
    let header_size = 52u16;
    let entries_start = header_size as u32 + slots.len() as u32 * 4;

    let mut entry_data = Vec::new();
    let mut offsets = Vec::new();
    for slot in slots {
        match slot {
            None => offsets.push(NO_ENTRY),
            Some((key, complex, data)) => {
                offsets.push(entry_data.len() as u32);
                if *complex {
                    u16le(&mut entry_data, 16);
                    u16le(&mut entry_data, 0x0001); // FLAG_COMPLEX
                    u32le(&mut entry_data, *key);
                    u32le(&mut entry_data, 0); // parent
                    u32le(&mut entry_data, 0); // map count
                } else {
                    u16le(&mut entry_data, 8);
                    u16le(&mut entry_data, 0);
                    u32le(&mut entry_data, *key);
                    u16le(&mut entry_data, 8); // value size
                    entry_data.push(0); // res0
                    entry_data.push(0x03); // TYPE_STRING
                    u32le(&mut entry_data, *data);
                }
            }
        }
    }

    let mut chunk = Vec::new();
    u16le(&mut chunk, 0x0201);
    u16le(&mut chunk, header_size);
    u32le(&mut chunk, entries_start + entry_data.len() as u32);
    chunk.push(id);
    chunk.push(0); // reserved
    u16le(&mut chunk, 0); // reserved
    u32le(&mut chunk, slots.len() as u32);
    u32le(&mut chunk, entries_start);
    // configuration record: 32 bytes, varied only by its screen-type word
    u32le(&mut chunk, 32);
    u32le(&mut chunk, 0); // imei
    chunk.extend_from_slice(&[0, 0]); // language
    chunk.extend_from_slice(&[0, 0]); // country
    u32le(&mut chunk, config_seed); // screen type
    u32le(&mut chunk, 0); // input
    u32le(&mut chunk, 0); // screen input
    u32le(&mut chunk, 0); // version
    u32le(&mut chunk, 0); // screen config
    for offset in offsets {
        u32le(&mut chunk, offset);
    }
    chunk.extend_from_slice(&entry_data);
    chunk
}

pub(crate) fn type_spec_chunk(id: u8, entry_count: u32) -> Vec<u8> {
    let mut chunk = Vec::new();
    u16le(&mut chunk, 0x0202);
    u16le(&mut chunk, 16);
    u32le(&mut chunk, 16 + entry_count * 4);
    chunk.push(id);
    chunk.push(0);
    u16le(&mut chunk, 0);
    u32le(&mut chunk, entry_count);
    for _ in 0..entry_count {
        u32le(&mut chunk, 0); // configuration mask
    }
    chunk
}

pub(crate) fn package_chunk(id: u32, name: &str, sub_chunks: &[Vec<u8>]) -> Vec<u8> {
    let type_pool = string_pool_chunk(&["attr", "drawable", "string"]);
    let key_pool = string_pool_chunk(&["ic_launcher", "app_name", "greeting", "fancy"]);
    let header_size = 284u16;

    let mut pkg = Vec::new();
    u16le(&mut pkg, 0x0200);
    u16le(&mut pkg, header_size);
    u32le(&mut pkg, 0); // patched below
    u32le(&mut pkg, id);
    let mut name_field = [0u8; 256];
    for (i, unit) in name.encode_utf16().enumerate().take(127) {
        name_field[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    pkg.extend_from_slice(&name_field);
    u32le(&mut pkg, header_size as u32); // type strings offset
    u32le(&mut pkg, 3); // last public type
    u32le(&mut pkg, header_size as u32 + type_pool.len() as u32); // key strings offset
    u32le(&mut pkg, 4); // last public key
    pkg.extend_from_slice(&type_pool);
    pkg.extend_from_slice(&key_pool);
    for chunk in sub_chunks {
        pkg.extend_from_slice(chunk);
    }
    let total = pkg.len() as u32;
    pkg[4..8].copy_from_slice(&total.to_le_bytes());
    pkg
}

// Key-pool indices used by the sample table.
pub(crate) const KEY_IC_LAUNCHER: u32 = 0;
pub(crate) const KEY_APP_NAME: u32 = 1;
pub(crate) const KEY_GREETING: u32 = 2;
pub(crate) const KEY_FANCY: u32 = 3;

/// A one-package table: four drawable variants (one a duplicate) for
/// `ic_launcher`, and two string variants exercising the first-variant
/// resolution policy plus a skipped complex entry.
pub(crate) fn sample_resource_table() -> Vec<u8> {
    let global = [LDPI_ICON, MDPI_ICON, HDPI_ICON, "Sample App", "Hello"];

    let sub_chunks = vec![
        type_spec_chunk(2, 1),
        type_chunk(2, 120, &[Some((KEY_IC_LAUNCHER, false, 0))]),
        type_chunk(2, 160, &[Some((KEY_IC_LAUNCHER, false, 1))]),
        type_chunk(2, 240, &[Some((KEY_IC_LAUNCHER, false, 2))]),
        type_chunk(2, 320, &[Some((KEY_IC_LAUNCHER, false, 2))]),
        type_spec_chunk(3, 3),
        type_chunk(3, 0, &[Some((KEY_APP_NAME, false, 3)), None, None]),
        type_chunk(
            3,
            1,
            &[
                None,
                Some((KEY_GREETING, false, 4)),
                Some((KEY_FANCY, true, 0)),
            ],
        ),
    ];

    let mut table = Vec::new();
    u16le(&mut table, 0x0002);
    u16le(&mut table, 12);
    u32le(&mut table, 0); // patched below
    u32le(&mut table, 1); // package count
    table.extend_from_slice(&string_pool_chunk(&global));
    table.extend_from_slice(&package_chunk(0x7f, "example.app.sample", &sub_chunks));
    let total = table.len() as u32;
    table[4..8].copy_from_slice(&total.to_le_bytes());
    table
}
