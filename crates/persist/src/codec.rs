//! Entity codec: default name-tagged binary field serializer plus the
//! custom-codec extension seam.
//!
//! Wire shape, per field: name (u16 length + utf8), type tag (u8), value
//! length (u32), value bytes. The length prefix makes unknown fields
//! skippable; decoding stops quietly at the first truncated field, so a
//! corrupt payload restores the prefix that parses and leaves the rest of
//! the object at constructed defaults.

use glam::{Quat, Vec3};
use std::collections::BTreeMap;
use std::sync::Arc;
use zonesave_common::ClassRef;
use zonesave_world::{Entity, PropertyBag, PropertyValue};

const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_VEC3: u8 = 4;
const TAG_QUAT: u8 = 5;
const TAG_STR: u8 = 6;
const TAG_BYTES: u8 = 7;

/// Serialize a property bag into the name-tagged binary form.
pub fn encode_props(bag: &PropertyBag) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in bag.iter() {
        let bytes = encode_value(value);
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.push(tag_of(value));
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&bytes);
    }
    out
}

/// Apply a payload onto a bag of declared fields.
///
/// Only fields the bag already declares, with a matching type, are
/// overwritten. Unknown names, unknown tags, and type mismatches are
/// skipped; truncation ends the walk. Never fails.
pub fn decode_props_into(bag: &mut PropertyBag, payload: &[u8]) {
    let mut pos = 0usize;
    loop {
        let Some(name) = read_name(payload, &mut pos) else {
            break;
        };
        let Some(tag) = read_u8(payload, &mut pos) else {
            break;
        };
        let Some(len) = read_u32(payload, &mut pos) else {
            break;
        };
        let Some(bytes) = read_slice(payload, &mut pos, len as usize) else {
            break;
        };
        let Some(value) = decode_value(tag, bytes) else {
            tracing::debug!(field = %name, tag, "skipping unknown field tag");
            continue;
        };
        let apply = match bag.get(&name) {
            Some(declared) => {
                let matches =
                    std::mem::discriminant(declared) == std::mem::discriminant(&value);
                if !matches {
                    tracing::debug!(field = %name, "skipping type-mismatched field");
                }
                matches
            }
            None => {
                tracing::debug!(field = %name, "skipping undeclared field");
                false
            }
        };
        if apply {
            bag.set(name, value);
        }
    }
}

fn tag_of(value: &PropertyValue) -> u8 {
    match value {
        PropertyValue::Bool(_) => TAG_BOOL,
        PropertyValue::Int(_) => TAG_INT,
        PropertyValue::Float(_) => TAG_FLOAT,
        PropertyValue::Vec3(_) => TAG_VEC3,
        PropertyValue::Quat(_) => TAG_QUAT,
        PropertyValue::Str(_) => TAG_STR,
        PropertyValue::Bytes(_) => TAG_BYTES,
    }
}

fn encode_value(value: &PropertyValue) -> Vec<u8> {
    match value {
        PropertyValue::Bool(b) => vec![u8::from(*b)],
        PropertyValue::Int(i) => i.to_le_bytes().to_vec(),
        PropertyValue::Float(f) => f.to_le_bytes().to_vec(),
        PropertyValue::Vec3(v) => {
            let mut out = Vec::with_capacity(12);
            for f in v.to_array() {
                out.extend_from_slice(&f.to_le_bytes());
            }
            out
        }
        PropertyValue::Quat(q) => {
            let mut out = Vec::with_capacity(16);
            for f in q.to_array() {
                out.extend_from_slice(&f.to_le_bytes());
            }
            out
        }
        PropertyValue::Str(s) => s.as_bytes().to_vec(),
        PropertyValue::Bytes(b) => b.clone(),
    }
}

fn decode_value(tag: u8, bytes: &[u8]) -> Option<PropertyValue> {
    match tag {
        TAG_BOOL => (bytes.len() == 1).then(|| PropertyValue::Bool(bytes[0] != 0)),
        TAG_INT => Some(PropertyValue::Int(i64::from_le_bytes(
            bytes.try_into().ok()?,
        ))),
        TAG_FLOAT => Some(PropertyValue::Float(f32::from_le_bytes(
            bytes.try_into().ok()?,
        ))),
        TAG_VEC3 => {
            let f = read_f32s::<3>(bytes)?;
            Some(PropertyValue::Vec3(Vec3::from_array(f)))
        }
        TAG_QUAT => {
            let f = read_f32s::<4>(bytes)?;
            Some(PropertyValue::Quat(Quat::from_array(f)))
        }
        TAG_STR => Some(PropertyValue::Str(std::str::from_utf8(bytes).ok()?.into())),
        TAG_BYTES => Some(PropertyValue::Bytes(bytes.to_vec())),
        _ => None,
    }
}

fn read_f32s<const N: usize>(bytes: &[u8]) -> Option<[f32; N]> {
    if bytes.len() != N * 4 {
        return None;
    }
    let mut out = [0f32; N];
    for (i, chunk) in bytes.chunks_exact(4).enumerate() {
        out[i] = f32::from_le_bytes(chunk.try_into().ok()?);
    }
    Some(out)
}

fn read_u8(buf: &[u8], pos: &mut usize) -> Option<u8> {
    let b = *buf.get(*pos)?;
    *pos += 1;
    Some(b)
}

fn read_u32(buf: &[u8], pos: &mut usize) -> Option<u32> {
    let bytes = buf.get(*pos..*pos + 4)?;
    *pos += 4;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

fn read_slice<'a>(buf: &'a [u8], pos: &mut usize, len: usize) -> Option<&'a [u8]> {
    let bytes = buf.get(*pos..pos.checked_add(len)?)?;
    *pos += len;
    Some(bytes)
}

fn read_name(buf: &[u8], pos: &mut usize) -> Option<String> {
    let len_bytes = buf.get(*pos..*pos + 2)?;
    *pos += 2;
    let len = u16::from_le_bytes(len_bytes.try_into().ok()?) as usize;
    let bytes = read_slice(buf, pos, len)?;
    Some(std::str::from_utf8(bytes).ok()?.to_string())
}

/// Per-entity capture/restore seam.
///
/// Implementations must not mutate anything beyond the entity they are
/// handed; they run on the main context.
pub trait EntityCodec: Send + Sync {
    fn capture(&self, entity: &Entity) -> Vec<u8>;
    fn restore(&self, entity: &mut Entity, payload: &[u8]);
}

/// Whole-object serializer over the entity's declared fields.
pub struct DefaultCodec;

impl EntityCodec for DefaultCodec {
    fn capture(&self, entity: &Entity) -> Vec<u8> {
        encode_props(&entity.props)
    }

    fn restore(&self, entity: &mut Entity, payload: &[u8]) {
        decode_props_into(&mut entity.props, payload);
    }
}

/// Maps entity classes to their codec; falls back to [`DefaultCodec`].
pub struct CodecRegistry {
    custom: BTreeMap<ClassRef, Arc<dyn EntityCodec>>,
    default_codec: Arc<dyn EntityCodec>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self {
            custom: BTreeMap::new(),
            default_codec: Arc::new(DefaultCodec),
        }
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: ClassRef, codec: Arc<dyn EntityCodec>) {
        self.custom.insert(class, codec);
    }

    pub fn codec_for(&self, class: &ClassRef) -> &dyn EntityCodec {
        self.custom
            .get(class)
            .unwrap_or(&self.default_codec)
            .as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bag() -> PropertyBag {
        PropertyBag::new()
            .with("open", PropertyValue::Bool(true))
            .with("gold", PropertyValue::Int(-42))
            .with("fill", PropertyValue::Float(0.75))
            .with("anchor", PropertyValue::Vec3(Vec3::new(1.0, 2.0, 3.0)))
            .with("facing", PropertyValue::Quat(Quat::from_xyzw(0.0, 1.0, 0.0, 0.0)))
            .with("label", PropertyValue::Str("chest".into()))
            .with("seal", PropertyValue::Bytes(vec![0xde, 0xad]))
    }

    fn default_bag() -> PropertyBag {
        PropertyBag::new()
            .with("open", PropertyValue::Bool(false))
            .with("gold", PropertyValue::Int(0))
            .with("fill", PropertyValue::Float(0.0))
            .with("anchor", PropertyValue::Vec3(Vec3::ZERO))
            .with("facing", PropertyValue::Quat(Quat::IDENTITY))
            .with("label", PropertyValue::Str(String::new()))
            .with("seal", PropertyValue::Bytes(Vec::new()))
    }

    #[test]
    fn roundtrip_all_value_kinds() {
        let captured = sample_bag();
        let payload = encode_props(&captured);
        let mut restored = default_bag();
        decode_props_into(&mut restored, &payload);
        assert_eq!(restored, captured);
    }

    #[test]
    fn absent_fields_keep_defaults() {
        let payload = encode_props(&PropertyBag::new().with("gold", PropertyValue::Int(9)));
        let mut bag = default_bag();
        decode_props_into(&mut bag, &payload);
        assert_eq!(bag.get("gold"), Some(&PropertyValue::Int(9)));
        assert_eq!(bag.get("open"), Some(&PropertyValue::Bool(false)));
    }

    #[test]
    fn undeclared_fields_are_skipped() {
        let payload = encode_props(
            &PropertyBag::new()
                .with("ghost", PropertyValue::Int(1))
                .with("gold", PropertyValue::Int(7)),
        );
        let mut bag = default_bag();
        decode_props_into(&mut bag, &payload);
        assert!(bag.get("ghost").is_none());
        assert_eq!(bag.get("gold"), Some(&PropertyValue::Int(7)));
    }

    #[test]
    fn type_mismatch_is_skipped() {
        let payload = encode_props(&PropertyBag::new().with("gold", PropertyValue::Bool(true)));
        let mut bag = default_bag();
        decode_props_into(&mut bag, &payload);
        assert_eq!(bag.get("gold"), Some(&PropertyValue::Int(0)));
    }

    #[test]
    fn truncated_payload_restores_prefix() {
        let payload = encode_props(
            &PropertyBag::new()
                .with("aa", PropertyValue::Int(1))
                .with("bb", PropertyValue::Int(2)),
        );
        // Cut into the middle of the second field.
        let cut = &payload[..payload.len() - 3];
        let mut bag = PropertyBag::new()
            .with("aa", PropertyValue::Int(0))
            .with("bb", PropertyValue::Int(0));
        decode_props_into(&mut bag, cut);
        assert_eq!(bag.get("aa"), Some(&PropertyValue::Int(1)));
        assert_eq!(bag.get("bb"), Some(&PropertyValue::Int(0)));
    }

    #[test]
    fn garbage_payload_is_harmless() {
        let mut bag = default_bag();
        let before = bag.clone();
        decode_props_into(&mut bag, &[0xff; 64]);
        // A 0xffff name length overruns immediately; nothing applied.
        assert_eq!(bag, before);
    }

    #[test]
    fn unknown_tag_skipped_via_length_prefix() {
        let mut payload = Vec::new();
        // field "zz" with future tag 99, 4-byte body
        payload.extend_from_slice(&2u16.to_le_bytes());
        payload.extend_from_slice(b"zz");
        payload.push(99);
        payload.extend_from_slice(&4u32.to_le_bytes());
        payload.extend_from_slice(&[1, 2, 3, 4]);
        // then a real field
        payload.extend_from_slice(&encode_props(
            &PropertyBag::new().with("gold", PropertyValue::Int(3)),
        ));
        let mut bag = default_bag();
        decode_props_into(&mut bag, &payload);
        assert_eq!(bag.get("gold"), Some(&PropertyValue::Int(3)));
    }

    #[test]
    fn registry_falls_back_to_default() {
        let registry = CodecRegistry::new();
        let class = ClassRef::new("/Game/Classes/Chest");
        // Just exercise dispatch; DefaultCodec::capture of an empty bag is empty.
        let codec = registry.codec_for(&class);
        let payload = codec.capture(&test_entity());
        assert!(payload.is_empty());
    }

    #[test]
    fn registry_prefers_custom_codec() {
        struct Fixed;
        impl EntityCodec for Fixed {
            fn capture(&self, _entity: &Entity) -> Vec<u8> {
                vec![0xab]
            }
            fn restore(&self, entity: &mut Entity, payload: &[u8]) {
                entity
                    .props
                    .set("seen", PropertyValue::Bytes(payload.to_vec()));
            }
        }
        let mut registry = CodecRegistry::new();
        let class = ClassRef::new("/Game/Classes/Chest");
        registry.register(class.clone(), Arc::new(Fixed));
        let mut entity = test_entity();
        let payload = registry.codec_for(&class).capture(&entity);
        assert_eq!(payload, vec![0xab]);
        registry.codec_for(&class).restore(&mut entity, &payload);
        assert_eq!(
            entity.props.get("seen"),
            Some(&PropertyValue::Bytes(vec![0xab]))
        );
    }

    fn test_entity() -> Entity {
        use zonesave_common::{EntityId, Transform};
        use zonesave_world::Origin;
        Entity {
            id: EntityId::new(),
            name: "Chest_1".into(),
            path: "/Game/Maps/Forest_01:Chest_1".into(),
            class: ClassRef::new("/Game/Classes/Chest"),
            transform: Transform::default(),
            velocity: Vec3::ZERO,
            origin: Origin::Static,
            home_zone: None,
            template: false,
            being_destroyed: false,
            persistable: true,
            runtime_tracked: false,
            destroy_hook: false,
            post_load_count: 0,
            props: PropertyBag::new(),
            sub_objects: Vec::new(),
        }
    }
}
