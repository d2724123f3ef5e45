//! Converts any `Serialize` value into a JSON tree that is always safe to store.
//!
//! The walk keeps the identity (address and type) of every value on the current path, so a
//! value reached again through `Rc`/`RefCell` back-edges becomes [`CIRCULAR`] instead of recursing
//! forever. A member whose `Serialize` impl fails becomes [`UNSERIALIZABLE`] while its siblings
//! survive. Non-finite floats become `null`, 128-bit integers outside the 64-bit range become
//! decimal strings, and non-string map keys are rendered as strings.

use std::fmt::Display;

use serde::{
	Serialize,
	ser::{
		self, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant, SerializeTuple,
		SerializeTupleStruct, SerializeTupleVariant,
	},
};
use serde_json::{Map, Number, Value};

pub const CIRCULAR: &str = "[Circular]";
pub const UNSERIALIZABLE: &str = "[Unserializable]";
pub const MAX_DEPTH_MARKER: &str = "[MaxDepth]";

const MAX_DEPTH: usize = 128;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct NormalizeError(String);
impl ser::Error for NormalizeError {
	fn custom<T>(msg: T) -> Self
	where
		T: Display,
	{
		Self(msg.to_string())
	}
}

pub fn normalize<T>(value: &T) -> Value
where
	T: ?Sized + Serialize,
{
	Visits::default().visit(value)
}

type Identity = (usize, &'static str);

#[derive(Default)]
struct Visits {
	path: Vec<Option<Identity>>,
}
impl Visits {
	fn visit<T>(&mut self, value: &T) -> Value
	where
		T: ?Sized + Serialize,
	{
		let identity = identity_of(value);

		if identity.is_some() && self.path.contains(&identity) {
			return Value::String(CIRCULAR.to_string());
		}
		if self.path.len() >= MAX_DEPTH {
			return Value::String(MAX_DEPTH_MARKER.to_string());
		}

		self.path.push(identity);

		let out = match value.serialize(Normalizer { visits: self }) {
			Ok(out) => out,
			Err(err) => {
				tracing::debug!(error = %err, "Replaced an unserializable cache member.");

				Value::String(UNSERIALIZABLE.to_string())
			},
		};

		self.path.pop();

		out
	}
}

fn identity_of<T>(value: &T) -> Option<Identity>
where
	T: ?Sized,
{
	// Zero-sized values share addresses with their neighbours.
	if std::mem::size_of_val(value) == 0 {
		return None;
	}

	Some((std::ptr::from_ref(value).cast::<()>() as usize, std::any::type_name::<T>()))
}

fn key_to_string(key: Value) -> String {
	match key {
		Value::String(text) => text,
		Value::Number(number) => number.to_string(),
		Value::Bool(flag) => flag.to_string(),
		Value::Null => "null".to_string(),
		other => other.to_string(),
	}
}

struct Normalizer<'a> {
	visits: &'a mut Visits,
}

struct SeqNormalizer<'a> {
	visits: &'a mut Visits,
	items: Vec<Value>,
}

struct VariantSeqNormalizer<'a> {
	visits: &'a mut Visits,
	variant: &'static str,
	items: Vec<Value>,
}

struct MapNormalizer<'a> {
	visits: &'a mut Visits,
	map: Map<String, Value>,
	next_key: Option<String>,
}

struct VariantMapNormalizer<'a> {
	visits: &'a mut Visits,
	variant: &'static str,
	map: Map<String, Value>,
}

impl<'a> ser::Serializer for Normalizer<'a> {
	type Error = NormalizeError;
	type Ok = Value;
	type SerializeMap = MapNormalizer<'a>;
	type SerializeSeq = SeqNormalizer<'a>;
	type SerializeStruct = MapNormalizer<'a>;
	type SerializeStructVariant = VariantMapNormalizer<'a>;
	type SerializeTuple = SeqNormalizer<'a>;
	type SerializeTupleStruct = SeqNormalizer<'a>;
	type SerializeTupleVariant = VariantSeqNormalizer<'a>;

	fn serialize_bool(self, v: bool) -> Result<Value, NormalizeError> {
		Ok(Value::Bool(v))
	}

	fn serialize_i8(self, v: i8) -> Result<Value, NormalizeError> {
		Ok(Value::Number(Number::from(v)))
	}

	fn serialize_i16(self, v: i16) -> Result<Value, NormalizeError> {
		Ok(Value::Number(Number::from(v)))
	}

	fn serialize_i32(self, v: i32) -> Result<Value, NormalizeError> {
		Ok(Value::Number(Number::from(v)))
	}

	fn serialize_i64(self, v: i64) -> Result<Value, NormalizeError> {
		Ok(Value::Number(Number::from(v)))
	}

	fn serialize_i128(self, v: i128) -> Result<Value, NormalizeError> {
		if let Ok(small) = i64::try_from(v) {
			return Ok(Value::Number(Number::from(small)));
		}
		if let Ok(unsigned) = u64::try_from(v) {
			return Ok(Value::Number(Number::from(unsigned)));
		}

		Ok(Value::String(v.to_string()))
	}

	fn serialize_u8(self, v: u8) -> Result<Value, NormalizeError> {
		Ok(Value::Number(Number::from(v)))
	}

	fn serialize_u16(self, v: u16) -> Result<Value, NormalizeError> {
		Ok(Value::Number(Number::from(v)))
	}

	fn serialize_u32(self, v: u32) -> Result<Value, NormalizeError> {
		Ok(Value::Number(Number::from(v)))
	}

	fn serialize_u64(self, v: u64) -> Result<Value, NormalizeError> {
		Ok(Value::Number(Number::from(v)))
	}

	fn serialize_u128(self, v: u128) -> Result<Value, NormalizeError> {
		match u64::try_from(v) {
			Ok(small) => Ok(Value::Number(Number::from(small))),
			Err(_) => Ok(Value::String(v.to_string())),
		}
	}

	fn serialize_f32(self, v: f32) -> Result<Value, NormalizeError> {
		Ok(Value::from(v))
	}

	fn serialize_f64(self, v: f64) -> Result<Value, NormalizeError> {
		Ok(Value::from(v))
	}

	fn serialize_char(self, v: char) -> Result<Value, NormalizeError> {
		Ok(Value::String(v.to_string()))
	}

	fn serialize_str(self, v: &str) -> Result<Value, NormalizeError> {
		Ok(Value::String(v.to_string()))
	}

	fn serialize_bytes(self, v: &[u8]) -> Result<Value, NormalizeError> {
		Ok(Value::Array(v.iter().map(|byte| Value::Number(Number::from(*byte))).collect()))
	}

	fn serialize_none(self) -> Result<Value, NormalizeError> {
		Ok(Value::Null)
	}

	fn serialize_some<T>(self, value: &T) -> Result<Value, NormalizeError>
	where
		T: ?Sized + Serialize,
	{
		value.serialize(self)
	}

	fn serialize_unit(self) -> Result<Value, NormalizeError> {
		Ok(Value::Null)
	}

	fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, NormalizeError> {
		Ok(Value::Null)
	}

	fn serialize_unit_variant(
		self,
		_name: &'static str,
		_variant_index: u32,
		variant: &'static str,
	) -> Result<Value, NormalizeError> {
		Ok(Value::String(variant.to_string()))
	}

	fn serialize_newtype_struct<T>(
		self,
		_name: &'static str,
		value: &T,
	) -> Result<Value, NormalizeError>
	where
		T: ?Sized + Serialize,
	{
		value.serialize(self)
	}

	fn serialize_newtype_variant<T>(
		self,
		_name: &'static str,
		_variant_index: u32,
		variant: &'static str,
		value: &T,
	) -> Result<Value, NormalizeError>
	where
		T: ?Sized + Serialize,
	{
		let mut map = Map::new();

		map.insert(variant.to_string(), self.visits.visit(value));

		Ok(Value::Object(map))
	}

	fn serialize_seq(self, len: Option<usize>) -> Result<SeqNormalizer<'a>, NormalizeError> {
		Ok(SeqNormalizer { visits: self.visits, items: Vec::with_capacity(len.unwrap_or(0)) })
	}

	fn serialize_tuple(self, len: usize) -> Result<SeqNormalizer<'a>, NormalizeError> {
		self.serialize_seq(Some(len))
	}

	fn serialize_tuple_struct(
		self,
		_name: &'static str,
		len: usize,
	) -> Result<SeqNormalizer<'a>, NormalizeError> {
		self.serialize_seq(Some(len))
	}

	fn serialize_tuple_variant(
		self,
		_name: &'static str,
		_variant_index: u32,
		variant: &'static str,
		len: usize,
	) -> Result<VariantSeqNormalizer<'a>, NormalizeError> {
		Ok(VariantSeqNormalizer { visits: self.visits, variant, items: Vec::with_capacity(len) })
	}

	fn serialize_map(self, _len: Option<usize>) -> Result<MapNormalizer<'a>, NormalizeError> {
		Ok(MapNormalizer { visits: self.visits, map: Map::new(), next_key: None })
	}

	fn serialize_struct(
		self,
		_name: &'static str,
		len: usize,
	) -> Result<MapNormalizer<'a>, NormalizeError> {
		self.serialize_map(Some(len))
	}

	fn serialize_struct_variant(
		self,
		_name: &'static str,
		_variant_index: u32,
		variant: &'static str,
		_len: usize,
	) -> Result<VariantMapNormalizer<'a>, NormalizeError> {
		Ok(VariantMapNormalizer { visits: self.visits, variant, map: Map::new() })
	}
}

impl SerializeSeq for SeqNormalizer<'_> {
	type Error = NormalizeError;
	type Ok = Value;

	fn serialize_element<T>(&mut self, value: &T) -> Result<(), NormalizeError>
	where
		T: ?Sized + Serialize,
	{
		let item = self.visits.visit(value);

		self.items.push(item);

		Ok(())
	}

	fn end(self) -> Result<Value, NormalizeError> {
		Ok(Value::Array(self.items))
	}
}

impl SerializeTuple for SeqNormalizer<'_> {
	type Error = NormalizeError;
	type Ok = Value;

	fn serialize_element<T>(&mut self, value: &T) -> Result<(), NormalizeError>
	where
		T: ?Sized + Serialize,
	{
		SerializeSeq::serialize_element(self, value)
	}

	fn end(self) -> Result<Value, NormalizeError> {
		SerializeSeq::end(self)
	}
}

impl SerializeTupleStruct for SeqNormalizer<'_> {
	type Error = NormalizeError;
	type Ok = Value;

	fn serialize_field<T>(&mut self, value: &T) -> Result<(), NormalizeError>
	where
		T: ?Sized + Serialize,
	{
		SerializeSeq::serialize_element(self, value)
	}

	fn end(self) -> Result<Value, NormalizeError> {
		SerializeSeq::end(self)
	}
}

impl SerializeTupleVariant for VariantSeqNormalizer<'_> {
	type Error = NormalizeError;
	type Ok = Value;

	fn serialize_field<T>(&mut self, value: &T) -> Result<(), NormalizeError>
	where
		T: ?Sized + Serialize,
	{
		let item = self.visits.visit(value);

		self.items.push(item);

		Ok(())
	}

	fn end(self) -> Result<Value, NormalizeError> {
		let mut map = Map::new();

		map.insert(self.variant.to_string(), Value::Array(self.items));

		Ok(Value::Object(map))
	}
}

impl SerializeMap for MapNormalizer<'_> {
	type Error = NormalizeError;
	type Ok = Value;

	fn serialize_key<T>(&mut self, key: &T) -> Result<(), NormalizeError>
	where
		T: ?Sized + Serialize,
	{
		let key = self.visits.visit(key);

		self.next_key = Some(key_to_string(key));

		Ok(())
	}

	fn serialize_value<T>(&mut self, value: &T) -> Result<(), NormalizeError>
	where
		T: ?Sized + Serialize,
	{
		let key = self
			.next_key
			.take()
			.ok_or_else(|| <NormalizeError as ser::Error>::custom("Map value without a key."))?;
		let value = self.visits.visit(value);

		self.map.insert(key, value);

		Ok(())
	}

	fn end(self) -> Result<Value, NormalizeError> {
		Ok(Value::Object(self.map))
	}
}

impl SerializeStruct for MapNormalizer<'_> {
	type Error = NormalizeError;
	type Ok = Value;

	fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), NormalizeError>
	where
		T: ?Sized + Serialize,
	{
		let value = self.visits.visit(value);

		self.map.insert(key.to_string(), value);

		Ok(())
	}

	fn end(self) -> Result<Value, NormalizeError> {
		Ok(Value::Object(self.map))
	}
}

impl SerializeStructVariant for VariantMapNormalizer<'_> {
	type Error = NormalizeError;
	type Ok = Value;

	fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), NormalizeError>
	where
		T: ?Sized + Serialize,
	{
		let value = self.visits.visit(value);

		self.map.insert(key.to_string(), value);

		Ok(())
	}

	fn end(self) -> Result<Value, NormalizeError> {
		let mut outer = Map::new();

		outer.insert(self.variant.to_string(), Value::Object(self.map));

		Ok(Value::Object(outer))
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use super::*;

	#[derive(Serialize)]
	enum Shape {
		Dot,
		Circle(f64),
		Rect { w: u32, h: u32 },
		Pair(u8, u8),
	}

	#[test]
	fn enums_match_serde_json_layout() {
		let shapes =
			vec![Shape::Dot, Shape::Circle(1.5), Shape::Rect { w: 2, h: 3 }, Shape::Pair(4, 5)];

		assert_eq!(normalize(&shapes), serde_json::to_value(&shapes).expect("Plain enums encode."));
	}

	#[test]
	fn non_finite_floats_become_null() {
		let value = normalize(&vec![1.0_f64, f64::NAN, f64::INFINITY]);

		assert_eq!(value, serde_json::json!([1.0, null, null]));
	}

	#[test]
	fn wide_integers_become_strings() {
		let value = normalize(&(u128::MAX, 12_i128, -(1_i128 << 100)));

		assert_eq!(value[0], Value::String(u128::MAX.to_string()));
		assert_eq!(value[1], serde_json::json!(12));
		assert_eq!(value[2], Value::String((-(1_i128 << 100)).to_string()));
	}

	#[test]
	fn non_string_keys_are_stringified() {
		let mut map = BTreeMap::new();

		map.insert(3_u32, "three");
		map.insert(10_u32, "ten");

		assert_eq!(normalize(&map), serde_json::json!({ "3": "three", "10": "ten" }));
	}

	#[test]
	fn repeated_siblings_are_not_mistaken_for_cycles() {
		let shared = String::from("same");
		let pair = (&shared, &shared);

		assert_eq!(normalize(&pair), serde_json::json!(["same", "same"]));
	}
}
