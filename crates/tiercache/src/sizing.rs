//! Approximate byte cost of a cached value
//!
//! This is a budget heuristic rather than a memory measurement. Values are
//! sized from their `Serialize` form before any conversion. Text and byte
//! buffers cost their length, numbers and booleans are flat, maps and structs
//! cost their JSON encoding, and anything else costs its binary encoding.
//! When no estimate can be produced the value is charged [`FALLBACK_SIZE`].

use serde::ser::{self, Serialize, Serializer};

/// Bytes charged for a number
pub const NUMBER_SIZE: usize = 8;

/// Bytes charged when a value cannot be sized
pub const FALLBACK_SIZE: usize = 1024;

/// Estimate the size of a value in bytes
pub fn estimate_size<T: Serialize + ?Sized>(value: &T) -> usize {
    match value.serialize(ShapeProbe) {
        Ok(Shape::Bytes(len)) => len,
        Ok(Shape::Byte | Shape::Number) => NUMBER_SIZE,
        Ok(Shape::Mapping) => serde_json::to_vec(value)
            .map(|encoded| encoded.len())
            .unwrap_or(FALLBACK_SIZE),
        Ok(Shape::Opaque) => bincode::serialized_size(value)
            .ok()
            .and_then(|size| usize::try_from(size).ok())
            .unwrap_or(FALLBACK_SIZE),
        Err(_) => FALLBACK_SIZE,
    }
}

/// Sizing category of a serialized value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// Text or a byte buffer of the given length
    Bytes(usize),
    /// A lone `u8`; a sequence of nothing else is a byte buffer
    Byte,
    Number,
    Mapping,
    Opaque,
}

/// Serializer that only reports the top-level [`Shape`] of a value
struct ShapeProbe;

/// Compound serializer whose shape is known up front
struct Fixed(Shape);

/// Sequence serializer tracking whether every element is a `u8`
struct SeqShape {
    len: usize,
    bytes: bool,
}

impl Serializer for ShapeProbe {
    type Ok = Shape;
    type Error = serde_json::Error;
    type SerializeSeq = SeqShape;
    type SerializeTuple = Fixed;
    type SerializeTupleStruct = Fixed;
    type SerializeTupleVariant = Fixed;
    type SerializeMap = Fixed;
    type SerializeStruct = Fixed;
    type SerializeStructVariant = Fixed;

    fn serialize_bool(self, _v: bool) -> Result<Shape, Self::Error> {
        Ok(Shape::Number)
    }

    fn serialize_i8(self, _v: i8) -> Result<Shape, Self::Error> {
        Ok(Shape::Number)
    }

    fn serialize_i16(self, _v: i16) -> Result<Shape, Self::Error> {
        Ok(Shape::Number)
    }

    fn serialize_i32(self, _v: i32) -> Result<Shape, Self::Error> {
        Ok(Shape::Number)
    }

    fn serialize_i64(self, _v: i64) -> Result<Shape, Self::Error> {
        Ok(Shape::Number)
    }

    fn serialize_i128(self, _v: i128) -> Result<Shape, Self::Error> {
        Ok(Shape::Number)
    }

    fn serialize_u8(self, _v: u8) -> Result<Shape, Self::Error> {
        Ok(Shape::Byte)
    }

    fn serialize_u16(self, _v: u16) -> Result<Shape, Self::Error> {
        Ok(Shape::Number)
    }

    fn serialize_u32(self, _v: u32) -> Result<Shape, Self::Error> {
        Ok(Shape::Number)
    }

    fn serialize_u64(self, _v: u64) -> Result<Shape, Self::Error> {
        Ok(Shape::Number)
    }

    fn serialize_u128(self, _v: u128) -> Result<Shape, Self::Error> {
        Ok(Shape::Number)
    }

    fn serialize_f32(self, _v: f32) -> Result<Shape, Self::Error> {
        Ok(Shape::Number)
    }

    fn serialize_f64(self, _v: f64) -> Result<Shape, Self::Error> {
        Ok(Shape::Number)
    }

    fn serialize_char(self, v: char) -> Result<Shape, Self::Error> {
        Ok(Shape::Bytes(v.len_utf8()))
    }

    fn serialize_str(self, v: &str) -> Result<Shape, Self::Error> {
        Ok(Shape::Bytes(v.len()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Shape, Self::Error> {
        Ok(Shape::Bytes(v.len()))
    }

    fn serialize_none(self) -> Result<Shape, Self::Error> {
        Ok(Shape::Opaque)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Shape, Self::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Shape, Self::Error> {
        Ok(Shape::Opaque)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Shape, Self::Error> {
        Ok(Shape::Opaque)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<Shape, Self::Error> {
        Ok(Shape::Opaque)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Shape, Self::Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Shape, Self::Error> {
        Ok(Shape::Opaque)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SeqShape, Self::Error> {
        Ok(SeqShape { len: 0, bytes: true })
    }

    fn serialize_tuple(self, _len: usize) -> Result<Fixed, Self::Error> {
        Ok(Fixed(Shape::Opaque))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Fixed, Self::Error> {
        Ok(Fixed(Shape::Opaque))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Fixed, Self::Error> {
        Ok(Fixed(Shape::Opaque))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Fixed, Self::Error> {
        Ok(Fixed(Shape::Mapping))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Fixed, Self::Error> {
        Ok(Fixed(Shape::Mapping))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Fixed, Self::Error> {
        Ok(Fixed(Shape::Opaque))
    }
}

impl ser::SerializeSeq for SeqShape {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.len += 1;
        if self.bytes {
            self.bytes = matches!(value.serialize(ShapeProbe), Ok(Shape::Byte));
        }
        Ok(())
    }

    fn end(self) -> Result<Shape, Self::Error> {
        if self.bytes && self.len > 0 {
            Ok(Shape::Bytes(self.len))
        } else {
            Ok(Shape::Opaque)
        }
    }
}

impl ser::SerializeTuple for Fixed {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end(self) -> Result<Shape, Self::Error> {
        Ok(self.0)
    }
}

impl ser::SerializeTupleStruct for Fixed {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end(self) -> Result<Shape, Self::Error> {
        Ok(self.0)
    }
}

impl ser::SerializeTupleVariant for Fixed {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end(self) -> Result<Shape, Self::Error> {
        Ok(self.0)
    }
}

impl ser::SerializeMap for Fixed {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, _key: &T) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end(self) -> Result<Shape, Self::Error> {
        Ok(self.0)
    }
}

impl ser::SerializeStruct for Fixed {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        _value: &T,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end(self) -> Result<Shape, Self::Error> {
        Ok(self.0)
    }
}

impl ser::SerializeStructVariant for Fixed {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        _value: &T,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end(self) -> Result<Shape, Self::Error> {
        Ok(self.0)
    }
}
