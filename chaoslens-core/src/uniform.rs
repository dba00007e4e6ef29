use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A value assignable to a named shader uniform.
///
/// The table stores exactly what callers set, f64 included; narrowing to what the
/// GPU can hold happens only when a backend packs the value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum UniformValue {
    I32(i32),
    U32(u32),
    F32(f32),
    F64(f64),
    IVec2([i32; 2]),
    IVec3([i32; 3]),
    IVec4([i32; 4]),
    UVec2([u32; 2]),
    UVec3([u32; 3]),
    UVec4([u32; 4]),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    DVec2([f64; 2]),
    DVec3([f64; 3]),
    DVec4([f64; 4]),
    I32Array(Vec<i32>),
    U32Array(Vec<u32>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
    Vec2Array(Vec<[f32; 2]>),
    Vec4Array(Vec<[f32; 4]>),
}

impl UniformValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            UniformValue::I32(_) => "i32",
            UniformValue::U32(_) => "u32",
            UniformValue::F32(_) => "f32",
            UniformValue::F64(_) => "f64",
            UniformValue::IVec2(_) => "ivec2",
            UniformValue::IVec3(_) => "ivec3",
            UniformValue::IVec4(_) => "ivec4",
            UniformValue::UVec2(_) => "uvec2",
            UniformValue::UVec3(_) => "uvec3",
            UniformValue::UVec4(_) => "uvec4",
            UniformValue::Vec2(_) => "vec2",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec4(_) => "vec4",
            UniformValue::DVec2(_) => "dvec2",
            UniformValue::DVec3(_) => "dvec3",
            UniformValue::DVec4(_) => "dvec4",
            UniformValue::I32Array(_) => "i32[]",
            UniformValue::U32Array(_) => "u32[]",
            UniformValue::F32Array(_) => "f32[]",
            UniformValue::F64Array(_) => "f64[]",
            UniformValue::Vec2Array(_) => "vec2[]",
            UniformValue::Vec4Array(_) => "vec4[]",
        }
    }

    /// Bit-exact equality (distinguishes `0.0` from `-0.0`, equates NaN payloads).
    pub fn bit_eq(&self, other: &Self) -> bool {
        fn f32s(a: &[f32], b: &[f32]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
        }
        fn f64s(a: &[f64], b: &[f64]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
        }

        match (self, other) {
            (UniformValue::F32(a), UniformValue::F32(b)) => a.to_bits() == b.to_bits(),
            (UniformValue::F64(a), UniformValue::F64(b)) => a.to_bits() == b.to_bits(),
            (UniformValue::Vec2(a), UniformValue::Vec2(b)) => f32s(a, b),
            (UniformValue::Vec3(a), UniformValue::Vec3(b)) => f32s(a, b),
            (UniformValue::Vec4(a), UniformValue::Vec4(b)) => f32s(a, b),
            (UniformValue::DVec2(a), UniformValue::DVec2(b)) => f64s(a, b),
            (UniformValue::DVec3(a), UniformValue::DVec3(b)) => f64s(a, b),
            (UniformValue::DVec4(a), UniformValue::DVec4(b)) => f64s(a, b),
            (UniformValue::F32Array(a), UniformValue::F32Array(b)) => f32s(a, b),
            (UniformValue::F64Array(a), UniformValue::F64Array(b)) => f64s(a, b),
            (UniformValue::Vec2Array(a), UniformValue::Vec2Array(b)) => {
                f32s(a.as_flattened(), b.as_flattened())
            }
            (UniformValue::Vec4Array(a), UniformValue::Vec4Array(b)) => {
                f32s(a.as_flattened(), b.as_flattened())
            }
            _ => self == other,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for UniformValue {
            fn from(value: $ty) -> Self {
                UniformValue::$variant(value)
            }
        })*
    };
}

impl_from! {
    i32 => I32,
    u32 => U32,
    f32 => F32,
    f64 => F64,
    [i32; 2] => IVec2,
    [i32; 3] => IVec3,
    [i32; 4] => IVec4,
    [u32; 2] => UVec2,
    [u32; 3] => UVec3,
    [u32; 4] => UVec4,
    [f32; 2] => Vec2,
    [f32; 3] => Vec3,
    [f32; 4] => Vec4,
    [f64; 2] => DVec2,
    [f64; 3] => DVec3,
    [f64; 4] => DVec4,
    Vec<i32> => I32Array,
    Vec<u32> => U32Array,
    Vec<f32> => F32Array,
    Vec<f64> => F64Array,
    Vec<[f32; 2]> => Vec2Array,
    Vec<[f32; 4]> => Vec4Array,
}

/// Last-assigned value of every uniform, the source of truth replayed after recompiles.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UniformTable {
    values: BTreeMap<String, UniformValue>,
}

impl UniformTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning the previous one if any.
    pub fn set(&mut self, name: &str, value: UniformValue) -> Option<UniformValue> {
        self.values.insert(name.to_string(), value)
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<UniformValue> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Same names mapped to bit-identical values.
    pub fn bit_eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|((ka, va), (kb, vb))| ka == kb && va.bit_eq(vb))
    }
}
