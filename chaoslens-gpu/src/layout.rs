//! Host-side packing of named uniforms into one WGSL uniform struct.
//!
//! A layout is declared once per shader; the matching WGSL struct declaration
//! is generated from it and prepended to the fragment source, so field order
//! and offsets cannot drift apart.

use chaoslens_core::UniformValue;

use crate::error::GpuError;

/// Name of the generated struct and its binding in the fragment shader.
pub const UNIFORM_STRUCT: &str = "Params";
pub const UNIFORM_BINDING: &str = "params";

/// GPU-side representation of one uniform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotType {
    F32,
    U32,
    I32,
    Vec2F,
    Vec2U,
    Vec2I,
    Vec3F,
    Vec4F,
    Vec4U,
    Vec4I,
    /// An f64 as a double-single `vec2<f32>(hi, lo)`.
    DoubleSingle,
    /// A `dvec2` as `vec4<f32>(x_hi, x_lo, y_hi, y_lo)`.
    DoubleSingle2,
    /// Scalar array, one element per 16-byte `vec4<f32>` stride (in `.x`).
    ArrayF32(u32),
    ArrayU32(u32),
    ArrayI32(u32),
    /// `array<vec4<f32>, n>`; 2-vectors occupy `.xy`.
    ArrayVec4F(u32),
}

impl SlotType {
    fn align(self) -> usize {
        match self {
            SlotType::F32 | SlotType::U32 | SlotType::I32 => 4,
            SlotType::Vec2F | SlotType::Vec2U | SlotType::Vec2I | SlotType::DoubleSingle => 8,
            _ => 16,
        }
    }

    fn size(self) -> usize {
        match self {
            SlotType::F32 | SlotType::U32 | SlotType::I32 => 4,
            SlotType::Vec2F | SlotType::Vec2U | SlotType::Vec2I | SlotType::DoubleSingle => 8,
            SlotType::Vec3F => 12,
            SlotType::Vec4F | SlotType::Vec4U | SlotType::Vec4I | SlotType::DoubleSingle2 => 16,
            SlotType::ArrayF32(n)
            | SlotType::ArrayU32(n)
            | SlotType::ArrayI32(n)
            | SlotType::ArrayVec4F(n) => 16 * n as usize,
        }
    }

    pub fn wgsl(self) -> String {
        match self {
            SlotType::F32 => "f32".into(),
            SlotType::U32 => "u32".into(),
            SlotType::I32 => "i32".into(),
            SlotType::Vec2F | SlotType::DoubleSingle => "vec2<f32>".into(),
            SlotType::Vec2U => "vec2<u32>".into(),
            SlotType::Vec2I => "vec2<i32>".into(),
            SlotType::Vec3F => "vec3<f32>".into(),
            SlotType::Vec4F | SlotType::DoubleSingle2 => "vec4<f32>".into(),
            SlotType::Vec4U => "vec4<u32>".into(),
            SlotType::Vec4I => "vec4<i32>".into(),
            SlotType::ArrayF32(n) | SlotType::ArrayVec4F(n) => format!("array<vec4<f32>, {n}>"),
            SlotType::ArrayU32(n) => format!("array<vec4<u32>, {n}>"),
            SlotType::ArrayI32(n) => format!("array<vec4<i32>, {n}>"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    pub name: String,
    pub ty: SlotType,
    pub offset: usize,
}

/// Ordered fields of the uniform struct with their byte offsets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UniformLayout {
    slots: Vec<Slot>,
    size: usize,
}

impl UniformLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, aligned per WGSL uniform address space rules.
    pub fn with(mut self, name: &str, ty: SlotType) -> Self {
        let offset = self.size.next_multiple_of(ty.align());
        self.size = offset + ty.size();
        self.slots.push(Slot {
            name: name.to_string(),
            ty,
            offset,
        });
        self
    }

    /// The view block every fractal shader starts with.
    pub fn view() -> Self {
        Self::new()
            .with("center", SlotType::DoubleSingle2)
            .with("zoom_scale", SlotType::DoubleSingle)
            .with("window_size", SlotType::Vec2U)
            .with("tile_offset", SlotType::Vec2U)
    }

    /// Struct size rounded up to 16 bytes; never zero.
    pub fn size(&self) -> usize {
        self.size.next_multiple_of(16).max(16)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// `struct Params { ... }` plus the binding declaration.
    pub fn wgsl_declaration(&self) -> String {
        let mut out = format!("struct {UNIFORM_STRUCT} {{\n");
        for slot in &self.slots {
            out.push_str(&format!("    {}: {},\n", slot.name, slot.ty.wgsl()));
        }
        if self.slots.is_empty() {
            out.push_str("    _unused: vec4<f32>,\n");
        }
        out.push_str("};\n");
        out.push_str(&format!(
            "@group(0) @binding(0) var<uniform> {UNIFORM_BINDING}: {UNIFORM_STRUCT};\n\n"
        ));
        out
    }

    /// Encode `value` for the slot named `name`.
    ///
    /// Returns `Ok(None)` when the shader declares no such field; like an
    /// unused uniform location, the value is dropped.
    pub fn encode(&self, name: &str, value: &UniformValue) -> Result<Option<(usize, Vec<u8>)>, GpuError> {
        let Some(slot) = self.slot(name) else {
            return Ok(None);
        };
        let mismatch = || GpuError::UniformType {
            name: name.to_string(),
            declared: slot_name(slot.ty),
            given: value.type_name(),
        };
        let bytes = encode_value(slot.ty, value).ok_or_else(mismatch)?;
        Ok(Some((slot.offset, bytes)))
    }
}

fn slot_name(ty: SlotType) -> &'static str {
    match ty {
        SlotType::F32 => "f32",
        SlotType::U32 => "u32",
        SlotType::I32 => "i32",
        SlotType::Vec2F => "vec2<f32>",
        SlotType::Vec2U => "vec2<u32>",
        SlotType::Vec2I => "vec2<i32>",
        SlotType::Vec3F => "vec3<f32>",
        SlotType::Vec4F => "vec4<f32>",
        SlotType::Vec4U => "vec4<u32>",
        SlotType::Vec4I => "vec4<i32>",
        SlotType::DoubleSingle => "double-single f64",
        SlotType::DoubleSingle2 => "double-single dvec2",
        SlotType::ArrayF32(_) => "f32 array",
        SlotType::ArrayU32(_) => "u32 array",
        SlotType::ArrayI32(_) => "i32 array",
        SlotType::ArrayVec4F(_) => "vec4 array",
    }
}

/// `(hi, lo)` with `hi + lo` carrying about 48 significant bits of `v`.
pub fn split_f64(v: f64) -> [f32; 2] {
    let hi = v as f32;
    [hi, (v - hi as f64) as f32]
}

fn bytes<T: bytemuck::Pod>(values: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(values).to_vec()
}

/// Pad each element to a 16-byte stride.
fn strided<T: bytemuck::Pod>(values: &[T], width: usize, len: u32) -> Option<Vec<u8>> {
    if values.len() > len as usize * width {
        return None;
    }
    let mut out = vec![0u8; 16 * len as usize];
    for (i, chunk) in values.chunks(width).enumerate() {
        let raw = bytes(chunk);
        out[i * 16..i * 16 + raw.len()].copy_from_slice(&raw);
    }
    Some(out)
}

fn encode_value(ty: SlotType, value: &UniformValue) -> Option<Vec<u8>> {
    use UniformValue as V;
    let encoded = match (ty, value) {
        (SlotType::F32, V::F32(v)) => bytes(&[*v]),
        (SlotType::F32, V::F64(v)) => bytes(&[*v as f32]),
        (SlotType::U32, V::U32(v)) => bytes(&[*v]),
        (SlotType::I32, V::I32(v)) => bytes(&[*v]),
        (SlotType::Vec2F, V::Vec2(v)) => bytes(v),
        (SlotType::Vec2F, V::DVec2(v)) => bytes(&[v[0] as f32, v[1] as f32]),
        (SlotType::Vec2U, V::UVec2(v)) => bytes(v),
        (SlotType::Vec2I, V::IVec2(v)) => bytes(v),
        (SlotType::Vec3F, V::Vec3(v)) => bytes(v),
        (SlotType::Vec3F, V::DVec3(v)) => bytes(&v.map(|x| x as f32)),
        (SlotType::Vec4F, V::Vec4(v)) => bytes(v),
        (SlotType::Vec4F, V::DVec4(v)) => bytes(&v.map(|x| x as f32)),
        (SlotType::Vec4U, V::UVec4(v)) => bytes(v),
        (SlotType::Vec4I, V::IVec4(v)) => bytes(v),
        (SlotType::DoubleSingle, V::F64(v)) => bytes(&split_f64(*v)),
        (SlotType::DoubleSingle, V::F32(v)) => bytes(&[*v, 0.0]),
        (SlotType::DoubleSingle2, V::DVec2(v)) => {
            let (x, y) = (split_f64(v[0]), split_f64(v[1]));
            bytes(&[x[0], x[1], y[0], y[1]])
        }
        (SlotType::ArrayF32(n), V::F32Array(v)) => strided(v, 1, n)?,
        (SlotType::ArrayF32(n), V::F64Array(v)) => {
            strided(&v.iter().map(|x| *x as f32).collect::<Vec<_>>(), 1, n)?
        }
        (SlotType::ArrayU32(n), V::U32Array(v)) => strided(v, 1, n)?,
        (SlotType::ArrayI32(n), V::I32Array(v)) => strided(v, 1, n)?,
        (SlotType::ArrayVec4F(n), V::Vec2Array(v)) => strided(&v.concat(), 2, n)?,
        (SlotType::ArrayVec4F(n), V::Vec4Array(v)) => strided(&v.concat(), 4, n)?,
        _ => return None,
    };
    Some(encoded)
}
