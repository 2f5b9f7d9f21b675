//! Uniform buffer packing.
//!
//! Each program's WGSL `Uniforms` struct starts with a `pass_info: vec4<u32>`
//! (cube face, mip level) followed by the program's uniforms in declaration
//! order. Offsets follow the WGSL uniform address space rules: scalars align
//! to 4 bytes, `vec3` and `mat4x4` to 16, array elements are padded to a
//! 16-byte stride.

use crate::resources::program::{Program, UniformDecl, UniformType, UniformValue};

const PASS_INFO_SIZE: usize = 16;

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

fn align_and_size(ty: UniformType) -> (usize, usize) {
    match ty {
        UniformType::Int | UniformType::Float => (4, 4),
        UniformType::Vec3 => (16, 12),
        UniformType::Mat4 => (16, 64),
    }
}

/// Byte offset of every declaration and the padded struct size.
#[must_use]
pub fn layout(decls: &[UniformDecl]) -> (Vec<usize>, usize) {
    let mut offsets = Vec::with_capacity(decls.len());
    let mut offset = PASS_INFO_SIZE;
    for decl in decls {
        let (align, size) = align_and_size(decl.default.ty());
        if decl.count > 1 {
            let stride = align_up(size, 16);
            offset = align_up(offset, 16);
            offsets.push(offset);
            offset += stride * decl.count as usize;
        } else {
            offset = align_up(offset, align);
            offsets.push(offset);
            offset += size;
        }
    }
    (offsets, align_up(offset, 16))
}

fn write_value(bytes: &mut [u8], offset: usize, value: &UniformValue) {
    match value {
        UniformValue::Int(v) => bytes[offset..offset + 4].copy_from_slice(&v.to_le_bytes()),
        UniformValue::Float(v) => bytes[offset..offset + 4].copy_from_slice(&v.to_le_bytes()),
        UniformValue::Vec3(v) => {
            bytes[offset..offset + 12].copy_from_slice(bytemuck::cast_slice(&v.to_array()));
        }
        UniformValue::Mat4(m) => {
            bytes[offset..offset + 64].copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()));
        }
    }
}

/// Packs the pass info and the program's current uniform values.
#[must_use]
pub fn pack(program: &Program, face: u32, level: u32) -> Vec<u8> {
    let decls = program.kind().uniforms();
    let (offsets, size) = layout(decls);
    let mut bytes = vec![0u8; size];
    bytes[..PASS_INFO_SIZE].copy_from_slice(bytemuck::cast_slice(&[face, level, 0u32, 0u32]));

    let mut values = program.values().iter();
    for (decl, &offset) in decls.iter().zip(&offsets) {
        let (_, size) = align_and_size(decl.default.ty());
        let stride = if decl.count > 1 { align_up(size, 16) } else { size };
        for element in 0..decl.count as usize {
            if let Some(value) = values.next() {
                write_value(&mut bytes, offset + element * stride, value);
            }
        }
    }
    bytes
}
