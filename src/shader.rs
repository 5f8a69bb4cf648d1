//! WGSL programs for the simulation stages and the particle renderer.
//!
//! The stage programs are stored without their shared helpers; use
//! [`velocity_source`] and [`position_source`] to get compilable modules.
//! Every program is validated with naga before it reaches wgpu so that a
//! broken kernel fails startup with a readable [`ShaderError`] instead of a
//! device-lost panic later.

use naga::front::wgsl;
use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::ShaderError;
use crate::graph::VariableKind;

/// Velocity stage body.
pub const VELOCITY_WGSL: &str = include_str!("shaders/velocity.wgsl");
/// Position stage body.
pub const POSITION_WGSL: &str = include_str!("shaders/position.wgsl");
/// Point-sprite render program.
pub const PARTICLES_WGSL: &str = include_str!("shaders/particles.wgsl");

/// Helpers prepended to both stage programs.
///
/// - `hash(n: u32) -> u32` - integer hash, identical to [`crate::kernels::hash`]
/// - `rand(seed: u32) -> f32` - hash to `[0, 1]`
/// - `wrap_texel(p, dims) -> vec2<i32>` - toroidal texel addressing
pub const COMMON_WGSL: &str = r#"
fn hash(n: u32) -> u32 {
    var x = n;
    x = x ^ (x >> 17u);
    x = x * 0xed5ad4bbu;
    x = x ^ (x >> 11u);
    x = x * 0xac4c1b51u;
    x = x ^ (x >> 15u);
    x = x * 0x31848babu;
    x = x ^ (x >> 14u);
    return x;
}

fn rand(seed: u32) -> f32 {
    return f32(hash(seed)) / 4294967295.0;
}

fn wrap_texel(p: vec2<i32>, dims: vec2<i32>) -> vec2<i32> {
    return ((p % dims) + dims) % dims;
}
"#;

/// Complete velocity stage module.
pub fn velocity_source() -> String {
    format!("{COMMON_WGSL}\n{VELOCITY_WGSL}")
}

/// Complete position stage module.
pub fn position_source() -> String {
    format!("{COMMON_WGSL}\n{POSITION_WGSL}")
}

/// Complete module for a simulation variable.
pub fn stage_source(kind: VariableKind) -> String {
    match kind {
        VariableKind::Velocity => velocity_source(),
        VariableKind::Position => position_source(),
    }
}

/// Parse and validate a WGSL module.
pub fn validate(source: &str, stage: &'static str) -> Result<(), ShaderError> {
    let module = wgsl::parse_str(source).map_err(|err| ShaderError {
        stage,
        message: err.emit_to_string(source),
    })?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator.validate(&module).map_err(|err| ShaderError {
        stage,
        message: format!("{}", err),
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_program_validates() {
        validate(&velocity_source(), "velocity").unwrap();
    }

    #[test]
    fn test_position_program_validates() {
        validate(&position_source(), "position").unwrap();
    }

    #[test]
    fn test_stage_source_matches_variable() {
        for kind in VariableKind::ORDER {
            let source = stage_source(kind);
            assert!(source.contains("fn wrap_texel"));
            validate(&source, kind.name()).unwrap();
        }
        assert_eq!(stage_source(VariableKind::Velocity), velocity_source());
        assert_eq!(stage_source(VariableKind::Position), position_source());
    }

    #[test]
    fn test_render_program_validates() {
        validate(PARTICLES_WGSL, "render").unwrap();
    }

    #[test]
    fn test_stage_body_alone_is_rejected() {
        // Without the shared helpers `wrap_texel` is undefined.
        let err = validate(VELOCITY_WGSL, "velocity").unwrap_err();
        assert_eq!(err.stage, "velocity");
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = validate("fn main( {", "broken").unwrap_err();
        assert!(err.to_string().starts_with("broken shader error"));
    }
}
