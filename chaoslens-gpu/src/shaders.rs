//! Embedded WGSL sources and the uniform layout each one declares.

use chaoslens_core::shader::EmbeddedSources;
use chaoslens_core::{ShaderError, ShaderSources, SystemKind};

use crate::layout::{SlotType, UniformLayout};

pub const VERTEX_SHADER: &str = "fullscreen.wgsl";

/// Every embedded file, including the ones only reachable through `#include`.
pub fn embedded() -> EmbeddedSources {
    EmbeddedSources::new()
        .with("fullscreen.wgsl", include_str!("shaders/fullscreen.wgsl"))
        .with("view.wgsl", include_str!("shaders/view.wgsl"))
        .with("supersampling.wgsl", include_str!("shaders/supersampling.wgsl"))
        .with("rk45.wgsl", include_str!("shaders/rk45.wgsl"))
        .with("mandelbrot.wgsl", include_str!("shaders/mandelbrot.wgsl"))
        .with("double_pendulum.wgsl", include_str!("shaders/double_pendulum.wgsl"))
}

pub fn fragment_shader(kind: SystemKind) -> &'static str {
    match kind {
        SystemKind::Mandelbrot => "mandelbrot.wgsl",
        SystemKind::DoublePendulum => "double_pendulum.wgsl",
    }
}

/// Expanded sources for `kind`, defines not yet applied.
pub fn sources_for(kind: SystemKind) -> Result<ShaderSources, ShaderError> {
    ShaderSources::load(&embedded(), VERTEX_SHADER, fragment_shader(kind))
}

pub fn layout_for(kind: SystemKind) -> UniformLayout {
    let view = UniformLayout::view();
    match kind {
        SystemKind::Mandelbrot => view
            .with("max_iterations", SlotType::U32)
            .with("color_accuracy", SlotType::U32),
        SystemKind::DoublePendulum => view
            .with("t_end", SlotType::F32)
            .with("v1_start", SlotType::F32)
            .with("v2_start", SlotType::F32)
            .with("gravity", SlotType::F32)
            .with("length1", SlotType::F32)
            .with("length2", SlotType::F32)
            .with("mass1", SlotType::F32)
            .with("mass2", SlotType::F32)
            .with("mean_diff_tol", SlotType::F32)
            .with("abs_se_tol", SlotType::F32)
            .with("rel_se_tol", SlotType::F32)
            .with("max_steps", SlotType::U32)
            .with("max_same_steps", SlotType::U32)
            .with("min_step_size", SlotType::F32)
            .with("atol", SlotType::F32)
            .with("rtol", SlotType::F32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_are_expanded() {
        let sources = sources_for(SystemKind::DoublePendulum).unwrap();
        assert!(!sources.fragment.contains("#include"));
        assert!(sources.fragment.contains("fn rk45_integrate"));
        assert!(sources.fragment.contains("fn supersample"));
        assert!(sources.fragment.contains("fn frag_to_model"));
    }

    #[test]
    fn defines_appear_as_whole_tokens() {
        let mandelbrot = sources_for(SystemKind::Mandelbrot).unwrap();
        assert!(mandelbrot.fragment.contains("= FLOW_COLOR_TYPE;"));
        let pendulum = sources_for(SystemKind::DoublePendulum).unwrap();
        assert!(pendulum.fragment.contains("= SUPER_SAMPLING;"));
    }

    #[test]
    fn every_uniform_the_shader_reads_is_declared() {
        for kind in [SystemKind::Mandelbrot, SystemKind::DoublePendulum] {
            let fragment = sources_for(kind).unwrap().fragment;
            let layout = layout_for(kind);
            for (start, _) in fragment.match_indices("params.") {
                let name: String = fragment[start + 7..]
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                    .collect();
                assert!(layout.slot(&name).is_some(), "{kind:?}: params.{name} undeclared");
            }
        }
    }
}
