//! Texture-combiner programming for the fixed-function stage of a unit.

use crate::context::{
    CombineFunc, CombineOperand, CombineSource, GlContext, TexEnv, TexEnvMode,
};
use crate::types::{TexMixArgument, TexMixOperation, TextureStageParams};

use super::units::UnitMap;

/// Color or alpha half of a combiner stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Channel {
    Rgb,
    Alpha,
}

impl Channel {
    fn func(self, f: CombineFunc) -> TexEnv {
        match self {
            Channel::Rgb => TexEnv::CombineRgb(f),
            Channel::Alpha => TexEnv::CombineAlpha(f),
        }
    }

    fn source(self, index: u8, s: CombineSource) -> TexEnv {
        match self {
            Channel::Rgb => TexEnv::SourceRgb(index, s),
            Channel::Alpha => TexEnv::SourceAlpha(index, s),
        }
    }
}

fn source_of(arg: TexMixArgument, units: UnitMap) -> CombineSource {
    match arg {
        TexMixArgument::Texture => CombineSource::Texture,
        TexMixArgument::TextureUnit(unit) => CombineSource::TextureUnit(units.physical_of(unit as usize)),
        TexMixArgument::ComputedColor => CombineSource::Previous,
        TexMixArgument::SrcColor => CombineSource::PrimaryColor,
        TexMixArgument::Factor => CombineSource::Constant,
    }
}

/// Previous stage modulated by this stage's texture.
fn apply_default(gl: &mut dyn GlContext, channel: Channel) {
    gl.tex_env(channel.func(CombineFunc::Modulate));
    gl.tex_env(channel.source(0, CombineSource::Previous));
    gl.tex_env(channel.source(1, CombineSource::Texture));
}

fn apply_channel(
    gl: &mut dyn GlContext,
    channel: Channel,
    op: TexMixOperation,
    args: (TexMixArgument, TexMixArgument),
    units: UnitMap,
) {
    let func = match op {
        TexMixOperation::Default => return apply_default(gl, channel),
        TexMixOperation::Replace => CombineFunc::Replace,
        TexMixOperation::Modulate => CombineFunc::Modulate,
        TexMixOperation::Add => CombineFunc::Add,
        TexMixOperation::Subtract => CombineFunc::Subtract,
    };

    gl.tex_env(channel.func(func));
    gl.tex_env(channel.source(0, source_of(args.0, units)));
    gl.tex_env(channel.source(1, source_of(args.1, units)));
}

/// Programs the active unit's combiner from `params`.
///
/// Both operations at default collapse to plain modulation.
pub fn apply_stage(gl: &mut dyn GlContext, params: &TextureStageParams, units: UnitMap) {
    gl.tex_env(TexEnv::Color(params.factor));

    if params.color_operation == TexMixOperation::Default
        && params.alpha_operation == TexMixOperation::Default
    {
        gl.tex_env(TexEnv::Mode(TexEnvMode::Modulate));
        return;
    }

    gl.tex_env(TexEnv::Mode(TexEnvMode::Combine));

    gl.tex_env(TexEnv::OperandRgb(0, CombineOperand::SrcColor));
    gl.tex_env(TexEnv::OperandRgb(1, CombineOperand::SrcColor));
    gl.tex_env(TexEnv::OperandAlpha(0, CombineOperand::SrcAlpha));
    gl.tex_env(TexEnv::OperandAlpha(1, CombineOperand::SrcAlpha));

    apply_channel(
        gl,
        Channel::Rgb,
        params.color_operation,
        (params.color_arg1, params.color_arg2),
        units,
    );
    apply_channel(
        gl,
        Channel::Alpha,
        params.alpha_operation,
        (params.alpha_arg1, params.alpha_arg2),
        units,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HeadlessConfig, HeadlessContext};

    #[test]
    fn all_default_is_a_single_modulate() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let log = gl.log();
        apply_stage(&mut gl, &TextureStageParams::default(), UnitMap::default());
        // factor + mode
        assert_eq!(log.count("tex_env"), 2);
    }

    #[test]
    fn explicit_ops_program_both_channels() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let log = gl.log();
        let params = TextureStageParams {
            color_operation: TexMixOperation::Add,
            color_arg1: TexMixArgument::Texture,
            color_arg2: TexMixArgument::Factor,
            alpha_operation: TexMixOperation::Replace,
            alpha_arg1: TexMixArgument::SrcColor,
            alpha_arg2: TexMixArgument::SrcColor,
            ..TextureStageParams::default()
        };
        apply_stage(&mut gl, &params, UnitMap::default());
        // factor, mode, 4 operands, 3 per channel
        assert_eq!(log.count("tex_env"), 12);
    }

    #[test]
    fn mixed_default_channel_uses_shared_helper() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let log = gl.log();
        let params = TextureStageParams {
            color_operation: TexMixOperation::Modulate,
            ..TextureStageParams::default()
        };
        apply_stage(&mut gl, &params, UnitMap::default());
        assert_eq!(log.count("tex_env"), 12);
    }

    #[test]
    fn explicit_units_follow_the_role_map() {
        assert_eq!(
            source_of(TexMixArgument::TextureUnit(0), UnitMap::new(true)),
            CombineSource::TextureUnit(2)
        );
        assert_eq!(
            source_of(TexMixArgument::TextureUnit(1), UnitMap::new(false)),
            CombineSource::TextureUnit(1)
        );
    }
}
