use std::str::FromStr;

use anyhow::{Context, Result};

use crate::context::{GlContext, GlVersion};

use super::backends::{CoreDevice, CreateFailure, FixedFunctionDevice, ShaderDevice};
use super::contract::Device;
use super::init::{DeviceConfig, DeviceShaders, RenderSettings};

/// Hardware generation a device drives.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendKind {
    FixedFunction,
    Shader,
    Core,
}

impl BackendKind {
    /// Highest generation `version` satisfies.
    pub fn best_for(version: GlVersion) -> Self {
        if version.at_least(3, 3) {
            BackendKind::Core
        } else if version.at_least(2, 1) {
            BackendKind::Shader
        } else {
            BackendKind::FixedFunction
        }
    }

    /// Next generation down; `None` at the fixed-function floor.
    pub fn lower(self) -> Option<Self> {
        match self {
            BackendKind::Core => Some(BackendKind::Shader),
            BackendKind::Shader => Some(BackendKind::FixedFunction),
            BackendKind::FixedFunction => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::FixedFunction => "gl14",
            BackendKind::Shader => "gl21",
            BackendKind::Core => "gl33",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which backend the caller asked for.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum BackendSelection {
    #[default]
    Auto,
    Explicit(BackendKind),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown backend \"{0}\" (expected auto, gl14, gl21 or gl33)")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendSelection {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "auto" => return Ok(BackendSelection::Auto),
            "gl14" | "fixed" => BackendKind::FixedFunction,
            "gl21" | "shader" => BackendKind::Shader,
            "gl33" | "core" => BackendKind::Core,
            _ => return Err(UnknownBackend(s.to_owned())),
        };
        Ok(BackendSelection::Explicit(kind))
    }
}

fn try_create(
    kind: BackendKind,
    gl: Box<dyn GlContext>,
    config: &DeviceConfig,
    settings: &RenderSettings,
    shaders: &DeviceShaders,
) -> Result<Box<dyn Device>, CreateFailure> {
    let device: Box<dyn Device> = match kind {
        BackendKind::Core => Box::new(CoreDevice::try_new(gl, config, settings, shaders)?),
        BackendKind::Shader => Box::new(ShaderDevice::try_new(gl, config, settings, shaders)?),
        BackendKind::FixedFunction => Box::new(FixedFunctionDevice::try_new(gl, config, settings, shaders)?),
    };
    Ok(device)
}

/// Creates the device for `selection`, stepping down one generation at a
/// time while creation fails.
pub fn create_device(
    mut gl: Box<dyn GlContext>,
    selection: BackendSelection,
    config: &DeviceConfig,
    settings: &RenderSettings,
    shaders: &DeviceShaders,
) -> Result<Box<dyn Device>> {
    let version = gl.version();
    let mut kind = match selection {
        BackendSelection::Auto => {
            let kind = BackendKind::best_for(version);
            log::info!("OpenGL {version} detected, selecting {kind} backend");
            kind
        }
        BackendSelection::Explicit(kind) => kind,
    };

    loop {
        let failure = match try_create(kind, gl, config, settings, shaders) {
            Ok(device) => return Ok(device),
            Err(failure) => failure,
        };
        let CreateFailure { error, context } = failure;
        let Some(lower) = kind.lower() else {
            log::error!("{kind} backend creation failed: {error}");
            return Err(error).with_context(|| format!("no usable backend for OpenGL {version}"));
        };
        log::warn!("{kind} backend creation failed ({error}), falling back to {lower}");
        gl = context;
        kind = lower;
    }
}

/// Like [`create_device`] but parses the selection from a name first.
pub fn create_device_named(
    gl: Box<dyn GlContext>,
    backend: &str,
    config: &DeviceConfig,
    settings: &RenderSettings,
    shaders: &DeviceShaders,
) -> Result<Box<dyn Device>> {
    let selection: BackendSelection = backend.parse()?;
    create_device(gl, selection, config, settings, shaders)
}
