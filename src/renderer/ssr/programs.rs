//! SSR Programs
//!
//! Names, pass indices and keywords of the GPU programs the SSR pipeline
//! invokes. Programs are resolved by name through the host's
//! [`ShaderRegistry`] at rebuild time.

use bitflags::bitflags;

use crate::errors::{Result, SsrError};
use crate::renderer::host::{KernelId, ProgramId, ShaderRegistry};

pub const SSR_PROGRAM: &str = "Deferred/ScreenSpaceReflections";
pub const BLUR_PROGRAM: &str = "Deferred/SSRBlur";
pub const HIZ_PROGRAM: &str = "Deferred/GenerateHiZ";
pub const HIZ_KERNEL: &str = "GenerateHiZ";
pub const REPROJECT_PROGRAM: &str = "Deferred/ReprojectScreenColor";
pub const OCEAN_COMBINE_PROGRAM: &str = "Deferred/CombineOceanGBuffer";

/// Passes of [`SSR_PROGRAM`].
pub mod ssr_pass {
    pub const COMPOSE: u32 = 0;
    pub const TRACE: u32 = 1;
}

/// Passes of [`BLUR_PROGRAM`](super::BLUR_PROGRAM).
pub mod blur_pass {
    /// Horizontal blur while downsampling from the previous mip.
    pub const HORIZONTAL_DOWNSAMPLE: u32 = 0;
    pub const VERTICAL: u32 = 1;
    /// Normals-aware blur along both axes.
    pub const NORMALS_AWARE: u32 = 2;
    /// Normals-aware blur along the vertical axis only.
    pub const NORMALS_AWARE_VERTICAL: u32 = 3;
}

bitflags! {
    /// Shader keywords toggled on the SSR and blur programs.
    ///
    /// Flag names are the keyword strings the shaders declare.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SsrKeywords: u32 {
        const HALF_RESOLUTION_TRACING = 1 << 0;
        const PRECOMBINED_OCEAN_GBUFFER = 1 << 1;
    }
}

impl SsrKeywords {
    /// Keywords the blur program declares.
    pub const BLUR: Self = Self::HALF_RESOLUTION_TRACING;
}

/// How the Hi-Z pyramid is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiZProgram {
    /// One compute kernel reading and writing mips of the same texture.
    Compute(KernelId),
    /// Full-screen draws flip-flopping between two textures.
    Shader(ProgramId),
}

/// Every program one camera's pipeline needs, resolved for one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsrPrograms {
    pub ssr: ProgramId,
    pub blur: ProgramId,
    pub reproject: ProgramId,
    pub hiz: HiZProgram,
    /// Present only while an external ocean source is registered.
    pub ocean_combine: Option<ProgramId>,
}

impl SsrPrograms {
    /// Looks up every program the pipeline needs.
    ///
    /// The compute kernel is only required when `compute_hiz` is set, the
    /// shader variant otherwise, and the ocean combine program only when
    /// `precombined_ocean` is set.
    pub fn resolve(
        registry: &dyn ShaderRegistry,
        compute_hiz: bool,
        precombined_ocean: bool,
    ) -> Result<Self> {
        let program = |name: &str| {
            registry
                .find_program(name)
                .ok_or_else(|| SsrError::MissingProgram(name.to_owned()))
        };

        let hiz = if compute_hiz {
            HiZProgram::Compute(
                registry
                    .find_kernel(HIZ_KERNEL)
                    .ok_or_else(|| SsrError::MissingProgram(HIZ_KERNEL.to_owned()))?,
            )
        } else {
            HiZProgram::Shader(program(HIZ_PROGRAM)?)
        };

        let ocean_combine = if precombined_ocean {
            Some(program(OCEAN_COMBINE_PROGRAM)?)
        } else {
            None
        };

        Ok(Self {
            ssr: program(SSR_PROGRAM)?,
            blur: program(BLUR_PROGRAM)?,
            reproject: program(REPROJECT_PROGRAM)?,
            hiz,
            ocean_combine,
        })
    }
}
