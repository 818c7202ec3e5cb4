//! SSR Orchestrator Tests
//!
//! Tests for:
//! - Resource allocation per topology (compute/shader Hi-Z, VR, ocean)
//! - Rebuild policy (HDR, VR, ocean, invalidation, resize)
//! - Frame hooks: attach/detach, ssrEnabled flag, projection matrix upload
//! - Graceful degrade on missing or unloaded programs
//! - Allocation failure disabling a single camera
//! - Recorded command layout (Hi-Z dispatches, blur passes, history copy)
//! - Camera registry and external compositing registration

mod common;

use std::sync::Arc;

use common::{
    CountingAllocator, HookCall, RecordingHooks, compute_caps, manager, render_eye,
    shader_library,
};
use deferred_ssr::renderer::graph::command::{GpuCommand, TextureSource};
use deferred_ssr::renderer::host::ProgramId;
use deferred_ssr::renderer::ssr::programs::{
    BLUR_PROGRAM, HIZ_PROGRAM, OCEAN_COMBINE_PROGRAM, REPROJECT_PROGRAM, SSR_PROGRAM, blur_pass,
    ssr_pass,
};
use deferred_ssr::{
    CameraEvent, CameraFrame, CameraId, CapabilityContext, CommandSequence, Eye, GraphicsApi,
    RenderPipelineManager, ShaderRegistry, SsrError, SsrSettings, StereoEye,
};

const CAMERA: CameraId = CameraId(1);

fn frame_1080p() -> CameraFrame {
    CameraFrame::new(1920, 1080)
}

fn main_sequence(
    manager: &RenderPipelineManager<CountingAllocator>,
    eye: Eye,
) -> Arc<CommandSequence> {
    manager
        .camera(CAMERA)
        .and_then(|ssr| ssr.sequences(eye))
        .and_then(|seqs| seqs.main.clone())
        .expect("main sequence recorded")
}

fn is_draw(command: &GpuCommand, program: ProgramId, pass: u32) -> bool {
    *command == GpuCommand::DrawFullscreen { program, pass }
}

fn draws(sequence: &CommandSequence, program: ProgramId, pass: u32) -> usize {
    sequence
        .commands()
        .iter()
        .filter(|c| is_draw(c, program, pass))
        .count()
}

/// Index of the first command matching `pred`.
fn first(sequence: &CommandSequence, pred: impl Fn(&GpuCommand) -> bool) -> usize {
    sequence
        .commands()
        .iter()
        .position(pred)
        .expect("command recorded")
}

/// Index of the last command matching `pred`.
fn last(sequence: &CommandSequence, pred: impl Fn(&GpuCommand) -> bool) -> usize {
    sequence
        .commands()
        .iter()
        .rposition(pred)
        .expect("command recorded")
}

/// Asserts Hi-Z, reprojection, trace, normals-aware blur and compose run in
/// that order, given the index of the last Hi-Z command.
fn assert_pass_order(sequence: &CommandSequence, hiz_done: usize) {
    let ssr = program(SSR_PROGRAM);
    let blur = program(BLUR_PROGRAM);

    let reproject = first(sequence, |c| is_draw(c, program(REPROJECT_PROGRAM), 0));
    let trace = first(sequence, |c| is_draw(c, ssr, ssr_pass::TRACE));
    let normals_blur = last(sequence, |c| {
        is_draw(c, blur, blur_pass::NORMALS_AWARE)
            || is_draw(c, blur, blur_pass::NORMALS_AWARE_VERTICAL)
    });
    let compose = first(sequence, |c| is_draw(c, ssr, ssr_pass::COMPOSE));

    assert!(hiz_done < reproject, "Hi-Z {hiz_done} before reprojection {reproject}");
    assert!(reproject < trace, "reprojection {reproject} before trace {trace}");
    assert!(trace < normals_blur, "trace {trace} before blur {normals_blur}");
    assert!(normals_blur < compose, "blur {normals_blur} before compose {compose}");
}

fn program(name: &str) -> ProgramId {
    shader_library().find_program(name).unwrap()
}

// ============================================================================
// Allocation Tests
// ============================================================================

#[test]
fn mono_compute_pipeline_allocates_eight_targets() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let ssr = manager.camera(CAMERA).unwrap();
    assert_eq!(ssr.texture_count(), 8);
    assert_eq!(manager.pool().live_count(), 8);
    Ok(())
}

#[test]
fn shader_hiz_path_adds_a_flip_flop_texture() -> anyhow::Result<()> {
    let mut manager = manager(CapabilityContext::new(false, GraphicsApi::Vulkan));
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    assert_eq!(manager.camera(CAMERA).unwrap().texture_count(), 9);
    Ok(())
}

#[test]
fn hiz_random_write_follows_compute_capability() -> anyhow::Result<()> {
    for compute in [true, false] {
        let mut manager = manager(CapabilityContext::new(compute, GraphicsApi::Vulkan));
        let shaders = shader_library();
        let mut hooks = RecordingHooks::default();
        manager.attach_camera(CAMERA)?;
        render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

        let hiz: Vec<_> = manager
            .pool()
            .allocator()
            .specs
            .iter()
            .filter(|s| s.label == "ssr.hiz")
            .collect();
        assert!(!hiz.is_empty());
        assert!(hiz.iter().all(|s| s.random_write == compute));
        assert!(hiz.iter().all(|s| (s.width, s.height) == (960, 540)));
        assert!(hiz.iter().all(|s| s.wrap == wgpu::AddressMode::ClampToEdge));
        assert!(hiz.iter().all(|s| s.sampler_descriptor().anisotropy_clamp == 1));
    }
    Ok(())
}

#[test]
fn vr_doubles_targets_and_sequences() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    let left = frame_1080p().with_vr(1440, 1600, StereoEye::Left);
    let right = frame_1080p().with_vr(1440, 1600, StereoEye::Right);
    render_eye(&mut manager, CAMERA, &left, &shaders, &mut hooks);
    render_eye(&mut manager, CAMERA, &right, &shaders, &mut hooks);

    let ssr = manager.camera(CAMERA).unwrap();
    assert_eq!(ssr.texture_count(), 16);

    let left_main = main_sequence(&manager, Eye::Left);
    let right_main = main_sequence(&manager, Eye::Right);
    assert_ne!(left_main.id(), right_main.id());
    assert_eq!(left_main.eye(), Eye::Left);
    assert_eq!(right_main.eye(), Eye::Right);

    // No rebuild between the two eyes of one frame
    assert_eq!(manager.pool().allocation_count(), 16);
    Ok(())
}

// ============================================================================
// Rebuild Policy Tests
// ============================================================================

#[test]
fn resize_does_not_rebuild_by_default() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    let allocations = manager.pool().allocation_count();

    render_eye(&mut manager, CAMERA, &CameraFrame::new(1280, 720), &shaders, &mut hooks);
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    assert_eq!(manager.pool().allocation_count(), allocations);
    assert_eq!(manager.pool().release_count(), 0);
    Ok(())
}

#[test]
fn hdr_change_rebuilds_with_new_format() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    render_eye(&mut manager, CAMERA, &frame_1080p().with_hdr(true), &shaders, &mut hooks);

    assert_eq!(manager.pool().allocation_count(), 16);
    assert_eq!(manager.pool().release_count(), 8);
    let state = manager.camera(CAMERA).unwrap().pipeline_state().unwrap();
    assert!(state.hdr);
    assert_eq!(state.color_format(), wgpu::TextureFormat::Rgba16Float);
    Ok(())
}

#[test]
fn vr_change_rebuilds() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    let vr = frame_1080p().with_vr(1920, 1080, StereoEye::Left);
    render_eye(&mut manager, CAMERA, &vr, &shaders, &mut hooks);

    assert_eq!(manager.pool().release_count(), 8);
    assert_eq!(manager.camera(CAMERA).unwrap().texture_count(), 16);
    Ok(())
}

#[test]
fn rebuild_on_resize_setting_rebuilds_on_size_change() -> anyhow::Result<()> {
    let settings = SsrSettings {
        rebuild_on_resize: true,
        ..Default::default()
    };
    let mut manager =
        RenderPipelineManager::new(compute_caps(), settings, CountingAllocator::default());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    render_eye(&mut manager, CAMERA, &CameraFrame::new(1280, 720), &shaders, &mut hooks);

    let state = manager.camera(CAMERA).unwrap().pipeline_state().unwrap();
    assert_eq!((state.width, state.height), (1280, 720));
    assert_eq!(manager.pool().release_count(), 8);
    Ok(())
}

#[test]
fn invalidate_forces_one_rebuild() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    manager.camera_mut(CAMERA).unwrap().invalidate();
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    assert_eq!(manager.pool().allocation_count(), 16);
    assert_eq!(manager.pool().live_count(), 8);
    Ok(())
}

#[test]
fn new_settings_apply_on_the_next_rebuild() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    manager.set_settings(SsrSettings {
        hiz_target_size: 64,
        screen_color_anisotropy: 0,
        ..Default::default()
    });
    assert_eq!(manager.settings().screen_color_anisotropy, 1);

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    let state = manager.camera(CAMERA).unwrap().pipeline_state().unwrap();
    assert_eq!(state.screen_mip_count(), 8);

    manager.camera_mut(CAMERA).unwrap().invalidate();
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    let state = manager.camera(CAMERA).unwrap().pipeline_state().unwrap();
    // 64 * 2^5 = 2048 >= 1920
    assert_eq!(state.screen_mip_count(), 5);
    assert_eq!(state.screen_color_anisotropy, 1);
    Ok(())
}

#[test]
fn half_resolution_toggle_rebuilds_and_updates_keywords() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    let ssr_program = program(SSR_PROGRAM);
    let blur_program = program(BLUR_PROGRAM);
    assert_eq!(hooks.keyword(ssr_program, "HALF_RESOLUTION_TRACING"), Some(true));
    assert_eq!(hooks.keyword(blur_program, "HALF_RESOLUTION_TRACING"), Some(true));
    assert_eq!(hooks.keyword(blur_program, "PRECOMBINED_OCEAN_GBUFFER"), None);

    manager
        .camera_mut(CAMERA)
        .unwrap()
        .set_half_resolution_tracing(false);
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    assert_eq!(hooks.keyword(ssr_program, "HALF_RESOLUTION_TRACING"), Some(false));
    let tracing = manager
        .camera(CAMERA)
        .unwrap()
        .pipeline_state()
        .unwrap()
        .tracing_size();
    assert_eq!((tracing.x, tracing.y), (1920, 1080));
    Ok(())
}

// ============================================================================
// Frame Hook Tests
// ============================================================================

#[test]
fn sequences_are_attached_for_the_frame_and_retracted_after() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    let frame = frame_1080p();

    manager.on_frame_begin(CAMERA, &frame, &shaders, &mut hooks);
    assert_eq!(hooks.attached_at(CameraEvent::BeforeTransparency).len(), 1);
    assert_eq!(hooks.attached_at(CameraEvent::BeforePresent).len(), 1);
    assert_eq!(manager.camera(CAMERA).unwrap().attached_count(), 2);

    manager.on_frame_end(CAMERA, &frame, &shaders, &mut hooks);
    assert!(hooks.attached.is_empty());
    assert_eq!(manager.camera(CAMERA).unwrap().attached_count(), 0);
    Ok(())
}

#[test]
fn sequences_are_reused_across_frames() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    let first = main_sequence(&manager, Eye::Left).id();
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    assert_eq!(main_sequence(&manager, Eye::Left).id(), first);
    Ok(())
}

#[test]
fn projection_matrix_is_uploaded_before_attach() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    let projection = glam::Mat4::perspective_rh(1.2, 16.0 / 9.0, 0.1, 1000.0);
    let frame = frame_1080p().with_projection(projection);
    manager.on_frame_begin(CAMERA, &frame, &shaders, &mut hooks);

    let matrix_at = hooks
        .calls
        .iter()
        .position(|c| matches!(c, HookCall::ProgramMatrix(_, "textureSpaceProjectionMatrix", _)))
        .expect("matrix uploaded");
    let attach_at = hooks
        .calls
        .iter()
        .position(|c| matches!(c, HookCall::Attach(..)))
        .expect("sequence attached");
    assert!(matrix_at < attach_at);

    let expected = deferred_ssr::renderer::ssr::texture_space_projection(projection, false);
    assert!(hooks.calls.contains(&HookCall::ProgramMatrix(
        program(SSR_PROGRAM),
        "textureSpaceProjectionMatrix",
        expected
    )));
    Ok(())
}

#[test]
fn ssr_flag_is_cleared_after_the_last_eye_only() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    let left = frame_1080p().with_vr(1440, 1600, StereoEye::Left);
    let right = frame_1080p().with_vr(1440, 1600, StereoEye::Right);

    manager.on_frame_begin(CAMERA, &left, &shaders, &mut hooks);
    assert_eq!(hooks.last_global("ssrEnabled"), Some(1));
    manager.on_frame_end(CAMERA, &left, &shaders, &mut hooks);
    assert_eq!(hooks.last_global("ssrEnabled"), Some(1));

    manager.on_frame_begin(CAMERA, &right, &shaders, &mut hooks);
    let right_attached = hooks.attached_at(CameraEvent::BeforeTransparency);
    assert_eq!(right_attached.len(), 1);
    assert_eq!(right_attached[0].eye(), Eye::Right);
    manager.on_frame_end(CAMERA, &right, &shaders, &mut hooks);
    assert_eq!(hooks.last_global("ssrEnabled"), Some(0));
    Ok(())
}

#[test]
fn disabled_camera_attaches_nothing() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?.disable();

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    assert_eq!(hooks.attach_count(), 0);
    assert_eq!(manager.pool().allocation_count(), 0);
    assert!(manager.camera(CAMERA).unwrap().is_disabled());
    Ok(())
}

// ============================================================================
// Graceful Degrade Tests
// ============================================================================

#[test]
fn missing_program_skips_main_sequence() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let mut shaders = shader_library();
    shaders.remove_program(SSR_PROGRAM);
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    manager.on_frame_begin(CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let ssr = manager.camera(CAMERA).unwrap();
    assert!(ssr.programs().is_none());
    assert!(!ssr.is_disabled());
    assert!(ssr.sequences(Eye::Left).unwrap().main.is_none());
    assert!(hooks.attached_at(CameraEvent::BeforeTransparency).is_empty());
    assert_eq!(hooks.attached_at(CameraEvent::BeforePresent).len(), 1);
    assert_eq!(hooks.last_global("ssrEnabled"), None);
    Ok(())
}

#[test]
fn unloaded_program_is_skipped_at_attach_time() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let mut shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    shaders.remove_program(BLUR_PROGRAM);
    hooks.attached.clear();

    manager.on_frame_begin(CAMERA, &frame_1080p(), &shaders, &mut hooks);
    assert!(hooks.attached_at(CameraEvent::BeforeTransparency).is_empty());
    assert_eq!(hooks.attached_at(CameraEvent::BeforePresent).len(), 1);
    Ok(())
}

#[test]
fn released_target_skips_sequence_and_rebuilds() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    // A target only the main sequence uses
    let sequences = manager.camera(CAMERA).unwrap().sequences(Eye::Left).unwrap();
    let copy_targets = sequences.history_copy.as_ref().unwrap().referenced_targets();
    let released = sequences
        .main
        .as_ref()
        .unwrap()
        .referenced_targets()
        .into_iter()
        .find(|handle| !copy_targets.contains(handle))
        .unwrap();
    manager.pool_mut().release(released);

    manager.on_frame_begin(CAMERA, &frame_1080p(), &shaders, &mut hooks);
    assert!(hooks.attached_at(CameraEvent::BeforeTransparency).is_empty());
    assert_eq!(hooks.attached_at(CameraEvent::BeforePresent).len(), 1);
    manager.on_frame_end(CAMERA, &frame_1080p(), &shaders, &mut hooks);

    manager.on_frame_begin(CAMERA, &frame_1080p(), &shaders, &mut hooks);
    assert_eq!(hooks.attached_at(CameraEvent::BeforeTransparency).len(), 1);
    manager.on_frame_end(CAMERA, &frame_1080p(), &shaders, &mut hooks);

    assert_eq!(manager.pool().live_count(), 8);
    assert!(
        main_sequence(&manager, Eye::Left)
            .referenced_targets()
            .into_iter()
            .all(|handle| manager.pool().contains(handle))
    );
    Ok(())
}

#[test]
fn allocation_failure_disables_only_that_camera() -> anyhow::Result<()> {
    let mut manager = RenderPipelineManager::new(
        compute_caps(),
        SsrSettings::default(),
        CountingAllocator::failing_after(5),
    );
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let ssr = manager.camera(CAMERA).unwrap();
    assert!(ssr.has_failed());
    assert!(ssr.is_disabled());
    assert_eq!(ssr.texture_count(), 0);
    assert!(ssr.pipeline_state().is_none());
    assert_eq!(manager.pool().live_count(), 0);
    assert_eq!(manager.pool().allocation_count(), manager.pool().release_count());
    assert_eq!(hooks.attach_count(), 0);

    // Stays disabled on later frames without retrying
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    assert_eq!(manager.pool().allocation_count(), 5);
    Ok(())
}

#[test]
fn enable_retries_a_failed_build() -> anyhow::Result<()> {
    let mut manager = RenderPipelineManager::new(
        compute_caps(),
        SsrSettings::default(),
        CountingAllocator::failing_after(5),
    );
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    manager.pool_mut().allocator_mut().budget = None;
    manager.camera_mut(CAMERA).unwrap().enable();
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let ssr = manager.camera(CAMERA).unwrap();
    assert!(!ssr.has_failed());
    assert_eq!(ssr.texture_count(), 8);
    Ok(())
}

// ============================================================================
// Recorded Command Tests
// ============================================================================

#[test]
fn compute_hiz_dispatches_one_group_grid_per_level() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let main = main_sequence(&manager, Eye::Left);
    let groups: Vec<[u32; 3]> = main
        .commands()
        .iter()
        .filter_map(|c| match c {
            GpuCommand::DispatchCompute { groups, .. } => Some(*groups),
            _ => None,
        })
        .collect();

    // 960x540, 480x270, 240x135, 120x67, 60x33, 30x16, 15x8
    assert_eq!(
        groups,
        vec![
            [120, 68, 1],
            [60, 34, 1],
            [30, 17, 1],
            [15, 9, 1],
            [8, 5, 1],
            [4, 2, 1],
            [2, 1, 1],
        ]
    );
    Ok(())
}

#[test]
fn shader_hiz_copies_back_odd_levels() -> anyhow::Result<()> {
    let mut manager = manager(CapabilityContext::new(false, GraphicsApi::OpenGl));
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let main = main_sequence(&manager, Eye::Left);
    let copies: Vec<u32> = main
        .commands()
        .iter()
        .filter_map(|c| match c {
            GpuCommand::CopyMip { destination, .. } => Some(destination.mip),
            _ => None,
        })
        .collect();
    assert_eq!(copies, vec![1, 3, 5]);

    let hiz_program = shaders.find_program(HIZ_PROGRAM).unwrap();
    assert_eq!(draws(&main, hiz_program, 0), 7);
    assert!(
        !main
            .commands()
            .iter()
            .any(|c| matches!(c, GpuCommand::DispatchCompute { .. }))
    );
    Ok(())
}

#[test]
fn first_normals_blur_iteration_is_vertical_under_half_resolution() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let main = main_sequence(&manager, Eye::Left);
    let blur = program(BLUR_PROGRAM);
    assert_eq!(draws(&main, blur, blur_pass::NORMALS_AWARE_VERTICAL), 1);
    assert_eq!(draws(&main, blur, blur_pass::NORMALS_AWARE), 6);
    // 7 screen-color mips plus 3 hit-distance mips
    assert_eq!(draws(&main, blur, blur_pass::HORIZONTAL_DOWNSAMPLE), 10);
    assert_eq!(draws(&main, blur, blur_pass::VERTICAL), 10);
    Ok(())
}

#[test]
fn full_resolution_blur_uses_combined_pass_only() -> anyhow::Result<()> {
    let settings = SsrSettings {
        half_resolution_tracing: false,
        ..Default::default()
    };
    let mut manager =
        RenderPipelineManager::new(compute_caps(), settings, CountingAllocator::default());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let main = main_sequence(&manager, Eye::Left);
    let blur = program(BLUR_PROGRAM);
    assert_eq!(draws(&main, blur, blur_pass::NORMALS_AWARE_VERTICAL), 0);
    assert_eq!(draws(&main, blur, blur_pass::NORMALS_AWARE), 7);
    Ok(())
}

#[test]
fn trace_precedes_compose_and_compose_targets_camera() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let main = main_sequence(&manager, Eye::Left);
    let ssr = program(SSR_PROGRAM);
    let commands = main.commands();
    let trace = commands
        .iter()
        .position(|c| *c == GpuCommand::DrawFullscreen { program: ssr, pass: ssr_pass::TRACE })
        .unwrap();
    let compose = commands
        .iter()
        .position(|c| *c == GpuCommand::DrawFullscreen { program: ssr, pass: ssr_pass::COMPOSE })
        .unwrap();
    assert!(trace < compose);
    assert_eq!(compose, commands.len() - 1);

    match &commands[trace - 1] {
        GpuCommand::SetRenderTargets { colors } => assert_eq!(colors.len(), 2),
        other => panic!("expected MRT binding before trace, got {other:?}"),
    }
    match &commands[compose - 1] {
        GpuCommand::SetRenderTargets { colors } => {
            assert_eq!(colors[0].source, TextureSource::CameraTarget);
        }
        other => panic!("expected camera target before compose, got {other:?}"),
    }
    Ok(())
}

#[test]
fn compute_path_runs_passes_in_order() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let main = main_sequence(&manager, Eye::Left);
    let hiz_done = last(&main, |c| matches!(c, GpuCommand::DispatchCompute { .. }));
    assert_pass_order(&main, hiz_done);
    Ok(())
}

#[test]
fn shader_path_runs_passes_in_order() -> anyhow::Result<()> {
    let mut manager = manager(CapabilityContext::new(false, GraphicsApi::OpenGl));
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let main = main_sequence(&manager, Eye::Left);
    let hiz = program(HIZ_PROGRAM);
    let hiz_done = last(&main, |c| {
        is_draw(c, hiz, 0) || matches!(c, GpuCommand::CopyMip { .. })
    });
    assert_pass_order(&main, hiz_done);
    Ok(())
}

#[test]
fn ocean_combine_runs_before_hiz() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    manager.register_external_compositing_source(CAMERA);
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let main = main_sequence(&manager, Eye::Left);
    let ocean = first(&main, |c| is_draw(c, program(OCEAN_COMBINE_PROGRAM), 0));
    let hiz_start = first(&main, |c| matches!(c, GpuCommand::DispatchCompute { .. }));
    let hiz_done = last(&main, |c| matches!(c, GpuCommand::DispatchCompute { .. }));
    assert!(ocean < hiz_start);
    assert_pass_order(&main, hiz_done);
    Ok(())
}

#[test]
fn history_copy_blits_camera_into_previous_slot() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let copy = manager
        .camera(CAMERA)
        .and_then(|ssr| ssr.sequences(Eye::Left))
        .and_then(|seqs| seqs.history_copy.clone())
        .unwrap();
    assert_eq!(copy.event(), CameraEvent::BeforePresent);
    assert_eq!(copy.len(), 1);
    let GpuCommand::Blit {
        source,
        destination,
    } = &copy.commands()[0]
    else {
        panic!("expected a blit");
    };
    assert_eq!(*source, TextureSource::CameraTarget);
    assert_eq!(destination.mip, 0);

    // The main sequence reads the same texture as last frame's color
    let main = main_sequence(&manager, Eye::Left);
    assert!(main.commands().contains(&GpuCommand::SetGlobalTexture {
        name: "lastFrameColor",
        texture: destination.source,
    }));
    Ok(())
}

// ============================================================================
// Registry & External Compositing Tests
// ============================================================================

#[test]
fn camera_can_only_be_attached_once() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    manager.attach_camera(CAMERA)?;
    assert!(matches!(
        manager.attach_camera(CAMERA),
        Err(SsrError::CameraAlreadyBound(id)) if id == CAMERA
    ));
    Ok(())
}

#[test]
fn detach_releases_every_target() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    manager.attach_camera(CameraId(2))?;

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    render_eye(&mut manager, CAMERA, &frame_1080p().with_hdr(true), &shaders, &mut hooks);
    render_eye(&mut manager, CameraId(2), &CameraFrame::new(640, 480), &shaders, &mut hooks);

    assert_eq!(manager.cameras().count(), 2);
    manager.detach_camera(CAMERA, &mut hooks)?;
    assert_eq!(manager.pool().live_count(), 8);
    assert_eq!(
        manager.cameras().map(|(id, _)| *id).collect::<Vec<_>>(),
        vec![CameraId(2)]
    );
    manager.detach_camera(CameraId(2), &mut hooks)?;

    assert_eq!(manager.pool().allocation_count(), manager.pool().release_count());
    assert!(manager.pool().allocator().live.is_empty());
    assert!(matches!(
        manager.detach_camera(CAMERA, &mut hooks),
        Err(SsrError::UnknownCamera(_))
    ));
    Ok(())
}

#[test]
fn detach_mid_frame_retracts_sequences() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    manager.on_frame_begin(CAMERA, &frame_1080p(), &shaders, &mut hooks);
    assert_eq!(hooks.attached.len(), 2);
    manager.detach_camera(CAMERA, &mut hooks)?;
    assert!(hooks.attached.is_empty());
    Ok(())
}

#[test]
fn external_source_on_unknown_camera_is_rejected() {
    let mut manager = manager(compute_caps());
    let result = manager.register_external_compositing_source(CameraId(42));
    assert!(!result.accepted);
    assert!(!manager.unregister_external_compositing_source(CameraId(42)));
}

#[test]
fn external_source_adds_ocean_pass_and_textures() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;
    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);

    let result = manager.register_external_compositing_source(CAMERA);
    assert!(result.accepted);
    assert!(result.half_resolution_in_use);

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    assert_eq!(manager.camera(CAMERA).unwrap().texture_count(), 10);

    let ssr_program = program(SSR_PROGRAM);
    assert_eq!(hooks.keyword(ssr_program, "PRECOMBINED_OCEAN_GBUFFER"), Some(true));

    // Ocean combine is the first draw of the main sequence
    let main = main_sequence(&manager, Eye::Left);
    let first_draw = main
        .commands()
        .iter()
        .find_map(|c| match c {
            GpuCommand::DrawFullscreen { program, .. } => Some(*program),
            _ => None,
        })
        .unwrap();
    assert_eq!(first_draw, program(OCEAN_COMBINE_PROGRAM));
    Ok(())
}

#[test]
fn second_external_source_is_rejected_until_unregistered() -> anyhow::Result<()> {
    let mut manager = manager(compute_caps());
    let shaders = shader_library();
    let mut hooks = RecordingHooks::default();
    manager.attach_camera(CAMERA)?;

    assert!(manager.register_external_compositing_source(CAMERA).accepted);
    assert!(!manager.register_external_compositing_source(CAMERA).accepted);

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    assert!(manager.unregister_external_compositing_source(CAMERA));
    assert!(!manager.unregister_external_compositing_source(CAMERA));

    render_eye(&mut manager, CAMERA, &frame_1080p(), &shaders, &mut hooks);
    assert_eq!(manager.camera(CAMERA).unwrap().texture_count(), 8);
    assert!(manager.register_external_compositing_source(CAMERA).accepted);
    Ok(())
}
