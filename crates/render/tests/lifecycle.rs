use cubeworld_common::Extent2D;
use cubeworld_render::{
    BackendCall, BackendError, DeviceLifecycle, FeatureLevel, FrameAcquire, HeadlessBackend,
    HeadlessCapabilities, LifecycleState, Op, PresentOptions, PresentOutcome, RenderError,
    RendererOptions, Resource, SkipReason,
};

const SIZE: Extent2D = Extent2D::new(800, 600);

fn lifecycle(caps: HeadlessCapabilities, options: RendererOptions) -> DeviceLifecycle<HeadlessBackend> {
    DeviceLifecycle::create(HeadlessBackend::new(caps), options, SIZE).unwrap()
}

fn ready() -> DeviceLifecycle<HeadlessBackend> {
    lifecycle(HeadlessCapabilities::default(), RendererOptions::default())
}

fn frame(lc: &mut DeviceLifecycle<HeadlessBackend>) -> cubeworld_render::headless::HeadlessFrame {
    match lc.acquire_frame().unwrap() {
        FrameAcquire::Ready(f) => f,
        FrameAcquire::Skipped(reason) => panic!("frame skipped: {reason:?}"),
    }
}

fn position(entries: &[BackendCall], pred: impl Fn(&BackendCall) -> bool) -> usize {
    entries.iter().position(pred).unwrap()
}

#[test]
fn construction_creates_every_resource() {
    let lc = ready();
    assert_eq!(lc.state(), LifecycleState::Ready);
    assert_eq!(lc.generation(), 1);
    assert_eq!(lc.feature_level(), Some(FeatureLevel::Level11_1));
    assert!(lc.color_target().is_some());
    assert!(lc.depth_target().is_some());
    let vp = lc.viewport().unwrap();
    assert_eq!((vp.width, vp.height), (800.0, 600.0));
}

#[test]
fn present_device_removed_recovers_with_same_size() {
    let mut lc = ready();
    let journal = lc.backend().journal();
    let before = lc.back_buffer_size();

    let f = frame(&mut lc);
    journal.clear();
    lc.backend_mut()
        .inject(Op::Present, BackendError::DeviceRemoved("driver upgrade".into()));
    assert_eq!(lc.present(f).unwrap(), PresentOutcome::Recovered);

    assert_eq!(lc.state(), LifecycleState::Ready);
    assert_eq!(lc.recoveries(), 1);
    assert_eq!(lc.generation(), 2);
    assert_eq!(lc.frames_presented(), 0);
    assert_eq!(lc.back_buffer_size(), before);
    assert_eq!(lc.swap_chain().unwrap().size, before);
    assert_eq!(lc.color_target().unwrap().generation, 2);
    assert_eq!(lc.depth_target().unwrap().generation, 2);
    assert_eq!(lc.device().unwrap().generation, 2);

    // Old handles are all gone before the new factory is created.
    let entries = journal.entries();
    let new_factory = position(&entries, |c| matches!(c, BackendCall::CreateFactory { .. }));
    for kind in [
        Resource::ColorTarget,
        Resource::DepthTarget,
        Resource::SwapChain,
        Resource::Device,
        Resource::Factory,
    ] {
        let released = position(&entries, |c| *c == BackendCall::Released(kind));
        assert!(released < new_factory, "{kind:?} released after recreation began");
    }
    let order: Vec<_> = entries
        .iter()
        .filter_map(|c| match c {
            BackendCall::Released(kind) => Some(*kind),
            _ => None,
        })
        .take(5)
        .collect();
    assert_eq!(
        order,
        [
            Resource::ColorTarget,
            Resource::DepthTarget,
            Resource::SwapChain,
            Resource::Device,
            Resource::Factory
        ]
    );

    // The next frame goes through normally.
    let f = frame(&mut lc);
    assert_eq!(lc.present(f).unwrap(), PresentOutcome::Presented);
    assert_eq!(lc.frames_presented(), 1);
}

#[test]
fn handles_are_invalid_between_release_and_recreation() {
    let mut lc = ready();
    lc.release_all_resources();
    assert_eq!(lc.state(), LifecycleState::Uninitialized);
    assert!(lc.color_target().is_none());
    assert!(lc.depth_target().is_none());
    assert!(lc.viewport().is_none());
    assert!(lc.swap_chain().is_none());
    assert!(lc.device().is_none());
    assert!(matches!(lc.acquire_frame(), Err(RenderError::NotReady)));

    lc.create_device_resources().unwrap();
    lc.create_size_dependent_resources(SIZE).unwrap();
    assert!(lc.is_ready());
    assert!(lc.color_target().is_some());
}

#[test]
fn resize_loss_triggers_recovery() {
    let mut lc = ready();
    lc.backend_mut()
        .inject(Op::ResizeSwapChain, BackendError::DeviceReset);
    assert!(lc.on_size_changed(Extent2D::new(1024, 768)).unwrap());
    assert_eq!(lc.recoveries(), 1);
    assert_eq!(lc.back_buffer_size(), Extent2D::new(1024, 768));
    assert!(lc.is_ready());
}

#[test]
fn loss_during_recovery_is_fatal() {
    let mut lc = ready();
    lc.backend_mut()
        .inject(Op::Present, BackendError::DeviceReset);
    lc.backend_mut()
        .inject(Op::CreateSwapChain, BackendError::DeviceRemoved("gone".into()));
    let f = frame(&mut lc);
    let err = lc.present(f).unwrap_err();
    assert!(matches!(err, RenderError::RecoveryFailed(_)));
    assert_eq!(lc.state(), LifecycleState::Failed);
    assert_eq!(lc.recoveries(), 1);
}

#[test]
fn redundant_resize_is_ignored() {
    let mut lc = ready();
    let journal = lc.backend().journal();
    journal.clear();
    assert!(!lc.on_size_changed(SIZE).unwrap());
    assert_eq!(journal.count(|c| matches!(c, BackendCall::ResizeSwapChain { .. })), 0);
    assert_eq!(journal.count(|c| matches!(c, BackendCall::ApplyColorSpace(_))), 1);
}

#[test]
fn zero_size_window_keeps_one_pixel_buffers() {
    let mut lc = ready();
    lc.on_size_changed(Extent2D::new(0, 0)).unwrap();
    assert_eq!(lc.size(), Extent2D::new(0, 0));
    assert_eq!(lc.back_buffer_size(), Extent2D::new(1, 1));
    assert_eq!(lc.swap_chain().unwrap().size, Extent2D::new(1, 1));
}

#[test]
fn unsupported_options_are_downgraded() {
    let caps = HeadlessCapabilities {
        tearing: false,
        hdr: false,
        ..Default::default()
    };
    let options = RendererOptions {
        present: PresentOptions {
            flip_present: true,
            allow_tearing: true,
            enable_hdr: true,
        },
        ..Default::default()
    };
    let lc = lifecycle(caps, options);
    let present = lc.options().present;
    assert!(present.flip_present);
    assert!(!present.allow_tearing);
    assert!(!present.enable_hdr);
}

#[test]
fn tearing_presents_with_zero_interval() {
    let options = RendererOptions {
        present: PresentOptions {
            allow_tearing: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut lc = lifecycle(HeadlessCapabilities::default(), options);
    let journal = lc.backend().journal();
    let f = frame(&mut lc);
    lc.present(f).unwrap();
    assert!(journal.entries().contains(&BackendCall::Present {
        interval: 0,
        tearing: true
    }));
}

#[test]
fn low_feature_level_fails_construction() {
    let caps = HeadlessCapabilities {
        feature_level: FeatureLevel::Level10_1,
        ..Default::default()
    };
    let result = DeviceLifecycle::create(HeadlessBackend::new(caps), RendererOptions::default(), SIZE);
    assert!(matches!(
        result,
        Err(RenderError::Construction(BackendError::FeatureLevelTooLow { .. }))
    ));
}

#[test]
fn missing_adapter_fails_construction() {
    let caps = HeadlessCapabilities {
        adapter_available: false,
        ..Default::default()
    };
    let result = DeviceLifecycle::create(HeadlessBackend::new(caps), RendererOptions::default(), SIZE);
    assert!(matches!(
        result,
        Err(RenderError::Construction(BackendError::AdapterNotFound))
    ));
}

#[test]
fn acquire_outdated_reconfigures_and_timeout_skips() {
    let mut lc = ready();
    lc.backend_mut()
        .inject(Op::AcquireFrame, BackendError::SurfaceOutdated);
    lc.backend_mut().inject(Op::AcquireFrame, BackendError::Timeout);
    assert!(matches!(
        lc.acquire_frame().unwrap(),
        FrameAcquire::Skipped(SkipReason::Reconfigured)
    ));
    assert!(matches!(
        lc.acquire_frame().unwrap(),
        FrameAcquire::Skipped(SkipReason::Timeout)
    ));
    assert_eq!(lc.recoveries(), 0);
    let f = frame(&mut lc);
    assert_eq!(lc.present(f).unwrap(), PresentOutcome::Presented);
}

#[test]
fn acquire_loss_recovers() {
    let mut lc = ready();
    lc.backend_mut()
        .inject(Op::AcquireFrame, BackendError::DeviceRemoved("hung".into()));
    assert!(matches!(
        lc.acquire_frame().unwrap(),
        FrameAcquire::Skipped(SkipReason::Recovered)
    ));
    assert_eq!(lc.generation(), 2);
}

#[test]
fn stale_factory_is_refreshed_after_present() {
    let mut lc = ready();
    let journal = lc.backend().journal();
    lc.backend_mut().invalidate_factories();
    journal.clear();
    let f = frame(&mut lc);
    lc.present(f).unwrap();
    assert_eq!(journal.count(|c| matches!(c, BackendCall::CreateFactory { epoch: 1 })), 1);
    assert_eq!(journal.count(|c| matches!(c, BackendCall::CreateDevice { .. })), 0);
    assert_eq!(lc.generation(), 1);
}

#[test]
fn depth_buffer_is_optional() {
    let options = RendererOptions {
        depth_format: None,
        ..Default::default()
    };
    let lc = lifecycle(HeadlessCapabilities::default(), options);
    assert!(lc.depth_target().is_none());
    assert!(lc.color_target().is_some());
}

#[test]
fn non_loss_present_error_propagates() {
    let mut lc = ready();
    lc.backend_mut()
        .inject(Op::Present, BackendError::Api("invalid call".into()));
    let f = frame(&mut lc);
    assert!(matches!(lc.present(f), Err(RenderError::Backend(BackendError::Api(_)))));
    assert_eq!(lc.recoveries(), 0);
}

#[test]
fn failed_resize_is_not_ready_and_retry_rebuilds() {
    let mut lc = ready();
    lc.backend_mut()
        .inject(Op::ResizeSwapChain, BackendError::Api("E_INVALIDARG".into()));
    let target = Extent2D::new(1024, 768);
    assert!(matches!(
        lc.on_size_changed(target),
        Err(RenderError::Backend(BackendError::Api(_)))
    ));
    assert!(!lc.is_ready());
    assert_eq!(lc.size(), SIZE);
    assert!(lc.color_target().is_none());
    assert!(lc.viewport().is_none());
    assert!(matches!(lc.acquire_frame(), Err(RenderError::NotReady)));

    assert!(lc.on_size_changed(target).unwrap());
    assert!(lc.is_ready());
    assert_eq!(lc.size(), target);
    assert_eq!(lc.swap_chain().unwrap().size, target);
    assert!(lc.color_target().is_some());
    assert!(lc.depth_target().is_some());
    assert_eq!(lc.recoveries(), 0);
    let f = frame(&mut lc);
    assert_eq!(lc.present(f).unwrap(), PresentOutcome::Presented);
}

#[test]
fn failed_depth_target_keeps_lifecycle_unready() {
    let mut lc = ready();
    lc.backend_mut()
        .inject(Op::CreateDepthTarget, BackendError::Api("out of memory".into()));
    assert!(lc.on_size_changed(Extent2D::new(640, 480)).is_err());
    assert_eq!(lc.state(), LifecycleState::DeviceReady);
    assert_eq!(lc.size(), SIZE);

    assert!(lc.on_size_changed(SIZE).unwrap());
    assert!(lc.is_ready());
    assert!(lc.depth_target().is_some());
}
