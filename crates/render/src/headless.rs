//! A graphics backend with no GPU behind it.
//!
//! Every call is appended to a shared [`Journal`]; handles log their own
//! release when dropped, so teardown order is observable. Failures can be
//! queued per operation to script device loss and other faults.

use crate::backend::{
    BackBufferFormat, BackendError, ColorSpace, DepthFormat, FeatureLevel, GraphicsBackend,
    PresentFeature, PresentSync, SwapChainDesc,
};
use cubeworld_common::Extent2D;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// One observable backend event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CreateFactory { epoch: u64 },
    CreateDevice { generation: u64 },
    CreateSwapChain { size: Extent2D, format: BackBufferFormat },
    ResizeSwapChain { size: Extent2D },
    UnbindTargets,
    ApplyColorSpace(ColorSpace),
    CreateColorTarget { generation: u64, size: Extent2D },
    CreateDepthTarget { generation: u64, size: Extent2D },
    AcquireFrame,
    Present { interval: u32, tearing: bool },
    Failed { op: Op, error: BackendError },
    Released(Resource),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Factory,
    Device,
    SwapChain,
    ColorTarget,
    DepthTarget,
}

/// Operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreateFactory,
    CreateDevice,
    CreateSwapChain,
    ResizeSwapChain,
    CreateColorTarget,
    CreateDepthTarget,
    AcquireFrame,
    Present,
}

/// Shared, append-only record of backend calls.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<BackendCall>>>);

impl Journal {
    fn push(&self, call: BackendCall) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    pub fn entries(&self) -> Vec<BackendCall> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Number of entries matching `pred`.
    pub fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| pred(c))
            .count()
    }
}

/// What the simulated hardware can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessCapabilities {
    pub adapter_available: bool,
    pub feature_level: FeatureLevel,
    pub flip_model: bool,
    pub tearing: bool,
    pub hdr: bool,
    pub hdr10_output: bool,
}

impl Default for HeadlessCapabilities {
    fn default() -> Self {
        Self {
            adapter_available: true,
            feature_level: FeatureLevel::Level11_1,
            flip_model: true,
            tearing: true,
            hdr: true,
            hdr10_output: false,
        }
    }
}

/// Generation-tagged handle; logs its release to the journal on drop.
#[derive(Debug)]
pub struct HeadlessHandle {
    pub kind: Resource,
    pub generation: u64,
    pub size: Extent2D,
    journal: Journal,
}

impl Drop for HeadlessHandle {
    fn drop(&mut self) {
        self.journal.push(BackendCall::Released(self.kind));
    }
}

#[derive(Debug)]
pub struct HeadlessFactory {
    pub epoch: u64,
    _handle: HeadlessHandle,
}

#[derive(Debug)]
pub struct HeadlessDevice {
    pub generation: u64,
    pub feature_level: FeatureLevel,
    _handle: HeadlessHandle,
}

#[derive(Debug)]
pub struct HeadlessSwapChain {
    pub generation: u64,
    pub size: Extent2D,
    pub format: BackBufferFormat,
    pub buffer_count: u32,
    pub color_space: ColorSpace,
    _handle: HeadlessHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessFrame {
    pub index: u64,
    pub size: Extent2D,
}

/// Backend that records calls instead of talking to a GPU.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    caps: HeadlessCapabilities,
    journal: Journal,
    faults: VecDeque<(Op, BackendError)>,
    factory_epoch: u64,
    device_generation: u64,
    next_frame: u64,
}

impl HeadlessBackend {
    pub fn new(caps: HeadlessCapabilities) -> Self {
        Self {
            caps,
            ..Default::default()
        }
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn capabilities_mut(&mut self) -> &mut HeadlessCapabilities {
        &mut self.caps
    }

    /// Make the next call of `op` fail with `error`. Faults queue in order.
    pub fn inject(&mut self, op: Op, error: BackendError) {
        self.faults.push_back((op, error));
    }

    /// Simulate a display configuration change: existing factories go stale.
    pub fn invalidate_factories(&mut self) {
        self.factory_epoch += 1;
    }

    fn fault(&mut self, op: Op) -> Result<(), BackendError> {
        let Some(pos) = self.faults.iter().position(|(o, _)| *o == op) else {
            return Ok(());
        };
        let Some((_, error)) = self.faults.remove(pos) else {
            return Ok(());
        };
        self.journal.push(BackendCall::Failed {
            op,
            error: error.clone(),
        });
        Err(error)
    }

    fn handle(&self, kind: Resource, generation: u64, size: Extent2D) -> HeadlessHandle {
        HeadlessHandle {
            kind,
            generation,
            size,
            journal: self.journal.clone(),
        }
    }
}

impl GraphicsBackend for HeadlessBackend {
    type Factory = HeadlessFactory;
    type Device = HeadlessDevice;
    type SwapChain = HeadlessSwapChain;
    type ColorTarget = HeadlessHandle;
    type DepthTarget = HeadlessHandle;
    type Frame = HeadlessFrame;

    fn create_factory(&mut self) -> Result<HeadlessFactory, BackendError> {
        self.fault(Op::CreateFactory)?;
        self.journal.push(BackendCall::CreateFactory {
            epoch: self.factory_epoch,
        });
        Ok(HeadlessFactory {
            epoch: self.factory_epoch,
            _handle: self.handle(Resource::Factory, 0, Extent2D::default()),
        })
    }

    fn is_factory_current(&self, factory: &HeadlessFactory) -> bool {
        factory.epoch == self.factory_epoch
    }

    fn supports(&self, _factory: &HeadlessFactory, feature: PresentFeature) -> bool {
        match feature {
            PresentFeature::FlipModel => self.caps.flip_model,
            PresentFeature::Tearing => self.caps.tearing,
            PresentFeature::Hdr => self.caps.hdr,
        }
    }

    fn create_device(
        &mut self,
        _factory: &HeadlessFactory,
        min_level: FeatureLevel,
    ) -> Result<(HeadlessDevice, FeatureLevel), BackendError> {
        self.fault(Op::CreateDevice)?;
        if !self.caps.adapter_available {
            return Err(BackendError::AdapterNotFound);
        }
        if self.caps.feature_level < min_level {
            return Err(BackendError::FeatureLevelTooLow {
                required: min_level,
                achieved: self.caps.feature_level,
            });
        }
        self.device_generation += 1;
        let generation = self.device_generation;
        self.journal.push(BackendCall::CreateDevice { generation });
        let device = HeadlessDevice {
            generation,
            feature_level: self.caps.feature_level,
            _handle: self.handle(Resource::Device, generation, Extent2D::default()),
        };
        Ok((device, self.caps.feature_level))
    }

    fn create_swap_chain(
        &mut self,
        _factory: &HeadlessFactory,
        device: &HeadlessDevice,
        desc: &SwapChainDesc,
    ) -> Result<HeadlessSwapChain, BackendError> {
        self.fault(Op::CreateSwapChain)?;
        self.journal.push(BackendCall::CreateSwapChain {
            size: desc.size,
            format: desc.format,
        });
        Ok(HeadlessSwapChain {
            generation: device.generation,
            size: desc.size,
            format: desc.format,
            buffer_count: desc.buffer_count,
            color_space: ColorSpace::default(),
            _handle: self.handle(Resource::SwapChain, device.generation, desc.size),
        })
    }

    fn resize_swap_chain(
        &mut self,
        _device: &HeadlessDevice,
        swap_chain: &mut HeadlessSwapChain,
        desc: &SwapChainDesc,
    ) -> Result<(), BackendError> {
        self.fault(Op::ResizeSwapChain)?;
        self.journal
            .push(BackendCall::ResizeSwapChain { size: desc.size });
        swap_chain.size = desc.size;
        swap_chain.format = desc.format;
        swap_chain.buffer_count = desc.buffer_count;
        Ok(())
    }

    fn unbind_targets(&mut self, _device: &HeadlessDevice) {
        self.journal.push(BackendCall::UnbindTargets);
    }

    fn output_is_hdr10(&self, _factory: &HeadlessFactory, _swap_chain: &HeadlessSwapChain) -> bool {
        self.caps.hdr10_output
    }

    fn apply_color_space(
        &mut self,
        swap_chain: &mut HeadlessSwapChain,
        color_space: ColorSpace,
    ) -> Result<bool, BackendError> {
        self.journal.push(BackendCall::ApplyColorSpace(color_space));
        swap_chain.color_space = color_space;
        Ok(true)
    }

    fn create_color_target(
        &mut self,
        device: &HeadlessDevice,
        swap_chain: &HeadlessSwapChain,
        _desc: &SwapChainDesc,
    ) -> Result<HeadlessHandle, BackendError> {
        self.fault(Op::CreateColorTarget)?;
        self.journal.push(BackendCall::CreateColorTarget {
            generation: device.generation,
            size: swap_chain.size,
        });
        Ok(self.handle(Resource::ColorTarget, device.generation, swap_chain.size))
    }

    fn create_depth_target(
        &mut self,
        device: &HeadlessDevice,
        _format: DepthFormat,
        size: Extent2D,
    ) -> Result<HeadlessHandle, BackendError> {
        self.fault(Op::CreateDepthTarget)?;
        self.journal.push(BackendCall::CreateDepthTarget {
            generation: device.generation,
            size,
        });
        Ok(self.handle(Resource::DepthTarget, device.generation, size))
    }

    fn acquire_frame(
        &mut self,
        _device: &HeadlessDevice,
        swap_chain: &mut HeadlessSwapChain,
    ) -> Result<HeadlessFrame, BackendError> {
        self.fault(Op::AcquireFrame)?;
        self.journal.push(BackendCall::AcquireFrame);
        let index = self.next_frame;
        self.next_frame += 1;
        Ok(HeadlessFrame {
            index,
            size: swap_chain.size,
        })
    }

    fn present(
        &mut self,
        _device: &HeadlessDevice,
        _swap_chain: &mut HeadlessSwapChain,
        _frame: HeadlessFrame,
        sync: PresentSync,
    ) -> Result<(), BackendError> {
        self.fault(Op::Present)?;
        self.journal.push(BackendCall::Present {
            interval: sync.interval,
            tearing: sync.allow_tearing,
        });
        Ok(())
    }
}
