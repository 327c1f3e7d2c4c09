//! Depth estimation and disocclusion inpainting pipeline.

pub mod depth;
pub mod diffusion;
pub mod inpaint;
pub mod mask;
mod orchestrator;
mod tensor;

pub use depth::{DepthEstimator, DepthModel, OnnxDepthModel};
pub use inpaint::{InpaintConfig, InpaintMode, InpaintModel, Inpainter, OnnxLamaModel, OutputScale};
pub use mask::{build_mask, MaskConfig};
pub use orchestrator::{Config, Pipeline, PipelineOutput, ProcessedImage};
