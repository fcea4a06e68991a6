//! Global-norm gradient clipping and parameter health checks

use std::marker::PhantomData;

use burn::{
    module::{AutodiffModule, Module, ModuleVisitor, ParamId},
    optim::GradientsParams,
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion, Tensor},
};

struct GradNorm<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    sum_sq: f64,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            let sq: f64 = grad.powf_scalar(2.0).sum().into_scalar().elem();
            self.sum_sq += sq;
        }
    }
}

struct GradScale<'a, B: AutodiffBackend> {
    grads: &'a mut GradientsParams,
    scale: f64,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradScale<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register(id, grad.mul_scalar(self.scale));
        }
    }
}

/// `sqrt(sum ||g||^2)` over every parameter gradient of `module`.
pub fn global_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = GradNorm::<B> {
        grads,
        sum_sq: 0.0,
        _backend: PhantomData,
    };
    module.visit(&mut visitor);
    visitor.sum_sq.sqrt()
}

/// Factor applied to every gradient: `clip / norm` when `norm > clip`, else 1.
pub fn clip_scale(norm: f64, max_norm: f64) -> f64 {
    if norm > max_norm && norm > 0.0 {
        max_norm / norm
    } else {
        1.0
    }
}

/// Rescales all gradients jointly so their global norm is at most `max_norm`.
/// Returns the clipped gradients and the norm measured before clipping.
pub fn clip_by_global_norm<B, M>(
    module: &M,
    mut grads: GradientsParams,
    max_norm: f64,
) -> (GradientsParams, f64)
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_norm::<B, M>(module, &grads);
    let scale = clip_scale(norm, max_norm);
    if scale < 1.0 && norm.is_finite() {
        let mut visitor = GradScale::<B> {
            grads: &mut grads,
            scale,
            _backend: PhantomData,
        };
        module.visit(&mut visitor);
    }
    (grads, norm)
}

struct FiniteParams<B: Backend> {
    finite: bool,
    _backend: PhantomData<B>,
}

impl<B: Backend> ModuleVisitor<B> for FiniteParams<B> {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        if !self.finite {
            return;
        }
        let sq: f64 = tensor.clone().powf_scalar(2.0).sum().into_scalar().elem();
        self.finite = sq.is_finite();
    }
}

/// True when no parameter holds NaN or infinity.
pub fn params_are_finite<B: Backend, M: Module<B>>(module: &M) -> bool {
    let mut visitor = FiniteParams::<B> {
        finite: true,
        _backend: PhantomData,
    };
    module.visit(&mut visitor);
    visitor.finite
}

struct ParamShapes<B: Backend> {
    shapes: Vec<Vec<usize>>,
    _backend: PhantomData<B>,
}

impl<B: Backend> ModuleVisitor<B> for ParamShapes<B> {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.shapes.push(tensor.dims().to_vec());
    }
}

/// Dims of every float parameter, in visit order.
pub fn param_shapes<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<usize>> {
    let mut visitor = ParamShapes::<B> {
        shapes: Vec::new(),
        _backend: PhantomData,
    };
    module.visit(&mut visitor);
    visitor.shapes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_identity_under_threshold() {
        assert_eq!(clip_scale(3.0, 5.0), 1.0);
        assert_eq!(clip_scale(5.0, 5.0), 1.0);
        assert_eq!(clip_scale(0.0, 5.0), 1.0);
    }

    #[test]
    fn scale_brings_norm_to_threshold() {
        let scale = clip_scale(20.0, 5.0);
        assert!((scale - 0.25).abs() < 1e-12);
        assert!((20.0 * scale - 5.0).abs() < 1e-12);
    }
}
