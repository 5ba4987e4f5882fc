use burn::prelude::*;
use burn::tensor::{DType, Element};

pub mod log_sigmoid;
pub mod loss;
pub mod softplus;

/// A small epsilon suitable for divisions and for the Adam denominator,
/// sized to the precision of the backend float element.
pub fn div_eps_f32<B: Backend>() -> f32 {
    let (min_exp, epsilon) = match <B::FloatElem as Element>::dtype() {
        // 4.0693917e-16
        DType::F64 => (f64::MIN_EXP as f32, f64::EPSILON as f32),
        // 7.1209995e-4
        DType::F16 => (
            burn::tensor::f16::MIN_EXP as f32,
            burn::tensor::f16::EPSILON.to_f32(),
        ),
        // 2.0885676e-5
        DType::BF16 => (
            burn::tensor::bf16::MIN_EXP as f32,
            burn::tensor::bf16::EPSILON.to_f32(),
        ),
        // 8.1584695e-8
        _ => (f32::MIN_EXP as f32, f32::EPSILON),
    };
    let raw_exp = -(-min_exp * 2.3f32).powf(0.35f32);
    let eps_exp = epsilon.log10();
    let avg = (raw_exp + eps_exp) / 2f32;
    10f32.powf(avg)
}
