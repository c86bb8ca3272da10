//! Enhanced Correlation Coefficient (ECC) image alignment.
//!
//! Finds the warp `W` maximising the zero-mean normalised cross-correlation
//! between a template raster `T(x)` and a warped input raster `I(W x)`. The
//! warp maps template coordinates to input coordinates. Each iteration:
//!
//! 1. warps the smoothed input and its gradients onto the template grid,
//! 2. zero-means both rasters over the pixels that land inside the input,
//! 3. builds the Gauss-Newton system `J^T J` from the warp Jacobian,
//! 4. solves for the update that maximises the correlation and applies it.
//!
//! Iteration stops once the correlation changes by less than `epsilon`.

use nalgebra::{DMatrix, DVector};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::image::{ImageView, OwnedImage};
use crate::kernel;
use crate::trace::{trace_event, trace_span};
use crate::transform::AffineTransform2D;
use crate::util::math::{gaussian_kernel_1d, reflect_101};
use crate::util::{AlignError, AlignResult};

/// Parameterisation of the warp being optimised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionModel {
    /// All six affine parameters.
    Affine,
    /// Rotation angle plus translation.
    Euclidean,
}

impl MotionModel {
    /// Number of optimised parameters.
    pub fn num_params(self) -> usize {
        match self {
            MotionModel::Affine => 6,
            MotionModel::Euclidean => 3,
        }
    }
}

/// Configuration for the ECC optimiser.
#[derive(Clone, Debug, PartialEq)]
pub struct EccConfig {
    /// Iteration cap; reaching it without converging is an error.
    pub max_iterations: usize,
    /// Convergence threshold on the change of correlation between iterations.
    pub epsilon: f64,
    /// Gaussian pre-filter size in pixels (odd), or 0 to disable smoothing.
    pub gauss_filter_size: usize,
    /// Warp and accumulate rows in parallel (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for EccConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            epsilon: 1e-4,
            gauss_filter_size: 5,
            parallel: false,
        }
    }
}

impl EccConfig {
    /// Checks that the configuration can drive the optimiser.
    pub fn validate(&self) -> AlignResult<()> {
        if self.max_iterations == 0 {
            return Err(AlignError::InvalidArgument(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(AlignError::InvalidArgument(format!(
                "epsilon must be finite and >= 0, got {}",
                self.epsilon
            )));
        }
        if self.gauss_filter_size != 0 && self.gauss_filter_size % 2 == 0 {
            return Err(AlignError::InvalidArgument(format!(
                "gauss_filter_size must be odd or 0, got {}",
                self.gauss_filter_size
            )));
        }
        Ok(())
    }
}

/// Result of a converged ECC run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EccOutcome {
    /// Warp from template coordinates to input coordinates.
    pub warp: AffineTransform2D,
    /// Correlation coefficient measured in the final iteration.
    pub correlation: f64,
    /// Number of iterations run.
    pub iterations: usize,
}

/// Aligns `input` onto `template` starting from `seed`.
///
/// For [`MotionModel::Euclidean`] the seed is first projected onto the
/// rotation with angle `atan2(m10, m00)`, keeping its translation.
pub fn find_transform_ecc(
    template: ImageView<'_, u8>,
    input: ImageView<'_, u8>,
    seed: AffineTransform2D,
    model: MotionModel,
    config: &EccConfig,
) -> AlignResult<EccOutcome> {
    config.validate()?;
    if !seed.is_finite() {
        return Err(AlignError::InvalidInput("initial warp must be finite"));
    }

    let width = template.width();
    let height = template.height();
    let _span = trace_span!(
        "ecc",
        width = width,
        height = height,
        params = model.num_params()
    )
    .entered();

    let template = smooth(&to_f32(template), config.gauss_filter_size)?;
    let input = smooth(&to_f32(input), config.gauss_filter_size)?;
    let (grad_x, grad_y) = gradients(&input)?;
    let planes = InputPlanes {
        image: input,
        grad_x,
        grad_y,
    };
    let parallel = config.parallel;

    let mut warp = match model {
        MotionModel::Affine => seed,
        MotionModel::Euclidean => project_to_rotation(&seed),
    };
    let mut buffers = WarpBuffers::new(width * height);
    let mut rho = -1.0f64;
    let mut last_rho = -config.epsilon;
    let mut iterations = 0usize;

    while iterations < config.max_iterations && (rho - last_rho).abs() >= config.epsilon {
        warp_all(&planes, &warp, width, &mut buffers, parallel);

        let ctx = RowContext {
            template: &template,
            buffers: &buffers,
            width,
            warp: &warp,
            model,
            img_mean: 0.0,
            tmp_mean: 0.0,
        };
        let sums = sum_all(&ctx, height, parallel);
        if sums.count < model.num_params().max(1) {
            return Err(AlignError::Convergence {
                iterations,
                reason: format!("only {} overlapping pixels", sums.count),
            });
        }
        let count = sums.count as f64;
        let ctx = RowContext {
            img_mean: (sums.img / count) as f32,
            tmp_mean: (sums.tmp / count) as f32,
            ..ctx
        };
        let moments = moments_all(&ctx, height, parallel);

        last_rho = rho;
        rho = moments.corr / (moments.img_sq.sqrt() * moments.tmp_sq.sqrt());
        if rho.is_nan() {
            return Err(AlignError::Convergence {
                iterations,
                reason: "correlation is NaN".to_string(),
            });
        }
        iterations += 1;

        let delta = solve_update(&moments, model, iterations)?;
        warp = update_warp(&warp, model, &delta);
        if !warp.is_finite() {
            return Err(AlignError::Convergence {
                iterations,
                reason: "warp diverged".to_string(),
            });
        }
    }

    let last_delta = (rho - last_rho).abs();
    if last_delta >= config.epsilon {
        return Err(AlignError::Convergence {
            iterations,
            reason: format!("correlation still changing by {last_delta:.3e}"),
        });
    }

    trace_event!("ecc_done", iterations = iterations, correlation = rho);
    Ok(EccOutcome {
        warp,
        correlation: rho,
        iterations,
    })
}

fn to_f32(view: ImageView<'_, u8>) -> OwnedImage<f32> {
    view.to_owned_image().map(f32::from)
}

/// Separable Gaussian smoothing with reflect-101 borders.
fn smooth(src: &OwnedImage<f32>, ksize: usize) -> AlignResult<OwnedImage<f32>> {
    if ksize <= 1 {
        return Ok(src.clone());
    }
    let taps = gaussian_kernel_1d(ksize);
    let radius = (ksize / 2) as isize;
    let width = src.width();
    let height = src.height();
    let data = src.data();

    let mut horizontal = vec![0.0f32; width * height];
    for (src_row, dst_row) in data.chunks_exact(width).zip(horizontal.chunks_exact_mut(width)) {
        for (x, dst) in dst_row.iter_mut().enumerate() {
            *dst = taps
                .iter()
                .enumerate()
                .map(|(k, &tap)| tap * src_row[reflect_101(x as isize + k as isize - radius, width)])
                .sum();
        }
    }

    let mut out = vec![0.0f32; width * height];
    for (y, dst_row) in out.chunks_exact_mut(width).enumerate() {
        for (k, &tap) in taps.iter().enumerate() {
            let sy = reflect_101(y as isize + k as isize - radius, height);
            let src_row = &horizontal[sy * width..(sy + 1) * width];
            for (dst, &value) in dst_row.iter_mut().zip(src_row) {
                *dst += tap * value;
            }
        }
    }
    OwnedImage::new(out, width, height)
}

/// Central differences `[-0.5, 0, 0.5]` along x and y, reflect-101 borders.
fn gradients(src: &OwnedImage<f32>) -> AlignResult<(OwnedImage<f32>, OwnedImage<f32>)> {
    let width = src.width();
    let height = src.height();
    let data = src.data();
    let mut gx = vec![0.0f32; width * height];
    let mut gy = vec![0.0f32; width * height];
    for y in 0..height {
        let up = reflect_101(y as isize - 1, height);
        let down = reflect_101(y as isize + 1, height);
        for x in 0..width {
            let left = reflect_101(x as isize - 1, width);
            let right = reflect_101(x as isize + 1, width);
            gx[y * width + x] = 0.5 * (data[y * width + right] - data[y * width + left]);
            gy[y * width + x] = 0.5 * (data[down * width + x] - data[up * width + x]);
        }
    }
    Ok((
        OwnedImage::new(gx, width, height)?,
        OwnedImage::new(gy, width, height)?,
    ))
}

fn project_to_rotation(seed: &AffineTransform2D) -> AffineTransform2D {
    let theta = seed.m10().atan2(seed.m00());
    AffineTransform2D::rotation(theta).with_translation(seed.m02(), seed.m12())
}

fn update_warp(warp: &AffineTransform2D, model: MotionModel, delta: &DVector<f64>) -> AffineTransform2D {
    match model {
        MotionModel::Affine => {
            let p = warp.to_array();
            AffineTransform2D::new(
                p[0] + delta[0],
                p[1] + delta[1],
                p[2] + delta[2],
                p[3] + delta[3],
                p[4] + delta[4],
                p[5] + delta[5],
            )
        }
        MotionModel::Euclidean => {
            let theta = warp.m10().atan2(warp.m00()) + delta[0];
            AffineTransform2D::rotation(theta)
                .with_translation(warp.m02() + delta[1], warp.m12() + delta[2])
        }
    }
}

fn solve_update(
    moments: &Moments,
    model: MotionModel,
    iterations: usize,
) -> AlignResult<DVector<f64>> {
    let n = model.num_params();
    let hessian = DMatrix::from_fn(n, n, |r, c| moments.hessian[r.min(c) * MAX_PARAMS + r.max(c)]);
    let chol = hessian.cholesky().ok_or_else(|| AlignError::Convergence {
        iterations,
        reason: "singular Hessian".to_string(),
    })?;
    let img_proj = DVector::from_fn(n, |k, _| moments.img_proj[k]);
    let tmp_proj = DVector::from_fn(n, |k, _| moments.tmp_proj[k]);

    let h_inv_img = chol.solve(&img_proj);
    let lambda_n = moments.img_sq - img_proj.dot(&h_inv_img);
    let lambda_d = moments.corr - tmp_proj.dot(&h_inv_img);
    if lambda_d <= 0.0 {
        return Err(AlignError::Convergence {
            iterations,
            reason: "images are uncorrelated or do not overlap".to_string(),
        });
    }
    let lambda = lambda_n / lambda_d;

    // J^T (lambda * T - I) expressed through the two projections.
    let error_proj = &tmp_proj * lambda - &img_proj;
    Ok(chol.solve(&error_proj))
}

const MAX_PARAMS: usize = 6;

struct InputPlanes {
    image: OwnedImage<f32>,
    grad_x: OwnedImage<f32>,
    grad_y: OwnedImage<f32>,
}

/// Input raster and gradients resampled onto the template grid.
struct WarpBuffers {
    image: Vec<f32>,
    grad_x: Vec<f32>,
    grad_y: Vec<f32>,
    mask: Vec<bool>,
}

impl WarpBuffers {
    fn new(len: usize) -> Self {
        Self {
            image: vec![0.0; len],
            grad_x: vec![0.0; len],
            grad_y: vec![0.0; len],
            mask: vec![false; len],
        }
    }
}

#[inline]
#[allow(clippy::too_many_arguments)]
fn bilinear_at(plane: &[f32], width: usize, x0: usize, y0: usize, x1: usize, y1: usize, fx: f32, fy: f32) -> f32 {
    let p00 = plane[y0 * width + x0];
    let p10 = plane[y0 * width + x1];
    let p01 = plane[y1 * width + x0];
    let p11 = plane[y1 * width + x1];
    let top = p00 + (p10 - p00) * fx;
    let bottom = p01 + (p11 - p01) * fx;
    top + (bottom - top) * fy
}

/// Integer cell and fractional offset of a sample position, if it lies inside.
#[inline]
fn sample_cell(pos: f64, len: usize) -> Option<(usize, usize, f32)> {
    let max = (len - 1) as f64;
    if !(pos >= 0.0 && pos <= max) {
        return None;
    }
    let i0 = (pos.floor() as usize).min(len - 1);
    let i1 = (i0 + 1).min(len - 1);
    Some((i0, i1, (pos - i0 as f64) as f32))
}

fn warp_row(
    planes: &InputPlanes,
    warp: &AffineTransform2D,
    y: usize,
    image: &mut [f32],
    grad_x: &mut [f32],
    grad_y: &mut [f32],
    mask: &mut [bool],
) {
    let in_width = planes.image.width();
    let in_height = planes.image.height();
    let yf = y as f64;
    for x in 0..image.len() {
        let xf = x as f64;
        let u = warp.m00() * xf + warp.m01() * yf + warp.m02();
        let v = warp.m10() * xf + warp.m11() * yf + warp.m12();
        match (sample_cell(u, in_width), sample_cell(v, in_height)) {
            (Some((x0, x1, fx)), Some((y0, y1, fy))) => {
                image[x] = bilinear_at(planes.image.data(), in_width, x0, y0, x1, y1, fx, fy);
                grad_x[x] = bilinear_at(planes.grad_x.data(), in_width, x0, y0, x1, y1, fx, fy);
                grad_y[x] = bilinear_at(planes.grad_y.data(), in_width, x0, y0, x1, y1, fx, fy);
                mask[x] = true;
            }
            _ => {
                image[x] = 0.0;
                grad_x[x] = 0.0;
                grad_y[x] = 0.0;
                mask[x] = false;
            }
        }
    }
}

fn warp_all_seq(planes: &InputPlanes, warp: &AffineTransform2D, width: usize, buffers: &mut WarpBuffers) {
    let rows = buffers
        .image
        .chunks_mut(width)
        .zip(buffers.grad_x.chunks_mut(width))
        .zip(buffers.grad_y.chunks_mut(width))
        .zip(buffers.mask.chunks_mut(width));
    for (y, (((image, gx), gy), mask)) in rows.enumerate() {
        warp_row(planes, warp, y, image, gx, gy, mask);
    }
}

#[cfg(feature = "rayon")]
fn warp_all(
    planes: &InputPlanes,
    warp: &AffineTransform2D,
    width: usize,
    buffers: &mut WarpBuffers,
    parallel: bool,
) {
    if !parallel {
        warp_all_seq(planes, warp, width, buffers);
        return;
    }
    buffers
        .image
        .par_chunks_mut(width)
        .zip(buffers.grad_x.par_chunks_mut(width))
        .zip(buffers.grad_y.par_chunks_mut(width))
        .zip(buffers.mask.par_chunks_mut(width))
        .enumerate()
        .for_each(|(y, (((image, gx), gy), mask))| {
            warp_row(planes, warp, y, image, gx, gy, mask);
        });
}

#[cfg(not(feature = "rayon"))]
fn warp_all(
    planes: &InputPlanes,
    warp: &AffineTransform2D,
    width: usize,
    buffers: &mut WarpBuffers,
    _parallel: bool,
) {
    warp_all_seq(planes, warp, width, buffers);
}

struct RowContext<'a> {
    template: &'a OwnedImage<f32>,
    buffers: &'a WarpBuffers,
    width: usize,
    warp: &'a AffineTransform2D,
    model: MotionModel,
    img_mean: f32,
    tmp_mean: f32,
}

impl RowContext<'_> {
    fn span(&self, y: usize) -> std::ops::Range<usize> {
        y * self.width..(y + 1) * self.width
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct MaskedSums {
    count: usize,
    img: f64,
    tmp: f64,
}

impl MaskedSums {
    fn merge(self, other: Self) -> Self {
        Self {
            count: self.count + other.count,
            img: self.img + other.img,
            tmp: self.tmp + other.tmp,
        }
    }
}

fn row_sums(ctx: &RowContext<'_>, y: usize) -> MaskedSums {
    let span = ctx.span(y);
    let mask = &ctx.buffers.mask[span.clone()];
    let image = &ctx.buffers.image[span.clone()];
    let template = &ctx.template.data()[span];
    let mut sums = MaskedSums::default();
    for ((&valid, &i), &t) in mask.iter().zip(image).zip(template) {
        if valid {
            sums.count += 1;
            sums.img += i as f64;
            sums.tmp += t as f64;
        }
    }
    sums
}

#[cfg(feature = "rayon")]
fn sum_all(ctx: &RowContext<'_>, height: usize, parallel: bool) -> MaskedSums {
    if parallel {
        (0..height)
            .into_par_iter()
            .map(|y| row_sums(ctx, y))
            .reduce(MaskedSums::default, MaskedSums::merge)
    } else {
        (0..height).map(|y| row_sums(ctx, y)).fold(MaskedSums::default(), MaskedSums::merge)
    }
}

#[cfg(not(feature = "rayon"))]
fn sum_all(ctx: &RowContext<'_>, height: usize, _parallel: bool) -> MaskedSums {
    (0..height).map(|y| row_sums(ctx, y)).fold(MaskedSums::default(), MaskedSums::merge)
}

/// Second-order sums of one ECC iteration.
#[derive(Clone, Debug)]
struct Moments {
    img_sq: f64,
    tmp_sq: f64,
    corr: f64,
    /// Upper triangle of `J^T J`, row-major in a `MAX_PARAMS` square.
    hessian: [f64; MAX_PARAMS * MAX_PARAMS],
    img_proj: [f64; MAX_PARAMS],
    tmp_proj: [f64; MAX_PARAMS],
}

impl Default for Moments {
    fn default() -> Self {
        Self {
            img_sq: 0.0,
            tmp_sq: 0.0,
            corr: 0.0,
            hessian: [0.0; MAX_PARAMS * MAX_PARAMS],
            img_proj: [0.0; MAX_PARAMS],
            tmp_proj: [0.0; MAX_PARAMS],
        }
    }
}

impl Moments {
    fn merge(mut self, other: Self) -> Self {
        self.img_sq += other.img_sq;
        self.tmp_sq += other.tmp_sq;
        self.corr += other.corr;
        for (a, b) in self.hessian.iter_mut().zip(other.hessian) {
            *a += b;
        }
        for (a, b) in self.img_proj.iter_mut().zip(other.img_proj) {
            *a += b;
        }
        for (a, b) in self.tmp_proj.iter_mut().zip(other.tmp_proj) {
            *a += b;
        }
        self
    }
}

/// Jacobian of the warped intensity with respect to the warp parameters.
#[inline]
fn jacobian(
    model: MotionModel,
    warp: &AffineTransform2D,
    x: f64,
    y: f64,
    gx: f64,
    gy: f64,
) -> [f64; MAX_PARAMS] {
    match model {
        // Parameter order m00, m10, m01, m11, m02, m12.
        MotionModel::Affine => [gx * x, gy * x, gx * y, gy * y, gx, gy],
        MotionModel::Euclidean => {
            let cos = warp.m00();
            let sin = warp.m10();
            let hat_x = -(x * sin) - (y * cos);
            let hat_y = x * cos - y * sin;
            [gx * hat_x + gy * hat_y, gx, gy, 0.0, 0.0, 0.0]
        }
    }
}

fn row_moments(ctx: &RowContext<'_>, y: usize) -> Moments {
    let span = ctx.span(y);
    let mask = &ctx.buffers.mask[span.clone()];
    let image = &ctx.buffers.image[span.clone()];
    let grad_x = &ctx.buffers.grad_x[span.clone()];
    let grad_y = &ctx.buffers.grad_y[span.clone()];
    let template = &ctx.template.data()[span];

    let mut img_zm = vec![0.0f32; ctx.width];
    let mut tmp_zm = vec![0.0f32; ctx.width];
    for x in 0..ctx.width {
        if mask[x] {
            img_zm[x] = image[x] - ctx.img_mean;
            tmp_zm[x] = template[x] - ctx.tmp_mean;
        }
    }

    let mut m = Moments {
        img_sq: kernel::sum_sq(&img_zm),
        tmp_sq: kernel::sum_sq(&tmp_zm),
        corr: kernel::dot(&tmp_zm, &img_zm),
        ..Moments::default()
    };

    let n = ctx.model.num_params();
    let yf = y as f64;
    for x in 0..ctx.width {
        if !mask[x] {
            continue;
        }
        let jac = jacobian(
            ctx.model,
            ctx.warp,
            x as f64,
            yf,
            grad_x[x] as f64,
            grad_y[x] as f64,
        );
        let izm = img_zm[x] as f64;
        let tzm = tmp_zm[x] as f64;
        for k in 0..n {
            m.img_proj[k] += jac[k] * izm;
            m.tmp_proj[k] += jac[k] * tzm;
            for l in k..n {
                m.hessian[k * MAX_PARAMS + l] += jac[k] * jac[l];
            }
        }
    }
    m
}

#[cfg(feature = "rayon")]
fn moments_all(ctx: &RowContext<'_>, height: usize, parallel: bool) -> Moments {
    if parallel {
        (0..height)
            .into_par_iter()
            .map(|y| row_moments(ctx, y))
            .reduce(Moments::default, Moments::merge)
    } else {
        (0..height).map(|y| row_moments(ctx, y)).fold(Moments::default(), Moments::merge)
    }
}

#[cfg(not(feature = "rayon"))]
fn moments_all(ctx: &RowContext<'_>, height: usize, _parallel: bool) -> Moments {
    (0..height).map(|y| row_moments(ctx, y)).fold(Moments::default(), Moments::merge)
}
