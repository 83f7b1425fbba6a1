//! Ramp filtering of projections along detector rows, in the frequency domain.
//!
//! The ramp response is not the continuous `|ω|` but the transform of the
//! band-limited spatial kernel of Kak & Slaney (eq. 61, ch. 3):
//!
//! ```text
//!   h[0] = 1 / (4Δ²)      h[n odd] = -1 / (n²π²Δ²)      h[n even] = 0
//! ```
//!
//! which avoids the DC bias of sampling `|ω|` directly. Rows are zero padded
//! to a power-of-two length of at least twice their width so that the
//! circular convolution performed by the FFT does not wrap around.
//!
//! Optional extras:
//!
//! + Hann apodisation of the ramp, to tame noise (`hann_cut`).
//!
//! + A separate Hann low-pass along detector columns (`hann_cut_y`).
//!
//! + Truncation correction: laterally truncated projections are extended on
//!   both sides with their edge value, tapered to zero by a half cosine, which
//!   suppresses the bright rim that truncation otherwise produces.

/// Settings of the ramp filter. Cutoffs are fractions of the Nyquist
/// frequency; a cutoff of zero disables the corresponding window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RampParameters {
    #[serde(default)] pub hann_cut  : Ratiof64,
    #[serde(default)] pub hann_cut_y: Ratiof64,
    /// Width of the extension added on each side of a row, as a fraction of
    /// the row width
    #[serde(default)] pub truncation: Ratiof64,
}

impl RampParameters {

    /// Cutoffs and truncation fraction must be finite and non-negative
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("hann_cut"  , self.hann_cut),
            ("hann_cut_y", self.hann_cut_y),
            ("truncation", self.truncation),
        ];
        match fields.into_iter().find(|(_, value)| !(value.is_finite() && *value >= 0.0)) {
            Some((name, value)) => Err(ReconError::Parameter(format!("ramp {name} must be non-negative, got {value}"))),
            None => Ok(()),
        }
    }
}

/// Frequency response of the ramp for one FFT length and pixel spacing, with
/// the FFT normalisation and the pixel spacing folded in.
struct RowKernel {
    length: usize,
    spacing: OrderedFloat<f64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    response: Vec<f64>,
}

/// Hann low-pass along detector columns
struct ColumnKernel {
    length: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    response: Vec<f64>,
}

pub struct RampFilter {
    parameters: RampParameters,
    // Kernels are built lazily, and rebuilt only when the detector changes.
    row_kernel   : Mutex<Option<Arc<RowKernel>>>,
    column_kernel: Mutex<Option<Arc<ColumnKernel>>>,
}

impl RampFilter {

    pub fn new(parameters: RampParameters) -> Self {
        Self { parameters, row_kernel: Mutex::new(None), column_kernel: Mutex::new(None) }
    }

    pub fn parameters(&self) -> RampParameters { self.parameters }

    /// Number of samples added on each side of a row of `width` pixels
    fn padding(&self, width: usize) -> usize {
        (self.parameters.truncation.max(0.0) * width as f64).round() as usize
    }

    pub fn apply(&self, projection: &Projection) -> Projection {
        let detector = projection.detector;
        let [nu, nv] = detector.n;
        let mut out = Projection::zeros(detector);
        if nu == 0 || nv == 0 { return out }

        let pad = self.padding(nu);
        let kernel = self.row_kernel((nu + 2 * pad) * 2, detector.spacing[0]);
        Zip::from(out.data.axis_iter_mut(Axis(0)))
            .and(projection.data.axis_iter(Axis(0)))
            .par_for_each(|mut out_row, in_row| {
                let mut buffer = vec![Complex64::new(0.0, 0.0); kernel.length];
                let (first, last) = (in_row[0] as f64, in_row[nu - 1] as f64);
                for i in 1..=pad {
                    let taper = 0.5 * (1.0 + (PI * i as f64 / pad as f64).cos());
                    buffer[pad - i]      = Complex64::new(first * taper, 0.0);
                    buffer[pad + nu - 1 + i] = Complex64::new(last  * taper, 0.0);
                }
                for (b, &x) in buffer[pad..pad + nu].iter_mut().zip(in_row.iter()) {
                    *b = Complex64::new(x as f64, 0.0);
                }
                kernel.forward.process(&mut buffer);
                for (b, &r) in buffer.iter_mut().zip(kernel.response.iter()) { *b *= r }
                kernel.inverse.process(&mut buffer);
                for (o, b) in out_row.iter_mut().zip(buffer[pad..pad + nu].iter()) {
                    *o = b.re as Intensityf32;
                }
            });

        if self.parameters.hann_cut_y > 0.0 && nv > 1 {
            self.filter_columns(&mut out);
        }
        out
    }

    fn filter_columns(&self, projection: &mut Projection) {
        let nv = projection.detector.n[1];
        let kernel = self.column_kernel(nv);
        projection.data.axis_iter_mut(Axis(1))
            .into_par_iter()
            .for_each(|mut column| {
                let (first, last) = (column[0] as f64, column[nv - 1] as f64);
                // Replicate the edges: the lower half of the padding continues
                // the last value, the upper half wraps round to the first.
                let half = nv + (kernel.length - nv) / 2;
                let mut buffer: Vec<Complex64> = (0..kernel.length)
                    .map(|i| match i {
                        i if i < nv   => column[i] as f64,
                        i if i < half => last,
                        _             => first,
                    })
                    .map(|x| Complex64::new(x, 0.0))
                    .collect();
                kernel.forward.process(&mut buffer);
                for (b, &r) in buffer.iter_mut().zip(kernel.response.iter()) { *b *= r }
                kernel.inverse.process(&mut buffer);
                for (c, b) in column.iter_mut().zip(buffer.iter()) { *c = b.re as Intensityf32 }
            });
    }

    fn row_kernel(&self, min_length: usize, spacing: Lengthf64) -> Arc<RowKernel> {
        let length = min_length.next_power_of_two();
        // A poisoned cache only means another thread panicked while building
        // a kernel; rebuilding it is always correct.
        let mut cache = self.row_kernel.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(kernel) = cache.as_ref() {
            if kernel.length == length && kernel.spacing == OrderedFloat(spacing) {
                return Arc::clone(kernel);
            }
        }
        tracing::debug!(length, spacing, "Building ramp kernel");
        let kernel = Arc::new(build_row_kernel(length, spacing, self.parameters.hann_cut));
        *cache = Some(Arc::clone(&kernel));
        kernel
    }

    fn column_kernel(&self, nv: usize) -> Arc<ColumnKernel> {
        let length = (2 * nv).next_power_of_two();
        let mut cache = self.column_kernel.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(kernel) = cache.as_ref() {
            if kernel.length == length { return Arc::clone(kernel) }
        }
        tracing::debug!(length, "Building column window");
        let mut planner = FftPlanner::new();
        let window = hann_window(length, self.parameters.hann_cut_y);
        let kernel = Arc::new(ColumnKernel {
            length,
            forward: planner.plan_fft_forward(length),
            inverse: planner.plan_fft_inverse(length),
            response: window.into_iter().map(|w| w / length as f64).collect(),
        });
        *cache = Some(Arc::clone(&kernel));
        kernel
    }
}

fn build_row_kernel(length: usize, spacing: Lengthf64, hann_cut: Ratiof64) -> RowKernel {
    let mut planner = FftPlanner::new();
    let forward = planner.plan_fft_forward(length);
    let inverse = planner.plan_fft_inverse(length);

    let mut taps = vec![Complex64::new(0.0, 0.0); length];
    taps[0] = Complex64::new(0.25 / (spacing * spacing), 0.0);
    for n in (1..length / 2).step_by(2) {
        let h = -1.0 / ((n * n) as f64 * PI * PI * spacing * spacing);
        taps[n]          = Complex64::new(h, 0.0);
        taps[length - n] = Complex64::new(h, 0.0);
    }
    forward.process(&mut taps);

    // The taps are symmetric, so their transform is real. Fold in the
    // integration step (the pixel spacing) and the 1/N of the inverse FFT.
    let scale = spacing / length as f64;
    let response = taps.iter()
        .zip(hann_window(length, hann_cut))
        .map(|(t, w)| t.re * w * scale)
        .collect();

    RowKernel { length, spacing: OrderedFloat(spacing), forward, inverse, response }
}

/// Hann window over the frequency bins of an FFT of `length`, symmetric about
/// Nyquist. All ones when `cut` is not positive.
fn hann_window(length: usize, cut: Ratiof64) -> Vec<f64> {
    if cut <= 0.0 { return vec![1.0; length] }
    let n_cut = ((length / 2 + 1) as f64 * cut.min(1.0)).round() as usize;
    (0..length)
        .map(|k| k.min(length - k))
        .map(|k| if k < n_cut { 0.5 * (1.0 + (PI * k as f64 / n_cut as f64).cos()) } else { 0.0 })
        .collect()
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

use ndarray::{Axis, Zip, parallel::prelude::*};
use ordered_float::OrderedFloat;
use rustfft::{Fft, FftPlanner, num_complex::Complex64};
use serde::Deserialize;

use crate::{
    error::{ReconError, Result},
    grid::Detector,
    image::Projection,
    types::{Intensityf32, Lengthf64, Ratiof64},
};
