//! Label rasters built from area annotations.
//!
//! Both images of a pair share one `LabelMap` so that the same classification
//! is painted with the same value on each side. Label 0 is the background,
//! label 1 is reserved for unclassified annotations, and every classification
//! gets the next free value in first-seen order: base annotations first, then
//! the annotations of the image to align.

use std::collections::HashMap;

use crate::annotation::{Annotation, Classification};
use crate::image::resample::downsampled_size;
use crate::image::OwnedImage;
use crate::trace::{trace_event, trace_span};
use crate::util::{AlignError, AlignResult};

/// Value of pixels not covered by any area annotation.
pub const BACKGROUND_LABEL: u8 = 0;

/// Value of pixels covered by an unclassified area annotation.
pub const UNCLASSIFIED_LABEL: u8 = 1;

/// Shared classification to label mapping.
#[derive(Clone, Debug, Default)]
pub struct LabelMap {
    labels: HashMap<Classification, u8>,
    order: Vec<Classification>,
}

impl LabelMap {
    /// Builds the mapping from the area annotations of both images.
    pub fn from_annotations(base: &[Annotation], to_align: &[Annotation]) -> AlignResult<Self> {
        let mut map = Self::default();
        for annotation in base.iter().chain(to_align) {
            if !annotation.roi.is_area() {
                continue;
            }
            if let Some(class) = &annotation.classification {
                map.insert(class)?;
            }
        }
        trace_event!("label_map", classes = map.order.len());
        Ok(map)
    }

    fn insert(&mut self, class: &Classification) -> AlignResult<u8> {
        if let Some(&label) = self.labels.get(class) {
            return Ok(label);
        }
        let next = UNCLASSIFIED_LABEL as usize + 1 + self.order.len();
        let label = u8::try_from(next).map_err(|_| {
            AlignError::InvalidArgument(format!(
                "too many classifications for an 8-bit label raster ({next})"
            ))
        })?;
        self.labels.insert(class.clone(), label);
        self.order.push(class.clone());
        Ok(label)
    }

    /// Returns the label painted for an annotation classification.
    pub fn label_of(&self, class: Option<&Classification>) -> Option<u8> {
        match class {
            None => Some(UNCLASSIFIED_LABEL),
            Some(class) => self.labels.get(class).copied(),
        }
    }

    /// Classifications in label order (label 2 first).
    pub fn classifications(&self) -> &[Classification] {
        &self.order
    }

    /// Highest label value in use.
    pub fn max_label(&self) -> u8 {
        self.labels
            .values()
            .copied()
            .max()
            .unwrap_or(UNCLASSIFIED_LABEL)
    }
}

/// Paints the area annotations of an image into a label raster.
///
/// The raster covers a `width x height` full-resolution image at
/// `downsample`. A pixel takes the label of the last annotation containing
/// its centre, mapped back to full-resolution coordinates.
pub fn rasterize_labels(
    width: usize,
    height: usize,
    annotations: &[Annotation],
    labels: &LabelMap,
    downsample: f64,
) -> AlignResult<OwnedImage> {
    if !downsample.is_finite() || downsample <= 0.0 {
        return Err(AlignError::InvalidInput("downsample must be finite and > 0"));
    }
    let (out_width, out_height) = downsampled_size(width, height, downsample)?;
    let _span = trace_span!("rasterize_labels", width = out_width, height = out_height).entered();

    let mut raster = OwnedImage::filled(out_width, out_height, BACKGROUND_LABEL)?;
    let mut painted = 0usize;
    for annotation in annotations.iter().filter(|a| a.roi.is_area()) {
        let Some(label) = labels.label_of(annotation.classification.as_ref()) else {
            continue;
        };
        let Some((x0, y0, x1, y1)) = annotation.roi.bounds() else {
            continue;
        };
        let px0 = pixel_floor(x0 / downsample - 0.5, out_width);
        let py0 = pixel_floor(y0 / downsample - 0.5, out_height);
        let px1 = pixel_ceil(x1 / downsample - 0.5, out_width);
        let py1 = pixel_ceil(y1 / downsample - 0.5, out_height);

        let data = raster.data_mut();
        for py in py0..py1 {
            let cy = (py as f64 + 0.5) * downsample;
            for px in px0..px1 {
                let cx = (px as f64 + 0.5) * downsample;
                if annotation.roi.contains(cx, cy) {
                    data[py * out_width + px] = label;
                    painted += 1;
                }
            }
        }
    }
    trace_event!("rasterize_labels_done", painted = painted);
    Ok(raster)
}

fn pixel_floor(value: f64, len: usize) -> usize {
    if value <= 0.0 {
        0
    } else {
        (value.floor() as usize).min(len)
    }
}

fn pixel_ceil(value: f64, len: usize) -> usize {
    if value <= 0.0 {
        0
    } else {
        ((value.ceil() as usize) + 1).min(len)
    }
}
