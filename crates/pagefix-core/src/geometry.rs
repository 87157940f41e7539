// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Angle arithmetic and page-fit math. Pure functions, no I/O.

/// The four right angles, in tie-break order.
pub const RIGHT_ANGLES: [u32; 4] = [0, 90, 180, 270];

/// Normalize any angle in degrees into `[0, 360)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360.0
    if a >= 360.0 { 0.0 } else { a }
}

/// Shortest distance between two angles on the circle, in `[0, 180]`.
pub fn circular_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % 360.0;
    d.min(360.0 - d)
}

/// The right angle closest to `angle`. Ties go to the earlier entry of
/// [`RIGHT_ANGLES`].
pub fn snap_to_right_angle(angle: f64) -> u32 {
    let a = normalize_angle(angle);
    let mut best = RIGHT_ANGLES[0];
    let mut best_distance = circular_distance(a, best as f64);
    for &candidate in &RIGHT_ANGLES[1..] {
        let d = circular_distance(a, candidate as f64);
        if d < best_distance {
            best = candidate;
            best_distance = d;
        }
    }
    best
}

/// Integer circular distance for right-angle bookkeeping.
pub fn circular_distance_deg(a: u32, b: u32) -> u32 {
    let d = a.abs_diff(b) % 360;
    d.min(360 - d)
}

/// Bring a `/Rotate` value (possibly negative or >= 360) into `[0, 360)`.
pub fn normalize_rotation(rotation: i64) -> u32 {
    rotation.rem_euclid(360) as u32
}

/// Reading angle of a text item from the first column `(a, b)` of its
/// transform, snapped to a right angle. `None` when the item is skewed
/// more than `tolerance` degrees away from every right angle or the
/// transform is degenerate.
pub fn text_item_angle(a: f64, b: f64, tolerance: f64) -> Option<u32> {
    if !a.is_finite() || !b.is_finite() || (a == 0.0 && b == 0.0) {
        return None;
    }
    let angle = normalize_angle(b.atan2(a).to_degrees());
    let snapped = snap_to_right_angle(angle);
    (circular_distance(angle, snapped as f64) <= tolerance).then_some(snapped)
}

fn distance_to_upright(visible: u32) -> u32 {
    circular_distance_deg(visible, 0).min(circular_distance_deg(visible, 90))
}

/// Pick the page rotation (0 or 180) that makes the detected text read
/// closest to 0° or 90°, preferring the smaller turn from `current` on
/// ties. Unknown text angle means 0.
pub fn choose_final_page_rotation_for_portrait(current: u32, detected: Option<u32>) -> u32 {
    let Some(detected) = detected else {
        return 0;
    };
    let current = current % 360;
    [0u32, 180]
        .into_iter()
        .min_by_key(|&candidate| {
            let visible = (detected + candidate) % 360;
            (
                distance_to_upright(visible),
                circular_distance_deg(current, candidate),
            )
        })
        .unwrap_or(0)
}

/// Whether text at `visible` degrees reads upside down: within
/// `tolerance` of 180° or 270° and strictly closer to that than to 0°/90°.
pub fn is_upside_down(visible: u32, tolerance: u32) -> bool {
    let upright = distance_to_upright(visible);
    [180u32, 270].into_iter().any(|target| {
        let d = circular_distance_deg(visible, target);
        d <= tolerance && d < upright
    })
}

/// Uniform scale plus centering offsets that fit a `width` x `height`
/// box inside a target box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitTransform {
    pub scale: f32,
    pub dx: f32,
    pub dy: f32,
}

impl FitTransform {
    /// `None` for empty or non-finite source boxes.
    pub fn compute(width: f32, height: f32, target_width: f32, target_height: f32) -> Option<Self> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return None;
        }
        let scale = (target_width / width).min(target_height / height);
        Some(Self {
            scale,
            dx: (target_width - width * scale) / 2.0,
            dy: (target_height - height * scale) / 2.0,
        })
    }

    /// Map a point in source coordinates (origin at the box corner).
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.dx, y * self.scale + self.dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_wraps_negative() {
        assert_eq!(normalize_angle(-90.0), 270.0);
        assert_eq!(normalize_angle(720.0), 0.0);
        assert_eq!(normalize_angle(-1e-20), 0.0);
    }

    #[test]
    fn distance_is_symmetric_and_short() {
        assert_eq!(circular_distance(350.0, 10.0), 20.0);
        assert_eq!(circular_distance(10.0, 350.0), 20.0);
        assert_eq!(circular_distance(0.0, 180.0), 180.0);
    }

    #[test]
    fn snap_ties_prefer_earlier() {
        assert_eq!(snap_to_right_angle(45.0), 0);
        assert_eq!(snap_to_right_angle(135.0), 90);
        assert_eq!(snap_to_right_angle(225.0), 180);
        assert_eq!(snap_to_right_angle(315.0), 0);
        assert_eq!(snap_to_right_angle(-89.0), 270);
    }

    #[test]
    fn snap_is_close_and_idempotent() {
        let mut a = 0.0;
        while a < 360.0 {
            let s = snap_to_right_angle(a);
            assert!(circular_distance(a, s as f64) <= 45.0, "angle {a}");
            assert_eq!(snap_to_right_angle(s as f64), s);
            a += 0.7;
        }
    }

    #[test]
    fn text_angle_discards_skew() {
        assert_eq!(text_item_angle(1.0, 0.0, 20.0), Some(0));
        assert_eq!(text_item_angle(0.0, 1.0, 20.0), Some(90));
        assert_eq!(text_item_angle(-1.0, 0.0, 20.0), Some(180));
        assert_eq!(text_item_angle(0.0, -2.0, 20.0), Some(270));
        // 30 degrees off horizontal
        assert_eq!(text_item_angle(0.866, 0.5, 20.0), None);
        assert_eq!(text_item_angle(0.0, 0.0, 20.0), None);
    }

    #[test]
    fn unknown_angle_means_zero() {
        for current in [0, 90, 180, 270] {
            assert_eq!(choose_final_page_rotation_for_portrait(current, None), 0);
        }
    }

    #[test]
    fn sideways_text_keeps_zero() {
        assert_eq!(choose_final_page_rotation_for_portrait(90, Some(90)), 0);
    }

    #[test]
    fn inverted_text_turns_page() {
        assert_eq!(choose_final_page_rotation_for_portrait(0, Some(180)), 180);
        assert_eq!(choose_final_page_rotation_for_portrait(0, Some(270)), 180);
        assert_eq!(choose_final_page_rotation_for_portrait(180, Some(0)), 0);
    }

    #[test]
    fn upside_down_detection() {
        assert!(is_upside_down(180, 20));
        assert!(is_upside_down(270, 20));
        assert!(!is_upside_down(0, 20));
        assert!(!is_upside_down(90, 20));
    }

    #[test]
    fn fit_landscape_letter_into_a4() {
        let fit = FitTransform::compute(792.0, 612.0, 595.28, 841.89).unwrap();
        assert!((fit.scale - 595.28 / 792.0).abs() < 1e-6);
        assert!(fit.dx.abs() < 1e-4);
        assert!(fit.dy > 0.0);
        let (x, y) = fit.apply(792.0, 612.0);
        assert!((x - 595.28).abs() < 1e-3);
        assert!((y - (841.89 - fit.dy)).abs() < 1e-3);
    }

    #[test]
    fn fit_rejects_empty_box() {
        assert!(FitTransform::compute(0.0, 100.0, 595.28, 841.89).is_none());
        assert!(FitTransform::compute(f32::NAN, 100.0, 595.28, 841.89).is_none());
    }
}
