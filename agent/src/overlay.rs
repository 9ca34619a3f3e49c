use image::{Rgb, RgbImage};

/// Upper bound on detected keypoints per frame.
pub const MAX_KEYPOINTS: usize = 500;
/// Frames with fewer keypoints than this are not counted as "tracking".
pub const MIN_TRACKED: usize = 50;

const GRID_STEP: u32 = 8;
const GRADIENT_THRESHOLD: i32 = 40;
const MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const MAX_DRAWN: usize = 150;

#[derive(Debug, Clone, Copy)]
pub struct Keypoint {
    pub x: u32,
    pub y: u32,
}

/// Sample the luma gradient on a coarse grid and keep high-contrast
/// positions, capped at [`MAX_KEYPOINTS`]. This stands in for a real
/// feature detector; the count only has to be non-negative and roughly
/// track how busy the frame is.
pub fn detect_keypoints(frame: &RgbImage) -> Vec<Keypoint> {
    let (w, h) = (frame.width(), frame.height());
    let mut keypoints = Vec::new();

    let mut y = GRID_STEP;
    while y + GRID_STEP < h {
        let mut x = GRID_STEP;
        while x + GRID_STEP < w {
            let gx = luma(frame, x + 1, y) - luma(frame, x - 1, y);
            let gy = luma(frame, x, y + 1) - luma(frame, x, y - 1);
            if gx.abs() + gy.abs() > GRADIENT_THRESHOLD {
                keypoints.push(Keypoint { x, y });
                if keypoints.len() >= MAX_KEYPOINTS {
                    return keypoints;
                }
            }
            x += GRID_STEP;
        }
        y += GRID_STEP;
    }

    keypoints
}

/// Keypoint count reported in telemetry: zero below the tracking minimum.
pub fn tracked_count(keypoints: &[Keypoint]) -> u32 {
    if keypoints.len() >= MIN_TRACKED {
        keypoints.len() as u32
    } else {
        0
    }
}

/// Draw cross markers on the detected keypoints plus a thin frame border,
/// the visual-interest overlay of the fleet dashboard.
pub fn apply_overlay(frame: &mut RgbImage, keypoints: &[Keypoint]) {
    for kp in keypoints.iter().take(MAX_DRAWN) {
        draw_cross(frame, kp.x, kp.y);
    }
    draw_border(frame);
}

fn luma(frame: &RgbImage, x: u32, y: u32) -> i32 {
    let Rgb([r, g, b]) = *frame.get_pixel(x, y);
    // Integer BT.601 approximation
    (r as i32 * 77 + g as i32 * 150 + b as i32 * 29) >> 8
}

fn draw_cross(frame: &mut RgbImage, cx: u32, cy: u32) {
    let (w, h) = (frame.width(), frame.height());
    for d in -3i32..=3 {
        let x = cx as i32 + d;
        if x >= 0 && (x as u32) < w {
            frame.put_pixel(x as u32, cy, MARKER_COLOR);
        }
        let y = cy as i32 + d;
        if y >= 0 && (y as u32) < h {
            frame.put_pixel(cx, y as u32, MARKER_COLOR);
        }
    }
}

fn draw_border(frame: &mut RgbImage) {
    let (w, h) = (frame.width(), frame.height());
    for x in 0..w {
        frame.put_pixel(x, 0, MARKER_COLOR);
        frame.put_pixel(x, h - 1, MARKER_COLOR);
    }
    for y in 0..h {
        frame.put_pixel(0, y, MARKER_COLOR);
        frame.put_pixel(w - 1, y, MARKER_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{FrameSource, SyntheticCamera};

    #[test]
    fn flat_frame_has_no_keypoints() {
        let frame = RgbImage::from_pixel(64, 64, Rgb([100, 100, 100]));
        assert!(detect_keypoints(&frame).is_empty());
    }

    #[test]
    fn synthetic_frame_yields_bounded_keypoints() {
        let mut camera = SyntheticCamera::new("drone_1");
        let frame = camera.next_frame();
        let keypoints = detect_keypoints(&frame);
        assert!(!keypoints.is_empty());
        assert!(keypoints.len() <= MAX_KEYPOINTS);
    }

    #[test]
    fn tracked_count_applies_minimum_filter() {
        let few = vec![Keypoint { x: 10, y: 10 }; MIN_TRACKED - 1];
        assert_eq!(tracked_count(&few), 0);
        let enough = vec![Keypoint { x: 10, y: 10 }; MIN_TRACKED];
        assert_eq!(tracked_count(&enough), MIN_TRACKED as u32);
    }

    #[test]
    fn overlay_tolerates_edge_keypoints() {
        let mut frame = RgbImage::new(32, 32);
        let edges = vec![
            Keypoint { x: 0, y: 0 },
            Keypoint { x: 31, y: 31 },
            Keypoint { x: 0, y: 31 },
        ];
        apply_overlay(&mut frame, &edges);
        assert_eq!(*frame.get_pixel(0, 0), Rgb([0, 255, 0]));
    }
}
