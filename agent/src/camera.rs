use std::path::PathBuf;

use image::{Rgb, RgbImage};
use tracing::{info, warn};

pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 480;

/// Where an agent's raster frames come from each tick.
pub trait FrameSource: Send + Sync {
    fn next_frame(&mut self) -> RgbImage;
    fn name(&self) -> &'static str;
}

/// Derive the per-agent pattern seed from the id. Ids of the form
/// `drone_7` use the trailing number; anything else hashes the bytes.
pub fn seed_from_id(agent_id: &str) -> u64 {
    agent_id
        .rsplit('_')
        .next()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or_else(|| agent_id.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64)))
}

/// Deterministic synthetic camera: a moving colored pattern derived from
/// the agent seed and a monotonically increasing tick counter. Purely
/// cosmetic, but stable so the same (seed, tick) always yields the same
/// image.
pub struct SyntheticCamera {
    seed: u64,
    tick: u64,
    color: Rgb<u8>,
}

impl SyntheticCamera {
    pub fn new(agent_id: &str) -> Self {
        let seed = seed_from_id(agent_id);
        Self {
            seed,
            tick: 0,
            color: agent_color(seed),
        }
    }
}

impl FrameSource for SyntheticCamera {
    fn next_frame(&mut self) -> RgbImage {
        let frame = render_pattern(self.seed, self.tick, self.color);
        self.tick += 1;
        frame
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

/// Unique per-agent hue, spaced around the color wheel like the original
/// fleet display.
fn agent_color(seed: u64) -> Rgb<u8> {
    let hue = (seed.wrapping_mul(30) % 180) as f32 * 2.0;
    hsv_to_rgb(hue, 1.0, 0.8)
}

fn hsv_to_rgb(hue_deg: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let h = (hue_deg / 60.0) % 6.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    Rgb([
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ])
}

fn render_pattern(seed: u64, tick: u64, color: Rgb<u8>) -> RgbImage {
    let mut frame = RgbImage::new(FRAME_WIDTH, FRAME_HEIGHT);

    // Textured base so the keypoint detector has gradients to find
    for (x, y, pixel) in frame.enumerate_pixels_mut() {
        let shade = 40 + (((x / 4) ^ (y / 4) ^ seed as u32) % 32) as u8;
        *pixel = Rgb([shade, shade, shade]);
    }

    let t = tick as f32 * 0.05;
    let (w, h) = (FRAME_WIDTH as f32, FRAME_HEIGHT as f32);

    // Main moving marker, phase-shifted by the seed
    let cx = w / 2.0 + 150.0 * (t + seed as f32).sin();
    let cy = h / 2.0 + 150.0 * (t * 0.5 + seed as f32 * 2.0).cos();
    fill_circle(&mut frame, cx as i32, cy as i32, 40, color);

    // Smaller drifting features
    for i in 0..12u64 {
        let phase = (seed.wrapping_add(i)) as f32;
        let x = w / 2.0 + 200.0 * (t + phase).sin();
        let y = h / 2.0 + 150.0 * (t * 0.5 + phase).cos();
        let feature = Rgb([50, 50, (150 + i * 5).min(255) as u8]);
        fill_circle(&mut frame, x as i32, y as i32, 12, feature);
    }

    frame
}

fn fill_circle(frame: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: Rgb<u8>) {
    let (w, h) = (frame.width() as i32, frame.height() as i32);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && x < w && y >= 0 && y < h {
                frame.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Capture from disk: cycles decodable stills from a directory. Any read
/// or decode failure falls through to the synthetic pattern for that tick.
pub struct DirectoryCamera {
    paths: Vec<PathBuf>,
    index: usize,
    fallback: SyntheticCamera,
}

impl DirectoryCamera {
    pub fn open(dir: &str, agent_id: &str) -> std::io::Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("jpg") | Some("jpeg") | Some("png")
                )
            })
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no decodable images in {dir}"),
            ));
        }
        info!(agent_id, dir, images = paths.len(), "directory camera initialized");
        Ok(Self {
            paths,
            index: 0,
            fallback: SyntheticCamera::new(agent_id),
        })
    }
}

impl FrameSource for DirectoryCamera {
    fn next_frame(&mut self) -> RgbImage {
        let path = self.paths[self.index % self.paths.len()].clone();
        self.index = self.index.wrapping_add(1);
        match image::open(&path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "frame decode failed, synthetic fallback");
                self.fallback.next_frame()
            }
        }
    }

    fn name(&self) -> &'static str {
        "directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_parses_trailing_number() {
        assert_eq!(seed_from_id("drone_7"), 7);
        assert_eq!(seed_from_id("scout_12"), 12);
    }

    #[test]
    fn seed_falls_back_to_hash() {
        let a = seed_from_id("alpha");
        let b = seed_from_id("bravo");
        assert_ne!(a, b);
    }

    #[test]
    fn synthetic_frames_deterministic_per_seed() {
        let mut a = SyntheticCamera::new("drone_3");
        let mut b = SyntheticCamera::new("drone_3");
        assert_eq!(a.next_frame(), b.next_frame());
        // Second tick too, so the counter advances in lockstep
        assert_eq!(a.next_frame(), b.next_frame());
    }

    #[test]
    fn synthetic_frames_advance_over_ticks() {
        let mut camera = SyntheticCamera::new("drone_3");
        let first = camera.next_frame();
        let second = camera.next_frame();
        assert_ne!(first, second);
    }

    #[test]
    fn different_agents_get_different_patterns() {
        let mut a = SyntheticCamera::new("drone_1");
        let mut b = SyntheticCamera::new("drone_2");
        assert_ne!(a.next_frame(), b.next_frame());
    }

    #[test]
    fn directory_camera_rejects_empty_dir() {
        let dir = std::env::temp_dir().join("swarm-relay-empty-frames");
        std::fs::create_dir_all(&dir).unwrap();
        let result = DirectoryCamera::open(dir.to_str().unwrap(), "drone_1");
        assert!(result.is_err());
    }
}
