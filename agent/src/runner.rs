use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use swarm_relay_common::telemetry::Telemetry;
use tracing::{debug, info, warn};

use crate::camera::{seed_from_id, FrameSource};
use crate::overlay;
use crate::policy::FailurePolicy;
use crate::AgentError;

/// One simulated drone: acquire a frame, overlay keypoint markers, encode,
/// and push to the relay on a fixed tick. Every failure is local to its
/// tick; the loop itself never exits.
pub struct AgentRunner {
    agent_id: String,
    camera: Box<dyn FrameSource>,
    policy: Arc<dyn FailurePolicy>,
    client: reqwest::Client,
    frame_url: String,
    telemetry_url: String,
    jpeg_quality: u8,
    tick_period: Duration,
    telemetry_every_ticks: u64,
    rng: StdRng,
    altitude_m: f64,
    battery_pct: f64,
    tick: u64,
}

impl AgentRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_id: String,
        camera: Box<dyn FrameSource>,
        policy: Arc<dyn FailurePolicy>,
        client: reqwest::Client,
        relay_url: &str,
        jpeg_quality: u8,
        tick_period: Duration,
        telemetry_every_ticks: u64,
    ) -> Self {
        let seed = seed_from_id(&agent_id);
        let base = relay_url.trim_end_matches('/');
        Self {
            frame_url: format!("{base}/agents/{agent_id}/frame"),
            telemetry_url: format!("{base}/agents/{agent_id}/telemetry"),
            agent_id,
            camera,
            policy,
            client,
            jpeg_quality,
            tick_period,
            telemetry_every_ticks: telemetry_every_ticks.max(1),
            rng: StdRng::seed_from_u64(seed),
            altitude_m: 80.0 + (seed % 40) as f64,
            battery_pct: 100.0,
            tick: 0,
        }
    }

    pub async fn run(mut self) {
        info!(
            agent_id = self.agent_id,
            camera = self.camera.name(),
            tick_ms = self.tick_period.as_millis() as u64,
            "agent loop starting"
        );
        let mut ticker = tokio::time::interval(self.tick_period);
        loop {
            ticker.tick().await;
            self.step().await;
        }
    }

    /// One ACQUIRING → UPLOADING pass.
    async fn step(&mut self) {
        self.tick += 1;

        let mut frame = self.camera.next_frame();
        let keypoints = overlay::detect_keypoints(&frame);
        overlay::apply_overlay(&mut frame, &keypoints);
        let tracked = overlay::tracked_count(&keypoints);

        let jpeg = match encode_jpeg(&frame, self.jpeg_quality) {
            Ok(data) => data,
            Err(e) => {
                warn!(agent_id = self.agent_id, error = %e, "frame encoding failed, tick skipped");
                return;
            }
        };

        debug!(
            agent_id = self.agent_id,
            tick = self.tick,
            bytes = jpeg.len(),
            keypoints = keypoints.len(),
            "uploading frame"
        );

        if let Err(e) = self.upload_frame(jpeg).await {
            if !self.policy.should_retry(1) {
                warn!(
                    agent_id = self.agent_id,
                    policy = self.policy.name(),
                    error = %e,
                    "frame upload failed, dropped"
                );
            }
        }

        let telemetry = self.advance_telemetry(tracked);
        if self.tick % self.telemetry_every_ticks == 0 {
            if let Err(e) = self.report_telemetry(&telemetry).await {
                if !self.policy.should_retry(1) {
                    warn!(
                        agent_id = self.agent_id,
                        policy = self.policy.name(),
                        error = %e,
                        "telemetry report failed, dropped"
                    );
                }
            }
        }
    }

    async fn upload_frame(&self, jpeg: Vec<u8>) -> Result<(), AgentError> {
        let response = self
            .client
            .post(&self.frame_url)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(jpeg)
            .send()
            .await
            .map_err(AgentError::Upload)?;
        if !response.status().is_success() {
            return Err(AgentError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }

    async fn report_telemetry(&self, telemetry: &Telemetry) -> Result<(), AgentError> {
        let response = self
            .client
            .post(&self.telemetry_url)
            .json(telemetry)
            .send()
            .await
            .map_err(AgentError::Upload)?;
        if !response.status().is_success() {
            return Err(AgentError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }

    /// Advance the simulated flight state one tick. Values wander within
    /// plausible bounds; the battery only drains.
    fn advance_telemetry(&mut self, keypoints: u32) -> Telemetry {
        self.altitude_m = (self.altitude_m + self.rng.gen_range(-0.8..0.8)).clamp(60.0, 120.0);
        self.battery_pct = (self.battery_pct - self.rng.gen_range(0.005..0.02)).max(5.0);
        Telemetry {
            altitude_m: self.altitude_m,
            speed_mps: 10.0 + self.rng.gen_range(-2.0..2.0),
            battery_pct: self.battery_pct,
            gps_lost: self.rng.gen_bool(0.05),
            keypoints,
            updated_at: Utc::now(),
        }
    }
}

fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, AgentError> {
    let mut out = Vec::with_capacity(64 * 1024);
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode_image(frame)?;
    Ok(out)
}
