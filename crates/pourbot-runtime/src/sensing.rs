//! The sensing-side protocol state machine.
//!
//! Runs on the camera node. One cycle walks
//! `AwaitStart → Centering → Estimating → AwaitPourAck` and returns to
//! `AwaitStart`:
//!
//! 1. **AwaitStart** – block until the peer sends anything; the content is
//!    not parsed, only its arrival matters.
//! 2. **Centering** – acquire a scan, evaluate centering, report one status
//!    byte, and loop until the cup is centered. There is deliberately no
//!    timeout: the cup is adjusted by a human and the peer must not assume
//!    bounded centering latency.
//! 3. **Estimating** – acquire one fresh scan, estimate the volume, send it
//!    as decimal text.
//! 4. **AwaitPourAck** – block until the peer's acknowledgement, then start
//!    over.

use pourbot_hal::depth::DepthCamera;
use pourbot_perception::centering::{CenteringEvaluator, CenteringSignal};
use pourbot_perception::scan::ScanSource;
use pourbot_perception::volume::VolumeEstimator;
use pourbot_protocol::link::Link;
use pourbot_protocol::message::{self, CenteringStatus};
use pourbot_types::DispenserError;
use tracing::{debug, info};

/// Protocol sequencing state of the sensing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensingState {
    AwaitStart,
    Centering,
    Estimating,
    AwaitPourAck,
}

/// The sensing node: owns the camera (via its [`ScanSource`]) and the
/// sensing end of the link.
pub struct SensingSession<C: DepthCamera, L: Link> {
    scans: ScanSource<C>,
    evaluator: CenteringEvaluator,
    estimator: VolumeEstimator,
    link: L,
    state: SensingState,
}

impl<C: DepthCamera, L: Link> SensingSession<C, L> {
    /// Wire up a session from its owned collaborators.
    pub fn new(
        scans: ScanSource<C>,
        evaluator: CenteringEvaluator,
        estimator: VolumeEstimator,
        link: L,
    ) -> Self {
        Self {
            scans,
            evaluator,
            estimator,
            link,
            state: SensingState::AwaitStart,
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> SensingState {
        self.state
    }

    /// Run one full sensing cycle and return the volume estimate that was
    /// reported to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`DispenserError::SensorFault`] when acquisition fails and
    /// [`DispenserError::Link`] when the peer connection breaks; both are
    /// fatal to the process, not retried here.
    pub async fn run_cycle(&mut self) -> Result<f32, DispenserError> {
        // ── AwaitStart ────────────────────────────────────────────────────
        self.state = SensingState::AwaitStart;
        let start = self.link.recv_text().await?;
        info!(message = %start, "cycle started by peer");

        // ── Centering ─────────────────────────────────────────────────────
        self.state = SensingState::Centering;
        loop {
            let scan = self.scans.acquire()?;
            let signal = self.evaluator.evaluate(&scan);
            let status = match signal {
                CenteringSignal::Centered => CenteringStatus::Centered,
                // Not-present reports the same as off-center: keep searching.
                CenteringSignal::OffCenter | CenteringSignal::NotPresent => {
                    CenteringStatus::NotCentered
                }
            };
            self.link.send_text(status.as_text()).await?;
            debug!(?signal, status = status.as_text(), "centering status sent");
            if status == CenteringStatus::Centered {
                break;
            }
        }

        // ── Estimating ────────────────────────────────────────────────────
        self.state = SensingState::Estimating;
        let scan = self.scans.acquire()?;
        let volume = self.estimator.estimate(&scan);
        self.link.send_text(&message::encode_volume(volume)).await?;
        info!(volume_oz = volume, "volume estimate sent");

        // ── AwaitPourAck ──────────────────────────────────────────────────
        self.state = SensingState::AwaitPourAck;
        let ack = self.link.recv_text().await?;
        debug!(message = %ack, "pour acknowledged");

        self.state = SensingState::AwaitStart;
        Ok(volume)
    }

    /// Run cycles until a fault ends the process.
    pub async fn run(&mut self) -> Result<(), DispenserError> {
        loop {
            self.run_cycle().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pourbot_hal::sim::SimDepthCamera;
    use pourbot_protocol::link::StreamLink;

    /// 240-px background scan with two rim dips at the given indices.
    fn cup_scan(rim_a: usize, rim_b: usize) -> Vec<f32> {
        let mut samples = vec![0.40; 240];
        samples[rim_a] = 0.25;
        samples[rim_b] = 0.25;
        samples
    }

    fn session_over(
        camera: SimDepthCamera,
        link: StreamLink<tokio::io::DuplexStream>,
    ) -> SensingSession<SimDepthCamera, StreamLink<tokio::io::DuplexStream>> {
        SensingSession::new(
            ScanSource::new(camera),
            CenteringEvaluator::default(),
            VolumeEstimator::default(),
            link,
        )
    }

    #[tokio::test]
    async fn cycle_reports_statuses_then_volume() {
        let (near, far) = tokio::io::duplex(1024);

        // Scripted scene: empty tray, off-center cup, centered cup, then the
        // same centered cup for the volumetric fix.
        let camera = SimDepthCamera::new("tof")
            .with_scan(vec![0.40; 240])
            .with_scan(cup_scan(60, 100))
            .with_scan(cup_scan(100, 140));
        let mut session = session_over(camera, StreamLink::new(near));

        let peer = tokio::spawn(async move {
            let mut link = StreamLink::new(far);
            link.send_text("Ready to make some coffee?").await.unwrap();

            // Accumulate status bytes until the centered byte shows up; a
            // single read may coalesce several sends.
            let mut seen = String::new();
            while !seen.contains('1') {
                seen.push_str(&link.recv_text().await.unwrap());
            }
            // Everything before the centered byte must be not-centered
            // reports.
            let pos = seen.find('1').unwrap();
            assert!(seen[..pos].chars().all(|c| c == '0'));
            assert_eq!(&seen[..pos], "00", "one status per evaluation");

            link.send_text("Pouring").await.unwrap();

            // The volume may have ridden along after the centered byte.
            let mut volume_text = seen[pos + 1..].trim().to_string();
            if volume_text.is_empty() {
                volume_text = link.recv_text().await.unwrap();
            }
            volume_text
        });

        let volume = session.run_cycle().await.unwrap();
        assert!(volume > 0.0);
        assert_eq!(session.state(), SensingState::AwaitStart);

        let volume_text = peer.await.unwrap();
        let reported: f32 = volume_text.trim().parse().unwrap();
        assert!((reported - volume).abs() < 1e-4);
    }

    #[tokio::test]
    async fn link_loss_is_fatal() {
        let (near, far) = tokio::io::duplex(1024);
        let camera = SimDepthCamera::new("tof").with_scan(cup_scan(100, 140));
        let mut session = session_over(camera, StreamLink::new(near));
        drop(far);

        let result = session.run_cycle().await;
        assert!(matches!(result, Err(DispenserError::Link(_))));
    }

    #[tokio::test]
    async fn camera_fault_surfaces_during_centering() {
        let (near, far) = tokio::io::duplex(1024);
        // No scripted frames at all: first acquisition faults.
        let camera = SimDepthCamera::new("tof");
        let mut session = session_over(camera, StreamLink::new(near));

        let mut peer = StreamLink::new(far);
        peer.send_text("start").await.unwrap();

        let result = session.run_cycle().await;
        assert!(matches!(result, Err(DispenserError::SensorFault { .. })));
    }
}
