//! The control-side protocol state machine.
//!
//! Runs on the actuator node. One cycle walks
//! `AwaitRecipe → RequestCentering → AwaitCentered → SignalPour →
//! AwaitVolume → Pour → Reset` and returns to `AwaitRecipe`:
//!
//! 1. **AwaitRecipe** – poll the recipe source until an order appears.
//! 2. **RequestCentering** – wake the sensing peer and start the gantry
//!    search.
//! 3. **AwaitCentered** – consume status bytes until the centered byte
//!    arrives, then stop the gantry. There is no timeout; centering latency
//!    is unbounded by design.
//! 4. **SignalPour** – tell the peer (and the operator log) that pouring is
//!    next.
//! 5. **AwaitVolume** – receive and parse the decimal estimate. A malformed
//!    payload is fatal for the cycle: the pour is aborted, never guessed.
//! 6. **Pour** – open each nonzero ingredient's valve for
//!    `volume * proportion / flow_rate` seconds, serially. Timing is pure
//!    open-loop sleep; there is no flow sensor to close the loop with, so
//!    scheduling jitter accumulates into the poured amount (accepted
//!    limitation).
//! 7. **Reset** – clear the consumed order, home the gantry, and wait for
//!    the mechanics to settle.

use std::time::Duration;

use pourbot_hal::bus::ActuatorBus;
use pourbot_protocol::link::Link;
use pourbot_protocol::message;
use pourbot_types::{ActuatorCommand, DispenserError, Ingredient, Recipe, NUM_CHANNELS};
use tracing::{debug, error, info, warn};

use crate::recipe::RecipeSource;

/// Protocol sequencing state of the control node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    AwaitRecipe,
    RequestCentering,
    AwaitCentered,
    SignalPour,
    AwaitVolume,
    Pour,
    Reset,
}

/// How one control cycle ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// The full recipe was poured against this volume estimate.
    Poured { volume_oz: f32 },
    /// The volume payload was unparseable; the pour was skipped and the
    /// machine reset without dispensing.
    AbortedBadVolume,
}

/// Configuration bundle for [`ControlSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct ControlConfig {
    /// Calibrated dispense rate (oz/s) per ingredient channel.
    pub flow_rates_oz_per_s: [f32; NUM_CHANNELS],
    /// Payload that wakes the sensing peer; content is arbitrary to the
    /// protocol but shows up in the operator log.
    pub start_message: String,
    /// Payload announcing the pour; doubles as the peer's acknowledgement.
    pub pour_message: String,
    /// Pause between waking the peer and starting the gantry search.
    pub search_settle: Duration,
    /// Pause between the centered report and the pour announcement.
    pub pour_signal_delay: Duration,
    /// Mechanical settle time after homing the gantry.
    pub reset_settle: Duration,
    /// Polling cadence while waiting for an order.
    pub recipe_poll_interval: Duration,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            flow_rates_oz_per_s: [0.2; NUM_CHANNELS],
            start_message: "Ready to make some coffee?".to_string(),
            pour_message: "Pouring".to_string(),
            search_settle: Duration::from_millis(100),
            pour_signal_delay: Duration::from_secs(1),
            reset_settle: Duration::from_secs(5),
            recipe_poll_interval: Duration::from_millis(250),
        }
    }
}

/// Compute the serial pour plan for one cycle.
///
/// Ingredients are visited in ascending channel order; zero-proportion
/// ingredients are skipped. A channel with a non-positive flow rate is a
/// calibration error and is skipped with a warning rather than producing an
/// unbounded open-valve time. A negative or non-finite pour time is skipped
/// the same way: the volume estimate is not validated upstream, so a
/// degenerate scan (or a payload like `"-3.0"` or `"NaN"`, which parses as
/// decimal text) can reach here and must not panic the duration conversion.
pub fn pour_schedule(
    volume_oz: f32,
    recipe: &Recipe,
    flow_rates_oz_per_s: &[f32; NUM_CHANNELS],
) -> Vec<(Ingredient, Duration)> {
    recipe
        .parts()
        .filter_map(|(ingredient, proportion)| {
            let flow = flow_rates_oz_per_s[ingredient.channel()];
            if flow <= 0.0 {
                warn!(%ingredient, flow, "non-positive flow rate; channel skipped");
                return None;
            }
            let seconds = volume_oz * proportion / flow;
            if !seconds.is_finite() || seconds < 0.0 {
                warn!(%ingredient, seconds, "implausible pour time; channel skipped");
                return None;
            }
            Some((ingredient, Duration::from_secs_f32(seconds)))
        })
        .collect()
}

/// The control node: owns the actuator bus, the recipe source, and the
/// control end of the link.
pub struct ControlSession<B: ActuatorBus, L: Link, R: RecipeSource> {
    bus: B,
    link: L,
    recipes: R,
    config: ControlConfig,
    state: ControlState,
}

impl<B: ActuatorBus, L: Link, R: RecipeSource> ControlSession<B, L, R> {
    /// Wire up a session from its owned collaborators.
    pub fn new(bus: B, link: L, recipes: R, config: ControlConfig) -> Self {
        Self {
            bus,
            link,
            recipes,
            config,
            state: ControlState::AwaitRecipe,
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> ControlState {
        self.state
    }

    /// Run one full control cycle.
    ///
    /// # Errors
    ///
    /// Returns [`DispenserError::Link`] / [`DispenserError::BusFault`] /
    /// [`DispenserError::Recipe`] on collaborator failure; all are fatal to
    /// the process. A malformed volume payload is *not* an `Err`: the cycle
    /// completes with [`CycleOutcome::AbortedBadVolume`] after resetting.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, DispenserError> {
        // ── AwaitRecipe ───────────────────────────────────────────────────
        self.state = ControlState::AwaitRecipe;
        let recipe = loop {
            if let Some(recipe) = self.recipes.poll()? {
                break recipe;
            }
            tokio::time::sleep(self.config.recipe_poll_interval).await;
        };
        info!(?recipe, "starting pour cycle");

        // ── RequestCentering ──────────────────────────────────────────────
        self.state = ControlState::RequestCentering;
        self.link.send_text(&self.config.start_message).await?;
        tokio::time::sleep(self.config.search_settle).await;
        self.bus.write(ActuatorCommand::BeginSearch)?;

        // ── AwaitCentered ─────────────────────────────────────────────────
        self.state = ControlState::AwaitCentered;
        // A receive may coalesce several status bytes, and the centered byte
        // may even arrive glued to the following volume payload; anything
        // after the centered byte is retained for the AwaitVolume state.
        let mut early_volume: Option<String> = None;
        loop {
            let payload = self.link.recv_text().await?;
            if let Some(pos) = payload.find('1') {
                let rest = payload[pos + 1..].trim();
                if !rest.is_empty() {
                    early_volume = Some(rest.to_string());
                }
                break;
            }
            debug!(payload = %payload, "not centered yet");
        }
        self.bus.write(ActuatorCommand::StopGantry)?;
        info!("cup centered; gantry stopped");

        // ── SignalPour ────────────────────────────────────────────────────
        self.state = ControlState::SignalPour;
        tokio::time::sleep(self.config.pour_signal_delay).await;
        self.link.send_text(&self.config.pour_message).await?;

        // ── AwaitVolume ───────────────────────────────────────────────────
        self.state = ControlState::AwaitVolume;
        let payload = match early_volume {
            Some(payload) => payload,
            None => self.link.recv_text().await?,
        };
        let outcome = match message::parse_volume(&payload) {
            Ok(volume_oz) => {
                // ── Pour ──────────────────────────────────────────────────
                self.state = ControlState::Pour;
                for (ingredient, duration) in
                    pour_schedule(volume_oz, &recipe, &self.config.flow_rates_oz_per_s)
                {
                    info!(
                        %ingredient,
                        seconds = duration.as_secs_f32(),
                        "pouring ingredient"
                    );
                    self.bus.write(ActuatorCommand::OpenValve(ingredient))?;
                    tokio::time::sleep(duration).await;
                    self.bus.write(ActuatorCommand::CloseAllValves)?;
                }
                CycleOutcome::Poured { volume_oz }
            }
            Err(e) => {
                // Fatal for the cycle: no pour timing can be derived.
                error!(payload = %payload, error = %e, "volume unparseable; aborting pour");
                CycleOutcome::AbortedBadVolume
            }
        };

        // ── Reset ─────────────────────────────────────────────────────────
        self.state = ControlState::Reset;
        self.recipes.clear()?;
        self.bus.write(ActuatorCommand::ResetPosition)?;
        tokio::time::sleep(self.config.reset_settle).await;

        self.state = ControlState::AwaitRecipe;
        Ok(outcome)
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
    use crate::recipe::InMemoryRecipeSource;
    use pourbot_hal::sim::{SimActuatorBus, SimBusLog};
    use pourbot_protocol::link::StreamLink;

    fn milk_coffee_recipe() -> Recipe {
        let mut recipe = Recipe::new();
        recipe.set(Ingredient::Coffee, 0.7);
        recipe.set(Ingredient::Milk, 0.3);
        recipe
    }

    fn assert_secs(duration: Duration, expected: f32) {
        let got = duration.as_secs_f32();
        assert!((got - expected).abs() < 1e-3, "got {got}, expected {expected}");
    }

    #[test]
    fn schedule_matches_flow_rates() {
        let plan = pour_schedule(8.0, &milk_coffee_recipe(), &[0.2, 0.2, 0.2]);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].0, Ingredient::Milk);
        assert_secs(plan[0].1, 12.0);
        assert_eq!(plan[1].0, Ingredient::Coffee);
        assert_secs(plan[1].1, 28.0);
    }

    #[test]
    fn schedule_skips_zero_proportions() {
        let mut recipe = Recipe::new();
        recipe.set(Ingredient::Coffee, 1.0);
        let plan = pour_schedule(6.0, &recipe, &[0.2, 0.2, 0.2]);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].0, Ingredient::Coffee);
        assert_secs(plan[0].1, 30.0);
    }

    #[test]
    fn schedule_skips_non_positive_flow_channels() {
        let plan = pour_schedule(8.0, &milk_coffee_recipe(), &[0.2, 0.0, 0.2]);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].0, Ingredient::Coffee);
        assert_secs(plan[0].1, 28.0);
    }

    #[test]
    fn negative_volume_schedules_nothing() {
        // A degenerate scan can estimate below zero; no valve opens for it.
        let plan = pour_schedule(-3.0, &milk_coffee_recipe(), &[0.2, 0.2, 0.2]);
        assert!(plan.is_empty());
    }

    #[test]
    fn non_finite_volume_schedules_nothing() {
        let plan = pour_schedule(f32::NAN, &milk_coffee_recipe(), &[0.2, 0.2, 0.2]);
        assert!(plan.is_empty());
        let plan = pour_schedule(f32::INFINITY, &milk_coffee_recipe(), &[0.2, 0.2, 0.2]);
        assert!(plan.is_empty());
    }

    fn session_over(
        link: StreamLink<tokio::io::DuplexStream>,
        recipes: InMemoryRecipeSource,
    ) -> (
        ControlSession<SimActuatorBus, StreamLink<tokio::io::DuplexStream>, InMemoryRecipeSource>,
        SimBusLog,
    ) {
        let bus = SimActuatorBus::new("i2c_controller");
        let log = bus.log_handle();
        (
            ControlSession::new(bus, link, recipes, ControlConfig::default()),
            log,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_pours_per_schedule_and_resets() {
        let (near, far) = tokio::io::duplex(1024);
        let recipes = InMemoryRecipeSource::new();
        recipes.submit(milk_coffee_recipe());
        let (mut session, log) = session_over(StreamLink::new(near), recipes.clone());

        let peer = tokio::spawn(async move {
            let mut link = StreamLink::new(far);
            let start = link.recv_text().await.unwrap();
            assert_eq!(start, "Ready to make some coffee?");
            link.send_text("0").await.unwrap();
            link.send_text("1").await.unwrap();
            let pour = link.recv_text().await.unwrap();
            assert!(pour.contains("Pouring"));
            link.send_text("8.0").await.unwrap();
        });

        let began = tokio::time::Instant::now();
        let outcome = session.run_cycle().await.unwrap();
        peer.await.unwrap();

        assert_eq!(outcome, CycleOutcome::Poured { volume_oz: 8.0 });
        assert_eq!(
            log.commands(),
            vec![
                ActuatorCommand::BeginSearch,
                ActuatorCommand::StopGantry,
                ActuatorCommand::OpenValve(Ingredient::Milk),
                ActuatorCommand::CloseAllValves,
                ActuatorCommand::OpenValve(Ingredient::Coffee),
                ActuatorCommand::CloseAllValves,
                ActuatorCommand::ResetPosition,
            ]
        );
        assert!(recipes.is_cleared());
        assert_eq!(session.state(), ControlState::AwaitRecipe);

        // Virtual time: 0.1 s settle + 1 s signal delay + 12 s milk +
        // 28 s coffee + 5 s reset settle.
        let elapsed = began.elapsed();
        assert!(
            elapsed >= Duration::from_secs_f32(46.0),
            "elapsed {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_volume_aborts_pour_but_still_resets() {
        let (near, far) = tokio::io::duplex(1024);
        let recipes = InMemoryRecipeSource::new();
        recipes.submit(milk_coffee_recipe());
        let (mut session, log) = session_over(StreamLink::new(near), recipes.clone());

        let peer = tokio::spawn(async move {
            let mut link = StreamLink::new(far);
            let _ = link.recv_text().await.unwrap();
            link.send_text("1").await.unwrap();
            let _ = link.recv_text().await.unwrap();
            link.send_text("eight ounces").await.unwrap();
        });

        let outcome = session.run_cycle().await.unwrap();
        peer.await.unwrap();

        assert_eq!(outcome, CycleOutcome::AbortedBadVolume);
        // No valve ever opened, but the machine still homed itself.
        assert_eq!(
            log.commands(),
            vec![
                ActuatorCommand::BeginSearch,
                ActuatorCommand::StopGantry,
                ActuatorCommand::ResetPosition,
            ]
        );
        assert!(recipes.is_cleared());
    }

    #[tokio::test(start_paused = true)]
    async fn negative_volume_pours_nothing_but_completes() {
        let (near, far) = tokio::io::duplex(1024);
        let recipes = InMemoryRecipeSource::new();
        recipes.submit(milk_coffee_recipe());
        let (mut session, log) = session_over(StreamLink::new(near), recipes.clone());

        let peer = tokio::spawn(async move {
            let mut link = StreamLink::new(far);
            let _ = link.recv_text().await.unwrap();
            link.send_text("1").await.unwrap();
            let _ = link.recv_text().await.unwrap();
            // Parses as decimal text, so the cycle proceeds with it.
            link.send_text("-3.0").await.unwrap();
        });

        let outcome = session.run_cycle().await.unwrap();
        peer.await.unwrap();

        assert_eq!(outcome, CycleOutcome::Poured { volume_oz: -3.0 });
        assert_eq!(
            log.commands(),
            vec![
                ActuatorCommand::BeginSearch,
                ActuatorCommand::StopGantry,
                ActuatorCommand::ResetPosition,
            ]
        );
        assert!(recipes.is_cleared());
    }

    #[tokio::test(start_paused = true)]
    async fn sensing_and_control_complete_a_cycle_together() {
        use crate::sensing::SensingSession;
        use pourbot_hal::sim::SimDepthCamera;
        use pourbot_perception::centering::CenteringEvaluator;
        use pourbot_perception::scan::ScanSource;
        use pourbot_perception::volume::VolumeEstimator;

        fn cup_scan(rim_a: usize, rim_b: usize) -> Vec<f32> {
            let mut samples = vec![0.40; 240];
            samples[rim_a] = 0.25;
            samples[rim_b] = 0.25;
            samples
        }

        let (near, far) = tokio::io::duplex(1024);
        let recipes = InMemoryRecipeSource::new();
        recipes.submit(milk_coffee_recipe());
        let (mut control, log) = session_over(StreamLink::new(near), recipes.clone());

        // Scripted scene: empty tray, off-center cup, then a centered cup
        // that repeats for the volumetric fix.
        let camera = SimDepthCamera::new("tof")
            .with_scan(vec![0.40; 240])
            .with_scan(cup_scan(60, 100))
            .with_scan(cup_scan(100, 140));
        let mut sensing = SensingSession::new(
            ScanSource::new(camera),
            CenteringEvaluator::default(),
            VolumeEstimator::default(),
            StreamLink::new(far),
        );

        let sensing_task = tokio::spawn(async move { sensing.run_cycle().await.unwrap() });
        let outcome = control.run_cycle().await.unwrap();
        let estimated = sensing_task.await.unwrap();

        assert!(estimated > 0.0);
        match outcome {
            CycleOutcome::Poured { volume_oz } => {
                assert!((volume_oz - estimated).abs() < 1e-4);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            log.commands(),
            vec![
                ActuatorCommand::BeginSearch,
                ActuatorCommand::StopGantry,
                ActuatorCommand::OpenValve(Ingredient::Milk),
                ActuatorCommand::CloseAllValves,
                ActuatorCommand::OpenValve(Ingredient::Coffee),
                ActuatorCommand::CloseAllValves,
                ActuatorCommand::ResetPosition,
            ]
        );
        assert!(recipes.is_cleared());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_status_bytes_are_consumed_and_ignored() {
        let (near, far) = tokio::io::duplex(1024);
        let recipes = InMemoryRecipeSource::new();
        recipes.submit(milk_coffee_recipe());
        let (mut session, log) = session_over(StreamLink::new(near), recipes.clone());

        let peer = tokio::spawn(async move {
            let mut link = StreamLink::new(far);
            let _ = link.recv_text().await.unwrap();
            // Several not-centered reports, possibly coalescing into one
            // receive on the session side.
            for _ in 0..4 {
                link.send_text("0").await.unwrap();
            }
            link.send_text("1").await.unwrap();
            let _ = link.recv_text().await.unwrap();
            link.send_text("4.0").await.unwrap();
        });

        let outcome = session.run_cycle().await.unwrap();
        peer.await.unwrap();
        assert_eq!(outcome, CycleOutcome::Poured { volume_oz: 4.0 });
        assert!(log.commands().contains(&ActuatorCommand::StopGantry));
    }

    #[tokio::test(start_paused = true)]
    async fn centered_byte_coalesced_with_volume_payload() {
        let (near, far) = tokio::io::duplex(1024);
        let recipes = InMemoryRecipeSource::new();
        recipes.submit(milk_coffee_recipe());
        let (mut session, _log) = session_over(StreamLink::new(near), recipes.clone());

        let peer = tokio::spawn(async move {
            let mut link = StreamLink::new(far);
            let _ = link.recv_text().await.unwrap();
            // The centered byte and the volume arrive in one chunk.
            link.send_text("18.0").await.unwrap();
            let _ = link.recv_text().await.unwrap();
        });

        let outcome = session.run_cycle().await.unwrap();
        peer.await.unwrap();
        assert_eq!(outcome, CycleOutcome::Poured { volume_oz: 8.0 });
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_recipe_before_touching_the_peer() {
        let (near, far) = tokio::io::duplex(1024);
        let recipes = InMemoryRecipeSource::new();
        let (mut session, log) = session_over(StreamLink::new(near), recipes.clone());

        let peer = tokio::spawn(async move {
            let mut link = StreamLink::new(far);
            let start = link.recv_text().await.unwrap();
            link.send_text("1").await.unwrap();
            let _ = link.recv_text().await.unwrap();
            link.send_text("2.5").await.unwrap();
            start
        });

        // Let the session poll an empty source a few times before the order
        // arrives.
        let submitter = {
            let recipes = recipes.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                recipes.submit(milk_coffee_recipe());
            })
        };

        let outcome = session.run_cycle().await.unwrap();
        submitter.await.unwrap();
        assert_eq!(peer.await.unwrap(), "Ready to make some coffee?");
        assert_eq!(outcome, CycleOutcome::Poured { volume_oz: 2.5 });
        assert_eq!(log.commands()[0], ActuatorCommand::BeginSearch);
    }
}
