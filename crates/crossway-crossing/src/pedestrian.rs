//! Periodic pedestrian walk phase
//!
//! Cooperative: waits until no vehicle direction is in a green phase, then
//! asks the arbiter for the exclusive pedestrian group.

use crossway_core::{CrosswayError, CrosswayResult, Direction, LightColor};

use crate::{CycleContext, Outlet, PedestrianConfig, PhaseControl};

pub struct PedestrianCycle<P, O> {
    ctx: CycleContext<P, O>,
    config: PedestrianConfig,
}

impl<P: PhaseControl, O: Outlet> PedestrianCycle<P, O> {
    pub fn new(ctx: CycleContext<P, O>, config: PedestrianConfig) -> Self {
        PedestrianCycle { ctx, config }
    }

    pub async fn run(self) {
        tracing::debug!(crossing = %self.ctx.crossing, period = ?self.config.period, "pedestrian cycle started");
        loop {
            if self.ctx.idle(self.config.period).await.is_err() {
                break;
            }
            match self.walk_once().await {
                Ok(()) => {}
                Err(e) if e.is_interrupted() => break,
                Err(e) => {
                    tracing::error!(crossing = %self.ctx.crossing, error = %e, "pedestrian cycle stopped");
                    break;
                }
            }
            if self.ctx.idle(self.config.cooldown).await.is_err() {
                break;
            }
        }
        self.ctx.board.set_pedestrian(false);
    }

    /// One walk phase, without the leading period
    pub async fn walk_once(&self) -> CrosswayResult<()> {
        let ctx = &self.ctx;

        ctx.policy
            .wait_ready(ctx.policy_poll, &ctx.shutdown)
            .await
            .ok_or(CrosswayError::Interrupted)?;

        // Never cut into a vehicle green
        while ctx.board.any_green() {
            ctx.idle(self.config.poll).await?;
        }

        ctx.control.request_green(Direction::Pedestrian).await?;
        ctx.board.set_light(Direction::Pedestrian, LightColor::Pedestrian);
        ctx.report("PEDESTRIAN_GREEN", "pedestrians crossing".to_string());

        ctx.pause(self.config.walk).await?;

        ctx.control.release_green(Direction::Pedestrian).await?;
        ctx.board.set_pedestrian(false);
        ctx.report("PEDESTRIAN_RED", "pedestrians cleared".to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::tests::context;
    use crossway_core::Policy;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn fast() -> PedestrianConfig {
        PedestrianConfig {
            period: Duration::from_millis(10),
            walk: 4.0,
            cooldown: Duration::from_millis(5),
            poll: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_walk_phase_events() {
        let ctx = context(Some(Policy::hybrid()));
        let cycle = PedestrianCycle::new(ctx.clone(), fast());

        timeout(Duration::from_secs(1), cycle.walk_once()).await.unwrap().unwrap();

        assert_eq!(ctx.outlet.kinds(), ["PEDESTRIAN_GREEN", "PEDESTRIAN_RED"]);
        assert_eq!(
            *ctx.control.calls.lock(),
            [("request", Direction::Pedestrian), ("release", Direction::Pedestrian)]
        );
        assert!(!ctx.board.pedestrian());
        assert!(ctx.clock.now().as_secs_f64() >= 4.0);
    }

    #[tokio::test]
    async fn test_waits_for_vehicle_green_to_end() {
        let ctx = context(Some(Policy::hybrid()));
        ctx.board.set_active(Direction::North, true);
        let cycle = Arc::new(PedestrianCycle::new(ctx.clone(), fast()));

        let walk = {
            let cycle = Arc::clone(&cycle);
            tokio::spawn(async move { cycle.walk_once().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(ctx.control.calls.lock().is_empty());

        ctx.board.set_active(Direction::North, false);
        timeout(Duration::from_secs(1), walk).await.unwrap().unwrap().unwrap();
        assert_eq!(ctx.control.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let ctx = context(Some(Policy::hybrid()));
        let running = tokio::spawn(PedestrianCycle::new(ctx.clone(), fast()).run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.shutdown.trigger();
        timeout(Duration::from_secs(1), running).await.unwrap().unwrap();
        assert!(!ctx.outlet.kinds().is_empty());
    }
}
