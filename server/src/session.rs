//! Authoritative per-match state: two paddles, a ball, a score pair.
//!
//! A session is owned exclusively by one tick task. Move commands and ticks
//! are applied by that task only, so nothing here needs interior locking.

use log::{debug, error, info, warn};
use rand::Rng;
use shared::{
    BallState, MatchOutcome, PaddleState, ParticipantId, SessionId, SessionMode, Update, Vec3,
    FIELD_HALF_DEPTH, FIELD_HALF_WIDTH, PADDLE_HALF_WIDTH, PADDLE_PLANE, PADDLE_TRAVEL_LIMIT,
};

/// One live match. Paddle A defends the negative forward end, paddle B the
/// positive one.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    mode: SessionMode,
    paddle_a: PaddleState,
    paddle_b: PaddleState,
    ball: BallState,
    score: (u32, u32),
    win_score: u32,
    finished: bool,
}

impl Session {
    /// Creates a running session for the given pair. The ball starts at the
    /// center with a freshly rolled launch direction.
    pub fn new(
        id: SessionId,
        mode: SessionMode,
        participant_a: ParticipantId,
        participant_b: ParticipantId,
        win_score: u32,
    ) -> Self {
        let mut session = Self {
            id,
            mode,
            paddle_a: PaddleState::new(participant_a, -PADDLE_PLANE),
            paddle_b: PaddleState::new(participant_b, PADDLE_PLANE),
            ball: BallState::new(Vec3::new(0.0, 0.0, 1.0)),
            score: (0, 0),
            win_score,
            finished: false,
        };
        session.relaunch();
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn participants(&self) -> (ParticipantId, ParticipantId) {
        (self.paddle_a.owner, self.paddle_b.owner)
    }

    pub fn score(&self) -> (u32, u32) {
        self.score
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Shifts the paddle's destination laterally by half the paddle width and
    /// accumulates the paddle's speed. Repeated same-direction commands move
    /// the paddle faster; opposite commands cancel out.
    ///
    /// Commands for unknown paddles or with out-of-range steps are dropped,
    /// matching fire-and-forget network input.
    pub fn apply_move(&mut self, owner: ParticipantId, step: i8) {
        if self.finished || step == 0 {
            return;
        }
        if !(-1..=1).contains(&step) {
            warn!(
                "Session {}: ignoring malformed move step {} from {}",
                self.id, step, owner
            );
            return;
        }

        let paddle = if owner == self.paddle_a.owner {
            &mut self.paddle_a
        } else if owner == self.paddle_b.owner {
            &mut self.paddle_b
        } else {
            debug!("Session {}: move for unknown paddle {}", self.id, owner);
            return;
        };

        paddle.destination.lateral = (paddle.destination.lateral
            + f32::from(step) * PADDLE_HALF_WIDTH)
            .clamp(-PADDLE_TRAVEL_LIMIT, PADDLE_TRAVEL_LIMIT);
        paddle.speed += f32::from(step);
    }

    /// Advances the match by one fixed step: paddles first, then the ball
    /// with miss/paddle/wall resolution. A session that has produced a
    /// non-finite position or a negative ball speed is force-finished rather
    /// than allowed to spread corrupt state.
    pub fn tick(&mut self, dt: f32) {
        if self.finished {
            return;
        }

        Self::integrate_paddle(&mut self.paddle_a, dt);
        Self::integrate_paddle(&mut self.paddle_b, dt);
        self.step_ball(dt);

        if !self.finished && !self.invariants_hold() {
            error!("Session {} entered a corrupt state, forcing finish", self.id);
            self.finished = true;
        }
    }

    /// The receiver's view of the session: their own paddle first, then the
    /// opponent's, regardless of which side they are stored on.
    pub fn state_for(&self, participant: ParticipantId) -> Option<Update> {
        let (own, opponent) = self.perspective(participant)?;
        Some(Update::State {
            session_id: self.id,
            own_paddle: own,
            opponent_paddle: opponent,
            ball: self.ball,
        })
    }

    /// Terminal message for the receiver, with the score from their side.
    pub fn result_for(&self, participant: ParticipantId) -> Option<Update> {
        let (own, _) = self.perspective(participant)?;
        let (own_score, opponent_score) = if own.owner == self.paddle_a.owner {
            (self.score.0, self.score.1)
        } else {
            (self.score.1, self.score.0)
        };
        let outcome = if own_score > opponent_score {
            MatchOutcome::Won
        } else {
            MatchOutcome::Lost
        };
        Some(Update::Finished {
            session_id: self.id,
            outcome,
            own_score,
            opponent_score,
        })
    }

    fn perspective(&self, participant: ParticipantId) -> Option<(PaddleState, PaddleState)> {
        if participant == self.paddle_a.owner {
            Some((self.paddle_a, self.paddle_b))
        } else if participant == self.paddle_b.owner {
            Some((self.paddle_b, self.paddle_a))
        } else {
            None
        }
    }

    fn integrate_paddle(paddle: &mut PaddleState, dt: f32) {
        let remaining = paddle.destination.lateral - paddle.position.lateral;
        if remaining != 0.0 {
            let travel = paddle.speed.abs() * dt;
            if travel >= remaining.abs() {
                paddle.position.lateral = paddle.destination.lateral;
            } else {
                paddle.position.lateral += travel * remaining.signum();
            }
            paddle.position.lateral = paddle
                .position
                .lateral
                .clamp(-PADDLE_TRAVEL_LIMIT, PADDLE_TRAVEL_LIMIT);
        }
        if paddle.position.lateral == paddle.destination.lateral {
            paddle.speed = 0.0;
        }
    }

    fn step_ball(&mut self, dt: f32) {
        let pos = self.ball.position;
        let travel = self.ball.direction.scale(self.ball.speed * dt);
        let next = pos.add(&travel);

        // A miss takes precedence over any collision in the same step.
        if next.forward >= FIELD_HALF_DEPTH {
            self.award_point_to_a();
            return;
        }
        if next.forward <= -FIELD_HALF_DEPTH {
            self.award_point_to_b();
            return;
        }

        // Paddle planes are resolved at the exact crossing point so a fast
        // ball cannot pass through a thin paddle between two ticks.
        if pos.forward < PADDLE_PLANE && next.forward >= PADDLE_PLANE {
            let hit = Self::intersect(&pos, &next, PADDLE_PLANE);
            if (hit.lateral - self.paddle_b.position.lateral).abs() <= PADDLE_HALF_WIDTH {
                self.ball.position = hit;
                self.ball.direction.forward = -self.ball.direction.forward;
                return;
            }
        }
        if pos.forward > -PADDLE_PLANE && next.forward <= -PADDLE_PLANE {
            let hit = Self::intersect(&pos, &next, -PADDLE_PLANE);
            if (hit.lateral - self.paddle_a.position.lateral).abs() <= PADDLE_HALF_WIDTH {
                self.ball.position = hit;
                self.ball.direction.forward = -self.ball.direction.forward;
                return;
            }
        }

        if next.lateral.abs() >= FIELD_HALF_WIDTH {
            let wall = FIELD_HALF_WIDTH.copysign(next.lateral);
            let span = next.lateral - pos.lateral;
            let t = if span.abs() < f32::EPSILON {
                0.0
            } else {
                (wall - pos.lateral) / span
            };
            self.ball.position = Vec3::new(
                wall,
                pos.height + t * (next.height - pos.height),
                pos.forward + t * (next.forward - pos.forward),
            );
            self.ball.direction.lateral = -self.ball.direction.lateral;
            return;
        }

        self.ball.position = next;
    }

    /// Exact intersection of the ball's path with a forward plane.
    fn intersect(from: &Vec3, to: &Vec3, plane: f32) -> Vec3 {
        let t = (plane - from.forward) / (to.forward - from.forward);
        Vec3::new(
            from.lateral + t * (to.lateral - from.lateral),
            from.height + t * (to.height - from.height),
            plane,
        )
    }

    fn award_point_to_a(&mut self) {
        self.score.0 += 1;
        self.settle_point();
    }

    fn award_point_to_b(&mut self) {
        self.score.1 += 1;
        self.settle_point();
    }

    fn settle_point(&mut self) {
        if self.score.0.max(self.score.1) >= self.win_score {
            info!(
                "Session {} finished {}:{} ({} vs {})",
                self.id, self.score.0, self.score.1, self.paddle_a.owner, self.paddle_b.owner
            );
            self.finished = true;
        } else {
            self.relaunch();
        }
    }

    /// Resets the ball to the center with base speed and a new launch
    /// direction: uniformly random forward magnitude in (0, 1), lateral
    /// magnitude completing the unit vector, signs rolled independently. The
    /// forward component is always nonzero, so the ball never launches purely
    /// along the walls.
    fn relaunch(&mut self) {
        let mut rng = rand::thread_rng();
        let forward = rng.gen_range(f32::EPSILON..1.0);
        let lateral = (1.0 - forward * forward).sqrt();
        let direction = Vec3::new(
            if rng.gen_bool(0.5) { lateral } else { -lateral },
            0.0,
            if rng.gen_bool(0.5) { forward } else { -forward },
        );
        self.ball = BallState::new(direction);
    }

    fn invariants_hold(&self) -> bool {
        self.ball.position.is_finite()
            && self.ball.direction.is_finite()
            && self.ball.speed.is_finite()
            && self.ball.speed >= 0.0
            && self.paddle_a.position.is_finite()
            && self.paddle_b.position.is_finite()
            && self.paddle_a.speed.is_finite()
            && self.paddle_b.speed.is_finite()
    }
}
