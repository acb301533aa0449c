use serde::{Deserialize, Serialize};

/// Lateral half-extent of the field. The side walls sit at `±FIELD_HALF_WIDTH`.
pub const FIELD_HALF_WIDTH: f32 = 10.0;
/// Forward half-extent of the field. A ball crossing `±FIELD_HALF_DEPTH` is a miss.
pub const FIELD_HALF_DEPTH: f32 = 15.0;
/// Forward coordinate of the paddle collision planes, at `±PADDLE_PLANE`.
pub const PADDLE_PLANE: f32 = 14.0;
pub const PADDLE_WIDTH: f32 = 4.0;
pub const PADDLE_HALF_WIDTH: f32 = PADDLE_WIDTH / 2.0;
/// Farthest a paddle center may travel laterally while staying inside the walls.
pub const PADDLE_TRAVEL_LIMIT: f32 = FIELD_HALF_WIDTH - PADDLE_HALF_WIDTH;
pub const BALL_DIAMETER: f32 = 0.6;
/// Ball speed right after a relaunch, in field units per frame step.
pub const BALL_BASE_SPEED: f32 = 1.0;
/// First side to reach this score wins the match.
pub const WIN_SCORE: u32 = 15;

pub type ParticipantId = u32;
pub type SessionId = u32;
pub type TournamentId = u32;

/// Position or direction in field space.
///
/// Axes are named after their role in play rather than x/y/z: `lateral` runs
/// along the paddles' travel direction, `forward` runs between the two goal
/// ends, `height` is unused by the simulation but kept for renderers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub lateral: f32,
    pub height: f32,
    pub forward: f32,
}

impl Vec3 {
    pub fn new(lateral: f32, height: f32, forward: f32) -> Self {
        Self {
            lateral,
            height,
            forward,
        }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.lateral * self.lateral + self.height * self.height + self.forward * self.forward)
            .sqrt()
    }

    ///Returns the normalized vector.
    pub fn normalize(&self) -> Vec3 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vec3::default()
        } else {
            Vec3 {
                lateral: self.lateral / mag,
                height: self.height / mag,
                forward: self.forward / mag,
            }
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vec3 {
        Vec3 {
            lateral: self.lateral * scalar,
            height: self.height * scalar,
            forward: self.forward * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3 {
            lateral: self.lateral + other.lateral,
            height: self.height + other.height,
            forward: self.forward + other.forward,
        }
    }

    /// True if every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.lateral.is_finite() && self.height.is_finite() && self.forward.is_finite()
    }
}

/// How a session was formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    /// Quick match against another queued player.
    Pvp,
    /// Quick match against the computer opponent.
    Pvc,
    /// Match assigned by a tournament pairing.
    Tournament,
}

/// One player's paddle.
///
/// `destination` and `speed` change only through move commands; `position`
/// changes only through the per-tick integrator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaddleState {
    pub owner: ParticipantId,
    pub position: Vec3,
    pub destination: Vec3,
    pub speed: f32,
}

impl PaddleState {
    /// Creates a paddle centered laterally on its collision plane.
    pub fn new(owner: ParticipantId, plane: f32) -> Self {
        let at_rest = Vec3::new(0.0, 0.0, plane);
        Self {
            owner,
            position: at_rest,
            destination: at_rest,
            speed: 0.0,
        }
    }
}

/// The ball. `direction` is unit-length in the lateral/forward plane and is
/// reset together with `speed` whenever a point ends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BallState {
    pub position: Vec3,
    pub speed: f32,
    pub direction: Vec3,
}

impl BallState {
    /// Creates a ball at the field center moving along the given direction.
    pub fn new(direction: Vec3) -> Self {
        Self {
            position: Vec3::default(),
            speed: BALL_BASE_SPEED,
            direction,
        }
    }
}

/// Whether a participant won or lost their match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Won,
    Lost,
}

/// Per-participant outbound messages.
///
/// Every participant receives their own view of the same session: `own_paddle`
/// is always the receiver's paddle regardless of how the session stores the
/// two sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Update {
    State {
        session_id: SessionId,
        own_paddle: PaddleState,
        opponent_paddle: PaddleState,
        ball: BallState,
    },
    Finished {
        session_id: SessionId,
        outcome: MatchOutcome,
        own_score: u32,
        opponent_score: u32,
    },
}

/// Inbound move command, from a human client or the computer opponent. The
/// engine does not distinguish the origin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoveCommand {
    pub session_id: SessionId,
    pub participant: ParticipantId,
    /// -1 moves toward the negative lateral wall, +1 toward the positive one,
    /// 0 is a no-op.
    pub step: i8,
}
