use std::fmt;

use crate::movement::{MovementCoordinator, PathId};
use crate::tween::TweenId;

/// Everything a suspended task may wait on, read at the start of a tick.
pub struct ResumeContext<'a, S: ?Sized> {
    pub now_seconds: f64,
    pub movement: &'a MovementCoordinator,
    pub state: &'a S,
}

/// A point where a long-running behavior yields until a later tick.
pub enum Suspension<S: ?Sized> {
    /// Until the movement tween resolves, completed or cancelled.
    Tween(TweenId),
    /// Until the path follower finishes with any outcome.
    Follow(PathId),
    Pause { resume_at_seconds: f64 },
    Until(Box<dyn Fn(&S) -> bool>),
}

impl<S: ?Sized> Suspension<S> {
    pub fn pause(now_seconds: f64, seconds: f64) -> Self {
        Self::Pause {
            resume_at_seconds: now_seconds + seconds.max(0.0),
        }
    }

    pub fn until(predicate: impl Fn(&S) -> bool + 'static) -> Self {
        Self::Until(Box::new(predicate))
    }

    pub fn is_ready(&self, context: &ResumeContext<'_, S>) -> bool {
        match self {
            Self::Tween(id) => !context.movement.is_tween_live(*id),
            Self::Follow(path) => !context.movement.is_following(*path),
            Self::Pause { resume_at_seconds } => context.now_seconds >= *resume_at_seconds,
            Self::Until(predicate) => predicate(context.state),
        }
    }
}

impl<S: ?Sized> fmt::Debug for Suspension<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tween(id) => f.debug_tuple("Tween").field(id).finish(),
            Self::Follow(path) => f.debug_tuple("Follow").field(path).finish(),
            Self::Pause { resume_at_seconds } => f
                .debug_struct("Pause")
                .field("resume_at_seconds", resume_at_seconds)
                .finish(),
            Self::Until(_) => f.write_str("Until(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::grid::CellCoord;
    use crate::movement::{Mover, MoveOutcome, OpenGate};
    use crate::EntityId;

    struct Flags {
        open: bool,
    }

    fn context<'a>(
        now_seconds: f64,
        movement: &'a MovementCoordinator,
        state: &'a Flags,
    ) -> ResumeContext<'a, Flags> {
        ResumeContext {
            now_seconds,
            movement,
            state,
        }
    }

    #[test]
    fn pause_resumes_at_deadline() {
        let movement = MovementCoordinator::default();
        let flags = Flags { open: false };
        let pause = Suspension::<Flags>::pause(2.0, 1.0);

        assert!(!pause.is_ready(&context(2.5, &movement, &flags)));
        assert!(pause.is_ready(&context(3.0, &movement, &flags)));
    }

    #[test]
    fn until_reads_caller_state() {
        let movement = MovementCoordinator::default();
        let wait = Suspension::until(|flags: &Flags| flags.open);

        assert!(!wait.is_ready(&context(0.0, &movement, &Flags { open: false })));
        assert!(wait.is_ready(&context(0.0, &movement, &Flags { open: true })));
        assert_eq!(format!("{wait:?}"), "Until(..)");
    }

    #[test]
    fn tween_and_follow_waits_track_the_coordinator() {
        let entity = EntityId(1);
        let mut store = BTreeMap::from([(entity, Mover::at_cell(CellCoord::new(1, 1)))]);
        let mut movement = MovementCoordinator::default();
        let flags = Flags { open: false };

        let MoveOutcome::Started { tween, .. } =
            movement.move_to(&mut store, entity, CellCoord::new(2, 1), true, 0.0)
        else {
            panic!("move should start");
        };
        let path = movement
            .follow_path(&mut store, &OpenGate, entity, vec![CellCoord::new(3, 1)], 0.0)
            .expect("path");
        let tween_wait = Suspension::<Flags>::Tween(tween);
        let follow_wait = Suspension::<Flags>::Follow(path);
        assert!(!follow_wait.is_ready(&context(0.0, &movement, &flags)));

        let mut events = Vec::new();
        for _ in 0..60 {
            movement.step(&mut store, &OpenGate, 0.0, &mut events);
        }
        assert!(tween_wait.is_ready(&context(0.0, &movement, &flags)));
        assert!(follow_wait.is_ready(&context(0.0, &movement, &flags)));
    }
}
