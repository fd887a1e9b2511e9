use crate::error::{EngineError, EngineResult};
use crate::types::{Game, PlayByPlayEvent};

/// Check that `events` belong to `game` and are already in scan order.
///
/// Order is ascending `elapsed_seconds`, ties broken by strictly increasing
/// `sequence_number`. Out-of-order input is rejected, never re-sorted.
pub fn validate_events(game: &Game, events: &[PlayByPlayEvent]) -> EngineResult<()> {
    let mut prev: Option<&PlayByPlayEvent> = None;

    for (idx, event) in events.iter().enumerate() {
        if event.game_id != game.id {
            return Err(EngineError::data_integrity(
                &game.id,
                format!("event #{idx} (seq {}) belongs to game {}", event.sequence_number, event.game_id),
            ));
        }
        if event.elapsed_seconds < 0 {
            return Err(EngineError::data_integrity(
                &game.id,
                format!("event seq {} has negative elapsed_seconds {}", event.sequence_number, event.elapsed_seconds),
            ));
        }

        if let Some(p) = prev {
            if event.elapsed_seconds < p.elapsed_seconds {
                return Err(EngineError::data_integrity(
                    &game.id,
                    format!(
                        "elapsed_seconds decreased from {} (seq {}) to {} (seq {})",
                        p.elapsed_seconds, p.sequence_number, event.elapsed_seconds, event.sequence_number
                    ),
                ));
            }
            if event.elapsed_seconds == p.elapsed_seconds && event.sequence_number <= p.sequence_number {
                return Err(EngineError::data_integrity(
                    &game.id,
                    format!(
                        "sequence_number {} does not follow {} at elapsed {}",
                        event.sequence_number, p.sequence_number, event.elapsed_seconds
                    ),
                ));
            }
        }
        prev = Some(event);
    }

    Ok(())
}
