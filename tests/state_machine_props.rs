//! Property tests over the entity state machines.

use cipherswarm::domain::models::{
    AgentEvent, AgentState, AttackEvent, AttackState, CampaignPriority, TaskEvent, TaskState,
};
use proptest::prelude::*;

fn task_events() -> impl Strategy<Value = TaskEvent> {
    prop_oneof![
        Just(TaskEvent::Accept),
        Just(TaskEvent::AcceptStatus),
        Just(TaskEvent::AcceptCrack),
        Just(TaskEvent::Complete),
        Just(TaskEvent::Exhaust),
        Just(TaskEvent::Fail),
        Just(TaskEvent::Abandon),
        Just(TaskEvent::Reject),
        Just(TaskEvent::Retry),
    ]
}

fn attack_events() -> impl Strategy<Value = AttackEvent> {
    prop_oneof![
        Just(AttackEvent::Accept),
        Just(AttackEvent::Complete),
        Just(AttackEvent::Exhaust),
        Just(AttackEvent::Fail),
        Just(AttackEvent::Pause),
        Just(AttackEvent::Resume),
        Just(AttackEvent::Reset),
    ]
}

fn agent_events() -> impl Strategy<Value = AgentEvent> {
    prop_oneof![
        Just(AgentEvent::Heartbeat),
        Just(AgentEvent::BenchmarkSubmitted),
        Just(AgentEvent::Shutdown),
        Just(AgentEvent::MarkOffline),
        Just(AgentEvent::MarkError),
    ]
}

proptest! {
    /// No event sequence can pull a task out of a terminal state.
    #[test]
    fn task_terminal_states_are_absorbing(events in prop::collection::vec(task_events(), 0..32)) {
        let mut state = TaskState::Pending;
        for event in events {
            let was_terminal = state.is_terminal();
            if let Ok(next) = state.apply(event) {
                if was_terminal {
                    prop_assert_eq!(next, state, "terminal state changed via {:?}", event);
                }
                state = next;
            }
        }
    }

    /// Whatever the event sequence, the state string round-trips.
    #[test]
    fn task_state_strings_round_trip(events in prop::collection::vec(task_events(), 0..32)) {
        let mut state = TaskState::Pending;
        for event in events {
            if let Ok(next) = state.apply(event) {
                state = next;
            }
            prop_assert_eq!(TaskState::from_str(state.as_str()), Some(state));
        }
    }

    /// Completed and exhausted attacks never run again.
    #[test]
    fn attack_terminal_states_are_absorbing(events in prop::collection::vec(attack_events(), 0..32)) {
        let mut state = AttackState::Pending;
        for event in events {
            let was_terminal = state.is_terminal();
            if let Ok(next) = state.apply(event) {
                if was_terminal {
                    prop_assert_eq!(next, state, "terminal state changed via {:?}", event);
                }
                state = next;
            }
        }
    }

    /// A stopped agent only ever leaves stopped through an explicit error
    /// mark; heartbeats and benchmarks cannot resurrect it.
    #[test]
    fn stopped_agents_ignore_liveness_events(events in prop::collection::vec(agent_events(), 0..32)) {
        let mut state = AgentState::Stopped;
        for event in events {
            if let Ok(next) = state.apply(event) {
                if matches!(event, AgentEvent::Heartbeat | AgentEvent::BenchmarkSubmitted)
                    && state == AgentState::Stopped
                {
                    prop_assert_eq!(next, AgentState::Stopped);
                }
                state = next;
            }
        }
    }

    /// Stored priorities always map back to the same variant.
    #[test]
    fn campaign_priority_round_trips(raw in -2_i64..4) {
        if let Some(priority) = CampaignPriority::from_i64(raw) {
            prop_assert_eq!(priority.as_i64(), raw);
        } else {
            prop_assert!(![-1, 0, 2].contains(&raw));
        }
    }
}
