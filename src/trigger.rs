//! Effect trigger queue.
//!
//! A bounded, multi-sender command queue built on `critical-section` and
//! `heapless::Deque`, the only path from other contexts (weather pipeline,
//! input handlers) into the effect engine. Effect ids are assigned here,
//! under the same critical section as the push, so trigger order and id
//! order always agree.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;

use crate::{
    effect::{EffectId, EffectKind, EffectParams, EffectRequest},
    error::CoreError,
    station::StationTable,
};

/// Command drained by the engine at the start of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Trigger { id: EffectId, request: EffectRequest },
    /// Move an effect to `Completed`
    Stop(EffectId),
    /// Complete every effect
    StopAll,
    /// Change the global brightness of the map
    SetBrightness(u8),
}

struct QueueState<const Q: usize> {
    commands: Deque<EngineCommand, Q>,
    next_id: u32,
}

/// A bounded, thread-safe command queue.
pub struct TriggerQueue<const Q: usize> {
    inner: Mutex<RefCell<QueueState<Q>>>,
}

impl<const Q: usize> TriggerQueue<Q> {
    /// Create a new empty queue.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(QueueState {
                commands: Deque::new(),
                next_id: 1,
            })),
        }
    }

    /// Get a trigger handle bound to a station table.
    ///
    /// Multiple handles can coexist; they share access to the same queue.
    pub const fn trigger<'a, const N: usize>(
        &'a self,
        stations: &'a StationTable<N>,
    ) -> EffectTrigger<'a, N, Q> {
        EffectTrigger {
            queue: self,
            stations,
        }
    }

    /// Get a receiver handle for the engine.
    pub const fn receiver(&self) -> CommandReceiver<'_, Q> {
        CommandReceiver { queue: self }
    }

    /// Queue a trigger, allocating its id only if the push succeeds
    pub fn push_trigger(&self, request: EffectRequest) -> Result<EffectId, CoreError> {
        critical_section::with(|cs| {
            let mut state = self.inner.borrow(cs).borrow_mut();
            let id = EffectId(state.next_id);
            state
                .commands
                .push_back(EngineCommand::Trigger { id, request })
                .map_err(|_| CoreError::QueueFull)?;
            state.next_id = state.next_id.wrapping_add(1).max(1);
            Ok(id)
        })
    }

    /// Queue a command.
    ///
    /// Returns `QueueFull` if the queue is full.
    pub fn push(&self, command: EngineCommand) -> Result<(), CoreError> {
        critical_section::with(|cs| {
            let mut state = self.inner.borrow(cs).borrow_mut();
            state
                .commands
                .push_back(command)
                .map_err(|_| CoreError::QueueFull)
        })
    }

    /// Take the oldest command, if any.
    pub fn try_receive(&self) -> Option<EngineCommand> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().commands.pop_front())
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().commands.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const Q: usize> Default for TriggerQueue<Q> {
    fn default() -> Self {
        Self::new()
    }
}

/// A trigger handle for a [`TriggerQueue`].
///
/// This is a lightweight reference that can be copied and passed around.
#[derive(Clone, Copy)]
pub struct EffectTrigger<'a, const N: usize, const Q: usize> {
    queue: &'a TriggerQueue<Q>,
    stations: &'a StationTable<N>,
}

impl<const N: usize, const Q: usize> EffectTrigger<'_, N, Q> {
    /// Start a bounded effect on the named stations.
    ///
    /// The effect is admitted on the engine's next tick. Unknown station ids
    /// reject the whole trigger.
    pub fn trigger_effect(
        &self,
        kind: EffectKind,
        stations: &[&str],
        priority: u8,
        duration: u32,
        params: EffectParams,
    ) -> Result<EffectId, CoreError> {
        let set = self.stations.station_set(stations)?;
        self.trigger(EffectRequest::new(kind, set, priority, duration).with_params(params))
    }

    /// Queue a prepared request
    pub fn trigger(&self, request: EffectRequest) -> Result<EffectId, CoreError> {
        let id = self.queue.push_trigger(request)?;
        log::debug!(
            "effect {} queued: {} on {} station(s), priority {}",
            id.get(),
            request.kind.as_str(),
            request.stations.len(),
            request.priority
        );
        Ok(id)
    }

    /// Request an explicit stop of an effect
    pub fn stop(&self, id: EffectId) -> Result<(), CoreError> {
        self.queue.push(EngineCommand::Stop(id))
    }

    pub fn stop_all(&self) -> Result<(), CoreError> {
        self.queue.push(EngineCommand::StopAll)
    }

    /// Set the global brightness from the next frame on
    pub fn set_brightness(&self, brightness: u8) -> Result<(), CoreError> {
        self.queue.push(EngineCommand::SetBrightness(brightness))
    }
}

/// A receiver handle for a [`TriggerQueue`].
#[derive(Clone, Copy)]
pub struct CommandReceiver<'a, const Q: usize> {
    queue: &'a TriggerQueue<Q>,
}

impl<const Q: usize> CommandReceiver<'_, Q> {
    /// Try to receive a command from the queue.
    pub fn try_receive(&self) -> Option<EngineCommand> {
        self.queue.try_receive()
    }
}
