//! Streaming tool-call delta merger.
//!
//! On the streaming path a tool call arrives shredded across many chunks:
//! the id in one delta, the name in another, the JSON arguments split at
//! arbitrary byte boundaries. The merger is a small state machine over
//! "slots" — one per in-flight call — that assembles fragments into complete
//! calls at end-of-stream.
//!
//! Slot lifecycle: `Partial` (placeholder, no name yet) → `Named` → complete
//! at [`DeltaMerger::finish`]. Slots that never receive a name are discarded.

use ferrite_core::callid::generate_call_id;
use ferrite_core::message::ToolCall;
use ferrite_core::provider::ToolCallDelta;

use crate::normalize::normalize_arguments;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Partial,
    Named,
}

#[derive(Debug)]
struct Slot {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
    state: SlotState,
}

impl Slot {
    fn placeholder() -> Self {
        Self {
            id: None,
            name: None,
            arguments: String::new(),
            state: SlotState::Partial,
        }
    }

    fn absorb(&mut self, delta: &ToolCallDelta) {
        if self.id.is_none()
            && let Some(id) = nonempty(&delta.id)
        {
            self.id = Some(id.to_string());
        }
        // First non-empty name wins; later name changes are ignored.
        if self.name.is_none()
            && let Some(name) = nonempty(&delta.name)
        {
            self.name = Some(name.to_string());
            self.state = SlotState::Named;
        }
        if let Some(fragment) = &delta.arguments {
            self.arguments.push_str(fragment);
        }
    }
}

fn nonempty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Assembles fragmented streaming tool-call deltas into complete calls.
#[derive(Debug, Default)]
pub struct DeltaMerger {
    slots: Vec<Slot>,
}

impl DeltaMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one incoming delta to a slot.
    ///
    /// Routing order:
    /// 1. an id matching an existing slot wins;
    /// 2. a name (without id) matching an existing slot's name comes next —
    ///    some providers set the id only on the first chunk and repeat the
    ///    name on later ones;
    /// 3. an id+name delta promotes an unnamed placeholder in place, if one
    ///    exists; otherwise a fresh id opens a new slot;
    /// 4. a bare name opens a new slot unless an unnamed placeholder is
    ///    waiting for it;
    /// 5. anything else (pure argument fragment) appends to the most recent
    ///    slot.
    pub fn push(&mut self, delta: &ToolCallDelta) {
        let id = nonempty(&delta.id);
        let name = nonempty(&delta.name);

        if let Some(id) = id
            && let Some(slot) = self.slots.iter_mut().find(|s| s.id.as_deref() == Some(id))
        {
            slot.absorb(delta);
            return;
        }

        if id.is_none()
            && let Some(name) = name
            && let Some(slot) = self
                .slots
                .iter_mut()
                .find(|s| s.name.as_deref() == Some(name))
        {
            slot.absorb(delta);
            return;
        }

        if id.is_some() {
            if name.is_some()
                && let Some(slot) = self
                    .slots
                    .iter_mut()
                    .find(|s| s.state == SlotState::Partial)
            {
                slot.absorb(delta);
                return;
            }
            let mut slot = Slot::placeholder();
            slot.absorb(delta);
            self.slots.push(slot);
            return;
        }

        if name.is_some() {
            if let Some(slot) = self
                .slots
                .iter_mut()
                .find(|s| s.state == SlotState::Partial)
            {
                slot.absorb(delta);
                return;
            }
            let mut slot = Slot::placeholder();
            slot.absorb(delta);
            self.slots.push(slot);
            return;
        }

        // Neither id nor name: append-only fragment.
        match self.slots.last_mut() {
            Some(slot) => slot.absorb(delta),
            None => {
                let mut slot = Slot::placeholder();
                slot.absorb(delta);
                self.slots.push(slot);
            }
        }
    }

    /// Whether any slot holds data.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// End-of-stream: discard nameless slots, generate missing ids, and
    /// normalize each slot's accumulated arguments.
    pub fn finish(self) -> Vec<ToolCall> {
        self.slots
            .into_iter()
            .filter_map(|slot| {
                let name = slot.name?;
                let id = slot.id.unwrap_or_else(generate_call_id);
                let (_, canonical) = normalize_arguments(&slot.arguments);
                Some(ToolCall::new(id, name, canonical))
            })
            .collect()
    }
}
