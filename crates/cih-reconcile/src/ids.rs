//! Global id generation.

use uuid::Uuid;

/// Hands out global ids for identities that could not reuse a prior one.
/// The reconciler discards any id that is already taken and draws again.
pub trait GlobalIdSource {
    fn next_id(&mut self) -> Uuid;
}

/// Random v4 ids. Production default.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;

impl GlobalIdSource for RandomIds {
    fn next_id(&mut self) -> Uuid {
        Uuid::new_v4()
    }
}

/// v5 ids derived from a namespace and a counter: the same namespace always
/// yields the same sequence.
#[derive(Clone, Debug)]
pub struct SeededIds {
    namespace: Uuid,
    seq: u64,
}

impl SeededIds {
    pub fn new(namespace: Uuid) -> Self {
        Self { namespace, seq: 0 }
    }

    /// Number of ids handed out so far.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl GlobalIdSource for SeededIds {
    fn next_id(&mut self) -> Uuid {
        let id = Uuid::new_v5(&self.namespace, &self.seq.to_be_bytes());
        self.seq += 1;
        id
    }
}
