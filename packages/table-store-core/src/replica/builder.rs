//! Replica builder: folds store events, in order, into an owned registry.
//!
//! Each event is applied atomically to its key: table operations compute the
//! new record on a copy and commit it only when every check passes.

use std::collections::HashMap;

use alloy_primitives::B256;

use crate::config::{HaltPolicy, RegistryMutationPolicy, ReplicaConfig, UnknownTablePolicy};
use crate::error::StoreError;
use crate::table::{TableRegistration, TableRegistry, TABLES_TABLE_ID};
use crate::types::{Record, ResourceId};

use super::event::StoreEvent;
use super::snapshot::{ReplicaSnapshot, ReplicaSnapshots};

/// Result of offering one event to the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event changed the replica
    Applied,
    /// The event waits for its table's registration
    Buffered,
    /// The event was skipped by the registry mutation policy
    Ignored,
    /// The event failed and its key is now halted
    Rejected(StoreError),
}

/// A failure recorded under the per-key halt policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldFailure {
    pub index: u64,
    pub table_id: ResourceId,
    pub key_tuple: Vec<B256>,
    pub error: StoreError,
}

/// Counters for one `apply_all` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldSummary {
    /// Events applied when they arrived
    pub applied: u64,
    /// Events queued for an unregistered table
    pub buffered: u64,
    /// Buffered events applied after their table was registered
    pub replayed: u64,
    /// Events skipped by the registry mutation policy
    pub ignored: u64,
    /// Rejected events, in stream order
    pub failures: Vec<FoldFailure>,
}

/// Reconstructs table state from an ordered event stream.
#[derive(Debug)]
pub struct ReplicaBuilder {
    config: ReplicaConfig,
    registry: TableRegistry,
    next_index: u64,
    pending: HashMap<ResourceId, Vec<(u64, StoreEvent)>>,
    pending_count: usize,
    halted: HashMap<(ResourceId, Vec<B256>), u64>,
    registered: Vec<ResourceId>,
}

impl ReplicaBuilder {
    /// Creates a builder over an empty registry.
    pub fn new(config: ReplicaConfig) -> Self {
        Self::resume(config, TableRegistry::new(), 0)
    }

    /// Creates a builder over restored state, expecting event `next_index`
    /// next.
    pub fn resume(config: ReplicaConfig, registry: TableRegistry, next_index: u64) -> Self {
        Self {
            config,
            registry,
            next_index,
            pending: HashMap::new(),
            pending_count: 0,
            halted: HashMap::new(),
            registered: Vec::new(),
        }
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> TableRegistry {
        self.registry
    }

    /// Index of the next event to apply; equals the number of events
    /// consumed so far.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Number of events waiting for a table registration.
    pub fn pending_events(&self) -> usize {
        self.pending_count
    }

    /// Whether a key was halted by a failure under the per-key policy.
    pub fn is_halted(&self, table_id: &ResourceId, key: &[B256]) -> bool {
        self.halted.contains_key(&(*table_id, key.to_vec()))
    }

    /// Events waiting for a table registration, with their stream index, in
    /// stream order.
    pub fn buffered_events(&self) -> Vec<(u64, &StoreEvent)> {
        let mut events: Vec<_> = self
            .pending
            .values()
            .flatten()
            .map(|(index, event)| (*index, event))
            .collect();
        events.sort_by_key(|(index, _)| *index);
        events
    }

    /// Halted keys with the index of the event that halted them, in index
    /// order.
    pub fn halted_keys(&self) -> Vec<(ResourceId, &[B256], u64)> {
        let mut keys: Vec<_> = self
            .halted
            .iter()
            .map(|((table_id, key), index)| (*table_id, key.as_slice(), *index))
            .collect();
        keys.sort_by(|a, b| (a.2, a.0, a.1).cmp(&(b.2, b.0, b.1)));
        keys
    }

    /// Reinstates buffered events and halted keys saved with a checkpoint.
    pub(crate) fn restore_fold_state(
        &mut self,
        buffered: Vec<(u64, StoreEvent)>,
        halted: Vec<(ResourceId, Vec<B256>, u64)>,
    ) {
        for (index, event) in buffered {
            self.pending.entry(event.table_id()).or_default().push((index, event));
            self.pending_count += 1;
        }
        for events in self.pending.values_mut() {
            events.sort_by_key(|(index, _)| *index);
        }
        for (table_id, key, index) in halted {
            self.halted.insert((table_id, key), index);
        }
    }

    /// Applies the next event of the stream.
    ///
    /// # Returns
    /// The event's outcome, or the error that stops the fold. Under
    /// `HaltPolicy::Stream` the failing event is not consumed; when a
    /// buffered event fails during the replay a registration triggers, the
    /// registration is rolled back and stays unconsumed with its buffer.
    pub fn apply(&mut self, event: StoreEvent) -> Result<EventOutcome, StoreError> {
        self.fold(event, &mut FoldSummary::default())
    }

    /// Applies events in order until the stream ends or a failure stops the
    /// fold.
    pub fn apply_all<I>(&mut self, events: I) -> Result<FoldSummary, StoreError>
    where
        I: IntoIterator<Item = StoreEvent>,
    {
        let mut summary = FoldSummary::default();
        for event in events {
            self.fold(event, &mut summary)?;
        }
        tracing::debug!(
            "Fold reached event {}: {} applied, {} buffered, {} replayed, {} ignored, {} failed",
            self.next_index,
            summary.applied,
            summary.buffered,
            summary.replayed,
            summary.ignored,
            summary.failures.len()
        );
        Ok(summary)
    }

    /// Publishes the current state for concurrent readers.
    pub fn publish(&self, snapshots: &ReplicaSnapshots) {
        snapshots.store(ReplicaSnapshot {
            registry: self.registry.clone(),
            next_index: self.next_index,
        });
    }

    fn fold(&mut self, event: StoreEvent, summary: &mut FoldSummary) -> Result<EventOutcome, StoreError> {
        let index = self.next_index;
        // A registration that releases buffered events commits together with
        // their replay.
        let rollback = (self.config.halt_policy == HaltPolicy::Stream
            && self.releases_pending(&event))
        .then(|| self.registry.clone());

        let outcome = self.dispatch(index, event, summary)?;
        while let Some(table_id) = self.registered.pop() {
            if let Err(error) = self.replay_pending(table_id, summary) {
                self.registered.clear();
                if let Some(registry) = rollback {
                    self.registry = registry;
                }
                tracing::warn!(
                    "Registration at event {} rolled back: buffered event failed: {}",
                    index,
                    error
                );
                return Err(error);
            }
        }

        self.next_index += 1;
        match outcome {
            EventOutcome::Applied => summary.applied += 1,
            EventOutcome::Buffered => summary.buffered += 1,
            EventOutcome::Ignored => summary.ignored += 1,
            EventOutcome::Rejected(_) => {}
        }
        Ok(outcome)
    }

    /// Whether `event` registers a table that has buffered events.
    fn releases_pending(&self, event: &StoreEvent) -> bool {
        match event {
            StoreEvent::SetRecord {
                table_id, key_tuple, ..
            } if *table_id == TABLES_TABLE_ID => match key_tuple.as_slice() {
                [word] => self.pending.contains_key(&ResourceId::from_word(*word)),
                _ => false,
            },
            _ => false,
        }
    }

    fn dispatch(
        &mut self,
        index: u64,
        event: StoreEvent,
        summary: &mut FoldSummary,
    ) -> Result<EventOutcome, StoreError> {
        let table_id = event.table_id();
        let key = event.key_tuple().to_vec();

        if self.config.halt_policy == HaltPolicy::Key {
            if let Some(halted_at) = self.halted.get(&(table_id, key.clone())) {
                let error = StoreError::stream(
                    index,
                    format!("key was halted by the failure of event {}", halted_at),
                );
                summary.failures.push(FoldFailure {
                    index,
                    table_id,
                    key_tuple: key,
                    error: error.clone(),
                });
                return Ok(EventOutcome::Rejected(error));
            }
        }

        match self.route(index, event) {
            Ok(outcome) => Ok(outcome),
            Err(error) => match self.config.halt_policy {
                HaltPolicy::Stream => {
                    tracing::warn!("Fold stopped at event {}: {}", index, error);
                    Err(error)
                }
                HaltPolicy::Key => {
                    tracing::warn!(
                        "Halting key {} of table {} at event {}: {}",
                        format_key(&key),
                        table_id,
                        index,
                        error
                    );
                    self.halted.insert((table_id, key.clone()), index);
                    summary.failures.push(FoldFailure {
                        index,
                        table_id,
                        key_tuple: key,
                        error: error.clone(),
                    });
                    Ok(EventOutcome::Rejected(error))
                }
            },
        }
    }

    fn route(&mut self, index: u64, event: StoreEvent) -> Result<EventOutcome, StoreError> {
        let table_id = event.table_id();
        if !self.registry.is_bootstrapped() {
            if table_id == TABLES_TABLE_ID {
                return self.bootstrap(index, event);
            }
            return self.unknown_table(index, event);
        }
        if !self.registry.contains(&table_id) {
            return self.unknown_table(index, event);
        }
        self.apply_to_table(index, event)
    }

    fn bootstrap(&mut self, index: u64, event: StoreEvent) -> Result<EventOutcome, StoreError> {
        let StoreEvent::SetRecord {
            key_tuple,
            static_data,
            encoded_lengths,
            dynamic_data,
            ..
        } = event
        else {
            return Err(unknown(&TABLES_TABLE_ID));
        };
        if key_tuple != vec![*TABLES_TABLE_ID.as_word()] {
            return Err(unknown(&TABLES_TABLE_ID));
        }

        let record = Record::new(static_data, encoded_lengths, dynamic_data);
        let registration =
            TableRegistration::from_record(&key_tuple, &record).map_err(|e| integrity(index, e))?;
        let expected = TableRegistration::tables_table()?;
        if registration.field_layout != expected.field_layout
            || registration.key_schema != expected.key_schema
            || registration.value_schema != expected.value_schema
        {
            return Err(StoreError::stream(
                index,
                "self-describing record does not describe the Tables registry",
            ));
        }
        self.registry
            .insert_table(registration, record)
            .map_err(|e| integrity(index, e))?;
        tracing::info!("Tables registry bootstrapped at event {}", index);
        Ok(EventOutcome::Applied)
    }

    fn unknown_table(&mut self, index: u64, event: StoreEvent) -> Result<EventOutcome, StoreError> {
        let table_id = event.table_id();
        if table_id == TABLES_TABLE_ID || self.config.unknown_table_policy == UnknownTablePolicy::Reject {
            return Err(unknown(&table_id));
        }
        if self.pending_count >= self.config.max_buffered_events {
            tracing::warn!(
                "Buffer limit of {} events reached at event {} for table {}",
                self.config.max_buffered_events,
                index,
                table_id
            );
            return Err(unknown(&table_id));
        }
        tracing::debug!("Buffering event {} for unregistered table {}", index, table_id);
        self.pending.entry(table_id).or_default().push((index, event));
        self.pending_count += 1;
        Ok(EventOutcome::Buffered)
    }

    fn apply_to_table(&mut self, index: u64, event: StoreEvent) -> Result<EventOutcome, StoreError> {
        let table_id = event.table_id();
        let kind = event.kind();
        let table = self.registry.table(&table_id).ok_or_else(|| unknown(&table_id))?;
        if table.write_once {
            let existing = match &event {
                StoreEvent::SetRecord { key_tuple, .. } => table.contains(key_tuple),
                _ => true,
            };
            if existing {
                return match self.config.registry_mutation_policy {
                    RegistryMutationPolicy::Reject => Err(StoreError::stream(
                        index,
                        format!("{} would modify a write-once record of {}", kind, table_id),
                    )),
                    RegistryMutationPolicy::Ignore => {
                        tracing::warn!(
                            "Ignoring {} at event {}: records of {} are write-once",
                            kind,
                            index,
                            table_id
                        );
                        Ok(EventOutcome::Ignored)
                    }
                };
            }
        }

        let verify = self.config.verify_encoded_lengths;
        match event {
            StoreEvent::SetRecord {
                key_tuple,
                static_data,
                encoded_lengths,
                dynamic_data,
                ..
            } => {
                let record = Record::new(static_data, encoded_lengths, dynamic_data);
                if table_id == TABLES_TABLE_ID {
                    return self.register(index, key_tuple, record);
                }
                self.registry
                    .table_mut(&table_id)?
                    .set_record(key_tuple, record)
                    .map_err(|e| integrity(index, e))?;
            }
            StoreEvent::SpliceStaticData {
                key_tuple, start, data, ..
            } => {
                self.registry
                    .table_mut(&table_id)?
                    .splice_static(&key_tuple, start, &data)
                    .map_err(|e| integrity(index, e))?;
            }
            StoreEvent::SpliceDynamicData {
                key_tuple,
                dynamic_field_index,
                start,
                delete_count,
                encoded_lengths,
                data,
                ..
            } => {
                self.registry
                    .table_mut(&table_id)?
                    .splice_dynamic(
                        &key_tuple,
                        dynamic_field_index as usize,
                        start,
                        delete_count,
                        encoded_lengths,
                        &data,
                        verify,
                    )
                    .map_err(|e| integrity(index, e))?;
            }
            StoreEvent::DeleteRecord { key_tuple, .. } => {
                self.registry.table_mut(&table_id)?.delete(&key_tuple);
            }
        }
        tracing::debug!("Applied {} to {} at event {}", kind, table_id, index);
        Ok(EventOutcome::Applied)
    }

    fn register(
        &mut self,
        index: u64,
        key_tuple: Vec<B256>,
        record: Record,
    ) -> Result<EventOutcome, StoreError> {
        let registration =
            TableRegistration::from_record(&key_tuple, &record).map_err(|e| integrity(index, e))?;
        let table_id = registration.table_id;
        self.registry
            .insert_table(registration, record)
            .map_err(|e| integrity(index, e))?;
        tracing::info!("Registered table {} at event {}", table_id, index);
        if self.pending.contains_key(&table_id) {
            self.registered.push(table_id);
        }
        Ok(EventOutcome::Applied)
    }

    fn replay_pending(&mut self, table_id: ResourceId, summary: &mut FoldSummary) -> Result<(), StoreError> {
        let Some(events) = self.pending.remove(&table_id) else {
            return Ok(());
        };
        self.pending_count -= events.len();
        tracing::info!("Replaying {} buffered events for {}", events.len(), table_id);
        for (index, event) in events.iter().cloned() {
            match self.dispatch(index, event, summary) {
                Ok(EventOutcome::Applied) => summary.replayed += 1,
                Ok(EventOutcome::Ignored) => summary.ignored += 1,
                Ok(EventOutcome::Buffered | EventOutcome::Rejected(_)) => {}
                Err(error) => {
                    // The whole buffer stays queued for the next attempt.
                    self.pending_count += events.len();
                    self.pending.insert(table_id, events);
                    return Err(error);
                }
            }
        }
        Ok(())
    }
}

fn unknown(table_id: &ResourceId) -> StoreError {
    StoreError::UnknownTable {
        table: table_id.to_string(),
    }
}

/// Attaches the event index to table-level failures.
fn integrity(index: u64, error: StoreError) -> StoreError {
    if error.is_stream_error() {
        error
    } else {
        StoreError::stream(index, error.to_string())
    }
}

fn format_key(key: &[B256]) -> String {
    let words: Vec<String> = key.iter().map(|w| w.to_string()).collect();
    format!("[{}]", words.join(", "))
}
