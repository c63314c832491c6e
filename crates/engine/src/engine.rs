//! The save engine: capture/restore orchestration over a streamed world.
//!
//! # Invariants
//! - All engine state lives on this struct; background tasks see only
//!   cloned [`Staging`] handles and owned snapshots.
//! - A capture hands its snapshot off atomically on the main context:
//!   accumulate, remove from the store, then enqueue the flush. Tombstones
//!   arriving after the hand-off land in a fresh snapshot.
//! - Visibility-driven operations run only on authoritative worlds.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, info_span, warn};

use crate::sequence::{DefaultSequenceHandler, SaveNotification, SaveSequence, SequenceHandler};
use crate::settings::SaveSettings;
use crate::workers::{MainTask, WorkerPool};
use zonesave_common::{EntityId, Identity, ZoneName};
use zonesave_persist::{
    CodecRegistry, RuntimeEntityRecord, SnapshotStore, Staging, ZoneSnapshot, decode_props_into,
    encode_props,
};
use zonesave_world::{Entity, Origin, World, WorldEvent, Zone, ZoneProvider};

pub struct SaveEngine {
    settings: SaveSettings,
    staging: Staging,
    store: SnapshotStore,
    codecs: CodecRegistry,
    pool: WorkerPool,
    provider: Box<dyn ZoneProvider>,
    /// Zones currently visible (loaded and active) on the host side.
    visible: BTreeSet<ZoneName>,
    /// Zones with a background flush still in the air.
    in_flight: BTreeSet<ZoneName>,
    sequence: Option<SaveSequence>,
    handler: Box<dyn SequenceHandler>,
    notifications: Vec<SaveNotification>,
    current_slot: String,
}

impl SaveEngine {
    pub fn new(settings: SaveSettings, provider: Box<dyn ZoneProvider>) -> Self {
        let staging = Staging::new(
            settings.saved_games_root.clone(),
            settings.temp_folder.clone(),
            settings.zones_folder.clone(),
        );
        let pool = WorkerPool::new(settings.workers);
        Self {
            settings,
            staging,
            store: SnapshotStore::new(),
            codecs: CodecRegistry::new(),
            pool,
            provider,
            visible: BTreeSet::new(),
            in_flight: BTreeSet::new(),
            sequence: None,
            handler: Box::new(DefaultSequenceHandler),
            notifications: Vec::new(),
            current_slot: String::new(),
        }
    }

    pub fn with_sequence_handler(mut self, handler: Box<dyn SequenceHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn codecs_mut(&mut self) -> &mut CodecRegistry {
        &mut self.codecs
    }

    pub fn staging(&self) -> &Staging {
        &self.staging
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn visible_zones(&self) -> Vec<ZoneName> {
        self.visible.iter().cloned().collect()
    }

    pub fn flush_in_flight(&self, zone: &ZoneName) -> bool {
        self.in_flight.contains(zone)
    }

    pub fn current_slot(&self) -> &str {
        &self.current_slot
    }

    // ---- visibility lifecycle -------------------------------------------

    /// A zone is streaming in and about to become active. Queues a restore
    /// of its scratch capture, if one exists.
    pub fn zone_becoming_visible(&mut self, world: &mut World, zone: &ZoneName) {
        if !self.settings.enabled || !world.is_authority() {
            return;
        }
        self.visible.insert(zone.clone());
        self.restore_zone(zone);
    }

    /// A zone is streaming out. Captures it and flushes in the background.
    pub fn zone_becoming_invisible(&mut self, world: &mut World, zone: &ZoneName) {
        if !self.settings.enabled || !world.is_authority() {
            return;
        }
        self.visible.remove(zone);
        self.capture_zone(world, zone, false, true);
    }

    /// Non-partitioned worlds have no visibility transitions; the whole
    /// world captures synchronously as it unloads.
    pub fn world_unloading(&mut self, world: &mut World) {
        if !self.settings.enabled || world.is_partitioned() || !world.is_authority() {
            return;
        }
        if let Some(main) = world.main_zone().cloned() {
            self.capture_zone(world, &main, false, false);
        }
    }

    /// Counterpart of [`Self::world_unloading`]: restore the whole-world
    /// zone after a non-partitioned world finishes loading.
    pub fn world_loaded(&mut self, world: &mut World) {
        if !self.settings.enabled || world.is_partitioned() || !world.is_authority() {
            return;
        }
        if let Some(main) = world.main_zone().cloned() {
            self.restore_zone(&main);
        }
    }

    // ---- capture ---------------------------------------------------------

    /// Capture one zone into a snapshot and flush it to the scratch area.
    ///
    /// `collect_only` leaves the world untouched (no destroy-hook detach, no
    /// runtime teardown); save sequences use it on zones that stay loaded.
    /// `background` moves the disk write onto the pool; the snapshot leaves
    /// the store either way before this returns.
    pub fn capture_zone(
        &mut self,
        world: &mut World,
        zone_name: &ZoneName,
        collect_only: bool,
        background: bool,
    ) {
        if !self.settings.enabled || zone_name.is_empty() {
            return;
        }
        let _span =
            info_span!("capture_zone", zone = %zone_name, collect_only, background).entered();

        let to_destroy = {
            let Some(snapshot) = self.store.get_or_create(zone_name) else {
                return;
            };
            if let Some(zone) = world.zone_mut(zone_name) {
                capture_persistent(zone, snapshot, &self.codecs, collect_only);
            }
            capture_runtime(world, zone_name, snapshot, &self.codecs, &*self.provider)
        };
        if !collect_only {
            for id in to_destroy {
                world.destroy_entity(id);
            }
        }

        // Hand-off: the snapshot leaves the store before the flush launches.
        let Some(snapshot) = self.store.remove(zone_name) else {
            return;
        };
        if background {
            if !self.in_flight.insert(zone_name.clone()) {
                warn!(zone = %zone_name, "flush still in flight; last write wins");
            }
            let staging = self.staging.clone();
            let zone = zone_name.clone();
            self.pool.submit(move || {
                if let Err(err) = staging.write_temp(&zone, &snapshot) {
                    warn!(zone = %zone, %err, "background zone flush failed");
                }
                Some(Box::new(move |engine: &mut SaveEngine, _: &mut World| {
                    engine.in_flight.remove(&zone);
                }) as MainTask)
            });
        } else if let Err(err) = self.staging.write_temp(zone_name, &snapshot) {
            warn!(zone = %zone_name, %err, "zone flush failed");
        }
    }

    // ---- restore ---------------------------------------------------------

    /// Queue a background read of a zone's scratch capture. The snapshot is
    /// applied on the main context at the next pump, and only if the zone is
    /// still loaded by then.
    pub fn restore_zone(&mut self, zone_name: &ZoneName) {
        if !self.settings.enabled || zone_name.is_empty() {
            return;
        }
        debug!(zone = %zone_name, "zone restore queued");
        let staging = self.staging.clone();
        let zone = zone_name.clone();
        self.pool.submit(move || {
            let snapshot = match staging.read_temp(&zone) {
                Ok(snapshot) => snapshot?,
                Err(err) => {
                    warn!(zone = %zone, %err, "zone restore read failed");
                    return None;
                }
            };
            Some(Box::new(move |engine: &mut SaveEngine, world: &mut World| {
                engine.apply_snapshot(world, &zone, snapshot);
            }) as MainTask)
        });
    }

    fn apply_snapshot(&mut self, world: &mut World, zone_name: &ZoneName, snapshot: ZoneSnapshot) {
        if world.zone(zone_name).is_none() {
            debug!(zone = %zone_name, "zone unloaded before restore; snapshot dropped");
            return;
        }
        let _span = info_span!("restore_zone", zone = %zone_name).entered();

        let ids = world
            .zone(zone_name)
            .map(|z| z.entity_ids())
            .unwrap_or_default();
        for id in ids {
            let identity = {
                let Some(entity) = world.zone(zone_name).and_then(|z| z.entity(id)) else {
                    continue;
                };
                if !entity.is_walk_candidate() {
                    continue;
                }
                entity.persistable_identity()
            };
            match identity {
                Some(identity) if snapshot.is_destroyed(&identity) => {
                    world.destroy_entity(id);
                }
                Some(identity) => {
                    if let Some(entity) = world.zone_mut(zone_name).and_then(|z| z.entity_mut(id))
                    {
                        if let Some(record) = snapshot.record(&identity) {
                            self.codecs
                                .codec_for(&entity.class)
                                .restore(entity, &record.payload);
                            entity.on_post_load();
                        }
                        entity.destroy_hook = true;
                        restore_sub_objects(entity, &snapshot);
                    }
                }
                // Sub-objects can opt in even when their owner does not.
                None => {
                    if let Some(entity) = world.zone_mut(zone_name).and_then(|z| z.entity_mut(id))
                    {
                        restore_sub_objects(entity, &snapshot);
                    }
                }
            }
        }

        for record in &snapshot.runtime {
            let Some(id) = world.spawn_runtime(&record.class, record.transform) else {
                warn!(class = %record.class, "unregistered class; runtime record skipped");
                continue;
            };
            if let Some(entity) = world.entity_mut(id) {
                entity.velocity = record.velocity;
                self.codecs
                    .codec_for(&record.class)
                    .restore(entity, &record.payload);
                entity.on_post_load();
                for i in 0..entity.sub_objects.len() {
                    let key = Identity::from_name(&entity.sub_objects[i].name);
                    if let Some(bytes) = record.sub_objects.get(&key) {
                        decode_props_into(&mut entity.sub_objects[i].props, bytes);
                    }
                }
            }
        }
    }

    // ---- event intake ----------------------------------------------------

    /// Fold the world's destruction log into pending snapshots. Only hooked
    /// destructions count; the hook is detached during captures precisely so
    /// unload teardown does not register here.
    pub fn process_world_events(&mut self, world: &mut World) {
        for event in world.drain_events() {
            let WorldEvent::EntityDestroyed {
                identity,
                hooked,
                origin,
                home_zone,
                position,
            } = event;
            if !hooked || !identity.is_valid() {
                continue;
            }
            let zone = match origin {
                Origin::Static => home_zone,
                Origin::Runtime => {
                    if world.is_partitioned() {
                        self.provider.zone_at(position)
                    } else {
                        world.main_zone().cloned()
                    }
                }
            };
            let Some(zone) = zone else {
                continue;
            };
            if let Some(snapshot) = self.store.get_or_create(&zone) {
                debug!(zone = %zone, "tombstone recorded");
                snapshot.record_destroyed(identity);
            }
        }
    }

    /// A tracked runtime entity wandered into a zone that is not active.
    /// Stash its record into that zone's pending snapshot so the state is
    /// not lost when the entity's own zone unloads.
    pub fn note_runtime_entity_left_zone(&mut self, world: &World, id: EntityId) {
        if !self.settings.enabled {
            return;
        }
        let Some(entity) = world.entity(id) else {
            return;
        };
        if !entity.runtime_tracked || entity.persistable_identity().is_none() {
            return;
        }
        let Some(zone) = associate_zone(world, &*self.provider, entity) else {
            return;
        };
        if self.visible.contains(&zone) {
            return;
        }
        let record = build_runtime_record(entity, &self.codecs);
        if let Some(snapshot) = self.store.get_or_create(&zone) {
            snapshot.push_runtime(record);
        }
    }

    // ---- main-context pump ----------------------------------------------

    /// Per-frame service: fold world events, then run every continuation the
    /// pool has ready.
    pub fn pump(&mut self, world: &mut World) {
        self.process_world_events(world);
        for task in self.pool.drain_main() {
            task(&mut *self, world);
        }
    }

    /// Pump, blocking up to `timeout` for at least one continuation.
    /// Returns whether one ran.
    pub fn pump_blocking(&mut self, world: &mut World, timeout: Duration) -> bool {
        self.process_world_events(world);
        match self.pool.recv_main_timeout(timeout) {
            Some(task) => {
                task(&mut *self, world);
                self.pump(world);
                true
            }
            None => false,
        }
    }

    // ---- save/load sequence ---------------------------------------------

    /// Begin a save or load sequence against a slot. Single-flight: ignored
    /// while another sequence is active or when the slot name is rejected.
    pub fn begin_sequence(&mut self, slot: &str, saving: bool) {
        if !self.settings.enabled || self.sequence.is_some() {
            return;
        }
        if !self.handler.slot_name_valid(slot) {
            warn!(slot, "slot name rejected");
            return;
        }
        self.notifications.push(if saving {
            SaveNotification::PreSave
        } else {
            SaveNotification::PreLoad
        });
        self.sequence = Some(SaveSequence {
            slot: slot.to_string(),
            saving,
        });
        self.current_slot = slot.to_string();
        if saving {
            self.handler.begin_save(slot);
        } else {
            self.handler.begin_load(slot);
        }
    }

    /// Finish the active sequence. Saving captures every visible zone
    /// collect-only and merges scratch into the slot; loading merges the
    /// slot into scratch so zone loads pick the data up.
    pub fn end_sequence(&mut self, world: &mut World) {
        let Some(sequence) = self.sequence.take() else {
            return;
        };
        let _span = info_span!("end_sequence", slot = %sequence.slot, saving = sequence.saving)
            .entered();
        if sequence.saving {
            for zone in self.visible_zones() {
                self.capture_zone(world, &zone, true, false);
            }
            if let Err(err) = self.staging.merge_temp_into_slot(&sequence.slot) {
                warn!(slot = %sequence.slot, %err, "merging scratch into slot failed");
            }
            self.notifications.push(SaveNotification::SaveComplete);
        } else {
            if let Err(err) = self.staging.merge_slot_into_temp(&sequence.slot) {
                warn!(slot = %sequence.slot, %err, "merging slot into scratch failed");
            }
            self.notifications.push(SaveNotification::LoadComplete);
        }
    }

    pub fn sequence(&self) -> Option<&SaveSequence> {
        self.sequence.as_ref()
    }

    pub fn is_saving(&self) -> bool {
        matches!(self.sequence, Some(SaveSequence { saving: true, .. }))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.sequence, Some(SaveSequence { saving: false, .. }))
    }

    /// Hand a host-captured slot screenshot through the notification queue.
    pub fn screenshot_captured(&mut self, png: Vec<u8>) {
        self.notifications
            .push(SaveNotification::ScreenshotCaptured { png });
    }

    pub fn drain_notifications(&mut self) -> Vec<SaveNotification> {
        std::mem::take(&mut self.notifications)
    }

    /// Engine teardown. Optionally clears the scratch area so stale session
    /// state cannot leak into the next run.
    pub fn teardown(&mut self) {
        if self.settings.enabled && self.settings.clear_temp_on_teardown {
            if let Err(err) = self.staging.clear_temp() {
                warn!(%err, "clearing scratch area failed");
            }
        }
    }
}

/// Walk a zone's build-data entities into the snapshot. Detaches each
/// captured entity's destroy hook unless this is a collect-only pass, so the
/// teardown that follows a capture records no tombstones.
fn capture_persistent(
    zone: &mut Zone,
    snapshot: &mut ZoneSnapshot,
    codecs: &CodecRegistry,
    collect_only: bool,
) {
    for id in zone.entity_ids() {
        let Some(entity) = zone.entity_mut(id) else {
            continue;
        };
        if !entity.is_walk_candidate() {
            continue;
        }
        if let Some(identity) = entity.persistable_identity() {
            if !collect_only {
                entity.destroy_hook = false;
            }
            let payload = codecs.codec_for(&entity.class).capture(entity);
            snapshot.record_entity(identity, payload);
        }
        // Sub-objects opt in on their own, owner persistable or not.
        for sub in &entity.sub_objects {
            if !sub.persistable {
                continue;
            }
            let sub_id = entity.sub_object_identity(sub);
            if sub_id.is_valid() {
                snapshot.record_sub_object(sub_id, encode_props(&sub.props));
            }
        }
    }
}

/// Collect runtime entities whose associate zone is the one being captured.
/// Returns their ids so the caller can tear them down afterwards.
fn capture_runtime(
    world: &World,
    zone_name: &ZoneName,
    snapshot: &mut ZoneSnapshot,
    codecs: &CodecRegistry,
    provider: &dyn ZoneProvider,
) -> Vec<EntityId> {
    let mut matched = Vec::new();
    for id in world.runtime_entity_ids() {
        let Some(entity) = world.entity(id) else {
            continue;
        };
        if !entity.runtime_tracked || !entity.is_walk_candidate() {
            continue;
        }
        if entity.persistable_identity().is_none() {
            continue;
        }
        if associate_zone(world, provider, entity).as_ref() != Some(zone_name) {
            continue;
        }
        snapshot.push_runtime(build_runtime_record(entity, codecs));
        matched.push(id);
    }
    matched
}

/// Which zone an entity's state belongs to: build-data entities keep their
/// home zone, runtime spawns resolve by position (or the whole-world zone
/// when there is no partition).
fn associate_zone(world: &World, provider: &dyn ZoneProvider, entity: &Entity) -> Option<ZoneName> {
    match entity.origin {
        Origin::Static => entity.home_zone.clone(),
        Origin::Runtime => {
            if world.is_partitioned() {
                provider.zone_at(entity.transform.position)
            } else {
                world.main_zone().cloned()
            }
        }
    }
}

fn build_runtime_record(entity: &Entity, codecs: &CodecRegistry) -> RuntimeEntityRecord {
    let mut sub_objects = std::collections::BTreeMap::new();
    for sub in &entity.sub_objects {
        if !sub.persistable {
            continue;
        }
        let sub_id = entity.sub_object_identity(sub);
        if sub_id.is_valid() {
            sub_objects.insert(sub_id, encode_props(&sub.props));
        }
    }
    RuntimeEntityRecord {
        class: entity.class.clone(),
        transform: entity.transform,
        velocity: entity.velocity,
        sub_objects,
        payload: codecs.codec_for(&entity.class).capture(entity),
    }
}

fn restore_sub_objects(entity: &mut Entity, snapshot: &ZoneSnapshot) {
    for i in 0..entity.sub_objects.len() {
        if !entity.sub_objects[i].persistable {
            continue;
        }
        let identity = entity.sub_object_identity(&entity.sub_objects[i]);
        if !identity.is_valid() {
            continue;
        }
        if let Some(record) = snapshot.record(&identity) {
            decode_props_into(&mut entity.sub_objects[i].props, &record.payload);
        }
    }
}
