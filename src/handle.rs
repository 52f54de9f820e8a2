//! Base-model and per-base instance slot registries (§4.4).
//!
//! Two growable, state-tracked layers: a base registry keyed by
//! `(asset_name, package_name)`, and a per-base instance registry. Both
//! reuse `UNINITIALIZED` slots before growing, matching the spec's
//! "pick the first free slot, grow by one if none" rule.

/// Sentinel returned for a slot id that could not be resolved.
pub const INVALID_ID: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseState {
    Uninitialized,
    Acquired,
    Loading,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Uninitialized,
    Acquired,
}

struct BaseSlot {
    state: BaseState,
    asset_name: String,
    package_name: String,
    instances: Vec<InstanceState>,
}

impl BaseSlot {
    fn empty() -> Self {
        BaseSlot {
            state: BaseState::Uninitialized,
            asset_name: String::new(),
            package_name: String::new(),
            instances: Vec::new(),
        }
    }
}

/// The base-level and per-base instance slot arrays, as a single unit
/// since instance ids are base-scoped (§4.4).
#[derive(Default)]
pub struct HandleRegistry {
    bases: Vec<BaseSlot>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        HandleRegistry::default()
    }

    /// Returns `(id, exists)`. If a base with matching names already
    /// exists in any non-uninitialized state, its id is returned with
    /// `exists = true`. Otherwise the first `UNINITIALIZED` slot is
    /// claimed (growing by one if none is free), marked `Acquired`, and
    /// returned with `exists = false`.
    pub fn get_base_id(&mut self, asset_name: &str, package_name: &str) -> (u16, bool) {
        for (id, slot) in self.bases.iter().enumerate() {
            if slot.state != BaseState::Uninitialized
                && slot.asset_name == asset_name
                && slot.package_name == package_name
            {
                return (id as u16, true);
            }
        }

        let id = self
            .bases
            .iter()
            .position(|slot| slot.state == BaseState::Uninitialized)
            .unwrap_or_else(|| {
                self.bases.push(BaseSlot::empty());
                self.bases.len() - 1
            });

        let slot = &mut self.bases[id];
        slot.state = BaseState::Acquired;
        slot.asset_name = asset_name.to_string();
        slot.package_name = package_name.to_string();
        (id as u16, false)
    }

    pub fn base_state(&self, base_id: u16) -> BaseState {
        self.bases[base_id as usize].state
    }

    pub fn set_base_state(&mut self, base_id: u16, state: BaseState) {
        self.bases[base_id as usize].state = state;
    }

    /// Finds the first `UNINITIALIZED` instance slot on `base_id`
    /// (growing by one if none), marks it `Acquired`, and returns its id.
    pub fn get_new_instance_id(&mut self, base_id: u16) -> u16 {
        let instances = &mut self.bases[base_id as usize].instances;
        let id = instances
            .iter()
            .position(|state| *state == InstanceState::Uninitialized)
            .unwrap_or_else(|| {
                instances.push(InstanceState::Uninitialized);
                instances.len() - 1
            });
        instances[id] = InstanceState::Acquired;
        id as u16
    }

    pub fn instance_state(&self, base_id: u16, instance_id: u16) -> InstanceState {
        self.bases[base_id as usize].instances[instance_id as usize]
    }

    /// Releases an instance. Returns `true` if this was the base's last
    /// live instance (the caller is then responsible for unloading the
    /// base's resources and calling [`Self::release_base`]).
    pub fn release_instance(&mut self, base_id: u16, instance_id: u16) -> bool {
        let instances = &mut self.bases[base_id as usize].instances;
        instances[instance_id as usize] = InstanceState::Uninitialized;
        instances
            .iter()
            .all(|state| *state == InstanceState::Uninitialized)
    }

    /// Returns the base slot to `UNINITIALIZED`, ready for reuse by a
    /// future `get_base_id`. Does not touch GPU/host resources; callers
    /// must free those first (§4.4).
    pub fn release_base(&mut self, base_id: u16) {
        let slot = &mut self.bases[base_id as usize];
        slot.state = BaseState::Uninitialized;
        slot.asset_name.clear();
        slot.package_name.clear();
        slot.instances.clear();
    }
}
