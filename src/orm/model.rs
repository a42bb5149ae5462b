use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

use crate::core::{DbError, ID_KEY, ModelKey, Record, Result, Value};
use super::association::{Association, AssociationKind, KeyStorage};
use super::attrs::{Attrs, Field};
use super::belongs_to::BelongsTo;
use super::has_many::HasMany;
use super::registry::Registry;
use super::schema::Schema;

/// A cached related instance. `Held` keeps the model alive, `Back` only
/// points at the side that created the link.
#[derive(Clone)]
pub(crate) enum Slot {
    Held(Model),
    Back(WeakModel),
}

impl Slot {
    pub(crate) fn model(&self) -> Option<Model> {
        match self {
            Self::Held(model) => Some(model.clone()),
            Self::Back(weak) => weak.upgrade(),
        }
    }

    fn points_to(&self, model: &Model) -> bool {
        match self {
            Self::Held(held) => held.ptr_eq(model),
            Self::Back(weak) => std::ptr::eq(weak.state.as_ptr(), Rc::as_ptr(&model.state)),
        }
    }
}

#[derive(Clone)]
pub(crate) struct WeakModel {
    schema: Schema,
    state: Weak<RefCell<ModelState>>,
}

impl WeakModel {
    fn upgrade(&self) -> Option<Model> {
        self.state.upgrade().map(|state| Model {
            schema: self.schema.clone(),
            state,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Members {
    /// Has-many members assigned in memory; unsaved ones are not in the id list yet.
    Pending,
    /// Dirty membership of a has-many keyed on the child records.
    Children,
}

pub(crate) struct ModelState {
    model_name: String,
    attrs: Record,
    persisted: bool,
    destroyed: bool,
    pub(crate) saving: bool,
    parents: HashMap<String, Slot>,
    pending: HashMap<String, Vec<Slot>>,
    children: HashMap<String, Vec<Slot>>,
}

impl ModelState {
    fn members_mut(&mut self, which: Members) -> &mut HashMap<String, Vec<Slot>> {
        match which {
            Members::Pending => &mut self.pending,
            Members::Children => &mut self.children,
        }
    }

    fn members(&self, which: Members) -> &HashMap<String, Vec<Slot>> {
        match which {
            Members::Pending => &self.pending,
            Members::Children => &self.children,
        }
    }

    fn clear_caches(&mut self) {
        self.parents.clear();
        self.pending.clear();
        self.children.clear();
    }
}

/// A live view over one record.
///
/// Clones share state: attribute writes, caches and lifecycle flags are
/// visible through every clone. Two distinct instances loaded for the same
/// record compare equal but keep their own in-memory state.
#[derive(Clone)]
pub struct Model {
    schema: Schema,
    state: Rc<RefCell<ModelState>>,
}

enum Assignment<'r> {
    Plain(String, Value),
    Key(&'r Association, String, Value),
    One(&'r Association, Option<Model>),
    Many(&'r Association, Vec<Model>),
}

impl Model {
    pub(crate) fn instantiate(
        schema: &Schema,
        model_name: &str,
        mut attrs: Record,
        persisted: bool,
    ) -> Result<Self> {
        for assoc in schema.registry().associations_for(model_name)? {
            assoc.write_defaults(&mut attrs);
        }
        Ok(Self {
            schema: schema.clone(),
            state: Rc::new(RefCell::new(ModelState {
                model_name: model_name.to_string(),
                attrs,
                persisted,
                destroyed: false,
                saving: false,
                parents: HashMap::new(),
                pending: HashMap::new(),
                children: HashMap::new(),
            })),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn model_name(&self) -> String {
        self.state().model_name.clone()
    }

    pub fn id(&self) -> Option<String> {
        self.state()
            .attrs
            .get(ID_KEY)
            .and_then(|id| id.to_id().ok().flatten())
    }

    /// Type and id, once the model has been written to the store.
    pub fn key(&self) -> Option<ModelKey> {
        let state = self.state();
        if !state.persisted {
            return None;
        }
        let id = state.attrs.get(ID_KEY)?.to_id().ok().flatten()?;
        Some(ModelKey::new(state.model_name.clone(), id))
    }

    pub fn is_new(&self) -> bool {
        !self.state().persisted
    }

    pub fn is_saved(&self) -> bool {
        let state = self.state();
        state.persisted && !state.destroyed
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().destroyed
    }

    /// Snapshot of the current in-memory attributes, foreign keys included.
    pub fn attrs(&self) -> Record {
        self.state().attrs.clone()
    }

    pub fn get(&self, attr: &str) -> Value {
        self.state().attrs.get(attr).cloned().unwrap_or_default()
    }

    pub fn set(&self, key: &str, value: impl Into<Field>) -> Result<()> {
        self.assign(vec![(key.to_string(), value.into())])
    }

    /// Applies attributes in memory without saving.
    ///
    /// Every entry is validated before anything is written, so a rejected
    /// assignment leaves the model and its related instances untouched.
    pub fn assign(&self, attrs: Attrs) -> Result<()> {
        self.ensure_live()?;
        let registry = self.schema.registry();
        let model_name = self.model_name();

        let mut plan = Vec::with_capacity(attrs.len());
        for (key, field) in attrs {
            plan.push(self.plan_field(registry, &model_name, key, field)?);
        }

        for step in plan {
            match step {
                Assignment::Plain(key, value) => {
                    self.state_mut().attrs.insert(key, value);
                }
                Assignment::Key(assoc, attr, value) => self.write_key(assoc, attr, value)?,
                Assignment::One(assoc, target) => self.set_parent(assoc, target.as_ref())?,
                Assignment::Many(assoc, members) => self.set_members(assoc, &members)?,
            }
        }
        Ok(())
    }

    pub fn update(&self, attrs: Attrs) -> Result<()> {
        self.assign(attrs)?;
        self.save()
    }

    pub fn belongs_to(&self, key: &str) -> Result<BelongsTo> {
        let assoc = self.schema.registry().association(&self.model_name(), key)?;
        if !assoc.is_belongs_to() {
            return Err(DbError::TypeMismatch(format!(
                "'{}' on {} is a has-many association",
                key,
                self.model_name()
            )));
        }
        Ok(BelongsTo::new(self.clone(), assoc.clone()))
    }

    pub fn has_many(&self, key: &str) -> Result<HasMany> {
        let assoc = self.schema.registry().association(&self.model_name(), key)?;
        if !assoc.is_has_many() {
            return Err(DbError::TypeMismatch(format!(
                "'{}' on {} is a belongs-to association",
                key,
                self.model_name()
            )));
        }
        Ok(HasMany::new(self.clone(), assoc.clone()))
    }

    /// Re-reads the record and drops every cached association.
    pub fn reload(&self) -> Result<()> {
        let key = self.key().ok_or_else(|| DbError::ModelNotSaved(self.to_string()))?;
        let mut record = self.schema.record(&key)?;
        for assoc in self.schema.registry().associations_for(&key.model_name)? {
            assoc.write_defaults(&mut record);
        }
        let mut state = self.state_mut();
        state.attrs = record;
        state.clear_caches();
        Ok(())
    }

    /// Removes the record, first clearing every stored reference to it.
    pub fn destroy(&self) -> Result<()> {
        if self.is_destroyed() {
            return Ok(());
        }
        if let Some(key) = self.key() {
            self.schema.remove_record(&key)?;
        }

        let (parents, pending, children) = {
            let mut state = self.state_mut();
            state.destroyed = true;
            (
                std::mem::take(&mut state.parents),
                std::mem::take(&mut state.pending),
                std::mem::take(&mut state.children),
            )
        };

        let model_name = self.model_name();
        let registry = self.schema.registry();
        let linked = parents
            .into_iter()
            .map(|(key, slot)| (key, vec![slot]))
            .chain(pending)
            .chain(children);
        for (key, slots) in linked {
            let assoc = registry.association(&model_name, &key)?;
            for related in slots.iter().filter_map(Slot::model) {
                if let Some(inverse) = registry.inverse_of(assoc, &related.model_name()) {
                    related.unlink_local(inverse, self)?;
                }
            }
        }

        debug!(model = %self, "model destroyed");
        Ok(())
    }

    /// Same instance, or both persisted with the same type and id.
    pub fn same(&self, other: &Model) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.key(), other.key()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub(crate) fn ptr_eq(&self, other: &Model) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn downgrade(&self) -> WeakModel {
        WeakModel {
            schema: self.schema.clone(),
            state: Rc::downgrade(&self.state),
        }
    }

    pub(crate) fn state(&self) -> Ref<'_, ModelState> {
        self.state.borrow()
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, ModelState> {
        self.state.borrow_mut()
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(DbError::ModelDestroyed(self.to_string()));
        }
        Ok(())
    }

    pub(crate) fn mark_persisted(&self, record: Record) {
        let mut state = self.state_mut();
        state.attrs = record;
        state.persisted = true;
    }

    pub(crate) fn with_attrs<R>(&self, f: impl FnOnce(&mut Record) -> R) -> R {
        f(&mut self.state_mut().attrs)
    }

    // --- cached associations -------------------------------------------------

    pub(crate) fn parent_slot(&self, key: &str) -> Option<Model> {
        self.state().parents.get(key).and_then(Slot::model)
    }

    pub(crate) fn cache_parent(&self, assoc: &Association, parent: &Model) {
        let slot = self.slot_for(parent);
        self.state_mut().parents.insert(assoc.key.clone(), slot);
    }

    pub(crate) fn clear_parent(&self, assoc: &Association) {
        let mut state = self.state_mut();
        assoc.write_refs(&mut state.attrs, &[]);
        state.parents.remove(&assoc.key);
    }

    /// Live instances in one member list; `None` when the list was never set.
    pub(crate) fn member_slots(&self, which: Members, key: &str) -> Option<Vec<Model>> {
        self.state()
            .members(which)
            .get(key)
            .map(|slots| slots.iter().filter_map(Slot::model).collect())
    }

    pub(crate) fn clear_members(&self, which: Members) {
        self.state_mut().members_mut(which).clear();
    }

    /// Keeps only the members of one list for which `keep` holds.
    pub(crate) fn retain_members(&self, which: Members, keep: impl Fn(&Model) -> bool) {
        let lists: Vec<(String, Vec<Slot>)> = self
            .state()
            .members(which)
            .iter()
            .map(|(key, slots)| (key.clone(), slots.clone()))
            .collect();
        let kept: Vec<(String, Vec<Slot>)> = lists
            .into_iter()
            .map(|(key, slots)| {
                let slots = slots
                    .into_iter()
                    .filter(|slot| slot.model().is_some_and(|model| keep(&model)))
                    .collect();
                (key, slots)
            })
            .collect();
        let mut state = self.state_mut();
        let members = state.members_mut(which);
        for (key, slots) in kept {
            members.insert(key, slots);
        }
    }

    /// Current members of a has-many, in stored order followed by unsaved ones.
    pub(crate) fn members(&self, assoc: &Association) -> Result<Vec<Model>> {
        match assoc.storage {
            KeyStorage::OwnerList => {
                let refs = assoc.refs_in(&self.state().attrs)?;
                let held = self.member_slots(Members::Pending, &assoc.key).unwrap_or_default();

                let mut models = Vec::with_capacity(refs.len());
                for key in &refs {
                    let cached = held
                        .iter()
                        .find(|m| m.key().as_ref() == Some(key))
                        .cloned();
                    match cached {
                        Some(model) if model.is_destroyed() => {}
                        Some(model) => models.push(model),
                        None => models.push(self.schema.find_key(key)?),
                    }
                }
                for model in held {
                    if model.is_destroyed() || model.key().is_some_and(|k| refs.contains(&k)) {
                        continue;
                    }
                    models.push(model);
                }
                Ok(models)
            }
            KeyStorage::ChildKey => match self.member_slots(Members::Children, &assoc.key) {
                Some(models) => Ok(models.into_iter().filter(|m| !m.is_destroyed()).collect()),
                None => match self.key() {
                    Some(owner) => self.schema.stored_children(assoc, &owner),
                    None => Ok(Vec::new()),
                },
            },
        }
    }

    // --- in-memory linkage ---------------------------------------------------

    pub(crate) fn set_parent(&self, assoc: &Association, target: Option<&Model>) -> Result<()> {
        if let Some(target) = target {
            check_assignable(assoc, target)?;
        }
        let registry = self.schema.registry();
        let previous = self.parent_slot(&assoc.key);
        let refs: Vec<ModelKey> = target.and_then(Model::key).into_iter().collect();
        let slot = target.map(|t| self.slot_for(t));

        {
            let mut state = self.state_mut();
            assoc.write_refs(&mut state.attrs, &refs);
            match slot {
                Some(slot) => state.parents.insert(assoc.key.clone(), slot),
                None => state.parents.remove(&assoc.key),
            };
        }

        if let Some(previous) = previous
            && target.is_none_or(|t| !previous.same(t))
            && let Some(inverse) = registry.inverse_of(assoc, &previous.model_name())
        {
            previous.unlink_local(inverse, self)?;
        }
        if let Some(target) = target
            && let Some(inverse) = registry.inverse_of(assoc, &target.model_name())
        {
            target.link_local(inverse, self)?;
        }
        trace!(owner = %self, association = %assoc.key, "belongs-to assigned");
        Ok(())
    }

    pub(crate) fn set_members(&self, assoc: &Association, members: &[Model]) -> Result<()> {
        for member in members {
            check_assignable(assoc, member)?;
        }
        let registry = self.schema.registry();
        let mut unique: Vec<Model> = Vec::with_capacity(members.len());
        for member in members {
            if !unique.iter().any(|m| m.same(member)) {
                unique.push(member.clone());
            }
        }

        let which = members_for(assoc);
        let previous = match which {
            Members::Pending => self.member_slots(which, &assoc.key).unwrap_or_default(),
            Members::Children => self.members(assoc)?,
        };
        let refs: Vec<ModelKey> = unique.iter().filter_map(Model::key).collect();
        let slots: Vec<Slot> = unique.iter().map(|m| self.slot_for(m)).collect();

        {
            let mut state = self.state_mut();
            if assoc.stores_on_owner() {
                assoc.write_refs(&mut state.attrs, &refs);
            }
            state.members_mut(which).insert(assoc.key.clone(), slots);
        }

        for old in previous {
            if unique.iter().any(|m| m.same(&old)) {
                continue;
            }
            if let Some(inverse) = registry.inverse_of(assoc, &old.model_name()) {
                old.unlink_local(inverse, self)?;
            }
        }
        for member in &unique {
            if let Some(inverse) = registry.inverse_of(assoc, &member.model_name()) {
                member.link_local(inverse, self)?;
            }
        }
        trace!(owner = %self, association = %assoc.key, count = unique.len(), "has-many assigned");
        Ok(())
    }

    pub(crate) fn add_member(&self, assoc: &Association, member: &Model) -> Result<()> {
        check_assignable(assoc, member)?;
        let which = members_for(assoc);
        self.ensure_children_loaded(assoc)?;
        let present = self
            .member_slots(which, &assoc.key)
            .unwrap_or_default()
            .iter()
            .any(|m| m.same(member));

        let key = member.key();
        let slot = self.slot_for(member);
        {
            let mut state = self.state_mut();
            let state = &mut *state;
            if let Some(key) = &key
                && assoc.stores_on_owner()
            {
                assoc.add_ref(&mut state.attrs, key)?;
            }
            if !present {
                state
                    .members_mut(which)
                    .entry(assoc.key.clone())
                    .or_default()
                    .push(slot);
            }
        }

        if let Some(inverse) = self.schema.registry().inverse_of(assoc, &member.model_name()) {
            member.link_local(inverse, self)?;
        }
        Ok(())
    }

    pub(crate) fn remove_member(&self, assoc: &Association, member: &Model) -> Result<()> {
        self.ensure_children_loaded(assoc)?;
        if let Some(key) = member.key()
            && assoc.stores_on_owner()
        {
            self.with_attrs(|attrs| assoc.remove_ref(attrs, &key))?;
        }
        self.detach(members_for(assoc), &assoc.key, member);

        if let Some(inverse) = self.schema.registry().inverse_of(assoc, &member.model_name()) {
            member.unlink_local(inverse, self)?;
        }
        Ok(())
    }

    /// Records `owner` on this model's side of `inverse`.
    pub(crate) fn link_local(&self, inverse: &Association, owner: &Model) -> Result<()> {
        if inverse.storage == KeyStorage::ChildKey {
            self.ensure_children_loaded(inverse)?;
            self.detach(Members::Children, &inverse.key, owner);
        }
        let owner_key = owner.key();
        let back = Slot::Back(owner.downgrade());

        let mut state = self.state_mut();
        let state = &mut *state;
        match inverse.kind {
            AssociationKind::BelongsTo => {
                let refs: Vec<ModelKey> = owner_key.into_iter().collect();
                inverse.write_refs(&mut state.attrs, &refs);
                state.parents.insert(inverse.key.clone(), back);
            }
            AssociationKind::HasMany => {
                let list = match members_for(inverse) {
                    Members::Pending => &mut state.pending,
                    Members::Children => &mut state.children,
                }
                .entry(inverse.key.clone())
                .or_default();
                match &owner_key {
                    Some(key) if inverse.stores_on_owner() => {
                        // A held instance stays cached until the next save.
                        list.retain(|slot| matches!(slot, Slot::Held(_)) || !slot.points_to(owner));
                        inverse.add_ref(&mut state.attrs, key)?;
                    }
                    _ => {
                        list.retain(|slot| !slot.points_to(owner));
                        list.push(back);
                    }
                }
            }
        }
        Ok(())
    }

    /// Removes `owner` from this model's side of `inverse`.
    pub(crate) fn unlink_local(&self, inverse: &Association, owner: &Model) -> Result<()> {
        let owner_key = owner.key();
        match inverse.kind {
            AssociationKind::BelongsTo => {
                let mut state = self.state_mut();
                let cached = state
                    .parents
                    .get(&inverse.key)
                    .is_some_and(|slot| slot.points_to(owner));
                let stored = match &owner_key {
                    Some(key) => inverse.refs_in(&state.attrs)?.contains(key),
                    None => false,
                };
                if cached || stored {
                    inverse.write_refs(&mut state.attrs, &[]);
                    state.parents.remove(&inverse.key);
                }
            }
            AssociationKind::HasMany => {
                if let Some(key) = &owner_key
                    && inverse.stores_on_owner()
                {
                    self.with_attrs(|attrs| inverse.remove_ref(attrs, key))?;
                }
                self.detach(members_for(inverse), &inverse.key, owner);
            }
        }
        Ok(())
    }

    fn detach(&self, which: Members, key: &str, model: &Model) {
        let Some(slots) = self.state().members(which).get(key).cloned() else {
            return;
        };
        let kept: Vec<Slot> = slots
            .into_iter()
            .filter(|slot| slot.model().is_some_and(|m| !m.same(model)))
            .collect();
        self.state_mut().members_mut(which).insert(key.to_string(), kept);
    }

    fn ensure_children_loaded(&self, assoc: &Association) -> Result<()> {
        if assoc.storage != KeyStorage::ChildKey || self.state().children.contains_key(&assoc.key) {
            return Ok(());
        }
        let current = match self.key() {
            Some(owner) => self.schema.stored_children(assoc, &owner)?,
            None => Vec::new(),
        };
        let slots = current.iter().map(|m| self.slot_for(m)).collect();
        self.state_mut().children.insert(assoc.key.clone(), slots);
        Ok(())
    }

    fn slot_for(&self, model: &Model) -> Slot {
        if model.ptr_eq(self) {
            Slot::Back(model.downgrade())
        } else {
            Slot::Held(model.clone())
        }
    }

    fn plan_field<'r>(
        &self,
        registry: &'r Registry,
        model_name: &str,
        key: String,
        field: Field,
    ) -> Result<Assignment<'r>> {
        match field {
            Field::Value(value) => {
                if key == ID_KEY {
                    let id = value.to_id()?;
                    if !self.is_new() && id != self.id() {
                        return Err(DbError::TypeMismatch(format!(
                            "the id of {} cannot change",
                            self
                        )));
                    }
                    return Ok(Assignment::Plain(key, id.map(Value::Text).unwrap_or_default()));
                }
                if let Some(assoc) = registry.association_for_key_attr(model_name, &key)? {
                    let value = assoc.normalize_key_value(&key, value)?;
                    return Ok(Assignment::Key(assoc, key, value));
                }
                if let Some(assoc) = registry.find_association(model_name, &key)? {
                    return match (assoc.kind, value) {
                        (AssociationKind::BelongsTo, Value::Null) => Ok(Assignment::One(assoc, None)),
                        (AssociationKind::HasMany, Value::Null) => {
                            Ok(Assignment::Many(assoc, Vec::new()))
                        }
                        (_, other) => Err(DbError::TypeMismatch(format!(
                            "'{}' is an association and cannot hold {}",
                            key,
                            other.type_name()
                        ))),
                    };
                }
                Ok(Assignment::Plain(key, value))
            }
            Field::One(target) => {
                let assoc = registry.association(model_name, &key)?;
                if !assoc.is_belongs_to() {
                    return Err(DbError::TypeMismatch(format!(
                        "'{}' is a has-many association and takes a list of models",
                        key
                    )));
                }
                if let Some(target) = &target {
                    check_assignable(assoc, target)?;
                }
                Ok(Assignment::One(assoc, target))
            }
            Field::Many(members) => {
                let assoc = registry.association(model_name, &key)?;
                if !assoc.is_has_many() {
                    return Err(DbError::TypeMismatch(format!(
                        "'{}' is a belongs-to association and takes a single model",
                        key
                    )));
                }
                for member in &members {
                    check_assignable(assoc, member)?;
                }
                Ok(Assignment::Many(assoc, members))
            }
        }
    }

    /// Writes a raw foreign key, dropping the in-memory instances it replaces.
    fn write_key(&self, assoc: &Association, attr: String, value: Value) -> Result<()> {
        let previous: Vec<Model> = match assoc.kind {
            AssociationKind::BelongsTo => self.parent_slot(&assoc.key).into_iter().collect(),
            AssociationKind::HasMany => self
                .member_slots(Members::Pending, &assoc.key)
                .unwrap_or_default(),
        };
        {
            let mut state = self.state_mut();
            state.attrs.insert(attr, value);
            state.parents.remove(&assoc.key);
            state.pending.remove(&assoc.key);
        }

        let refs = assoc.refs_in(&self.state().attrs)?;
        let registry = self.schema.registry();
        for old in previous {
            if old.key().is_some_and(|k| refs.contains(&k)) {
                continue;
            }
            if let Some(inverse) = registry.inverse_of(assoc, &old.model_name()) {
                old.unlink_local(inverse, self)?;
            }
        }
        Ok(())
    }
}

fn members_for(assoc: &Association) -> Members {
    match assoc.storage {
        KeyStorage::OwnerList => Members::Pending,
        KeyStorage::ChildKey => Members::Children,
    }
}

fn check_assignable(assoc: &Association, target: &Model) -> Result<()> {
    let target_name = target.model_name();
    if !assoc.accepts(&target_name) {
        return Err(DbError::UndefinedRelationship(format!(
            "{} cannot be assigned to '{}' on {}, which expects {}",
            target,
            assoc.key,
            assoc.owner,
            assoc.model_name().unwrap_or("any model")
        )));
    }
    if target.is_destroyed() {
        return Err(DbError::ModelDestroyed(target.to_string()));
    }
    Ok(())
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        let id = state
            .attrs
            .get(ID_KEY)
            .filter(|id| !id.is_null())
            .map(Value::to_string)
            .unwrap_or_else(|| "new".to_string());
        write!(f, "model:{}({})", state.model_name, id)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Model")
                .field("model_name", &state.model_name)
                .field("attrs", &state.attrs)
                .field("persisted", &state.persisted)
                .field("destroyed", &state.destroyed)
                .finish(),
            Err(_) => f.write_str("Model { <borrowed> }"),
        }
    }
}
