//! The reference algebra
//!
//! A [`Ref`] denotes a selection of locations (not just values) inside a
//! document: a single variable, a subset of an array, a subset of a map, a
//! literal, a latent path that does not exist yet, or a union of those. Refs
//! compose under [`union`](Ref::union) and [`merge`](Ref::merge) and support
//! the operations a match needs: reading the selected values, setting,
//! deleting and mutating them.
//!
//! Mutations rebuild containers copy-on-write along the access path: the
//! setter of a child variable clones its parent container, installs the new
//! value and writes the clone back through the parent, all the way up to the
//! root variable whose setter replaces the document.

use std::rc::Rc;

use serde_json::{Map, Value};

use crate::canonical::Kind;
use crate::regions::{Region, Regions};

/// Depth reported by latent refs. A set through a latent path must always
/// execute before anything shallower, so it pretends to be very deep.
const LATENT_DEPTH: i64 = 100_000;

/// Error type mutator callbacks may fail with
pub type MutateError = Box<dyn std::error::Error>;

/// The callback signature for [`Ref::mutate`]: receives the path of the value
/// and its current contents, returns the replacement
pub type MutatorFn<'a> = dyn FnMut(&str, Value) -> Result<Value, MutateError> + 'a;

/// The callback signature for [`ArrayRef::mutate_regions`]: receives the
/// selection as one sub-list per contiguous region and returns the
/// replacement sub-lists, which may differ in length
pub type MutateRegionsFn<'a> =
    dyn FnMut(&str, Vec<Vec<Value>>) -> Result<Vec<Vec<Value>>, MutateError> + 'a;

/// Error performing an operation on a ref
#[derive(Debug)]
pub enum RefError {
    /// The ref kind does not support the operation
    Unsupported {
        operation: &'static str,
        kind: &'static str,
    },
    /// A mutator callback failed
    Mutator(MutateError),
}

impl std::fmt::Display for RefError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefError::Unsupported { operation, kind } => {
                write!(f, "{operation} not supported for {kind} refs")
            }
            RefError::Mutator(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RefError {}

/// Getter closure of a [`VarRef`]
pub type VarGetter = Rc<dyn Fn() -> Value>;

/// Setter closure of a [`VarRef`]
pub type VarSetter = Rc<dyn Fn(Value)>;

/// The key a variable had in its parent container, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarKey {
    Index(i64),
    Key(String),
}

/// A reference to a single variable with the capacity to replace its contents
///
/// The getter/setter pair expresses lens semantics over nested containers;
/// both read the *current* document on every call. The whole structure is
/// single-threaded.
#[derive(Clone)]
pub struct VarRef {
    getter: VarGetter,
    setter: VarSetter,
    /// Nesting depth relative to the root
    depth: i64,
    /// A unique name locating exactly this value, in reality a jmatch path
    identity: String,
    /// The key of this value when it came out of an array or map
    key: Option<VarKey>,
}

impl std::fmt::Debug for VarRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VarRef")
            .field("identity", &self.identity)
            .field("depth", &self.depth)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl VarRef {
    /// Create a var ref from raw closures. Has a complicated signature and
    /// should not be needed outside tests; the evaluator builds var refs
    /// itself.
    pub fn new(identity: impl Into<String>, getter: VarGetter, setter: VarSetter, depth: i64) -> Self {
        Self {
            getter,
            setter,
            depth,
            identity: identity.into(),
            key: None,
        }
    }

    fn with_key(self, key: VarKey) -> Self {
        Self {
            key: Some(key),
            ..self
        }
    }

    /// The current value of the variable
    pub fn value(&self) -> Value {
        (self.getter)()
    }

    /// The current value converted to canonical form. With a closed document
    /// type every value is already canonical, so this is the same as
    /// [`value`](VarRef::value); the seam exists for the write-path twin
    /// [`set_with_matched_type`](VarRef::set_with_matched_type).
    pub fn canonical_value(&self) -> Value {
        self.value()
    }

    /// Replace the value of the variable, installing the canonical type
    pub fn set(&self, value: Value) {
        (self.setter)(value)
    }

    /// Replace the value while preserving the concrete type of the old value
    /// where possible. The canonical document type admits no aliases, so this
    /// currently delegates to [`set`](VarRef::set).
    pub fn set_with_matched_type(&self, value: Value) {
        self.set(value)
    }

    /// Pass the current value through the mutator and store the result
    pub fn mutate(&self, mutator: &mut MutatorFn) -> Result<(), RefError> {
        let new_value = mutator(&self.identity, self.value()).map_err(RefError::Mutator)?;
        self.set(new_value);
        Ok(())
    }

    pub fn depth(&self) -> i64 {
        self.depth
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The key this variable had in its parent container, if any
    pub fn key(&self) -> Option<&VarKey> {
        self.key.as_ref()
    }

    /// The canonical kind of the current value
    pub fn kind(&self) -> Kind {
        Kind::of(&self.value())
    }

    pub fn is_map(&self) -> bool {
        self.kind() == Kind::Map
    }

    pub fn is_array(&self) -> bool {
        self.kind() == Kind::Array
    }

    pub fn is_container(&self) -> bool {
        self.kind().is_container()
    }
}

/// A ref to a subset of an array
#[derive(Debug, Clone)]
pub struct ArrayRef {
    /// Must canonicalize to an array
    variable: VarRef,
    selection: Regions,
}

impl ArrayRef {
    /// Create a new array ref. The variable must canonicalize to an array;
    /// anything else is a programming error.
    pub fn new(variable: VarRef, selection: Regions) -> Self {
        assert!(
            variable.is_array(),
            "variables wrapped by array refs must canonicalize to arrays"
        );
        Self {
            variable,
            selection,
        }
    }

    pub fn variable(&self) -> &VarRef {
        &self.variable
    }

    pub fn selection(&self) -> &Regions {
        &self.selection
    }

    fn items(&self) -> Vec<Value> {
        match self.variable.canonical_value() {
            Value::Array(items) => items,
            _ => panic!("array ref target must canonicalize to an array"),
        }
    }

    fn element_identity(&self, index: i64) -> String {
        format!("{}[{:06}]", self.variable.identity, index)
    }

    pub fn values(&self) -> Vec<Value> {
        let items = self.items();
        self.selection
            .to_indicies()
            .into_iter()
            .filter_map(|i| items.get(i as usize).cloned())
            .collect()
    }

    /// Var refs for each selected element. Their setters clone the array,
    /// replace the one element and write the clone back through the parent.
    pub fn vars(&self) -> Vec<VarRef> {
        self.selection
            .to_indicies()
            .into_iter()
            .map(|index| {
                let parent = self.variable.clone();
                let getter: VarGetter = {
                    let parent = parent.clone();
                    Rc::new(move || match parent.canonical_value() {
                        Value::Array(items) => {
                            items.get(index as usize).cloned().unwrap_or(Value::Null)
                        }
                        _ => panic!("array ref target must canonicalize to an array"),
                    })
                };
                let setter: VarSetter = {
                    let parent = parent.clone();
                    Rc::new(move |value| {
                        let Value::Array(mut items) = parent.canonical_value() else {
                            panic!("array ref target must canonicalize to an array");
                        };
                        if let Some(slot) = items.get_mut(index as usize) {
                            *slot = value;
                        }
                        parent.set(Value::Array(items));
                    })
                };
                VarRef::new(self.element_identity(index), getter, setter, self.depth() + 1)
                    .with_key(VarKey::Index(index))
            })
            .collect()
    }

    fn index_included(&self, index: i64) -> bool {
        self.selection.contains_index(index)
    }

    pub fn set(&self, value: &Value) {
        let mut items = self.items();
        for (i, slot) in items.iter_mut().enumerate() {
            if self.index_included(i as i64) {
                *slot = value.clone();
            }
        }
        self.variable.set_with_matched_type(Value::Array(items));
    }

    pub fn delete(&mut self) {
        let items = self.items();
        let keep = Regions::single(Region::new(0, items.len() as i64)).intersect(&self.selection);
        let mut modified = Vec::with_capacity(keep.indicies_count().max(0) as usize);
        for i in keep.to_indicies() {
            if let Some(item) = items.get(i as usize) {
                modified.push(item.clone());
            }
        }
        self.variable.set_with_matched_type(Value::Array(modified));
        // The selected indices are now gone from the underlying array
        self.selection = Regions::new();
    }

    pub fn mutate(&self, mutator: &mut MutatorFn) -> Result<(), RefError> {
        let items = self.items();
        let mut modified = items.clone();
        for i in self.selection.to_indicies() {
            let current = items.get(i as usize).cloned().unwrap_or(Value::Null);
            let new_value =
                mutator(&self.element_identity(i), current).map_err(RefError::Mutator)?;
            if let Some(slot) = modified.get_mut(i as usize) {
                *slot = new_value;
            }
        }
        self.variable.set_with_matched_type(Value::Array(modified));
        Ok(())
    }

    /// Mutate the selected parts of the array as a whole. The mutator gets
    /// one sub-list per contiguous selected region and returns replacement
    /// sub-lists whose lengths may differ; the array grows or shrinks
    /// accordingly. The selection is updated to cover the new positions, so
    /// this ref stays valid for further operations.
    pub fn mutate_regions(&mut self, mutator: &mut MutateRegionsFn) -> Result<(), RefError> {
        let original = self.items();
        let extract = self.selection.extract_items(&original);
        let path = format!(
            "{}[{}]",
            self.variable.identity,
            self.selection.to_slice_selector()
        );
        let modified_extract = mutator(&path, extract).map_err(RefError::Mutator)?;
        let (modified, updated_regions) = self.selection.merge_items(&original, modified_extract);
        self.variable.set_with_matched_type(Value::Array(modified));
        // Track where the replacements landed
        self.selection = updated_regions;
        Ok(())
    }

    pub fn depth(&self) -> i64 {
        self.variable.depth + 1
    }

    pub fn is_empty(&self) -> bool {
        self.selection.indicies_count() == 0
    }

    pub fn estimate_size(&self) -> usize {
        self.selection.indicies_count().max(0) as usize
    }

    fn merge(&self, other: &ArrayRef) -> Option<ArrayRef> {
        if self.variable.identity != other.variable.identity {
            return None;
        }
        Some(ArrayRef {
            variable: self.variable.clone(),
            selection: self.selection.union(&other.selection),
        })
    }
}

/// A ref to a subset of a map with string keys
#[derive(Debug, Clone)]
pub struct MapRef {
    variable: VarRef,
    /// Kept sorted for deterministic iteration
    keys: Vec<String>,
}

impl MapRef {
    /// Create a new map ref. The variable must canonicalize to a map;
    /// anything else is a programming error.
    pub fn new(variable: VarRef, mut keys: Vec<String>) -> Self {
        assert!(
            variable.is_map(),
            "variables wrapped by map refs must canonicalize to maps"
        );
        keys.sort();
        Self { variable, keys }
    }

    pub fn variable(&self) -> &VarRef {
        &self.variable
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    fn entries(&self) -> Map<String, Value> {
        match self.variable.canonical_value() {
            Value::Object(entries) => entries,
            _ => panic!("map ref target must canonicalize to a map"),
        }
    }

    fn entry_identity(&self, key: &str) -> String {
        format!("{}.{}", self.variable.identity, key)
    }

    /// The values at the selected keys. Keys that are missing or hold null
    /// contribute nothing.
    pub fn values(&self) -> Vec<Value> {
        let entries = self.entries();
        self.keys
            .iter()
            .filter_map(|key| entries.get(key).cloned())
            .filter(|value| !value.is_null())
            .collect()
    }

    pub fn vars(&self) -> Vec<VarRef> {
        self.keys
            .iter()
            .map(|key| {
                let parent = self.variable.clone();
                let getter: VarGetter = {
                    let parent = parent.clone();
                    let key = key.clone();
                    Rc::new(move || match parent.canonical_value() {
                        Value::Object(entries) => {
                            entries.get(&key).cloned().unwrap_or(Value::Null)
                        }
                        _ => panic!("map ref target must canonicalize to a map"),
                    })
                };
                let setter: VarSetter = {
                    let parent = parent.clone();
                    let key = key.clone();
                    Rc::new(move |value| {
                        let Value::Object(mut entries) = parent.canonical_value() else {
                            panic!("map ref target must canonicalize to a map");
                        };
                        entries.insert(key.clone(), value);
                        parent.set(Value::Object(entries));
                    })
                };
                VarRef::new(self.entry_identity(key), getter, setter, self.depth() + 1)
                    .with_key(VarKey::Key(key.clone()))
            })
            .collect()
    }

    pub fn set(&self, value: &Value) {
        let mut entries = self.entries();
        for key in &self.keys {
            entries.insert(key.clone(), value.clone());
        }
        self.variable.set_with_matched_type(Value::Object(entries));
    }

    pub fn delete(&mut self) {
        let mut entries = self.entries();
        for key in &self.keys {
            entries.remove(key);
        }
        self.variable.set_with_matched_type(Value::Object(entries));
    }

    pub fn mutate(&self, mutator: &mut MutatorFn) -> Result<(), RefError> {
        let current = self.entries();
        let mut modified = current.clone();
        for key in &self.keys {
            let value = current.get(key).cloned().unwrap_or(Value::Null);
            let new_value =
                mutator(&self.entry_identity(key), value).map_err(RefError::Mutator)?;
            modified.insert(key.clone(), new_value);
        }
        self.variable.set_with_matched_type(Value::Object(modified));
        Ok(())
    }

    pub fn depth(&self) -> i64 {
        self.variable.depth + 1
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn estimate_size(&self) -> usize {
        self.keys.len()
    }

    /// A latent ref for any selected keys that are missing, null or not maps
    /// in the underlying value. `None` when every key holds a map.
    pub fn get_latent_map_ref(&self) -> Option<LatentMapRef> {
        let entries = self.entries();
        let missing: Vec<String> = self
            .keys
            .iter()
            .filter(|key| match entries.get(*key) {
                Some(Value::Object(_)) => false,
                Some(_) | None => true,
            })
            .cloned()
            .collect();
        if missing.is_empty() {
            return None;
        }
        Some(LatentMapRef::new(
            Ref::Map(MapRef::new(self.variable.clone(), missing)),
            Vec::new(),
        ))
    }

    fn merge(&self, other: &MapRef) -> Option<MapRef> {
        if self.variable.identity != other.variable.identity {
            return None;
        }
        Some(MapRef {
            variable: self.variable.clone(),
            keys: union_keys(&self.keys, &other.keys),
        })
    }
}

/// Not a location at all, just a container for a literal value
#[derive(Debug, Clone)]
pub struct LiteralRef {
    value: Value,
}

impl LiteralRef {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// A reference to a key path in a map that does not exist yet
///
/// Given a document like `{"a": {}}` matched with `a.b.c`, the key `b` has a
/// map to live in but `c` has nowhere to go, so a latent ref is formed in
/// case the client wants to set a value there. Setting creates the maps
/// needed to realize the path. Every root ref of a latent ref is a map ref.
/// A latent ref refers to no values at all, so it reads as empty and deletes
/// as a no-op.
#[derive(Debug, Clone)]
pub struct LatentMapRef {
    root: Box<Ref>,
    key_path: Vec<String>,
}

impl LatentMapRef {
    pub fn new(root: Ref, key_path: Vec<String>) -> Self {
        Self {
            root: Box::new(root),
            key_path,
        }
    }

    /// Extend the key path with one more key
    pub fn add_key(&mut self, key: String) {
        self.key_path.push(key);
    }

    pub fn set(&self, value: &Value) -> Result<(), RefError> {
        for member in individual_refs(&self.root) {
            member.set(&build_map_babushka(&self.key_path, value.clone()))?;
        }
        Ok(())
    }

    /// Mutate values that by definition do not exist: the mutator receives
    /// null as the current value and its result is set through the key path
    pub fn mutate(&self, mutator: &mut MutatorFn) -> Result<(), RefError> {
        let path_identity = self.key_path.join(".");
        for member in individual_refs(&self.root) {
            let Ref::Map(map_ref) = member else {
                panic!("latent map ref roots must be map refs");
            };
            let identity = format!("{}.*.{}", map_ref.variable.identity, path_identity);
            let value = mutator(&identity, Value::Null).map_err(RefError::Mutator)?;
            Ref::Map(map_ref).set(&build_map_babushka(&self.key_path, value))?;
        }
        Ok(())
    }
}

/// The union of a collection of refs, kept sorted deepest-first
#[derive(Debug, Clone, Default)]
pub struct UnionRef {
    refs: Vec<Ref>,
}

impl UnionRef {
    pub fn refs(&self) -> &[Ref] {
        &self.refs
    }

    pub(crate) fn refs_mut(&mut self) -> &mut [Ref] {
        &mut self.refs
    }
}

/// A reference to a selection of locations in a document
///
/// The capability set is {values, vars, depth, estimate_size, is_empty, set,
/// delete, mutate, union, merge}; variants that legitimately lack a
/// capability return a typed [`RefError`] naming their kind.
#[derive(Debug, Clone)]
pub enum Ref {
    Var(VarRef),
    Array(ArrayRef),
    Map(MapRef),
    Literal(LiteralRef),
    Latent(LatentMapRef),
    Union(UnionRef),
}

impl Ref {
    /// An empty ref, the identity of [`union`](Ref::union)
    pub fn empty() -> Ref {
        Ref::Union(UnionRef::default())
    }

    /// The name of the ref kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Ref::Var(_) => "var",
            Ref::Array(_) => "array",
            Ref::Map(_) => "map",
            Ref::Literal(_) => "literal",
            Ref::Latent(_) => "latent",
            Ref::Union(_) => "union",
        }
    }

    /// The values of all referenced locations
    pub fn values(&self) -> Vec<Value> {
        match self {
            Ref::Var(var) => vec![var.value()],
            Ref::Array(array) => array.values(),
            Ref::Map(map) => map.values(),
            Ref::Literal(literal) => vec![literal.value.clone()],
            Ref::Latent(_) => Vec::new(),
            Ref::Union(union) => union.refs.iter().flat_map(Ref::values).collect(),
        }
    }

    /// Var refs for every referenced location
    pub fn vars(&self) -> Vec<VarRef> {
        match self {
            Ref::Var(var) => vec![var.clone()],
            Ref::Array(array) => array.vars(),
            Ref::Map(map) => map.vars(),
            Ref::Literal(literal) => {
                let value = literal.value.clone();
                let getter: VarGetter = Rc::new(move || value.clone());
                let setter: VarSetter =
                    Rc::new(|_| panic!("attempt to set the value of a literal ref"));
                vec![VarRef::new("[literal]", getter, setter, -1)]
            }
            Ref::Latent(_) => Vec::new(),
            Ref::Union(union) => union.refs.iter().flat_map(Ref::vars).collect(),
        }
    }

    /// The depth used to order operations: deeper refs commit first
    pub fn depth(&self) -> i64 {
        match self {
            Ref::Var(var) => var.depth,
            Ref::Array(array) => array.depth(),
            Ref::Map(map) => map.depth(),
            Ref::Literal(_) => -1,
            Ref::Latent(_) => LATENT_DEPTH,
            Ref::Union(_) => 0,
        }
    }

    /// The resolvable path of the ref, for the kinds that have one
    pub fn get_path(&self) -> Option<&str> {
        match self {
            Ref::Var(var) => Some(&var.identity),
            Ref::Array(array) => Some(&array.variable.identity),
            Ref::Map(map) => Some(&map.variable.identity),
            Ref::Literal(_) | Ref::Latent(_) | Ref::Union(_) => None,
        }
    }

    /// An estimate of the number of values this ref points to, erring on the
    /// high side when it has to err at all
    pub fn estimate_size(&self) -> usize {
        match self {
            Ref::Var(_) | Ref::Literal(_) => 1,
            Ref::Array(array) => array.estimate_size(),
            Ref::Map(map) => map.estimate_size(),
            Ref::Latent(_) => 0,
            Ref::Union(union) => union.refs.iter().map(Ref::estimate_size).sum(),
        }
    }

    /// True if the ref no longer refers to any location, for example after a
    /// delete
    pub fn is_empty(&self) -> bool {
        match self {
            Ref::Var(_) | Ref::Literal(_) => false,
            Ref::Array(array) => array.is_empty(),
            Ref::Map(map) => map.is_empty(),
            Ref::Latent(_) => true,
            Ref::Union(union) => union.refs.iter().all(Ref::is_empty),
        }
    }

    /// Set every referenced location to the provided value. Union members run
    /// in depth order, deepest first.
    pub fn set(&self, value: &Value) -> Result<(), RefError> {
        match self {
            Ref::Var(var) => {
                var.set(value.clone());
                Ok(())
            }
            Ref::Array(array) => {
                array.set(value);
                Ok(())
            }
            Ref::Map(map) => {
                map.set(value);
                Ok(())
            }
            Ref::Literal(_) => Err(Ref::unsupported("Set", self)),
            Ref::Latent(latent) => latent.set(value),
            Ref::Union(union) => {
                for member in &union.refs {
                    member.set(value)?;
                }
                Ok(())
            }
        }
    }

    /// Delete the referenced locations from their containers. Only possible
    /// for maps and arrays; a no-op for latent refs.
    pub fn delete(&mut self) -> Result<(), RefError> {
        match self {
            Ref::Array(array) => {
                array.delete();
                Ok(())
            }
            Ref::Map(map) => {
                map.delete();
                Ok(())
            }
            Ref::Latent(_) => Ok(()),
            Ref::Union(union) => {
                for member in &mut union.refs {
                    member.delete()?;
                }
                Ok(())
            }
            Ref::Var(_) | Ref::Literal(_) => Err(Ref::unsupported("Delete", self)),
        }
    }

    /// Pass every referenced value through the mutator and store the results
    pub fn mutate(&self, mutator: &mut MutatorFn) -> Result<(), RefError> {
        match self {
            Ref::Var(var) => var.mutate(mutator),
            Ref::Array(array) => array.mutate(mutator),
            Ref::Map(map) => map.mutate(mutator),
            Ref::Literal(_) => Err(Ref::unsupported("Mutate", self)),
            Ref::Latent(latent) => latent.mutate(mutator),
            Ref::Union(union) => {
                for member in &union.refs {
                    member.mutate(mutator)?;
                }
                Ok(())
            }
        }
    }

    fn unsupported(operation: &'static str, r: &Ref) -> RefError {
        RefError::Unsupported {
            operation,
            kind: r.kind(),
        }
    }

    /// Attempt to combine two refs into one without resorting to a union, for
    /// example two array refs over the same underlying array whose selections
    /// can simply be merged. `None` when the refs cannot be combined.
    pub fn merge(&self, other: &Ref) -> Option<Ref> {
        match (self, other) {
            (Ref::Array(a), Ref::Array(b)) => a.merge(b).map(Ref::Array),
            (Ref::Map(a), Ref::Map(b)) => a.merge(b).map(Ref::Map),
            (Ref::Var(a), Ref::Var(b)) if a.identity == b.identity => Some(self.clone()),
            (Ref::Literal(a), Ref::Literal(b)) if a.value == b.value => Some(self.clone()),
            (Ref::Union(union), other) if !matches!(other, Ref::Union(_)) => {
                // Try to merge the ref into one of the union's members
                for (i, member) in union.refs.iter().enumerate() {
                    if let Some(merged) = member.merge(other) {
                        let mut refs = union.refs.clone();
                        refs[i] = merged;
                        return Some(Ref::Union(UnionRef { refs }));
                    }
                }
                None
            }
            _ => None,
        }
    }

    /// The union of two refs
    ///
    /// Nested unions are flattened, operands merge into existing members
    /// where possible, a union of exactly one ref unwraps to that ref, and
    /// the members are kept sorted by (depth descending, pathed refs first,
    /// path ascending).
    pub fn union(self, other: Ref) -> Ref {
        let mut members: Vec<Ref> = match self {
            Ref::Union(union) => union.refs,
            single => vec![single],
        };
        let operands: Vec<Ref> = match other {
            Ref::Union(union) => union.refs,
            single => vec![single],
        };
        for operand in operands {
            let mut merged = false;
            for member in members.iter_mut() {
                if let Some(combined) = member.merge(&operand) {
                    *member = combined;
                    merged = true;
                    break;
                }
            }
            if !merged {
                members.push(operand);
            }
        }
        if members.len() == 1 {
            return members.remove(0);
        }
        members.sort_by(cmp_refs);
        Ref::Union(UnionRef { refs: members })
    }
}

/// Three-way comparison ordering union members: depth descending, then refs
/// with a path before refs without one, then path ascending
fn cmp_refs(a: &Ref, b: &Ref) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match b.depth().cmp(&a.depth()) {
        Ordering::Equal => match (a.get_path(), b.get_path()) {
            (Some(pa), Some(pb)) => pa.cmp(pb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        unequal => unequal,
    }
}

/// Unwrap a ref into the list of its individual members
pub(crate) fn individual_refs(r: &Ref) -> Vec<Ref> {
    match r {
        Ref::Union(union) => union.refs.clone(),
        other => vec![other.clone()],
    }
}

/// Extract the latent map refs reachable from the provided ref: either
/// created fresh from map refs with missing keys, or passed through from
/// pre-existing latent refs
pub(crate) fn latent_map_refs(r: &Ref) -> Vec<LatentMapRef> {
    let mut result = Vec::new();
    for member in individual_refs(r) {
        match member {
            Ref::Map(map_ref) => {
                if let Some(latent) = map_ref.get_latent_map_ref() {
                    result.push(latent);
                }
            }
            Ref::Latent(latent) => result.push(latent),
            _ => {}
        }
    }
    result
}

/// A ref to all values on the first sub-level of the variable: every key of a
/// map, every index of an array, nothing for scalars
pub(crate) fn match_all_children(variable: &VarRef) -> Ref {
    match variable.canonical_value() {
        Value::Object(entries) => Ref::Map(MapRef::new(
            variable.clone(),
            entries.keys().cloned().collect(),
        )),
        Value::Array(items) => Ref::Array(ArrayRef::new(
            variable.clone(),
            Regions::single(Region::new(0, items.len() as i64)),
        )),
        _ => Ref::empty(),
    }
}

/// The sorted union of two key lists, with duplicates removed
fn union_keys(a: &[String], b: &[String]) -> Vec<String> {
    let mut result: Vec<String> = a.to_vec();
    for key in b {
        if !result.contains(key) {
            result.push(key.clone());
        }
    }
    result.sort();
    result
}

/// Wrap the value in onion skins of maps according to the key path: value 4
/// with key path `["a", "b"]` becomes `{"a": {"b": 4}}`
fn build_map_babushka(key_path: &[String], value: Value) -> Value {
    match key_path.split_first() {
        None => Value::Object(Map::new()),
        Some((key, rest)) => {
            let inner = if rest.is_empty() {
                value
            } else {
                build_map_babushka(rest, value)
            };
            let mut result = Map::new();
            result.insert(key.clone(), inner);
            Value::Object(result)
        }
    }
}
