//! Record types and their field descriptors
//!
//! A persisted type implements [`Model`]: it embeds a [`ModelBase`] (identity
//! plus audit stamps) and hands out a [`TypeDescriptor`] listing its fields.
//! Descriptors stand in for runtime reflection: every field is a name, a
//! semantic type and a getter/setter pair, declared once.
//!
//! Ancestors are modelled by embedding. A descriptor `extends` the
//! descriptor of an embedded struct, projecting each of its fields through
//! the embedding accessor:
//!
//! ```
//! use modelstore::{FieldDef, Model, ModelBase, TypeDescriptor};
//!
//! #[derive(Default)]
//! struct Note {
//!     base: ModelBase,
//!     title: String,
//!     pinned: bool,
//! }
//!
//! impl Model for Note {
//!     fn descriptor() -> TypeDescriptor<Self> {
//!         TypeDescriptor::new("app::notes::Note")
//!             .field(FieldDef::new("title", |n: &Note| n.title.clone(), |n, v| n.title = v))
//!             .field(FieldDef::new("pinned", |n: &Note| n.pinned, |n, v| n.pinned = v))
//!             .extends(ModelBase::descriptor(), |n| &n.base, |n| &mut n.base)
//!     }
//!
//!     fn base(&self) -> &ModelBase { &self.base }
//!     fn base_mut(&mut self) -> &mut ModelBase { &mut self.base }
//! }
//! ```

use crate::value::{FieldKind, FieldValue, SemanticType};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Reads one field out of a record
pub type Getter<M> = Arc<dyn Fn(&M) -> FieldValue + Send + Sync>;

/// Writes one field into a record
pub type Setter<M> = Arc<dyn Fn(&mut M, FieldValue) -> Result<()> + Send + Sync>;

/// Identity and audit fields shared by every record type.
///
/// `id == 0` means the record has not been persisted yet. The stamps are
/// epoch milliseconds and are only written by the record factory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelBase {
    pub id: i64,
    pub created_at: i64,
    pub modified_at: i64,
    pub schema_version: i32,
}

impl ModelBase {
    pub const TYPE_NAME: &'static str = "modelstore::model::ModelBase";

    /// Root descriptor. `id` is ignored here; it maps onto the primary key
    /// column instead of a regular column.
    pub fn descriptor() -> TypeDescriptor<ModelBase> {
        TypeDescriptor::new(Self::TYPE_NAME)
            .field(FieldDef::new("id", |b: &ModelBase| b.id, |b, v| b.id = v).ignore())
            .field(FieldDef::new(
                "created_at",
                |b: &ModelBase| b.created_at,
                |b, v| b.created_at = v,
            ))
            .field(FieldDef::new(
                "modified_at",
                |b: &ModelBase| b.modified_at,
                |b, v| b.modified_at = v,
            ))
            .field(FieldDef::new(
                "schema_version",
                |b: &ModelBase| b.schema_version,
                |b, v| b.schema_version = v,
            ))
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }
}

/// An application record persisted by the mapping layer.
///
/// `Default` is the zero-argument constructor used for each decoded row.
pub trait Model: Default + Send + Sync + 'static {
    /// Field table for this type, own fields first
    fn descriptor() -> TypeDescriptor<Self>;

    fn base(&self) -> &ModelBase;

    fn base_mut(&mut self) -> &mut ModelBase;

    fn id(&self) -> i64 {
        self.base().id
    }

    fn created_at(&self) -> i64 {
        self.base().created_at
    }

    fn modified_at(&self) -> i64 {
        self.base().modified_at
    }

    fn schema_version(&self) -> i32 {
        self.base().schema_version
    }
}

/// One declared field of a record type.
pub struct FieldDef<M> {
    name: &'static str,
    semantic: SemanticType,
    ignored: bool,
    getter: Option<Getter<M>>,
    setter: Option<Setter<M>>,
}

impl<M: 'static> FieldDef<M> {
    /// A typed field with a plain getter and setter
    pub fn new<T: FieldKind + 'static>(
        name: &'static str,
        get: fn(&M) -> T,
        set: fn(&mut M, T),
    ) -> Self {
        let setter: Setter<M> = Arc::new(move |record: &mut M, value: FieldValue| {
            let found = value.semantic_type();
            match T::from_value(value) {
                Some(v) => {
                    set(record, v);
                    Ok(())
                }
                None => Err(Error::Codec(format!(
                    "field '{}' expects {}, got {}",
                    name,
                    T::SEMANTIC,
                    found
                ))),
            }
        });

        Self {
            name,
            semantic: T::SEMANTIC,
            ignored: false,
            getter: Some(Arc::new(move |record: &M| get(record).into_value())),
            setter: Some(setter),
        }
    }

    /// A field whose value conversion is done by the caller, typically for
    /// an `Other` semantic type backed by a custom codec
    pub fn raw(
        name: &'static str,
        semantic: SemanticType,
        get: impl Fn(&M) -> FieldValue + Send + Sync + 'static,
        set: impl Fn(&mut M, FieldValue) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            semantic,
            ignored: false,
            getter: Some(Arc::new(get)),
            setter: Some(Arc::new(set)),
        }
    }

    /// A field that can be read but not written back
    pub fn read_only<T: FieldKind + 'static>(name: &'static str, get: fn(&M) -> T) -> Self {
        Self {
            name,
            semantic: T::SEMANTIC,
            ignored: false,
            getter: Some(Arc::new(move |record: &M| get(record).into_value())),
            setter: None,
        }
    }

    /// A declared field of a type with no value mapping (a collection,
    /// a nested record, ...)
    pub fn opaque(name: &'static str, type_label: &'static str) -> Self {
        Self {
            name,
            semantic: SemanticType::Other(type_label),
            ignored: false,
            getter: None,
            setter: None,
        }
    }

    /// Mark the field as never persisted
    pub fn ignore(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn semantic_type(&self) -> SemanticType {
        self.semantic
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub fn getter(&self) -> Option<&Getter<M>> {
        self.getter.as_ref()
    }

    pub fn setter(&self) -> Option<&Setter<M>> {
        self.setter.as_ref()
    }

    /// Re-target this field onto an outer type that embeds `M`
    pub fn project<P: 'static>(self, outer: fn(&P) -> &M, outer_mut: fn(&mut P) -> &mut M) -> FieldDef<P> {
        let getter: Option<Getter<P>> = self.getter.map(|get| {
            let projected: Getter<P> = Arc::new(move |record: &P| get(outer(record)));
            projected
        });
        let setter: Option<Setter<P>> = self.setter.map(|set| {
            let projected: Setter<P> =
                Arc::new(move |record: &mut P, value: FieldValue| set(outer_mut(record), value));
            projected
        });

        FieldDef {
            name: self.name,
            semantic: self.semantic,
            ignored: self.ignored,
            getter,
            setter,
        }
    }
}

impl<M> fmt::Debug for FieldDef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("semantic", &self.semantic)
            .field("ignored", &self.ignored)
            .field("readable", &self.getter.is_some())
            .field("writable", &self.setter.is_some())
            .finish()
    }
}

/// Declared fields of one record type plus its (embedded) ancestor chain.
pub struct TypeDescriptor<M> {
    type_name: &'static str,
    fields: Vec<FieldDef<M>>,
    parent: Option<Box<TypeDescriptor<M>>>,
}

impl<M: 'static> TypeDescriptor<M> {
    /// `type_name` is the fully-qualified type path, e.g. `app::notes::Note`.
    /// It determines the table name and must stay stable.
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            fields: Vec::new(),
            parent: None,
        }
    }

    /// Append a declared field
    pub fn field(mut self, field: FieldDef<M>) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare `parent` (embedded in `M`) as this type's ancestor
    pub fn extends<P: 'static>(
        mut self,
        parent: TypeDescriptor<P>,
        outer: fn(&M) -> &P,
        outer_mut: fn(&mut M) -> &mut P,
    ) -> Self {
        self.parent = Some(Box::new(parent.project(outer, outer_mut)));
        self
    }

    fn project<P: 'static>(self, outer: fn(&P) -> &M, outer_mut: fn(&mut P) -> &mut M) -> TypeDescriptor<P> {
        TypeDescriptor {
            type_name: self.type_name,
            fields: self
                .fields
                .into_iter()
                .map(|f| f.project(outer, outer_mut))
                .collect(),
            parent: self.parent.map(|p| Box::new(p.project(outer, outer_mut))),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fields declared directly on this type
    pub fn declared_fields(&self) -> &[FieldDef<M>] {
        &self.fields
    }

    pub fn parent(&self) -> Option<&TypeDescriptor<M>> {
        self.parent.as_deref()
    }

    /// All fields in hierarchy order: own declarations first, ancestors last
    pub fn all_fields(&self) -> Vec<&FieldDef<M>> {
        let mut fields = Vec::new();
        let mut current = Some(self);
        while let Some(descriptor) = current {
            fields.extend(descriptor.fields.iter());
            current = descriptor.parent();
        }
        fields
    }

    /// Type names from this type up to the root
    pub fn lineage(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut current = Some(self);
        while let Some(descriptor) = current {
            names.push(descriptor.type_name);
            current = descriptor.parent();
        }
        names
    }
}

impl<M> fmt::Debug for TypeDescriptor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .field("parent", &self.parent)
            .finish()
    }
}
