//! Opaque handles for browser-resident objects.
//!
//! A [`HandleTable`] hands out string ids for live objects so they can be
//! referenced across the process boundary as `{"value": "<id>"}` without
//! exposing the objects themselves. Every stored object is wrapped in a
//! [`KnownElement`] that derefs to the wrapped object and answers the
//! identity query ([`RemoteObject::handle_id`]) with its own id.
//!
//! The table is not synchronized. Its owner serializes access; a session
//! only touches it while its single outstanding command is being handled.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use downcast_rs::{DowncastSync, impl_downcast};
use tracing::trace;
use webrc_protocol::ElementRef;

use crate::error::{Error, Result};

/// A live object owned by the agent's environment.
pub trait RemoteObject: DowncastSync + fmt::Debug {
	/// Id under which this object is known, if it is a handle.
	fn handle_id(&self) -> Option<&str> {
		None
	}

	/// True once the browser-side object behind this reference is gone.
	fn is_stale(&self) -> bool {
		false
	}

	/// Identity comparison with another object. Defaults to address equality.
	fn same_as(&self, other: &dyn RemoteObject) -> bool {
		std::ptr::addr_eq(self, other)
	}
}
impl_downcast!(sync RemoteObject);

/// An object stored in a [`HandleTable`], together with its id.
#[derive(Clone)]
pub struct KnownElement {
	id: Arc<str>,
	inner: Arc<dyn RemoteObject>,
}

impl KnownElement {
	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn to_ref(&self) -> ElementRef {
		ElementRef::new(self.id.as_ref())
	}

	/// The wrapped object.
	pub fn wrapped(&self) -> &Arc<dyn RemoteObject> {
		&self.inner
	}

	/// The wrapped object as a concrete type.
	pub fn downcast<T: RemoteObject>(&self) -> Option<Arc<T>> {
		Arc::clone(&self.inner).downcast_arc::<T>().ok()
	}
}

impl Deref for KnownElement {
	type Target = dyn RemoteObject;

	fn deref(&self) -> &Self::Target {
		self.inner.as_ref()
	}
}

impl RemoteObject for KnownElement {
	fn handle_id(&self) -> Option<&str> {
		Some(&self.id)
	}

	fn is_stale(&self) -> bool {
		self.inner.is_stale()
	}

	fn same_as(&self, other: &dyn RemoteObject) -> bool {
		self.inner.same_as(other)
	}
}

impl fmt::Debug for KnownElement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KnownElement")
			.field("id", &self.id)
			.field("inner", &self.inner)
			.finish()
	}
}

/// Strips a [`KnownElement`] wrapper, returning any other object unchanged.
pub fn unwrap_object(object: &Arc<dyn RemoteObject>) -> Arc<dyn RemoteObject> {
	match object.downcast_ref::<KnownElement>() {
		Some(known) => Arc::clone(&known.inner),
		None => Arc::clone(object),
	}
}

/// Per-session id allocator and lookup map for remote objects.
pub struct HandleTable {
	elements: HashMap<String, KnownElement>,
	next_id: u64,
}

impl Default for HandleTable {
	fn default() -> Self {
		Self::new()
	}
}

impl HandleTable {
	pub fn new() -> Self {
		Self::with_base(0)
	}

	/// Table whose first issued id is `base`.
	pub fn with_base(base: u64) -> Self {
		Self {
			elements: HashMap::new(),
			next_id: base,
		}
	}

	/// Stores `object` under the next id and returns a reference to it.
	pub fn add(&mut self, object: Arc<dyn RemoteObject>) -> ElementRef {
		let id = self.next_id.to_string();
		self.next_id += 1;

		let known = KnownElement {
			id: Arc::from(id.as_str()),
			inner: unwrap_object(&object),
		};
		trace!(target = "webrc.handles", id = %id, "element registered");
		self.elements.insert(id.clone(), known);
		ElementRef::new(id)
	}

	/// Looks up a live handle.
	///
	/// Unknown or invalidated ids are [`Error::NoSuchElement`]; a handle
	/// whose backing object went away is [`Error::StaleElementReference`].
	pub fn get(&self, id: &str) -> Result<KnownElement> {
		let known = self
			.elements
			.get(id)
			.ok_or_else(|| Error::NoSuchElement { id: id.to_string() })?;
		if known.is_stale() {
			return Err(Error::StaleElementReference { id: id.to_string() });
		}
		Ok(known.clone())
	}

	pub fn resolve(&self, reference: &ElementRef) -> Result<KnownElement> {
		self.get(&reference.id)
	}

	/// Invalidates `id`; later lookups report not-found.
	pub fn remove(&mut self, id: &str) -> Option<KnownElement> {
		self.elements.remove(id)
	}

	/// Compares the objects behind two handles, unwrapping both sides.
	pub fn elements_equal(&self, id: &str, other_id: &str) -> Result<bool> {
		let one = unwrap_object(self.get(id)?.wrapped());
		let two = unwrap_object(self.get(other_id)?.wrapped());
		Ok(one.same_as(two.as_ref()))
	}

	pub fn len(&self) -> usize {
		self.elements.len()
	}

	pub fn is_empty(&self) -> bool {
		self.elements.is_empty()
	}
}

impl fmt::Debug for HandleTable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HandleTable")
			.field("len", &self.elements.len())
			.field("next_id", &self.next_id)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicBool, Ordering};

	use super::*;

	#[derive(Debug, Default)]
	struct FakeElement {
		name: String,
		detached: AtomicBool,
	}

	impl FakeElement {
		fn named(name: &str) -> Arc<Self> {
			Arc::new(Self {
				name: name.to_string(),
				..Default::default()
			})
		}
	}

	impl RemoteObject for FakeElement {
		fn is_stale(&self) -> bool {
			self.detached.load(Ordering::SeqCst)
		}
	}

	#[test]
	fn test_ids_strictly_increase() {
		let mut table = HandleTable::new();
		let ids: Vec<u64> = (0..5)
			.map(|i| table.add(FakeElement::named(&i.to_string())).id.parse().unwrap())
			.collect();
		assert_eq!(ids, vec![0, 1, 2, 3, 4]);
		assert_eq!(table.len(), 5);
	}

	#[test]
	fn test_base_value() {
		let mut table = HandleTable::with_base(100);
		assert_eq!(table.add(FakeElement::named("a")).id, "100");
		assert_eq!(table.add(FakeElement::named("b")).id, "101");
	}

	#[test]
	fn test_get_forwards_to_wrapped_object() {
		let mut table = HandleTable::new();
		let element = FakeElement::named("button");
		let reference = table.add(element.clone());

		let known = table.resolve(&reference).unwrap();
		assert_eq!(known.id(), reference.id);
		assert_eq!(known.handle_id(), Some(reference.id.as_str()));
		assert_eq!(known.downcast::<FakeElement>().unwrap().name, "button");
		assert!(Arc::ptr_eq(&known.downcast::<FakeElement>().unwrap(), &element));
	}

	#[test]
	fn test_plain_object_has_no_handle_id() {
		let element = FakeElement::named("x");
		assert_eq!(element.handle_id(), None);
	}

	#[test]
	fn test_unknown_and_removed_ids_are_not_found() {
		let mut table = HandleTable::new();
		assert!(matches!(table.get("0"), Err(Error::NoSuchElement { .. })));

		let reference = table.add(FakeElement::named("gone"));
		table.remove(&reference.id);
		assert!(matches!(table.get(&reference.id), Err(Error::NoSuchElement { .. })));

		// ids are not reused after removal
		assert_eq!(table.add(FakeElement::named("next")).id, "1");
	}

	#[test]
	fn test_detached_object_is_stale() {
		let mut table = HandleTable::new();
		let element = FakeElement::named("detached");
		let reference = table.add(element.clone());

		element.detached.store(true, Ordering::SeqCst);
		let err = table.resolve(&reference).unwrap_err();
		assert!(err.is_stale(), "expected stale reference, got {err:?}");
	}

	#[test]
	fn test_element_equality_unwraps_both_sides() {
		let mut table = HandleTable::new();
		let element = FakeElement::named("same");
		let first = table.add(element.clone());
		let second = table.add(element.clone());
		let other = table.add(FakeElement::named("other"));

		assert!(table.elements_equal(&first.id, &second.id).unwrap());
		assert!(!table.elements_equal(&first.id, &other.id).unwrap());
		assert!(table.elements_equal(&first.id, "99").is_err());
	}

	#[test]
	fn test_re_adding_a_handle_does_not_double_wrap() {
		let mut table = HandleTable::new();
		let first = table.add(FakeElement::named("inner"));
		let known: Arc<dyn RemoteObject> = Arc::new(table.get(&first.id).unwrap());
		let second = table.add(known);

		let rewrapped = table.get(&second.id).unwrap();
		assert!(rewrapped.wrapped().downcast_ref::<KnownElement>().is_none());
		assert!(table.elements_equal(&first.id, &second.id).unwrap());
	}
}
