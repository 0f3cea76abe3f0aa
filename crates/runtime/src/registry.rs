//! Live sessions by id.
//!
//! Uses [`DashMap`] so request handlers for different sessions never
//! contend. The registry also owns the process-wide default speed that new
//! queues start from; changing it never touches queues that already exist.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info};
use webrc_protocol::{Capabilities, SessionId};

use crate::config::RemoteControlConfig;
use crate::error::{Error, Result};
use crate::handles::HandleTable;
use crate::queue::CommandQueue;

/// One browser session: its queue, handle table, and capabilities.
pub struct Session {
	id: SessionId,
	capabilities: Capabilities,
	queue: Arc<CommandQueue>,
	elements: Mutex<HandleTable>,
	created_at: Instant,
	last_used: Mutex<Instant>,
}

impl Session {
	pub fn id(&self) -> &SessionId {
		&self.id
	}

	pub fn capabilities(&self) -> &Capabilities {
		&self.capabilities
	}

	pub fn queue(&self) -> &Arc<CommandQueue> {
		&self.queue
	}

	/// Locks the handle table. Do not hold the guard across an await.
	pub fn elements(&self) -> MutexGuard<'_, HandleTable> {
		self.elements.lock()
	}

	pub fn created_at(&self) -> Instant {
		self.created_at
	}

	/// Marks the session as used now.
	pub fn touch(&self) {
		*self.last_used.lock() = Instant::now();
	}

	pub fn idle_for(&self) -> Duration {
		self.last_used.lock().elapsed()
	}

	pub fn is_closed(&self) -> bool {
		self.queue.is_closed()
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("capabilities", &self.capabilities)
			.field("queue", &self.queue)
			.finish()
	}
}

/// Concurrent map of live sessions.
pub struct SessionRegistry {
	sessions: DashMap<SessionId, Arc<Session>>,
	config: RemoteControlConfig,
	default_speed_ms: AtomicU64,
	next_id: AtomicU64,
}

impl SessionRegistry {
	pub fn new(config: RemoteControlConfig) -> Self {
		Self {
			sessions: DashMap::new(),
			default_speed_ms: AtomicU64::new(config.speed_ms),
			next_id: AtomicU64::new(1),
			config,
		}
	}

	pub fn config(&self) -> &RemoteControlConfig {
		&self.config
	}

	/// Delay that newly created queues start with.
	pub fn default_speed(&self) -> Duration {
		Duration::from_millis(self.default_speed_ms.load(Ordering::SeqCst))
	}

	/// Changes the delay for sessions created from now on.
	pub fn set_default_speed(&self, speed: Duration) {
		let ms = u64::try_from(speed.as_millis()).unwrap_or(u64::MAX);
		self.default_speed_ms.store(ms, Ordering::SeqCst);
	}

	/// Creates and registers a session with a fresh queue.
	pub fn new_session(&self, capabilities: Capabilities) -> Arc<Session> {
		let id = self.generate_id();
		let queue = CommandQueue::new(id.clone(), self.config.queue_config(self.default_speed()));
		let now = Instant::now();
		let session = Arc::new(Session {
			id: id.clone(),
			capabilities,
			queue: Arc::new(queue),
			elements: Mutex::new(HandleTable::new()),
			created_at: now,
			last_used: Mutex::new(now),
		});

		info!(target = "webrc.registry", session = %id, capabilities = %session.capabilities, "session created");
		self.sessions.insert(id, Arc::clone(&session));
		session
	}

	/// Looks up a live session and marks it used.
	pub fn get(&self, id: &SessionId) -> Result<Arc<Session>> {
		let session = self
			.try_get(id)
			.ok_or_else(|| Error::SessionNotFound(id.clone()))?;
		session.touch();
		Ok(session)
	}

	/// Lookup without touching the idle clock.
	pub fn try_get(&self, id: &SessionId) -> Option<Arc<Session>> {
		self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
	}

	/// Removes a session without closing its queue.
	pub fn delete_session(&self, id: &SessionId) -> Option<Arc<Session>> {
		self.sessions.remove(id).map(|(_, session)| session)
	}

	/// Removes a session and closes its queue, releasing any waiters.
	pub fn end_session(&self, id: &SessionId) -> Result<()> {
		let session = self
			.delete_session(id)
			.ok_or_else(|| Error::SessionNotFound(id.clone()))?;
		session.queue().declare_closed();
		info!(target = "webrc.registry", session = %id, "session ended");
		Ok(())
	}

	/// Ids of all live sessions, sorted.
	pub fn list(&self) -> Vec<SessionId> {
		let mut ids: Vec<SessionId> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
		ids.sort();
		ids
	}

	pub fn len(&self) -> usize {
		self.sessions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.is_empty()
	}

	/// Ends every session idle for longer than `max_idle`.
	pub fn sweep_idle(&self, max_idle: Duration) -> Vec<SessionId> {
		let expired: Vec<SessionId> = self
			.sessions
			.iter()
			.filter(|entry| entry.value().idle_for() > max_idle)
			.map(|entry| entry.key().clone())
			.collect();

		for id in &expired {
			debug!(target = "webrc.registry", session = %id, ?max_idle, "session idle too long");
			// a concurrent end_session may have won the race
			let _ = self.end_session(id);
		}
		expired
	}

	/// Ends every session.
	pub fn shutdown(&self) {
		let ids = self.list();
		info!(target = "webrc.registry", count = ids.len(), "closing all sessions");
		for id in ids {
			let _ = self.end_session(&id);
		}
	}

	fn generate_id(&self) -> SessionId {
		let n = self.next_id.fetch_add(1, Ordering::SeqCst);
		let millis = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_millis())
			.unwrap_or_default();
		SessionId::new(format!("{millis:x}{n:04x}"))
	}
}

impl Default for SessionRegistry {
	fn default() -> Self {
		Self::new(RemoteControlConfig::default())
	}
}
