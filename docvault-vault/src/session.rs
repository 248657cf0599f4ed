//! In-memory session key lifecycle.
//!
//! The master key lives only here, behind a tokio `RwLock`:
//!
//! - encrypt/decrypt take the read side, so they run concurrently
//! - unlock, lock, rotation install and the idle watchdog take the write side
//!
//! A rotation holds the write guard for its whole run, which drains in-flight
//! readers before the swap and blocks new ones until the new key is installed.
//! The watchdog also needs the write guard, so it can never drop the key under
//! a running operation.

use crate::error::{VaultError, VaultResult};
use docvault_crypto::{derive_key, KdfParams, MasterKey, Salt, Verifier};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Observable session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Locked,
    Unlocked { expires_at: Instant },
    /// Locked by the idle timeout. Cleared by the next unlock or `lock()`.
    Expired,
}

impl SessionState {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, SessionState::Unlocked { .. })
    }
}

/// Read access to the active master key. Holding it keeps rotation and the
/// idle watchdog out.
pub(crate) type KeyGuard<'a> = RwLockReadGuard<'a, MasterKey>;

#[derive(Default)]
struct SessionInner {
    key: Option<MasterKey>,
    /// Bumped every time a key is installed.
    epoch: u64,
    /// Set when the watchdog dropped the key.
    expired: bool,
}

impl SessionInner {
    fn locked_error(&self) -> VaultError {
        if self.expired {
            VaultError::SessionExpired
        } else {
            VaultError::Locked
        }
    }
}

/// Upper bound for deadlines, matching what tokio timers accept.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Holds the derived master key between unlock and lock.
pub struct SessionKeyHolder {
    inner: Arc<RwLock<SessionInner>>,
    deadline: Arc<Mutex<Option<Instant>>>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
    idle_timeout: Duration,
}

impl SessionKeyHolder {
    /// Creates a locked holder.
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionInner::default())),
            deadline: Arc::new(Mutex::new(None)),
            watchdog: Mutex::new(None),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Derives the key for `password` and, if it checks out, makes it active.
    ///
    /// With a verifier, a mismatch fails with [`VaultError::WrongPassword`]
    /// and leaves the current state untouched. Without one, the key is
    /// accepted as-is and a wrong password only shows up at the first decrypt.
    pub async fn unlock(
        &self,
        password: &str,
        salt: &Salt,
        params: &KdfParams,
        verifier: Option<&Verifier>,
    ) -> VaultResult<u64> {
        let key = derive_key_blocking(password, salt, params).await?;

        match verifier {
            Some(verifier) if !verifier.matches(&key) => {
                debug!("unlock rejected: verifier mismatch");
                return Err(VaultError::WrongPassword);
            }
            Some(_) => {}
            None => warn!("security record has no verifier; unlocking without password check"),
        }

        Ok(self.activate(key).await)
    }

    /// Installs an already-derived key, replacing any previous one.
    pub(crate) async fn activate(&self, key: MasterKey) -> u64 {
        let mut state = self.inner.write().await;
        state.key = Some(key);
        state.epoch += 1;
        state.expired = false;
        let epoch = state.epoch;

        self.rearm().await;
        self.restart_watchdog().await;

        info!(epoch, "vault unlocked");
        epoch
    }

    /// Drops the key and stops the idle watchdog.
    pub async fn lock(&self) {
        let mut state = self.inner.write().await;
        let was_unlocked = state.key.take().is_some();
        state.expired = false;
        *self.deadline.lock().await = None;
        if let Some(handle) = self.watchdog.lock().await.take() {
            handle.abort();
        }
        if was_unlocked {
            info!("vault locked");
        }
    }

    /// True while a key is held and the idle deadline has not passed.
    pub async fn is_ready(&self) -> bool {
        self.state().await.is_unlocked()
    }

    /// Current state. A passed deadline reads as `Expired` even if the
    /// watchdog has not run yet.
    pub async fn state(&self) -> SessionState {
        let state = self.inner.read().await;
        if state.key.is_none() {
            return if state.expired {
                SessionState::Expired
            } else {
                SessionState::Locked
            };
        }
        match *self.deadline.lock().await {
            Some(expires_at) if Instant::now() < expires_at => {
                SessionState::Unlocked { expires_at }
            }
            _ => SessionState::Expired,
        }
    }

    /// Version tag of the active key. Increases on every unlock and rotation.
    pub async fn key_epoch(&self) -> u64 {
        self.inner.read().await.epoch
    }

    /// Runs `f` with the active key and re-arms the idle deadline if it
    /// succeeds.
    pub async fn with_key<T, F>(&self, f: F) -> VaultResult<T>
    where
        F: FnOnce(&MasterKey) -> VaultResult<T>,
    {
        let key = self.read_key().await?;
        let out = f(&*key)?;
        self.touch().await;
        Ok(out)
    }

    /// Read guard on the active key, for operations that must keep the key
    /// stable across an await (encrypt then store).
    pub(crate) async fn read_key(&self) -> VaultResult<KeyGuard<'_>> {
        let state = self.inner.read().await;
        if state.key.is_none() {
            return Err(state.locked_error());
        }
        if self.deadline_passed().await {
            return Err(VaultError::SessionExpired);
        }
        RwLockReadGuard::try_map(state, |s| s.key.as_ref()).map_err(|s| s.locked_error())
    }

    /// Pushes the idle deadline out by the full timeout.
    pub(crate) async fn touch(&self) {
        self.rearm().await;
    }

    /// Takes exclusive access for a password rotation.
    ///
    /// Waits for in-flight readers to finish and blocks new ones until the
    /// returned guard is dropped or [`RotationGuard::install`] is called.
    pub async fn begin_rotation(&self) -> VaultResult<RotationGuard<'_>> {
        let state = self.inner.write().await;
        if state.key.is_none() {
            return Err(state.locked_error());
        }
        if self.deadline_passed().await {
            return Err(VaultError::SessionExpired);
        }
        debug!(epoch = state.epoch, "rotation started; session quiesced");
        Ok(RotationGuard {
            state,
            holder: self,
        })
    }

    async fn rearm(&self) {
        let now = Instant::now();
        // Fails closed: an unrepresentable deadline expires immediately.
        let at = now
            .checked_add(self.idle_timeout.min(FAR_FUTURE))
            .unwrap_or(now);
        *self.deadline.lock().await = Some(at);
    }

    async fn deadline_passed(&self) -> bool {
        matches!(*self.deadline.lock().await, Some(at) if Instant::now() >= at)
    }

    async fn restart_watchdog(&self) {
        let mut slot = self.watchdog.lock().await;
        if let Some(old) = slot.take() {
            old.abort();
        }
        *slot = Some(tokio::spawn(idle_watchdog(
            Arc::clone(&self.inner),
            Arc::clone(&self.deadline),
        )));
    }
}

impl Drop for SessionKeyHolder {
    fn drop(&mut self) {
        if let Some(handle) = self.watchdog.get_mut().take() {
            handle.abort();
        }
    }
}

/// Exclusive session access held for the duration of a password rotation.
pub struct RotationGuard<'a> {
    state: RwLockWriteGuard<'a, SessionInner>,
    holder: &'a SessionKeyHolder,
}

impl RotationGuard<'_> {
    /// The key being rotated away from.
    pub fn old_key(&self) -> VaultResult<&MasterKey> {
        self.state.key.as_ref().ok_or(VaultError::Locked)
    }

    pub fn epoch(&self) -> u64 {
        self.state.epoch
    }

    /// Swaps in the new key, zeroizing the old one, and releases the session.
    pub async fn install(mut self, new_key: MasterKey) -> u64 {
        self.state.key = Some(new_key);
        self.state.epoch += 1;
        let epoch = self.state.epoch;
        self.holder.rearm().await;
        debug!(epoch, "rotation installed new key");
        epoch
    }
}

/// Sleeps until the idle deadline, then locks unless the deadline moved.
async fn idle_watchdog(inner: Arc<RwLock<SessionInner>>, deadline: Arc<Mutex<Option<Instant>>>) {
    loop {
        let Some(wake_at) = *deadline.lock().await else {
            return;
        };
        tokio::time::sleep_until(wake_at).await;

        let mut state = inner.write().await;
        let mut current = deadline.lock().await;
        let at = *current;
        match at {
            None => return,
            Some(at) if at > Instant::now() => continue,
            Some(_) => {
                state.key = None;
                state.expired = true;
                *current = None;
                info!(epoch = state.epoch, "vault auto-locked after idle timeout");
                return;
            }
        }
    }
}

/// Runs PBKDF2 on the blocking pool.
pub(crate) async fn derive_key_blocking(
    password: &str,
    salt: &Salt,
    params: &KdfParams,
) -> VaultResult<MasterKey> {
    let password = Zeroizing::new(password.to_string());
    let salt = salt.clone();
    let params = *params;
    let key = tokio::task::spawn_blocking(move || derive_key(&password, &salt, &params)).await??;
    Ok(key)
}
